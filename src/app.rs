//! Windowed application runner.
//!
//! Game logic implements [`GameFlow`]; [`run`] owns the winit event loop,
//! the GPU [`Context`] and the [`Renderer`] and drives one synchronous
//! frame per redraw: update the flow, traverse its scene, run the five
//! passes, present.

use std::sync::Arc;

use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::context::Context;
use crate::data_structures::scene_graph::SceneGraph;
use crate::pipelines::ssao::SsaoConfig;
use crate::render::Renderer;

/// Hooks the engine calls on the game each frame.
///
/// The engine treats the flow's scene as read-only input per frame: the
/// flow moves nodes, toggles visibility and pokes material uniforms in
/// `on_update`, and the renderer consumes the result.
pub trait GameFlow {
    /// Called once after the GPU context exists. Build the scene here.
    fn on_init(&mut self, ctx: &mut Context) -> anyhow::Result<()>;

    /// Called every frame with the elapsed time since the previous one.
    fn on_update(&mut self, ctx: &mut Context, dt: Duration);

    /// Raw window events (input, focus, ...). Resize is handled by the
    /// runner before this hook sees the event.
    fn on_window_event(&mut self, _ctx: &mut Context, _event: &WindowEvent) {}

    /// The scene the renderer draws this frame.
    fn scene(&mut self) -> &mut SceneGraph;

    /// Ambient-occlusion configuration; the default matches the stage
    /// lighting the game ships with.
    fn ssao_config(&self) -> SsaoConfig {
        SsaoConfig::default()
    }
}

struct AppState {
    ctx: Context,
    renderer: Renderer,
    last_frame: Instant,
}

struct App<F: GameFlow> {
    flow: F,
    state: Option<AppState>,
    error: Option<anyhow::Error>,
}

impl<F: GameFlow> App<F> {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState> {
        let window = Arc::new(
            event_loop.create_window(Window::default_attributes().with_title("beatstage"))?,
        );
        let mut ctx = pollster::block_on(Context::new(window))?;
        ctx.surface.configure(&ctx.device, &ctx.config);
        let renderer = Renderer::new(
            &ctx.device,
            &ctx.queue,
            ctx.config.width,
            ctx.config.height,
            ctx.config.format,
            &ctx.camera.bind_group_layout,
            self.flow.ssao_config(),
            None,
        )?;
        self.flow.on_init(&mut ctx)?;
        ctx.window.request_redraw();
        Ok(AppState {
            ctx,
            renderer,
            last_frame: Instant::now(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        let Some(state) = &mut self.state else {
            return;
        };
        if width == 0 || height == 0 {
            return;
        }
        state.ctx.config.width = width;
        state.ctx.config.height = height;
        state.ctx.surface.configure(&state.ctx.device, &state.ctx.config);
        state.ctx.projection.resize(width, height);
        // Attachments are recreated at the next frame boundary, not here.
        state.renderer.request_resize(width, height);
    }

    fn frame(&mut self) -> anyhow::Result<()> {
        let Some(state) = &mut self.state else {
            return Ok(());
        };
        let now = Instant::now();
        let dt = now - state.last_frame;
        state.last_frame = now;

        self.flow.on_update(&mut state.ctx, dt);

        let frame = state.ctx.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        state.renderer.render(
            &state.ctx.device,
            &state.ctx.queue,
            &mut state.ctx.camera,
            &state.ctx.projection,
            self.flow.scene(),
            &view,
            (state.ctx.config.width, state.ctx.config.height),
            state.ctx.clear_colour,
        )?;
        frame.present();
        state.ctx.window.request_redraw();
        Ok(())
    }
}

impl<F: GameFlow> ApplicationHandler for App<F> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match self.init(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match &event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.frame() {
                    log::error!("frame failed: {e:#}");
                    self.error = Some(e);
                    event_loop.exit();
                }
                return;
            }
            _ => {}
        }
        if let Some(state) = &mut self.state {
            self.flow.on_window_event(&mut state.ctx, &event);
        }
    }
}

/// Run a game flow until the window closes or a fatal error occurs.
pub fn run<F: GameFlow>(flow: F) -> anyhow::Result<()> {
    env_logger::init();
    let event_loop = EventLoop::new()?;
    let mut app = App {
        flow,
        state: None,
        error: None,
    };
    event_loop.run_app(&mut app)?;
    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

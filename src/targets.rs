//! Offscreen render targets for the deferred pipeline.
//!
//! [`RenderTargets`] owns every viewport-sized attachment the passes write:
//! the G-buffer (view-space position + normal + depth), the pre-occlusion
//! scene image with its own depth, and the raw/blurred occlusion buffers.
//! The whole set is destroyed and recreated on resize, which only ever
//! happens at a frame boundary.

use std::fmt;
use std::sync::Arc;

use crate::data_structures::texture::Texture;

/// Fatal error around framebuffer/attachment management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramebufferError {
    /// Attachments cannot be created with a zero-sized viewport.
    ZeroSize { width: u32, height: u32 },
    /// The attachments no longer match the viewport; a resize was missed.
    SizeMismatch {
        attachment: (u32, u32),
        viewport: (u32, u32),
    },
}

impl fmt::Display for FramebufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramebufferError::ZeroSize { width, height } => {
                write!(f, "cannot create {}x{} framebuffer attachments", width, height)
            }
            FramebufferError::SizeMismatch {
                attachment,
                viewport,
            } => write!(
                f,
                "framebuffer attachments are {}x{} but the viewport is {}x{}",
                attachment.0, attachment.1, viewport.0, viewport.1
            ),
        }
    }
}

impl std::error::Error for FramebufferError {}

/// Every size-dependent attachment of the deferred pipeline.
///
/// G-buffer attachments and the occlusion buffers are nearest-filtered
/// (they hold data, not colors); the scene image is linear-filtered.
#[derive(Debug)]
pub struct RenderTargets {
    width: u32,
    height: u32,
    /// View-space position, w = 1 marks covered pixels.
    pub g_position: Arc<Texture>,
    /// View-space normal.
    pub g_normal: Arc<Texture>,
    pub g_depth: Arc<Texture>,
    /// The scene rendered with plain materials, before occlusion.
    pub scene_color: Arc<Texture>,
    pub scene_depth: Arc<Texture>,
    /// Raw per-pixel occlusion factor.
    pub ao_raw: Arc<Texture>,
    /// Box-blurred occlusion factor, consumed by the composite pass.
    pub ao_blur: Arc<Texture>,
}

impl RenderTargets {
    pub const GBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, FramebufferError> {
        if width == 0 || height == 0 {
            return Err(FramebufferError::ZeroSize { width, height });
        }
        let size = [width, height];
        log::debug!("creating {}x{} render targets", width, height);

        Ok(Self {
            width,
            height,
            g_position: Arc::new(Texture::create_color_attachment(
                device,
                size,
                Self::GBUFFER_FORMAT,
                wgpu::FilterMode::Nearest,
                "g_position",
            )),
            g_normal: Arc::new(Texture::create_color_attachment(
                device,
                size,
                Self::GBUFFER_FORMAT,
                wgpu::FilterMode::Nearest,
                "g_normal",
            )),
            g_depth: Arc::new(Texture::create_depth_texture(device, size, "g_depth")),
            scene_color: Arc::new(Texture::create_color_attachment(
                device,
                size,
                Self::SCENE_FORMAT,
                wgpu::FilterMode::Linear,
                "scene_color",
            )),
            scene_depth: Arc::new(Texture::create_depth_texture(device, size, "scene_depth")),
            ao_raw: Arc::new(Texture::create_color_attachment(
                device,
                size,
                Self::AO_FORMAT,
                wgpu::FilterMode::Nearest,
                "ssao_raw",
            )),
            ao_blur: Arc::new(Texture::create_color_attachment(
                device,
                size,
                Self::AO_FORMAT,
                wgpu::FilterMode::Nearest,
                "ssao_blur",
            )),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Drop and recreate every attachment for the new viewport size.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<(), FramebufferError> {
        *self = Self::new(device, width, height)?;
        Ok(())
    }

    /// Verify the attachments match the viewport before any pass writes.
    pub fn check(&self, width: u32, height: u32) -> Result<(), FramebufferError> {
        if self.width != width || self.height != height {
            return Err(FramebufferError::SizeMismatch {
                attachment: (self.width, self.height),
                viewport: (width, height),
            });
        }
        Ok(())
    }
}

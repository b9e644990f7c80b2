//! Scene graph and hierarchical scene organization.
//!
//! Nodes live in an index arena: every node owns an ordered list of child
//! ids while the parent link is a plain non-owning index. That keeps the
//! graph a forest by construction (no owning cycles) and makes reparenting
//! a matter of moving an id between two child lists.
//!
//! World transforms are cached per node and recomputed by
//! [`SceneGraph::update_world_transforms`], which must run before a
//! rendering traversal consumes them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::data_structures::geometry::Geometry;
use crate::data_structures::material::Material;
use crate::data_structures::transform::Transform;

/// Handle to a node inside a [`SceneGraph`].
///
/// Ids are invalidated when the node (or an ancestor) is removed; using a
/// stale id yields `UnknownNode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneGraphError {
    /// The requested reparent would make a node an ancestor of itself.
    /// The graph is left unchanged.
    InvalidHierarchy,
    /// The node id does not refer to a live node.
    UnknownNode,
}

impl fmt::Display for SceneGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneGraphError::InvalidHierarchy => {
                write!(f, "attaching a node as a descendant of itself")
            }
            SceneGraphError::UnknownNode => write!(f, "node id does not exist in this graph"),
        }
    }
}

impl std::error::Error for SceneGraphError {}

/// Renderable payload of a mesh node.
#[derive(Debug)]
pub struct MeshData {
    pub geometry: Arc<Geometry>,
    pub material: Rc<RefCell<Material>>,
    /// Per-node GPU slot for the world transform, written every frame
    /// before the passes run.
    pub transform_buffer: wgpu::Buffer,
}

#[derive(Debug)]
pub enum NodeKind {
    Group,
    Mesh(MeshData),
}

#[derive(Debug)]
pub struct Node {
    local: Transform,
    world: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    visible: bool,
    kind: NodeKind,
}

impl Node {
    fn new(parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            local: Transform::new(),
            world: Transform::new(),
            parent,
            children: Vec::new(),
            visible: true,
            kind,
        }
    }

    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// The cached world transform, valid after the last
    /// [`SceneGraph::update_world_transforms`].
    pub fn world_transform(&self) -> &Transform {
        &self.world
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            NodeKind::Group => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    roots: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// Add an empty group node under `parent` (or as a new root).
    pub fn add_group(&mut self, parent: Option<NodeId>) -> Result<NodeId, SceneGraphError> {
        self.add_node(parent, NodeKind::Group)
    }

    /// Add a mesh node under `parent` (or as a new root).
    ///
    /// Geometry and material are shared handles; the per-node transform
    /// buffer is created here and owned by the node.
    pub fn add_mesh(
        &mut self,
        device: &wgpu::Device,
        parent: Option<NodeId>,
        geometry: Arc<Geometry>,
        material: Rc<RefCell<Material>>,
    ) -> Result<NodeId, SceneGraphError> {
        let transform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{:?} Transform Buffer", geometry.name)),
            contents: bytemuck::cast_slice(&[Transform::new().to_raw()]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        self.add_node(
            parent,
            NodeKind::Mesh(MeshData {
                geometry,
                material,
                transform_buffer,
            }),
        )
    }

    fn add_node(
        &mut self,
        parent: Option<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, SceneGraphError> {
        if let Some(parent) = parent {
            if self.get(parent).is_none() {
                return Err(SceneGraphError::UnknownNode);
            }
        }
        let node = Node::new(parent, kind);
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        };
        match parent {
            Some(parent) => self
                .get_mut(parent)
                .expect("parent checked above")
                .children
                .push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Replace a node's local transform. Takes effect at the next
    /// [`Self::update_world_transforms`].
    pub fn set_local_transform(
        &mut self,
        id: NodeId,
        transform: Transform,
    ) -> Result<(), SceneGraphError> {
        let node = self.get_mut(id).ok_or(SceneGraphError::UnknownNode)?;
        node.local = transform;
        Ok(())
    }

    /// Show or hide a node. Hidden nodes prune their whole subtree from
    /// every traversal, so none of their meshes reach any pass.
    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> Result<(), SceneGraphError> {
        let node = self.get_mut(id).ok_or(SceneGraphError::UnknownNode)?;
        node.visible = visible;
        Ok(())
    }

    /// Move `id` under `new_parent` (or make it a root).
    ///
    /// The node is detached from its previous parent first. Attaching a
    /// node below itself is rejected with `InvalidHierarchy` before
    /// anything is mutated.
    pub fn reparent(
        &mut self,
        id: NodeId,
        new_parent: Option<NodeId>,
    ) -> Result<(), SceneGraphError> {
        if self.get(id).is_none() {
            return Err(SceneGraphError::UnknownNode);
        }
        if let Some(parent) = new_parent {
            if self.get(parent).is_none() {
                return Err(SceneGraphError::UnknownNode);
            }
            // Walk from the proposed parent to its root; finding `id` on
            // the way means the attach would close a cycle.
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == id {
                    return Err(SceneGraphError::InvalidHierarchy);
                }
                cursor = self.get(current).and_then(|node| node.parent);
            }
        }

        self.detach(id);
        match new_parent {
            Some(parent) => self
                .get_mut(parent)
                .expect("parent checked above")
                .children
                .push(id),
            None => self.roots.push(id),
        }
        self.get_mut(id).expect("node checked above").parent = new_parent;
        Ok(())
    }

    /// Remove a node and destroy its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), SceneGraphError> {
        if self.get(id).is_none() {
            return Err(SceneGraphError::UnknownNode);
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes[current.0].take() {
                stack.extend(node.children);
                self.free.push(current.0);
            }
        }
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        match self.get(id).and_then(|node| node.parent) {
            Some(parent) => {
                if let Some(parent) = self.get_mut(parent) {
                    parent.children.retain(|&child| child != id);
                }
            }
            None => self.roots.retain(|&root| root != id),
        }
    }

    /// Recompute every cached world transform in a pre-order walk.
    ///
    /// A root's world transform equals its local transform; every other
    /// node composes its parent's world transform with its own local one.
    pub fn update_world_transforms(&mut self) {
        let mut stack: Vec<(NodeId, Option<Transform>)> = self
            .roots
            .iter()
            .rev()
            .map(|&root| (root, None))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.get_mut(id) else {
                continue;
            };
            let world = match parent_world {
                Some(parent) => &parent * &node.local,
                None => node.local.clone(),
            };
            node.world = world.clone();
            let children = node.children.clone();
            for &child in children.iter().rev() {
                stack.push((child, Some(world.clone())));
            }
        }
    }

    /// Pre-order traversal over every visible node, pruning invisible
    /// subtrees. Lazy and restartable; each call starts a fresh walk.
    pub fn visible_nodes(&self) -> VisibleNodes<'_> {
        VisibleNodes {
            graph: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Lazy sequence of `(node, mesh, world transform)` for every visible
    /// mesh, in traversal order. World transforms are whatever the last
    /// [`Self::update_world_transforms`] computed.
    pub fn visible_meshes(&self) -> impl Iterator<Item = (NodeId, &MeshData, Transform)> {
        self.visible_nodes().filter_map(|id| {
            let node = self.get(id)?;
            node.mesh().map(|mesh| (id, mesh, node.world.clone()))
        })
    }
}

pub struct VisibleNodes<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for VisibleNodes<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Some(node) = self.graph.get(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            self.stack.extend(node.children.iter().rev().copied());
            return Some(id);
        }
        None
    }
}

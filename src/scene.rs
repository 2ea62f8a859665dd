use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::document::TransformDocument;
use crate::material::Material;
use crate::mesh::MeshBuffer;

/// Local transform of an imported node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Mat3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Mat3::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Builds a transform from the document form; the rotation is row-major.
    pub fn from_document(document: &TransformDocument) -> Self {
        let defaults = Self::default();
        Self {
            translation: document
                .translation
                .map(Vec3::from_array)
                .unwrap_or(defaults.translation),
            rotation: document
                .rotation
                .map(|rows| Mat3::from_cols_array(&rows).transpose())
                .unwrap_or(defaults.rotation),
            scale: document.scale.map(Vec3::from_array).unwrap_or(defaults.scale),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.translation)
            * Mat4::from_mat3(self.rotation)
            * Mat4::from_scale(self.scale)
    }
}

/// Receives the nodes an import produces.
pub trait NodeFactory {
    type Handle: Clone;

    fn create_node(&mut self, name: &str) -> Self::Handle;
    fn attach_child(&mut self, parent: &Self::Handle, child: &Self::Handle);
    fn set_transform(&mut self, node: &Self::Handle, transform: Transform);
    fn set_mesh(&mut self, node: &Self::Handle, mesh: MeshBuffer);
    fn set_material(&mut self, node: &Self::Handle, material: Material);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub mesh: Option<Arc<MeshBuffer>>,
    pub material: Option<Material>,
}

/// Shared node store; clones refer to the same nodes.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Arc<RwLock<Vec<SceneNode>>>,
}

impl Clone for SceneGraph {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
        }
    }
}

impl SceneGraph {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes created so far.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// True before any node has been created.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Returns a snapshot of all stored nodes.
    pub fn all_nodes(&self) -> Vec<SceneNode> {
        self.nodes.read().clone()
    }

    pub fn get(&self, id: NodeId) -> Option<SceneNode> {
        self.nodes.read().get(id.0).cloned()
    }

    /// Finds the first node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .read()
            .iter()
            .position(|node| node.name == name)
            .map(NodeId)
    }

    /// Applies a mutation to the requested node.
    pub fn update<F, R>(&self, id: NodeId, updater: F) -> Option<R>
    where
        F: FnOnce(&mut SceneNode) -> R,
    {
        let mut guard = self.nodes.write();
        let node = guard.get_mut(id.0)?;
        Some(updater(node))
    }

    /// Composes local transforms from the root down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let guard = self.nodes.read();
        let mut node = guard.get(id.0)?;
        let mut matrix = node.transform.to_matrix();
        while let Some(parent) = node.parent {
            node = guard.get(parent.0)?;
            matrix = node.transform.to_matrix() * matrix;
        }
        Some(matrix)
    }
}

impl NodeFactory for SceneGraph {
    type Handle = NodeId;

    fn create_node(&mut self, name: &str) -> NodeId {
        let mut guard = self.nodes.write();
        guard.push(SceneNode {
            name: name.to_string(),
            ..SceneNode::default()
        });
        NodeId(guard.len() - 1)
    }

    fn attach_child(&mut self, parent: &NodeId, child: &NodeId) {
        let mut guard = self.nodes.write();
        if parent.0 >= guard.len() || child.0 >= guard.len() {
            return;
        }
        if let Some(previous) = guard[child.0].parent.replace(*parent) {
            guard[previous.0].children.retain(|id| id != child);
        }
        guard[parent.0].children.push(*child);
    }

    fn set_transform(&mut self, node: &NodeId, transform: Transform) {
        self.update(*node, |n| n.transform = transform);
    }

    fn set_mesh(&mut self, node: &NodeId, mesh: MeshBuffer) {
        self.update(*node, |n| n.mesh = Some(Arc::new(mesh)));
    }

    fn set_material(&mut self, node: &NodeId, material: Material) {
        self.update(*node, |n| n.material = Some(material));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Shading;

    #[test]
    fn rotation_is_read_row_major() {
        let transform = Transform::from_document(&TransformDocument {
            translation: Some([1.0, 2.0, 3.0]),
            scale: None,
            rotation: Some([0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0]),
        });
        assert_eq!(transform.scale, Vec3::ONE);
        // Row-major 90 degree turn about Z maps X onto Y.
        assert!((transform.rotation * Vec3::X).abs_diff_eq(Vec3::Y, 1e-6));
        let point = transform.to_matrix().transform_point3(Vec3::X);
        assert!(point.abs_diff_eq(Vec3::new(1.0, 3.0, 3.0), 1e-6));
    }

    #[test]
    fn attach_and_compose_world_matrix() {
        let mut graph = SceneGraph::new();
        let root = graph.create_node("root");
        let child = graph.create_node("child");
        graph.attach_child(&root, &child);
        graph.set_transform(
            &root,
            Transform {
                translation: Vec3::new(0.0, 5.0, 0.0),
                ..Transform::default()
            },
        );
        graph.set_transform(
            &child,
            Transform {
                translation: Vec3::X,
                ..Transform::default()
            },
        );
        assert_eq!(graph.get(root).unwrap().children, vec![child]);
        let world = graph.world_matrix(child).unwrap();
        assert!(world
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(1.0, 5.0, 0.0), 1e-6));
    }

    #[test]
    fn reattaching_moves_the_child() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        let c = graph.create_node("c");
        graph.attach_child(&a, &c);
        graph.attach_child(&b, &c);
        assert!(graph.get(a).unwrap().children.is_empty());
        assert_eq!(graph.get(c).unwrap().parent, Some(b));
    }

    #[test]
    fn clones_share_nodes() {
        let mut graph = SceneGraph::new();
        let view = graph.clone();
        let node = graph.create_node("lamp");
        graph.set_material(&node, Material::default_for(Shading::Lit));
        assert_eq!(view.find("lamp"), Some(node));
        assert_eq!(view.get(node).unwrap().material.unwrap().name, "DefaultLit");
        assert!(view.update(NodeId(9), |_| ()).is_none());
    }
}

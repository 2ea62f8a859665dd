//! Importer for the compressed JSON scene format.
//!
//! A model document carries a spatial hierarchy, per-mesh vertex streams
//! packed as delta/zigzag encoded UTF-16 strings, and a material library.
//! The crate decodes those streams into typed attribute buffers and hands
//! the resulting nodes to a caller supplied [`NodeFactory`]. Rendering and
//! texture decoding stay outside of the crate so that imports remain
//! testable in headless tools.

pub mod animation;
pub mod codec;
pub mod config;
pub mod document;
pub mod error;
pub mod importer;
pub mod layers;
pub mod material;
pub mod mesh;
pub mod scene;

pub use animation::{AnimationClip, TransformChannel};
pub use codec::{decode_compressed, decode_indices, unzip, IndexBuffer, IndexFormat};
pub use config::CompressionConfig;
pub use error::{ImportError, Result};
pub use importer::{DocumentFetcher, FileFetcher, ImportedScene, Importer, ImporterOptions};
pub use layers::{parse_layers, LayerDescriptor, SourceDescriptor, TransitionDescriptor};
pub use material::{
    Material, MaterialLibrary, Shading, TextureHandle, TextureLoader, TextureRegistry,
};
pub use mesh::{build_mesh, AttributeKey, JointPalette, MeshBuffer, MeshKind};
pub use scene::{NodeFactory, NodeId, SceneGraph, SceneNode, Transform};

//! Serde model of the scene document.
//!
//! Spatial nodes keep their children and mesh data as raw JSON so a broken
//! node can be rejected without failing its siblings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top level of an exported scene file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    #[serde(rename = "UseCompression", default)]
    pub use_compression: bool,
    #[serde(rename = "CompressedVertsRange", default)]
    pub compressed_verts_range: Option<u32>,
    #[serde(rename = "CompressedColorsRange", default)]
    pub compressed_colors_range: Option<u32>,
    #[serde(rename = "CompressedUnitVectorRange", default)]
    pub compressed_unit_vector_range: Option<u32>,
    #[serde(rename = "Materials", default)]
    pub materials: Option<Vec<Option<MaterialDocument>>>,
    #[serde(rename = "Scene", default)]
    pub scene: Option<Value>,
}

/// A numeric stream: either a compressed string or a plain JSON array.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Compressed(String),
    Raw(Vec<T>),
}

impl<T> Payload<T> {
    pub fn is_compressed(&self) -> bool {
        matches!(self, Payload::Compressed(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpatialDocument {
    #[serde(rename = "Type")]
    pub node_type: String,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Children", default)]
    pub children: Vec<Value>,
    #[serde(rename = "MeshData", default)]
    pub mesh_data: Option<Value>,
    #[serde(rename = "Material", default)]
    pub material: Option<String>,
    #[serde(rename = "Transform", default)]
    pub transform: Option<TransformDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TransformDocument {
    #[serde(rename = "Translation", default)]
    pub translation: Option<[f32; 3]>,
    #[serde(rename = "Scale", default)]
    pub scale: Option<[f32; 3]>,
    /// Row-major 3x3 rotation.
    #[serde(rename = "Rotation", default)]
    pub rotation: Option<[f32; 9]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VertexOffsets {
    #[serde(rename = "xOffset")]
    pub x: f64,
    #[serde(rename = "yOffset")]
    pub y: f64,
    #[serde(rename = "zOffset")]
    pub z: f64,
}

/// One texture coordinate channel of a mesh.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TextureCoordsDocument {
    Compressed {
        #[serde(rename = "UVs")]
        uvs: String,
        #[serde(rename = "UVScales")]
        scales: Vec<f64>,
        #[serde(rename = "UVOffsets")]
        offsets: Vec<f64>,
    },
    Raw(Vec<f64>),
}

/// Primitive topology of one index run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexMode {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
    Lines,
    LineStrip,
    LineLoop,
    Points,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeshDescriptor {
    #[serde(rename = "VertexCount", default)]
    pub vertex_count: usize,
    #[serde(rename = "Vertices", default)]
    pub vertices: Option<Payload<f64>>,
    #[serde(rename = "VertexScale", default)]
    pub vertex_scale: Option<f64>,
    #[serde(rename = "VertexOffsets", default)]
    pub vertex_offsets: Option<VertexOffsets>,
    #[serde(rename = "Normals", default)]
    pub normals: Option<Payload<f64>>,
    #[serde(rename = "Tangents", default)]
    pub tangents: Option<Payload<f64>>,
    #[serde(rename = "Colors", default)]
    pub colors: Option<Payload<f64>>,
    #[serde(rename = "Weights", default)]
    pub weights: Option<Payload<f64>>,
    #[serde(rename = "Joints", default)]
    pub joints: Option<Payload<u32>>,
    #[serde(rename = "TextureCoords", default)]
    pub texture_coords: Option<Vec<TextureCoordsDocument>>,
    #[serde(rename = "Indices", default)]
    pub indices: Option<Payload<u32>>,
    #[serde(rename = "IndexModes", default)]
    pub index_modes: Option<Vec<IndexMode>>,
    #[serde(rename = "IndexLengths", default)]
    pub index_lengths: Option<Vec<usize>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialDocument {
    #[serde(rename = "MaterialName", default)]
    pub material_name: Option<String>,
    #[serde(rename = "Profile", default)]
    pub profile: Option<String>,
    #[serde(rename = "Technique", default)]
    pub technique: Option<String>,
    #[serde(rename = "UsesTransparency", default)]
    pub uses_transparency: bool,
    #[serde(rename = "AmbientColor", default)]
    pub ambient_color: Option<String>,
    #[serde(rename = "DiffuseColor", default)]
    pub diffuse_color: Option<String>,
    #[serde(rename = "EmissiveColor", default)]
    pub emissive_color: Option<String>,
    #[serde(rename = "SpecularColor", default)]
    pub specular_color: Option<String>,
    #[serde(rename = "Shininess", default)]
    pub shininess: Option<f32>,
    #[serde(rename = "TextureEntries", default)]
    pub texture_entries: Vec<TextureEntryDocument>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextureEntryDocument {
    #[serde(rename = "Slot")]
    pub slot: String,
    #[serde(rename = "TextureReference", default)]
    pub texture_reference: Option<String>,
    #[serde(rename = "TextureSource", default)]
    pub texture_source: Option<String>,
    #[serde(rename = "MinificationFilter", default)]
    pub minification_filter: Option<String>,
    #[serde(rename = "Flip", default)]
    pub flip: Option<bool>,
}

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codec::{code_units, decode_compressed, decode_indices, IndexBuffer, IndexFormat};
use crate::config::CompressionConfig;
use crate::document::{IndexMode, MeshDescriptor, Payload, TextureCoordsDocument};
use crate::error::{ImportError, Result};

/// Storage hint used for joint index streams.
const JOINT_CAPACITY_HINT: usize = 32_767;
const DEFAULT_INDEX_MODES: &[IndexMode] = &[IndexMode::Triangles];

/// Names one vertex attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttributeKey {
    Position,
    Normal,
    Tangent,
    Color,
    Weights,
    JointIds,
    TexCoord(usize),
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::Position => f.write_str("POSITION"),
            AttributeKey::Normal => f.write_str("NORMAL"),
            AttributeKey::Tangent => f.write_str("TANGENT"),
            AttributeKey::Color => f.write_str("COLOR"),
            AttributeKey::Weights => f.write_str("WEIGHTS"),
            AttributeKey::JointIds => f.write_str("JOINTIDS"),
            AttributeKey::TexCoord(channel) => write!(f, "TEXCOORD{channel}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentType {
    Float,
    Short,
}

/// Shape of one vertex attribute stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    pub key: AttributeKey,
    pub component_count: usize,
    pub component_type: ComponentType,
}

impl AttributeDescriptor {
    /// Describes an attribute with an explicit component type.
    pub const fn new(key: AttributeKey, component_count: usize, component_type: ComponentType) -> Self {
        Self {
            key,
            component_count,
            component_type,
        }
    }

    /// Shorthand for a `Float` attribute.
    pub const fn float(key: AttributeKey, component_count: usize) -> Self {
        Self::new(key, component_count, ComponentType::Float)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeData {
    Float(Vec<f32>),
    Short(Vec<u16>),
}

impl AttributeData {
    /// Number of scalar components stored, not vertices.
    pub fn len(&self) -> usize {
        match self {
            Self::Float(values) => values.len(),
            Self::Short(values) => values.len(),
        }
    }

    /// True when no components were decoded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes ready for a GPU upload.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Float(values) => bytemuck::cast_slice(values),
            Self::Short(values) => bytemuck::cast_slice(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub descriptor: AttributeDescriptor,
    pub data: AttributeData,
}

/// Compact renumbering of the skeleton joints a skinned mesh references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointPalette {
    globals: Vec<u32>,
}

impl JointPalette {
    /// Rewrites `ids` to local indices in first-seen order and returns the
    /// table mapping each local index back to its skeleton joint.
    pub fn remap(ids: &mut [u32]) -> Self {
        let mut globals = Vec::new();
        let mut lookup: HashMap<u32, u32> = HashMap::new();
        for id in ids.iter_mut() {
            let next = globals.len() as u32;
            let local = *lookup.entry(*id).or_insert_with(|| {
                globals.push(*id);
                next
            });
            *id = local;
        }
        Self { globals }
    }

    /// Skeleton joint for a local palette index.
    pub fn global(&self, local: usize) -> Option<u32> {
        self.globals.get(local).copied()
    }

    /// Skeleton joints indexed by local palette index.
    pub fn as_slice(&self) -> &[u32] {
        &self.globals
    }

    /// Number of distinct joints referenced.
    pub fn len(&self) -> usize {
        self.globals.len()
    }

    /// True for a mesh that references no joints.
    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }
}

/// A contiguous range of the index buffer drawn with one topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRun {
    pub mode: IndexMode,
    pub length: usize,
}

/// Whether joint ids are renumbered into a per-mesh palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshKind {
    Rigid,
    Skinned,
}

impl MeshKind {
    /// Weight components stored per vertex; zero for rigid meshes.
    pub fn weights_per_vertex(self) -> usize {
        match self {
            MeshKind::Rigid => 0,
            MeshKind::Skinned => 4,
        }
    }
}

/// Decoded vertex streams and indices of one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshBuffer {
    pub vertex_count: usize,
    pub attributes: BTreeMap<AttributeKey, VertexAttribute>,
    pub indices: Option<IndexBuffer>,
    pub index_format: IndexFormat,
    pub index_runs: Vec<IndexRun>,
    pub joint_palette: Option<JointPalette>,
}

impl MeshBuffer {
    /// Creates a mesh with no streams stored yet.
    fn empty(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            attributes: BTreeMap::new(),
            indices: None,
            index_format: IndexFormat::for_capacity(vertex_count),
            index_runs: Vec::new(),
            joint_palette: None,
        }
    }

    /// Returns the stored attribute for `key`, if the mesh has one.
    pub fn attribute(&self, key: AttributeKey) -> Option<&VertexAttribute> {
        self.attributes.get(&key)
    }

    /// Returns the values of a float attribute.
    pub fn floats(&self, key: AttributeKey) -> Option<&[f32]> {
        match &self.attributes.get(&key)?.data {
            AttributeData::Float(values) => Some(values),
            AttributeData::Short(_) => None,
        }
    }

    /// Returns the values of a short attribute.
    pub fn shorts(&self, key: AttributeKey) -> Option<&[u16]> {
        match &self.attributes.get(&key)?.data {
            AttributeData::Short(values) => Some(values),
            AttributeData::Float(_) => None,
        }
    }

    /// Iterates the descriptors of every stored attribute in key order.
    pub fn descriptors(&self) -> impl Iterator<Item = &AttributeDescriptor> {
        self.attributes.values().map(|attribute| &attribute.descriptor)
    }

    /// Number of decoded indices, zero for non-indexed meshes.
    pub fn index_count(&self) -> usize {
        self.indices.as_ref().map_or(0, IndexBuffer::len)
    }

    fn store_floats(
        &mut self,
        layout: &[AttributeDescriptor],
        key: AttributeKey,
        values: Vec<f32>,
    ) -> Result<()> {
        let Some(descriptor) = declared(layout, key) else {
            return Ok(());
        };
        if descriptor.component_type != ComponentType::Float {
            return Err(ImportError::malformed(format!("{key} does not hold floats")));
        }
        self.store(descriptor, AttributeData::Float(values))
    }

    fn store_shorts(
        &mut self,
        layout: &[AttributeDescriptor],
        key: AttributeKey,
        values: &[u32],
    ) -> Result<()> {
        let Some(descriptor) = declared(layout, key) else {
            return Ok(());
        };
        if descriptor.component_type != ComponentType::Short {
            return Err(ImportError::malformed(format!("{key} does not hold shorts")));
        }
        let values = values.iter().map(|value| *value as u16).collect();
        self.store(descriptor, AttributeData::Short(values))
    }

    /// Keeps a decoded stream at its own length, which may not exceed
    /// `vertex_count` tuples.
    fn store(&mut self, descriptor: AttributeDescriptor, data: AttributeData) -> Result<()> {
        let capacity = buffer_capacity(self.vertex_count, &descriptor)?;
        if data.len() > capacity {
            return Err(ImportError::BufferOverflow {
                attribute: descriptor.key.to_string(),
                capacity,
                actual: data.len(),
            });
        }
        if data.len() < capacity {
            debug!(
                "{} stream fills {} of {capacity} values",
                descriptor.key,
                data.len()
            );
        }
        self.attributes
            .insert(descriptor.key, VertexAttribute { descriptor, data });
        Ok(())
    }
}

fn declared(layout: &[AttributeDescriptor], key: AttributeKey) -> Option<AttributeDescriptor> {
    layout.iter().find(|descriptor| descriptor.key == key).copied()
}

fn buffer_capacity(vertex_count: usize, descriptor: &AttributeDescriptor) -> Result<usize> {
    vertex_count
        .checked_mul(descriptor.component_count)
        .ok_or_else(|| {
            ImportError::malformed(format!(
                "VertexCount {vertex_count} overflows the {} buffer",
                descriptor.key
            ))
        })
}

/// Lists the attributes a descriptor declares, in buffer order.
pub fn attribute_layout(descriptor: &MeshDescriptor, weights_per_vertex: usize) -> Vec<AttributeDescriptor> {
    let mut layout = Vec::new();
    if descriptor.vertices.is_some() {
        layout.push(AttributeDescriptor::float(AttributeKey::Position, 3));
    }
    if descriptor.normals.is_some() {
        layout.push(AttributeDescriptor::float(AttributeKey::Normal, 3));
    }
    if descriptor.tangents.is_some() {
        layout.push(AttributeDescriptor::float(AttributeKey::Tangent, 4));
    }
    if descriptor.colors.is_some() {
        layout.push(AttributeDescriptor::float(AttributeKey::Color, 4));
    }
    if weights_per_vertex > 0 && descriptor.weights.is_some() {
        layout.push(AttributeDescriptor::float(AttributeKey::Weights, 4));
    }
    if weights_per_vertex > 0 && descriptor.joints.is_some() {
        layout.push(AttributeDescriptor::new(
            AttributeKey::JointIds,
            4,
            ComponentType::Short,
        ));
    }
    if let Some(channels) = &descriptor.texture_coords {
        for channel in 0..channels.len() {
            layout.push(AttributeDescriptor::float(AttributeKey::TexCoord(channel), 2));
        }
    }
    layout
}

/// Builds the mesh buffer a descriptor declares.
///
/// Returns `Ok(None)` when the descriptor has no vertices, which tells the
/// caller to skip the node rather than fail.
pub fn build_mesh(
    descriptor: &MeshDescriptor,
    weights_per_vertex: usize,
    kind: MeshKind,
    config: &CompressionConfig,
) -> Result<Option<MeshBuffer>> {
    let vertex_count = descriptor.vertex_count;
    if vertex_count == 0 {
        return Ok(None);
    }

    let layout = attribute_layout(descriptor, weights_per_vertex);
    for attribute in &layout {
        buffer_capacity(vertex_count, attribute)?;
    }
    let mut mesh = MeshBuffer::empty(vertex_count);

    if let Some(payload) = &descriptor.vertices {
        let values = if config.enabled {
            let scale = descriptor
                .vertex_scale
                .ok_or_else(|| ImportError::malformed("compressed vertices without VertexScale"))?;
            let offsets = descriptor
                .vertex_offsets
                .ok_or_else(|| ImportError::malformed("compressed vertices without VertexOffsets"))?;
            decode_floats(
                AttributeKey::Position,
                payload,
                config,
                &[scale; 3],
                &[offsets.x, offsets.y, offsets.z],
            )?
        } else {
            decode_floats(AttributeKey::Position, payload, config, &[], &[])?
        };
        mesh.store_floats(&layout, AttributeKey::Position, values)?;
    }

    if let Some(payload) = &descriptor.weights {
        if declared(&layout, AttributeKey::Weights).is_some() {
            // Weights are packed as a single running lane.
            let values = decode_floats(
                AttributeKey::Weights,
                payload,
                config,
                &[config.weight_scale()],
                &[0.0],
            )?;
            mesh.store_floats(&layout, AttributeKey::Weights, values)?;
        } else {
            debug!("ignoring weights on a mesh without skin weights");
        }
    }

    let (unit_offset, unit_scale) = config.unit_vector_transform();
    if let Some(payload) = &descriptor.normals {
        let values = decode_floats(
            AttributeKey::Normal,
            payload,
            config,
            &[unit_scale; 3],
            &[unit_offset; 3],
        )?;
        mesh.store_floats(&layout, AttributeKey::Normal, values)?;
    }
    if let Some(payload) = &descriptor.tangents {
        let values = decode_floats(
            AttributeKey::Tangent,
            payload,
            config,
            &[unit_scale; 4],
            &[unit_offset; 4],
        )?;
        mesh.store_floats(&layout, AttributeKey::Tangent, values)?;
    }

    if let Some(payload) = &descriptor.colors {
        let values = decode_floats(
            AttributeKey::Color,
            payload,
            config,
            &[config.color_scale(); 4],
            &[0.0; 4],
        )?;
        mesh.store_floats(&layout, AttributeKey::Color, values)?;
    }

    if let Some(channels) = &descriptor.texture_coords {
        for (channel, coords) in channels.iter().enumerate() {
            let key = AttributeKey::TexCoord(channel);
            let values = match (config.enabled, coords) {
                (true, TextureCoordsDocument::Compressed { uvs, scales, offsets }) => {
                    decode_compressed(&code_units(uvs), scales.len(), scales, offsets)?
                }
                (false, TextureCoordsDocument::Raw(values)) => to_f32(values),
                _ => return Err(payload_mismatch(key, config)),
            };
            mesh.store_floats(&layout, key, values)?;
        }
    }

    if let Some(payload) = &descriptor.joints {
        if declared(&layout, AttributeKey::JointIds).is_some() {
            let mut joints =
                decode_unsigned(AttributeKey::JointIds, payload, config, JOINT_CAPACITY_HINT)?;
            if kind == MeshKind::Skinned {
                let palette = JointPalette::remap(&mut joints.values);
                debug!("joint palette maps {} local joints", palette.len());
                mesh.joint_palette = Some(palette);
            }
            mesh.store_shorts(&layout, AttributeKey::JointIds, &joints.values)?;
        } else {
            debug!("ignoring joint ids on a mesh without skin weights");
        }
    }

    if let Some(payload) = &descriptor.indices {
        mesh.indices = Some(decode_unsigned("INDICES", payload, config, vertex_count)?);
    }

    let span = match &mesh.indices {
        Some(indices) => indices.len(),
        None => vertex_count,
    };
    mesh.index_runs = index_runs(
        descriptor.index_modes.as_deref(),
        descriptor.index_lengths.as_deref(),
        span,
    )?;

    Ok(Some(mesh))
}

fn decode_floats(
    key: AttributeKey,
    payload: &Payload<f64>,
    config: &CompressionConfig,
    scales: &[f64],
    offsets: &[f64],
) -> Result<Vec<f32>> {
    match (config.enabled, payload) {
        (true, Payload::Compressed(packed)) => {
            decode_compressed(&code_units(packed), scales.len(), scales, offsets)
        }
        (false, Payload::Raw(values)) => Ok(to_f32(values)),
        _ => Err(payload_mismatch(key, config)),
    }
}

fn decode_unsigned(
    key: impl fmt::Display,
    payload: &Payload<u32>,
    config: &CompressionConfig,
    capacity_hint: usize,
) -> Result<IndexBuffer> {
    match (config.enabled, payload) {
        (true, Payload::Compressed(packed)) => Ok(decode_indices(&code_units(packed), capacity_hint)),
        (false, Payload::Raw(values)) => Ok(IndexBuffer::from_raw(values.clone(), capacity_hint)),
        _ => Err(payload_mismatch(key, config)),
    }
}

fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|value| *value as f32).collect()
}

fn payload_mismatch(key: impl fmt::Display, config: &CompressionConfig) -> ImportError {
    let expected = if config.enabled {
        "a compressed string"
    } else {
        "a plain array"
    };
    ImportError::malformed(format!("{key} stream should be {expected}"))
}

fn index_runs(
    modes: Option<&[IndexMode]>,
    lengths: Option<&[usize]>,
    span: usize,
) -> Result<Vec<IndexRun>> {
    let modes = match modes {
        Some(modes) if !modes.is_empty() => modes,
        _ => DEFAULT_INDEX_MODES,
    };
    let Some(lengths) = lengths else {
        if modes.len() > 1 {
            return Err(ImportError::malformed(
                "several index modes declared without IndexLengths",
            ));
        }
        return Ok(vec![IndexRun {
            mode: modes[0],
            length: span,
        }]);
    };

    if modes.len() != 1 && modes.len() != lengths.len() {
        return Err(ImportError::malformed(format!(
            "{} index modes do not match {} index lengths",
            modes.len(),
            lengths.len()
        )));
    }
    let total: usize = lengths.iter().sum();
    if total > span {
        return Err(ImportError::malformed(format!(
            "index runs cover {total} entries but only {span} exist"
        )));
    }
    Ok(lengths
        .iter()
        .enumerate()
        .map(|(i, length)| IndexRun {
            mode: if modes.len() == 1 { modes[0] } else { modes[i] },
            length: *length,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::{compress, compress_indices};

    fn descriptor(json: &str) -> MeshDescriptor {
        serde_json::from_str(json).unwrap()
    }

    fn compressed() -> CompressionConfig {
        CompressionConfig {
            enabled: true,
            ..CompressionConfig::default()
        }
    }

    #[test]
    fn zero_vertices_yield_no_mesh() {
        let desc = descriptor(r#"{"VertexCount": 0, "Vertices": [1, 2, 3]}"#);
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &CompressionConfig::default()).unwrap();
        assert!(mesh.is_none());
    }

    #[test]
    fn raw_positions_pass_through() {
        let desc = descriptor(
            r#"{"VertexCount": 3, "Vertices": [0, 0, 0, 1.5, 0, 0, 0, 2.25, -1]}"#,
        );
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &CompressionConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(
            mesh.floats(AttributeKey::Position).unwrap(),
            &[0.0, 0.0, 0.0, 1.5, 0.0, 0.0, 0.0, 2.25, -1.0]
        );
        assert_eq!(mesh.attributes.len(), 1);
        assert_eq!(
            mesh.index_runs,
            vec![IndexRun {
                mode: IndexMode::Triangles,
                length: 3
            }]
        );
    }

    #[test]
    fn layout_skips_skin_streams_for_rigid_meshes() {
        let desc = descriptor(
            r#"{"VertexCount": 1, "Vertices": [0,0,0], "Weights": [1,0,0,0],
                "Joints": [0,0,0,0], "TextureCoords": [[0, 0], [1, 1]]}"#,
        );
        let keys: Vec<AttributeKey> = attribute_layout(&desc, 0).iter().map(|d| d.key).collect();
        assert_eq!(
            keys,
            vec![
                AttributeKey::Position,
                AttributeKey::TexCoord(0),
                AttributeKey::TexCoord(1)
            ]
        );
        let skinned: Vec<AttributeKey> = attribute_layout(&desc, 4).iter().map(|d| d.key).collect();
        assert!(skinned.contains(&AttributeKey::JointIds));
        assert_eq!(AttributeKey::TexCoord(1).to_string(), "TEXCOORD1");
    }

    #[test]
    fn compressed_positions_use_document_scale_and_offsets() {
        let scale = 0.25;
        let values = [1.0, 2.0, 3.0, -1.0, 0.5, 4.0];
        let packed = compress(&values, 3, &[scale; 3], &[10.0, 0.0, -4.0]);
        let json = serde_json::json!({
            "VertexCount": 2,
            "Vertices": packed,
            "VertexScale": scale,
            "VertexOffsets": {"xOffset": 10.0, "yOffset": 0.0, "zOffset": -4.0}
        });
        let desc: MeshDescriptor = serde_json::from_value(json).unwrap();
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &compressed()).unwrap().unwrap();
        assert_eq!(
            mesh.floats(AttributeKey::Position).unwrap(),
            &[1.0, 2.0, 3.0, -1.0, 0.5, 4.0]
        );
    }

    #[test]
    fn compressed_normals_use_unit_vector_range() {
        let config = compressed();
        let (offset, scale) = config.unit_vector_transform();
        let values = [0.0, 1.0, 0.0, -1.0, 0.0, 0.0];
        let packed = compress(&values, 3, &[scale; 3], &[offset; 3]);
        let desc: MeshDescriptor =
            serde_json::from_value(serde_json::json!({"VertexCount": 2, "Normals": packed})).unwrap();
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &config).unwrap().unwrap();
        let normals = mesh.floats(AttributeKey::Normal).unwrap();
        for (expected, actual) in values.iter().zip(normals) {
            assert!((*expected as f32 - actual).abs() < 1e-6);
        }
    }

    #[test]
    fn compressed_colors_scale_by_color_range() {
        let config = compressed();
        let scale = config.color_scale();
        let values = [255.0, 0.0, 128.0, 255.0];
        let packed = compress(&values, 4, &[scale; 4], &[0.0; 4]);
        let desc: MeshDescriptor =
            serde_json::from_value(serde_json::json!({"VertexCount": 1, "Colors": packed})).unwrap();
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &config).unwrap().unwrap();
        let colors = mesh.floats(AttributeKey::Color).unwrap();
        for (expected, actual) in values.iter().zip(colors) {
            assert!((expected - f64::from(*actual)).abs() <= scale / 2.0);
        }
    }

    #[test]
    fn joint_palette_renumbers_in_first_seen_order() {
        let mut ids = vec![7, 3, 7, 9];
        let palette = JointPalette::remap(&mut ids);
        assert_eq!(ids, vec![0, 1, 0, 2]);
        assert_eq!(palette.as_slice(), &[7, 3, 9]);
        assert_eq!(palette.global(2), Some(9));
        assert_eq!(palette.global(3), None);
    }

    #[test]
    fn skinned_mesh_exposes_palette() {
        let desc = descriptor(
            r#"{"VertexCount": 1, "Vertices": [0,0,0], "Weights": [0.5,0.5,0,0],
                "Joints": [7, 3, 7, 9]}"#,
        );
        let mesh = build_mesh(&desc, 4, MeshKind::Skinned, &CompressionConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(mesh.shorts(AttributeKey::JointIds).unwrap(), &[0, 1, 0, 2]);
        assert_eq!(mesh.joint_palette.unwrap().as_slice(), &[7, 3, 9]);
    }

    #[test]
    fn rigid_mesh_with_weights_keeps_global_joints() {
        let desc = descriptor(r#"{"VertexCount": 1, "Joints": [7, 3, 7, 9]}"#);
        let mesh = build_mesh(&desc, 4, MeshKind::Rigid, &CompressionConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(mesh.shorts(AttributeKey::JointIds).unwrap(), &[7, 3, 7, 9]);
        assert!(mesh.joint_palette.is_none());
    }

    #[test]
    fn compressed_indices_and_runs() {
        let packed = compress_indices(&[0, 1, 2, 2, 1, 3, 0, 3]);
        let json = serde_json::json!({
            "VertexCount": 4,
            "Indices": packed,
            "IndexModes": ["Triangles", "Lines"],
            "IndexLengths": [6, 2]
        });
        let desc: MeshDescriptor = serde_json::from_value(json).unwrap();
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &compressed()).unwrap().unwrap();
        assert_eq!(mesh.indices.as_ref().unwrap().values, vec![0, 1, 2, 2, 1, 3, 0, 3]);
        assert_eq!(mesh.index_format, IndexFormat::U8);
        assert_eq!(mesh.index_count(), 8);
        assert_eq!(mesh.index_runs[1].mode, IndexMode::Lines);
        assert_eq!(mesh.index_runs[1].length, 2);
    }

    #[test]
    fn single_mode_spans_every_run() {
        let strip = [IndexMode::TriangleStrip];
        let runs = index_runs(Some(&strip[..]), Some(&[4, 4][..]), 8).unwrap();
        assert!(runs.iter().all(|run| run.mode == IndexMode::TriangleStrip));
        assert!(index_runs(None, Some(&[4, 5][..]), 8).is_err());
        let mixed = [IndexMode::Points, IndexMode::Lines];
        assert!(index_runs(Some(&mixed[..]), None, 8).is_err());
    }

    #[test]
    fn oversized_stream_is_rejected() {
        let desc = descriptor(r#"{"VertexCount": 1, "Vertices": [0,0,0,1,1,1]}"#);
        let err = build_mesh(&desc, 0, MeshKind::Rigid, &CompressionConfig::default()).unwrap_err();
        assert!(matches!(err, ImportError::BufferOverflow { capacity: 3, actual: 6, .. }));
    }

    #[test]
    fn raw_payload_in_compressed_document_is_malformed() {
        let desc = descriptor(r#"{"VertexCount": 1, "Normals": [0, 1, 0]}"#);
        let err = build_mesh(&desc, 0, MeshKind::Rigid, &compressed()).unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument(_)));
    }

    #[test]
    fn float_bytes_cover_every_component() {
        let desc = descriptor(r#"{"VertexCount": 2, "Vertices": [0,0,0,1,1,1]}"#);
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &CompressionConfig::default())
            .unwrap()
            .unwrap();
        let position = mesh.attribute(AttributeKey::Position).unwrap();
        assert_eq!(position.data.as_bytes().len(), 24);
    }

    #[test]
    fn overflowing_vertex_count_is_malformed() {
        let desc = descriptor(r#"{"VertexCount": 9000000000000000000, "Vertices": [0, 0, 0]}"#);
        let err = build_mesh(&desc, 0, MeshKind::Rigid, &CompressionConfig::default()).unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument(_)));
    }

    #[test]
    fn short_stream_keeps_its_decoded_length() {
        let desc = descriptor(r#"{"VertexCount": 1000000000000, "Vertices": [1, 2, 3]}"#);
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &CompressionConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(mesh.floats(AttributeKey::Position).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(mesh.index_format, IndexFormat::U32);
    }

    #[test]
    fn rigid_mesh_skips_weight_streams() {
        // A plain array in a compressed document would be malformed if decoded.
        let desc = descriptor(r#"{"VertexCount": 1, "Weights": [1, 0, 0, 0]}"#);
        let mesh = build_mesh(&desc, 0, MeshKind::Rigid, &compressed()).unwrap().unwrap();
        assert!(mesh.attribute(AttributeKey::Weights).is_none());
        assert_eq!(mesh.attributes.len(), 0);
    }
}

use serde::{Deserialize, Serialize};

use crate::document::Document;

pub const DEFAULT_VERTS_RANGE: u32 = (1 << 14) - 1;
pub const DEFAULT_COLORS_RANGE: u32 = (1 << 8) - 1;
pub const DEFAULT_UNIT_VECTOR_RANGE: u32 = (1 << 10) - 1;

/// Quantization ranges shared by every stream of one imported document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub verts_range: u32,
    pub colors_range: u32,
    pub unit_vector_range: u32,
    pub enabled: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            verts_range: DEFAULT_VERTS_RANGE,
            colors_range: DEFAULT_COLORS_RANGE,
            unit_vector_range: DEFAULT_UNIT_VECTOR_RANGE,
            enabled: false,
        }
    }
}

impl CompressionConfig {
    /// Reads the header fields, falling back to the default ranges.
    pub fn from_document(document: &Document) -> Self {
        if !document.use_compression {
            return Self::default();
        }
        // A zero range in the header means "unset", same as a missing field.
        let pick = |value: Option<u32>, default: u32| value.filter(|v| *v != 0).unwrap_or(default);
        Self {
            verts_range: pick(document.compressed_verts_range, DEFAULT_VERTS_RANGE),
            colors_range: pick(document.compressed_colors_range, DEFAULT_COLORS_RANGE),
            unit_vector_range: pick(
                document.compressed_unit_vector_range,
                DEFAULT_UNIT_VECTOR_RANGE,
            ),
            enabled: true,
        }
    }

    /// Offset and scale shared by every lane of a unit-vector stream.
    pub fn unit_vector_transform(&self) -> (f64, f64) {
        let offset = 1.0 - f64::from((self.unit_vector_range + 1) >> 1);
        (offset, 1.0 / -offset)
    }

    pub fn weight_scale(&self) -> f64 {
        1.0 / f64::from(self.verts_range)
    }

    pub fn color_scale(&self) -> f64 {
        255.0 / (f64::from(self.colors_range) + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(json: &str) -> Document {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn uncompressed_documents_keep_defaults() {
        let config = CompressionConfig::from_document(&document(
            r#"{"UseCompression": false, "CompressedVertsRange": 7}"#,
        ));
        assert!(!config.enabled);
        assert_eq!(config.verts_range, DEFAULT_VERTS_RANGE);
    }

    #[test]
    fn compressed_header_overrides_ranges() {
        let config = CompressionConfig::from_document(&document(
            r#"{"UseCompression": true, "CompressedColorsRange": 127}"#,
        ));
        assert!(config.enabled);
        assert_eq!(config.colors_range, 127);
        assert_eq!(config.verts_range, 16383);
        assert_eq!(config.unit_vector_range, 1023);
    }

    #[test]
    fn unit_vector_transform_matches_range() {
        let config = CompressionConfig::default();
        let (offset, scale) = config.unit_vector_transform();
        assert_eq!(offset, -511.0);
        assert_eq!(scale, 1.0 / 511.0);
        assert_eq!(config.color_scale(), 255.0 / 256.0);
    }
}

//! Decoding of joint animation channels.
//!
//! Channels either broadcast a uniform value, carry a compressed stream, or
//! list raw samples where `"*"` repeats the previous sample.

use glam::{Quat, Vec3};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::{code_units, decode_compressed};
use crate::config::CompressionConfig;
use crate::document::Payload;
use crate::error::{ImportError, Result};

const REPEAT_MARKER: &str = "*";

/// One slot of a raw sample array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SampleSlot {
    Tuple(Vec<f64>),
    Marker(String),
    Other(Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SamplePayload {
    Compressed(String),
    Raw(Vec<SampleSlot>),
}

/// Serialized form of one animated joint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelDescriptor {
    #[serde(rename = "JointName", alias = "ChannelName", default)]
    pub name: Option<String>,
    #[serde(rename = "Size", default)]
    pub size: Option<usize>,
    #[serde(rename = "Times", default)]
    pub times: Option<Payload<f64>>,
    #[serde(rename = "TimeScale", default)]
    pub time_scale: Option<f64>,
    #[serde(rename = "TimeOffset", default)]
    pub time_offset: Option<f64>,
    #[serde(rename = "Translations", default)]
    pub translations: Option<SamplePayload>,
    #[serde(rename = "TranslationScale", default)]
    pub translation_scale: Option<f64>,
    #[serde(rename = "TranslationOffsets", default)]
    pub translation_offsets: Option<[f64; 3]>,
    #[serde(rename = "Rotations", default)]
    pub rotations: Option<SamplePayload>,
    #[serde(rename = "Scales", default)]
    pub scales: Option<SamplePayload>,
    #[serde(rename = "ScaleScale", default)]
    pub scale_scale: Option<f64>,
    #[serde(rename = "ScaleOffsets", default)]
    pub scale_offsets: Option<[f64; 3]>,
    #[serde(rename = "UniformTranslation", default)]
    pub uniform_translation: Option<[f32; 3]>,
    #[serde(rename = "UniformRotation", default)]
    pub uniform_rotation: Option<[f32; 4]>,
    #[serde(rename = "UniformScale", default)]
    pub uniform_scale: Option<[f32; 3]>,
}

impl ChannelDescriptor {
    /// Number of samples in the channel: `Size` when given, else the time count.
    pub fn sample_count(&self) -> usize {
        if let Some(size) = self.size {
            return size;
        }
        match &self.times {
            Some(Payload::Compressed(packed)) => packed.encode_utf16().count(),
            Some(Payload::Raw(times)) => times.len(),
            None => 0,
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

pub fn decode_times(channel: &ChannelDescriptor, config: &CompressionConfig) -> Result<Vec<f32>> {
    let Some(times) = &channel.times else {
        return Ok(Vec::new());
    };
    match (config.enabled, times) {
        (true, Payload::Compressed(packed)) => decode_compressed(
            &code_units(packed),
            1,
            &[channel.time_scale.unwrap_or(1.0)],
            &[channel.time_offset.unwrap_or(0.0)],
        ),
        (false, Payload::Raw(values)) => Ok(values.iter().map(|t| *t as f32).collect()),
        _ => Err(payload_mismatch(channel.label(), "Times", config)),
    }
}

pub fn decode_translations(
    channel: &ChannelDescriptor,
    config: &CompressionConfig,
) -> Result<Vec<Vec3>> {
    if let Some(uniform) = channel.uniform_translation {
        return broadcast(channel, "UniformTranslation", Vec3::from_array(uniform));
    }
    let Some(payload) = &channel.translations else {
        return Ok(Vec::new());
    };
    let scale = channel.translation_scale.unwrap_or(1.0);
    let offsets = channel.translation_offsets.unwrap_or([0.0; 3]);
    let tuples = decode_samples::<3>(channel, "Translations", payload, config, &[scale; 3], &offsets)?;
    Ok(tuples.into_iter().map(Vec3::from_array).collect())
}

/// Rotations are unit quaternions stored `x, y, z, w`.
pub fn decode_rotations(
    channel: &ChannelDescriptor,
    config: &CompressionConfig,
) -> Result<Vec<Quat>> {
    if let Some(uniform) = channel.uniform_rotation {
        return broadcast(channel, "UniformRotation", Quat::from_array(uniform));
    }
    let Some(payload) = &channel.rotations else {
        return Ok(Vec::new());
    };
    let (offset, scale) = config.unit_vector_transform();
    let tuples = decode_samples::<4>(channel, "Rotations", payload, config, &[scale; 4], &[offset; 4])?;
    Ok(tuples.into_iter().map(Quat::from_array).collect())
}

pub fn decode_scales(channel: &ChannelDescriptor, config: &CompressionConfig) -> Result<Vec<Vec3>> {
    if let Some(uniform) = channel.uniform_scale {
        return broadcast(channel, "UniformScale", Vec3::from_array(uniform));
    }
    let Some(payload) = &channel.scales else {
        return Ok(Vec::new());
    };
    let scale = channel.scale_scale.unwrap_or(1.0);
    let offsets = channel.scale_offsets.unwrap_or([0.0; 3]);
    let tuples = decode_samples::<3>(channel, "Scales", payload, config, &[scale; 3], &offsets)?;
    Ok(tuples.into_iter().map(Vec3::from_array).collect())
}

/// Repeats a uniform value once per sample. `Size` comes from the document,
/// so the allocation is fallible.
fn broadcast<T: Copy>(channel: &ChannelDescriptor, field: &str, value: T) -> Result<Vec<T>> {
    let count = channel.sample_count();
    let mut samples = Vec::new();
    samples.try_reserve_exact(count).map_err(|_| {
        ImportError::malformed(format!(
            "{}.{field} cannot hold {count} samples",
            channel.label()
        ))
    })?;
    samples.resize(count, value);
    Ok(samples)
}

fn decode_samples<const N: usize>(
    channel: &ChannelDescriptor,
    field: &str,
    payload: &SamplePayload,
    config: &CompressionConfig,
    scales: &[f64; N],
    offsets: &[f64; N],
) -> Result<Vec<[f32; N]>> {
    match (config.enabled, payload) {
        (true, SamplePayload::Compressed(packed)) => {
            let flat = decode_compressed(&code_units(packed), N, scales, offsets)?;
            Ok(flat
                .chunks_exact(N)
                .map(|chunk| {
                    let mut tuple = [0.0; N];
                    tuple.copy_from_slice(chunk);
                    tuple
                })
                .collect())
        }
        (false, SamplePayload::Raw(slots)) => Ok(resolve_slots::<N>(channel.label(), field, slots)),
        _ => Err(payload_mismatch(channel.label(), field, config)),
    }
}

/// Expands repeat markers, carrying forward the last resolved tuple.
///
/// Slots that are neither an `N` tuple nor the marker are skipped, as is a
/// marker with nothing before it.
pub fn resolve_slots<const N: usize>(channel: &str, field: &str, slots: &[SampleSlot]) -> Vec<[f32; N]> {
    let mut resolved = Vec::with_capacity(slots.len());
    let mut last: Option<[f32; N]> = None;
    for (index, slot) in slots.iter().enumerate() {
        match slot {
            SampleSlot::Tuple(values) if values.len() == N => {
                let mut tuple = [0.0; N];
                for (target, value) in tuple.iter_mut().zip(values) {
                    *target = *value as f32;
                }
                resolved.push(tuple);
                last = Some(tuple);
            }
            SampleSlot::Marker(marker) if marker == REPEAT_MARKER => match last {
                Some(previous) => resolved.push(previous),
                None => warn!("{channel}.{field}[{index}]: repeat marker with no previous sample"),
            },
            other => warn!("{channel}.{field}[{index}]: skipping malformed sample {other:?}"),
        }
    }
    resolved
}

fn payload_mismatch(channel: &str, field: &str, config: &CompressionConfig) -> ImportError {
    let expected = if config.enabled {
        "a compressed string"
    } else {
        "a plain array"
    };
    ImportError::malformed(format!("{channel}.{field} should be {expected}"))
}

/// Decoded samples of one joint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformChannel {
    pub name: String,
    pub times: Vec<f32>,
    pub translations: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
}

impl TransformChannel {
    pub fn decode(channel: &ChannelDescriptor, config: &CompressionConfig) -> Result<Self> {
        let decoded = Self {
            name: channel.label().to_string(),
            times: decode_times(channel, config)?,
            translations: decode_translations(channel, config)?,
            rotations: decode_rotations(channel, config)?,
            scales: decode_scales(channel, config)?,
        };
        let expected = decoded.times.len();
        for (field, len) in [
            ("translations", decoded.translations.len()),
            ("rotations", decoded.rotations.len()),
            ("scales", decoded.scales.len()),
        ] {
            if len != 0 && len != expected {
                warn!(
                    "{}: {len} {field} for {expected} sample times",
                    decoded.name
                );
            }
        }
        Ok(decoded)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ClipDocument {
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Channels", default)]
    channels: Vec<ChannelDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<TransformChannel>,
}

impl AnimationClip {
    /// Parses a clip document using the compression settings of its scene.
    pub fn from_json(source: &str, config: &CompressionConfig) -> Result<Self> {
        let document: ClipDocument = serde_json::from_str(source)?;
        let channels = document
            .channels
            .iter()
            .map(|channel| TransformChannel::decode(channel, config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name: document.name.unwrap_or_default(),
            channels,
        })
    }

    /// Time of the last sample across every channel.
    pub fn duration(&self) -> f32 {
        self.channels
            .iter()
            .filter_map(|channel| channel.times.last().copied())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::compress;

    fn channel(json: &str) -> ChannelDescriptor {
        serde_json::from_str(json).unwrap()
    }

    fn compressed() -> CompressionConfig {
        CompressionConfig {
            enabled: true,
            ..CompressionConfig::default()
        }
    }

    #[test]
    fn repeat_marker_duplicates_previous_rotation() {
        let desc = channel(r#"{"Rotations": [[0, 0, 0, 1], "*", [1, 0, 0, 0]]}"#);
        let rotations = decode_rotations(&desc, &CompressionConfig::default()).unwrap();
        assert_eq!(
            rotations,
            vec![
                Quat::from_xyzw(0.0, 0.0, 0.0, 1.0),
                Quat::from_xyzw(0.0, 0.0, 0.0, 1.0),
                Quat::from_xyzw(1.0, 0.0, 0.0, 0.0),
            ]
        );
    }

    #[test]
    fn repeat_marker_carries_across_several_slots() {
        let desc = channel(r#"{"Translations": [[1, 2, 3], "*", "*", [4, 5, 6], "*"]}"#);
        let translations = decode_translations(&desc, &CompressionConfig::default()).unwrap();
        assert_eq!(translations.len(), 5);
        assert_eq!(translations[2], Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(translations[4], Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn malformed_slots_are_skipped() {
        let slots: Vec<SampleSlot> =
            serde_json::from_str(r#"["*", [1, 2], "x", {"a": 1}, [1, 2, 3], null, "*"]"#).unwrap();
        let resolved = resolve_slots::<3>("joint", "Scales", &slots);
        assert_eq!(resolved, vec![[1.0, 2.0, 3.0], [1.0, 2.0, 3.0]]);
    }

    #[test]
    fn uniform_scale_broadcasts_without_reading_payload() {
        let desc = channel(r#"{"Size": 3, "UniformScale": [2, 2, 2], "Scales": "$$"}"#);
        let scales = decode_scales(&desc, &compressed()).unwrap();
        let flat: Vec<f32> = scales.iter().flat_map(|s| s.to_array()).collect();
        assert_eq!(flat, vec![2.0; 9]);
    }

    #[test]
    fn uniform_translation_uses_time_count_without_size() {
        let desc = channel(r#"{"Times": [0, 0.5, 1, 1.5], "UniformTranslation": [0, 1, 0]}"#);
        let translations = decode_translations(&desc, &CompressionConfig::default()).unwrap();
        assert_eq!(translations, vec![Vec3::Y; 4]);
    }

    #[test]
    fn compressed_times_use_channel_scale() {
        let packed = compress(&[0.0, 0.5, 1.0, 2.0], 1, &[0.5], &[0.0]);
        let desc: ChannelDescriptor =
            serde_json::from_value(serde_json::json!({"Times": packed, "TimeScale": 0.5})).unwrap();
        let times = decode_times(&desc, &compressed()).unwrap();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 2.0]);
        assert_eq!(desc.sample_count(), 4);
    }

    #[test]
    fn compressed_rotations_use_unit_vector_range() {
        let config = compressed();
        let (offset, scale) = config.unit_vector_transform();
        let values = [0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let packed = compress(&values, 4, &[scale; 4], &[offset; 4]);
        let desc: ChannelDescriptor =
            serde_json::from_value(serde_json::json!({"Rotations": packed})).unwrap();
        let rotations = decode_rotations(&desc, &config).unwrap();
        assert_eq!(rotations.len(), 2);
        assert!(rotations[0].abs_diff_eq(Quat::IDENTITY, 1e-6));
        assert!(rotations[1].abs_diff_eq(Quat::from_xyzw(0.0, 1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn compressed_translations_honor_offsets() {
        let packed = compress(&[1.0, 2.0, 3.0], 3, &[0.5; 3], &[2.0, 0.0, -2.0]);
        let desc: ChannelDescriptor = serde_json::from_value(serde_json::json!({
            "Translations": packed,
            "TranslationScale": 0.5,
            "TranslationOffsets": [2.0, 0.0, -2.0]
        }))
        .unwrap();
        let translations = decode_translations(&desc, &compressed()).unwrap();
        assert_eq!(translations, vec![Vec3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn raw_samples_in_compressed_clip_are_rejected() {
        let desc = channel(r#"{"Scales": [[1, 1, 1]]}"#);
        assert!(decode_scales(&desc, &compressed()).is_err());
    }

    #[test]
    fn clip_document_decodes_every_channel() {
        let clip = AnimationClip::from_json(
            r#"{"Name": "walk", "Channels": [
                {"JointName": "hip", "Times": [0, 1], "Translations": [[0, 0, 0], "*"],
                 "UniformRotation": [0, 0, 0, 1], "UniformScale": [1, 1, 1]},
                {"ChannelName": "knee", "Times": [0, 2], "Rotations": [[0, 0, 0, 1], [0, 0, 1, 0]]}
            ]}"#,
            &CompressionConfig::default(),
        )
        .unwrap();
        assert_eq!(clip.name, "walk");
        assert_eq!(clip.channels.len(), 2);
        assert_eq!(clip.channels[0].translations, vec![Vec3::ZERO; 2]);
        assert_eq!(clip.channels[0].rotations, vec![Quat::IDENTITY; 2]);
        assert_eq!(clip.channels[1].name, "knee");
        assert!(clip.channels[1].scales.is_empty());
        assert_eq!(clip.duration(), 2.0);
    }

    #[test]
    fn oversized_uniform_size_is_malformed() {
        let desc = channel(r#"{"JointName": "hip", "Size": 4611686018427387904, "UniformScale": [1, 1, 1]}"#);
        let err = decode_scales(&desc, &CompressionConfig::default()).unwrap_err();
        assert!(matches!(err, ImportError::MalformedDocument(message) if message.contains("hip.UniformScale")));
    }
}

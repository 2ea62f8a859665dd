//! Animation layer documents: per-layer state machines whose states play a
//! tree of clip sources and name the transitions into other states.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ImportError, Result};

/// Tree of sources a state samples from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SourceDescriptor {
    Clip {
        clip: String,
        /// Negative loops forever.
        loop_count: i32,
        time_scale: f32,
    },
    Lerp {
        source_a: Box<SourceDescriptor>,
        source_b: Box<SourceDescriptor>,
        blend_key: String,
    },
    /// Sources controlled directly by gameplay code.
    Managed { clips: Vec<String> },
    Frozen {
        source: Box<SourceDescriptor>,
        frozen_time: f32,
    },
}

#[derive(Deserialize)]
struct ClipFields {
    #[serde(rename = "Clip")]
    clip: String,
    #[serde(rename = "Loop", default = "loop_forever")]
    loop_count: i32,
    #[serde(rename = "TimeScale", default = "unit_scale")]
    time_scale: f32,
}

#[derive(Deserialize)]
struct LerpFields {
    #[serde(rename = "SourceA")]
    source_a: Value,
    #[serde(rename = "SourceB")]
    source_b: Value,
    #[serde(rename = "BlendKey")]
    blend_key: String,
}

#[derive(Deserialize)]
struct ManagedFields {
    #[serde(rename = "Clips", default)]
    clips: Vec<String>,
}

#[derive(Deserialize)]
struct FrozenFields {
    #[serde(rename = "Source")]
    source: Value,
    #[serde(rename = "FrozenTime", default)]
    frozen_time: f32,
}

fn loop_forever() -> i32 {
    -1
}

fn unit_scale() -> f32 {
    1.0
}

fn type_tag(value: &Value) -> Result<&str> {
    value
        .get("Type")
        .and_then(Value::as_str)
        .ok_or_else(|| ImportError::malformed("entry has no Type"))
}

impl SourceDescriptor {
    pub fn from_value(value: &Value) -> Result<Self> {
        let source = match type_tag(value)? {
            "Clip" => {
                let fields = ClipFields::deserialize(value)?;
                Self::Clip {
                    clip: fields.clip,
                    loop_count: fields.loop_count,
                    time_scale: fields.time_scale,
                }
            }
            "Lerp" => {
                let fields = LerpFields::deserialize(value)?;
                Self::Lerp {
                    source_a: Box::new(Self::from_value(&fields.source_a)?),
                    source_b: Box::new(Self::from_value(&fields.source_b)?),
                    blend_key: fields.blend_key,
                }
            }
            "Managed" => Self::Managed {
                clips: ManagedFields::deserialize(value)?.clips,
            },
            "Frozen" => {
                let fields = FrozenFields::deserialize(value)?;
                Self::Frozen {
                    source: Box::new(Self::from_value(&fields.source)?),
                    frozen_time: fields.frozen_time,
                }
            }
            other => return Err(ImportError::UnknownSourceType(other.to_string())),
        };
        Ok(source)
    }

    /// Names of every clip referenced by this tree, depth first.
    pub fn clip_names(&self) -> Vec<&str> {
        match self {
            Self::Clip { clip, .. } => vec![clip.as_str()],
            Self::Lerp {
                source_a, source_b, ..
            } => {
                let mut names = source_a.clip_names();
                names.extend(source_b.clip_names());
                names
            }
            Self::Managed { clips } => clips.iter().map(String::as_str).collect(),
            Self::Frozen { source, .. } => source.clip_names(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendType {
    #[default]
    Linear,
    SCurve3,
    SCurve5,
}

/// How a layer moves from its current state into a target state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TransitionDescriptor {
    Fade { fade_time: f32, blend: BlendType },
    SyncFade { fade_time: f32, blend: BlendType },
    Frozen { fade_time: f32, blend: BlendType },
}

#[derive(Deserialize)]
struct TransitionFields {
    #[serde(rename = "FadeTime", default)]
    fade_time: f32,
    #[serde(rename = "BlendType", default)]
    blend_type: Option<String>,
}

impl TransitionDescriptor {
    pub fn from_value(value: &Value) -> Result<Self> {
        let tag = type_tag(value)?;
        let fields = TransitionFields::deserialize(value)?;
        let blend = match fields.blend_type.as_deref() {
            None | Some("Linear") => BlendType::Linear,
            Some("SCurve3") => BlendType::SCurve3,
            Some("SCurve5") => BlendType::SCurve5,
            Some(other) => {
                warn!("unknown blend type {other:?}, using Linear");
                BlendType::Linear
            }
        };
        let fade_time = fields.fade_time;
        match tag {
            "Fade" => Ok(Self::Fade { fade_time, blend }),
            "SyncFade" => Ok(Self::SyncFade { fade_time, blend }),
            "Frozen" => Ok(Self::Frozen { fade_time, blend }),
            other => Err(ImportError::UnknownTransitionType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDescriptor {
    pub name: String,
    pub source: SourceDescriptor,
    /// Keyed by target state name; `"*"` matches any target.
    pub transitions: BTreeMap<String, TransitionDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerDescriptor {
    pub name: String,
    pub default_state: Option<String>,
    pub states: Vec<StateDescriptor>,
}

impl LayerDescriptor {
    pub fn state(&self, name: &str) -> Option<&StateDescriptor> {
        self.states.iter().find(|state| state.name == name)
    }
}

#[derive(Deserialize)]
struct LayersDocument {
    #[serde(rename = "Layers", default)]
    layers: Vec<LayerDocument>,
}

#[derive(Deserialize)]
struct LayerDocument {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "DefaultState", default)]
    default_state: Option<String>,
    #[serde(rename = "States", default)]
    states: Vec<StateDocument>,
}

#[derive(Deserialize)]
struct StateDocument {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Source", default)]
    source: Value,
    #[serde(rename = "Transitions", default)]
    transitions: BTreeMap<String, Value>,
}

/// Parses a layer document.
///
/// States whose source cannot be built and transitions of an unknown type
/// are logged and dropped; the rest of the layer is kept.
pub fn parse_layers(source: &str) -> Result<Vec<LayerDescriptor>> {
    let document: LayersDocument = serde_json::from_str(source)?;
    let layers = document
        .layers
        .into_iter()
        .map(|layer| {
            let states = layer
                .states
                .into_iter()
                .filter_map(|state| parse_state(&layer.name, state))
                .collect();
            LayerDescriptor {
                name: layer.name,
                default_state: layer.default_state,
                states,
            }
        })
        .collect();
    Ok(layers)
}

fn parse_state(layer: &str, state: StateDocument) -> Option<StateDescriptor> {
    let source = match SourceDescriptor::from_value(&state.source) {
        Ok(source) => source,
        Err(err) => {
            warn!("layer {layer}: dropping state {}: {err}", state.name);
            return None;
        }
    };
    let mut transitions = BTreeMap::new();
    for (target, value) in &state.transitions {
        match TransitionDescriptor::from_value(value) {
            Ok(transition) => {
                transitions.insert(target.clone(), transition);
            }
            Err(err) => warn!(
                "layer {layer}: dropping transition {} -> {target}: {err}",
                state.name
            ),
        }
    }
    Some(StateDescriptor {
        name: state.name,
        source,
        transitions,
    })
}

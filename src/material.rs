use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Vec4;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::document::MaterialDocument;
use crate::error::{ImportError, Result};

/// Parses `#RRGGBB` or `#RRGGBBAA` into normalized RGBA.
///
/// The leading `#` is optional. Extra trailing pairs are accepted and the
/// last one is taken as alpha. Anything else is not a colour.
pub fn parse_color(hex: &str) -> Option<Vec4> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() < 6 || digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |start: usize| -> Option<f32> {
        u8::from_str_radix(&digits[start..start + 2], 16)
            .ok()
            .map(|value| f32::from(value) / 255.0)
    };
    let alpha = if digits.len() > 6 {
        channel(digits.len() - 2)?
    } else {
        1.0
    };
    Some(Vec4::new(channel(0)?, channel(2)?, channel(4)?, alpha))
}

fn lenient_color(material: &str, field: &str, value: Option<&str>) -> Option<Vec4> {
    let value = value?;
    let color = parse_color(value);
    if color.is_none() {
        warn!("material {material}: ignoring malformed {field} {value:?}");
    }
    color
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialState {
    pub ambient: Option<Vec4>,
    pub diffuse: Option<Vec4>,
    pub emissive: Option<Vec4>,
    pub specular: Option<Vec4>,
    pub shininess: Option<f32>,
}

impl MaterialState {
    fn from_document(name: &str, document: &MaterialDocument) -> Self {
        Self {
            ambient: lenient_color(name, "AmbientColor", document.ambient_color.as_deref()),
            diffuse: lenient_color(name, "DiffuseColor", document.diffuse_color.as_deref()),
            emissive: lenient_color(name, "EmissiveColor", document.emissive_color.as_deref()),
            specular: lenient_color(name, "SpecularColor", document.specular_color.as_deref()),
            shininess: document.shininess,
        }
    }
}

/// Texture minification filters understood by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MinificationFilter {
    NearestNeighborNoMipMaps,
    BilinearNoMipMaps,
    NearestNeighborNearestMipMap,
    BilinearNearestMipMap,
    NearestNeighborLinearMipMap,
    #[default]
    Trilinear,
}

impl MinificationFilter {
    pub fn from_name(name: &str) -> Option<Self> {
        let filter = match name {
            "NearestNeighborNoMipMaps" => Self::NearestNeighborNoMipMaps,
            "BilinearNoMipMaps" => Self::BilinearNoMipMaps,
            "NearestNeighborNearestMipMap" => Self::NearestNeighborNearestMipMap,
            "BilinearNearestMipMap" => Self::BilinearNearestMipMap,
            "NearestNeighborLinearMipMap" => Self::NearestNeighborLinearMipMap,
            "Trilinear" => Self::Trilinear,
            _ => return None,
        };
        Some(filter)
    }

    /// Missing names select the default; unknown names fall back to it too.
    fn lenient(material: &str, name: Option<&str>) -> Self {
        let Some(name) = name else {
            return Self::default();
        };
        Self::from_name(name).unwrap_or_else(|| {
            warn!("material {material}: bad texture minification filter {name:?}");
            Self::default()
        })
    }
}

/// Named texture slots and the texture unit each one binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureSlot {
    Diffuse,
    Normal,
    AmbientOcclusion,
    Occlusion,
    Specular,
}

impl TextureSlot {
    /// Application order. Occlusion and specular share unit 3, so a specular
    /// map replaces an occlusion map on the same material.
    pub const ALL: [TextureSlot; 5] = [
        TextureSlot::Diffuse,
        TextureSlot::Normal,
        TextureSlot::AmbientOcclusion,
        TextureSlot::Occlusion,
        TextureSlot::Specular,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuse",
            TextureSlot::Normal => "normal",
            TextureSlot::AmbientOcclusion => "ao",
            TextureSlot::Occlusion => "occlusion",
            TextureSlot::Specular => "specular",
        }
    }

    pub fn unit(self) -> u32 {
        match self {
            TextureSlot::Diffuse => 0,
            TextureSlot::Normal => 1,
            TextureSlot::AmbientOcclusion => 2,
            TextureSlot::Occlusion | TextureSlot::Specular => 3,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSettings {
    pub minification_filter: MinificationFilter,
    pub flip: bool,
}

impl Default for TextureSettings {
    fn default() -> Self {
        Self {
            minification_filter: MinificationFilter::default(),
            flip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureEntry {
    pub reference: Option<String>,
    pub file_name: Option<String>,
    pub settings: TextureSettings,
}

/// Material description from the document's material table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialInfo {
    pub name: String,
    pub profile: Option<String>,
    pub technique: Option<String>,
    pub uses_transparency: bool,
    pub state: MaterialState,
    /// Keyed by the slot name as written in the document.
    pub textures: HashMap<String, TextureEntry>,
}

impl MaterialInfo {
    pub fn from_document(document: &MaterialDocument) -> Result<Self> {
        let name = document
            .material_name
            .clone()
            .ok_or_else(|| ImportError::malformed("material without MaterialName"))?;

        let mut textures = HashMap::new();
        for entry in &document.texture_entries {
            let settings = TextureSettings {
                minification_filter: MinificationFilter::lenient(
                    &name,
                    entry.minification_filter.as_deref(),
                ),
                flip: entry.flip.unwrap_or(true),
            };
            textures.insert(
                entry.slot.clone(),
                TextureEntry {
                    reference: entry.texture_reference.clone(),
                    file_name: entry.texture_source.clone(),
                    settings,
                },
            );
        }

        Ok(Self {
            state: MaterialState::from_document(&name, document),
            name,
            profile: document.profile.clone(),
            technique: document.technique.clone(),
            uses_transparency: document.uses_transparency,
            textures,
        })
    }

    /// Creates a node material, loading every texture the slot table knows.
    pub fn instantiate(
        &self,
        shading: Shading,
        texture_dir: &str,
        loader: &mut dyn TextureLoader,
    ) -> Material {
        let mut material = Material {
            name: self.name.clone(),
            shading,
            state: self.state,
            uses_transparency: self.uses_transparency,
            textures: BTreeMap::new(),
        };
        for slot in TextureSlot::ALL {
            let Some(entry) = self.textures.get(slot.name()) else {
                continue;
            };
            let Some(file_name) = &entry.file_name else {
                continue;
            };
            let path = format!("{texture_dir}{file_name}");
            let handle = loader.load_texture(&path, &entry.settings);
            material.textures.insert(slot.unit(), handle);
        }
        material
    }
}

/// Materials of one import session, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    materials: HashMap<String, Arc<MaterialInfo>>,
}

impl MaterialLibrary {
    pub fn from_documents(documents: &[Option<MaterialDocument>]) -> Result<Self> {
        let mut library = Self::default();
        for document in documents.iter().flatten() {
            let info = MaterialInfo::from_document(document)?;
            library.insert(info);
        }
        Ok(library)
    }

    /// Later definitions replace earlier ones with the same name.
    pub fn insert(&mut self, info: MaterialInfo) {
        self.materials.insert(info.name.clone(), Arc::new(info));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<MaterialInfo>> {
        self.materials.get(name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shading {
    Lit,
    Unlit,
}

/// Opaque handle handed out by the texture loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

/// Material attached to an imported node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub shading: Shading,
    pub state: MaterialState,
    pub uses_transparency: bool,
    /// Texture unit to loaded texture.
    pub textures: BTreeMap<u32, TextureHandle>,
}

impl Material {
    pub fn default_for(shading: Shading) -> Self {
        let name = match shading {
            Shading::Lit => "DefaultLit",
            Shading::Unlit => "Default",
        };
        Self {
            name: name.to_string(),
            shading,
            state: MaterialState::default(),
            uses_transparency: false,
            textures: BTreeMap::new(),
        }
    }
}

/// Loads texture images on behalf of the importer.
pub trait TextureLoader {
    fn load_texture(&mut self, path: &str, settings: &TextureSettings) -> TextureHandle;
}

/// Loader that only records requests, handing out one handle per distinct path.
#[derive(Debug, Clone, Default)]
pub struct TextureRegistry {
    requests: Vec<(String, TextureSettings)>,
    handles: HashMap<String, TextureHandle>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> &[(String, TextureSettings)] {
        &self.requests
    }

    pub fn handle(&self, path: &str) -> Option<TextureHandle> {
        self.handles.get(path).copied()
    }
}

impl TextureLoader for TextureRegistry {
    fn load_texture(&mut self, path: &str, settings: &TextureSettings) -> TextureHandle {
        let next = TextureHandle(self.handles.len() as u32);
        let handle = *self.handles.entry(path.to_string()).or_insert(next);
        self.requests.push((path.to_string(), *settings));
        handle
    }
}

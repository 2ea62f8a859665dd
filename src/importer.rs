use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::config::CompressionConfig;
use crate::document::{Document, MeshDescriptor, SpatialDocument};
use crate::error::{ImportError, Result};
use crate::material::{Material, MaterialLibrary, Shading, TextureLoader};
use crate::mesh::{build_mesh, MeshKind};
use crate::scene::{NodeFactory, Transform};

/// Name given to nodes whose document omits one.
pub const UNNAMED_NODE: &str = "null";

/// Source of raw model documents.
pub trait DocumentFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Reads documents from the local filesystem, optionally below a root.
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl DocumentFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        let path = match &self.root {
            Some(root) => root.join(url),
            None => PathBuf::from(url),
        };
        fs::read_to_string(&path).map_err(|err| ImportError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImporterOptions {
    /// Prefixed verbatim onto every texture file name.
    pub texture_dir: String,
}

/// Result of one import: every node created, in creation order, plus the
/// subtrees that failed to decode.
#[derive(Debug)]
pub struct ImportedScene<H> {
    pub nodes: Vec<H>,
    pub failures: Vec<(String, ImportError)>,
}

impl<H> Default for ImportedScene<H> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<H> ImportedScene<H> {
    pub fn root(&self) -> Option<&H> {
        self.nodes.first()
    }
}

/// One import session. The compression settings and material library are
/// replaced by every `parse` call and stay readable afterwards.
#[derive(Debug, Default)]
pub struct Importer {
    options: ImporterOptions,
    config: CompressionConfig,
    materials: MaterialLibrary,
}

impl Importer {
    pub fn new(options: ImporterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ImporterOptions {
        &self.options
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    pub fn materials(&self) -> &MaterialLibrary {
        &self.materials
    }

    /// Fetches `url` and parses the returned document.
    pub fn load<F: NodeFactory>(
        &mut self,
        fetcher: &dyn DocumentFetcher,
        url: &str,
        factory: &mut F,
        textures: &mut dyn TextureLoader,
    ) -> Result<ImportedScene<F::Handle>> {
        let source = fetcher.fetch(url)?;
        debug!("fetched {url} ({} bytes)", source.len());
        self.parse(&source, factory, textures)
    }

    /// Parses a model document, creating nodes through `factory`.
    ///
    /// Header, material and root node errors abort the import. Errors below
    /// the root are recorded in [`ImportedScene::failures`] and the
    /// remaining siblings still load.
    pub fn parse<F: NodeFactory>(
        &mut self,
        source: &str,
        factory: &mut F,
        textures: &mut dyn TextureLoader,
    ) -> Result<ImportedScene<F::Handle>> {
        let document: Document = serde_json::from_str(source)?;
        self.config = CompressionConfig::from_document(&document);
        self.materials =
            MaterialLibrary::from_documents(document.materials.as_deref().unwrap_or_default())?;
        debug!(
            "parsing model: compression {}, {} material(s)",
            self.config.enabled,
            self.materials.len()
        );

        let mut builder = SceneBuilder {
            config: &self.config,
            materials: &self.materials,
            texture_dir: &self.options.texture_dir,
            factory,
            textures,
            scene: ImportedScene::default(),
        };
        if let Some(root) = &document.scene {
            builder.spatial(root)?;
        }
        Ok(builder.scene)
    }
}

struct SceneBuilder<'a, F: NodeFactory> {
    config: &'a CompressionConfig,
    materials: &'a MaterialLibrary,
    texture_dir: &'a str,
    factory: &'a mut F,
    textures: &'a mut dyn TextureLoader,
    scene: ImportedScene<F::Handle>,
}

impl<F: NodeFactory> SceneBuilder<'_, F> {
    fn spatial(&mut self, value: &Value) -> Result<Option<F::Handle>> {
        let spatial = SpatialDocument::deserialize(value)?;
        let name = spatial
            .name
            .clone()
            .unwrap_or_else(|| UNNAMED_NODE.to_string());

        let node = match spatial.node_type.as_str() {
            "Node" => {
                let node = self.create(&name);
                for child in &spatial.children {
                    self.child(&node, child);
                }
                node
            }
            "Mesh" => match self.mesh_node(&name, &spatial, MeshKind::Rigid, Shading::Lit)? {
                Some(node) => node,
                None => return Ok(None),
            },
            "SkinnedMesh" => {
                match self.mesh_node(&name, &spatial, MeshKind::Skinned, Shading::Unlit)? {
                    Some(node) => node,
                    None => return Ok(None),
                }
            }
            other => {
                warn!("skipping {name}: unknown spatial type {other:?}");
                return Ok(None);
            }
        };

        let transform = spatial
            .transform
            .as_ref()
            .map(Transform::from_document)
            .unwrap_or_default();
        self.factory.set_transform(&node, transform);
        Ok(Some(node))
    }

    fn child(&mut self, parent: &F::Handle, value: &Value) {
        match self.spatial(value) {
            Ok(Some(child)) => self.factory.attach_child(parent, &child),
            Ok(None) => {}
            Err(err) => {
                let name = value
                    .get("Name")
                    .and_then(Value::as_str)
                    .unwrap_or(UNNAMED_NODE)
                    .to_string();
                warn!("failed to load {name}: {err}");
                self.scene.failures.push((name, err));
            }
        }
    }

    fn create(&mut self, name: &str) -> F::Handle {
        debug!("creating node {name}");
        let node = self.factory.create_node(name);
        self.scene.nodes.push(node.clone());
        node
    }

    /// Decodes the mesh before creating the node so a failed decode leaves
    /// nothing behind.
    fn mesh_node(
        &mut self,
        name: &str,
        spatial: &SpatialDocument,
        kind: MeshKind,
        shading: Shading,
    ) -> Result<Option<F::Handle>> {
        let value = spatial
            .mesh_data
            .as_ref()
            .ok_or_else(|| ImportError::malformed(format!("{name} has no MeshData")))?;
        let descriptor = MeshDescriptor::deserialize(value)?;
        let Some(mesh) = build_mesh(&descriptor, kind.weights_per_vertex(), kind, self.config)?
        else {
            debug!("skipping {name}: mesh has no vertices");
            return Ok(None);
        };
        let material = self.material(name, spatial.material.as_deref(), shading);

        let node = self.create(name);
        self.factory.set_mesh(&node, mesh);
        self.factory.set_material(&node, material);
        Ok(Some(node))
    }

    fn material(&mut self, node: &str, reference: Option<&str>, shading: Shading) -> Material {
        let Some(reference) = reference else {
            return Material::default_for(shading);
        };
        match self.materials.get(reference) {
            Some(info) => info.instantiate(shading, self.texture_dir, &mut *self.textures),
            None => {
                warn!("{node}: material {reference:?} not found, using default");
                Material::default_for(shading)
            }
        }
    }
}

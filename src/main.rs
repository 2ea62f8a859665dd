use std::env;

use anyhow::{anyhow, Context, Result};

use scene_importer::{
    FileFetcher, Importer, ImporterOptions, SceneGraph, SceneNode, TextureRegistry,
};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let mut importer = Importer::new(ImporterOptions {
        texture_dir: options.texture_dir.clone(),
    });
    let mut graph = SceneGraph::new();
    let mut textures = TextureRegistry::new();
    let scene = importer
        .load(&FileFetcher::new(), &options.path, &mut graph, &mut textures)
        .with_context(|| format!("failed to import {}", options.path))?;

    println!(
        "Imported {} node(s) ({} failure(s))",
        scene.nodes.len(),
        scene.failures.len()
    );
    for id in &scene.nodes {
        if let Some(node) = graph.get(*id) {
            print_node(&node, options.summary_only);
        }
    }
    for (name, err) in &scene.failures {
        eprintln!("Failed to load {name}: {err}");
    }
    for (path, _) in textures.requests() {
        println!("Texture requested: {path}");
    }
    Ok(())
}

fn print_node(node: &SceneNode, summary_only: bool) {
    let mut line = format!(" - {}", node.name);
    if let Some(mesh) = &node.mesh {
        line.push_str(&format!(
            " [mesh: {} vertices, {} indices]",
            mesh.vertex_count,
            mesh.index_count()
        ));
    }
    if let Some(material) = &node.material {
        line.push_str(&format!(" [material: {}]", material.name));
    }
    println!("{line}");

    if summary_only {
        return;
    }
    if let Some(mesh) = &node.mesh {
        for descriptor in mesh.descriptors() {
            println!("    {} x{}", descriptor.key, descriptor.component_count);
        }
    }
}

struct CliOptions {
    path: String,
    texture_dir: String,
    summary_only: bool,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!(
                "Usage: scene-importer <model.json> [--texture-dir DIR] [--summary-only]"
            ));
        };
        let mut texture_dir = String::new();
        let mut summary_only = false;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--texture-dir" => {
                    texture_dir = args
                        .next()
                        .ok_or_else(|| anyhow!("--texture-dir expects a directory"))?;
                }
                "--summary-only" => summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --texture-dir or --summary-only"
                    ));
                }
            }
        }
        Ok(Self {
            path,
            texture_dir,
            summary_only,
        })
    }
}

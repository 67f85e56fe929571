//! Entry points used by front ends: load, compile, render.

use std::path::{Path, PathBuf};

use tracing::info_span;

use crate::{
    assets::AssetResolver,
    config::{LoadOptions, PipelineConfig},
    diagram::DiagramBuilder,
    errors::FamGraphError,
    loader::{NodeSet, load_from_store},
    render::{GraphvizEngine, LayoutEngine, OutputFormat},
    store::RecordStore,
};

pub fn load_graph(locator: &str) -> Result<NodeSet, FamGraphError> {
    load_graph_with(locator, &LoadOptions::default())
}

pub fn load_graph_with(locator: &str, options: &LoadOptions) -> Result<NodeSet, FamGraphError> {
    let _span = info_span!("load_graph", locator).entered();
    let store = RecordStore::open_with(locator, options.store.clone())?;
    load_from_store(&store, options)
}

/// Starts a builder with every node and edge of `graph` already emitted.
pub fn compile_diagram(
    graph: &NodeSet,
    assets: AssetResolver,
) -> Result<DiagramBuilder, FamGraphError> {
    compile_diagram_with(graph, assets, Box::new(GraphvizEngine::default()))
}

pub fn compile_diagram_with(
    graph: &NodeSet,
    assets: AssetResolver,
    engine: Box<dyn LayoutEngine>,
) -> Result<DiagramBuilder, FamGraphError> {
    let _span = info_span!("compile_diagram", nodes = graph.len()).entered();
    let mut builder = DiagramBuilder::with_engine(assets, engine);
    builder.compile(graph)?;
    Ok(builder)
}

pub fn build_and_render(
    locator: &str,
    destination: &Path,
    format: OutputFormat,
) -> Result<PathBuf, FamGraphError> {
    let config = PipelineConfig::new(locator, destination, format);
    build_and_render_with(&config, Box::new(GraphvizEngine::default()))
}

/// Load, compile and render in one pass. Nothing is handed to the engine
/// unless the whole graph loaded and compiled.
pub fn build_and_render_with(
    config: &PipelineConfig,
    engine: Box<dyn LayoutEngine>,
) -> Result<PathBuf, FamGraphError> {
    let graph = load_graph_with(&config.locator, &config.load)?;
    let assets = AssetResolver::new(config.placeholder.clone());
    let mut builder = compile_diagram_with(&graph, assets, engine)?;
    builder.render(&config.destination, config.format)
}

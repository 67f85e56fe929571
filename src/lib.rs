//! Family tree records stored in SQLite, loaded into an arena graph and
//! compiled into Graphviz diagrams.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod assets;
pub mod bench_utils;
pub mod cli;
pub mod config;
pub mod diagram;
pub mod errors;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod safety;
pub mod schema;
pub mod store;

pub use crate::assets::AssetResolver;
pub use crate::config::{LoadOptions, PipelineConfig, PlaceholderConfig, StoreOptions};
pub use crate::diagram::{Diagram, DiagramBuilder, DiagramEdge, DiagramNode, format_date_range};
pub use crate::errors::FamGraphError;
pub use crate::loader::{GraphNode, NodeSet};
pub use crate::model::{Person, PersonRecord, Relation};
pub use crate::pipeline::{build_and_render, compile_diagram, load_graph};
pub use crate::render::{GraphvizEngine, LayoutEngine, OutputFormat, SourceOnlyEngine};
pub use crate::store::{Locator, RecordStore, initialize_schema};

//! Option structs for the load, compile and render stages.
//!
//! Every knob is an explicit field with a default; nothing is read from the
//! environment or from process-wide state. The command line front end maps
//! its flags onto [`PipelineConfig`].

use std::{path::PathBuf, time::Duration};

use crate::render::OutputFormat;

pub const DEFAULT_LOCATOR: &str = "sqlite:///data/famgraph.db";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Upper bound for the bulk fetch, including time spent waiting on a
    /// writer's lock. Expiry surfaces as a connection error.
    pub fetch_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub store: StoreOptions,
    /// Skip the acyclicity check after loading.
    pub allow_cycles: bool,
}

/// Appearance of the generated portrait used when a person has no usable
/// image.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaceholderConfig {
    pub caption: String,
    pub width: u32,
    pub height: u32,
    pub font_family: String,
    pub font_size: f32,
    /// Directory the placeholder file is written to. `None` creates a
    /// unique `famgraph-*` directory under the system temp dir.
    pub directory: Option<PathBuf>,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            caption: "Empty".to_string(),
            width: 120,
            height: 120,
            font_family: "Helvetica, Arial, sans-serif".to_string(),
            font_size: 22.0,
            directory: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub locator: String,
    pub destination: PathBuf,
    pub format: OutputFormat,
    pub load: LoadOptions,
    pub placeholder: PlaceholderConfig,
}

impl PipelineConfig {
    pub fn new<L: Into<String>, P: Into<PathBuf>>(
        locator: L,
        destination: P,
        format: OutputFormat,
    ) -> Self {
        Self {
            locator: locator.into(),
            destination: destination.into(),
            format,
            load: LoadOptions::default(),
            placeholder: PlaceholderConfig::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let format = OutputFormat::Pdf;
        Self::new(DEFAULT_LOCATOR, format.default_destination(), format)
    }
}

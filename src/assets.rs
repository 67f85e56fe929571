//! Portrait resolution for diagram labels.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use svg::{
    Document,
    node::element::{Rectangle, Text},
};
use tracing::{debug, warn};

use crate::{config::PlaceholderConfig, errors::FamGraphError};

const PLACEHOLDER_FILE: &str = "placeholder.svg";

/// Resolves portrait paths, substituting a generated placeholder when a
/// person has no image or the image cannot be read. The placeholder is
/// written once and shared by every clone of the resolver.
#[derive(Clone)]
pub struct AssetResolver {
    config: Arc<PlaceholderConfig>,
    placeholder: Arc<Mutex<Placeholder>>,
}

#[derive(Debug, Clone)]
enum Placeholder {
    Pending,
    Ready(PathBuf),
    Unavailable,
}

impl AssetResolver {
    pub fn new(config: PlaceholderConfig) -> Self {
        Self {
            config: Arc::new(config),
            placeholder: Arc::new(Mutex::new(Placeholder::Pending)),
        }
    }

    pub fn config(&self) -> &PlaceholderConfig {
        &self.config
    }

    /// Path to embed for a portrait, or `None` when the placeholder could
    /// not be written either. Never fails.
    pub fn resolve(&self, image_path: Option<&str>) -> Option<PathBuf> {
        if let Some(raw) = image_path {
            match probe_image(Path::new(raw)) {
                Ok(path) => return Some(path),
                Err(err) => warn!(error = %err, "using placeholder portrait"),
            }
        }
        match self.placeholder_path() {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(error = %err, "placeholder portrait unavailable, omitting image");
                None
            }
        }
    }

    /// Writes the placeholder on first use. A failed write is remembered so
    /// later calls do not retry it.
    pub fn placeholder_path(&self) -> Result<PathBuf, FamGraphError> {
        let mut guard = self.placeholder.lock();
        match &*guard {
            Placeholder::Ready(path) => return Ok(path.clone()),
            Placeholder::Unavailable => {
                return Err(FamGraphError::asset_load(
                    self.config.directory.clone().unwrap_or_default(),
                    "placeholder could not be written",
                ));
            }
            Placeholder::Pending => {}
        }
        match write_placeholder(&self.config) {
            Ok(path) => {
                *guard = Placeholder::Ready(path.clone());
                Ok(path)
            }
            Err(err) => {
                *guard = Placeholder::Unavailable;
                Err(err)
            }
        }
    }

    pub fn placeholder_generated(&self) -> bool {
        matches!(*self.placeholder.lock(), Placeholder::Ready(_))
    }
}

impl Default for AssetResolver {
    fn default() -> Self {
        Self::new(PlaceholderConfig::default())
    }
}

pub fn probe_image(path: &Path) -> Result<PathBuf, FamGraphError> {
    let metadata =
        fs::metadata(path).map_err(|e| FamGraphError::asset_load(path, e.to_string()))?;
    if !metadata.is_file() {
        return Err(FamGraphError::asset_load(path, "not a regular file"));
    }
    File::open(path).map_err(|e| FamGraphError::asset_load(path, e.to_string()))?;
    Ok(path.to_path_buf())
}

pub fn placeholder_document(config: &PlaceholderConfig) -> Document {
    let background = Rectangle::new()
        .set("x", 0)
        .set("y", 0)
        .set("width", config.width)
        .set("height", config.height)
        .set("fill", "#e6e6e6")
        .set("stroke", "#9a9a9a")
        .set("stroke-width", 2);
    let caption = Text::new(config.caption.as_str())
        .set("x", config.width / 2)
        .set("y", config.height / 2)
        .set("text-anchor", "middle")
        .set("dominant-baseline", "central")
        .set("font-family", config.font_family.as_str())
        .set("font-size", config.font_size)
        .set("font-weight", "bold")
        .set("fill", "#4a4a4a");
    Document::new()
        .set("width", config.width)
        .set("height", config.height)
        .set("viewBox", (0u32, 0u32, config.width, config.height))
        .add(background)
        .add(caption)
}

/// Configured directory, or a fresh `famgraph-*` directory under the system
/// temp dir. The fresh directory outlives the resolver so DOT written for
/// later layout still points at a real file.
fn placeholder_directory(config: &PlaceholderConfig) -> Result<PathBuf, FamGraphError> {
    match &config.directory {
        Some(directory) => {
            fs::create_dir_all(directory)
                .map_err(|e| FamGraphError::asset_load(directory, e.to_string()))?;
            Ok(directory.clone())
        }
        None => tempfile::Builder::new()
            .prefix("famgraph-")
            .tempdir()
            .map(|dir| dir.keep())
            .map_err(|e| FamGraphError::asset_load(std::env::temp_dir(), e.to_string())),
    }
}

fn write_placeholder(config: &PlaceholderConfig) -> Result<PathBuf, FamGraphError> {
    let directory = placeholder_directory(config)?;
    let path = directory.join(PLACEHOLDER_FILE);
    svg::save(&path, &placeholder_document(config))
        .map_err(|e| FamGraphError::asset_load(&path, e.to_string()))?;
    debug!(path = %path.display(), "placeholder portrait written");
    Ok(path)
}

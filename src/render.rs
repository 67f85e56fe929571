use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::FamGraphError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pdf,
    Png,
    Svg,
    /// Laid-out DOT text; no image is produced.
    Dot,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Pdf,
        OutputFormat::Png,
        OutputFormat::Svg,
        OutputFormat::Dot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
            OutputFormat::Svg => "svg",
            OutputFormat::Dot => "dot",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Dot => "gv",
            other => other.as_str(),
        }
    }

    pub fn default_destination(self) -> PathBuf {
        PathBuf::from("output").join(format!("family-tree.{}", self.extension()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = FamGraphError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == lowered || format.extension() == lowered)
            .ok_or_else(|| {
                FamGraphError::invalid_input(format!(
                    "unsupported output format {raw}; expected one of pdf, png, svg, dot"
                ))
            })
    }
}

/// External layout engine: consumes DOT text and writes the rendered
/// document to `destination`, returning the path actually written.
pub trait LayoutEngine {
    fn layout(
        &self,
        dot: &str,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, FamGraphError>;
}

/// Runs Graphviz `dot` as a subprocess with the DOT text on stdin.
#[derive(Clone, Debug)]
pub struct GraphvizEngine {
    program: PathBuf,
}

impl GraphvizEngine {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for GraphvizEngine {
    fn default() -> Self {
        Self::new("dot")
    }
}

impl LayoutEngine for GraphvizEngine {
    fn layout(
        &self,
        dot: &str,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, FamGraphError> {
        ensure_parent_dir(destination)?;
        debug!(
            program = %self.program.display(),
            format = %format,
            destination = %destination.display(),
            "invoking layout engine"
        );
        let mut child = Command::new(&self.program)
            .arg(format!("-T{}", format.as_str()))
            .arg("-o")
            .arg(destination)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FamGraphError::render(format!(
                    "could not start {}: {e}",
                    self.program.display()
                ))
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(dot.as_bytes())
                .map_err(|e| FamGraphError::render(format!("writing to layout engine: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| FamGraphError::render(format!("waiting for layout engine: {e}")))?;
        if !output.status.success() {
            return Err(FamGraphError::render(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(destination.to_path_buf())
    }
}

/// Writes the DOT text itself without laying it out. Useful when Graphviz is
/// not installed or the output is post-processed elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceOnlyEngine;

impl LayoutEngine for SourceOnlyEngine {
    fn layout(
        &self,
        dot: &str,
        destination: &Path,
        _format: OutputFormat,
    ) -> Result<PathBuf, FamGraphError> {
        ensure_parent_dir(destination)?;
        fs::write(destination, dot).map_err(|e| {
            FamGraphError::render(format!("writing {}: {e}", destination.display()))
        })?;
        Ok(destination.to_path_buf())
    }
}

fn ensure_parent_dir(destination: &Path) -> Result<(), FamGraphError> {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| FamGraphError::render(format!("creating {}: {e}", parent.display()))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("PDF".parse::<OutputFormat>().expect("pdf"), OutputFormat::Pdf);
        assert_eq!(" png ".parse::<OutputFormat>().expect("png"), OutputFormat::Png);
        assert_eq!("gv".parse::<OutputFormat>().expect("gv"), OutputFormat::Dot);
        assert!("jpeg".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn default_destination_uses_extension() {
        assert_eq!(
            OutputFormat::Png.default_destination(),
            PathBuf::from("output/family-tree.png")
        );
        assert_eq!(
            OutputFormat::Dot.default_destination(),
            PathBuf::from("output/family-tree.gv")
        );
    }
}

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{DEFAULT_LOCATOR, LoadOptions, PipelineConfig, PlaceholderConfig, StoreOptions},
    render::OutputFormat,
};

#[derive(Clone, Debug, Parser)]
#[command(
    name = "famgraph",
    version,
    about = "Compile a family tree database into a Graphviz diagram"
)]
pub struct CommandLineConfig {
    /// Database locator: a path, `memory`, or `sqlite:///<path>`.
    #[arg(long = "db", visible_alias = "database", global = true, default_value = DEFAULT_LOCATOR)]
    pub database: String,

    /// Log filter, e.g. `debug` or `famgraph=trace`. Falls back to RUST_LOG.
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Render the tree through the layout engine (default).
    Render(RenderArgs),
    /// Print the DOT description to stdout.
    Dot(DotArgs),
    /// Print person and relation counts.
    Status,
    /// List every person.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Report orphan relations, self-loops and blank names.
    Check,
}

#[derive(Clone, Debug, Args)]
pub struct LoadArgs {
    /// Render even when relations form a cycle.
    #[arg(long)]
    pub allow_cycles: bool,

    /// Give up on the database fetch after this many seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl Default for LoadArgs {
    fn default() -> Self {
        Self {
            allow_cycles: false,
            timeout_secs: 30,
        }
    }
}

impl LoadArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            store: StoreOptions {
                fetch_timeout: Duration::from_secs(self.timeout_secs),
            },
            allow_cycles: self.allow_cycles,
        }
    }
}

#[derive(Clone, Debug, Default, Args)]
pub struct PlaceholderArgs {
    /// Caption of the generated portrait for people without an image.
    #[arg(long)]
    pub caption: Option<String>,

    /// Directory to write the generated portrait into.
    #[arg(long)]
    pub placeholder_dir: Option<PathBuf>,
}

impl PlaceholderArgs {
    pub fn placeholder_config(&self) -> PlaceholderConfig {
        let mut config = PlaceholderConfig::default();
        if let Some(caption) = &self.caption {
            config.caption = caption.clone();
        }
        config.directory = self.placeholder_dir.clone();
        config
    }
}

#[derive(Clone, Debug, Args)]
pub struct RenderArgs {
    /// Output file. Defaults to `output/family-tree.<ext>`.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    #[arg(long, short, default_value = "pdf")]
    pub format: OutputFormat,

    /// Layout engine executable.
    #[arg(long, default_value = "dot")]
    pub engine: PathBuf,

    #[command(flatten)]
    pub load: LoadArgs,

    #[command(flatten)]
    pub placeholder: PlaceholderArgs,
}

impl Default for RenderArgs {
    fn default() -> Self {
        Self {
            output: None,
            format: OutputFormat::Pdf,
            engine: PathBuf::from("dot"),
            load: LoadArgs::default(),
            placeholder: PlaceholderArgs::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Args)]
pub struct DotArgs {
    #[command(flatten)]
    pub load: LoadArgs,

    #[command(flatten)]
    pub placeholder: PlaceholderArgs,
}

impl CommandLineConfig {
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Render(RenderArgs::default()))
    }

    pub fn pipeline_config(&self, args: &RenderArgs) -> PipelineConfig {
        let destination = args
            .output
            .clone()
            .unwrap_or_else(|| args.format.default_destination());
        PipelineConfig {
            locator: self.database.clone(),
            destination,
            format: args.format,
            load: args.load.load_options(),
            placeholder: args.placeholder.placeholder_config(),
        }
    }
}

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use famgraph::{
    FamGraphError, RecordStore,
    assets::AssetResolver,
    cli::{Command, CommandLineConfig},
    pipeline::{build_and_render_with, compile_diagram, load_graph_with},
    render::GraphvizEngine,
    safety::run_integrity_checks,
};

fn main() {
    let config = CommandLineConfig::parse();
    init_tracing(config.log.as_deref());

    if let Err(err) = run_command(&config) {
        eprintln!("command failed: {err}");
        let code = match err {
            FamGraphError::ConnectionError(_) => 2,
            _ => 1,
        };
        process::exit(code);
    }
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_command(config: &CommandLineConfig) -> Result<(), FamGraphError> {
    match config.command() {
        Command::Render(args) => {
            let pipeline = config.pipeline_config(&args);
            let engine = GraphvizEngine::new(args.engine.clone());
            let output = build_and_render_with(&pipeline, Box::new(engine))?;
            println!("{}", output.display());
            Ok(())
        }
        Command::Dot(args) => {
            let graph = load_graph_with(&config.database, &args.load.load_options())?;
            let assets = AssetResolver::new(args.placeholder.placeholder_config());
            let builder = compile_diagram(&graph, assets)?;
            print!("{}", builder.to_dot());
            Ok(())
        }
        Command::Status => {
            let store = RecordStore::open(&config.database)?;
            println!(
                "persons={} relations={}",
                store.person_count()?,
                store.relation_count()?
            );
            Ok(())
        }
        Command::List { json } => {
            let store = RecordStore::open(&config.database)?;
            for id in store.list_person_ids()? {
                let person = store.get_person(id)?;
                if json {
                    let line = serde_json::to_string(&person)
                        .map_err(|e| FamGraphError::invalid_input(e.to_string()))?;
                    println!("{line}");
                } else {
                    println!("{}:{}", person.id, person.name);
                }
            }
            Ok(())
        }
        Command::Check => {
            let store = RecordStore::open(&config.database)?;
            let report = run_integrity_checks(&store)?;
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| FamGraphError::invalid_input(e.to_string()))?;
            println!("{json}");
            if report.has_issues() {
                return Err(FamGraphError::invalid_input("integrity checks failed"));
            }
            Ok(())
        }
    }
}

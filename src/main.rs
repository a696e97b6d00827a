//! `phpactor` command-line entry point.
//!
//! Each invocation builds one engine, runs one request and prints the
//! result as JSON on stdout.  Errors go to stderr as JSON too.
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use phpactor_core::generation::GeneratorOptions;
use phpactor_core::{ClassName, Config, Engine, EngineError};

/// PHP source intelligence: offsets, completion, generation and moves.
#[derive(Parser)]
#[command(name = "phpactor")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Project root (default: current directory)
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the scope and inferred type at an offset.
    #[command(name = "offset-info")]
    OffsetInfo { path: PathBuf, offset: u32 },

    /// List completion suggestions at an offset.
    Complete { path: PathBuf, offset: u32 },

    /// Generate a snippet for a class (name or file path).
    #[command(name = "generate-snippet")]
    GenerateSnippet {
        kind: String,
        class: String,
        /// Generator options as a JSON object
        #[arg(long, default_value = "{}")]
        options: String,
    },

    /// Move a class to a new fully-qualified name.
    #[command(name = "class-move")]
    ClassMove { from: String, to: String },

    /// Print the file path a class name maps to.
    #[command(name = "class-path")]
    ClassPath { class: String },

    /// Print the class name a file path maps to.
    #[command(name = "class-name")]
    ClassName { path: PathBuf },

    /// Print the reflected class declared in a file.
    Explain { path: PathBuf },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env("PHPACTOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn to_json(value: &impl Serialize) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value).map_err(|e| EngineError::Config {
        path: PathBuf::from("<output>"),
        message: e.to_string(),
    })
}

fn parse_options(raw: &str) -> Result<GeneratorOptions, EngineError> {
    serde_json::from_str(raw).map_err(|e| EngineError::InvalidOption {
        generator: "*".to_string(),
        option: "--options".to_string(),
        value: format!("{} ({})", raw, e),
    })
}

fn execute(engine: &Engine, command: Command) -> Result<String, EngineError> {
    match command {
        Command::OffsetInfo { path, offset } => to_json(&engine.resolve_offset(&path, offset)?),
        Command::Complete { path, offset } => to_json(&engine.complete(&path, offset)?),
        Command::GenerateSnippet {
            kind,
            class,
            options,
        } => {
            let options = parse_options(&options)?;
            let class = if class.ends_with(".php") {
                engine.class_from_file(&PathBuf::from(class))?
            } else {
                ClassName::from_fqcn(&class)
            };
            to_json(&engine.generate_snippet(&kind, &class, &options)?)
        }
        Command::ClassMove { from, to } => to_json(
            &engine.move_class(&ClassName::from_fqcn(&from), &ClassName::from_fqcn(&to))?,
        ),
        Command::ClassPath { class } => {
            to_json(&engine.resolve_path(&ClassName::from_fqcn(&class))?)
        }
        Command::ClassName { path } => to_json(&engine.resolve_class_name(&path)?),
        Command::Explain { path } => to_json(&engine.explain(&path)?),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let cwd = match cli.cwd.map(Ok).unwrap_or_else(std::env::current_dir) {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("{}", json!({ "error": format!("cannot determine current directory: {}", e) }));
            return ExitCode::from(2);
        }
    };

    let result = Config::load(cwd)
        .and_then(Engine::new)
        .and_then(|engine| execute(&engine, cli.command));

    match result {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", json!({ "error": e.to_string() }));
            ExitCode::from(1)
        }
    }
}

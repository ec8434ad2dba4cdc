//! # flowgraph
//!
//! Validate, inspect and run flow definitions with the demo node set.

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowgraph_cli::commands;
use flowgraph_core::{FlowEvent, RunInput, VisualizationFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowgraph")]
#[command(about = "Compile and run visual flow definitions", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML settings file
    #[arg(short, long, global = true, env = "FLOWGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a flow definition without compiling it
    Validate {
        /// Path to a JSON or YAML flow
        file: PathBuf,
    },

    /// Compile a flow and print its topology or a diagram
    Inspect {
        /// Path to a JSON or YAML flow
        file: PathBuf,

        /// Diagram format (mermaid, dot)
        #[arg(short, long)]
        format: Option<VisualizationFormat>,
    },

    /// Run a flow
    Run {
        /// Path to a JSON or YAML flow
        file: PathBuf,

        /// Run input text
        #[arg(short, long, default_value = "")]
        input: String,

        #[arg(long)]
        session_id: Option<String>,

        /// Initial variable as key=value (repeatable)
        #[arg(long = "var")]
        variables: Vec<String>,

        /// Print events as JSON lines while the flow runs
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowgraph=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match execute(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Run the command; `Ok(false)` when it completed but reported a failure
async fn execute(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Validate { file } => {
            let report = commands::validate(&file)?;
            for error in &report.errors {
                println!("error: {}", error);
            }
            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            println!("{}: {}", file.display(), if report.valid { "valid" } else { "invalid" });
            Ok(report.valid)
        }
        Commands::Inspect { file, format } => {
            let settings = commands::load_settings(cli.config.as_deref())?;
            println!("{}", commands::inspect(&file, &settings, format)?);
            Ok(true)
        }
        Commands::Run {
            file,
            input,
            session_id,
            variables,
            stream,
        } => {
            let settings = commands::load_settings(cli.config.as_deref())?;
            let mut run_input = RunInput::new(input);
            run_input.session_id = session_id;
            run_input.variables = commands::parse_variables(&variables)?;

            if stream {
                let mut stdout = std::io::stdout().lock();
                let terminal = commands::run_streaming(&file, &settings, run_input, &mut stdout).await?;
                Ok(matches!(terminal, Some(FlowEvent::Complete { .. })))
            } else {
                let result = commands::run(&file, &settings, run_input).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
                Ok(result.success)
            }
        }
    }
}

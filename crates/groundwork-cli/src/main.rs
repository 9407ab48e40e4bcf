//! groundwork CLI tool.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "groundwork")]
#[command(about = "Declarative provisioning and pipeline orchestration", long_about = None)]
struct Cli {
    /// Directory holding per-stack applied state
    #[arg(long, env = "GROUNDWORK_STATE_DIR", default_value = ".groundwork/state")]
    state_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize the resolved graph and print its deployment batches
    Synth {
        /// Path to the stack declaration file
        path: String,
        /// Emit the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a deploy would change, without applying anything
    Plan {
        /// Path to the stack declaration file
        path: String,
    },
    /// Apply the declared stacks batch by batch
    Deploy {
        /// Path to the stack declaration file
        path: String,
    },
    /// Destroy everything declared, in reverse creation order
    Destroy {
        /// Path to the stack declaration file
        path: String,
    },
    /// Execute a pipeline run
    Run {
        /// Path to the stack declaration file
        stacks: String,
        /// Path to the pipeline definition file
        pipeline: String,
        /// Source revision to build
        #[arg(long, default_value = "main")]
        revision: String,
    },
    /// Validate stack and pipeline declarations
    Validate {
        /// Path to the stack declaration file
        stacks: String,
        /// Path to the pipeline definition file
        #[arg(long)]
        pipeline: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth { path, json } => {
            commands::stacks::synth(&path, json)?;
        }
        Commands::Plan { path } => {
            commands::stacks::plan(&path, &cli.state_dir)?;
        }
        Commands::Deploy { path } => {
            commands::stacks::deploy(&path, &cli.state_dir).await?;
        }
        Commands::Destroy { path } => {
            commands::stacks::destroy(&path, &cli.state_dir).await?;
        }
        Commands::Run {
            stacks,
            pipeline,
            revision,
        } => {
            commands::run::run(&stacks, &pipeline, &revision, &cli.state_dir).await?;
        }
        Commands::Validate { stacks, pipeline } => {
            commands::stacks::validate(&stacks, pipeline.as_deref())?;
        }
    }

    Ok(())
}

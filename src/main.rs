//! Command-line front end for the AxiomHive router.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use axiomhive::router::ModelSelection;
use axiomhive::{AxiomRouter, RouterConfig};

#[derive(Parser)]
#[command(
    name = "axiomhive",
    version,
    about = "Model-routing layer: remote Gemini generation with a local deterministic fallback"
)]
struct Cli {
    /// Skip the remote backend even when a credential is present.
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a kernel command through the active backend.
    Command {
        /// Command text.
        input: String,
        /// Model selection for this invocation: pro, flash, or auto.
        #[arg(long, default_value = "pro")]
        model: ModelSelection,
    },
    /// Run a search-grounded query and list its sources.
    Search { query: String },
    /// Refine a query through bounded recursive analysis, then answer it.
    Recursive {
        query: String,
        /// Number of refinement passes before the final answer.
        #[arg(long, default_value_t = 2)]
        depth: i32,
    },
    /// Answer a query with grounding scores and ontology validation.
    Grounded {
        query: String,
        /// Ontology constraint; repeatable. No constraints skips validation.
        #[arg(long = "constraint")]
        constraints: Vec<String>,
    },
    /// Print a telemetry snapshot as JSON.
    Telemetry,
    /// Report which backend the router is configured to reach.
    Backend,
    /// Report the local engine's hardware sizing.
    Hardware,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = RouterConfig::from_env();
    config.force_local |= cli.local;
    let router = AxiomRouter::from_config(config);

    match cli.command {
        Command::Command { input, model } => {
            router.switch_model(model);
            let result = router.process_command(&input).await?;
            println!("{}", result.text);
            eprintln!(
                "[{} | {:.1} ms | ~{} tokens]",
                result.source, result.elapsed_ms, result.token_estimate
            );
        }
        Command::Search { query } => {
            let report = router.search_intel(&query).await?;
            println!("{}", report.text);
            for source in &report.sources {
                eprintln!(
                    "source: {} {}",
                    source.title.as_deref().unwrap_or("(untitled)"),
                    source.uri.as_deref().unwrap_or("")
                );
            }
        }
        Command::Recursive { query, depth } => {
            println!("{}", router.recursive_query(&query, depth).await?);
        }
        Command::Grounded { query, constraints } => {
            let report = router.grounded_query(&query, &constraints).await?;
            println!("{}", report.response);
            for score in &report.grounding {
                eprintln!("grounding: {} ({:.2})", score.source, score.relevance);
            }
            eprintln!(
                "ontology: {}",
                if report.ontology_valid { "VALID" } else { "INVALID" }
            );
        }
        Command::Telemetry => {
            let entries = router.system_telemetry().await;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        Command::Backend => {
            println!("{}", router.active_backend());
        }
        Command::Hardware => {
            println!("{}", serde_json::to_string_pretty(&router.hardware_info())?);
        }
    }

    Ok(())
}

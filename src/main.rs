use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quill::config::{CliOverrides, QuillConfig};
use quill::client::CliGenerator;
use quill::pipeline::{Pipeline, RunParams};
use quill::store::ArtifactStore;
use quill::ui;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Pass-pipeline orchestrator for long-form content production")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root holding quill.toml, personas/ and series/
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline for one topic
    Run {
        /// Topic directory; artifacts are written here
        #[arg(long)]
        topic_dir: PathBuf,

        /// Persona to write as (personas/<name>.md)
        #[arg(long)]
        persona: String,

        /// Series this article belongs to, for the lessons log
        #[arg(long)]
        series: Option<String>,

        /// Pass to start from (1-5); later starts resume from artifacts
        #[arg(long, default_value_t = 1)]
        start_pass: u8,

        /// Run the iterate loop before final assembly
        #[arg(long)]
        iterate: bool,

        /// Cap on iterate-loop rounds
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Override the configured model
        #[arg(long)]
        model: Option<String>,

        /// Override the configured effort for every pass
        #[arg(long)]
        effort: Option<String>,
    },
    /// List the artifacts checkpointed in a topic directory
    Status {
        #[arg(long)]
        topic_dir: PathBuf,

        /// Emit the inventory as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration file management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default quill.toml to the project root
    Init,
    /// Print the resolved configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quill=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            topic_dir,
            persona,
            series,
            start_pass,
            iterate,
            max_iterations,
            model,
            effort,
        } => {
            let config = QuillConfig::load(
                &cli.project_root,
                CliOverrides {
                    model,
                    effort,
                    max_iterations,
                },
            )?;
            let topic = topic_dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| topic_dir.display().to_string());
            ui::print_run_banner(&topic, &persona, start_pass);

            let generator = CliGenerator::new(config.generator_cmd.clone(), config.retry.clone());
            let pipeline = Pipeline::new(&config, &generator);
            let params = RunParams {
                topic_dir: topic_dir.clone(),
                persona,
                series,
                start_pass,
                iterate,
            };
            let report = pipeline
                .run(&params)
                .await
                .context("Pipeline run failed")?;
            ui::print_report(&report);
            ui::print_inventory(&ArtifactStore::new(topic_dir));
        }
        Commands::Status { topic_dir, json } => {
            let store = ArtifactStore::new(topic_dir);
            if json {
                let inventory: Vec<_> = store
                    .list()
                    .into_iter()
                    .map(|(key, bytes)| serde_json::json!({ "key": key, "bytes": bytes }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&inventory)?);
            } else {
                ui::print_inventory(&store);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Init => {
                let path = QuillConfig::init_file(&cli.project_root)?;
                println!("Wrote {}", path.display());
            }
            ConfigAction::Show => {
                let config = QuillConfig::load(&cli.project_root, CliOverrides::default())?;
                println!("{:#?}", config);
            }
        },
    }

    Ok(())
}

//! Zonos Manager - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zonos_manager::prompt::{Prompter, ScriptedPrompter, TerminalPrompter};
use zonos_manager::{App, config::ManagerConfig};

#[derive(Parser, Debug)]
#[command(name = "zonos-manager")]
#[command(about = "Model and repository manager for Zonos", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override installation directory
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format (json or pretty)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every model that is missing or fails verification
    DownloadModels,

    /// Verify downloaded models without downloading anything
    VerifyModels {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the repository and models for updates and apply them
    Update {
        /// Answer the update question non-interactively (yes/no or repo/models/both/none)
        #[arg(long)]
        answer: Option<String>,
    },

    /// Remove the repository, the models and leftover caches
    Uninstall {
        /// Also remove the per-user transformers cache
        #[arg(long)]
        shared_cache: bool,
    },

    /// Launch a web interface from the repository
    Run {
        /// Interface directory name; prompts when omitted
        #[arg(long)]
        interface: Option<String>,
    },

    /// Check that required external tools are installed
    CheckEnv,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    match cli.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(&cli.log_level)
                .init();
        }
    }

    // Load configuration
    let mut config = ManagerConfig::load(cli.config.or_else(ManagerConfig::default_path))?;

    // CLI overrides
    if let Some(install_dir) = cli.install_dir {
        config.install_dir = install_dir;
    }

    config.validate()?;

    tracing::debug!(
        install_dir = ?config.install_dir,
        repo = ?config.repo_path(),
        cache_root = ?config.cache_root(),
        "Configuration loaded"
    );

    let app = App::new(config);

    match cli.command {
        Command::DownloadModels => {
            let outcome = app.download_models().await?;
            println!(
                "\nDownloaded {} model(s), {} already verified",
                outcome.downloaded.len(),
                outcome.skipped.len()
            );
        }
        Command::VerifyModels { json } => {
            let Some(report) = app.verify_models().await? else {
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !report.all_verified() {
                println!("\nVerification summary:");
                for entry in report.failed() {
                    if let Some(failure) = &entry.failure {
                        println!("  x {} ({})", entry.display_name, failure);
                    }
                }
                println!("\nYou may continue using verified models, or re-download the failed ones.");
            }
        }
        Command::Update { answer } => {
            let mut prompter = prompter_for(answer.as_deref());
            app.update(prompter.as_mut()).await?;
        }
        Command::Uninstall { shared_cache } => {
            let mut prompter = TerminalPrompter;
            if let Some(summary) = app.uninstall(&mut prompter, shared_cache)? {
                println!("\nUninstallation summary:");
                if summary.is_clean() {
                    println!("All Zonos files and directories removed successfully.");
                } else {
                    println!("Some items could not be removed:");
                    for error in &summary.errors {
                        println!("  - {}", error);
                    }
                }
            }
        }
        Command::Run { interface } => {
            let mut prompter = TerminalPrompter;
            let code = app.run(interface.as_deref(), &mut prompter).await?;
            std::process::exit(code);
        }
        Command::CheckEnv => {
            app.check_env()?;
            println!("All required tools are installed.");
        }
    }

    Ok(())
}

fn prompter_for(answer: Option<&str>) -> Box<dyn Prompter> {
    match answer {
        Some(answer) => Box::new(ScriptedPrompter::new(&[answer])),
        None => Box::new(TerminalPrompter),
    }
}

//! vaultid - Stable identifiers for markdown notes
//!
//! Main entry point for the command-line application.
//!
//! # Overview
//!
//! This binary wires the library together for one command:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime for the per-note tasks
//! - Settings loading ([`ConfigManager`]) and ownership ([`SettingsManager`])
//! - Command dispatch ([`CommandController`])
//!
//! # Execution Flow
//!
//! 1. Parse arguments
//! 2. Initialize logging → `<vault>/.vaultid/logs/vaultid.<date>`
//! 3. Load `vaultid.yaml`, falling back to defaults if it is broken
//! 4. Create tokio runtime
//! 5. Run the command, print its result
//! 6. Log the metrics summary

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use vaultid::cli::{Cli, CommandController, Commands};
use vaultid::services::ExclusionReason;
use vaultid::{
    APP_NAME, AssignOutcome, AssignmentEngine, ConfigManager, SettingsManager, VERSION, VaultStore,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = cli.log_dir();
    let _guard =
        vaultid::logging::setup_logging_with_console(log_dir.as_str(), APP_NAME, cli.debug, !cli.quiet)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(cli.config_dir())?;
    let settings = config_manager.load_settings_or_default();
    let concurrency = settings.concurrency();
    let settings_manager = SettingsManager::new(settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("vaultid-worker")
        .build()?;

    let store = Arc::new(VaultStore::new(&cli.vault));
    let engine = AssignmentEngine::new(store).with_concurrency(concurrency);
    let metrics = Arc::clone(engine.metrics());
    let controller = CommandController::new(settings_manager, config_manager, engine);

    let result = runtime.block_on(run_command(&controller, cli.command));

    metrics.log_summary();
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    result.inspect_err(|e| tracing::error!("{:#}", e))
}

async fn run_command(controller: &CommandController<VaultStore>, command: Commands) -> Result<()> {
    match command {
        Commands::AssignAll => {
            let report = controller.assign_all().await?;
            println!("{}", report.summary());
            for failure in &report.failures {
                println!("  failed: {}: {}", failure.path, failure.message);
            }
        }
        Commands::Assign { path } => match controller.assign(&path).await? {
            AssignOutcome::Assigned(id) => println!("{}: assigned {}", path, id),
            AssignOutcome::AlreadyPresent => println!("{}: already has an ID", path),
            AssignOutcome::Excluded(ExclusionReason::Matched) => {
                println!("{}: ignored", path)
            }
            AssignOutcome::Excluded(ExclusionReason::InvalidPattern(invalid)) => {
                println!("{}: skipped, {}", path, invalid)
            }
        },
        Commands::SetKey { key } => {
            let report = controller.set_id_key(&key).await?;
            println!("ID key is now {:?}; {}", key, report.summary());
            for failure in &report.failures {
                println!("  failed: {}: {}", failure.path, failure.message);
            }
        }
        Commands::SetIgnore { patterns, file } => {
            match file {
                Some(file) => controller.set_ignore_patterns_from_file(&file)?,
                None => controller.set_ignore_patterns(patterns)?,
            }
            let count = controller
                .settings_manager()
                .read(|s| s.ignore_patterns().len());
            println!("Saved {} ignore patterns", count);
        }
        Commands::ShowConfig { strict } => {
            print!("{}", controller.show_config(strict)?);
        }
        Commands::Watch { initial_scan } => {
            controller.watch(initial_scan).await?;
        }
    }

    Ok(())
}

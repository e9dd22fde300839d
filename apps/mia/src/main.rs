//! mia - Managed software install agent for macOS
//!
//! Runs install/removal sessions over the install plan written by the update
//! check, and maintains the package receipt database.

mod cli;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use mia_config::Config;
use mia_events::{EventReceiver, EventSender};
use mia_install::{InstallConfig, ManagedInstaller, SessionContext, SessionOutcome};
use mia_platform::{MacOSPlatform, Platform};
use mia_receipts::{ReceiptDb, ReceiptDbOptions};
use mia_types::ItemKind;
use serde_json::json;
use std::process;
use std::sync::Arc;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Process exit status when the session could not run at all
const EXIT_FAILURE: i32 = -1;

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(EXIT_FAILURE);
        }
    }
}

/// Everything a command needs once configuration is resolved
struct Runtime {
    config: Config,
    platform: Platform,
    cancel: CancellationToken,
    events: EventSender,
    json: bool,
}

/// Main application logic; returns the process exit status
async fn run(cli: Cli) -> Result<i32, CliError> {
    info!("Starting mia v{}", env!("CARGO_PKG_VERSION"));

    // File config (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.command);

    let platform = MacOSPlatform::new(
        config.staged_os_installer_info_path(),
        config.self_serve_manifest_path(),
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping at the next item boundary");
            interrupt.cancel();
        }
    });

    let (event_sender, event_receiver) = mia_events::channel();
    let runtime = Runtime {
        config,
        platform,
        cancel,
        events: event_sender,
        json: cli.global.json,
    };
    let mut event_handler = EventHandler::new(cli.global.json);

    let code =
        execute_command_with_events(cli.command, runtime, event_receiver, &mut event_handler)
            .await?;
    info!("Command completed");
    Ok(code)
}

/// Execute command with concurrent event handling
async fn execute_command_with_events(
    command: Commands,
    runtime: Runtime,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<i32, CliError> {
    let mut command_future = Box::pin(execute_command(command, runtime));

    loop {
        select! {
            result = &mut command_future => {
                // Drain any remaining events
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                match event {
                    Some(event) => event_handler.handle_event(event),
                    None => { /* Channel closed: keep waiting for command to finish */ }
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(command: Commands, runtime: Runtime) -> Result<i32, CliError> {
    match command {
        Commands::Run { unattended, .. } => {
            let installer = ManagedInstaller::new(
                runtime.platform.clone(),
                InstallConfig::from_config(&runtime.config),
            );
            let ctx = SessionContext::new()
                .with_only_unattended(unattended)
                .with_cancel(runtime.cancel.clone())
                .with_event_sender(runtime.events.clone());
            let outcome = installer.run(ctx).await?;
            render_outcome(&outcome, runtime.json);
            Ok(outcome.exit_code())
        }

        Commands::RebuildReceipts { force } => {
            let db = open_receipts(&runtime, force).await?;
            let packages = db.package_count().await?;
            let paths = db.path_count().await?;
            if runtime.json {
                println!("{}", json!({"packages": packages, "paths": paths}));
            } else {
                println!("Receipt database holds {packages} packages and {paths} paths");
            }
            Ok(0)
        }

        Commands::OwnedPaths { packages } => {
            let db = open_receipts(&runtime, false).await?;
            let keys = db.package_keys(&packages).await?;
            let paths = db.paths_owned_only_by(&keys).await?;
            if runtime.json {
                println!("{}", json!({"packages": packages, "paths": paths}));
            } else {
                for path in paths {
                    println!("/{path}");
                }
            }
            Ok(0)
        }
    }
}

async fn open_receipts(runtime: &Runtime, force: bool) -> Result<ReceiptDb, CliError> {
    let options = ReceiptDbOptions {
        db_path: runtime.config.receipt_db_path(),
        install_history: runtime.config.install_history_path(),
        receipts_dir: runtime.config.receipts_dir(),
        import_concurrency: runtime.config.session.import_concurrency,
    };
    let db = ReceiptDb::open(
        options,
        Arc::clone(&runtime.platform.registry),
        runtime.events.clone(),
        force,
        &runtime.cancel,
    )
    .await?;
    Ok(db)
}

fn render_outcome(outcome: &SessionOutcome, json_mode: bool) {
    if json_mode {
        let summary = json!({
            "session_id": outcome.session_id,
            "restart_needed": outcome.restart_needed(),
            "cancelled": outcome.cancelled,
            "install_results": outcome.install_results,
            "removal_results": outcome.removal_results,
            "skipped_installs": outcome.skipped_installs,
            "skipped_removals": outcome.skipped_removals,
        });
        println!("{summary}");
        return;
    }

    for result in &outcome.removal_results {
        eprintln!("{}", result.log_line(ItemKind::Removal));
    }
    for result in &outcome.install_results {
        eprintln!("{}", result.log_line(ItemKind::Install));
    }
    if outcome.restart_needed() {
        eprintln!("A restart is required to finish this session.");
    }
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let default_filter = if debug_enabled {
        "info,mia=debug,mia_install=debug,mia_receipts=debug"
    } else {
        "info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if json_mode {
        // JSON records go to stdout alongside the final summary
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stdout)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, command: &Commands) {
    if let Commands::Run {
        suppress_pkgutil_forget: true,
        ..
    } = command
    {
        config.session.suppress_pkgutil_forget = true;
    }
}

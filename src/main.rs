use clap::Parser;
use std::sync::Arc;
use ticket_validator::utils::error::{ErrorSeverity, TicketError};
use ticket_validator::utils::monitor::SystemMonitor;
use ticket_validator::utils::{logger, validation::Validate};
use ticket_validator::{start_server, AppState, CliArgs};

fn exit_with(e: &TicketError) -> ! {
    tracing::error!(
        "❌ Startup failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low | ErrorSeverity::High => 1,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting ticket-validator");

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => exit_with(&e),
    };
    tracing::debug!("Effective config: {:?}", config);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    let monitor = Arc::new(SystemMonitor::new(config.monitor));
    if monitor.is_enabled() {
        tracing::info!("🔍 System monitoring enabled");
    }

    let state = match AppState::from_config(&config, Arc::clone(&monitor)) {
        Ok(state) => state,
        Err(e) => exit_with(&e),
    };

    start_server(&config.bind_addr, state).await?;

    monitor.log_final_stats();
    tracing::info!("ticket-validator stopped");
    Ok(())
}

//! Run command handler.
//!
//! Starts the server, prints every published event as a JSON line and
//! reads console commands from stdin until `quit`, end of input or Ctrl+C.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use vigil_core::{OperationType, ProcessError};
use vigil_ops::{StartOutcome, StartParams};

use super::console::{ConsoleCommand, HELP};
use crate::bootstrap::CliContext;
use crate::error::CliError;

const CONSOLE_USER: &str = "console";

pub async fn execute(ctx: &CliContext) -> Result<(), CliError> {
    let printer = spawn_event_printer(ctx);

    if let Err(e) = ctx.engine.start().await {
        printer.abort();
        ctx.operations.shutdown().await;
        return Err(CliError::Process(e.to_string()));
    }

    if let Some(cron) = &ctx.config.operations.periodic_restart_cron {
        match ctx
            .operations
            .schedule_periodic(cron, &ctx.config.operations.timezone)
            .await
        {
            Ok(_) => info!(cron = %cron, "Periodic restart registered"),
            Err(e) => warn!(error = %e, "Periodic restart not registered"),
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read console input");
                        break;
                    }
                };
                match ConsoleCommand::parse(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => handle(ctx, command).await,
                    Ok(None) => {}
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    ctx.operations.shutdown().await;
    let stopped = ctx.engine.stop().await;
    printer.abort();
    match stopped {
        Ok(()) | Err(ProcessError::NotRunning) => Ok(()),
        Err(e) => Err(CliError::Process(e.to_string())),
    }
}

fn spawn_event_printer(ctx: &CliContext) -> tokio::task::JoinHandle<()> {
    let mut events = ctx.engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => println!("{json}"),
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn handle(ctx: &CliContext, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Restart { delay_minutes } => {
            start(ctx, OperationType::Restart, delay_minutes).await;
        }
        ConsoleCommand::Stop { delay_minutes } => {
            start(ctx, OperationType::Stop, delay_minutes).await;
        }
        ConsoleCommand::Cancel => cancel(ctx).await,
        ConsoleCommand::Status => status(ctx).await,
        ConsoleCommand::Players => players(ctx).await,
        ConsoleCommand::Help | ConsoleCommand::Quit => println!("{HELP}"),
    }
}

async fn start(ctx: &CliContext, op: OperationType, delay_minutes: Option<u64>) {
    let params = StartParams {
        delay_minutes,
        ..StartParams::default()
    };
    match ctx
        .operations
        .start_operation(op.as_str(), CONSOLE_USER, params)
        .await
    {
        Ok(StartOutcome::Started(info)) => {
            println!("{op} scheduled in {} minute(s)", info.remaining_minutes());
        }
        Ok(StartOutcome::Rejected { active }) => {
            println!(
                "{} is already scheduled ({} minute(s) left)",
                active.operation_type,
                active.remaining_minutes()
            );
        }
        Err(e) => eprintln!("{e}"),
    }
}

async fn cancel(ctx: &CliContext) {
    let Some(active) = ctx.operations.current_operation().await else {
        println!("Nothing to cancel");
        return;
    };
    match ctx
        .operations
        .stop_operation(active.operation_type.as_str(), CONSOLE_USER)
        .await
    {
        Ok(true) => println!("{} cancelled", active.operation_type),
        Ok(false) => println!("Nothing to cancel"),
        Err(e) => eprintln!("{e}"),
    }
}

async fn status(ctx: &CliContext) {
    let state = ctx.engine.state().await;
    println!(
        "running: {}  ready: {}  version: {}",
        ctx.engine.is_running().await,
        ctx.engine.is_ready(),
        state.version.as_deref().unwrap_or("--")
    );
    for op in ctx.operations.list_operations().await {
        let detail = match (&op.cron_expression, op.is_active()) {
            (Some(cron), true) => format!(" ({cron})"),
            (None, true) => format!(" ({} minute(s) left)", op.remaining_minutes()),
            _ => String::new(),
        };
        println!("  {:<18} {:?}{detail}", op.operation_type.as_str(), op.status);
    }
}

async fn players(ctx: &CliContext) {
    let players = ctx.engine.connected_players().await;
    if players.is_empty() {
        println!("No players connected");
        return;
    }
    println!("{:<6} {:<20} {:<20} Admin", "Index", "Character", "Steam ID");
    for player in players {
        println!(
            "{:<6} {:<20} {:<20} {}",
            player.approved_user_index,
            player.character_name.as_deref().unwrap_or("--"),
            player.steam_id.as_deref().unwrap_or("--"),
            player.is_admin.unwrap_or(false)
        );
    }
}

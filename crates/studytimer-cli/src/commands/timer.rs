use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use studytimer_core::remote;
use studytimer_core::timer::format_hms;
use studytimer_core::{
    Config, ControllerOptions, Database, Event, Score, StaticIdentity, SystemClock,
    TimerController,
};
use tracing::debug;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a study session (or pick up an unfinished one)
    Start,
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Finish the session with a productivity rating
    Finish {
        /// Productivity 1-10 (defaults to timer.default_productivity)
        #[arg(long)]
        productivity: Option<i64>,
        /// Free-form note
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Pause and show what finishing now would record
    End,
    /// Close the finish prompt without ending the session
    Cancel,
    /// Drop the session without recording it
    Discard,
    /// Print current timer state as JSON
    Status,
    /// Print a snapshot on every tick
    Watch {
        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
}

async fn open_controller(config: &Config) -> Result<TimerController, Box<dyn std::error::Error>> {
    let store = Database::open()?;
    let remote = remote::from_config(config)?;
    debug!(store = remote.name(), "opening timer");
    let identity = Arc::new(StaticIdentity::from_config(config));
    let options = ControllerOptions {
        clock: Arc::new(SystemClock),
        tick_interval: Duration::from_millis(config.timer.tick_interval_ms),
    };
    Ok(TimerController::open(store, remote, identity, options).await)
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub async fn run(action: TimerAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let controller = open_controller(config).await?;

    let event = match action {
        TimerAction::Start => {
            super::require_user(config)?;
            controller.start().await
        }
        TimerAction::Pause => controller.pause().await,
        TimerAction::Resume => controller.resume().await,
        TimerAction::Finish { productivity, note } => {
            let productivity = Score::new(
                productivity.unwrap_or(i64::from(config.timer.default_productivity)),
            )?;
            let event = controller.finish(productivity, note).await;
            if let Some(Event::SessionFinished {
                elapsed_secs,
                total_break_secs,
                ..
            }) = &event
            {
                eprintln!(
                    "studied {}, breaks {}",
                    format_hms(*elapsed_secs),
                    format_hms(*total_break_secs)
                );
            }
            event
        }
        TimerAction::End => controller.begin_finish().await,
        TimerAction::Cancel => controller.cancel_finish().await,
        TimerAction::Discard => Some(controller.discard().await),
        TimerAction::Status => {
            let snapshot = controller.snapshot().await;
            eprintln!("{snapshot}");
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            controller.shutdown().await;
            return Ok(());
        }
        TimerAction::Watch { ticks } => {
            watch(&controller, ticks).await?;
            controller.shutdown().await;
            return Ok(());
        }
    };

    match event {
        Some(event) => print_event(&event)?,
        None => {
            // Nothing changed; show where the timer stands instead.
            let snapshot = controller.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }
    controller.shutdown().await;
    Ok(())
}

async fn watch(
    controller: &TimerController,
    ticks: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rx = controller.subscribe();
    if !controller.is_ticking().await {
        let snapshot = controller.snapshot().await;
        print_event(&Event::Tick { snapshot })?;
        return Ok(());
    }

    let mut seen = 0u64;
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        eprintln!("{snapshot}");
        println!("{}", serde_json::to_string(&Event::Tick { snapshot })?);
        seen += 1;
        if ticks.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    Ok(())
}

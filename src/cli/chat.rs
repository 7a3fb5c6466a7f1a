//! `thinkstream chat`: stream one reply to the terminal.

use std::collections::HashMap;
use std::io::Write;

use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

use crate::config::ThinkstreamConfig;
use crate::engine::StreamEngine;
use crate::thinking::TurnControls;
use crate::turn::{TurnCommand, TurnDriver};
use crate::types::{RenderSnapshot, StepId, StepStatus, ThoughtStep};
use crate::typewriter::MotionPreference;
use crate::util::timeout::with_optional_timeout;

use super::ChatArgs;

/// Handle `thinkstream chat <prompt>`.
pub async fn handle_chat(
    args: ChatArgs,
    mut config: ThinkstreamConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    args.apply(&mut config);
    config.validate()?;
    let endpoint = config.require_endpoint()?.to_string();

    let message_id = Uuid::new_v4().to_string();
    let payload = serde_json::json!({
        "message_id": message_id,
        "message": args.prompt,
    });

    let mut engine = StreamEngine::from_config(&config);
    let events = engine.start_channel(endpoint, payload)?;
    let controls = match engine.cancellation_token() {
        Some(token) => TurnControls::default().cancel_token(token),
        None => TurnControls::default(),
    };

    let motion = MotionPreference::fixed(config.reveal.reduced_motion);
    let (driver, snapshots) = TurnDriver::new(message_id, &config, motion, controls);
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let printer = tokio::spawn(print_snapshots(snapshots));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = commands_tx.send(TurnCommand::Cancel);
        }
    });

    let outcome = with_optional_timeout(config.request_timeout(), async {
        Ok(driver.run(events, commands_rx).await)
    })
    .await;

    interrupt.abort();
    if let Err(error) = printer.await {
        debug!(error = %error, "snapshot printer ended abnormally");
    }
    engine.stop_stream().await;
    println!(); // newline after streaming

    let outcome = outcome?;
    if outcome.cancelled {
        eprintln!("⏹ cancelled");
        return Ok(());
    }
    if let Some(error) = outcome.error {
        return Err(error.into());
    }
    Ok(())
}

async fn print_snapshots(mut snapshots: watch::Receiver<RenderSnapshot>) {
    let mut printed = 0;
    let mut seen: HashMap<StepId, StepStatus> = HashMap::new();

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();

        for step in &snapshot.thinking.steps {
            if seen.get(&step.id) != Some(&step.status) {
                seen.insert(step.id, step.status);
                eprintln!("{}", step_line(step));
            }
        }

        let text = &snapshot.display.display_text;
        if text.len() > printed {
            print!("{}", &text[printed..]);
            let _ = std::io::stdout().flush();
            printed = text.len();
        } else if text.len() < printed {
            // cancelled: the display was cleared
            printed = text.len();
        }
    }
}

fn step_line(step: &ThoughtStep) -> String {
    let marker = match step.status {
        StepStatus::Pending => "·",
        StepStatus::Active => "⚡",
        StepStatus::Done => "✅",
        StepStatus::Error => "❌",
    };
    let mut line = format!("{marker} {}", step.label);
    if let Some(ms) = step.duration_ms() {
        line.push_str(&format!(" ({ms}ms)"));
    }
    if let Some(note) = &step.note {
        line.push_str(&format!(" · {}", note.as_str()));
    }
    line
}

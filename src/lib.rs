//! thinkstream: streaming chat core.
//!
//! Ingests a backend event stream, tracks the assistant's thought steps, and
//! reveals the streamed text at a steady, frame-capped rate.
//!
//! # Quick Start
//!
//! ```no_run
//! use thinkstream::prelude::*;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> thinkstream::error::Result<()> {
//! let config = ThinkstreamConfig::load()?;
//! let mut engine = StreamEngine::from_config(&config);
//! let events = engine.start_channel(
//!     config.require_endpoint()?,
//!     serde_json::json!({ "message_id": "m1", "message": "Hello!" }),
//! )?;
//!
//! let controls = TurnControls::default().cancel_token(engine.cancellation_token().unwrap_or_default());
//! let (driver, mut snapshots) =
//!     TurnDriver::new("m1", &config, MotionPreference::default(), controls);
//! let (_commands_tx, commands) = mpsc::unbounded_channel();
//!
//! tokio::spawn(async move {
//!     while snapshots.changed().await.is_ok() {
//!         println!("{}", snapshots.borrow().display.display_text);
//!     }
//! });
//! let outcome = driver.run(events, commands).await;
//! println!("{}", outcome.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod thinking;
pub mod transport;
pub mod turn;
pub mod types;
pub mod typewriter;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

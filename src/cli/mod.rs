//! CLI entry point for thinkstream.

pub mod chat;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::transport::FrameMode;

/// thinkstream CLI
#[derive(Parser, Debug)]
#[command(name = "thinkstream", version, about = "Stream a chat reply with a live thinking timeline")]
pub struct Cli {
    /// Config file (defaults to ~/.thinkstream/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message and type out the reply
    Chat(ChatArgs),
}

/// Arguments for the `chat` subcommand.
#[derive(Parser, Debug)]
pub struct ChatArgs {
    /// Chat endpoint (overrides config and THINKSTREAM_ENDPOINT)
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Expect one JSON payload per line instead of SSE `data:` lines
    #[arg(long)]
    pub raw: bool,

    /// Reveal rate in characters per second
    #[arg(long)]
    pub cps: Option<f64>,

    /// Print text as it arrives, without the typing animation
    #[arg(long)]
    pub reduced_motion: bool,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Message to send
    pub prompt: String,
}

impl ChatArgs {
    /// Command-line flags win over file and environment settings.
    pub fn apply(&self, config: &mut crate::config::ThinkstreamConfig) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = Some(endpoint.clone());
        }
        if self.raw {
            config.frame_mode = FrameMode::Raw;
        }
        if let Some(cps) = self.cps {
            config.reveal.chars_per_second = cps;
        }
        if self.reduced_motion {
            config.reveal.reduced_motion = true;
        }
        if let Some(secs) = self.timeout {
            config.request_timeout_secs = Some(secs);
        }
    }
}

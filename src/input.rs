use serde::Deserialize;
use std::io;
use tracing::{info, warn};

/// The JSON object a calling server pipes in on stdin.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MessagePayload {
    pub message: String,
}

/// What was found on stdin: either the structured payload or plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum StdinPayload {
    Structured(MessagePayload),
    Raw(String),
}

impl StdinPayload {
    /// Tries the structured shape first and falls back to the raw text.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<MessagePayload>(text) {
            Ok(payload) => StdinPayload::Structured(payload),
            Err(e) => {
                info!("JSON parse failed: {}, using raw stdin", e);
                StdinPayload::Raw(text.to_string())
            }
        }
    }

    pub fn into_message(self) -> String {
        match self {
            StdinPayload::Structured(payload) => payload.message.trim().to_string(),
            StdinPayload::Raw(text) => text.trim().to_string(),
        }
    }
}

/// Resolves the user's message from the command line words or, when there are
/// none, from stdin. `read_stdin` is only called if `args` is empty.
///
/// Returns `None` when neither source yields any non-whitespace text.
pub fn resolve_message<F>(args: &[String], read_stdin: F) -> Option<String>
where
    F: FnOnce() -> io::Result<String>,
{
    let message = if !args.is_empty() {
        let message = args.join(" ").trim().to_string();
        info!("Got message from argv: {} chars", message.chars().count());
        message
    } else {
        info!("No argv, trying stdin...");
        let stdin_text = match read_stdin() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read stdin: {}", e);
                return None;
            }
        };
        info!("Read {} bytes from stdin", stdin_text.len());
        if stdin_text.trim().is_empty() {
            return None;
        }

        let message = StdinPayload::parse(&stdin_text).into_message();
        info!("Resolved stdin message: {} chars", message.chars().count());
        message
    };

    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}

use std::path::Path;

use anyhow::{Context, Result};

use shelfdesk_core::domain::conversation::TranscriptEntry;

use crate::llm::WireMessage;

/// Default desk-assistant instructions, compiled in. A config-supplied
/// prompt file overrides it.
pub const DEFAULT_SYSTEM_PROMPT: &str = include_str!("../prompts/system_prompt.txt");

pub fn load_system_prompt(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => {
            let prompt = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read system prompt from {}", path.display()))?;
            Ok(prompt.trim().to_string())
        }
        None => Ok(DEFAULT_SYSTEM_PROMPT.trim().to_string()),
    }
}

/// Render the reconstructed transcript as wire messages, system prompt
/// first. The transcript has already been role-filtered by the log layer.
pub fn build_wire_history(system_prompt: &str, transcript: &[TranscriptEntry]) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(WireMessage::system(system_prompt));
    for entry in transcript {
        messages.push(WireMessage {
            role: entry.role.as_str().to_string(),
            content: Some(entry.content.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages
}

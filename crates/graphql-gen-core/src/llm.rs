//! LLM provider trait and message normalization.
//!
//! `complete(messages, options)` is the narrow waist every provider
//! implements. Providers that can't do native system messages, can't
//! alternate freely, or expect a different sampling knob set encapsulate
//! that normalization entirely within their own implementation — but
//! [`normalize_messages`] is offered here as the one normalization shape
//! that keeps recurring across providers (merge same-role runs, ensure the
//! conversation opens on a user turn), so a provider need not reinvent it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message { role: Role::Assistant, content: content.into() }
    }
}

/// Sampling options for [`LLMProvider::complete`].
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Trait for LLM providers used by the dynamic generator.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Prepare the provider for use (e.g. validate credentials).
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Complete a chat conversation, returning the assistant's reply text.
    async fn complete(&self, messages: &[Message], options: &CompletionOptions) -> anyhow::Result<String>;

    /// Release any held resources (connections, client handles).
    async fn dispose(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Human-readable provider name (e.g. `"openai"`).
    fn name(&self) -> &str;

    /// Model identifier in use (e.g. `"gpt-4o-mini"`).
    fn model(&self) -> &str;
}

/// Merge adjacent same-role messages and ensure the first non-system
/// message is a user message, synthesizing an empty one if absent.
///
/// Providers without native system-role support (or that require strict
/// user/assistant alternation) apply this before sending a request, then
/// fold the merged leading system run into whatever single system field
/// or prefix their API expects.
pub fn normalize_messages(messages: &[Message]) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(messages.len());
    for msg in messages {
        match merged.last_mut() {
            Some(last) if last.role == msg.role => {
                last.content.push('\n');
                last.content.push_str(&msg.content);
            }
            _ => merged.push(msg.clone()),
        }
    }

    let first_non_system = merged.iter().position(|m| m.role != Role::System);
    match first_non_system {
        Some(idx) if merged[idx].role != Role::User => {
            merged.insert(idx, Message::user(""));
        }
        None => merged.push(Message::user("")),
        _ => {}
    }

    merged
}

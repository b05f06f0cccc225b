//! Chat commands.
//!
//! Handlers are registered by name in an explicit table; the poller feeds
//! incoming message text through [`CommandResponder::respond`].

pub mod poller;
pub mod status;

use futures::future::BoxFuture;
use std::collections::BTreeMap;

pub use poller::CommandPoller;
pub use status::{ServiceStatus, StatusReporter};

use crate::notifier::ChatId;

/// Who sent the command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub chat_id: ChatId,
}

/// Text of a command reply and how Telegram should render it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub parse_mode: Option<&'static str>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: None }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self { text: text.into(), parse_mode: Some("Markdown") }
    }
}

type Handler = for<'a> fn(&'a StatusReporter, &'a Invocation) -> BoxFuture<'a, Reply>;

fn status_handler<'a>(reporter: &'a StatusReporter, _: &'a Invocation) -> BoxFuture<'a, Reply> {
    Box::pin(async move { Reply::markdown(reporter.render().await) })
}

// Plain text, `chat_id` would open an unterminated italic entity in Markdown
fn chat_id_handler<'a>(_: &'a StatusReporter, invocation: &'a Invocation) -> BoxFuture<'a, Reply> {
    Box::pin(async move { Reply::plain(format!("Your chat_id: {}", invocation.chat_id)) })
}

/// Command name of `text`: `/status`, `/status@bot` and `/status extra` all give `status`
pub fn parse_command(text: &str) -> Option<&str> {
    let word = text.split_whitespace().next()?.strip_prefix('/')?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then_some(name)
}

/// Dispatches chat commands to their handlers
pub struct CommandResponder {
    reporter: StatusReporter,
    handlers: BTreeMap<&'static str, Handler>,
}

impl CommandResponder {
    pub fn new(reporter: StatusReporter) -> Self {
        let mut handlers: BTreeMap<&'static str, Handler> = BTreeMap::new();
        handlers.insert("status", status_handler);
        handlers.insert("chat_id", chat_id_handler);
        Self { reporter, handlers }
    }

    /// Registered command names
    pub fn commands(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }

    /// Reply for `text`, `None` for anything that is not a known command
    pub async fn respond(&self, chat_id: ChatId, text: &str) -> Option<Reply> {
        let name = parse_command(text)?;
        let handler = self.handlers.get(name)?;

        tracing::info!(command = name, chat_id, "Handling command");
        Some(handler(&self.reporter, &Invocation { chat_id }).await)
    }
}

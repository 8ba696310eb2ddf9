//! Transcript → parsed command → exactly one effector.
//!
//! The dispatcher never retries and never queues: each call parses one
//! transcript and invokes at most one effector.

use std::sync::Arc;

use voxnav_types::RecognitionConfig;

use crate::effectors::{self, EffectOutcome};
use crate::grammar::{ActionKind, Grammar, ParsedCommand};
use crate::host::DocumentHost;

/// Record of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub command: ParsedCommand,
    pub outcome: EffectOutcome,
}

/// Binds a grammar and a document host.
pub struct Dispatcher {
    grammar: Grammar,
    host: Arc<dyn DocumentHost>,
    scroll_amount: u32,
}

impl Dispatcher {
    /// Create a dispatcher over the built-in grammar.
    pub fn new(host: Arc<dyn DocumentHost>, config: &RecognitionConfig) -> Self {
        Self {
            grammar: Grammar::builtin(),
            host,
            scroll_amount: config.scroll_amount,
        }
    }

    /// Replace the grammar.
    #[must_use]
    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parse `transcript` and run the matching effector.
    pub async fn dispatch(&self, transcript: &str) -> Dispatch {
        let command = self.grammar.lookup(transcript);
        let outcome = run_effector(self.host.as_ref(), &command, self.scroll_amount).await;
        tracing::debug!(
            kind = %command.kind,
            argument = %command.argument,
            host = self.host.name(),
            ?outcome,
            "dispatched voice command"
        );
        Dispatch { command, outcome }
    }
}

/// Dispatch one transcript against the built-in grammar.
pub async fn dispatch(
    host: &dyn DocumentHost,
    transcript: &str,
    config: &RecognitionConfig,
) -> Dispatch {
    let command = crate::grammar::lookup(transcript);
    let outcome = run_effector(host, &command, config.scroll_amount).await;
    Dispatch { command, outcome }
}

async fn run_effector(
    host: &dyn DocumentHost,
    command: &ParsedCommand,
    scroll_amount: u32,
) -> EffectOutcome {
    let arg = command.argument.as_str();
    match command.kind {
        ActionKind::ClickOn => effectors::click_on(host, arg).await,
        ActionKind::NavigateTo => effectors::navigate_to(host, arg).await,
        ActionKind::Back => effectors::back(host).await,
        ActionKind::Forward => effectors::forward(host).await,
        ActionKind::FocusOn => effectors::focus_on(host, arg).await,
        ActionKind::FillOut => effectors::fill_out(host, arg).await,
        ActionKind::Clear => effectors::clear(host, arg).await,
        ActionKind::ScrollUp => effectors::scroll_up(host, scroll_amount).await,
        ActionKind::ScrollDown => effectors::scroll_down(host, scroll_amount).await,
        ActionKind::ScrollToTop => effectors::scroll_to_top(host).await,
        ActionKind::ScrollToBottom => effectors::scroll_to_bottom(host).await,
        ActionKind::RefreshPage => effectors::refresh_page(host).await,
        ActionKind::SubmitForm | ActionKind::Maximize | ActionKind::Minimize => {
            tracing::warn!(kind = %command.kind, "voice command recognized but not supported");
            EffectOutcome::Ignored
        }
        ActionKind::Unknown => {
            tracing::warn!(transcript = %arg, "unknown voice command");
            EffectOutcome::Ignored
        }
    }
}

//! Command grammar and transcript parsing.
//!
//! A [`Grammar`] is an ordered list of `(prefix, kind)` rules. Parsing
//! normalizes the transcript (trim + lowercase) and picks the first rule,
//! in declaration order, whose prefix the transcript starts with. The rest
//! of the transcript, trimmed, becomes the argument.
//!
//! Declaration order is the only tie-break. In the built-in grammar
//! "scroll up" is declared before the bare "up" shortcut, so the two never
//! compete for the same transcript.

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// What a recognized command asks the document to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ClickOn,
    NavigateTo,
    Back,
    Forward,
    FocusOn,
    FillOut,
    Clear,
    ScrollUp,
    ScrollDown,
    ScrollToTop,
    ScrollToBottom,
    RefreshPage,
    /// Recognized, but no effector is bound to it.
    SubmitForm,
    /// Recognized, but no effector is bound to it.
    Maximize,
    /// Recognized, but no effector is bound to it.
    Minimize,
    /// The transcript matched no rule.
    Unknown,
}

impl ActionKind {
    /// Whether the command reads a free-text argument after its prefix.
    pub fn takes_argument(self) -> bool {
        matches!(
            self,
            ActionKind::ClickOn
                | ActionKind::NavigateTo
                | ActionKind::FocusOn
                | ActionKind::FillOut
                | ActionKind::Clear
        )
    }

    /// Whether an effector is bound to this kind.
    pub fn has_effector(self) -> bool {
        !matches!(
            self,
            ActionKind::SubmitForm
                | ActionKind::Maximize
                | ActionKind::Minimize
                | ActionKind::Unknown
        )
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::ClickOn => "click_on",
            ActionKind::NavigateTo => "navigate_to",
            ActionKind::Back => "back",
            ActionKind::Forward => "forward",
            ActionKind::FocusOn => "focus_on",
            ActionKind::FillOut => "fill_out",
            ActionKind::Clear => "clear",
            ActionKind::ScrollUp => "scroll_up",
            ActionKind::ScrollDown => "scroll_down",
            ActionKind::ScrollToTop => "scroll_to_top",
            ActionKind::ScrollToBottom => "scroll_to_bottom",
            ActionKind::RefreshPage => "refresh_page",
            ActionKind::SubmitForm => "submit_form",
            ActionKind::Maximize => "maximize",
            ActionKind::Minimize => "minimize",
            ActionKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ParsedCommand
// ---------------------------------------------------------------------------

/// Result of parsing one transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub kind: ActionKind,
    /// Remainder after the matched prefix, trimmed. Empty for commands
    /// without an argument. For [`ActionKind::Unknown`], the transcript
    /// exactly as given.
    pub argument: String,
}

impl ParsedCommand {
    pub fn is_unknown(&self) -> bool {
        self.kind == ActionKind::Unknown
    }
}

// ---------------------------------------------------------------------------
// Grammar
// ---------------------------------------------------------------------------

/// One `(prefix, kind)` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarRule {
    /// Lowercase literal the normalized transcript must start with.
    pub prefix: String,
    pub kind: ActionKind,
}

/// Errors building a custom grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("grammar rule {index} has an empty prefix")]
    EmptyPrefix { index: usize },

    #[error("grammar rule {index} ({prefix:?}) cannot map to the unknown kind")]
    UnknownKind { index: usize, prefix: String },
}

/// Built-in rules, in matching order.
const BUILTIN_RULES: &[(&str, ActionKind)] = &[
    ("click on", ActionKind::ClickOn),
    ("navigate to", ActionKind::NavigateTo),
    ("back", ActionKind::Back),
    ("forward", ActionKind::Forward),
    ("fill out", ActionKind::FillOut),
    ("clear", ActionKind::Clear),
    ("scroll up", ActionKind::ScrollUp),
    ("scroll down", ActionKind::ScrollDown),
    ("refresh page", ActionKind::RefreshPage),
    ("up", ActionKind::ScrollToTop),
    ("down", ActionKind::ScrollToBottom),
    ("focus on", ActionKind::FocusOn),
    ("submit form", ActionKind::SubmitForm),
    ("maximize", ActionKind::Maximize),
    ("minimize", ActionKind::Minimize),
];

static BUILTIN: LazyLock<Grammar> = LazyLock::new(Grammar::builtin);

/// An ordered prefix grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    rules: Vec<GrammarRule>,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Grammar {
    /// The built-in command set.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES
                .iter()
                .map(|(prefix, kind)| GrammarRule {
                    prefix: (*prefix).to_string(),
                    kind: *kind,
                })
                .collect(),
        }
    }

    /// Build a grammar from rules in matching order.
    ///
    /// Prefixes are trimmed and lowercased. Empty prefixes and rules that
    /// map to [`ActionKind::Unknown`] are rejected.
    pub fn new<I, S>(rules: I) -> Result<Self, GrammarError>
    where
        I: IntoIterator<Item = (S, ActionKind)>,
        S: AsRef<str>,
    {
        let mut out = Vec::new();
        for (index, (prefix, kind)) in rules.into_iter().enumerate() {
            let prefix = prefix.as_ref().trim().to_lowercase();
            if prefix.is_empty() {
                return Err(GrammarError::EmptyPrefix { index });
            }
            if kind == ActionKind::Unknown {
                return Err(GrammarError::UnknownKind { index, prefix });
            }
            out.push(GrammarRule { prefix, kind });
        }
        Ok(Self { rules: out })
    }

    pub fn rules(&self) -> &[GrammarRule] {
        &self.rules
    }

    /// Parse a transcript against this grammar.
    pub fn lookup(&self, transcript: &str) -> ParsedCommand {
        let normalized = transcript.trim().to_lowercase();

        for rule in &self.rules {
            if let Some(rest) = normalized.strip_prefix(rule.prefix.as_str()) {
                return ParsedCommand {
                    kind: rule.kind,
                    argument: rest.trim().to_string(),
                };
            }
        }

        ParsedCommand {
            kind: ActionKind::Unknown,
            argument: transcript.to_string(),
        }
    }

    /// Render the rule prefixes as a JSGF V1.0 grammar string.
    pub fn jsgf(&self) -> String {
        let alternatives: Vec<&str> = self.rules.iter().map(|r| r.prefix.as_str()).collect();
        format!(
            "#JSGF V1.0; grammar commands; public <command> = {} ;",
            alternatives.join(" | ")
        )
    }
}

/// Parse a transcript against the built-in grammar.
pub fn lookup(transcript: &str) -> ParsedCommand {
    BUILTIN.lookup(transcript)
}

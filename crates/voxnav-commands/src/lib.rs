//! Voice command handling: transcript in, one document action out.
//!
//! # Modules
//!
//! - [`grammar`]: ordered prefix grammar and the pure [`lookup`] parser.
//! - [`host`]: the [`DocumentHost`] capability effectors act through.
//! - [`effectors`]: one total function per action kind.
//! - [`dispatcher`]: binds a parsed command to exactly one effector.
//!
//! Nothing here owns a speech engine or a browser. Callers supply a
//! [`DocumentHost`] and feed transcripts to a [`Dispatcher`].

pub mod dispatcher;
pub mod effectors;
pub mod grammar;
pub mod host;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use dispatcher::{dispatch, Dispatch, Dispatcher};
pub use effectors::EffectOutcome;
pub use grammar::{lookup, ActionKind, Grammar, GrammarError, GrammarRule, ParsedCommand};
pub use host::{DocumentHost, HostError, HostResult, ScrollPosition};

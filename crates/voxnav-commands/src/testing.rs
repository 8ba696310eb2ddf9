//! In-memory [`DocumentHost`] that records every call.
//!
//! Enabled for this crate's tests and, through the `test-util` feature, for
//! dependents that need a document without a browser.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::host::{DocumentHost, HostError, HostResult, ScrollPosition};

/// One recorded host operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Activate(String),
    Focus(String),
    Clear(String),
    Append(String),
    Navigate(String),
    Back,
    Forward,
    ScrollBy(i64),
    ScrollTo(ScrollPosition),
    Reload,
}

/// Records calls; element operations succeed only for registered keys.
#[derive(Debug, Default)]
pub struct RecordingDocument {
    elements: HashSet<String>,
    focused_editable: bool,
    failure: Option<HostError>,
    calls: Mutex<Vec<HostCall>>,
}

impl RecordingDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element carrying this command key.
    #[must_use]
    pub fn with_element(mut self, key: &str) -> Self {
        self.elements.insert(key.to_string());
        self
    }

    /// Pretend an editable element has focus.
    #[must_use]
    pub fn with_focused_editable(mut self) -> Self {
        self.focused_editable = true;
        self
    }

    /// Fail every operation with `error` (the call is still recorded).
    #[must_use]
    pub fn failing_with(mut self, error: HostError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls that changed the document (lookups that found no
    /// element do not count).
    pub fn mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| match call {
                HostCall::Activate(k) | HostCall::Focus(k) | HostCall::Clear(k) => {
                    self.elements.contains(k)
                }
                HostCall::Append(_) => self.focused_editable,
                _ => true,
            })
            .count()
    }

    fn record(&self, call: HostCall) -> HostResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn lookup(&self, call: HostCall, key: &str) -> HostResult<bool> {
        self.record(call)?;
        Ok(self.elements.contains(key))
    }
}

#[async_trait]
impl DocumentHost for RecordingDocument {
    fn name(&self) -> &str {
        "recording"
    }

    async fn activate(&self, key: &str) -> HostResult<bool> {
        self.lookup(HostCall::Activate(key.to_string()), key)
    }

    async fn focus(&self, key: &str) -> HostResult<bool> {
        self.lookup(HostCall::Focus(key.to_string()), key)
    }

    async fn clear(&self, key: &str) -> HostResult<bool> {
        self.lookup(HostCall::Clear(key.to_string()), key)
    }

    async fn append_to_focused(&self, text: &str) -> HostResult<bool> {
        self.record(HostCall::Append(text.to_string()))?;
        Ok(self.focused_editable)
    }

    async fn navigate(&self, url: &str) -> HostResult<()> {
        self.record(HostCall::Navigate(url.to_string()))
    }

    async fn history_back(&self) -> HostResult<()> {
        self.record(HostCall::Back)
    }

    async fn history_forward(&self) -> HostResult<()> {
        self.record(HostCall::Forward)
    }

    async fn scroll_by(&self, delta_y: i64) -> HostResult<()> {
        self.record(HostCall::ScrollBy(delta_y))
    }

    async fn scroll_to(&self, position: ScrollPosition) -> HostResult<()> {
        self.record(HostCall::ScrollTo(position))
    }

    async fn reload(&self) -> HostResult<()> {
        self.record(HostCall::Reload)
    }
}

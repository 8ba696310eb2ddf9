//! One effector per action kind.
//!
//! Effectors are total: a missing element, an unusable argument, or a host
//! failure is logged at `warn` and reported as an [`EffectOutcome`]. They
//! never return an error and never panic, so one bad command cannot stall
//! the transcript stream.

use crate::host::{DocumentHost, HostResult, ScrollPosition};

/// What an effector did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    /// The host performed the action.
    Performed,
    /// No element carries the key, or nothing editable has focus.
    TargetMissing,
    /// Nothing was attempted (unknown command, unusable argument).
    Ignored,
    /// The host reported an error.
    Failed(String),
}

impl EffectOutcome {
    pub fn is_performed(&self) -> bool {
        matches!(self, EffectOutcome::Performed)
    }
}

fn from_lookup(result: HostResult<bool>, action: &str, target: &str) -> EffectOutcome {
    match result {
        Ok(true) => EffectOutcome::Performed,
        Ok(false) => {
            tracing::warn!(action, target, "no element found for command key");
            EffectOutcome::TargetMissing
        }
        Err(e) => {
            tracing::warn!(action, target, error = %e, "document host failed");
            EffectOutcome::Failed(e.to_string())
        }
    }
}

fn from_unit(result: HostResult<()>, action: &str) -> EffectOutcome {
    match result {
        Ok(()) => EffectOutcome::Performed,
        Err(e) => {
            tracing::warn!(action, error = %e, "document host failed");
            EffectOutcome::Failed(e.to_string())
        }
    }
}

fn missing_argument(action: &str) -> EffectOutcome {
    tracing::warn!(action, "command needs an argument but none was spoken");
    EffectOutcome::Ignored
}

/// Activate the element tagged with `key`.
pub async fn click_on(host: &dyn DocumentHost, key: &str) -> EffectOutcome {
    if key.is_empty() {
        return missing_argument("click_on");
    }
    from_lookup(host.activate(key).await, "click_on", key)
}

/// Navigate to `target`, adding `https://` when it has no http(s) scheme.
pub async fn navigate_to(host: &dyn DocumentHost, target: &str) -> EffectOutcome {
    if target.is_empty() {
        return missing_argument("navigate_to");
    }
    let url = normalize_url(target);
    tracing::debug!(url = %url, "navigating");
    from_unit(host.navigate(&url).await, "navigate_to")
}

pub async fn back(host: &dyn DocumentHost) -> EffectOutcome {
    from_unit(host.history_back().await, "back")
}

pub async fn forward(host: &dyn DocumentHost) -> EffectOutcome {
    from_unit(host.history_forward().await, "forward")
}

/// Focus the element tagged with `key`.
pub async fn focus_on(host: &dyn DocumentHost, key: &str) -> EffectOutcome {
    if key.is_empty() {
        return missing_argument("focus_on");
    }
    from_lookup(host.focus(key).await, "focus_on", key)
}

/// Append `text` to whatever editable surface has focus.
pub async fn fill_out(host: &dyn DocumentHost, text: &str) -> EffectOutcome {
    if text.is_empty() {
        return missing_argument("fill_out");
    }
    match host.append_to_focused(text).await {
        Ok(true) => EffectOutcome::Performed,
        Ok(false) => {
            tracing::warn!("no editable element has focus for text input");
            EffectOutcome::TargetMissing
        }
        Err(e) => {
            tracing::warn!(action = "fill_out", error = %e, "document host failed");
            EffectOutcome::Failed(e.to_string())
        }
    }
}

/// Empty the value of the element tagged with `key`.
pub async fn clear(host: &dyn DocumentHost, key: &str) -> EffectOutcome {
    if key.is_empty() {
        return missing_argument("clear");
    }
    from_lookup(host.clear(key).await, "clear", key)
}

/// Scroll up by `amount` pixels.
pub async fn scroll_up(host: &dyn DocumentHost, amount: u32) -> EffectOutcome {
    from_unit(host.scroll_by(-i64::from(amount)).await, "scroll_up")
}

/// Scroll down by `amount` pixels.
pub async fn scroll_down(host: &dyn DocumentHost, amount: u32) -> EffectOutcome {
    from_unit(host.scroll_by(i64::from(amount)).await, "scroll_down")
}

pub async fn scroll_to_top(host: &dyn DocumentHost) -> EffectOutcome {
    from_unit(host.scroll_to(ScrollPosition::Top).await, "scroll_to_top")
}

pub async fn scroll_to_bottom(host: &dyn DocumentHost) -> EffectOutcome {
    from_unit(host.scroll_to(ScrollPosition::Bottom).await, "scroll_to_bottom")
}

pub async fn refresh_page(host: &dyn DocumentHost) -> EffectOutcome {
    from_unit(host.reload().await, "refresh_page")
}

/// Prefix `https://` unless `target` already starts with `http://` or
/// `https://` (case-insensitive).
pub fn normalize_url(target: &str) -> String {
    if has_prefix_ignore_case(target, "http://") || has_prefix_ignore_case(target, "https://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostError;
    use crate::testing::{HostCall, RecordingDocument};

    #[test]
    fn normalize_url_adds_https() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("example.com/a?b=c"), "https://example.com/a?b=c");
    }

    #[test]
    fn normalize_url_keeps_existing_scheme() {
        assert_eq!(normalize_url("https://example.com"), "https://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
        assert_eq!(normalize_url("HTTPS://Example.com"), "HTTPS://Example.com");
    }

    #[test]
    fn normalize_url_handles_short_and_multibyte_input() {
        assert_eq!(normalize_url("h"), "https://h");
        assert_eq!(normalize_url("héllo.example"), "https://héllo.example");
    }

    #[tokio::test]
    async fn click_on_present_element() {
        let host = RecordingDocument::new().with_element("submit-button");
        assert_eq!(click_on(&host, "submit-button").await, EffectOutcome::Performed);
        assert_eq!(host.calls(), vec![HostCall::Activate("submit-button".into())]);
    }

    #[tokio::test]
    async fn click_on_missing_element_is_diagnostic_only() {
        let host = RecordingDocument::new();
        assert_eq!(click_on(&host, "submit-button").await, EffectOutcome::TargetMissing);
        assert_eq!(host.mutations(), 0);
    }

    #[tokio::test]
    async fn element_commands_without_key_do_not_touch_host() {
        let host = RecordingDocument::new();
        assert_eq!(click_on(&host, "").await, EffectOutcome::Ignored);
        assert_eq!(focus_on(&host, "").await, EffectOutcome::Ignored);
        assert_eq!(clear(&host, "").await, EffectOutcome::Ignored);
        assert_eq!(navigate_to(&host, "").await, EffectOutcome::Ignored);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn navigate_to_prefixes_scheme() {
        let host = RecordingDocument::new();
        navigate_to(&host, "example.com").await;
        navigate_to(&host, "https://example.com").await;
        assert_eq!(
            host.calls(),
            vec![
                HostCall::Navigate("https://example.com".into()),
                HostCall::Navigate("https://example.com".into()),
            ]
        );
    }

    #[tokio::test]
    async fn fill_out_requires_focused_editable() {
        let host = RecordingDocument::new();
        assert_eq!(fill_out(&host, "hello").await, EffectOutcome::TargetMissing);

        let host = RecordingDocument::new().with_focused_editable();
        assert_eq!(fill_out(&host, "hello").await, EffectOutcome::Performed);
        assert_eq!(host.calls(), vec![HostCall::Append("hello".into())]);
    }

    #[tokio::test]
    async fn scroll_effectors_use_signed_amount() {
        let host = RecordingDocument::new();
        scroll_up(&host, 500).await;
        scroll_down(&host, 120).await;
        scroll_to_top(&host).await;
        scroll_to_bottom(&host).await;
        assert_eq!(
            host.calls(),
            vec![
                HostCall::ScrollBy(-500),
                HostCall::ScrollBy(120),
                HostCall::ScrollTo(ScrollPosition::Top),
                HostCall::ScrollTo(ScrollPosition::Bottom),
            ]
        );
    }

    #[tokio::test]
    async fn host_failure_becomes_failed_outcome() {
        let host = RecordingDocument::new()
            .failing_with(HostError::Unavailable("page closed".into()));
        match refresh_page(&host).await {
            EffectOutcome::Failed(reason) => assert!(reason.contains("page closed")),
            other => panic!("expected Failed, got {other:?}"),
        }
        match click_on(&host, "ok").await {
            EffectOutcome::Failed(_) => {}
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}

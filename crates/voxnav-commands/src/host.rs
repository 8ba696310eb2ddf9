//! The document capability effectors act through.

use async_trait::async_trait;

/// Errors a [`DocumentHost`] can report.
///
/// A missing element is not an error; element operations report it as
/// `Ok(false)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host cannot be reached (connection dropped, page closed).
    #[error("document host unavailable: {0}")]
    Unavailable(String),

    /// The host rejected or failed the operation.
    #[error("document operation failed: {0}")]
    Failed(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Scroll target for [`DocumentHost::scroll_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPosition {
    Top,
    /// The full scrollable extent of the document.
    Bottom,
}

/// A document that voice commands can act on.
///
/// Elements are addressed by command key: the value of an
/// application-defined attribute (`data-cmd` by default). Element
/// operations return `Ok(false)` when no element carries the key.
/// Scrolling is smooth.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Activate (click) the element with this key.
    async fn activate(&self, key: &str) -> HostResult<bool>;

    /// Give input focus to the element with this key.
    async fn focus(&self, key: &str) -> HostResult<bool>;

    /// Reset the textual value of the element with this key to empty.
    async fn clear(&self, key: &str) -> HostResult<bool>;

    /// Append text to the focused editable surface. `Ok(false)` when
    /// nothing editable has focus.
    async fn append_to_focused(&self, text: &str) -> HostResult<bool>;

    async fn navigate(&self, url: &str) -> HostResult<()>;

    async fn history_back(&self) -> HostResult<()>;

    async fn history_forward(&self) -> HostResult<()>;

    /// Scroll the viewport vertically by `delta_y` pixels (negative is up).
    async fn scroll_by(&self, delta_y: i64) -> HostResult<()>;

    async fn scroll_to(&self, position: ScrollPosition) -> HostResult<()>;

    /// Reload the current document.
    async fn reload(&self) -> HostResult<()>;
}

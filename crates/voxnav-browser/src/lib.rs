//! Drive a Chrome/Chromium page from voice commands.
//!
//! [`BrowserDocument`] implements [`voxnav_commands::DocumentHost`] over the
//! Chrome DevTools Protocol, so every effector (click, focus, fill, scroll,
//! history, reload) lands on a real page.
//!
//! - [`cdp`]: WebSocket client with command/response correlation.
//! - [`discovery`]: finds a page target from a DevTools HTTP endpoint.
//! - [`document`]: the [`BrowserDocument`] host.
//!
//! Chrome must be running with remote debugging enabled:
//!
//! ```sh
//! google-chrome --remote-debugging-port=9222
//! ```
//!
//! ```ignore
//! let doc = BrowserDocument::connect("http://localhost:9222", &config.browser).await?;
//! voxnav_commands::dispatch(&doc, "scroll down", &config).await;
//! ```

pub mod cdp;
pub mod discovery;
pub mod document;
pub mod error;

pub use cdp::{CdpClient, CdpSession};
pub use discovery::resolve_page_url;
pub use document::BrowserDocument;
pub use error::BrowserError;

//! Page target discovery through the DevTools HTTP endpoint.
//!
//! Chrome started with `--remote-debugging-port=9222` lists its targets at
//! `http://localhost:9222/json/list`. Each page target carries the
//! `webSocketDebuggerUrl` a [`CdpClient`](crate::CdpClient) connects to.

use serde::Deserialize;

use crate::error::BrowserError;

/// One entry of `/json/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// First page target that can be attached to.
pub fn pick_page_target(targets: &[TargetInfo]) -> Option<&TargetInfo> {
    targets
        .iter()
        .find(|t| t.kind == "page" && t.web_socket_debugger_url.is_some())
}

/// Turn a user-supplied endpoint into a page WebSocket URL.
///
/// `ws://` and `wss://` URLs are returned as-is. An `http(s)://` DevTools
/// endpoint is queried for its first page target.
pub async fn resolve_page_url(endpoint: &str) -> Result<String, BrowserError> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }

    let list_url = format!("{}/json/list", endpoint.trim_end_matches('/'));
    tracing::debug!(url = %list_url, "listing DevTools targets");
    let targets: Vec<TargetInfo> = reqwest::get(&list_url).await?.json().await?;

    let target = pick_page_target(&targets).ok_or_else(|| BrowserError::NoPageTarget {
        url: endpoint.to_string(),
    })?;
    tracing::info!(title = %target.title, url = %target.url, "attaching to page target");
    target
        .web_socket_debugger_url
        .clone()
        .ok_or_else(|| BrowserError::NoPageTarget {
            url: endpoint.to_string(),
        })
}

//! [`DocumentHost`] over a CDP page.
//!
//! Elements are located with an attribute selector on the configured key
//! attribute (`[data-cmd="<key>"]` by default) and manipulated through
//! `Runtime.callFunctionOn`, so they behave as if page script had called
//! `click()` or `focus()` itself. Page-level actions use `Page.*` commands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use voxnav_commands::{DocumentHost, HostResult, ScrollPosition};
use voxnav_types::BrowserConfig;

use crate::cdp::{CdpClient, CdpSession};
use crate::discovery::resolve_page_url;
use crate::error::BrowserError;

const CLICK_FN: &str = "function() { this.click(); }";
const FOCUS_FN: &str = "function() { this.focus(); }";
const CLEAR_FN: &str = "function() { \
    if ('value' in this) { this.value = ''; } else { this.textContent = ''; } \
    this.dispatchEvent(new Event('input', { bubbles: true })); \
}";

/// A browser page that voice commands act on.
pub struct BrowserDocument {
    session: Arc<dyn CdpSession>,
    key_attribute: String,
}

impl BrowserDocument {
    /// Attach to a page.
    ///
    /// `endpoint` is a page WebSocket URL or a DevTools HTTP endpoint such as
    /// `http://localhost:9222`.
    pub async fn connect(endpoint: &str, config: &BrowserConfig) -> Result<Self, BrowserError> {
        let ws_url = resolve_page_url(endpoint).await?;
        let client = CdpClient::connect(&ws_url)
            .await?
            .with_timeout(Duration::from_millis(config.command_timeout_ms));
        for domain in ["Page", "DOM", "Runtime"] {
            client.enable_domain(domain).await?;
        }
        Ok(Self::new(Arc::new(client), &config.key_attribute))
    }

    /// Wrap an existing session.
    pub fn new(session: Arc<dyn CdpSession>, key_attribute: &str) -> Self {
        Self {
            session,
            key_attribute: key_attribute.to_string(),
        }
    }

    pub fn key_attribute(&self) -> &str {
        &self.key_attribute
    }

    async fn find(&self, key: &str) -> Result<Option<i64>, BrowserError> {
        let document = self.session.call("DOM.getDocument", json!({})).await?;
        let root = document
            .pointer("/root/nodeId")
            .and_then(Value::as_i64)
            .ok_or_else(|| BrowserError::protocol("DOM.getDocument returned no root nodeId"))?;

        let selector = key_selector(&self.key_attribute, key);
        let found = self
            .session
            .call(
                "DOM.querySelector",
                json!({ "nodeId": root, "selector": selector }),
            )
            .await?;
        Ok(found
            .get("nodeId")
            .and_then(Value::as_i64)
            .filter(|id| *id != 0))
    }

    /// Run `function` with `this` bound to the element tagged `key`.
    async fn call_on_element(&self, key: &str, function: &str) -> Result<bool, BrowserError> {
        let Some(node_id) = self.find(key).await? else {
            return Ok(false);
        };
        let resolved = self
            .session
            .call("DOM.resolveNode", json!({ "nodeId": node_id }))
            .await?;
        let object_id = resolved
            .pointer("/object/objectId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::protocol("DOM.resolveNode returned no objectId"))?;

        let result = self
            .session
            .call(
                "Runtime.callFunctionOn",
                json!({ "objectId": object_id, "functionDeclaration": function }),
            )
            .await?;
        check_exception(&result)?;
        Ok(true)
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let result = self
            .session
            .call(
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        check_exception(&result)?;
        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    async fn step_history(&self, step: i64) -> Result<(), BrowserError> {
        let history = self
            .session
            .call("Page.getNavigationHistory", json!({}))
            .await?;
        let Some(entry_id) = history_entry(&history, step) else {
            tracing::debug!(step, "no history entry in that direction");
            return Ok(());
        };
        self.session
            .call("Page.navigateToHistoryEntry", json!({ "entryId": entry_id }))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentHost for BrowserDocument {
    fn name(&self) -> &str {
        "browser"
    }

    async fn activate(&self, key: &str) -> HostResult<bool> {
        Ok(self.call_on_element(key, CLICK_FN).await?)
    }

    async fn focus(&self, key: &str) -> HostResult<bool> {
        Ok(self.call_on_element(key, FOCUS_FN).await?)
    }

    async fn clear(&self, key: &str) -> HostResult<bool> {
        Ok(self.call_on_element(key, CLEAR_FN).await?)
    }

    async fn append_to_focused(&self, text: &str) -> HostResult<bool> {
        let appended = self.evaluate(&append_script(text)).await?;
        Ok(appended.as_bool().unwrap_or(false))
    }

    async fn navigate(&self, url: &str) -> HostResult<()> {
        let result = self
            .session
            .call("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            return Err(BrowserError::NavigationFailed {
                reason: reason.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn history_back(&self) -> HostResult<()> {
        Ok(self.step_history(-1).await?)
    }

    async fn history_forward(&self) -> HostResult<()> {
        Ok(self.step_history(1).await?)
    }

    async fn scroll_by(&self, delta_y: i64) -> HostResult<()> {
        self.evaluate(&format!(
            "window.scrollBy({{ top: {delta_y}, behavior: 'smooth' }})"
        ))
        .await?;
        Ok(())
    }

    async fn scroll_to(&self, position: ScrollPosition) -> HostResult<()> {
        let top = match position {
            ScrollPosition::Top => "0",
            ScrollPosition::Bottom => "document.body.scrollHeight",
        };
        self.evaluate(&format!(
            "window.scrollTo({{ top: {top}, behavior: 'smooth' }})"
        ))
        .await?;
        Ok(())
    }

    async fn reload(&self) -> HostResult<()> {
        self.session.call("Page.reload", json!({})).await?;
        Ok(())
    }
}

/// CSS attribute selector matching `attribute="key"` exactly.
pub fn key_selector(attribute: &str, key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\a "),
            _ => escaped.push(c),
        }
    }
    format!("[{attribute}=\"{escaped}\"]")
}

/// Script appending `text` to the focused input, textarea, or editable
/// element. Evaluates to `false` when nothing editable has focus.
pub fn append_script(text: &str) -> String {
    let literal = Value::String(text.to_string()).to_string();
    format!(
        "(() => {{ \
            const el = document.activeElement; \
            const text = {literal}; \
            if (el instanceof HTMLInputElement || el instanceof HTMLTextAreaElement) {{ \
                el.value += text; \
            }} else if (el && el.isContentEditable) {{ \
                el.textContent += text; \
            }} else {{ \
                return false; \
            }} \
            el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
            return true; \
        }})()"
    )
}

/// Entry id `step` positions away from the current history entry.
fn history_entry(history: &Value, step: i64) -> Option<i64> {
    let current = history.get("currentIndex")?.as_i64()?;
    let target = usize::try_from(current.checked_add(step)?).ok()?;
    history
        .get("entries")?
        .as_array()?
        .get(target)?
        .get("id")?
        .as_i64()
}

fn check_exception(result: &Value) -> Result<(), BrowserError> {
    let Some(details) = result.get("exceptionDetails") else {
        return Ok(());
    };
    let message = details
        .pointer("/exception/description")
        .or_else(|| details.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("unknown exception")
        .to_string();
    Err(BrowserError::JsException { message })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use voxnav_commands::HostError;

    use super::*;

    type Responder = Box<dyn Fn(&str, &Value) -> Result<Value, BrowserError> + Send + Sync>;

    struct ScriptedSession {
        calls: Mutex<Vec<(String, Value)>>,
        respond: Responder,
    }

    impl ScriptedSession {
        fn new<F>(respond: F) -> Arc<Self>
        where
            F: Fn(&str, &Value) -> Result<Value, BrowserError> + Send + Sync + 'static,
        {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn methods(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }

        fn params(&self, method: &str) -> Value {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(m, _)| m == method)
                .map(|(_, p)| p.clone())
                .unwrap_or(Value::Null)
        }
    }

    #[async_trait]
    impl CdpSession for ScriptedSession {
        async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
            let reply = (self.respond)(method, &params);
            self.calls.lock().unwrap().push((method.to_string(), params));
            reply
        }
    }

    /// A page where only `present` carries the key attribute.
    fn page(present: &'static str) -> Arc<ScriptedSession> {
        ScriptedSession::new(move |method, params| {
            Ok(match method {
                "DOM.getDocument" => json!({ "root": { "nodeId": 1 } }),
                "DOM.querySelector" => {
                    let wanted = key_selector("data-cmd", present);
                    let id = if params["selector"] == wanted { 42 } else { 0 };
                    json!({ "nodeId": id })
                }
                "DOM.resolveNode" => json!({ "object": { "objectId": "obj-42" } }),
                "Page.getNavigationHistory" => json!({
                    "currentIndex": 1,
                    "entries": [{ "id": 10 }, { "id": 11 }, { "id": 12 }]
                }),
                "Runtime.evaluate" => json!({ "result": { "type": "boolean", "value": true } }),
                _ => json!({}),
            })
        })
    }

    fn document(session: &Arc<ScriptedSession>) -> BrowserDocument {
        BrowserDocument::new(session.clone(), "data-cmd")
    }

    #[test]
    fn selector_quotes_and_escapes_key() {
        assert_eq!(key_selector("data-cmd", "submit-button"), r#"[data-cmd="submit-button"]"#);
        assert_eq!(key_selector("data-cmd", r#"a"b\c"#), r#"[data-cmd="a\"b\\c"]"#);
        assert_eq!(key_selector("data-voice", "x\ny"), "[data-voice=\"x\\a y\"]");
    }

    #[test]
    fn append_script_embeds_text_as_json_string() {
        let script = append_script("it's \"quoted\"\n</script>");
        assert!(script.contains(r#"const text = "it's \"quoted\"\n</script>";"#));
        assert!(script.contains("isContentEditable"));
    }

    #[test]
    fn history_entry_bounds() {
        let history = json!({ "currentIndex": 0, "entries": [{ "id": 5 }, { "id": 6 }] });
        assert_eq!(history_entry(&history, -1), None);
        assert_eq!(history_entry(&history, 1), Some(6));
        assert_eq!(history_entry(&history, 2), None);
        assert_eq!(history_entry(&json!({}), 1), None);
    }

    #[test]
    fn exception_details_become_errors() {
        let thrown = json!({ "exceptionDetails": { "text": "Uncaught", "exception": { "description": "TypeError: x" } } });
        match check_exception(&thrown) {
            Err(BrowserError::JsException { message }) => assert_eq!(message, "TypeError: x"),
            other => panic!("expected JsException, got {other:?}"),
        }
        assert!(check_exception(&json!({ "result": {} })).is_ok());
    }

    #[tokio::test]
    async fn activate_clicks_tagged_element() {
        let session = page("submit-button");
        let doc = document(&session);
        assert!(doc.activate("submit-button").await.unwrap());
        assert_eq!(
            session.methods(),
            ["DOM.getDocument", "DOM.querySelector", "DOM.resolveNode", "Runtime.callFunctionOn"]
        );
        let call = session.params("Runtime.callFunctionOn");
        assert_eq!(call["objectId"], "obj-42");
        assert_eq!(call["functionDeclaration"], CLICK_FN);
    }

    #[tokio::test]
    async fn missing_element_is_not_an_error() {
        let session = page("submit-button");
        let doc = document(&session);
        assert!(!doc.focus("email").await.unwrap());
        assert!(!doc.clear("email").await.unwrap());
        assert!(!session.methods().iter().any(|m| m == "Runtime.callFunctionOn"));
    }

    #[tokio::test]
    async fn clear_resets_value() {
        let session = page("email");
        assert!(document(&session).clear("email").await.unwrap());
        assert_eq!(session.params("Runtime.callFunctionOn")["functionDeclaration"], CLEAR_FN);
    }

    #[tokio::test]
    async fn history_steps_use_navigation_entries() {
        let session = page("x");
        let doc = document(&session);
        doc.history_back().await.unwrap();
        assert_eq!(session.params("Page.navigateToHistoryEntry")["entryId"], 10);

        let session = page("x");
        document(&session).history_forward().await.unwrap();
        assert_eq!(session.params("Page.navigateToHistoryEntry")["entryId"], 12);
    }

    #[tokio::test]
    async fn scrolling_is_smooth() {
        let session = page("x");
        let doc = document(&session);
        doc.scroll_by(-500).await.unwrap();
        assert_eq!(
            session.params("Runtime.evaluate")["expression"],
            "window.scrollBy({ top: -500, behavior: 'smooth' })"
        );

        let session = page("x");
        document(&session).scroll_to(ScrollPosition::Bottom).await.unwrap();
        assert_eq!(
            session.params("Runtime.evaluate")["expression"],
            "window.scrollTo({ top: document.body.scrollHeight, behavior: 'smooth' })"
        );
    }

    #[tokio::test]
    async fn append_reports_focus_result() {
        let session = ScriptedSession::new(|_, _| Ok(json!({ "result": { "value": false } })));
        assert!(!document(&session).append_to_focused("hello").await.unwrap());

        let session = page("x");
        assert!(document(&session).append_to_focused("hello").await.unwrap());
    }

    #[tokio::test]
    async fn navigation_error_text_fails() {
        let session = ScriptedSession::new(|method, _| {
            Ok(if method == "Page.navigate" {
                json!({ "frameId": "f", "errorText": "net::ERR_NAME_NOT_RESOLVED" })
            } else {
                json!({})
            })
        });
        match document(&session).navigate("https://nope.invalid").await {
            Err(HostError::Failed(reason)) => assert!(reason.contains("ERR_NAME_NOT_RESOLVED")),
            other => panic!("expected navigation failure, got {other:?}"),
        }
        assert_eq!(session.params("Page.navigate")["url"], "https://nope.invalid");
    }

    #[tokio::test]
    async fn lost_connection_is_unavailable() {
        let session = ScriptedSession::new(|_, _| Err(BrowserError::Disconnected));
        let err = document(&session).reload().await.unwrap_err();
        assert!(matches!(err, HostError::Unavailable(_)));
    }
}

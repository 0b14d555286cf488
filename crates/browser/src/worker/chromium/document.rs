use async_trait::async_trait;
use autoprompt_core::{DisabledSignals, Document, DomError, ElementHandle, ElementSnapshot, SyntheticEvent};
use chromiumoxide::page::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::shared::{js, to_dom_error};

/// What every wrapped snippet answers with.
#[derive(Debug, Deserialize)]
struct JsReply {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl JsReply {
    fn decode<T: DeserializeOwned>(self, action: &str, el: Option<ElementHandle>) -> Result<T, DomError> {
        if self.ok {
            return serde_json::from_value(self.value)
                .map_err(|e| DomError::Decode(format!("{} returned an unexpected shape: {}", action, e)));
        }

        let message = self.error.unwrap_or_default();
        match (self.kind.as_deref(), el) {
            (Some("stale"), Some(el)) => Err(DomError::StaleElement(el)),
            (Some("context"), _) => Err(DomError::ContextUnavailable(format!("{}: {}", action, message))),
            _ => Err(DomError::Script(format!("{} failed: {}", action, message))),
        }
    }
}

/// One execution context of a live page: the top document or a same-origin
/// frame addressed by its index path from the top window.
#[derive(Clone)]
pub struct ChromiumDocument {
    page: Page,
    path: Vec<usize>,
    label: String,
}

impl ChromiumDocument {
    pub fn new(page: Page, path: Vec<usize>) -> Self {
        let label = context_label(&path);
        Self { page, path, label }
    }

    pub fn top(page: Page) -> Self {
        Self::new(page, Vec::new())
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Paths of the same-origin frames below this document.
    pub async fn frame_paths(&self) -> Result<Vec<Vec<usize>>, DomError> {
        let nested: Vec<Vec<usize>> = self.call("ListFrames", js::wait::LIST_FRAMES, None, &[]).await?;
        Ok(nested
            .into_iter()
            .map(|tail| self.path.iter().copied().chain(tail).collect())
            .collect())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        func: &str,
        el: Option<ElementHandle>,
        args: &[Value],
    ) -> Result<T, DomError> {
        let script = js::build_js_call(func, &self.path, args);
        let result = self.page.evaluate(script).await.map_err(|e| to_dom_error(e, action))?;
        let reply: JsReply = result
            .into_value()
            .map_err(|e| DomError::Decode(format!("{} reply: {}", action, e)))?;
        reply.decode(action, el)
    }

    async fn on<T: DeserializeOwned>(
        &self,
        action: &str,
        func: &str,
        el: ElementHandle,
        extra: &[Value],
    ) -> Result<T, DomError> {
        let mut args = vec![json!(el.0)];
        args.extend_from_slice(extra);
        self.call(action, func, Some(el), &args).await
    }
}

/// `top` for the top window, `frame[0/1]` for nested frames.
pub fn context_label(path: &[usize]) -> String {
    if path.is_empty() {
        return "top".to_string();
    }
    let indices: Vec<String> = path.iter().map(|i| i.to_string()).collect();
    format!("frame[{}]", indices.join("/"))
}

#[async_trait]
impl Document for ChromiumDocument {
    fn label(&self) -> &str {
        &self.label
    }

    async fn is_loaded(&self) -> Result<bool, DomError> {
        self.call("IsLoaded", js::wait::IS_LOADED, None, &[]).await
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError> {
        self.call("QueryAll", js::element::QUERY_ALL, None, &[json!(selector)]).await
    }

    async fn query_shadow(&self, selector: &str) -> Result<Vec<ElementSnapshot>, DomError> {
        self.call("QueryShadow", js::element::QUERY_SHADOW, None, &[json!(selector)]).await
    }

    async fn focus(&self, el: ElementHandle) -> Result<(), DomError> {
        self.on::<bool>("Focus", js::element::FOCUS, el, &[]).await.map(drop)
    }

    async fn activate(&self, el: ElementHandle) -> Result<(), DomError> {
        self.on::<bool>("Activate", js::element::ACTIVATE, el, &[]).await.map(drop)
    }

    async fn scroll_into_view(&self, el: ElementHandle) -> Result<(), DomError> {
        self.on::<bool>("ScrollIntoView", js::element::SCROLL_INTO_VIEW, el, &[]).await.map(drop)
    }

    async fn clear_contents(&self, el: ElementHandle) -> Result<(), DomError> {
        self.on::<bool>("ClearContents", js::input::CLEAR_CONTENTS, el, &[]).await.map(drop)
    }

    async fn insert_text(&self, el: ElementHandle, text: &str) -> Result<bool, DomError> {
        self.on("InsertText", js::input::INSERT_TEXT, el, &[json!(text)]).await
    }

    async fn set_value(&self, el: ElementHandle, value: &str) -> Result<(), DomError> {
        self.on::<bool>("SetValue", js::input::SET_VALUE, el, &[json!(value)]).await.map(drop)
    }

    async fn read_value(&self, el: ElementHandle) -> Result<String, DomError> {
        self.on("ReadValue", js::input::READ_VALUE, el, &[]).await
    }

    async fn dispatch(&self, el: ElementHandle, event: &SyntheticEvent) -> Result<bool, DomError> {
        let event = serde_json::to_value(event)
            .map_err(|e| DomError::Decode(format!("Dispatch event: {}", e)))?;
        self.on("Dispatch", js::input::DISPATCH, el, &[event]).await
    }

    async fn disabled_signals(
        &self,
        el: ElementHandle,
        disabled_classes: &[String],
    ) -> Result<DisabledSignals, DomError> {
        self.on("DisabledSignals", js::element::DISABLED_SIGNALS, el, &[json!(disabled_classes)]).await
    }

    async fn force_enable(&self, el: ElementHandle, disabled_classes: &[String]) -> Result<(), DomError> {
        self.on::<bool>("ForceEnable", js::element::FORCE_ENABLE, el, &[json!(disabled_classes)])
            .await
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(value: Value) -> JsReply {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn labels_follow_frame_paths() {
        assert_eq!(context_label(&[]), "top");
        assert_eq!(context_label(&[0]), "frame[0]");
        assert_eq!(context_label(&[0, 1]), "frame[0/1]");
    }

    #[test]
    fn ok_reply_decodes_the_value() {
        let value: Vec<ElementSnapshot> = reply(json!({
            "ok": true,
            "value": [{
                "handle": 4, "tag": "textarea", "id": "", "classes": ["scrollable-content"],
                "text": "", "span_text": null, "placeholder": "Type here",
                "display": "block", "visibility": "visible", "height": 48.0
            }]
        }))
        .decode("QueryAll", None)
        .unwrap();

        assert_eq!(value.len(), 1);
        assert_eq!(value[0].handle, ElementHandle(4));
        assert!(value[0].is_visible());
    }

    #[test]
    fn stale_reply_names_the_handle() {
        let err = reply(json!({ "ok": false, "kind": "stale", "error": "stale element 7" }))
            .decode::<String>("ReadValue", Some(ElementHandle(7)))
            .unwrap_err();
        assert_eq!(err, DomError::StaleElement(ElementHandle(7)));
    }

    #[test]
    fn missing_frame_is_a_context_error() {
        let err = reply(json!({ "ok": false, "kind": "context", "error": "frame 2 is gone" }))
            .decode::<bool>("IsLoaded", None)
            .unwrap_err();
        assert_eq!(err, DomError::ContextUnavailable("IsLoaded: frame 2 is gone".to_string()));
    }

    #[test]
    fn thrown_errors_are_script_failures() {
        let err = reply(json!({ "ok": false, "kind": "script", "error": "boom" }))
            .decode::<bool>("Focus", Some(ElementHandle(1)))
            .unwrap_err();
        assert_eq!(err, DomError::Script("Focus failed: boom".to_string()));
    }

    #[test]
    fn wrong_shape_is_a_decode_error() {
        let err = reply(json!({ "ok": true, "value": "yes" }))
            .decode::<bool>("IsLoaded", None)
            .unwrap_err();
        assert!(matches!(err, DomError::Decode(_)));
    }
}

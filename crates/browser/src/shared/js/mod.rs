pub mod element;
pub mod input;
pub mod wait;

use serde_json::Value;

/// Installs (once per top-level window) the registry that maps element
/// handles to elements, plus the helpers every snippet relies on.
///
/// Handles are held through `WeakRef` so a long run does not pin detached
/// nodes; a handle whose element is gone or disconnected is stale.
pub const RUNTIME: &str = r#"
(window.__autoprompt || (window.__autoprompt = (() => {
    let next = 1;
    const ids = new WeakMap();
    const refs = new Map();
    const rt = {
        root(path) {
            let win = window;
            for (const i of path) {
                win = win.frames[i];
                if (!win) throw new Error('frame ' + i + ' is gone');
            }
            return win.document;
        },
        handle(el) {
            let id = ids.get(el);
            if (!id) {
                id = next++;
                ids.set(el, id);
                refs.set(id, new WeakRef(el));
            }
            return id;
        },
        get(id) {
            const ref = refs.get(id);
            const el = ref && ref.deref();
            if (!el || !el.isConnected) {
                refs.delete(id);
                const err = new Error('stale element ' + id);
                err.stale = true;
                throw err;
            }
            return el;
        },
        snapshot(el) {
            const style = el.ownerDocument.defaultView.getComputedStyle(el);
            const span = el.querySelector('span');
            return {
                handle: rt.handle(el),
                tag: el.tagName.toLowerCase(),
                id: el.id || '',
                classes: Array.from(el.classList),
                text: (el.textContent || '').trim(),
                span_text: span ? (span.textContent || '').trim() : null,
                placeholder: el.getAttribute('placeholder'),
                display: style.display,
                visibility: style.visibility,
                height: el.offsetHeight || 0
            };
        }
    };
    return rt;
})()))
"#;

/// Wraps `func` so it runs against the document at `path` (frame indices from
/// the top window) and always answers `{ ok, value }` or `{ ok, kind, error }`.
///
/// `func` is called as `func(rt, doc, ...args)`.
pub fn build_js_call(func: &str, path: &[usize], args: &[Value]) -> String {
    let mut call_args = vec!["rt".to_string(), "doc".to_string()];
    call_args.extend(args.iter().map(|v| v.to_string()));
    let path = Value::from(path.to_vec());
    format!(
        r#"(() => {{
    const rt = {runtime};
    let doc;
    try {{ doc = rt.root({path}); }}
    catch (e) {{ return {{ ok: false, kind: 'context', error: String(e && e.message || e) }}; }}
    try {{
        const value = ({func})({args});
        return {{ ok: true, value: value === undefined ? null : value }};
    }} catch (e) {{
        return {{ ok: false, kind: e && e.stale ? 'stale' : 'script', error: String(e && e.message || e) }};
    }}
}})()"#,
        runtime = RUNTIME.trim(),
        path = path,
        func = func.trim(),
        args = call_args.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_passes_runtime_document_and_json_args() {
        let js = build_js_call("(rt, doc, a, b) => a + b", &[0, 2], &[json!("x\"y"), json!(3)]);
        assert!(js.contains("rt.root([0,2])"));
        assert!(js.contains(r#"(rt, doc, "x\"y", 3)"#));
        assert!(js.trim_end().ends_with("})()"));
    }

    #[test]
    fn top_document_has_empty_path() {
        let js = build_js_call(wait::IS_LOADED, &[], &[]);
        assert!(js.contains("rt.root([])"));
    }
}

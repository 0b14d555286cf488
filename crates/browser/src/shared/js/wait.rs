pub const IS_LOADED: &str = r#"
(rt, doc) => doc.readyState === 'complete'
"#;

/// Paths of every same-origin frame below the top window, depth first.
/// Cross-origin frames throw on `document` access and are skipped.
pub const LIST_FRAMES: &str = r#"
(rt, doc) => {
    const found = [];
    const walk = (win, path) => {
        for (let i = 0; i < win.frames.length; i++) {
            const child = win.frames[i];
            const next = path.concat([i]);
            try {
                if (!child.document) continue;
            } catch (e) {
                continue;
            }
            found.push(next);
            walk(child, next);
        }
    };
    walk(doc.defaultView, []);
    return found;
}
"#;

pub const QUERY_ALL: &str = r#"
(rt, doc, selector) => Array.from(doc.querySelectorAll(selector)).map(el => rt.snapshot(el))
"#;

pub const QUERY_SHADOW: &str = r#"
(rt, doc, selector) => {
    const found = [];
    for (const host of doc.querySelectorAll('*')) {
        if (!host.shadowRoot) continue;
        for (const el of host.shadowRoot.querySelectorAll(selector)) {
            found.push(rt.snapshot(el));
        }
    }
    return found;
}
"#;

pub const FOCUS: &str = r#"
(rt, doc, id) => { rt.get(id).focus(); return true; }
"#;

pub const ACTIVATE: &str = r#"
(rt, doc, id) => { rt.get(id).click(); return true; }
"#;

pub const SCROLL_INTO_VIEW: &str = r#"
(rt, doc, id) => {
    rt.get(id).scrollIntoView({ behavior: 'smooth', block: 'center' });
    return true;
}
"#;

pub const DISABLED_SIGNALS: &str = r#"
(rt, doc, id, classes) => {
    const el = rt.get(id);
    return {
        property: !!el.disabled,
        attribute: el.hasAttribute('disabled'),
        class: classes.some(c => el.classList.contains(c)),
        aria: el.getAttribute('aria-disabled') === 'true'
    };
}
"#;

pub const FORCE_ENABLE: &str = r#"
(rt, doc, id, classes) => {
    const el = rt.get(id);
    el.disabled = false;
    el.removeAttribute('disabled');
    classes.forEach(c => el.classList.remove(c));
    el.removeAttribute('aria-disabled');
    el.tabIndex = 0;
    el.style.opacity = '1';
    el.style.pointerEvents = 'auto';
    return true;
}
"#;

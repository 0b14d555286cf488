//! Snippets that write into form fields. All of them work on the element's
//! own document and window so they behave inside same-origin frames.

pub const CLEAR_CONTENTS: &str = r#"
(rt, doc, id) => {
    const el = rt.get(id);
    const owner = el.ownerDocument;
    el.focus();
    if (typeof el.select === 'function') el.select();
    owner.execCommand('selectAll', false, null);
    owner.execCommand('delete', false, null);
    return true;
}
"#;

pub const INSERT_TEXT: &str = r#"
(rt, doc, id, text) => {
    const el = rt.get(id);
    el.focus();
    return !!el.ownerDocument.execCommand('insertText', false, text);
}
"#;

// The setter is looked up on the prototype chain, skipping any own `value`
// property a framework installed on the instance.
pub const SET_VALUE: &str = r#"
(rt, doc, id, value) => {
    const el = rt.get(id);
    let proto = Object.getPrototypeOf(el);
    let desc = null;
    while (proto && !desc) {
        const d = Object.getOwnPropertyDescriptor(proto, 'value');
        if (d && d.set) desc = d;
        proto = Object.getPrototypeOf(proto);
    }
    if (desc) {
        desc.set.call(el, value);
    } else {
        el.value = value;
    }
    return true;
}
"#;

pub const READ_VALUE: &str = r#"
(rt, doc, id) => {
    const el = rt.get(id);
    return 'value' in el ? String(el.value) : (el.textContent || '');
}
"#;

pub const DISPATCH: &str = r#"
(rt, doc, id, event) => {
    const el = rt.get(id);
    const view = el.ownerDocument.defaultView;
    const base = { bubbles: true, cancelable: true };
    let evt;
    switch (event.type) {
        case 'input':
            evt = new view.InputEvent('input', { ...base, inputType: event.input_type, data: event.data });
            break;
        case 'change':
            evt = new view.Event('change', base);
            break;
        case 'paste': {
            const data = new view.DataTransfer();
            data.setData('text/plain', event.text);
            evt = new view.ClipboardEvent('paste', { ...base, clipboardData: data });
            break;
        }
        case 'key':
            evt = new view.KeyboardEvent(event.phase, { key: event.key, bubbles: true });
            break;
        case 'mouse':
            evt = new view.MouseEvent(event.kind, {
                ...base,
                view,
                button: 0,
                buttons: event.kind === 'click' ? 1 : 0
            });
            break;
        case 'plain_click':
            evt = new view.Event('click', base);
            break;
        default:
            throw new Error('unknown event type ' + event.type);
    }
    return el.dispatchEvent(evt);
}
"#;

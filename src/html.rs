use scraper::{ElementRef, Html, Node};

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Text of an element with runs of whitespace collapsed to single spaces.
pub fn element_text(el: ElementRef) -> String {
    collapse(el.text())
}

/// Human-visible text of the whole document, in document order.
pub fn visible_text(document: &Html) -> String {
    let root = document.root_element();
    let texts = root.descendants().filter_map(|node| {
        let text = match node.value() {
            Node::Text(text) => text,
            _ => return None,
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        (!hidden).then_some(&**text)
    });
    collapse(texts)
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for word in parts.flat_map(str::split_whitespace) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

//! Markdown → HTML rendering.
//!
//! One fixed extension set is used for every call, whether the input is the
//! full document or a single page:
//!
//! | Extension | pulldown-cmark option |
//! |-----------|-----------------------|
//! | tables | `ENABLE_TABLES` |
//! | fenced code | CommonMark core |
//! | sane lists | CommonMark core (list type changes start a new list) |
//! | footnotes / attribute lists ("extra") | `ENABLE_FOOTNOTES`, `ENABLE_HEADING_ATTRIBUTES` |
//! | table-of-contents anchors | heading `id`s injected below |
//!
//! Heading anchors are slugs of the heading text. Repeated slugs get `_1`,
//! `_2`, ... suffixes so every anchor in one document is unique.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use std::collections::HashMap;

fn options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    opts
}

/// Render Markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut events: Vec<Event> = Parser::new_ext(markdown, options()).collect();
    assign_heading_ids(&mut events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

/// Give every heading without an explicit `{#id}` a slug anchor.
fn assign_heading_ids(events: &mut [Event]) {
    let mut seen: HashMap<String, usize> = HashMap::new();

    let mut i = 0;
    while i < events.len() {
        let needs_id = matches!(&events[i], Event::Start(Tag::Heading { id: None, .. }));
        if !needs_id {
            if let Event::Start(Tag::Heading { id: Some(id), .. }) = &events[i] {
                seen.entry(id.to_string()).or_insert(0);
            }
            i += 1;
            continue;
        }

        let mut text = String::new();
        let mut j = i + 1;
        while j < events.len() {
            match &events[j] {
                Event::End(TagEnd::Heading(_)) => break,
                Event::Text(t) | Event::Code(t) => text.push_str(t),
                _ => {}
            }
            j += 1;
        }

        let slug = unique_slug(&slugify(&text), &mut seen);
        if let Event::Start(Tag::Heading { id, .. }) = &mut events[i] {
            *id = Some(CowStr::from(slug));
        }
        i = j + 1;
    }
}

/// Lower-case, drop punctuation, turn whitespace runs into `-`.
fn slugify(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase();
    let slug = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    if slug.is_empty() {
        "_".to_string()
    } else {
        slug
    }
}

fn unique_slug(base: &str, seen: &mut HashMap<String, usize>) -> String {
    let Some(&used) = seen.get(base) else {
        seen.insert(base.to_string(), 0);
        return base.to_string();
    };
    let mut n = used;
    loop {
        n += 1;
        let candidate = format!("{base}_{n}");
        if !seen.contains_key(&candidate) {
            seen.insert(base.to_string(), n);
            seen.insert(candidate.clone(), 0);
            return candidate;
        }
    }
}

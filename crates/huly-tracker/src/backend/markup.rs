//! Conversion between markdown text and the platform's rich-text document.
//!
//! Rich text is a ProseMirror-style JSON tree. Only block structure is
//! carried across: paragraphs (split on blank lines), ATX headings and hard
//! line breaks. Inline markdown is kept verbatim inside text nodes, so a
//! round trip preserves the text a user wrote.

use serde_json::{Value, json};

/// Build a rich-text document from markdown.
#[must_use]
pub fn markdown_to_markup(markdown: &str) -> Value {
    let blocks: Vec<Value> = split_blocks(markdown)
        .into_iter()
        .map(|block| match heading_level(&block) {
            Some((level, text)) => json!({
                "type": "heading",
                "attrs": { "level": level },
                "content": inline_nodes(text),
            }),
            None => json!({
                "type": "paragraph",
                "content": inline_nodes(&block),
            }),
        })
        .collect();

    json!({ "type": "doc", "content": blocks })
}

/// Flatten a rich-text document back to markdown.
///
/// Unknown node types contribute their text content.
#[must_use]
pub fn markup_to_markdown(markup: &Value) -> String {
    let Some(blocks) = markup.get("content").and_then(Value::as_array) else {
        return inline_text(markup);
    };

    blocks
        .iter()
        .map(|block| {
            let text = inline_text(block);
            match block.get("type").and_then(Value::as_str) {
                Some("heading") => {
                    let level = block
                        .pointer("/attrs/level")
                        .and_then(Value::as_u64)
                        .unwrap_or(1)
                        .clamp(1, 6);
                    let hashes = "#".repeat(usize::try_from(level).unwrap_or(1));
                    format!("{hashes} {text}")
                }
                _ => text,
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn split_blocks(markdown: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current.join("\n"));
    }
    blocks
}

fn heading_level(block: &str) -> Option<(usize, &str)> {
    if block.contains('\n') {
        return None;
    }
    let hashes = block.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) {
        block[hashes..]
            .strip_prefix(' ')
            .map(|text| (hashes, text.trim()))
    } else {
        None
    }
}

fn inline_nodes(text: &str) -> Vec<Value> {
    let mut nodes = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            nodes.push(json!({ "type": "hardBreak" }));
        }
        if !line.is_empty() {
            nodes.push(json!({ "type": "text", "text": line }));
        }
    }
    nodes
}

fn inline_text(node: &Value) -> String {
    match node.get("type").and_then(Value::as_str) {
        Some("text") => node
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some("hardBreak") => "\n".to_string(),
        _ => node
            .get("content")
            .and_then(Value::as_array)
            .map(|children| children.iter().map(inline_text).collect())
            .unwrap_or_default(),
    }
}

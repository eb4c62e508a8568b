//! `install_requires` extraction from `setup.py`.
//!
//! This is a literal walker, not an evaluator: only a list or tuple of
//! plain string literals passed as `install_requires=` to a `setup(...)`
//! call is read. Any other shape is skipped.

use anyhow::{anyhow, Result};
use tree_sitter::{Node, Parser};

const TARGET_CALL: &str = "setup";
const TARGET_KEYWORD: &str = "install_requires";

/// Raw requirement strings from every `setup(install_requires=[...])` call in `source`.
pub fn extract_install_requires(source: &str) -> Result<Vec<String>> {
    let lang: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&lang)
        .map_err(|e| anyhow!("Python grammar unavailable: {e}"))?;
    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| anyhow!("setup.py could not be parsed"))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(anyhow!("setup.py contains syntax errors"));
    }

    let mut found = Vec::new();
    collect_calls(&root, source, &mut found);
    Ok(found)
}

fn collect_calls(node: &Node, source: &str, found: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "call" && is_target_call(&child, source) {
            if let Some(args) = child.child_by_field_name("arguments") {
                read_keyword(&args, source, found);
            }
        }
        collect_calls(&child, source, found);
    }
}

fn is_target_call(call: &Node, source: &str) -> bool {
    let Some(function) = call.child_by_field_name("function") else {
        return false;
    };
    match function.kind() {
        "identifier" => &source[function.byte_range()] == TARGET_CALL,
        "attribute" => function
            .child_by_field_name("attribute")
            .is_some_and(|attr| &source[attr.byte_range()] == TARGET_CALL),
        _ => false,
    }
}

fn read_keyword(args: &Node, source: &str, found: &mut Vec<String>) {
    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        if arg.kind() != "keyword_argument" {
            continue;
        }
        let is_target = arg
            .child_by_field_name("name")
            .is_some_and(|name| &source[name.byte_range()] == TARGET_KEYWORD);
        if !is_target {
            continue;
        }
        let Some(value) = arg.child_by_field_name("value") else {
            continue;
        };
        match literal_strings(&value, source) {
            Some(items) => found.extend(items),
            None => log::debug!(
                "setup.py: non-literal install_requires at line {}, skipped",
                value.start_position().row + 1
            ),
        }
    }
}

/// String elements of a literal list/tuple; `None` if anything is not a literal.
fn literal_strings(value: &Node, source: &str) -> Option<Vec<String>> {
    if !matches!(value.kind(), "list" | "tuple") {
        return None;
    }
    let mut items = Vec::new();
    let mut cursor = value.walk();
    for element in value.named_children(&mut cursor) {
        match element.kind() {
            "comment" => {}
            "string" => items.push(string_literal(&element, source)?),
            "concatenated_string" => {
                let mut joined = String::new();
                let mut inner = element.walk();
                for part in element.named_children(&mut inner) {
                    if part.kind() == "comment" {
                        continue;
                    }
                    if part.kind() != "string" {
                        return None;
                    }
                    joined.push_str(&string_literal(&part, source)?);
                }
                items.push(joined);
            }
            // Non-string literals are legal but carry no requirement.
            "integer" | "float" | "true" | "false" | "none" => {}
            _ => return None,
        }
    }
    Some(items)
}

/// Contents of a string literal without quotes; `None` for interpolated f-strings.
fn string_literal(node: &Node, source: &str) -> Option<String> {
    let mut start = None;
    let mut end = None;
    let mut cursor = node.walk();
    for part in node.children(&mut cursor) {
        match part.kind() {
            "string_start" => start = Some(part),
            "string_end" => end = Some(part),
            "interpolation" => return None,
            _ => {}
        }
    }
    let (start, end) = (start?, end?);
    let prefix = &source[start.byte_range()];
    let body = &source[start.end_byte()..end.start_byte()];
    let raw = prefix.contains(['r', 'R']);
    if prefix.contains(['b', 'B']) {
        return None;
    }
    Some(if raw { body.to_string() } else { unescape(body) })
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\n') | None => {}
            Some(other) => out.push(other),
        }
    }
    out
}

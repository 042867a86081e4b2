//! Text-preserving edits over `roxmltree` documents
//!
//! `roxmltree` is read-only, so edits are expressed as byte-range splices
//! against the source text the document was parsed from.

use roxmltree::{Document, Node};
use std::ops::Range;

/// Replacement of one byte range of the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Splice {
    pub(crate) range: Range<usize>,
    pub(crate) text: String,
}

impl Splice {
    fn insert(at: usize, text: String) -> Self {
        Self { range: at..at, text }
    }
}

/// Apply splices back to front so earlier ranges stay valid.
///
/// Splices must not overlap.
pub(crate) fn apply_splices(source: &mut String, mut splices: Vec<Splice>) {
    splices.sort_by(|a, b| b.range.start.cmp(&a.range.start));
    for splice in splices {
        source.replace_range(splice.range, &splice.text);
    }
}

/// All elements reached by following `path` from the root element, in document order
pub(crate) fn select_all<'a, 'input>(
    doc: &'a Document<'input>,
    path: &[&str],
) -> Vec<Node<'a, 'input>> {
    let Some((first, rest)) = path.split_first() else {
        return Vec::new();
    };
    let root = doc.root_element();
    if root.tag_name().name() != *first {
        return Vec::new();
    }

    let mut current = vec![root];
    for segment in rest {
        current = current
            .into_iter()
            .flat_map(|node| {
                node.children()
                    .filter(move |child| child.is_element() && child.tag_name().name() == *segment)
            })
            .collect();
    }
    current
}

/// Render a path the way error messages show it
pub(crate) fn display_path(path: &[&str]) -> String {
    path.iter().fold(String::new(), |mut acc, segment| {
        acc.push('/');
        acc.push_str(segment);
        acc
    })
}

pub(crate) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace the whole content of an element with text
pub(crate) fn set_text(source: &str, node: Node<'_, '_>, value: &str) -> Splice {
    let value = escape(value);
    let range = node.range();

    if let (Some(first), Some(last)) = (node.first_child(), node.last_child()) {
        return Splice {
            range: first.range().start..last.range().end,
            text: value,
        };
    }

    let slice = &source[range.clone()];
    if slice.ends_with("/>") {
        let name = tag_name(slice);
        return Splice {
            range,
            text: format!("<{name}>{value}</{name}>"),
        };
    }

    let close = slice.rfind("</").map_or(range.end, |i| range.start + i);
    Splice::insert(close, value)
}

/// Set an attribute, adding it when absent
pub(crate) fn set_attribute(source: &str, node: Node<'_, '_>, name: &str, value: &str) -> Splice {
    if let Some(attr) = node.attributes().find(|a| a.name() == name) {
        return Splice {
            range: attr.range_value(),
            text: escape(value),
        };
    }

    let at = node.attributes().last().map_or_else(
        || node.range().start + 1 + tag_name(&source[node.range()]).len(),
        |attr| attr.range().end,
    );
    Splice::insert(at, format!(" {name}=\"{}\"", escape(value)))
}

/// Remove an element along with the indentation and line break in front of it
pub(crate) fn remove(source: &str, node: Node<'_, '_>) -> Splice {
    let range = node.range();
    let bytes = source.as_bytes();
    let mut start = range.start;
    while start > 0 && matches!(bytes[start - 1], b' ' | b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] == b'\n' {
        start -= 1;
        if start > 0 && bytes[start - 1] == b'\r' {
            start -= 1;
        }
    }
    Splice {
        range: start..range.end,
        text: String::new(),
    }
}

/// Append child markup just before an element's closing tag.
///
/// Each entry in `children` becomes its own indented line.
pub(crate) fn append_children(source: &str, node: Node<'_, '_>, children: &[String]) -> Splice {
    let range = node.range();
    let slice = &source[range.clone()];
    let indent = line_indent(source, range.start);
    let child_indent = format!("{indent}  ");

    let mut body = String::new();
    for child in children {
        body.push('\n');
        body.push_str(&indent_block(child, &child_indent));
    }

    if slice.ends_with("/>") {
        let name = tag_name(slice);
        let open = slice.trim_end_matches("/>").trim_end();
        return Splice {
            range,
            text: format!("{open}>{body}\n{indent}</{name}>"),
        };
    }

    let close = slice.rfind("</").map_or(range.end, |i| range.start + i);
    let bytes = source.as_bytes();
    let mut at = close;
    while at > range.start && bytes[at - 1].is_ascii_whitespace() {
        at -= 1;
    }
    if at == close {
        body.push('\n');
        body.push_str(indent);
    }
    Splice::insert(at, body)
}

/// Serialize a flat element with text children, e.g. a property group
pub(crate) fn element_with_properties(name: &str, properties: &[(String, String)]) -> String {
    let mut out = format!("<{name}>");
    for (key, value) in properties {
        out.push_str(&format!("\n  <{key}>{}</{key}>", escape(value)));
    }
    out.push_str(&format!("\n</{name}>"));
    out
}

pub(crate) fn package_reference(id: &str, version: &str) -> String {
    format!(
        "<PackageReference Include=\"{}\" Version=\"{}\" />",
        escape(id),
        escape(version)
    )
}

fn tag_name(element_source: &str) -> &str {
    let rest = element_source.trim_start_matches('<');
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(rest.len());
    &rest[..end]
}

fn line_indent(source: &str, pos: usize) -> &str {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &source[line_start..pos];
    let len = prefix
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(prefix.len());
    &prefix[..len]
}

fn indent_block(block: &str, indent: &str) -> String {
    block
        .lines()
        .map(|line| format!("{indent}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

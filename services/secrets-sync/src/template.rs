//! Minimal text templates over a flat field map.
//!
//! Supported syntax:
//! - literal text, copied verbatim
//! - `{{ .field }}` for fields that are plain identifiers
//! - `{{ index . "field" }}` for any field name, including dotted ones
//! - `{{- ... }}` and `{{ ... -}}` to trim whitespace around an action
//! - `{{/* comment */}}`
//!
//! Anything else inside `{{ }}` is a syntax error. Templates are parsed once
//! and rendered against every fetch.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from parsing or rendering a template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Source is not a valid template
    #[error("syntax error at byte {offset}: {reason}")]
    Syntax {
        /// Byte offset of the offending action
        offset: usize,
        /// What was wrong
        reason: String,
    },

    /// Template references a field the secret does not contain
    #[error("field {field:?} not present in secret")]
    MissingField {
        /// Referenced field
        field: String,
    },
}

impl TemplateError {
    fn syntax(offset: usize, reason: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Text(String),
    Field(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template source.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] for unclosed or unsupported actions.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut nodes = Vec::new();
        let mut rest = source;
        let mut offset = 0;
        let mut trim_next = false;

        while let Some(open) = rest.find("{{") {
            let mut text = &rest[..open];
            if trim_next {
                text = text.trim_start();
            }
            let action_start = offset + open;
            let after_open = &rest[open + 2..];

            let trim_left = has_left_trim(after_open);
            if trim_left {
                text = text.trim_end();
            }
            push_text(&mut nodes, text);

            let body_start = if trim_left { 2 } else { 0 };
            let close = find_close(&after_open[body_start..])
                .ok_or_else(|| TemplateError::syntax(action_start, "unclosed action"))?;
            let mut body = &after_open[body_start..body_start + close];

            trim_next = has_right_trim(body);
            if trim_next {
                body = &body[..body.len() - 2];
            }

            if let Some(node) = parse_action(body.trim(), action_start)? {
                nodes.push(node);
            }

            let consumed = open + 2 + body_start + close + 2;
            rest = &rest[consumed..];
            offset += consumed;
        }

        let tail = if trim_next { rest.trim_start() } else { rest };
        push_text(&mut nodes, tail);

        Ok(Self { nodes })
    }

    /// Render against fetched values.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingField`] for the first field absent
    /// from `values`.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Field(field) => {
                    let value = values.get(field).ok_or_else(|| TemplateError::MissingField {
                        field: field.clone(),
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    /// Field names referenced, in order of appearance.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Field(field) => Some(field.as_str()),
            Node::Text(_) => None,
        })
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}

// `{{- ` trims only when the dash is followed by whitespace.
fn has_left_trim(after_open: &str) -> bool {
    let mut chars = after_open.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn has_right_trim(body: &str) -> bool {
    body.strip_suffix('-')
        .and_then(|b| b.chars().next_back())
        .is_some_and(char::is_whitespace)
}

// Position of the closing `}}`, skipping over quoted strings.
fn find_close(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn parse_action(body: &str, offset: usize) -> Result<Option<Node>, TemplateError> {
    if body.is_empty() {
        return Err(TemplateError::syntax(offset, "empty action"));
    }
    if let Some(comment) = body.strip_prefix("/*") {
        return if comment.ends_with("*/") {
            Ok(None)
        } else {
            Err(TemplateError::syntax(offset, "unclosed comment"))
        };
    }
    if let Some(field) = body.strip_prefix('.') {
        return parse_field_access(field, offset).map(Some);
    }
    if let Some(args) = body.strip_prefix("index") {
        if args.starts_with(char::is_whitespace) {
            return parse_index(args.trim_start(), offset).map(Some);
        }
    }
    Err(TemplateError::syntax(
        offset,
        format!("unsupported action {body:?}"),
    ))
}

fn parse_field_access(field: &str, offset: usize) -> Result<Node, TemplateError> {
    if field.is_empty() {
        return Err(TemplateError::syntax(offset, "cannot output the whole secret"));
    }
    if field.contains('.') {
        return Err(TemplateError::syntax(
            offset,
            format!("nested field access .{field} is not supported; use index"),
        ));
    }
    if !is_identifier(field) {
        return Err(TemplateError::syntax(
            offset,
            format!("invalid field name {field:?}; use index . \"{field}\""),
        ));
    }
    Ok(Node::Field(field.to_string()))
}

fn parse_index(args: &str, offset: usize) -> Result<Node, TemplateError> {
    let Some(key) = args.strip_prefix('.') else {
        return Err(TemplateError::syntax(offset, "index must be applied to ."));
    };
    let key = key.trim_start();
    if key.len() == args.len() - 1 {
        return Err(TemplateError::syntax(offset, "index expects . followed by a key"));
    }
    let (field, remainder) = parse_string_literal(key)
        .ok_or_else(|| TemplateError::syntax(offset, "index key must be a quoted string"))?;
    if !remainder.trim().is_empty() {
        return Err(TemplateError::syntax(offset, "index takes exactly one key"));
    }
    Ok(Node::Field(field))
}

// Parses a leading "..." or `...` literal, returning the value and the rest.
fn parse_string_literal(input: &str) -> Option<(String, &str)> {
    let mut chars = input.char_indices();
    match chars.next()? {
        (_, '`') => {
            let end = input[1..].find('`')? + 1;
            Some((input[1..end].to_string(), &input[end + 1..]))
        }
        (_, '"') => {
            let mut value = String::new();
            while let Some((i, c)) = chars.next() {
                match c {
                    '"' => return Some((value, &input[i + 1..])),
                    '\\' => {
                        let (_, escaped) = chars.next()?;
                        value.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            '"' | '\\' => escaped,
                            _ => return None,
                        });
                    }
                    '\n' => return None,
                    _ => value.push(c),
                }
            }
            None
        }
        _ => None,
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

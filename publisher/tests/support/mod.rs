//! Line protocol reader for asserting on what mock servers received

#![allow(dead_code)]

use buildflux::point::FieldValue;
use std::collections::BTreeMap;

/// One decoded line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: Option<i64>,
}

/// Split on `sep` outside quotes, leaving escapes in place
fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

/// Undo the escapes an encoder may add. Any other backslash is literal.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | '=' | ' ' | '"' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn key_value(pair: &str) -> Result<(String, &str), String> {
    let parts = split_unescaped(pair, '=');
    match parts.as_slice() {
        [key, value] => Ok((unescape(key), value)),
        _ => Err(format!("malformed pair '{pair}'")),
    }
}

fn field_value(raw: &str) -> Result<FieldValue, String> {
    if let Some(quoted) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        return Ok(FieldValue::String(unescape(quoted)));
    }
    match raw {
        "true" | "t" | "T" | "True" | "TRUE" => return Ok(FieldValue::Boolean(true)),
        "false" | "f" | "F" | "False" | "FALSE" => return Ok(FieldValue::Boolean(false)),
        _ => {}
    }
    if let Some(int) = raw.strip_suffix('i') {
        return int
            .parse()
            .map(FieldValue::Integer)
            .map_err(|e| format!("integer '{raw}': {e}"));
    }
    raw.parse()
        .map(FieldValue::Float)
        .map_err(|e| format!("float '{raw}': {e}"))
}

pub fn parse_line(line: &str) -> Result<ParsedLine, String> {
    let sections = split_unescaped(line.trim_end_matches('\n'), ' ');
    let (head, fields, timestamp) = match sections.as_slice() {
        [head, fields] => (*head, *fields, None),
        [head, fields, ts] => (
            *head,
            *fields,
            Some(ts.parse::<i64>().map_err(|e| format!("timestamp '{ts}': {e}"))?),
        ),
        _ => return Err(format!("expected 2 or 3 sections in '{line}'")),
    };

    let mut head_parts = split_unescaped(head, ',').into_iter();
    let measurement = unescape(head_parts.next().unwrap_or_default());
    let mut tags = BTreeMap::new();
    for pair in head_parts {
        let (key, value) = key_value(pair)?;
        tags.insert(key, unescape(value));
    }

    let mut parsed_fields = BTreeMap::new();
    for pair in split_unescaped(fields, ',') {
        let (key, value) = key_value(pair)?;
        parsed_fields.insert(key, field_value(value)?);
    }

    Ok(ParsedLine {
        measurement,
        tags,
        fields: parsed_fields,
        timestamp,
    })
}

/// Every line of a request body
pub fn parse_body(body: &str) -> Vec<ParsedLine> {
    body.lines()
        .filter(|l| !l.is_empty())
        .map(|l| parse_line(l).unwrap_or_else(|e| panic!("unparseable line: {e}")))
        .collect()
}

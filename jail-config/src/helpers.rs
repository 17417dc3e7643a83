// SPDX-License-Identifier: GPL-3.0-only

//! Parsing and stringification of user supplied configuration values

use jail_types::Value;
use uuid::Uuid;

const NONE_WORDS: [&str; 3] = ["none", "-", ""];

/// Whether the value stands for "no value"
pub fn parse_none(value: &Value) -> bool {
    parse_none_with(value, &NONE_WORDS)
}

pub fn parse_none_with(value: &Value, none_words: &[&str]) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let lower = s.to_lowercase();
            none_words.contains(&lower.as_str())
        }
        _ => false,
    }
}

fn bool_word(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Interpret yes/no style words, booleans and 0/1
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => bool_word(s),
        Value::Int(1) => Some(true),
        Value::Int(0) => Some(false),
        _ => None,
    }
}

pub fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Split on unescaped separators; a backslash escapes the next character
pub fn split_list_string(data: &str, separators: &[char]) -> Vec<String> {
    let mut output = Vec::new();
    let mut buf = String::new();
    let mut escaped = false;

    for c in data.chars() {
        if escaped {
            buf.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if separators.contains(&c) {
            output.push(std::mem::take(&mut buf));
        } else {
            buf.push(c);
        }
    }
    output.push(buf);
    output
}

/// Comma or whitespace separated list; none-like input gives an empty list
pub fn parse_list(value: &Value) -> Vec<String> {
    if parse_none(value) {
        return Vec::new();
    }
    match value {
        Value::List(items) => items.clone(),
        Value::String(s) => split_list_string(s, &[',', ' ', '\t', '\n'])
            .into_iter()
            .filter(|item| !item.is_empty())
            .collect(),
        Value::Map(map) => map.keys().cloned().collect(),
        other => vec![other.to_string()],
    }
}

/// Turn boolean and none words into their values, keep everything else
pub fn parse_user_input(value: Value) -> Value {
    match value {
        Value::String(s) => {
            if let Some(b) = bool_word(&s) {
                Value::Bool(b)
            } else if NONE_WORDS.contains(&s.to_lowercase().as_str()) {
                Value::Null
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

/// Words used when flattening values to strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringStyle {
    pub true_word: &'static str,
    pub false_word: &'static str,
    pub none_word: &'static str,
    pub delimiter: &'static str,
}

impl StringStyle {
    /// Human readable output
    pub const DISPLAY: StringStyle = StringStyle {
        true_word: "yes",
        false_word: "no",
        none_word: "-",
        delimiter: ",",
    };

    /// JSON config documents
    pub const JSON: StringStyle = StringStyle {
        true_word: "yes",
        false_word: "no",
        none_word: "none",
        delimiter: ",",
    };

    /// UCL documents of older tooling
    pub const UCL: StringStyle = StringStyle {
        true_word: "on",
        false_word: "off",
        none_word: "none",
        delimiter: ",",
    };

    /// Volume user properties
    pub const PROPERTY: StringStyle = StringStyle {
        true_word: "on",
        false_word: "off",
        none_word: "none",
        delimiter: " ",
    };
}

impl Default for StringStyle {
    fn default() -> Self {
        Self::DISPLAY
    }
}

pub fn to_string(value: &Value, style: StringStyle) -> String {
    match value {
        Value::List(items) => {
            let children: Vec<String> = items
                .iter()
                .map(|item| to_string(&Value::String(item.clone()), style))
                .collect();
            if children.is_empty() {
                return style.none_word.to_string();
            }
            children.join(style.delimiter)
        }
        Value::Map(_) => serde_json::to_string(value).unwrap_or_default(),
        // numeric strings stay numbers even though they parse as booleans
        Value::String(s) if s == "0" || s == "1" => s.clone(),
        other => match parse_user_input(other.clone()) {
            Value::Bool(true) => style.true_word.to_string(),
            Value::Bool(false) => style.false_word.to_string(),
            Value::Null => style.none_word.to_string(),
            parsed => parsed.to_string(),
        },
    }
}

/// Hyphenated UUID such as `e4a9a8f2-3c1b-4c79-9e0a-7d1f0b6c2a11`
pub fn is_uuid(text: &str) -> bool {
    text.len() == 36 && Uuid::try_parse(text).is_ok()
}

/// Characters not allowed in a resource identifier
pub fn invalid_identifier_chars(name: &str) -> Vec<char> {
    name.chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        .collect()
}

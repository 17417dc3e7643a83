// SPDX-License-Identifier: GPL-3.0-only

//! Legacy UCL configuration files
//!
//! Supports the subset older tooling wrote and users edited by hand:
//! `key = value;` or `key: value` pairs, quoted strings with escapes,
//! `#`, `//` and `/* */` comments, nested `{}` blocks and `[]` arrays.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::str::Chars;

use tracing::debug;

use super::{ConfigFormat, import_legacy};
use crate::error::{ConfigError, Result};
use crate::helpers::{StringStyle, to_string};
use crate::store::ValueStore;
use jail_types::{ConfigType, Value};

#[derive(Debug, Clone)]
pub struct UclFile {
    path: PathBuf,
}

impl UclFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            chars: content.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, reason: impl std::fmt::Display) -> ConfigError {
        ConfigError::Parse {
            format: "ucl",
            reason: format!("line {}: {}", self.line, reason),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn skip_line(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<()> {
        let mut previous = '\0';
        while let Some(c) = self.bump() {
            if previous == '*' && c == '/' {
                return Ok(());
            }
            previous = c;
        }
        Err(self.error("unterminated comment"))
    }

    /// Skip whitespace and comments
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some('/') => self.skip_line(),
                        Some('*') => {
                            self.bump();
                            self.bump();
                            self.skip_block_comment()?;
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn parse_document(&mut self) -> Result<BTreeMap<String, Value>> {
        self.skip_trivia()?;
        if self.chars.peek() == Some(&'{') {
            self.bump();
            let object = self.parse_entries(Some('}'))?;
            self.skip_trivia()?;
            if self.chars.peek().is_some() {
                return Err(self.error("content after top level object"));
            }
            return Ok(object);
        }
        self.parse_entries(None)
    }

    fn parse_entries(&mut self, close: Option<char>) -> Result<BTreeMap<String, Value>> {
        let mut object = BTreeMap::new();
        loop {
            self.skip_trivia()?;
            match (self.chars.peek().copied(), close) {
                (None, None) => return Ok(object),
                (None, Some(_)) => return Err(self.error("unexpected end of input")),
                (Some(c), Some(end)) if c == end => {
                    self.bump();
                    return Ok(object);
                }
                _ => {}
            }

            let key = self.parse_key()?;
            self.skip_trivia()?;
            if matches!(self.chars.peek(), Some('=') | Some(':')) {
                self.bump();
                self.skip_trivia()?;
            }
            let value = self.parse_value()?;
            object.insert(key, value);

            self.skip_trivia()?;
            if matches!(self.chars.peek(), Some(';') | Some(',')) {
                self.bump();
            }
        }
    }

    fn parse_key(&mut self) -> Result<String> {
        match self.chars.peek() {
            Some('"') | Some('\'') => self.parse_quoted(),
            _ => {
                let key = self.take_atom(|c| c == '=' || c == ':' || c == '{');
                if key.is_empty() {
                    return Err(self.error("expected a key"));
                }
                Ok(key)
            }
        }
    }

    fn parse_value(&mut self) -> Result<Value> {
        match self.chars.peek() {
            Some('{') => {
                self.bump();
                Ok(Value::Map(self.parse_entries(Some('}'))?))
            }
            Some('[') => {
                self.bump();
                self.parse_array()
            }
            Some('"') | Some('\'') => Ok(Value::String(self.parse_quoted()?)),
            Some(_) => {
                let atom = self.take_atom(|c| c == ';' || c == ',' || c == '}' || c == ']');
                if atom.is_empty() {
                    return Err(self.error("expected a value"));
                }
                Ok(atom_value(atom))
            }
            None => Err(self.error("expected a value")),
        }
    }

    fn parse_array(&mut self) -> Result<Value> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.chars.peek() {
                None => return Err(self.error("unterminated array")),
                Some(']') => {
                    self.bump();
                    return Ok(Value::List(items));
                }
                Some(',') => {
                    self.bump();
                }
                Some(_) => match self.parse_value()? {
                    Value::Null => {}
                    Value::String(s) => items.push(s),
                    other => items.push(other.to_string()),
                },
            }
        }
    }

    fn parse_quoted(&mut self) -> Result<String> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(other) => value.push(other),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => value.push(c),
            }
        }
    }

    /// Read up to whitespace or a stop character
    fn take_atom(&mut self, stop: impl Fn(char) -> bool) -> String {
        let mut atom = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || stop(c) {
                break;
            }
            atom.push(c);
            self.bump();
        }
        atom
    }
}

fn atom_value(atom: String) -> Value {
    match atom.to_lowercase().as_str() {
        "true" | "yes" | "on" => return Value::Bool(true),
        "false" | "no" | "off" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }
    match atom.parse::<i64>() {
        Ok(i) => Value::Int(i),
        Err(_) => Value::String(atom),
    }
}

/// Parse UCL content without legacy marking
pub fn parse_ucl(content: &str) -> Result<ValueStore> {
    let tree = Parser::new(content).parse_document()?;
    Ok(ValueStore::from_nested(&tree))
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn write_entries(out: &mut String, tree: &BTreeMap<String, Value>, depth: usize) {
    let indent = "    ".repeat(depth);
    for (key, value) in tree {
        match value {
            Value::Map(children) => {
                let _ = writeln!(out, "{indent}{} {{", quote(key));
                write_entries(out, children, depth + 1);
                let _ = writeln!(out, "{indent}}}");
            }
            leaf => {
                let text = to_string(leaf, StringStyle::UCL);
                let _ = writeln!(out, "{indent}{} = {};", quote(key), quote(&text));
            }
        }
    }
}

/// Render as UCL with on/off/none words and quoted values
pub fn to_ucl(data: &ValueStore) -> String {
    let mut out = String::new();
    write_entries(&mut out, &data.to_nested(), 0);
    out
}

impl ConfigFormat for UclFile {
    fn config_type(&self) -> ConfigType {
        ConfigType::Ucl
    }

    fn exists(&self) -> Result<bool> {
        Ok(self.path.is_file())
    }

    fn read(&self) -> Result<ValueStore> {
        let mut data = if self.path.exists() {
            debug!("Reading UCL config {}", self.path.display());
            parse_ucl(&std::fs::read_to_string(&self.path)?)?
        } else {
            ValueStore::new()
        };
        import_legacy(&mut data);
        Ok(data)
    }

    fn write(&self, data: &ValueStore) -> Result<()> {
        debug!("Writing UCL config {}", self.path.display());
        std::fs::write(&self.path, to_ucl(data))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hand_written_config() {
        let content = r#"
            # written by iocage-legacy
            host_hostname = "web";
            boot: on
            priority = 10;
            ip4_addr = "em0|10.0.0.5/24";
            // nested blocks
            provision {
                method = "ansible";
                rev = master;
            }
            /* arrays */
            tags = [ "a", "b", ];
            note = "say \"hi\"";
        "#;

        let data = parse_ucl(content).unwrap();
        assert_eq!(data.leaf("host_hostname"), Some(&Value::from("web")));
        assert_eq!(data.leaf("boot"), Some(&Value::Bool(true)));
        assert_eq!(data.leaf("priority"), Some(&Value::Int(10)));
        assert_eq!(data.leaf("ip4_addr"), Some(&Value::from("em0|10.0.0.5/24")));
        assert_eq!(data.leaf("provision.method"), Some(&Value::from("ansible")));
        assert_eq!(data.leaf("provision.rev"), Some(&Value::from("master")));
        assert_eq!(data.leaf("tags"), Some(&Value::from(vec!["a", "b"])));
        assert_eq!(data.leaf("note"), Some(&Value::from("say \"hi\"")));
    }

    #[test]
    fn accepts_top_level_braces() {
        let data = parse_ucl("{ id = \"web\" }").unwrap();
        assert_eq!(data.leaf("id"), Some(&Value::from("web")));
    }

    #[test]
    fn reports_unterminated_input() {
        assert!(matches!(
            parse_ucl("provision { method = \"x\";"),
            Err(ConfigError::Parse { format: "ucl", .. })
        ));
        assert!(parse_ucl("note = \"open").is_err());
    }

    #[test]
    fn writer_output_parses_back() {
        let mut data = ValueStore::new();
        data.set("vnet", Value::Bool(true));
        data.set("release", Value::Null);
        data.set("provision.rev", Value::from("master"));

        let text = to_ucl(&data);
        assert!(text.contains("\"vnet\" = \"on\";"));
        assert!(text.contains("\"release\" = \"none\";"));

        let read = parse_ucl(&text).unwrap();
        assert_eq!(read.leaf("vnet"), Some(&Value::from("on")));
        assert_eq!(read.leaf("provision.rev"), Some(&Value::from("master")));
    }

    #[test]
    fn file_read_is_marked_legacy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, "type = \"basejail\";\n").unwrap();

        let data = UclFile::new(&path).read().unwrap();
        assert_eq!(data.leaf("legacy"), Some(&Value::Bool(true)));
        assert_eq!(data.leaf("basejail"), Some(&Value::Bool(true)));
    }
}

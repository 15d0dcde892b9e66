use crate::env::Env;
use crate::error::{CompileError, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValuePart {
    Text(String),
    Variable(String),
}

/// A declaration value: literal text interleaved with `@name` references.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Value {
    parts: Vec<ValuePart>,
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            return Self::default();
        }
        Self {
            parts: vec![ValuePart::Text(text)],
        }
    }

    pub fn parse(source: &str) -> Self {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = source;

        while let Some(at) = rest.find('@') {
            let (before, after) = rest.split_at(at);
            let name_len = variable_name_len(&after[1..]);
            let glued = before
                .chars()
                .last()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '-');
            text.push_str(before);
            if name_len == 0 || glued {
                text.push('@');
                rest = &after[1..];
                continue;
            }
            if !text.is_empty() {
                parts.push(ValuePart::Text(std::mem::take(&mut text)));
            }
            parts.push(ValuePart::Variable(after[..=name_len].to_string()));
            rest = &after[name_len + 1..];
        }
        text.push_str(rest);
        if !text.is_empty() {
            parts.push(ValuePart::Text(text));
        }
        Self { parts }
    }

    /// Joins already compiled values with a single space, as `@arguments` does.
    pub fn join(values: &[Value]) -> Self {
        let text = values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        Self::text(text)
    }

    pub fn parts(&self) -> &[ValuePart] {
        &self.parts
    }

    pub fn is_resolved(&self) -> bool {
        self.parts
            .iter()
            .all(|part| matches!(part, ValuePart::Text(_)))
    }

    pub fn compile(&self, env: &mut Env, span: &Span) -> Result<Value, CompileError> {
        if self.is_resolved() {
            return Ok(self.clone());
        }
        let mut out = String::new();
        for part in &self.parts {
            match part {
                ValuePart::Text(text) => out.push_str(text),
                ValuePart::Variable(name) => {
                    let value = env.resolve_variable(name, span)?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(Value::text(out))
    }
}

fn variable_name_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '-'))
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Replaces `@{name}` occurrences inside selector text.
pub fn interpolate(source: &str, env: &mut Env, span: &Span) -> Result<String, CompileError> {
    let mut out = String::new();
    let mut rest = source;
    while let Some(start) = rest.find("@{") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = format!("@{}", &rest[start + 2..start + len]);
        out.push_str(&env.resolve_variable(&name, span)?.to_string());
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                ValuePart::Text(text) => f.write_str(text)?,
                ValuePart::Variable(name) => f.write_str(name)?,
            }
        }
        Ok(())
    }
}

impl From<String> for Value {
    fn from(source: String) -> Self {
        Value::parse(&source)
    }
}

impl From<&str> for Value {
    fn from(source: &str) -> Self {
        Value::parse(source)
    }
}

impl From<Value> for String {
    fn from(value: Value) -> Self {
        value.to_string()
    }
}

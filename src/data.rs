use std::borrow::Cow;
use std::path::Path;

use anyhow::{anyhow, Context};
use serde_json::{Map, Value};

/// The JSON data a template is filled from.
///
/// Read-only for the whole run. Nothing beyond "the top level is an object" is validated:
/// missing keys surface as lookup misses while filling.
#[derive(Clone, Debug)]
pub struct ReportData {
    root: Value,
}

impl ReportData {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read data: {}", path.display()))?;
        let text = String::from_utf8(bytes).context("data file must be utf-8")?;
        Self::parse(&text).with_context(|| format!("parse data: {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let relaxed = escape_raw_control_chars(text);
        let root: Value = serde_json::from_str(&relaxed).context("parse data json")?;
        if !root.is_object() {
            return Err(anyhow!("data root must be a JSON object"));
        }
        Ok(Self { root })
    }

    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.root.as_object()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields().is_some_and(|m| m.contains_key(key))
    }

    pub fn resolve(&self, path: &str) -> Option<&Value> {
        resolve(&self.root, path)
    }
}

impl From<Value> for ReportData {
    fn from(root: Value) -> Self {
        Self { root }
    }
}

/// Walks a dotted path (`database.db.name`) down from `value`.
///
/// Object segments are looked up by key, array segments by decimal index. Any missing
/// segment yields `None`; a container found at the end is returned as-is.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut cur = value;
    for seg in path.split('.') {
        if seg.is_empty() {
            return None;
        }
        cur = match cur {
            Value::Object(map) => map.get(seg)?,
            Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

/// Renders a value as run text. `null` has no rendering.
pub fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) if items.iter().all(is_scalar) => Some(
            items
                .iter()
                .filter_map(render)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        other => Some(other.to_string()),
    }
}

/// Renders every element of an array; `None` for anything that is not an array.
pub fn string_items(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    Some(items.iter().filter_map(render).collect())
}

fn is_scalar(v: &Value) -> bool {
    !matches!(v, Value::Array(_) | Value::Object(_))
}

/// Escapes raw control characters inside JSON string literals.
///
/// Data files are often pasted together by hand and carry literal newlines or tabs inside
/// strings; a strict parser rejects those.
fn escape_raw_control_chars(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| c.is_control()) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    out.push(c);
                }
                '"' => {
                    in_string = false;
                    out.push(c);
                }
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    Cow::Owned(out)
}

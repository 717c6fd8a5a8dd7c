//! Code template substitution
//!
//! Two placeholder forms:
//! - `{{name}}` is replaced by the plain value (`null` for null)
//! - `{{name:quote}}` is replaced by a double-quoted, escaped string literal
//!
//! Placeholders whose key is absent from the context are left untouched.
//! Substituted text is never scanned again.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::task::value_to_plain_string;

/// Values available to a template
pub type SkillContext = BTreeMap<String, Value>;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";
const QUOTE_SUFFIX: &str = ":quote";

/// Render `template` against `context`
pub fn render(template: &str, context: &SkillContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let token = &after_open[..end];
        match substitute(token, context) {
            Some(replacement) => out.push_str(&replacement),
            None => {
                out.push_str(OPEN);
                out.push_str(token);
                out.push_str(CLOSE);
            }
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

fn substitute(token: &str, context: &SkillContext) -> Option<String> {
    if let Some(key) = token.strip_suffix(QUOTE_SUFFIX) {
        return context.get(key).map(quote_value);
    }
    context.get(token).map(value_to_plain_string)
}

fn quote_value(value: &Value) -> String {
    if value.is_null() {
        return "null".to_string();
    }
    format!("\"{}\"", escape(&value_to_plain_string(value)))
}

/// Escape for a double-quoted literal: backslash first, then quote,
/// newline, carriage return and tab.
pub fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

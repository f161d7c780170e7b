//! Label-anchored field extraction from free-text agent replies.
//!
//! Replies are expected to contain `LABEL: value` lines, but agents wrap them
//! in commentary, markdown emphasis, bullets, or code fences. Each field is
//! located independently, so one missing or garbled field never affects the
//! others.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t>#*_`\-]*([A-Za-z][A-Za-z _-]*?)[ \t*_`]*[:=][ \t*_`]*(.*?)[ \t*_`\r]*$")
        .expect("field regex should compile")
});

/// Fields found in a reply, keyed by normalized label (`SKIP_TESTS`).
///
/// The first occurrence of a label wins.
#[derive(Debug, Clone, Default)]
pub struct ReplyFields {
    fields: HashMap<String, String>,
}

impl ReplyFields {
    pub fn parse(reply: &str) -> Self {
        let mut fields = HashMap::new();
        for caps in FIELD_RE.captures_iter(reply) {
            let (Some(label), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let value = clean_value(value.as_str());
            if value.is_empty() {
                continue;
            }
            fields
                .entry(normalize_label(label.as_str()))
                .or_insert(value);
        }
        Self { fields }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(&normalize_label(label)).map(String::as_str)
    }

    pub fn bool(&self, label: &str) -> Option<bool> {
        self.get(label).and_then(parse_bool)
    }

}

fn normalize_label(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

fn clean_value(value: &str) -> String {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '_' | '[' | ']'))
        .trim()
        .to_string()
}

/// First alphanumeric word of a value, lowercased (`Fix (null deref)` →
/// `fix`).
pub fn leading_word(value: &str) -> Option<String> {
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Interpret yes/no style answers. Only the leading word counts, so
/// `yes - trivial change` is `true`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match leading_word(value)?.as_str() {
        "yes" | "y" | "true" | "skip" => Some(true),
        "no" | "n" | "false" | "run" | "keep" => Some(false),
        _ => None,
    }
}

/// Leading integer of a value (`2 iterations` → 2).
pub fn parse_leading_number(value: &str) -> Option<u32> {
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

//! Poor man's English pluralization for field-name aliases.
//!
//! Only the last word of a (possibly multi-word) name is inflected. Usual
//! English rules are covered; irregular nouns are not, apart from a few
//! words that show up as field names and must stay as they are.

use regex::Regex;
use std::sync::LazyLock;

static RE_LAST_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)\b(\S+)$").unwrap());

const UNCHANGED: &[&str] = &["of", "off", "on", "description", "todo"];

/// Return the plural form of `field`.
pub fn plural(field: &str) -> String {
    let Some(caps) = RE_LAST_WORD.captures(field) else {
        return field.to_string();
    };
    let head = &caps[1];
    let word = &caps[2];

    let inflected = if is_upper(word) || UNCHANGED.contains(&word) || word.ends_with("ed") {
        word.to_string()
    } else if word.ends_with(['s', 'x', 'z']) || word.ends_with("sh") || word.ends_with("ch") {
        format!("{word}es")
    } else if let Some(stem) = word.strip_suffix("fe") {
        format!("{stem}ves")
    } else if let Some(stem) = word.strip_suffix('f') {
        format!("{stem}ves")
    } else if let Some(stem) = word.strip_suffix('y') {
        format!("{stem}ies")
    } else if word.ends_with('o') {
        format!("{word}es")
    } else if let Some(stem) = word.strip_suffix("on") {
        format!("{stem}a")
    } else if let Some(stem) = word.strip_suffix("an") {
        format!("{stem}en")
    } else {
        format!("{word}s")
    };

    format!("{head}{inflected}")
}

/// True when the word has cased characters and all of them are uppercase.
fn is_upper(word: &str) -> bool {
    let mut cased = word.chars().filter(|c| c.is_lowercase() || c.is_uppercase());
    let mut any = false;
    let all_upper = cased.all(|c| {
        any = true;
        c.is_uppercase()
    });
    any && all_upper
}

//! List-file matchers for `update-from-file` rules.
//!
//! A list file holds one fully-qualified test name per line, optionally
//! followed by a `#` comment. Only lines starting with the implemented base
//! name (e.g. `igt@`) are used; planned tests are never matched.

use crate::config::{MatchType, UpdateFromFile};
use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A compiled matcher, always tested against the whole name.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    fn new(pattern: &str, ignore_case: bool) -> Result<Self> {
        let anchored = format!("^(?:{pattern})$");
        let regex = RegexBuilder::new(&anchored)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| Error::regex(pattern, e))?;
        Ok(Matcher { regex })
    }

    pub fn full_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

/// Matchers grouped by the label they contribute, in declaration order.
pub type LabelMatchers = Vec<(String, Vec<Matcher>)>;

/// An `update-from-file` rule with its list files loaded.
#[derive(Debug, Clone, Default)]
pub struct UpdateRule {
    pub default_value: Option<String>,
    pub append_value: Option<String>,
    pub include: LabelMatchers,
    pub exclude: LabelMatchers,
}

/// Turns list-file lines into matchers.
pub struct ListReader {
    separator: String,
    line_re: Regex,
}

impl ListReader {
    /// `base_name` already carries the trailing separator (`igt@`).
    pub fn new(base_name: &str, separator: &str) -> Result<Self> {
        let pattern = format!(
            r"^\s*({}[^\s{}]+)(\S*)\s*(#.*)?$",
            regex::escape(base_name),
            regex::escape(separator)
        );
        let line_re = Regex::new(&pattern).map_err(|e| Error::regex(&pattern, e))?;
        Ok(ListReader {
            separator: separator.to_string(),
            line_re,
        })
    }

    pub fn read(&self, match_type: MatchType, path: &Path) -> Result<Vec<Matcher>> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let matchers = self.parse(match_type, &content)?;
        tracing::debug!(
            "{}: {} matchers ({:?})",
            path.display(),
            matchers.len(),
            match_type
        );
        Ok(matchers)
    }

    pub fn parse(&self, match_type: MatchType, content: &str) -> Result<Vec<Matcher>> {
        let mut matchers = Vec::new();
        for line in content.lines() {
            let Some(caps) = self.line_re.captures(line) else {
                continue;
            };
            let name = format!("{}{}", &caps[1], &caps[2]);
            let matcher = match match_type {
                MatchType::Regex | MatchType::RegexIgnorecase => {
                    let pattern = if name.ends_with('$') {
                        name
                    } else {
                        format!("{name}({}.*)?$", regex::escape(&self.separator))
                    };
                    Matcher::new(&pattern, match_type == MatchType::RegexIgnorecase)?
                }
                MatchType::SubtestMatch => self.prefix_matcher(&name)?,
            };
            matchers.push(matcher);
        }
        Ok(matchers)
    }

    /// Keep at most `base@test@subtest`; deeper dynamic subtests are
    /// accepted through the optional suffix.
    fn prefix_matcher(&self, name: &str) -> Result<Matcher> {
        let name = name.strip_suffix('$').unwrap_or(name);
        let prefix = name
            .split(self.separator.as_str())
            .take(3)
            .collect::<Vec<_>>()
            .join(&self.separator);
        let sep = regex::escape(&self.separator);
        Matcher::new(&format!("{}({sep}.*)?", regex::escape(&prefix)), false)
    }
}

/// Load every list file named by `rule`, relative to `dir`.
///
/// Labels repeated across entries accumulate their matchers.
pub fn compile(
    rule: &UpdateFromFile,
    include_type: MatchType,
    exclude_type: MatchType,
    dir: &Path,
    reader: &ListReader,
) -> Result<UpdateRule> {
    Ok(UpdateRule {
        default_value: rule.default_if_not_excluded.clone(),
        append_value: rule.append_value_if_not_excluded.clone(),
        include: load_lists(&rule.include, include_type, dir, reader)?,
        exclude: load_lists(&rule.exclude, exclude_type, dir, reader)?,
    })
}

fn load_lists(
    entries: &[BTreeMap<String, String>],
    match_type: MatchType,
    dir: &Path,
    reader: &ListReader,
) -> Result<LabelMatchers> {
    let mut lists: LabelMatchers = Vec::new();
    for entry in entries {
        for (label, file) in entry {
            let matchers = reader.read(match_type, &dir.join(file))?;
            match lists.iter_mut().find(|(l, _)| l == label) {
                Some((_, existing)) => existing.extend(matchers),
                None => lists.push((label.clone(), matchers)),
            }
        }
    }
    Ok(lists)
}

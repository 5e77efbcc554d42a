//! Field reconciliation from include/exclude list files.
//!
//! Fields with an `update-from-file` rule hold a comma-separated set of
//! labels. Each expanded subtest gets the labels of every include list
//! naming it, loses the labels of every exclude list naming it, and falls
//! back to the rule's default when nothing else applies.

use crate::expand::ExpandedSubtest;
use crate::schema::testlist::{LabelMatchers, UpdateRule};
use crate::schema::FieldTable;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static RE_LIST_SEP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").unwrap());

/// Apply every update rule of `schema` to `record`.
pub fn reconcile(schema: &FieldTable, record: &mut ExpandedSubtest) {
    for def in schema.iter() {
        let Some(rule) = def.update.as_ref() else {
            continue;
        };
        let current = record.fields.get(&def.name).map(String::as_str);
        let values = apply_rule(rule, &record.name, current);
        if values.is_empty() && !def.is_mandatory() {
            record.fields.remove(&def.name);
        } else {
            let joined = values.into_iter().collect::<Vec<_>>().join(", ");
            record.fields.insert(def.name.clone(), joined);
        }
    }
}

/// Compute the new label set for `name`.
fn apply_rule(rule: &UpdateRule, name: &str, current: Option<&str>) -> BTreeSet<String> {
    let mut values = current.map(split_labels).unwrap_or_default();
    if let Some(append) = rule.append_value.as_deref() {
        values.extend(split_labels(append));
    }

    for labels in matching(&rule.include, name) {
        values.extend(split_labels(labels));
    }

    // Excluding exactly what is there also drops the default.
    let mut set_default = true;
    for labels in matching(&rule.exclude, name) {
        let deleted = split_labels(labels);
        if deleted == values {
            set_default = false;
        }
        values.retain(|v| !deleted.contains(v));
    }

    if values.is_empty() && set_default {
        if let Some(default) = rule.default_value.as_deref() {
            values.insert(default.to_string());
        }
    }

    values
}

/// Labels whose list names `name`.
fn matching<'r>(lists: &'r LabelMatchers, name: &'r str) -> impl Iterator<Item = &'r str> {
    lists
        .iter()
        .filter(move |(_, matchers)| matchers.iter().any(|m| m.full_match(name)))
        .map(|(label, _)| label.as_str())
}

fn split_labels(value: &str) -> BTreeSet<String> {
    RE_LIST_SEP
        .split(value)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchType;
    use crate::model::Fields;
    use crate::schema::testlist::ListReader;
    use serde_json::{Map, Value};

    fn matchers(lines: &str) -> Vec<crate::schema::testlist::Matcher> {
        ListReader::new("igt@", "@")
            .unwrap()
            .parse(MatchType::SubtestMatch, lines)
            .unwrap()
    }

    fn schema(mandatory: bool, rule: UpdateRule) -> FieldTable {
        let fields: Map<String, Value> = serde_json::from_str(&format!(
            r#"{{ "Run type": {{ "_properties_": {{ "mandatory": {mandatory} }} }} }}"#
        ))
        .unwrap();
        let mut table = FieldTable::build(&fields, false).unwrap();
        table.set_update_rule("Run type", rule);
        table
    }

    fn record(name: &str, run_type: Option<&str>) -> ExpandedSubtest {
        let mut fields = Fields::new();
        if let Some(v) = run_type {
            fields.insert("Run type".into(), v.into());
        }
        ExpandedSubtest {
            name: name.into(),
            fields,
            line: 1,
            subtest_id: 0,
        }
    }

    fn ci_rule() -> UpdateRule {
        UpdateRule {
            default_value: Some("FULL".into()),
            append_value: None,
            include: vec![("BAT".into(), matchers("igt@foo@basic\n"))],
            exclude: vec![("BAT, FULL".into(), matchers("igt@foo@broken\n"))],
        }
    }

    #[test]
    fn include_adds_label() {
        let table = schema(false, ci_rule());
        let mut r = record("igt@foo@basic", Some("stress"));
        reconcile(&table, &mut r);
        assert_eq!(r.fields["Run type"], "BAT, stress");
    }

    #[test]
    fn default_when_nothing_applies() {
        let table = schema(false, ci_rule());
        let mut r = record("igt@foo@other", None);
        reconcile(&table, &mut r);
        assert_eq!(r.fields["Run type"], "FULL");
    }

    #[test]
    fn exclusion_of_everything_suppresses_default() {
        let table = schema(false, ci_rule());
        let mut r = record("igt@foo@broken", Some("FULL, BAT"));
        reconcile(&table, &mut r);
        assert!(!r.fields.contains_key("Run type"));
    }

    #[test]
    fn mandatory_field_is_kept_empty() {
        let mut rule = ci_rule();
        rule.default_value = None;
        let table = schema(true, rule);
        let mut r = record("igt@foo@broken", Some("BAT"));
        reconcile(&table, &mut r);
        assert_eq!(r.fields["Run type"], "");
    }

    #[test]
    fn append_value_unless_excluded() {
        let mut rule = ci_rule();
        rule.append_value = Some("all".into());
        rule.exclude = vec![("all".into(), matchers("igt@foo@skip\n"))];
        let table = schema(false, rule);

        let mut kept = record("igt@foo@x", None);
        reconcile(&table, &mut kept);
        assert_eq!(kept.fields["Run type"], "all");

        let mut skipped = record("igt@foo@skip", None);
        reconcile(&table, &mut skipped);
        assert!(!skipped.fields.contains_key("Run type"));
    }

    #[test]
    fn reconcile_is_deterministic() {
        let table = schema(false, ci_rule());
        let mut once = record("igt@foo@basic@dynamic", Some("stress, BAT"));
        reconcile(&table, &mut once);
        let mut twice = once.clone();
        reconcile(&table, &mut twice);
        assert_eq!(once, twice);
        assert_eq!(once.fields["Run type"], "BAT, stress");
    }
}

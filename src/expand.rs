//! Wildcard expansion of subtest summaries.
//!
//! A subtest summary may carry `%s`/`%d`-style placeholders. Each placeholder
//! position draws its values from one slot of the argument template active
//! when the subtest was declared; the expansion is the cartesian product of
//! the slots, enumerated like an odometer with slot 0 turning fastest.

use crate::error::{Error, Result};
use crate::model::{is_placeholder, Fields, Test};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

static RE_INT_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(?:d|ld|lld|i|u|lu|llu)").unwrap());

static RE_ARG_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%?\barg\[(\d+)\]").unwrap());

// -- Types --------------------------------------------------------------------

/// One concrete subtest produced by expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedSubtest {
    /// Fully-qualified name, e.g. `igt@foo@bar-small`.
    pub name: String,
    pub fields: Fields,
    /// Line of the originating `SUBTEST:` tag.
    pub line: usize,
    /// Id of the originating [`Subtest`](crate::model::Subtest).
    pub subtest_id: usize,
}

// -- Expansion ----------------------------------------------------------------

/// Expand every subtest of `test`.
///
/// Without `allow_inherit`, fields whose value equals the test-level value
/// are left out of the records.
pub fn expand(test: &Test, allow_inherit: bool, separator: &str) -> Result<Vec<ExpandedSubtest>> {
    let test_name = test.name();
    let mut records = Vec::new();

    for sub in &test.subtests {
        let mut summary = test_name.clone();
        if !sub.summary.is_empty() {
            summary.push_str(separator);
            summary.push_str(&sub.summary);
        }

        let num_vars = summary.matches('%').count();
        if num_vars == 0 {
            records.push(ExpandedSubtest {
                name: summary,
                fields: visible_fields(test, &sub.fields, allow_inherit, |v| v.to_string()),
                line: sub.line,
                subtest_id: sub.id,
            });
            continue;
        }

        let slots = collect_slots(test, sub.template, &summary, num_vars)?;
        let normalized = RE_INT_FORMAT.replace_all(&summary, "%s");
        let pieces: Vec<&str> = normalized.split("%s").collect();
        if pieces.len() != num_vars + 1 {
            return Err(Error::UnsupportedFormat {
                file: test.file.clone(),
                subtest: summary,
            });
        }

        let mut pos = vec![0usize; num_vars];
        loop {
            let mut name = String::with_capacity(normalized.len());
            let mut resolved = Vec::with_capacity(num_vars);
            for (j, piece) in pieces.iter().enumerate() {
                name.push_str(piece);
                let Some(slot) = slots.get(j) else { break };
                let (token, value) = slot[pos[j]];
                if is_placeholder(value) {
                    name.push('<');
                    name.push_str(token);
                    name.push('>');
                } else {
                    name.push_str(token);
                }
                resolved.push(value);
            }

            let fields = visible_fields(test, &sub.fields, allow_inherit, |v| {
                substitute_args(v, &resolved)
            });
            records.push(ExpandedSubtest {
                name,
                fields,
                line: sub.line,
                subtest_id: sub.id,
            });

            if !advance(&mut pos, &slots) {
                break;
            }
        }
    }

    Ok(records)
}

/// Sorted `(token, value)` pairs for the first `num_vars` slots.
fn collect_slots<'t>(
    test: &'t Test,
    template: usize,
    summary: &str,
    num_vars: usize,
) -> Result<Vec<Vec<(&'t str, &'t str)>>> {
    let slots = test.templates.get(&template).map(|t| &t.slots);
    let defined = slots.map_or(0, BTreeMap::len);
    if defined < num_vars {
        return Err(Error::InsufficientArguments {
            file: test.file.clone(),
            subtest: summary.to_string(),
            needed: num_vars,
            defined,
        });
    }

    (0..num_vars)
        .map(|j| {
            slots
                .and_then(|s| s.get(&j))
                .filter(|tokens| !tokens.is_empty())
                .map(|tokens| {
                    tokens
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .collect::<Vec<_>>()
                })
                .ok_or_else(|| Error::MissingArgument {
                    file: test.file.clone(),
                    subtest: summary.to_string(),
                    index: j + 1,
                })
        })
        .collect()
}

/// Step the odometer; false once every combination was produced.
fn advance<T>(pos: &mut [usize], slots: &[Vec<T>]) -> bool {
    for (p, slot) in pos.iter_mut().zip(slots) {
        *p += 1;
        if *p < slot.len() {
            return true;
        }
        *p = 0;
    }
    false
}

/// Replace `arg[n]` (1-based) with the resolved value of slot n-1.
/// References past the last slot are left alone.
fn substitute_args(value: &str, resolved: &[&str]) -> String {
    RE_ARG_REF
        .replace_all(value, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| resolved.get(i))
                .map_or_else(|| caps[0].to_string(), |v| v.to_string())
        })
        .into_owned()
}

fn visible_fields(
    test: &Test,
    fields: &Fields,
    allow_inherit: bool,
    transform: impl Fn(&str) -> String,
) -> Fields {
    let mut out = Fields::new();
    for (field, value) in fields {
        let value = transform(value);
        if !allow_inherit && test.fields.get(field) == Some(&value) {
            continue;
        }
        out.insert(field.clone(), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentModel;
    use std::path::Path;

    fn wildcard_test() -> DocumentModel {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/foo.c"), "igt@", "Foo");
        let test = model.test_mut(id).unwrap();
        test.fields.insert("Category".into(), "Software".into());
        let sub = test.add_subtest("test-%s-%d-size", 1, 10);
        test.subtests[sub]
            .fields
            .insert("Description".into(), "Test arg[1] with %arg[2] size".into());

        let template = test.templates.get_mut(&1).unwrap();
        for token in ["small", "large"] {
            template.slot_mut(0).insert(token.into(), token.into());
        }
        for token in ["16", "32"] {
            template.slot_mut(1).insert(token.into(), token.into());
        }
        model
    }

    #[test]
    fn expands_cartesian_product() {
        let model = wildcard_test();
        let records = expand(&model.tests()[0], true, "@").unwrap();
        let mut names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        // odometer order, slot 0 fastest over sorted tokens; the
        // small/large by 16/32 scenario itself is checked as a set below
        assert_eq!(
            names,
            [
                "igt@foo@test-large-16-size",
                "igt@foo@test-small-16-size",
                "igt@foo@test-large-32-size",
                "igt@foo@test-small-32-size",
            ]
        );
        names.sort();
        names.dedup();
        assert_eq!(
            names,
            [
                "igt@foo@test-large-16-size",
                "igt@foo@test-large-32-size",
                "igt@foo@test-small-16-size",
                "igt@foo@test-small-32-size",
            ]
        );
        assert_eq!(
            records[1].fields["Description"],
            "Test small with 16 size"
        );
        assert!(records.iter().all(|r| r.line == 10 && r.subtest_id == 0));
    }

    #[test]
    fn product_size() {
        let mut model = wildcard_test();
        let test = model.test_mut(0).unwrap();
        test.add_subtest("%s-%s-%s", 1, 20);
        test.templates
            .get_mut(&1)
            .unwrap()
            .slot_mut(2)
            .extend(["a", "b", "c"].map(|t| (t.to_string(), t.to_string())));
        let records = expand(&model.tests()[0], true, "@").unwrap();
        let from_second: Vec<_> = records.iter().filter(|r| r.subtest_id == 1).collect();
        assert_eq!(from_second.len(), 2 * 2 * 3);
    }

    #[test]
    fn placeholders_display_their_token() {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/bar.c"), "igt@", "");
        let test = model.test_mut(id).unwrap();
        let sub = test.add_subtest("size-%d", 1, 3);
        test.subtests[sub]
            .fields
            .insert("Description".into(), "uses arg[1], not arg[2]".into());
        test.templates
            .get_mut(&1)
            .unwrap()
            .slot_mut(0)
            .insert("buffer size".into(), "<buffer size in bytes>".into());

        let records = expand(&model.tests()[0], true, "@").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "igt@bar@size-<buffer size>");
        assert_eq!(
            records[0].fields["Description"],
            "uses <buffer size in bytes>, not arg[2]"
        );
    }

    #[test]
    fn zero_wildcards_is_idempotent() {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/foo.c"), "igt@", "");
        let test = model.test_mut(id).unwrap();
        test.fields.insert("Category".into(), "Software".into());
        let sub = test.add_subtest("basic", 1, 5);
        test.subtests[sub]
            .fields
            .insert("Description".into(), "arg[1] is literal here".into());

        let first = expand(&model.tests()[0], true, "@").unwrap();
        let second = expand(&model.tests()[0], true, "@").unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].name, "igt@foo@basic");
        assert_eq!(first[0].fields["Description"], "arg[1] is literal here");
    }

    #[test]
    fn inheritance_omits_test_level_values() {
        let model = wildcard_test();
        let inherited = expand(&model.tests()[0], true, "@").unwrap();
        assert_eq!(inherited[0].fields["Category"], "Software");
        let own = expand(&model.tests()[0], false, "@").unwrap();
        assert!(!own[0].fields.contains_key("Category"));
        assert!(own[0].fields.contains_key("Description"));
    }

    #[test]
    fn nameless_subtest_uses_test_name() {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/solo.c"), "igt@", "");
        model.test_mut(id).unwrap().add_subtest("", 1, 2);
        let records = expand(&model.tests()[0], true, "@").unwrap();
        assert_eq!(records[0].name, "igt@solo");
    }

    #[test]
    fn insufficient_arguments_is_fatal() {
        let mut model = wildcard_test();
        model.test_mut(0).unwrap().add_subtest("%s-%s-%s", 1, 20);
        let err = expand(&model.tests()[0], true, "@").unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientArguments { needed: 3, defined: 2, .. }
        ));
    }

    #[test]
    fn empty_slot_is_fatal() {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/foo.c"), "igt@", "");
        let test = model.test_mut(id).unwrap();
        test.add_subtest("x-%s", 1, 2);
        test.templates.get_mut(&1).unwrap().slot_mut(0);
        let err = expand(&model.tests()[0], true, "@").unwrap_err();
        assert!(matches!(err, Error::MissingArgument { index: 1, .. }));
    }

    #[test]
    fn unsupported_format_is_fatal() {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/foo.c"), "igt@", "");
        let test = model.test_mut(id).unwrap();
        test.add_subtest("x-%f", 1, 2);
        test.templates
            .get_mut(&1)
            .unwrap()
            .slot_mut(0)
            .insert("1".into(), "1".into());
        let err = expand(&model.tests()[0], true, "@").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { .. }));
    }

    #[test]
    fn arg_references() {
        assert_eq!(substitute_args("arg[1]-%arg[2]", &["a", "b"]), "a-b");
        assert_eq!(substitute_args("arg[0] arg[3]", &["a"]), "arg[0] arg[3]");
        assert_eq!(substitute_args("xarg[1]", &["a"]), "xarg[1]");
    }
}

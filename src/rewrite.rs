//! In-place rewrite of documentation comments from a sheet.
//!
//! Rows are matched to documented subtests by their expanded name. Every
//! changed value of a field without an `update-from-file` rule is written
//! back to the `SUBTEST:` block that declared it: an existing field line is
//! replaced, an empty value removes it, and a new field goes right before
//! the end of the subtest's section.

use crate::error::{Error, Result, Warning};
use crate::plan::TestPlan;
use crate::render::sheet::Sheet;
use crate::schema::FieldTable;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

static RE_BLOCK_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\*/\s*$").unwrap());

static RE_BLANK_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\*\s*$").unwrap());

static RE_LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\* ?").unwrap());

/// Lines that open another section of the block.
static RE_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:SUBTESTS?:|TEST:|arg\[\d+\](?:\.values)?:|@\S+:)").unwrap()
});

static RE_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:]+):\s*(.*)").unwrap());

static RE_ARG_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%?arg\[(\d+)\]").unwrap());

/// One pending field change.
#[derive(Debug)]
struct Edit {
    /// `SUBTEST:` tag line, 1-based.
    line: usize,
    subtest: String,
    field: String,
    value: String,
}

/// Set `field` to `value` in the section starting at the 1-based tag
/// `line`. Returns `false` when the comment block has no end.
pub fn change_value(
    lines: &mut Vec<String>,
    schema: &FieldTable,
    line: usize,
    field: &str,
    value: &str,
) -> bool {
    let mut found: Option<usize> = None;
    let mut continuation = Vec::new();
    let mut in_field = false;
    let mut end = None;

    for (i, raw) in lines.iter().enumerate().skip(line) {
        if RE_BLOCK_END.is_match(raw) {
            end = Some(i);
            break;
        }
        if RE_BLANK_STAR.is_match(raw) {
            in_field = false;
            continue;
        }
        let text = RE_LINE_PREFIX.replace(raw, "");
        if RE_SECTION.is_match(&text) {
            end = Some(i);
            break;
        }
        let resolved = RE_FIELD
            .captures(&text)
            .and_then(|caps| schema.resolve(&caps[1]));
        match resolved {
            Some(name) => {
                in_field = name == field;
                if in_field {
                    found = Some(i);
                    continuation.clear();
                }
            }
            None if in_field => continuation.push(i),
            None => {}
        }
    }

    let Some(mut end) = end else {
        return false;
    };

    let new_lines = field_lines(field, value);
    if let Some(start) = found {
        for i in continuation.into_iter().rev() {
            lines.remove(i);
        }
        lines.splice(start..=start, new_lines);
        return true;
    }
    if !new_lines.is_empty() {
        if end > line + 1 && RE_BLANK_STAR.is_match(&lines[end - 1]) {
            end -= 1;
        }
        lines.splice(end..end, new_lines);
    }
    true
}

/// Source lines for `field: value`, one per value line.
fn field_lines(field: &str, value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    let mut parts = value.lines();
    let first = parts.next().unwrap_or_default();
    std::iter::once(format!(" * {field}: {first}"))
        .chain(parts.map(|more| format!(" *   {}", more.trim())))
        .collect()
}

impl TestPlan {
    /// Write the changed values of `sheet` back to the documented sources.
    pub fn import_sheet(&self, sheet: &Sheet) -> Result<Vec<Warning>> {
        let schema = self.schema();
        let columns: Vec<Option<&str>> = sheet
            .header
            .iter()
            .map(|h| {
                schema
                    .resolve(h.trim())
                    .filter(|f| {
                        schema
                            .get(f)
                            .is_some_and(|def| def.properties.update_from_file.is_none())
                    })
            })
            .collect();

        // expanded name -> (test, subtest)
        let mut documented = BTreeMap::new();
        for (t, test) in self.model().tests().iter().enumerate() {
            for record in self.expand_test(test, true)? {
                documented.insert(record.name, (t, record.subtest_id));
            }
        }

        let mut warnings = Vec::new();
        let mut edits: BTreeMap<PathBuf, Vec<Edit>> = BTreeMap::new();
        for row in &sheet.rows {
            let Some(name) = row.first().map(|n| n.trim()).filter(|n| !n.is_empty()) else {
                continue;
            };
            let found = documented.get(name).and_then(|&(t, s)| {
                let test = self.model().test(t)?;
                Some((test, test.subtest(s)?))
            });
            let Some((test, subtest)) = found else {
                let mut parts = name.splitn(3, self.separator());
                let test = [parts.next(), parts.next()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(self.separator());
                let warning = Warning::UndocumentedSubtest {
                    test,
                    subtest: parts.next().unwrap_or_default().to_string(),
                };
                warnings.push(warning.emit());
                continue;
            };

            for (cell, column) in row.iter().zip(&columns).skip(1) {
                let Some(field) = column else { continue };
                let value = cell.trim();
                let current = subtest.fields.get(*field).map_or("", String::as_str);
                if RE_ARG_REF.is_match(current) {
                    let warning = Warning::WildcardField {
                        subtest: name.to_string(),
                        field: field.to_string(),
                    };
                    warnings.push(warning.emit());
                    continue;
                }
                if value == current {
                    continue;
                }
                if !value.is_empty() && test.fields.get(*field).is_some_and(|v| v == value) {
                    tracing::debug!("{name} field {field}: value matches the test, ignoring it");
                    continue;
                }
                tracing::info!(
                    "update {name} field {field} on line {}: {current:?} -> {value:?}",
                    subtest.line
                );
                edits.entry(test.file.clone()).or_default().push(Edit {
                    line: subtest.line,
                    subtest: name.to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }

        for (path, mut file_edits) in edits {
            let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

            // later sections first, so earlier tag lines stay valid
            file_edits.sort_by(|a, b| b.line.cmp(&a.line));
            for edit in &file_edits {
                if !change_value(&mut lines, schema, edit.line, &edit.field, &edit.value) {
                    let warning = Warning::DocStringNotFound {
                        subtest: edit.subtest.clone(),
                        field: edit.field.clone(),
                        line: edit.line,
                    };
                    warnings.push(warning.emit());
                }
            }

            let mut out = lines.join("\n");
            if content.ends_with('\n') {
                out.push('\n');
            }
            tracing::debug!("writing {}", path.display());
            fs::write(&path, out).map_err(|e| Error::io(&path, e))?;
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{sample_plan, SAMPLE_SOURCE};
    use serde_json::json;

    fn schema() -> FieldTable {
        let fields = json!({
            "Description": {},
            "Run type": {},
            "Category": {}
        });
        FieldTable::build(fields.as_object().unwrap(), false).unwrap()
    }

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    const BLOCK: &str = "\
/**
 * TEST: foo
 *
 * SUBTEST: a
 * Description: first line
 *   second line
 * Run type: BAT
 *
 * SUBTEST: b
 */";

    #[test]
    fn replaces_field_and_continuation() {
        let mut content = lines(BLOCK);
        assert!(change_value(&mut content, &schema(), 4, "Description", "short"));
        assert_eq!(content[4], " * Description: short");
        assert_eq!(content[5], " * Run type: BAT");
        assert_eq!(content.len(), 9);
    }

    #[test]
    fn empty_value_removes_field() {
        let mut content = lines(BLOCK);
        assert!(change_value(&mut content, &schema(), 4, "Run type", ""));
        assert!(!content.iter().any(|l| l.contains("Run type")));
        assert_eq!(content[6], " *");
    }

    #[test]
    fn inserts_before_separator() {
        let mut content = lines(BLOCK);
        assert!(change_value(&mut content, &schema(), 4, "Category", "Hardware"));
        assert_eq!(content[7], " * Category: Hardware");
        assert_eq!(content[8], " *");
        assert_eq!(content[9], " * SUBTEST: b");

        // last section: right before the block end
        assert!(change_value(&mut content, &schema(), 10, "Category", "Software"));
        assert_eq!(content[10], " * Category: Software");
        assert_eq!(content[11], " */");
    }

    #[test]
    fn indented_continuation_is_not_a_field() {
        let mut content = lines(
            "/**\n * TEST: foo\n * SUBTEST: a\n * Description: first line\n *   category: note inside description\n */",
        );
        assert!(change_value(&mut content, &schema(), 3, "Category", "Hardware"));
        assert_eq!(content[3], " * Description: first line");
        assert_eq!(content[4], " *   category: note inside description");
        assert_eq!(content[5], " * Category: Hardware");
        assert_eq!(content[6], " */");

        // replacing the field drops its continuation, whatever it looks like
        assert!(change_value(&mut content, &schema(), 3, "Description", "single"));
        assert_eq!(content[3], " * Description: single");
        assert_eq!(content[4], " * Category: Hardware");
    }

    #[test]
    fn multi_line_values() {
        let mut content = lines(BLOCK);
        assert!(change_value(&mut content, &schema(), 9, "Description", "one\ntwo"));
        assert_eq!(content[9], " * Description: one");
        assert_eq!(content[10], " *   two");
    }

    #[test]
    fn unterminated_block() {
        let mut content = lines("/**\n * TEST: foo\n * SUBTEST: a\n * Description: x");
        assert!(!change_value(&mut content, &schema(), 3, "Description", "y"));
        assert_eq!(content[3], " * Description: x");
    }

    fn sheet(rows: &[&[&str]]) -> Sheet {
        Sheet {
            header: ["Test name", "Description", "Run type", "Category"]
                .map(String::from)
                .to_vec(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn source(plan: &TestPlan) -> String {
        fs::read_to_string(&plan.files()[0]).unwrap()
    }

    #[test]
    fn unchanged_sheet_leaves_sources_alone() {
        let (_dir, plan) = sample_plan();
        let warnings = plan
            .import_sheet(&sheet(&[&["igt@foo@basic", "basic foo", "BAT", "Software"]]))
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(source(&plan), SAMPLE_SOURCE);
    }

    #[test]
    fn imports_changed_values() {
        let (_dir, plan) = sample_plan();
        let warnings = plan
            .import_sheet(&sheet(&[
                &["igt@foo@basic", "basic foo, updated", "FULL", "Hardware"],
                &["igt@foo@size-16", "foo with 16", "", "Software"],
                &["igt@bar@x", "", "", ""],
            ]))
            .unwrap();
        assert_eq!(
            warnings,
            [
                Warning::WildcardField {
                    subtest: "igt@foo@size-16".into(),
                    field: "Description".into(),
                },
                Warning::UndocumentedSubtest {
                    test: "igt@bar".into(),
                    subtest: "x".into(),
                },
            ]
        );
        assert!(source(&plan).contains(
            " * SUBTEST: basic\n * Description: basic foo, updated\n * Run type: FULL\n * Category: Hardware\n *\n * SUBTEST: size-%s\n"
        ));
        // the second section is untouched
        assert!(source(&plan).contains(" * SUBTEST: size-%s\n * Description: foo with arg[1]\n * Sub-category: sizes\n"));
    }
}

//! Documentation coverage check.
//!
//! The documented names (expanded, filtered, canonicalized) are diffed
//! against the names listed by the compiled test binaries. Every
//! discrepancy is collected before the report is returned.

use crate::error::{Error, Result, Warning};
use crate::plan::TestPlan;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static RE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// One coverage discrepancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverageError {
    /// Listed by a binary, not documented.
    Missing(String),
    /// Documented, not listed by a binary that was built.
    Unneeded(String),
}

impl fmt::Display for CoverageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageError::Missing(name) => write!(f, "Missing documentation for {name}"),
            CoverageError::Unneeded(name) => write!(f, "Unneeded documentation for {name}"),
        }
    }
}

/// Outcome of a coverage check.
#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub errors: Vec<CoverageError>,
    pub warnings: Vec<Warning>,
}

impl CoverageReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Keep the first three `separator` components and turn `<...>`
/// placeholders into a digit pattern.
pub fn canonical_name(name: &str, separator: &str) -> String {
    let truncated = name
        .split(separator)
        .take(3)
        .collect::<Vec<_>>()
        .join(separator);
    RE_PLACEHOLDER.replace_all(&truncated, r"\d+").into_owned()
}

/// Diff documented names against the actual ones. Unneeded entries whose
/// binary was not compiled are tolerated.
pub fn check_coverage(
    documented: &BTreeSet<String>,
    actual: &BTreeSet<String>,
    not_compiled: &BTreeSet<String>,
    separator: &str,
) -> Vec<CoverageError> {
    let missing = actual
        .difference(documented)
        .map(|n| CoverageError::Missing(n.clone()));
    let unneeded = documented
        .difference(actual)
        .filter(|n| {
            n.split(separator)
                .nth(1)
                .map_or(true, |binary| !not_compiled.contains(binary))
        })
        .map(|n| CoverageError::Unneeded(n.clone()));
    missing.chain(unneeded).collect()
}

impl TestPlan {
    /// Compare documented subtests with the testlists of the build.
    pub fn check_tests(&self) -> Result<CoverageReport> {
        let build = self.build_path().ok_or(Error::MissingBuildPath)?;
        if !self.filters().is_empty() {
            tracing::info!("test checks are affected by filters");
        }

        let mandatory: Vec<&str> = self.schema().mandatory_fields().collect();
        let mut report = CoverageReport::default();
        let mut documented = BTreeSet::new();
        for (name, fields) in self.subtest_dictionary()? {
            let name = canonical_name(&name, self.separator());
            for field in &mandatory {
                if !fields.contains_key(*field) {
                    let warning = Warning::MissingMandatoryField {
                        subtest: name.clone(),
                        field: field.to_string(),
                    };
                    report.warnings.push(warning.emit());
                }
            }
            documented.insert(name);
        }

        let not_compiled = self.not_compiled(build);
        let actual = self.read_testlists(build, &not_compiled, &mut report.warnings)?;
        report.errors = check_coverage(&documented, &actual, &not_compiled, self.separator());
        Ok(report)
    }

    fn binaries(&self) -> impl Iterator<Item = String> + '_ {
        self.files().iter().filter_map(|f| {
            f.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
    }

    /// Binaries with no executable under `<build>/tests`.
    fn not_compiled(&self, build: &Path) -> BTreeSet<String> {
        self.binaries()
            .filter(|b| !build.join("tests").join(b).is_file())
            .collect()
    }

    /// Names listed by every compiled binary's `.testlist` file.
    fn read_testlists(
        &self,
        build: &Path,
        not_compiled: &BTreeSet<String>,
        warnings: &mut Vec<Warning>,
    ) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for binary in self.binaries() {
            if not_compiled.contains(&binary) {
                continue;
            }
            let path = build.join("tests").join(format!("{binary}.testlist"));
            if !path.is_file() {
                warnings.push(Warning::TestlistNotFound { path }.emit());
                continue;
            }
            let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
            names.extend(
                content
                    .lines()
                    .map(str::trim_end)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::plan::TestPlanOptions;
    use tempfile::TempDir;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_name("igt@drv@a", "@"), "igt@drv@a");
        assert_eq!(canonical_name("igt@drv@a@pipe-a", "@"), "igt@drv@a");
        assert_eq!(
            canonical_name("igt@drv@size-<buffer size>", "@"),
            r"igt@drv@size-\d+"
        );
    }

    #[test]
    fn unneeded_documentation_for_built_binary() {
        let errors = check_coverage(
            &set(&["igt@drv@a", "igt@drv@b"]),
            &set(&["igt@drv@a"]),
            &set(&[]),
            "@",
        );
        assert_eq!(errors, [CoverageError::Unneeded("igt@drv@b".into())]);
        assert_eq!(errors[0].to_string(), "Unneeded documentation for igt@drv@b");
    }

    #[test]
    fn not_compiled_binary_is_tolerated() {
        let errors = check_coverage(
            &set(&["igt@drv@a", "igt@other@b"]),
            &set(&["igt@drv@a"]),
            &set(&["other"]),
            "@",
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn missing_documentation() {
        let errors = check_coverage(
            &set(&["igt@drv@a"]),
            &set(&["igt@drv@a", "igt@drv@c"]),
            &set(&[]),
            "@",
        );
        assert_eq!(errors, [CoverageError::Missing("igt@drv@c".into())]);
        assert_eq!(errors[0].to_string(), "Missing documentation for igt@drv@c");
    }

    fn plan_in(dir: &TempDir, source: &str) -> TestPlan {
        let src = dir.path().join("drv.c");
        fs::write(&src, source).unwrap();
        let config: Config = serde_json::from_str(
            r#"{ "fields": {
                "Category": {},
                "Description": { "_properties_": { "mandatory": true } }
            } }"#,
        )
        .unwrap();
        let options = TestPlanOptions {
            files: vec![src],
            build_path: Some(dir.path().join("build")),
            ..Default::default()
        };
        TestPlan::from_config(config, "config", dir.path(), "Drv", options).unwrap()
    }

    #[test]
    fn warns_on_missing_mandatory_field() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(
            &dir,
            "/**\n * TEST: drv\n * Category: x\n * SUBTEST: foo\n */\n",
        );
        fs::create_dir_all(dir.path().join("build/tests")).unwrap();
        fs::write(dir.path().join("build/tests/drv"), "").unwrap();
        fs::write(dir.path().join("build/tests/drv.testlist"), "igt@drv@foo\n").unwrap();

        let report = plan.check_tests().unwrap();
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(
            report.warnings,
            [Warning::MissingMandatoryField {
                subtest: "igt@drv@foo".into(),
                field: "Description".into(),
            }]
        );
        assert_eq!(
            report.warnings[0].to_string(),
            "igt@drv@foo Description documentation is missing"
        );
    }

    #[test]
    fn check_against_build_tree() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(
            &dir,
            "/**\n * TEST: drv\n * Description: d\n * SUBTEST: a\n * SUBTEST: b\n */\n",
        );
        let tests = dir.path().join("build/tests");
        fs::create_dir_all(&tests).unwrap();
        fs::write(tests.join("drv.testlist"), "igt@drv@a\n").unwrap();

        // binary absent: nothing is unneeded
        let report = plan.check_tests().unwrap();
        assert!(report.is_ok());

        fs::write(tests.join("drv"), "").unwrap();
        let report = plan.check_tests().unwrap();
        assert_eq!(report.errors, [CoverageError::Unneeded("igt@drv@b".into())]);
    }

    #[test]
    fn missing_testlist_warns() {
        let dir = TempDir::new().unwrap();
        let plan = plan_in(&dir, "/**\n * TEST: drv\n * SUBTEST: a\n * Description: d\n */\n");
        fs::create_dir_all(dir.path().join("build/tests")).unwrap();
        fs::write(dir.path().join("build/tests/drv"), "").unwrap();
        let report = plan.check_tests().unwrap();
        assert!(matches!(report.warnings[..], [Warning::TestlistNotFound { .. }]));
        assert_eq!(report.errors, [CoverageError::Unneeded("igt@drv@a".into())]);
    }

    #[test]
    fn build_path_is_required() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("drv.c");
        fs::write(&src, "/**\n * TEST: drv\n */\n").unwrap();
        let config: Config =
            serde_json::from_str(r#"{ "fields": { "Description": {} } }"#).unwrap();
        let options = TestPlanOptions {
            files: vec![src],
            ..Default::default()
        };
        let plan = TestPlan::from_config(config, "config", dir.path(), "Drv", options).unwrap();
        assert!(matches!(plan.check_tests(), Err(Error::MissingBuildPath)));
    }
}

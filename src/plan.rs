//! Test plan: configuration, schema and parsed documentation in one place.
//!
//! Loading runs the whole front half of the pipeline: read the JSON config,
//! flatten the field schema, compile the list files of `update-from-file`
//! rules, resolve the source globs and parse every file. The result is
//! read-only; renderers, the listing and the validator only query it.

use crate::config::Config;
use crate::error::{Error, Result, Warning};
use crate::expand::{self, ExpandedSubtest};
use crate::filter::Filters;
use crate::model::{DocumentModel, Fields, Test};
use crate::parser::{self, ParseContext};
use crate::schema::testlist::ListReader;
use crate::schema::FieldTable;
use crate::update;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Knobs that do not come from the config file.
#[derive(Debug, Clone)]
pub struct TestPlanOptions {
    /// Also parse `planning_files` and add the `Class` field.
    pub include_plan: bool,
    /// Explicit source files, overriding the config's `files` globs.
    pub files: Vec<PathBuf>,
    /// Build directory holding `tests/<binary>` and `tests/<binary>.testlist`.
    pub build_path: Option<PathBuf>,
    /// Base for config-relative paths, defaults to the config's directory.
    pub sources_path: Option<PathBuf>,
    pub main_name: String,
    pub planned_name: String,
    pub separator: String,
}

impl Default for TestPlanOptions {
    fn default() -> Self {
        TestPlanOptions {
            include_plan: false,
            files: Vec::new(),
            build_path: None,
            sources_path: None,
            main_name: "igt".to_string(),
            planned_name: "planned".to_string(),
            separator: "@".to_string(),
        }
    }
}

/// Parsed documentation plus everything needed to query it.
#[derive(Debug)]
pub struct TestPlan {
    schema: FieldTable,
    model: DocumentModel,
    title: String,
    drivers: Vec<String>,
    files: Vec<PathBuf>,
    filters: Filters,
    warnings: Vec<Warning>,
    options: TestPlanOptions,
}

impl TestPlan {
    /// Load the config at `path` and parse the files it names.
    pub fn load(path: &Path, options: TestPlanOptions) -> Result<Self> {
        let config = Config::load(path)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let driver = driver_name(path);
        tracing::info!("{}: driver {}", path.display(), driver);
        Self::from_config(config, &path.display().to_string(), &dir, &driver, options)
    }

    /// Build a plan from an already-loaded config. `origin` names the config
    /// in warnings; relative paths resolve against `dir`.
    pub fn from_config(
        config: Config,
        origin: &str,
        dir: &Path,
        default_driver: &str,
        options: TestPlanOptions,
    ) -> Result<Self> {
        let main_base = format!("{}{}", options.main_name, options.separator);
        let planned_base = format!("{}{}", options.planned_name, options.separator);
        let sources = options.sources_path.clone().unwrap_or_else(|| dir.to_path_buf());

        let mut schema = FieldTable::build(&config.fields, options.include_plan)?;
        let reader = ListReader::new(&main_base, &options.separator)?;
        schema.load_update_rules(&sources, &reader)?;

        let files = if options.files.is_empty() {
            let excluded = resolve_globs(&sources, &config.exclude_files)?;
            let mut files = resolve_globs(&sources, &config.files)?;
            files.retain(|f| !excluded.contains(f));
            files
        } else {
            options.files.clone()
        };
        let planned = if options.include_plan {
            resolve_globs(&sources, &config.planning_files)?
        } else {
            Vec::new()
        };

        let has_implemented = !files.is_empty();
        let has_planned = !planned.is_empty();
        let prefix = match (has_implemented, has_planned) {
            (true, true) => "Planned and implemented ",
            (true, false) => "Implemented ",
            (false, true) => "Planned ",
            (false, false) => return Err(Error::NoFiles),
        };
        let title = format!(
            "{prefix}{}",
            config
                .name
                .clone()
                .unwrap_or_else(|| format!("tests for {default_driver} driver"))
        );
        let drivers = config
            .drivers
            .clone()
            .unwrap_or_else(|| vec![default_driver.to_string()]);

        let implemented_class =
            (options.include_plan && !config.planning_files.is_empty()).then_some("Implemented");
        let planned_class = (has_implemented && has_planned).then_some("Planned");

        let mut model = DocumentModel::default();
        let mut warnings = Vec::new();
        let batches = [
            (&files, main_base.as_str(), implemented_class),
            (&planned, planned_base.as_str(), planned_class),
        ];
        for (paths, base_name, class) in batches {
            let ctx = ParseContext {
                schema: &schema,
                base_name,
                class,
                origin,
            };
            for path in paths {
                warnings.extend(parser::parse_file(&ctx, path, &mut model)?);
            }
        }
        tracing::info!("{}: {} tests documented", title, model.len());

        Ok(TestPlan {
            schema,
            model,
            title,
            drivers,
            files,
            filters: Filters::default(),
            warnings,
            options,
        })
    }

    pub fn schema(&self) -> &FieldTable {
        &self.schema
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn drivers(&self) -> &[String] {
        &self.drivers
    }

    /// Implemented source files, in processing order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Warnings collected while parsing.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn separator(&self) -> &str {
        &self.options.separator
    }

    pub fn build_path(&self) -> Option<&Path> {
        self.options.build_path.as_deref()
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Replace the output filters with `<field> =~ <regex>` expressions.
    pub fn set_filters<S: AsRef<str>>(&mut self, exprs: &[S]) -> Result<()> {
        self.filters = Filters::parse(exprs, &self.schema)?;
        Ok(())
    }

    /// Expand `test` and reconcile list-derived fields of every record.
    pub fn expand_test(&self, test: &Test, allow_inherit: bool) -> Result<Vec<ExpandedSubtest>> {
        let mut records = expand::expand(test, allow_inherit, &self.options.separator)?;
        for record in &mut records {
            update::reconcile(&self.schema, record);
        }
        Ok(records)
    }

    /// Like [`expand_test`](Self::expand_test), dropping filtered records.
    pub fn filtered_subtests(
        &self,
        test: &Test,
        allow_inherit: bool,
    ) -> Result<Vec<ExpandedSubtest>> {
        let mut records = self.expand_test(test, allow_inherit)?;
        records.retain(|r| self.filters.accepts(&r.fields, &test.fields));
        Ok(records)
    }

    /// Every surviving subtest of every test, name → fields, with
    /// test-level values inherited.
    pub fn subtest_dictionary(&self) -> Result<BTreeMap<String, Fields>> {
        let mut dict = BTreeMap::new();
        for test in self.model.tests() {
            for record in self.filtered_subtests(test, true)? {
                dict.insert(record.name, record.fields);
            }
        }
        Ok(dict)
    }
}

/// Capitalized name of the directory holding the config file.
fn driver_name(config: &Path) -> String {
    let name = config
        .parent()
        .and_then(Path::file_name)
        .or_else(|| config.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => name,
    }
}

/// Expand config globs relative to `base`, sorted and deduplicated.
fn resolve_globs(base: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let full = base.join(pattern).to_string_lossy().into_owned();
        let matches: Vec<PathBuf> = glob::glob(&full)
            .map_err(|source| Error::Glob {
                pattern: full.clone(),
                source,
            })?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::debug!("no files matched: {}", full);
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"{
        "files": [ "tests/*.c" ],
        "exclude_files": [ "tests/*_helper.c" ],
        "planning_files": [ "plans/*.c" ],
        "fields": {
            "Category": {
                "_properties_": { "mandatory": true },
                "Sub-category": { "_properties_": {} }
            },
            "Description": { "_properties_": { "mandatory": true } },
            "Run type": {
                "_properties_": {
                    "update-from-file": {
                        "default-if-not-excluded": "FULL",
                        "include": [ { "BAT": "lists/bat.testlist" } ]
                    }
                }
            }
        }
    }"#;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("xe");
        for sub in ["tests", "plans", "lists"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("config.json"), CONFIG).unwrap();
        fs::write(root.join("lists/bat.testlist"), "igt@foo@basic\n").unwrap();
        fs::write(
            root.join("tests/foo.c"),
            "/**\n * TEST: foo\n * Category: Software\n *\n * SUBTEST: basic\n * Description: basic check\n *\n * SUBTEST: full\n * Description: full check\n */\n",
        )
        .unwrap();
        fs::write(
            root.join("tests/foo_helper.c"),
            "/**\n * TEST: helper\n */\n",
        )
        .unwrap();
        fs::write(
            root.join("plans/bar.c"),
            "/**\n * TEST: bar\n * Category: Hardware\n * SUBTEST: later\n */\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn loads_config_and_sources() {
        let dir = tree();
        let plan =
            TestPlan::load(&dir.path().join("xe/config.json"), TestPlanOptions::default()).unwrap();
        assert_eq!(plan.title(), "Implemented tests for Xe driver");
        assert_eq!(plan.drivers(), ["Xe"]);
        assert_eq!(plan.model().len(), 1);
        assert_eq!(plan.files().len(), 1);
        assert!(plan.warnings().is_empty());
    }

    #[test]
    fn reconciles_list_fields() {
        let dir = tree();
        let plan =
            TestPlan::load(&dir.path().join("xe/config.json"), TestPlanOptions::default()).unwrap();
        let dict = plan.subtest_dictionary().unwrap();
        assert_eq!(dict["igt@foo@basic"]["Run type"], "BAT");
        assert_eq!(dict["igt@foo@full"]["Run type"], "FULL");
        assert_eq!(dict["igt@foo@full"]["Category"], "Software");
    }

    #[test]
    fn planned_tests_get_a_class() {
        let dir = tree();
        let options = TestPlanOptions {
            include_plan: true,
            ..Default::default()
        };
        let plan = TestPlan::load(&dir.path().join("xe/config.json"), options).unwrap();
        assert_eq!(plan.title(), "Planned and implemented tests for Xe driver");
        let tests = plan.model().tests();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].fields["Class"], "Implemented");
        assert_eq!(tests[1].fields["Class"], "Planned");
        assert_eq!(tests[1].name(), "planned@bar");
    }

    #[test]
    fn filters_limit_the_dictionary() {
        let dir = tree();
        let mut plan =
            TestPlan::load(&dir.path().join("xe/config.json"), TestPlanOptions::default()).unwrap();
        plan.set_filters(&["Run type =~ bat"]).unwrap();
        let dict = plan.subtest_dictionary().unwrap();
        assert_eq!(dict.keys().collect::<Vec<_>>(), ["igt@foo@basic"]);
    }

    #[test]
    fn no_files_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "files": [ "*.c" ], "fields": { "Description": {} } }"#).unwrap();
        let err = TestPlan::load(&path, TestPlanOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NoFiles));
    }

    #[test]
    fn driver_name_from_config_dir() {
        assert_eq!(driver_name(Path::new("tests/intel/xe_config.json")), "Intel");
        assert_eq!(driver_name(Path::new("config.json")), "Config.json");
    }
}

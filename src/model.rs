//! Document model: tests, subtests and argument templates.
//!
//! Tests live in an arena indexed by their sequence id. Each test owns its
//! subtests (in file order) and the argument templates declared in its
//! comment blocks. The parser is the only writer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Field name holding the source file of a test.
pub const FILE_FIELD: &str = "File";
/// Field that subtests never inherit from their test.
pub const DESCRIPTION_FIELD: &str = "Description";

/// Field name → value. Values are single strings; multi-line source values
/// are joined with spaces.
pub type Fields = BTreeMap<String, String>;

/// Every parsed test, in parse order.
#[derive(Debug, Default)]
pub struct DocumentModel {
    tests: Vec<Test>,
}

impl DocumentModel {
    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn test(&self, id: usize) -> Option<&Test> {
        self.tests.get(id)
    }

    pub fn test_mut(&mut self, id: usize) -> Option<&mut Test> {
        self.tests.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Allocate the next test. `base_name` already ends with the separator.
    pub fn add_test(&mut self, file: &Path, base_name: &str, summary: &str) -> usize {
        let id = self.tests.len();
        let mut fields = Fields::new();
        fields.insert(FILE_FIELD.to_string(), file.display().to_string());
        self.tests.push(Test {
            id,
            file: file.to_path_buf(),
            base_name: base_name.to_string(),
            summary: summary.to_string(),
            fields,
            subtests: Vec::new(),
            templates: BTreeMap::new(),
        });
        id
    }
}

/// A `TEST:` block.
#[derive(Debug, Clone)]
pub struct Test {
    pub id: usize,
    pub file: PathBuf,
    /// `igt@` for implemented tests, `planned@` for planned ones.
    pub base_name: String,
    pub summary: String,
    pub fields: Fields,
    pub subtests: Vec<Subtest>,
    pub templates: BTreeMap<usize, ArgTemplate>,
}

impl Test {
    /// `igt@<file stem>`.
    pub fn name(&self) -> String {
        let stem = self
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}{}", self.base_name, stem)
    }

    /// Binary name, the file stem.
    pub fn binary(&self) -> String {
        self.file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn subtest(&self, id: usize) -> Option<&Subtest> {
        self.subtests.get(id)
    }

    /// Create a subtest seeded with the test's inheritable fields.
    pub fn add_subtest(&mut self, summary: &str, template: usize, line: usize) -> usize {
        let id = self.subtests.len();
        let fields = self
            .fields
            .iter()
            .filter(|(k, _)| k.as_str() != FILE_FIELD && k.as_str() != DESCRIPTION_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.subtests.push(Subtest {
            id,
            summary: summary.to_string(),
            fields,
            template,
            line,
        });
        self.templates.entry(template).or_default();
        id
    }
}

/// A `SUBTEST:` declaration.
#[derive(Debug, Clone)]
pub struct Subtest {
    /// Ordinal within the test.
    pub id: usize,
    /// May contain `%s`/`%d`-style placeholders.
    pub summary: String,
    pub fields: Fields,
    /// Key into [`Test::templates`].
    pub template: usize,
    /// 1-based line of the `SUBTEST:` tag.
    pub line: usize,
}

/// Argument slots shared by the subtests of one comment block.
///
/// Slot index is 0-based (`arg[1]` is slot 0). Each slot maps a token to its
/// substitution: the token itself for enumerated values, or an
/// angle-bracketed description for free-form ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgTemplate {
    pub slots: BTreeMap<usize, BTreeMap<String, String>>,
}

impl ArgTemplate {
    pub fn slot_mut(&mut self, index: usize) -> &mut BTreeMap<String, String> {
        self.slots.entry(index).or_default()
    }

    /// Sorted tokens of a slot, `None` when it was never declared.
    pub fn tokens(&self, index: usize) -> Option<Vec<&str>> {
        self.slots
            .get(&index)
            .map(|slot| slot.keys().map(String::as_str).collect())
    }
}

/// True for angle-bracketed placeholder descriptions.
pub fn is_placeholder(value: &str) -> bool {
    value.starts_with('<') && value.ends_with('>') && value.len() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtests_inherit_test_fields() {
        let mut model = DocumentModel::default();
        let id = model.add_test(Path::new("tests/foo.c"), "igt@", "Foo");
        let test = model.test_mut(id).unwrap();
        test.fields.insert("Category".into(), "Software".into());
        test.fields.insert(DESCRIPTION_FIELD.into(), "test level".into());
        let sub = test.add_subtest("bar", 0, 12);

        let sub = test.subtest(sub).unwrap();
        assert_eq!(sub.fields.get("Category").map(String::as_str), Some("Software"));
        assert!(!sub.fields.contains_key(DESCRIPTION_FIELD));
        assert!(!sub.fields.contains_key(FILE_FIELD));
        assert_eq!(test.name(), "igt@foo");
        assert_eq!(test.binary(), "foo");
        assert!(test.templates.contains_key(&0));
    }

    #[test]
    fn ids_are_sequential() {
        let mut model = DocumentModel::default();
        assert_eq!(model.add_test(Path::new("a.c"), "igt@", ""), 0);
        assert_eq!(model.add_test(Path::new("b.c"), "igt@", ""), 1);
        let test = model.test_mut(1).unwrap();
        assert_eq!(test.add_subtest("x", 0, 1), 0);
        assert_eq!(test.add_subtest("y", 0, 2), 1);
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder("<buffer size>"));
        assert!(!is_placeholder("large"));
        assert!(!is_placeholder("<"));
    }
}

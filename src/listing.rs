//! Subtest listings and generated testlist files.

use crate::error::{Error, Result};
use crate::plan::TestPlan;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RE_MULTI_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").unwrap());

static RE_NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\d]+").unwrap());

/// Marker inside an `order` list separating prefix groups from suffix ones.
pub const ORDER_ALL: &str = "__all__";

/// Subtest names grouped by a field value. Records without the field land
/// in the `""` group, which always exists.
pub type SubtestGroups = BTreeMap<String, Vec<String>>;

struct Entry {
    name: String,
    values: Vec<String>,
}

impl TestPlan {
    /// List every surviving subtest, sorted by name.
    ///
    /// With `sort_field`, names are grouped by that field's value; `split`
    /// spreads a comma-separated value over several groups. With
    /// `with_order` and an `order` list configured for the field, each
    /// group is rearranged as prefix, middle and suffix.
    pub fn get_subtests(
        &self,
        sort_field: Option<&str>,
        split: bool,
        with_order: bool,
    ) -> Result<SubtestGroups> {
        let field = sort_field
            .map(|f| self.schema().require(f).map(str::to_string))
            .transpose()?;
        let order = match (&field, with_order) {
            (Some(f), true) => self
                .schema()
                .get(f)
                .and_then(|def| def.properties.order.clone()),
            _ => None,
        };

        let mut records = Vec::new();
        for test in self.model().tests() {
            records.extend(self.filtered_subtests(test, true)?);
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));

        let mut groups: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        groups.insert(String::new(), Vec::new());
        for record in records {
            let value = field.as_ref().and_then(|f| record.fields.get(f));
            let values: Vec<String> = match value {
                Some(v) if split => RE_MULTI_VALUE.split(v).map(str::to_string).collect(),
                Some(v) => vec![v.clone()],
                None => vec![String::new()],
            };
            for group in &values {
                groups.entry(group.clone()).or_default().push(Entry {
                    name: record.name.clone(),
                    values: values.clone(),
                });
            }
        }

        Ok(groups
            .into_iter()
            .map(|(group, entries)| {
                let names = match &order {
                    Some(order) => apply_order(entries, order),
                    None => entries.into_iter().map(|e| e.name).collect(),
                };
                (group, names)
            })
            .collect())
    }

    /// Write one `<group>.testlist` per non-empty group into `dir`.
    /// Returns the files written.
    pub fn gen_testlist(&self, dir: &Path, sort_field: Option<&str>) -> Result<Vec<PathBuf>> {
        let groups = self.get_subtests(sort_field, true, true)?;
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut written = Vec::new();
        for (group, names) in &groups {
            if names.is_empty() {
                continue;
            }
            let path = dir.join(format!("{}.testlist", testlist_name(group)));
            let mut content = String::new();
            for name in names {
                content.push_str(&format!("{name}\n"));
            }
            fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
            tracing::info!("{} created", path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Prefix (values named before `__all__`, in `order` order), then
/// everything else in its incoming order, then the suffix.
fn apply_order(entries: Vec<Entry>, order: &[String]) -> Vec<String> {
    let mut prefix = Vec::new();
    let mut suffix = Vec::new();
    let mut placed = vec![false; entries.len()];
    let mut is_prefix = true;

    for key in order {
        if key == ORDER_ALL {
            is_prefix = false;
            continue;
        }
        for (i, entry) in entries.iter().enumerate() {
            if placed[i] || !entry.values.iter().any(|v| v == key) {
                continue;
            }
            placed[i] = true;
            if is_prefix {
                prefix.push(i);
            } else {
                suffix.push(i);
            }
        }
    }

    let middle = (0..entries.len()).filter(|&i| !placed[i]);
    let ordered: Vec<usize> = prefix.into_iter().chain(middle).chain(suffix).collect();
    let mut names: Vec<Option<String>> = entries.into_iter().map(|e| Some(e.name)).collect();
    ordered
        .into_iter()
        .filter_map(|i| names[i].take())
        .collect()
}

/// File stem for a group: `""` → `other`, `bat` → `fast-feedback`.
pub fn testlist_name(group: &str) -> String {
    let lower = group.to_lowercase();
    let name = match lower.as_str() {
        "" => "other",
        "bat" => "fast-feedback",
        other => other,
    };
    RE_NON_WORD.replace_all(name, "-").into_owned()
}

/// Text listing: a plain name list, or `group:` headers with indented names.
pub fn format_groups(groups: &SubtestGroups, grouped: bool) -> String {
    let mut out = String::new();
    if !grouped {
        for name in groups.get("").into_iter().flatten() {
            out.push_str(&format!("{name}\n"));
        }
        return out;
    }
    for (group, names) in groups {
        if names.is_empty() {
            continue;
        }
        if group.is_empty() {
            out.push_str("not defined:\n");
        } else {
            out.push_str(&format!("{group}:\n"));
        }
        for name in names {
            out.push_str(&format!("  {name}\n"));
        }
    }
    out
}

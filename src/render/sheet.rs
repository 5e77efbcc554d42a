//! Tabular sheet renderer.
//!
//! One row per expanded subtest, one column per schema field. Multi-valued
//! fields can be exploded into one `Yes` column per distinct value.

use super::{field_order, grouped_subtests};
use crate::error::{Error, Result};
use crate::plan::TestPlan;
use crate::render::Renderer;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static RE_MULTI_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").unwrap());

/// Column holding the full subtest name.
pub const NAME_COLUMN: &str = "Test name";

/// A header row plus data rows, as exchanged with spreadsheet tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(rename = "header row")]
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_str(&content).map_err(|source| Error::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Default)]
pub struct SheetRenderer {
    /// Field name and column prefix of each exploded field.
    pub expand_fields: Vec<(String, String)>,
}

impl SheetRenderer {
    pub fn build(&self, plan: &TestPlan) -> Result<Sheet> {
        let order: Vec<&str> = field_order(plan.schema());
        let columns: Vec<&str> = order
            .iter()
            .copied()
            .filter(|f| !self.expand_fields.iter().any(|(e, _)| e == f))
            .collect();

        let subtests = grouped_subtests(plan, &order)?;
        let mut sheet = Sheet {
            header: std::iter::once(NAME_COLUMN)
                .chain(columns.iter().copied())
                .map(str::to_string)
                .collect(),
            rows: Vec::with_capacity(subtests.len()),
        };
        for (name, fields) in &subtests {
            let mut row = vec![name.clone()];
            row.extend(columns.iter().map(|f| fields.get(*f).cloned().unwrap_or_default()));
            sheet.rows.push(row);
        }

        let mut exploded: Vec<&(String, String)> = self
            .expand_fields
            .iter()
            .filter(|(field, _)| plan.schema().get(field).is_some())
            .collect();
        exploded.sort_by_key(|(field, _)| field.to_lowercase());

        for (field, prefix) in exploded {
            let mut values: Vec<&str> = subtests
                .iter()
                .filter_map(|(_, fields)| fields.get(field))
                .flat_map(|v| RE_MULTI_VALUE.split(v))
                .filter(|v| !v.is_empty())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            values.sort_by_key(|v| v.to_lowercase());

            for value in values {
                sheet.header.push(format!("{prefix}{value}"));
                for (row, (_, fields)) in sheet.rows.iter_mut().zip(&subtests) {
                    let present = fields
                        .get(field)
                        .is_some_and(|v| RE_MULTI_VALUE.split(v).any(|x| x == value));
                    row.push(if present { "Yes" } else { "" }.to_string());
                }
            }
        }
        Ok(sheet)
    }
}

impl Renderer for SheetRenderer {
    fn render(&self, plan: &TestPlan) -> Result<String> {
        let sheet = self.build(plan)?;
        Ok(serde_json::to_string_pretty(&sheet)? + "\n")
    }
}

//! Renderer module: trait-based format dispatch.

pub mod json;
pub mod rest;
pub mod sheet;

use crate::error::{Error, Result};
use crate::model::Fields;
use crate::plan::TestPlan;
use crate::schema::FieldTable;

/// Trait for rendering a test plan into a specific output format.
pub trait Renderer {
    fn render(&self, plan: &TestPlan) -> Result<String>;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "rest" | "rst" => Ok(Box::new(rest::RestRenderer { nested: false })),
        "nested" => Ok(Box::new(rest::RestRenderer { nested: true })),
        "sheet" => Ok(Box::new(sheet::SheetRenderer::default())),
        "json" => Ok(Box::new(json::JsonRenderer)),
        _ => Err(Error::UnknownFormat(format.to_string())),
    }
}

/// Field names in output order, see [`FieldTable::sorted_by_level`].
fn field_order(schema: &FieldTable) -> Vec<&str> {
    schema
        .sorted_by_level()
        .into_iter()
        .map(|def| def.name.as_str())
        .collect()
}

/// Sort key grouping records by their values in `order`.
fn grouping_key(fields: &Fields, order: &[&str]) -> String {
    let mut key = String::new();
    for field in order {
        if let Some(value) = fields.get(*field) {
            key.push('_');
            key.push_str(field);
            key.push('_');
            key.push_str(value);
        }
    }
    if key.is_empty() {
        key.push_str("________");
    }
    key
}

/// Subtests of `plan`, ordered by [`grouping_key`].
fn grouped_subtests(plan: &TestPlan, order: &[&str]) -> Result<Vec<(String, Fields)>> {
    let mut subtests: Vec<(String, Fields)> = plan.subtest_dictionary()?.into_iter().collect();
    subtests.sort_by_cached_key(|(_, fields)| grouping_key(fields, order));
    Ok(subtests)
}

/// A reST title with `marker` underline (and overline when `over`).
fn heading(out: &mut String, title: &str, marker: char, over: bool) {
    let line: String = std::iter::repeat(marker).take(title.chars().count()).collect();
    if over {
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(title);
    out.push('\n');
    out.push_str(&line);
    out.push('\n');
}

//! JSON renderer: the test/subtest hierarchy with wildcards expanded.
//!
//! Each test maps to an object holding its own fields plus one nested object
//! per surviving subtest. Subtests only carry the values that differ from
//! their test.

use crate::error::{Error, Result};
use crate::model::Fields;
use crate::plan::TestPlan;
use crate::render::Renderer;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, plan: &TestPlan) -> Result<String> {
        let doc = test_dictionary(plan)?;
        Ok(serde_json::to_string_pretty(&doc)? + "\n")
    }
}

/// Build the exported document.
pub fn test_dictionary(plan: &TestPlan) -> Result<Map<String, Value>> {
    let mut doc = Map::new();
    for test in plan.model().tests() {
        let entry = doc
            .entry(test.name())
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(entry) = entry else {
            continue;
        };
        for (field, value) in &test.fields {
            entry.insert(field.clone(), Value::String(value.clone()));
        }
        for subtest in plan.filtered_subtests(test, false)? {
            entry.insert(subtest.name, fields_to_value(subtest.fields));
        }
    }
    Ok(doc)
}

fn fields_to_value(fields: Fields) -> Value {
    Value::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

/// Read an exported document back as subtest name → fields.
pub fn read(path: &Path) -> Result<BTreeMap<String, Fields>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let doc: Map<String, Value> = serde_json::from_str(&content).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let mut subtests = BTreeMap::new();
    for test in doc.values() {
        let Value::Object(test) = test else { continue };
        for (name, value) in test {
            let Value::Object(fields) = value else {
                continue;
            };
            let fields: Fields = fields
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect();
            subtests.insert(name.clone(), fields);
        }
    }
    Ok(subtests)
}

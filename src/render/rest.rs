//! reStructuredText renderer.
//!
//! The flat layout lists each test with its fields, followed by its
//! subtests. The nested layout groups subtests under headings built from
//! the leveled fields, one heading marker per depth.

use super::{field_order, grouped_subtests, heading};
use crate::error::{Error, Result};
use crate::plan::TestPlan;
use crate::render::Renderer;

/// Heading markers, outermost first.
const LEVEL_MARKERS: &[char] = &['=', '-', '^', '_', '~', ':', '.', '`', '"', '*', '+', '#'];

pub struct RestRenderer {
    pub nested: bool,
}

impl Renderer for RestRenderer {
    fn render(&self, plan: &TestPlan) -> Result<String> {
        let mut out = String::new();
        heading(&mut out, plan.title(), '=', true);
        out.push('\n');
        if self.nested {
            render_nested(plan, &mut out)?;
        } else {
            render_flat(plan, &mut out)?;
        }
        Ok(out)
    }
}

fn render_flat(plan: &TestPlan, out: &mut String) -> Result<()> {
    for test in plan.model().tests() {
        // skip tests whose subtests were all filtered out
        let subtests = plan.filtered_subtests(test, false)?;
        if subtests.is_empty() {
            continue;
        }

        heading(out, &test.name(), '=', true);
        out.push('\n');
        for (field, value) in &test.fields {
            out.push_str(&format!(":{field}: {value}\n"));
        }

        for subtest in &subtests {
            out.push('\n');
            heading(out, &subtest.name, '=', false);
            out.push('\n');
            for (field, value) in &subtest.fields {
                out.push_str(&format!(":{field}: {value}\n"));
            }
            out.push('\n');
        }
        out.push_str("\n\n");
    }
    Ok(())
}

fn render_nested(plan: &TestPlan, out: &mut String) -> Result<()> {
    let schema = plan.schema();
    let order = field_order(schema);
    let leveled: Vec<bool> = order
        .iter()
        .map(|f| schema.get(f).is_some_and(|def| def.level.is_some()))
        .collect();
    let mut previous = vec![String::new(); order.len()];

    for (name, fields) in grouped_subtests(plan, &order)? {
        // first leveled field whose value changed since the last subtest
        let mut marker = 0;
        let mut start = order.len();
        for (i, field) in order.iter().enumerate() {
            if !leveled[i] {
                continue;
            }
            if let Some(value) = fields.get(*field) {
                if previous[i] != *value {
                    start = i;
                    break;
                }
                marker += 1;
            }
        }

        for i in start..order.len() {
            let Some(value) = fields.get(order[i]).filter(|_| leveled[i]) else {
                continue;
            };
            let Some(&ch) = LEVEL_MARKERS.get(marker) else {
                return Err(Error::TooManyLevels {
                    levels: marker,
                    limit: LEVEL_MARKERS.len(),
                });
            };
            heading(out, &format!("{}: {}", order[i], value), ch, false);
            out.push('\n');
            marker += 1;
        }

        out.push_str(&format!("\n``{name}``\n\n"));
        for (i, field) in order.iter().enumerate() {
            if leveled[i] {
                continue;
            }
            if let Some(value) = fields.get(*field) {
                out.push_str(&format!(":{field}: {value}\n"));
            }
        }

        for i in start..order.len() {
            if leveled[i] {
                previous[i] = fields.get(order[i]).cloned().unwrap_or_default();
            }
        }
        out.push('\n');
    }
    Ok(())
}

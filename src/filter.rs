//! Output filters, written as `<field> =~ <regex>`.
//!
//! A record passes when every filter's regex is found (case-insensitively)
//! in the field value, looked up on the record first and on its test next.
//! A filter whose field is set on neither does not exclude the record.

use crate::error::{Error, Result};
use crate::model::Fields;
use crate::schema::FieldTable;
use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

static RE_FILTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*)=~\s*(.*)$").unwrap());

/// One parsed filter.
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    regex: Regex,
}

impl Filter {
    pub fn parse(expr: &str, schema: &FieldTable) -> Result<Self> {
        let caps = RE_FILTER
            .captures(expr)
            .ok_or_else(|| Error::InvalidFilter(expr.to_string()))?;
        let field = schema.require(caps[1].trim())?.to_string();
        let pattern = caps[2].trim();
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::regex(pattern, e))?;
        Ok(Filter { field, regex })
    }

    /// `None` when the field is set on neither the record nor its test.
    fn check(&self, record: &Fields, test: &Fields) -> Option<bool> {
        record
            .get(&self.field)
            .or_else(|| test.get(&self.field))
            .map(|value| self.regex.is_match(value))
    }
}

/// The active filter set. Later filters on the same field replace earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    filters: Vec<Filter>,
}

impl Filters {
    pub fn parse<S: AsRef<str>>(exprs: &[S], schema: &FieldTable) -> Result<Self> {
        let mut filters = Filters::default();
        for expr in exprs {
            filters.add(Filter::parse(expr.as_ref(), schema)?);
        }
        Ok(filters)
    }

    pub fn add(&mut self, filter: Filter) {
        self.filters.retain(|f| f.field != filter.field);
        self.filters.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// True when the record survives every filter.
    pub fn accepts(&self, record: &Fields, test: &Fields) -> bool {
        self.filters
            .iter()
            .all(|f| f.check(record, test).unwrap_or(true))
    }
}

//! testdoc: test documentation kept in source comments.
//!
//! Source files carry `/** ... */` blocks with `TEST:` and `SUBTEST:` tags
//! followed by `Field: value` lines. A JSON config declares the fields and
//! the files to scan. From there the crate can:
//!
//! - expand wildcard subtest names (`size-%s` with `arg[1]` values),
//! - derive fields from include/exclude list files,
//! - render the documentation as reST, a sheet or JSON,
//! - list subtests and generate testlist files,
//! - check the documentation against the testlists of a build,
//! - write values edited in a sheet back to the sources.

pub mod config;
pub mod error;
pub mod expand;
pub mod filter;
pub mod listing;
pub mod model;
pub mod parser;
pub mod plan;
pub mod render;
pub mod rewrite;
pub mod schema;
pub mod update;
pub mod validate;

pub use config::Config;
pub use error::{Error, Result, Warning};
pub use expand::ExpandedSubtest;
pub use plan::{TestPlan, TestPlanOptions};
pub use render::{create_renderer, Renderer};
pub use validate::{CoverageError, CoverageReport};

//! Parser module: reads source files into the document model.

pub mod comment;

pub use comment::ParseContext;

use crate::error::{Error, Result, Warning};
use crate::model::DocumentModel;
use std::fs;
use std::path::Path;

/// Read `path` and parse its comment blocks into `model`.
pub fn parse_file(
    ctx: &ParseContext<'_>,
    path: &Path,
    model: &mut DocumentModel,
) -> Result<Vec<Warning>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let before = model.len();
    let warnings = comment::parse(ctx, path, &content, model)?;
    tracing::debug!(
        "{}: {} tests, {} warnings",
        path.display(),
        model.len() - before,
        warnings.len()
    );
    Ok(warnings)
}

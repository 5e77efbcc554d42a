//! Error and warning types.
//!
//! [`Error`] covers every condition that prevents a meaningful result and
//! aborts the current operation. [`Warning`] covers conditions that are
//! reported to the operator while processing continues; warnings are logged
//! through `tracing` and also accumulated so callers can inspect them.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A required file could not be read or written.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document (config or sheet) could not be parsed.
    #[error("{}: invalid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Rendered output could not be serialized.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Configuration is structurally wrong.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The same field was declared twice at different depths.
    #[error("config defined {field} as sublevel {previous}, but wants to redefine as sublevel {requested}")]
    SublevelConflict {
        field: String,
        previous: usize,
        requested: usize,
    },

    /// A field name that no schema entry resolves to.
    #[error("field '{0}' is not defined")]
    UnknownField(String),

    /// A filter expression not in `<field> =~ <regex>` form.
    #[error("filter field {0} is not at <field> =~ <regex> syntax")]
    InvalidFilter(String),

    /// `arg[N]`, `arg[N].values` or `@token` before any SUBTEST in the block.
    #[error("{}:{line}: arguments should be defined after one or more subtests, at the same comment", file.display())]
    ArgumentBeforeSubtest { file: PathBuf, line: usize },

    /// `SUBTEST:` before any `TEST:` in the file.
    #[error("{}:{line}: subtest declared before any test", file.display())]
    SubtestBeforeTest { file: PathBuf, line: usize },

    /// `arg[0]` or an index that does not fit.
    #[error("{}:{line}: invalid argument index arg[{index}]", file.display())]
    InvalidArgumentIndex {
        file: PathBuf,
        line: usize,
        index: String,
    },

    /// Fewer argument slots declared than placeholders in the summary.
    #[error("{}: subtest {subtest} needs {needed} arguments but only {defined} are defined", file.display())]
    InsufficientArguments {
        file: PathBuf,
        subtest: String,
        needed: usize,
        defined: usize,
    },

    /// A placeholder position has no declared tokens.
    #[error("{}: subtest {subtest} needs arg[{index}], but this is not defined", file.display())]
    MissingArgument {
        file: PathBuf,
        subtest: String,
        index: usize,
    },

    /// A `%` placeholder other than the supported integer/string ones.
    #[error("{}: subtest {subtest} uses an unsupported format specifier", file.display())]
    UnsupportedFormat { file: PathBuf, subtest: String },

    /// A regex from config, a list file, or a filter failed to compile.
    #[error("invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A glob pattern from the configuration is malformed.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// Neither implemented nor planned files were found.
    #[error("need file names to be processed")]
    NoFiles,

    /// Nested output ran out of heading markers.
    #[error("too many levels: {levels}, maximum limit is {limit}")]
    TooManyLevels { levels: usize, limit: usize },

    /// Output format name no renderer handles.
    #[error("unknown format: {0}. Use rest, nested, sheet or json")]
    UnknownFormat(String),

    /// Coverage check requested without a build directory.
    #[error("need the IGT build path")]
    MissingBuildPath,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn regex(pattern: &str, source: regex::Error) -> Self {
        Error::Regex {
            pattern: pattern.to_string(),
            source,
        }
    }
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    /// A line inside a TEST/SUBTEST block matching no known tag.
    #[error("{}:{line}: unrecognized line. Need to add field at {origin}?\n\t==> {text}", file.display())]
    UnrecognizedLine {
        file: PathBuf,
        line: usize,
        origin: String,
        text: String,
    },

    /// `@token: value` with no open `arg[N]` slot.
    #[error("{}:{line}: invalid argument: @{token}: {value}", file.display())]
    ArgumentOutsideSlot {
        file: PathBuf,
        line: usize,
        token: String,
        value: String,
    },

    /// A documented subtest lacks a mandatory field.
    #[error("{subtest} {field} documentation is missing")]
    MissingMandatoryField { subtest: String, field: String },

    /// A compiled binary has no generated list file.
    #[error("{}: testlist file not found", path.display())]
    TestlistNotFound { path: PathBuf },

    /// The rewrite path could not locate the documentation block end.
    #[error("couldn't find doc string for subtest {subtest}, field {field} on line {line}")]
    DocStringNotFound {
        subtest: String,
        field: String,
        line: usize,
    },

    /// A sheet row names a test or subtest that is not documented.
    #[error("test {test}, subtest {subtest} is not documented")]
    UndocumentedSubtest { test: String, subtest: String },

    /// A field whose documented value uses `arg[n]` cannot be rewritten.
    #[error("{subtest} field {field} has wildcards. Skipping it")]
    WildcardField { subtest: String, field: String },
}

impl Warning {
    /// Log the warning and hand it back for accumulation.
    pub(crate) fn emit(self) -> Self {
        tracing::warn!("{}", self);
        self
    }
}

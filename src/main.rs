//! testdoc: extract, render and check test documentation.
//!
//! Reads a JSON config naming the documented fields and source files, then
//! runs the requested actions:
//!
//! - `testdoc --config tests/xe/config.json` prints the flat reST to stdout
//!   (`--format` picks another renderer: rest, nested, json, sheet)
//! - `--rest`, `--to-json`, `--spreadsheet` write rendered documents
//! - `--show-subtests` / `--gen-testlist` list the expanded subtests
//! - `--check-testlist --igt-build-path build` compares against a build
//! - `--import-sheet` writes sheet edits back to the sources

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use testdoc::listing::format_groups;
use testdoc::render::sheet::{Sheet, SheetRenderer};
use testdoc::{create_renderer, Renderer, TestPlan, TestPlanOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "testdoc",
    about = "Extract, expand and validate test documentation kept in source comments"
)]
struct Cli {
    /// JSON file describing the documented fields and source files
    #[arg(long)]
    config: PathBuf,

    /// Source files, overriding the config's "files" globs
    files: Vec<PathBuf>,

    /// Output format printed when no other action is given (rest, nested, json, sheet)
    #[arg(short = 'f', long, default_value = "rest")]
    format: String,

    /// Write reST documentation to this file
    #[arg(long)]
    rest: Option<PathBuf>,

    /// Group the reST output by the leveled fields instead of per test
    #[arg(long)]
    nested: bool,

    /// Write the test/subtest hierarchy as JSON
    #[arg(long)]
    to_json: Option<PathBuf>,

    /// Write a sheet (header row + rows) as JSON
    #[arg(long)]
    spreadsheet: Option<PathBuf>,

    /// Explode a multi-valued field into one column per value in the sheet.
    /// Can be specified multiple times.
    #[arg(long, value_name = "FIELD=PREFIX")]
    expand_field: Vec<String>,

    /// Print the expanded subtest names
    #[arg(long)]
    show_subtests: bool,

    /// Group listed subtests by this field
    #[arg(long)]
    sort_field: Option<String>,

    /// Only keep subtests whose field matches, e.g. 'Run type =~ bat'.
    /// Can be specified multiple times.
    #[arg(long, value_name = "FIELD =~ REGEX")]
    filter_field: Vec<String>,

    /// Compare the documentation with the testlists of a build
    #[arg(long)]
    check_testlist: bool,

    /// Build directory holding tests/<binary> and tests/<binary>.testlist
    #[arg(long)]
    igt_build_path: Option<PathBuf>,

    /// Base directory for the config's globs and list files
    #[arg(long)]
    sources_path: Option<PathBuf>,

    /// Write one <group>.testlist per sort field value into this directory
    #[arg(long)]
    gen_testlist: Option<PathBuf>,

    /// Also document the config's planning files
    #[arg(long)]
    include_plan: bool,

    /// Apply the values of a sheet JSON to the source files
    #[arg(long)]
    import_sheet: Option<PathBuf>,

    /// Raise the log level (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = TestPlanOptions {
        include_plan: cli.include_plan,
        files: cli.files.clone(),
        build_path: cli.igt_build_path.clone(),
        sources_path: cli.sources_path.clone(),
        ..Default::default()
    };
    let mut plan = TestPlan::load(&cli.config, options)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    plan.set_filters(&cli.filter_field)?;

    if let Some(path) = &cli.import_sheet {
        let sheet = Sheet::read(path)?;
        let warnings = plan.import_sheet(&sheet)?;
        tracing::info!("{}: imported with {} warnings", path.display(), warnings.len());
        return Ok(());
    }

    let mut acted = false;

    if cli.show_subtests {
        let groups = plan.get_subtests(cli.sort_field.as_deref(), false, false)?;
        print!("{}", format_groups(&groups, cli.sort_field.is_some()));
        acted = true;
    }

    if let Some(dir) = &cli.gen_testlist {
        plan.gen_testlist(dir, cli.sort_field.as_deref())?;
        acted = true;
    }

    if let Some(path) = &cli.rest {
        let renderer = create_renderer(if cli.nested { "nested" } else { "rest" })?;
        write_output(path, &renderer.render(&plan)?)?;
        acted = true;
    }

    if let Some(path) = &cli.to_json {
        write_output(path, &create_renderer("json")?.render(&plan)?)?;
        acted = true;
    }

    if let Some(path) = &cli.spreadsheet {
        let renderer = SheetRenderer {
            expand_fields: cli
                .expand_field
                .iter()
                .map(|arg| expand_field(&plan, arg))
                .collect::<Result<_>>()?,
        };
        write_output(path, &renderer.render(&plan)?)?;
        acted = true;
    }

    if cli.check_testlist {
        let report = plan.check_tests()?;
        for error in &report.errors {
            eprintln!("{error}");
        }
        if !report.is_ok() {
            std::process::exit(1);
        }
        acted = true;
    }

    if !acted {
        let renderer = create_renderer(&cli.format)?;
        print!("{}", renderer.render(&plan)?);
    }
    Ok(())
}

/// Log to stderr. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}

/// Parse `FIELD=PREFIX`. Without a prefix, columns are named `FIELD: value`.
fn expand_field(plan: &TestPlan, arg: &str) -> Result<(String, String)> {
    let (field, prefix) = match arg.split_once('=') {
        Some((field, prefix)) => (field.trim(), prefix.to_string()),
        None => (arg.trim(), format!("{}: ", arg.trim())),
    };
    let field = plan.schema().require(field)?.to_string();
    Ok((field, prefix))
}

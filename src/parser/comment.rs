//! Comment-block parser: line-by-line state machine.
//!
//! Documentation lives in `/** ... */` blocks. The first tag of a block is
//! either `TEST:` or `SUBTEST:`; the following lines assign fields, declare
//! argument slots (`arg[N]:`, `@token:`, `arg[N].values:`), or continue the
//! field or argument opened just before. Blocks without a tag are ignored.

use crate::error::{Error, Result, Warning};
use crate::model::{is_placeholder, DocumentModel, Fields};
use crate::schema::{FieldTable, CLASS_FIELD};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

// -- Regex patterns -----------------------------------------------------------

static RE_BLANK_STAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\*$").unwrap());

static RE_BLOCK_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\*/$").unwrap());

static RE_BLOCK_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*/\*\*$").unwrap());

static RE_LINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\* ?").unwrap());

static RE_TEST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^TEST:\s*(.*)").unwrap());

static RE_SUBTEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^SUBTESTS?:\s*(.*)").unwrap());

static RE_FIELD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([^:]+):\s*(.*)").unwrap());

static RE_ARG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^arg\[(\d+)\]:\s*(.*)").unwrap());

static RE_ARG_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^@(\S+):\s*(.*)").unwrap());

static RE_ARG_VALUES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^arg\[(\d+)\]\.values:\s*(.*)").unwrap());

static RE_ARG_CONT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s+\*?\s*(.*)").unwrap());

// -- Parser state -------------------------------------------------------------

/// Per-run settings shared by every file.
pub struct ParseContext<'a> {
    pub schema: &'a FieldTable,
    /// `igt@` or `planned@`.
    pub base_name: &'a str,
    /// Value of the `Class` field, when planned tests are mixed in.
    pub class: Option<&'a str>,
    /// Where fields are declared, quoted in warnings.
    pub origin: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    AwaitingTag,
    Test,
    Subtest,
}

struct ParserState<'a, 'm> {
    ctx: &'a ParseContext<'a>,
    file: &'a Path,
    model: &'m mut DocumentModel,

    section: Section,
    current_test: Option<usize>,
    current_subtest: Option<usize>,
    /// Any TEST or SUBTEST seen in the current block.
    tagged: bool,

    // Multi-line continuation
    current_field: Option<String>,
    current_arg: Option<usize>,
    current_token: String,

    // Argument template shared by the subtests of the current block
    template: Option<usize>,
    next_template: usize,

    warnings: Vec<Warning>,
}

// -- Public API ---------------------------------------------------------------

/// Parse one file's comment blocks into `model`, returning the warnings.
pub fn parse(
    ctx: &ParseContext<'_>,
    file: &Path,
    content: &str,
    model: &mut DocumentModel,
) -> Result<Vec<Warning>> {
    let mut state = ParserState {
        ctx,
        file,
        model,
        section: Section::Outside,
        current_test: None,
        current_subtest: None,
        tagged: false,
        current_field: None,
        current_arg: None,
        current_token: String::new(),
        template: None,
        next_template: 1,
        warnings: Vec::new(),
    };

    for (idx, line) in content.lines().enumerate() {
        state.process_line(idx + 1, line.trim_end())?;
    }

    Ok(state.warnings)
}

// -- Line processing ----------------------------------------------------------

impl ParserState<'_, '_> {
    fn process_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        // 1. Separator and block delimiters
        if RE_BLANK_STAR.is_match(line) {
            return Ok(());
        }
        if RE_BLOCK_END.is_match(line) {
            self.section = Section::Outside;
            self.current_subtest = None;
            self.template = None;
            self.current_arg = None;
            self.tagged = false;
            return Ok(());
        }
        if RE_BLOCK_START.is_match(line) {
            self.section = Section::AwaitingTag;
            return Ok(());
        }
        if self.section == Section::Outside {
            return Ok(());
        }

        let text = RE_LINE_PREFIX.replace(line, "");
        let text = text.as_ref();

        // 2. TEST, only as the first tag of a block
        if self.section == Section::AwaitingTag {
            self.current_field = None;
            if let Some(caps) = RE_TEST.captures(text) {
                self.start_test(&caps[1]);
                return Ok(());
            }
        }

        // 3. SUBTEST
        if let Some(caps) = RE_SUBTEST.captures(text) {
            return self.start_subtest(line_no, &caps[1]);
        }

        if !self.tagged {
            return Ok(());
        }

        // 4. Field: value
        if let Some(caps) = RE_FIELD.captures(text) {
            if let Some(field) = self.ctx.schema.resolve(&caps[1]) {
                let field = field.to_string();
                self.set_field(&field, caps[2].to_string());
                self.current_field = Some(field);
                self.current_arg = None;
                return Ok(());
            }
        }

        // 5. arg[N]: [description]
        if let Some(caps) = RE_ARG.captures(text) {
            self.current_field = None;
            let slot = self.open_slot(line_no, &caps[1])?;
            let description = caps[2].to_string();
            if !description.is_empty() {
                let placeholder = format!("<{description}>");
                if let Some(tokens) = self.slot_mut(slot) {
                    tokens.insert(description.clone(), placeholder);
                }
            }
            self.current_token = description;
            return Ok(());
        }

        // 6. @token: value
        if let Some(caps) = RE_ARG_TOKEN.captures(text) {
            match self.current_arg {
                Some(slot) => {
                    self.current_field = None;
                    self.current_token = caps[1].to_string();
                    if let Some(tokens) = self.slot_mut(slot) {
                        tokens.insert(caps[1].to_string(), caps[2].to_string());
                    }
                }
                None => {
                    let warning = Warning::ArgumentOutsideSlot {
                        file: self.file.to_path_buf(),
                        line: line_no,
                        token: caps[1].to_string(),
                        value: caps[2].to_string(),
                    };
                    self.warnings.push(warning.emit());
                }
            }
            return Ok(());
        }

        // 7. arg[N].values: v1, v2, ...
        if let Some(caps) = RE_ARG_VALUES.captures(text) {
            let slot = self.open_slot(line_no, &caps[1])?;
            let values = caps[2].replace(' ', "");
            if let Some(tokens) = self.slot_mut(slot) {
                for value in values.split(',').filter(|v| !v.is_empty()) {
                    tokens.insert(value.to_string(), value.to_string());
                }
            }
            return Ok(());
        }

        // 8. Multi-line field contents
        if let Some(field) = self.current_field.clone() {
            let more = text.trim();
            if !more.is_empty() {
                self.append_field(&field, more);
            }
            return Ok(());
        }

        // 9. Multi-line argument contents
        if let Some(slot) = self.current_arg {
            if let Some(caps) = RE_ARG_CONT.captures(text) {
                let more = caps[1].to_string();
                let token = self.current_token.clone();
                if let Some(value) = self.slot_mut(slot).and_then(|t| t.get_mut(&token)) {
                    append_arg_value(value, &more);
                }
            }
            return Ok(());
        }

        // 10. Anything else
        let warning = Warning::UnrecognizedLine {
            file: self.file.to_path_buf(),
            line: line_no,
            origin: self.ctx.origin.to_string(),
            text: text.to_string(),
        };
        self.warnings.push(warning.emit());
        Ok(())
    }

    fn start_test(&mut self, summary: &str) {
        let id = self
            .model
            .add_test(self.file, self.ctx.base_name, summary);
        if let (Some(class), Some(test)) = (self.ctx.class, self.model.test_mut(id)) {
            test.fields
                .insert(CLASS_FIELD.to_string(), class.to_string());
        }
        self.current_test = Some(id);
        self.current_subtest = None;
        self.section = Section::Test;
        self.tagged = true;
    }

    fn start_subtest(&mut self, line_no: usize, summary: &str) -> Result<()> {
        let test = self
            .current_test
            .and_then(|id| self.model.test_mut(id))
            .ok_or_else(|| Error::SubtestBeforeTest {
                file: self.file.to_path_buf(),
                line: line_no,
            })?;

        let template = match self.template {
            Some(t) => t,
            None => {
                let t = self.next_template;
                self.next_template += 1;
                self.template = Some(t);
                t
            }
        };

        self.current_subtest = Some(test.add_subtest(summary, template, line_no));
        self.current_field = None;
        self.section = Section::Subtest;
        self.tagged = true;
        Ok(())
    }

    /// Open `arg[N]` (1-based in source) and return its 0-based slot.
    fn open_slot(&mut self, line_no: usize, index: &str) -> Result<usize> {
        if self.template.is_none() {
            return Err(Error::ArgumentBeforeSubtest {
                file: self.file.to_path_buf(),
                line: line_no,
            });
        }
        let slot = index
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .ok_or_else(|| Error::InvalidArgumentIndex {
                file: self.file.to_path_buf(),
                line: line_no,
                index: index.to_string(),
            })?;
        self.slot_mut(slot);
        self.current_arg = Some(slot);
        Ok(slot)
    }

    fn slot_mut(&mut self, slot: usize) -> Option<&mut BTreeMap<String, String>> {
        let template = self.template?;
        let test = self.model.test_mut(self.current_test?)?;
        Some(test.templates.entry(template).or_default().slot_mut(slot))
    }

    fn field_map(&mut self) -> Option<&mut Fields> {
        let test = self.model.test_mut(self.current_test?)?;
        match (self.section, self.current_subtest) {
            (Section::Subtest, Some(sub)) => test.subtests.get_mut(sub).map(|s| &mut s.fields),
            _ => Some(&mut test.fields),
        }
    }

    fn set_field(&mut self, field: &str, value: String) {
        if let Some(fields) = self.field_map() {
            fields.insert(field.to_string(), value);
        }
    }

    fn append_field(&mut self, field: &str, more: &str) {
        if let Some(fields) = self.field_map() {
            let value = fields.entry(field.to_string()).or_default();
            if !value.is_empty() {
                value.push(' ');
            }
            value.push_str(more);
        }
    }
}

/// Continue an argument value; placeholders grow inside their brackets.
fn append_arg_value(value: &mut String, more: &str) {
    if is_placeholder(value) {
        value.pop();
        value.push(' ');
        value.push_str(more);
        value.push('>');
    } else {
        if !value.is_empty() {
            value.push(' ');
        }
        value.push_str(more);
    }
}

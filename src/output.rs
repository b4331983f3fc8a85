//! Rendering of command results
//!
//! `--json` prints exactly one envelope on stdout:
//!
//! ```text
//! { "schema_version": "tasktracker.v1", "command": "add", "status": "success",
//!   "data": { ... }, "warnings": [ { "kind": "corrupt_file_recovered", ... } ] }
//! ```
//!
//! Failures use `"status": "error"` with an `error` body instead of `data`.
//! Without `--json` a [`Message`] is printed on stdout and store warnings go
//! to stderr, which `--quiet` never silences.

use serde::Serialize;

use crate::error::{Error, JsonError, Result};
use crate::store::StoreWarning;

pub const SCHEMA_VERSION: &str = "tasktracker.v1";

#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

/// Plain-text form of a command result
#[derive(Debug, Clone, Default)]
pub struct Message {
    headline: String,
    fields: Vec<(&'static str, String)>,
    lines: Vec<String>,
    notes: Vec<String>,
    hint: Option<String>,
}

impl Message {
    pub fn new(headline: impl Into<String>) -> Self {
        Self {
            headline: headline.into(),
            ..Self::default()
        }
    }

    /// Aligned `name value` row under the headline
    pub fn field(&mut self, name: &'static str, value: impl Into<String>) -> &mut Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    /// Something the user should look at, e.g. edges left dangling
    pub fn note(&mut self, note: impl Into<String>) -> &mut Self {
        self.notes.push(note.into());
        self
    }

    /// Suggested follow-up command; the last one set wins
    pub fn hint(&mut self, command: impl Into<String>) -> &mut Self {
        self.hint = Some(command.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = self.headline.clone();
        let width = self.fields.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        for (name, value) in &self.fields {
            out.push_str(&format!("\n  {name:<width$}  {value}"));
        }
        for line in &self.lines {
            out.push_str(&format!("\n  {line}"));
        }
        for note in &self.notes {
            out.push_str(&format!("\nnote: {note}"));
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("\nnext: {hint}"));
        }
        out
    }
}

#[derive(Serialize)]
struct SuccessEnvelope<'a, T: Serialize> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    data: &'a T,
    #[serde(skip_serializing_if = "no_warnings")]
    warnings: &'a [StoreWarning],
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    schema_version: &'static str,
    command: &'a str,
    status: &'static str,
    error: JsonError,
}

/// Print a successful result together with the warnings it produced
pub fn emit_success<T: Serialize>(
    options: OutputOptions,
    command: &str,
    data: &T,
    message: &Message,
    warnings: &[StoreWarning],
) -> Result<()> {
    if options.json {
        let envelope = SuccessEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "success",
            data,
            warnings,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    if !options.quiet {
        println!("{}", message.render());
    }
    Ok(())
}

pub fn emit_error(command: &str, err: &Error, json: bool) -> Result<()> {
    if json {
        let envelope = ErrorEnvelope {
            schema_version: SCHEMA_VERSION,
            command,
            status: "error",
            error: JsonError::from(err),
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
        return Ok(());
    }

    eprintln!("error: {err}");
    if let Some(hint) = error_hint(err) {
        eprintln!("hint: {hint}");
    }
    Ok(())
}

fn no_warnings(warnings: &&[StoreWarning]) -> bool {
    warnings.is_empty()
}

fn error_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::TaskNotFound(_) => Some("tasktracker list"),
        Error::ArchivedTaskNotFound(_) | Error::Conflict(_) => Some("tasktracker archived"),
        Error::InvalidConfig(_) => Some("fix .tasktracker/config.json then retry"),
        Error::CorruptData { .. } => Some("inspect the .corrupt-* backup under .tasktracker/"),
        _ => None,
    }
}

//! Alternate encodings of a value record and run-time sanitising.
//!
//! JSON carries the record as an object in record order. The shell script
//! passes every entry as a `key=value` command-line override, which AMReX
//! applies on top of the input file.

use crate::record::ValueRecord;
use crate::value::{Scalar, Value};
use thiserror::Error;

const PERIODIC_FACES: [(&str, &str); 3] = [
    ("remora.bc.xlo.type", "remora.bc.xhi.type"),
    ("remora.bc.ylo.type", "remora.bc.yhi.type"),
    ("remora.bc.zlo.type", "remora.bc.zhi.type"),
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pretty-printed JSON object, keys in record order.
pub fn export_json(record: &ValueRecord) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Inverse of [`export_json`]. Key order follows the document.
pub fn import_json(text: &str) -> Result<ValueRecord, ExportError> {
    let record: ValueRecord = serde_json::from_str(text)?;
    tracing::debug!(entries = record.len(), "imported JSON record");
    Ok(record)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellScriptOptions {
    pub executable: String,
    /// Passed before the overrides when set.
    pub input_file: Option<String>,
    /// Above 1 the executable runs under `mpi_command -n N`.
    pub num_procs: usize,
    pub mpi_command: String,
}

impl Default for ShellScriptOptions {
    fn default() -> Self {
        ShellScriptOptions {
            executable: "./REMORA".to_string(),
            input_file: None,
            num_procs: 1,
            mpi_command: "mpirun".to_string(),
        }
    }
}

/// Bash script that launches the executable with every record entry as a
/// `key=value` argument.
pub fn shell_script(record: &ValueRecord, options: &ShellScriptOptions) -> String {
    let mut command = Vec::new();
    if options.num_procs > 1 {
        command.push(shell_word(&options.mpi_command));
        command.push("-n".to_string());
        command.push(options.num_procs.to_string());
    }
    command.push(shell_word(&options.executable));
    if let Some(input) = &options.input_file {
        command.push(shell_word(input));
    }

    let mut out = String::from("#!/bin/bash\nset -euo pipefail\n\n");
    out.push_str(&command.join(" "));
    for (key, value) in record.iter() {
        out.push_str(" \\\n    ");
        out.push_str(&shell_word(key));
        out.push('=');
        out.push_str(&shell_word(&plain(value)));
    }
    out.push('\n');
    out
}

/// Value text without wire-format quoting; lists space-joined.
fn plain(value: &Value) -> String {
    let scalar = |s: &Scalar| match s {
        Scalar::Text(t) => t.clone(),
        other => other.to_string(),
    };
    match value {
        Value::Text(t) => t.clone(),
        Value::List(items) => items.iter().map(scalar).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

/// Double-quote a word when the shell would split or expand it.
fn shell_word(word: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "._-+/:=,@%".contains(c);
    if !word.is_empty() && word.chars().all(safe) {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('"');
    for c in word.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Copy of `record` ready for the solver: boundary types on periodic axes
/// are dropped (AMReX aborts on them) and a zero `remora.stop_time` is
/// dropped (zero means stop at once, not no limit).
pub fn prepare_for_run(record: &ValueRecord) -> ValueRecord {
    let mut out = record.clone();
    if let Some(flags) = record.get("remora.is_periodic").and_then(Value::as_list) {
        for (flag, (lo, hi)) in flags.iter().zip(PERIODIC_FACES) {
            if flag.as_f64().is_some_and(|f| f != 0.0) {
                out.remove(lo);
                out.remove(hi);
            }
        }
    }
    if record
        .get("remora.stop_time")
        .and_then(Value::as_f64)
        .is_some_and(|t| t == 0.0)
    {
        out.remove("remora.stop_time");
    }
    out
}

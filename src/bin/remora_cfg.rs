//! Check, format and convert REMORA input files.
//!
//! Usage:
//!   remora_cfg [--schema FILE] <COMMAND> ...
//!
//! Commands:
//!   check FILE...        Parse and validate; exit 1 on any error
//!   fmt FILE             Rewrite in canonical form (or keep layout with --preserve-layout)
//!   defaults             Print the default input file
//!   schema               List known parameters
//!   diff OLD NEW         Parameter-level differences
//!   export-json FILE     Input file to JSON
//!   import-json FILE     JSON to input file
//!   script FILE          Bash launch script with key=value overrides
//!
//! A FILE of `-` reads stdin. Set RUST_LOG=debug for engine tracing on stderr.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use remora_params::{
    diff, evaluate, export_json, import_json, prepare_for_run, shell_script, Codec, FormatError,
    Group, KeyOrder, ParsedConfig, Registry, SerializeOptions, Severity, ShellScriptOptions,
    ValidationMessage, ValueRecord,
};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "remora_cfg")]
#[command(about = "Check, format and convert REMORA input files")]
struct Cli {
    /// Parameter catalog (YAML) to use instead of the built-in one
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse and validate input files
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Human-readable output
        #[arg(long, short = 'H')]
        human: bool,
    },
    /// Rewrite an input file
    Fmt {
        file: PathBuf,
        /// Keep known keys that equal their default
        #[arg(long)]
        include_defaults: bool,
        /// Keep comments, blank lines and spacing; touch only changed lines
        #[arg(long)]
        preserve_layout: bool,
        /// Comment block written at the top
        #[arg(long)]
        header: Option<String>,
        #[arg(long, value_enum, default_value_t = OrderArg::Record)]
        order: OrderArg,
        /// Write back to FILE instead of stdout
        #[arg(long, short = 'w')]
        write: bool,
    },
    /// Print every default as an input file
    Defaults {
        #[arg(long)]
        group: Option<Group>,
    },
    /// List known parameters
    Schema {
        #[arg(long)]
        group: Option<Group>,
    },
    /// Show added, removed and changed parameters
    Diff { old: PathBuf, new: PathBuf },
    /// Convert an input file to JSON
    ExportJson { file: PathBuf },
    /// Convert JSON to an input file
    ImportJson { file: PathBuf },
    /// Bash script launching REMORA with every parameter as an override
    Script {
        file: PathBuf,
        #[arg(long, default_value = "./REMORA")]
        executable: String,
        #[arg(long, short = 'n', default_value_t = 1)]
        num_procs: usize,
        #[arg(long, default_value = "mpirun")]
        mpi_command: String,
        /// Input file passed to the executable before the overrides
        #[arg(long)]
        input_file: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderArg {
    Record,
    Declaration,
}

impl From<OrderArg> for KeyOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Record => KeyOrder::Record,
            OrderArg::Declaration => KeyOrder::Declaration,
        }
    }
}

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut src = String::new();
        io::stdin().read_to_string(&mut src).context("reading stdin")?;
        return Ok(src);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_registry(schema: Option<&Path>) -> anyhow::Result<Registry> {
    match schema {
        Some(path) => {
            let src = read_source(path)?;
            Registry::from_yaml_str(&src).with_context(|| format!("loading schema {}", path.display()))
        }
        None => Registry::builtin().context("loading built-in schema"),
    }
}

fn parse_file(codec: &Codec, path: &Path) -> anyhow::Result<ParsedConfig> {
    let src = read_source(path)?;
    let parsed = codec
        .parse(&src)
        .with_context(|| format!("parsing {}", path.display()))?;
    for e in &parsed.coercion_errors {
        tracing::warn!("{}: {}", path.display(), e);
    }
    Ok(parsed)
}

fn print_message(path: &str, line: Option<usize>, m: &ValidationMessage, style: OutputStyle) {
    let location = match line {
        Some(line) => format!("{}:{}", path, line),
        None => path.to_string(),
    };
    match style {
        OutputStyle::Compact => {
            println!("{}: {}: {} [{}]", location, m.severity, m.text, m.rule_id());
        }
        OutputStyle::Human => {
            println!("  {} {}: {}", m.severity, location, m.text);
            println!("    rule: {} ({})", m.rule_id(), m.rule.name());
            println!("    keys: {}", m.affected_keys.join(", "));
        }
    }
}

fn print_format_error(path: &str, e: &FormatError, style: OutputStyle) {
    match style {
        OutputStyle::Compact => println!("{}:{}: error: {} [format]", path, e.line(), e),
        OutputStyle::Human => println!("  error {}: {}", path, e),
    }
}

/// Returns (errors, warnings) for one file.
fn check_file(codec: &Codec, path: &Path, style: OutputStyle) -> anyhow::Result<(usize, usize)> {
    let display = path.display().to_string();
    let src = read_source(path)?;
    let parsed = match codec.parse(&src) {
        Ok(p) => p,
        Err(e) => {
            print_format_error(&display, &e, style);
            return Ok((1, 0));
        }
    };
    let mut errors = 0usize;
    let mut warnings = 0usize;
    for e in &parsed.coercion_errors {
        errors += 1;
        match style {
            OutputStyle::Compact => println!(
                "{}:{}: error: {}: cannot read {:?} as {} [coercion]",
                display, e.line, e.key, e.raw, e.expected
            ),
            OutputStyle::Human => println!("  error {}: {}", display, e),
        }
    }
    if let Some(registry) = codec.registry() {
        for m in evaluate(&parsed.record, registry) {
            match m.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info => {}
            }
            print_message(&display, parsed.document.line_of(m.primary_key()), &m, style);
        }
    }
    Ok((errors, warnings))
}

fn write_output(text: &str) -> anyhow::Result<()> {
    io::stdout()
        .write_all(text.as_bytes())
        .context("writing stdout")
}

fn group_filter(registry: &Registry, record: ValueRecord, group: Option<Group>) -> ValueRecord {
    let Some(group) = group else {
        return record;
    };
    record
        .iter()
        .filter(|(k, _)| registry.lookup(k).is_some_and(|d| d.group == group))
        .map(|(k, v)| (k, v.clone()))
        .collect()
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let registry = load_registry(cli.schema.as_deref())?;
    let codec = Codec::new(&registry);

    match cli.command {
        Command::Check { files, human } => {
            let style = if human {
                OutputStyle::Human
            } else {
                OutputStyle::Compact
            };
            let mut total_errors = 0usize;
            let mut total_warnings = 0usize;
            for path in &files {
                match check_file(&codec, path, style) {
                    Ok((e, w)) => {
                        total_errors += e;
                        total_warnings += w;
                    }
                    Err(e) => {
                        eprintln!("{}: {:#}", path.display(), e);
                        total_errors += 1;
                    }
                }
            }
            if total_errors > 0 || total_warnings > 0 {
                eprintln!(
                    "check: {} error(s), {} warning(s)",
                    total_errors, total_warnings
                );
            }
            if total_errors > 0 {
                std::process::exit(1);
            }
        }
        Command::Fmt {
            file,
            include_defaults,
            preserve_layout,
            header,
            order,
            write,
        } => {
            let parsed = parse_file(&codec, &file)?;
            let options = SerializeOptions {
                include_defaults,
                header_comment: header,
                key_order: order.into(),
            };
            let text = if preserve_layout {
                codec.rewrite(&parsed.document, &parsed.record, &options)
            } else {
                codec.serialize(&parsed.record, &options)
            };
            if write {
                std::fs::write(&file, &text)
                    .with_context(|| format!("writing {}", file.display()))?;
                tracing::info!("{}: formatted", file.display());
            } else {
                write_output(&text)?;
            }
        }
        Command::Defaults { group } => {
            let record = group_filter(&registry, registry.defaults(), group);
            let options = SerializeOptions {
                include_defaults: true,
                header_comment: Some("REMORA default parameters".to_string()),
                key_order: KeyOrder::Declaration,
            };
            write_output(&codec.serialize(&record, &options))?;
        }
        Command::Schema { group } => {
            let mut out = String::new();
            for g in Group::ALL {
                if group.is_some_and(|want| want != g) {
                    continue;
                }
                let mut members = registry.group_members(g).peekable();
                if members.peek().is_none() {
                    continue;
                }
                out.push_str(&format!("[{}]\n", g));
                for d in members {
                    let default = d.default.as_ref().map(|v| v.to_string()).unwrap_or_default();
                    out.push_str(&format!("  {:<44} {:<13} {}", d.key, d.dtype.name(), default));
                    if let Some(units) = &d.units {
                        out.push_str(&format!(" [{}]", units));
                    }
                    if let Some(dep) = &d.depends_on {
                        out.push_str(&format!("  (when {} = {})", dep.key, dep.equals));
                    }
                    out.push('\n');
                }
            }
            write_output(&out)?;
        }
        Command::Diff { old, new } => {
            let a = parse_file(&codec, &old)?;
            let b = parse_file(&codec, &new)?;
            let mut out = String::new();
            for entry in diff(&a.record, &b.record) {
                out.push_str(&entry.to_string());
                out.push('\n');
            }
            write_output(&out)?;
        }
        Command::ExportJson { file } => {
            let parsed = parse_file(&codec, &file)?;
            let mut json = export_json(&parsed.record)?;
            json.push('\n');
            write_output(&json)?;
        }
        Command::ImportJson { file } => {
            let src = read_source(&file)?;
            let record = import_json(&src).with_context(|| format!("reading {}", file.display()))?;
            write_output(&codec.serialize(&record, &SerializeOptions::complete()))?;
        }
        Command::Script {
            file,
            executable,
            num_procs,
            mpi_command,
            input_file,
        } => {
            let parsed = parse_file(&codec, &file)?;
            let options = ShellScriptOptions {
                executable,
                input_file,
                num_procs,
                mpi_command,
            };
            write_output(&shell_script(&prepare_for_run(&parsed.record), &options))?;
        }
    }
    Ok(())
}

//! # remora-params: REMORA input-file configuration engine
//!
//! Parses AMReX ParmParse-style input files (as read by the REMORA ocean model)
//! into a typed, ordered record; checks the record against a declarative
//! parameter catalog and a fixed set of cross-field rules; and writes it back
//! with round-trip fidelity.
//!
//! ## Components
//!
//! - **Schema registry** ([`schema`]): parameter definitions (type, default,
//!   range, enumeration, `depends_on` visibility), loaded from YAML and
//!   self-checked at construction.
//! - **Codec** ([`codec`]): `key = value` line format with comments, quoting
//!   and multi-token lists; parse, fresh serialization, layout-preserving rewrite.
//! - **Validation** ([`validate`]): rules R001–R009 producing ordered
//!   error/warning/info messages.
//! - **Extras**: record [`diff`], JSON and shell-script [`export`].
//!
//! ## Input format
//!
//! ```text
//! # Upwelling example
//! remora.prob_lo = 0.0 0.0 -150.0
//! remora.n_cell  = 41 80 16
//! remora.bc.xlo.type = "SlipWall"   # quoted text
//! remora.use_coriolis = true
//! custom.flag = 7                   # unknown keys pass through
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use remora_params::{evaluate, Codec, Registry, SerializeOptions};
//!
//! let registry = Registry::builtin()?;
//! let codec = Codec::new(&registry);
//! let parsed = codec.parse("remora.max_step = 100\n")?;
//! for m in evaluate(&parsed.record, &registry) {
//!     println!("{m}");
//! }
//! let text = codec.serialize(&parsed.record, &SerializeOptions::default());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! See `tests/integration.rs` for full examples.

pub mod codec;
pub mod diff;
pub mod export;
pub mod record;
pub mod schema;
pub mod validate;
pub mod value;

pub use codec::{
    parse, Codec, CoercionError, Document, FormatError, KeyOrder, ParsedConfig,
    SerializeOptions, SourceLine,
};
pub use diff::{diff, DiffEntry, DiffKind};
pub use export::{
    export_json, import_json, prepare_for_run, shell_script, ExportError, ShellScriptOptions,
};
pub use record::{is_valid_key, Entry, ValueRecord};
pub use schema::{Dependency, Group, ParameterDefinition, Registry, RegistryError};
pub use validate::{evaluate, Rule, Severity, ValidationMessage};
pub use value::{DType, Scalar, Value};

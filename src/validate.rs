//! Cross-field validation of a value record against the registry.
//!
//! ## Rules
//!
//! Evaluated in this order; each rule reports in its own key order.
//!
//! - **R001 fast-step-divides** (warning): `remora.fixed_fast_dt` should divide `remora.fixed_dt`.
//! - **R002 periodic-boundaries** (error): a face on a periodic axis must be unset or `Periodic`.
//! - **R003 cell-count-positive** (error): every `remora.n_cell` component must be > 0.
//! - **R004 extent-ordered** (error): `remora.prob_hi` must exceed `remora.prob_lo` on every axis.
//! - **R005 inactive-but-set** (info): a non-default value on a parameter whose dependency is off.
//! - **R006 grid-size-blocking** (warning): `amr.max_grid_size` below `amr.blocking_factor`.
//! - **R007 out-of-range** (error): a value outside its declared min/max.
//! - **R008 enum-membership** (error): an enumeration value outside its allowed set.
//! - **R009 value-shape** (error): a value that does not fit its declared type.
//!
//! Rules R001, R003, R004, R006 and the axis flags of R002 read effective
//! values (record, else default); the rest look only at keys the record
//! actually sets. A value of the wrong shape is skipped by every other rule and
//! reported once by R009.

use crate::record::ValueRecord;
use crate::schema::Registry;
use crate::value::Value;
use std::fmt;

const AXES: [&str; 3] = ["x", "y", "z"];

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Barotropic sub-step should evenly divide the baroclinic step.
    FastStepDivides,
    /// Boundary types on a periodic axis must be absent or `Periodic`.
    PeriodicBoundaries,
    /// Grid cell counts must be strictly positive.
    CellCountPositive,
    /// Domain upper corner must exceed the lower corner on every axis.
    ExtentOrdered,
    /// Explicit non-default value on a parameter that is currently inactive.
    InactiveButSet,
    /// Max grid size smaller than the blocking factor.
    GridSizeBlocking,
    /// Numeric value outside declared min/max.
    OutOfRange,
    /// Enumeration value not in the allowed set.
    EnumMembership,
    /// Value does not fit the declared type.
    ValueShape,
}

impl Rule {
    /// Evaluation order.
    pub const ALL: [Rule; 9] = [
        Rule::FastStepDivides,
        Rule::PeriodicBoundaries,
        Rule::CellCountPositive,
        Rule::ExtentOrdered,
        Rule::InactiveButSet,
        Rule::GridSizeBlocking,
        Rule::OutOfRange,
        Rule::EnumMembership,
        Rule::ValueShape,
    ];

    /// Stable identifier.
    pub fn id(self) -> &'static str {
        match self {
            Rule::FastStepDivides => "R001",
            Rule::PeriodicBoundaries => "R002",
            Rule::CellCountPositive => "R003",
            Rule::ExtentOrdered => "R004",
            Rule::InactiveButSet => "R005",
            Rule::GridSizeBlocking => "R006",
            Rule::OutOfRange => "R007",
            Rule::EnumMembership => "R008",
            Rule::ValueShape => "R009",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rule::FastStepDivides => "fast-step-divides",
            Rule::PeriodicBoundaries => "periodic-boundaries",
            Rule::CellCountPositive => "cell-count-positive",
            Rule::ExtentOrdered => "extent-ordered",
            Rule::InactiveButSet => "inactive-but-set",
            Rule::GridSizeBlocking => "grid-size-blocking",
            Rule::OutOfRange => "out-of-range",
            Rule::EnumMembership => "enum-membership",
            Rule::ValueShape => "value-shape",
        }
    }

    fn check(self, record: &ValueRecord, registry: &Registry) -> Vec<ValidationMessage> {
        let mut out = Vec::new();
        let mut ctx = Checker {
            rule: self,
            record,
            registry,
            out: &mut out,
        };
        match self {
            Rule::FastStepDivides => ctx.fast_step_divides(),
            Rule::PeriodicBoundaries => ctx.periodic_boundaries(),
            Rule::CellCountPositive => ctx.cell_count_positive(),
            Rule::ExtentOrdered => ctx.extent_ordered(),
            Rule::InactiveButSet => ctx.inactive_but_set(),
            Rule::GridSizeBlocking => ctx.grid_size_blocking(),
            Rule::OutOfRange => ctx.per_definition(|d, v| d.range_violation(v)),
            Rule::EnumMembership => ctx.per_definition(|d, v| {
                d.enum_violation(v).map(|reason| format!("{}: {}", d.key, reason))
            }),
            Rule::ValueShape => ctx.value_shape(),
        }
        out
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A single finding. `affected_keys` is never empty; the first key is the one
/// the message is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationMessage {
    pub severity: Severity,
    pub rule: Rule,
    pub text: String,
    pub affected_keys: Vec<String>,
}

impl ValidationMessage {
    pub fn rule_id(&self) -> &'static str {
        self.rule.id()
    }

    pub fn primary_key(&self) -> &str {
        self.affected_keys.first().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.severity, self.text, self.rule.id())
    }
}

/// Run every rule against `record`. Never fails; the same record always yields
/// the same messages in the same order.
pub fn evaluate(record: &ValueRecord, registry: &Registry) -> Vec<ValidationMessage> {
    let mut messages = Vec::new();
    for rule in Rule::ALL {
        let found = rule.check(record, registry);
        tracing::trace!(rule = rule.id(), messages = found.len(), "rule evaluated");
        messages.extend(found);
    }
    tracing::debug!(messages = messages.len(), "validation finished");
    messages
}

/// Highest severity present, if any.
pub fn worst(messages: &[ValidationMessage]) -> Option<Severity> {
    messages.iter().map(|m| m.severity).min()
}

struct Checker<'a> {
    rule: Rule,
    record: &'a ValueRecord,
    registry: &'a Registry,
    out: &'a mut Vec<ValidationMessage>,
}

impl<'a> Checker<'a> {
    fn push(&mut self, severity: Severity, text: String, keys: &[&str]) {
        self.out.push(ValidationMessage {
            severity,
            rule: self.rule,
            text,
            affected_keys: keys.iter().map(|k| k.to_string()).collect(),
        });
    }

    /// Record value, else default; `None` when the value has the wrong shape.
    fn effective(&self, key: &str) -> Option<&'a Value> {
        let value = self.registry.effective(key, self.record)?;
        match self.registry.lookup(key) {
            Some(d) if d.shape_violation(value).is_some() => None,
            _ => Some(value),
        }
    }

    fn fast_step_divides(&mut self) {
        const FIXED: &str = "remora.fixed_dt";
        const FAST: &str = "remora.fixed_fast_dt";
        let (Some(fixed), Some(fast)) = (
            self.effective(FIXED).and_then(Value::as_f64),
            self.effective(FAST).and_then(Value::as_f64),
        ) else {
            return;
        };
        if fast <= 0.0 || fixed <= 0.0 {
            return;
        }
        let ratio = fixed / fast;
        if (ratio - ratio.round()).abs() > 1e-9 * ratio.max(1.0) {
            self.push(
                Severity::Warning,
                format!(
                    "{} = {} does not evenly divide {} = {} (ratio {:.3})",
                    FAST, fast, FIXED, fixed, ratio
                ),
                &[FAST, FIXED],
            );
        }
    }

    fn periodic_boundaries(&mut self) {
        const PERIODIC: &str = "remora.is_periodic";
        let Some(flags) = self.effective(PERIODIC).and_then(Value::as_list) else {
            return;
        };
        for (axis, name) in AXES.iter().enumerate() {
            let periodic = flags
                .get(axis)
                .and_then(|s| s.as_f64())
                .is_some_and(|f| f != 0.0);
            if !periodic {
                continue;
            }
            for face in ["lo", "hi"] {
                let key = format!("remora.bc.{}{}.type", name, face);
                if let Some(Value::Text(bc)) = self.record.get(&key) {
                    if bc != "Periodic" {
                        self.push(
                            Severity::Error,
                            format!(
                                "{} = {} contradicts the periodic {} axis in {}",
                                key, bc, name, PERIODIC
                            ),
                            &[key.as_str(), PERIODIC],
                        );
                    }
                }
            }
        }
    }

    fn cell_count_positive(&mut self) {
        const N_CELL: &str = "remora.n_cell";
        let Some(counts) = self.effective(N_CELL).and_then(Value::as_list) else {
            return;
        };
        for (i, n) in counts.iter().enumerate() {
            if let Some(n) = n.as_f64() {
                if n <= 0.0 {
                    self.push(
                        Severity::Error,
                        format!("{}[{}] = {} must be positive", N_CELL, i, n),
                        &[N_CELL],
                    );
                }
            }
        }
    }

    fn extent_ordered(&mut self) {
        const LO: &str = "remora.prob_lo";
        const HI: &str = "remora.prob_hi";
        let (Some(lo), Some(hi)) = (
            self.effective(LO).and_then(Value::as_list),
            self.effective(HI).and_then(Value::as_list),
        ) else {
            return;
        };
        for (axis, (l, h)) in lo.iter().zip(hi).enumerate().take(AXES.len()) {
            let (Some(l), Some(h)) = (l.as_f64(), h.as_f64()) else {
                continue;
            };
            if h <= l {
                self.push(
                    Severity::Error,
                    format!(
                        "{} {} = {} must exceed {} {} = {}",
                        HI, AXES[axis], h, LO, AXES[axis], l
                    ),
                    &[HI, LO],
                );
            }
        }
    }

    fn inactive_but_set(&mut self) {
        let (registry, record) = (self.registry, self.record);
        for d in registry.definitions() {
            let (Some(dep), Some(value)) = (&d.depends_on, record.get(&d.key)) else {
                continue;
            };
            if d.shape_violation(value).is_some()
                || d.default.as_ref().is_some_and(|def| def.loosely_eq(value))
            {
                continue;
            }
            if !registry.is_active(&d.key, record) {
                self.push(
                    Severity::Info,
                    format!(
                        "{} is set but has no effect unless {} = {}",
                        d.key, dep.key, dep.equals
                    ),
                    &[d.key.as_str(), dep.key.as_str()],
                );
            }
        }
    }

    fn grid_size_blocking(&mut self) {
        const MAX_GRID: &str = "amr.max_grid_size";
        const BLOCKING: &str = "amr.blocking_factor";
        let (Some(max_grid), Some(blocking)) = (
            self.effective(MAX_GRID).and_then(Value::as_i64),
            self.effective(BLOCKING).and_then(Value::as_i64),
        ) else {
            return;
        };
        if max_grid < blocking {
            self.push(
                Severity::Warning,
                format!(
                    "{} = {} is smaller than {} = {}",
                    MAX_GRID, max_grid, BLOCKING, blocking
                ),
                &[MAX_GRID, BLOCKING],
            );
        }
    }

    /// Error per explicitly set, well-shaped key for which `check` reports.
    fn per_definition(
        &mut self,
        check: impl Fn(&crate::schema::ParameterDefinition, &Value) -> Option<String>,
    ) {
        let (registry, record) = (self.registry, self.record);
        for d in registry.definitions() {
            let Some(value) = record.get(&d.key) else {
                continue;
            };
            if d.shape_violation(value).is_some() {
                continue;
            }
            if let Some(text) = check(d, value) {
                self.push(Severity::Error, text, &[d.key.as_str()]);
            }
        }
    }

    fn value_shape(&mut self) {
        let (registry, record) = (self.registry, self.record);
        for d in registry.definitions() {
            let Some(value) = record.get(&d.key) else {
                continue;
            };
            if let Some(reason) = d.shape_violation(value) {
                self.push(Severity::Error, format!("{}: {}", d.key, reason), &[d.key.as_str()]);
            }
        }
    }
}

//! Runtime values for parameter records (codec representation).
//!
//! A value is either a single [`Scalar`] or a flat, ordered list of scalars.
//! Lexical rules for bare tokens live here too, so that the parser's
//! inference and the writer's quoting decision can never disagree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DType {
    Integer,
    Real,
    Boolean,
    Text,
    Enumeration,
    IntegerTriple,
    RealTriple,
    TextList,
}

impl DType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DType::Integer | DType::Real | DType::IntegerTriple | DType::RealTriple
        )
    }

    /// True for types stored as [`Value::List`].
    pub fn is_list(self) -> bool {
        matches!(self, DType::IntegerTriple | DType::RealTriple | DType::TextList)
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::Integer => "integer",
            DType::Real => "real",
            DType::Boolean => "boolean",
            DType::Text => "text",
            DType::Enumeration => "enumeration",
            DType::IntegerTriple => "integer-triple",
            DType::RealTriple => "real-triple",
            DType::TextList => "text-list",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
}

/// A parameter value: one scalar, or an ordered list of scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
    List(Vec<Scalar>),
}

impl Scalar {
    /// Infer the scalar type of an unquoted token.
    ///
    /// Order: boolean (`true`/`false`, lowercase only), integer (no decimal
    /// point, no exponent), real (decimal point or exponent), then text.
    pub fn infer(token: &str) -> Scalar {
        match token {
            "true" => return Scalar::Boolean(true),
            "false" => return Scalar::Boolean(false),
            _ => {}
        }
        if let Some(i) = parse_integer(token) {
            return Scalar::Integer(i);
        }
        if let Some(r) = parse_real(token) {
            return Scalar::Real(r);
        }
        Scalar::Text(token.to_string())
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Integer(_) => "integer",
            Scalar::Real(_) => "real",
            Scalar::Boolean(_) => "boolean",
            Scalar::Text(_) => "text",
        }
    }

    /// Equality that treats an integer and a real with the same numeric value as equal.
    pub fn loosely_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Integer(_), Scalar::Real(_)) | (Scalar::Real(_), Scalar::Integer(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self == other,
        }
    }
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Scalar]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Boolean(_) => "boolean",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }

    /// Equality that treats an integer and a real with the same numeric value as
    /// equal, element-wise for lists.
    pub fn loosely_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_eq(y))
            }
            (Value::List(_), _) | (_, Value::List(_)) => false,
            (Value::Integer(_), Value::Real(_)) | (Value::Real(_), Value::Integer(_)) => {
                self.as_f64() == other.as_f64()
            }
            _ => self == other,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Integer(i) => Value::Integer(i),
            Scalar::Real(r) => Value::Real(r),
            Scalar::Boolean(b) => Value::Boolean(b),
            Scalar::Text(t) => Value::Text(t),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(v: Vec<Scalar>) -> Self {
        Value::List(v)
    }
}

/// `[+-]?\d+` that fits in an `i64`.
pub(crate) fn parse_integer(token: &str) -> Option<i64> {
    let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

/// Decimal or exponent form only; `inf`, `nan` and friends stay text, and so
/// does anything that overflows to infinity (`1e999`).
pub(crate) fn parse_real(token: &str) -> Option<f64> {
    let mut has_digit = false;
    let mut has_marker = false;
    for b in token.bytes() {
        match b {
            b'0'..=b'9' => has_digit = true,
            b'.' | b'e' | b'E' => has_marker = true,
            b'+' | b'-' => {}
            _ => return None,
        }
    }
    if !(has_digit && has_marker) {
        return None;
    }
    token.parse().ok().filter(|r: &f64| r.is_finite())
}

/// Shortest text that reparses to the same `f64`.
///
/// Non-zero magnitudes below 1e-3 or at/above 1e7 use exponent form; the rest
/// use decimal form with at least one fractional digit.
pub(crate) fn format_real(r: f64) -> String {
    let a = r.abs();
    if r != 0.0 && r.is_finite() && !(1e-3..1e7).contains(&a) {
        format!("{:e}", r)
    } else {
        format!("{:?}", r)
    }
}

/// Text needs quoting when a bare token would not read back as the same text.
pub(crate) fn needs_quoting(text: &str) -> bool {
    text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || c == '#' || c == '"')
        || Scalar::infer(text) != Scalar::Text(text.to_string())
}

/// Double-quoted form. `"` and `\` are backslash-escaped, and CR/LF become
/// `\r`/`\n` so the token stays on one line.
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Renders in wire syntax: exactly what the writer emits after `key = `.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Real(r) => f.write_str(&format_real(*r)),
            Scalar::Boolean(b) => f.write_str(if *b { "true" } else { "false" }),
            Scalar::Text(t) if needs_quoting(t) => f.write_str(&quote(t)),
            Scalar::Text(t) => f.write_str(t),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::List(items) => {
                for (i, s) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", s)?;
                }
                Ok(())
            }
            Value::Integer(i) => fmt::Display::fmt(&Scalar::Integer(*i), f),
            Value::Real(r) => fmt::Display::fmt(&Scalar::Real(*r), f),
            Value::Boolean(b) => fmt::Display::fmt(&Scalar::Boolean(*b), f),
            Value::Text(t) => {
                if needs_quoting(t) {
                    f.write_str(&quote(t))
                } else {
                    f.write_str(t)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_literal_table() {
        assert_eq!(Scalar::infer("true"), Scalar::Boolean(true));
        assert_eq!(Scalar::infer("false"), Scalar::Boolean(false));
        assert_eq!(Scalar::infer("True"), Scalar::Text("True".into()));
        assert_eq!(Scalar::infer("-57600"), Scalar::Integer(-57600));
        assert_eq!(Scalar::infer("+3"), Scalar::Integer(3));
        assert_eq!(Scalar::infer("-150.0"), Scalar::Real(-150.0));
        assert_eq!(Scalar::infer("1.7e-4"), Scalar::Real(0.00017));
        assert_eq!(Scalar::infer("1e7"), Scalar::Real(1e7));
        assert_eq!(Scalar::infer("SlipWall"), Scalar::Text("SlipWall".into()));
        assert_eq!(Scalar::infer("inf"), Scalar::Text("inf".into()));
        assert_eq!(Scalar::infer("nan"), Scalar::Text("nan".into()));
        assert_eq!(Scalar::infer("1e"), Scalar::Text("1e".into()));
        assert_eq!(Scalar::infer("-"), Scalar::Text("-".into()));
    }

    #[test]
    fn integer_overflow_stays_text() {
        let big = "99999999999999999999";
        assert_eq!(Scalar::infer(big), Scalar::Text(big.into()));
    }

    #[test]
    fn real_formatting_thresholds() {
        assert_eq!(format_real(300.0), "300.0");
        assert_eq!(format_real(1.7e-4), "1.7e-4");
        assert_eq!(format_real(-8.26e-5), "-8.26e-5");
        assert_eq!(format_real(0.001), "0.001");
        assert_eq!(format_real(0.0), "0.0");
        assert_eq!(format_real(41000.0), "41000.0");
        assert_eq!(format_real(2.5e7), "2.5e7");
    }

    #[test]
    fn text_quoting() {
        assert_eq!(Value::from("plt").to_string(), "plt");
        assert_eq!(Value::from("").to_string(), "\"\"");
        assert_eq!(Value::from("foo # bar").to_string(), "\"foo # bar\"");
        assert_eq!(Value::from("10").to_string(), "\"10\"");
        assert_eq!(Value::from("true").to_string(), "\"true\"");
        assert_eq!(Value::from("say \"hi\"").to_string(), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn line_breaks_escaped_in_quotes() {
        assert_eq!(Value::from("line1\nline2").to_string(), "\"line1\\nline2\"");
        assert_eq!(Value::from("a\r\nb").to_string(), "\"a\\r\\nb\"");
    }

    #[test]
    fn overflowing_reals_stay_text() {
        assert_eq!(Scalar::infer("1e999"), Scalar::Text("1e999".into()));
        assert_eq!(Scalar::infer("-1.0e400"), Scalar::Text("-1.0e400".into()));
        assert_eq!(parse_real("1e-999"), Some(0.0));
    }

    #[test]
    fn list_rendering() {
        let v = Value::List(vec![Scalar::Real(0.0), Scalar::Real(0.0), Scalar::Real(-150.0)]);
        assert_eq!(v.to_string(), "0.0 0.0 -150.0");
        let v = Value::List(vec![Scalar::Integer(41), Scalar::Integer(80), Scalar::Integer(16)]);
        assert_eq!(v.to_string(), "41 80 16");
        assert_eq!(Value::List(vec![]).to_string(), "");
    }

    #[test]
    fn loose_equality_widens_integers() {
        assert!(Value::Integer(300).loosely_eq(&Value::Real(300.0)));
        assert!(!Value::Integer(300).loosely_eq(&Value::Real(300.5)));
        assert!(!Value::Integer(1).loosely_eq(&Value::Boolean(true)));
        let a = Value::List(vec![Scalar::Integer(1), Scalar::Real(2.0)]);
        let b = Value::List(vec![Scalar::Real(1.0), Scalar::Integer(2)]);
        assert!(a.loosely_eq(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn dtype_names_are_kebab_case() {
        assert_eq!(DType::IntegerTriple.to_string(), "integer-triple");
        let d: DType = serde_yaml::from_str("real-triple").expect("dtype");
        assert_eq!(d, DType::RealTriple);
    }
}

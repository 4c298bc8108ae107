//! Parse and write REMORA input files (AMReX ParmParse syntax).
//!
//! Line-oriented: every physical line is blank, a `#` comment, or
//! `key = value [# comment]`. A value is zero or more whitespace-separated
//! tokens; a token is bare or a double-quoted string with `\"`, `\\`, `\n` and
//! `\r` escapes.
//!
//! The codec runs schema-less (every key inferred, nothing elided) or with a
//! [`Registry`], in which case declared types override inference and known
//! keys that equal their default can be elided on write. Keys the registry does
//! not know pass through untouched in both modes.

use crate::record::{Entry, ValueRecord};
use crate::schema::Registry;
use crate::value::{parse_integer, parse_real, DType, Scalar, Value};
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct LineParser;

/// Structural error: stops the parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("line {line}, column {column}: unterminated quoted string")]
    UnterminatedQuote { line: usize, column: usize },
    #[error("line {line}, column {column}: expected `key = value`, a comment or a blank line, found {text:?}")]
    MalformedLine {
        line: usize,
        column: usize,
        text: String,
    },
}

impl FormatError {
    pub fn line(&self) -> usize {
        match self {
            FormatError::UnterminatedQuote { line, .. } | FormatError::MalformedLine { line, .. } => {
                *line
            }
        }
    }
}

/// A known key whose text does not read as its declared type. Collected, not
/// thrown: the record keeps the raw text for that key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {key}: cannot read {raw:?} as {expected}")]
pub struct CoercionError {
    pub key: String,
    pub line: usize,
    pub expected: DType,
    pub raw: String,
}

/// One physical line of a parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLine {
    /// Blank line or full-line comment, verbatim.
    Trivia(String),
    /// `head` is everything before the value text, `tail` everything after it
    /// (spacing and any trailing comment). `head + raw + tail` is the line.
    Assignment {
        key: String,
        head: String,
        raw: String,
        tail: String,
    },
}

/// Layout of a parsed file, used by [`Codec::rewrite`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    lines: Vec<SourceLine>,
    line_ending: LineEnding,
    final_newline: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

impl Document {
    pub fn lines(&self) -> &[SourceLine] {
        &self.lines
    }

    /// Keys assigned in the file, in line order (duplicates included).
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match l {
            SourceLine::Assignment { key, .. } => Some(key.as_str()),
            SourceLine::Trivia(_) => None,
        })
    }

    /// 1-based line of the assignment that set `key` (the last one).
    pub fn line_of(&self, key: &str) -> Option<usize> {
        self.lines.iter().rposition(|l| {
            matches!(l, SourceLine::Assignment { key: k, .. } if k == key)
        })
        .map(|i| i + 1)
    }
}

/// Result of a successful parse: the record, collected coercion errors, and
/// the source layout.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub record: ValueRecord,
    pub coercion_errors: Vec<CoercionError>,
    pub document: Document,
}

impl ParsedConfig {
    pub fn is_clean(&self) -> bool {
        self.coercion_errors.is_empty()
    }
}

/// Key order inside each prefix group on write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyOrder {
    /// Record order (keeps parse → write → parse order-stable).
    #[default]
    Record,
    /// Registry declaration order for known keys, then pass-through keys in
    /// record order.
    Declaration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Write known keys even when they equal their registry default.
    pub include_defaults: bool,
    /// Emitted first, one `# ` line per input line.
    pub header_comment: Option<String>,
    pub key_order: KeyOrder,
}

impl SerializeOptions {
    /// Every key written, record order, no header.
    pub fn complete() -> Self {
        SerializeOptions {
            include_defaults: true,
            ..Self::default()
        }
    }
}

struct Token {
    text: String,
    quoted: bool,
}

struct Assignment<'a> {
    key: &'a str,
    value_start: usize,
    value_end: usize,
    tokens: Vec<Token>,
}

/// Parse schema-less: every key is inferred.
pub fn parse(text: &str) -> Result<ParsedConfig, FormatError> {
    Codec::schemaless().parse(text)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Codec<'r> {
    registry: Option<&'r Registry>,
}

impl<'r> Codec<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Codec {
            registry: Some(registry),
        }
    }

    pub fn schemaless() -> Self {
        Codec { registry: None }
    }

    pub fn registry(&self) -> Option<&'r Registry> {
        self.registry
    }

    /// Parse text into a record.
    ///
    /// Fails only on structural errors. Unknown keys are kept with inferred
    /// types; known keys that cannot be read as their declared type keep their
    /// raw text and are reported in [`ParsedConfig::coercion_errors`].
    pub fn parse(&self, text: &str) -> Result<ParsedConfig, FormatError> {
        let mut record = ValueRecord::new();
        let mut coercion_errors = Vec::new();
        let mut lines = Vec::new();

        for (i, line) in text.lines().enumerate() {
            let number = i + 1;
            let Some(a) = parse_line(number, line)? else {
                lines.push(SourceLine::Trivia(line.to_string()));
                continue;
            };
            let raw = &line[a.value_start..a.value_end];
            let value = match self.decode(a.key, &a.tokens) {
                Ok(v) => v,
                Err(expected) => {
                    tracing::debug!(key = a.key, line = number, %expected, "coercion failed, keeping raw text");
                    coercion_errors.push(CoercionError {
                        key: a.key.to_string(),
                        line: number,
                        expected,
                        raw: raw.to_string(),
                    });
                    Value::Text(raw.to_string())
                }
            };
            if record.contains_key(a.key) {
                tracing::debug!(key = a.key, line = number, "duplicate key, last assignment wins");
            }
            record.insert_parsed(a.key.to_string(), value, raw.to_string());
            lines.push(SourceLine::Assignment {
                key: a.key.to_string(),
                head: line[..a.value_start].to_string(),
                raw: raw.to_string(),
                tail: line[a.value_end..].to_string(),
            });
        }

        tracing::debug!(
            entries = record.len(),
            coercion_errors = coercion_errors.len(),
            "parsed configuration"
        );
        let line_ending = if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        };
        Ok(ParsedConfig {
            record,
            coercion_errors,
            document: Document {
                lines,
                line_ending,
                final_newline: text.ends_with('\n'),
            },
        })
    }

    /// Declared type wins when the registry knows the key; otherwise infer.
    fn decode(&self, key: &str, tokens: &[Token]) -> Result<Value, DType> {
        match self.registry.and_then(|r| r.lookup(key)) {
            Some(def) => coerce(tokens, def.dtype).ok_or(def.dtype),
            None => Ok(infer(tokens)),
        }
    }

    /// Write `record` as a fresh file.
    ///
    /// Keys are grouped by prefix (text before the first `.`) in first-seen
    /// order, with a `# prefix` header per group when there is more than one.
    /// Entries unchanged since parse re-emit their source text.
    pub fn serialize(&self, record: &ValueRecord, options: &SerializeOptions) -> String {
        let mut out = String::new();
        push_header(&mut out, options.header_comment.as_deref(), "\n");
        let entries: Vec<&Entry> = record
            .entries()
            .iter()
            .filter(|e| !self.is_elided(e, options))
            .collect();
        self.render_groups(&mut out, entries, options.key_order, "\n");
        out
    }

    /// Write `record` onto the layout of a parsed file.
    ///
    /// Comments, blank lines and spacing are kept. Unchanged entries keep
    /// their line byte-for-byte, changed entries get a new value text in the
    /// same line, removed or elided entries lose their line, and keys the file
    /// never had are appended in prefix groups. A header comment, when set, is
    /// written above the original first line.
    pub fn rewrite(
        &self,
        document: &Document,
        record: &ValueRecord,
        options: &SerializeOptions,
    ) -> String {
        let nl = document.line_ending.as_str();
        let mut live: HashMap<&str, usize> = HashMap::new();
        for (i, line) in document.lines.iter().enumerate() {
            if let SourceLine::Assignment { key, .. } = line {
                live.insert(key.as_str(), i);
            }
        }

        let mut out = String::new();
        push_header(&mut out, options.header_comment.as_deref(), nl);
        for (i, line) in document.lines.iter().enumerate() {
            let (key, head, raw, tail) = match line {
                SourceLine::Trivia(text) => {
                    out.push_str(text);
                    out.push_str(nl);
                    continue;
                }
                SourceLine::Assignment {
                    key,
                    head,
                    raw,
                    tail,
                } => (key, head, raw, tail),
            };
            let Some(entry) = record.entry(key) else {
                continue;
            };
            if self.is_elided(entry, options) {
                continue;
            }
            let live_raw = match live.get(key.as_str()).map(|&j| &document.lines[j]) {
                Some(SourceLine::Assignment { raw, .. }) => raw.as_str(),
                _ => raw.as_str(),
            };
            let unchanged = entry.lexeme() == Some(live_raw);
            let is_live = live.get(key.as_str()) == Some(&i);
            if unchanged {
                out.push_str(head);
                out.push_str(raw);
                out.push_str(tail);
                out.push_str(nl);
            } else if is_live {
                let value = entry.value().to_string();
                out.push_str(head);
                if value.is_empty() {
                    let trimmed = out.trim_end_matches([' ', '\t']).len();
                    out.truncate(trimmed);
                }
                out.push_str(&value);
                if tail.starts_with('#') {
                    out.push(' ');
                }
                out.push_str(tail);
                out.push_str(nl);
            }
        }

        let known: HashSet<&str> = document.keys().collect();
        let appended: Vec<&Entry> = record
            .entries()
            .iter()
            .filter(|e| !known.contains(e.key()) && !self.is_elided(e, options))
            .collect();
        if appended.is_empty() {
            if !document.final_newline && out.ends_with(nl) {
                out.truncate(out.len() - nl.len());
            }
            return out;
        }
        if !out.is_empty() && !out.ends_with(&format!("{nl}{nl}")) {
            out.push_str(nl);
        }
        self.render_groups(&mut out, appended, options.key_order, nl);
        out
    }

    fn is_elided(&self, entry: &Entry, options: &SerializeOptions) -> bool {
        if options.include_defaults {
            return false;
        }
        self.registry
            .and_then(|r| r.default_of(entry.key()))
            .is_some_and(|d| d.loosely_eq(entry.value()))
    }

    fn render_groups(&self, out: &mut String, entries: Vec<&Entry>, order: KeyOrder, nl: &str) {
        let mut groups: Vec<(&str, Vec<&Entry>)> = Vec::new();
        for e in entries {
            let p = prefix(e.key());
            match groups.iter_mut().find(|(g, _)| *g == p) {
                Some((_, members)) => members.push(e),
                None => groups.push((p, vec![e])),
            }
        }
        if let (KeyOrder::Declaration, Some(registry)) = (order, self.registry) {
            for (_, members) in &mut groups {
                members.sort_by_key(|e| match registry.declaration_index(e.key()) {
                    Some(i) => (0, i),
                    None => (1, 0),
                });
            }
        }

        let headed = groups.len() > 1;
        for (n, (p, members)) in groups.iter().enumerate() {
            if n > 0 {
                out.push_str(nl);
            }
            if headed {
                out.push_str("# ");
                out.push_str(p);
                out.push_str(nl);
            }
            for e in members {
                out.push_str(&render_line(e));
                out.push_str(nl);
            }
        }
    }
}

fn push_header(out: &mut String, header: Option<&str>, nl: &str) {
    let Some(header) = header else {
        return;
    };
    for line in header.lines() {
        if line.is_empty() {
            out.push('#');
        } else {
            out.push_str("# ");
            out.push_str(line);
        }
        out.push_str(nl);
    }
    out.push_str(nl);
}

fn render_line(entry: &Entry) -> String {
    let value = match entry.lexeme() {
        Some(raw) => raw.to_string(),
        None => entry.value().to_string(),
    };
    if value.is_empty() {
        format!("{} =", entry.key())
    } else {
        format!("{} = {}", entry.key(), value)
    }
}

/// Text before the first `.`; the whole key when there is none.
pub fn prefix(key: &str) -> &str {
    key.split('.').next().unwrap_or(key)
}

fn parse_line(number: usize, text: &str) -> Result<Option<Assignment<'_>>, FormatError> {
    let pairs = LineParser::parse(Rule::line, text).map_err(|e| line_error(number, text, &e))?;
    for line in pairs {
        for inner in line.into_inner() {
            if inner.as_rule() == Rule::assignment {
                return Ok(Some(build_assignment(inner, text)));
            }
        }
    }
    Ok(None)
}

fn build_assignment<'a>(pair: pest::iterators::Pair<'a, Rule>, text: &'a str) -> Assignment<'a> {
    let mut key = "";
    let mut key_end = 0;
    let mut value = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::key => {
                key = inner.as_str();
                key_end = inner.as_span().end();
            }
            Rule::value => value = Some(inner),
            _ => {}
        }
    }
    match value {
        Some(v) => {
            let span = v.as_span();
            Assignment {
                key,
                value_start: span.start(),
                value_end: span.end(),
                tokens: build_tokens(v),
            }
        }
        None => {
            let after_eq = text[key_end..]
                .find('=')
                .map_or(text.len(), |i| key_end + i + 1);
            let rest = &text[after_eq..];
            let start = after_eq + rest.len() - rest.trim_start_matches([' ', '\t']).len();
            Assignment {
                key,
                value_start: start,
                value_end: start,
                tokens: Vec::new(),
            }
        }
    }
}

fn build_tokens(pair: pest::iterators::Pair<Rule>) -> Vec<Token> {
    let mut tokens = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::quoted => {
                let body = inner.into_inner().next().map(|b| b.as_str()).unwrap_or("");
                tokens.push(Token {
                    text: unescape(body),
                    quoted: true,
                });
            }
            Rule::bare => tokens.push(Token {
                text: inner.as_str().to_string(),
                quoted: false,
            }),
            _ => {}
        }
    }
    tokens
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(e @ ('"' | '\\')) => out.push(e),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn line_error(number: usize, text: &str, err: &pest::error::Error<Rule>) -> FormatError {
    if let Some(column) = unterminated_quote(text) {
        return FormatError::UnterminatedQuote {
            line: number,
            column,
        };
    }
    let column = match err.line_col {
        pest::error::LineColLocation::Pos((_, c)) => c,
        pest::error::LineColLocation::Span((_, c), _) => c,
    };
    FormatError::MalformedLine {
        line: number,
        column,
        text: text.to_string(),
    }
}

/// 1-based column of a quote that never closes before the end of the line.
fn unterminated_quote(text: &str) -> Option<usize> {
    let mut open = None;
    let mut chars = text.char_indices();
    while let Some((i, c)) = chars.next() {
        match (open, c) {
            (None, '#') => break,
            (None, '"') => open = Some(i),
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(_), '"') => open = None,
            _ => {}
        }
    }
    open.map(|i| i + 1)
}

fn scalar_of(token: &Token) -> Scalar {
    if token.quoted {
        Scalar::Text(token.text.clone())
    } else {
        Scalar::infer(&token.text)
    }
}

/// Schema-less reading: one token is a scalar, several are a list, none is
/// empty text. Quoted tokens are always text.
fn infer(tokens: &[Token]) -> Value {
    match tokens {
        [] => Value::Text(String::new()),
        [one] => scalar_of(one).into(),
        many => Value::List(many.iter().map(scalar_of).collect()),
    }
}

/// Read tokens as `dtype`. Quotes do not matter here; the declaration does.
fn coerce(tokens: &[Token], dtype: DType) -> Option<Value> {
    let single = || match tokens {
        [one] => Some(one.text.as_str()),
        _ => None,
    };
    match dtype {
        DType::Integer => parse_integer(single()?).map(Value::Integer),
        DType::Real => read_real(single()?).map(Value::Real),
        DType::Boolean => match single()? {
            "true" => Some(Value::Boolean(true)),
            "false" => Some(Value::Boolean(false)),
            _ => None,
        },
        DType::Text | DType::Enumeration => match tokens {
            [] => Some(Value::Text(String::new())),
            [one] => Some(Value::Text(one.text.clone())),
            _ => None,
        },
        DType::IntegerTriple => read_list(tokens, |t| parse_integer(t).map(Scalar::Integer)),
        DType::RealTriple => read_list(tokens, |t| read_real(t).map(Scalar::Real)),
        DType::TextList => Some(Value::List(
            tokens.iter().map(|t| Scalar::Text(t.text.clone())).collect(),
        )),
    }
}

/// Integers widen to reals.
fn read_real(token: &str) -> Option<f64> {
    parse_integer(token)
        .map(|i| i as f64)
        .or_else(|| parse_real(token))
}

fn read_list(tokens: &[Token], read: impl Fn(&str) -> Option<Scalar>) -> Option<Value> {
    if tokens.is_empty() {
        return None;
    }
    tokens
        .iter()
        .map(|t| read(&t.text))
        .collect::<Option<Vec<_>>>()
        .map(Value::List)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str, key: &str) -> Value {
        let parsed = parse(text).expect("parse");
        parsed.record.get(key).cloned().expect("key present")
    }

    #[test]
    fn blank_and_comment_lines_skipped() {
        let parsed = parse("\n# a comment\n   # indented comment\n\nremora.v = 1\n\n").expect("parse");
        assert_eq!(parsed.record.len(), 1);
        assert_eq!(parsed.record.get("remora.v"), Some(&Value::Integer(1)));
    }

    #[test]
    fn spacing_around_equals_is_insignificant() {
        assert_eq!(value("remora.v=2", "remora.v"), Value::Integer(2));
        assert_eq!(value("remora.v   =   3  ", "remora.v"), Value::Integer(3));
        assert_eq!(value("\tremora.v\t=\t4", "remora.v"), Value::Integer(4));
    }

    #[test]
    fn inline_comments_stripped_outside_quotes() {
        assert_eq!(value("remora.v = 1  # verbosity", "remora.v"), Value::Integer(1));
        assert_eq!(value("remora.v = 1# tight", "remora.v"), Value::Integer(1));
        assert_eq!(
            value(r#"remora.label = "foo # bar""#, "remora.label"),
            Value::Text("foo # bar".into())
        );
        assert_eq!(
            value(r#"remora.scheme = "upstream3" # upstream3 or centered4"#, "remora.scheme"),
            Value::Text("upstream3".into())
        );
    }

    #[test]
    fn multi_value_tokens_become_lists() {
        assert_eq!(
            value("remora.prob_lo = 0 0 -150.0", "remora.prob_lo"),
            Value::List(vec![Scalar::Integer(0), Scalar::Integer(0), Scalar::Real(-150.0)])
        );
        assert_eq!(
            value(r#"x.names = "a b" c"#, "x.names"),
            Value::List(vec![Scalar::Text("a b".into()), Scalar::Text("c".into())])
        );
    }

    #[test]
    fn quoted_tokens_are_text() {
        assert_eq!(value(r#"x.k = "10""#, "x.k"), Value::Text("10".into()));
        assert_eq!(value(r#"x.k = "SlipWall""#, "x.k"), Value::Text("SlipWall".into()));
        assert_eq!(value(r#"x.k = "say \"hi\"""#, "x.k"), Value::Text("say \"hi\"".into()));
        assert_eq!(value(r#"x.k = "C:\dir""#, "x.k"), Value::Text("C:\\dir".into()));
    }

    #[test]
    fn empty_value_is_empty_text() {
        assert_eq!(value("amr.restart =", "amr.restart"), Value::Text(String::new()));
        assert_eq!(value("amr.restart = # none", "amr.restart"), Value::Text(String::new()));
    }

    #[test]
    fn unterminated_quote_is_structural() {
        let err = parse("remora.v = 1\nremora.plot_file = \"plt\n").expect_err("must fail");
        assert_eq!(err, FormatError::UnterminatedQuote { line: 2, column: 20 });
    }

    #[test]
    fn line_without_assignment_is_structural() {
        let err = parse("just some text\nremora.v = 1\n").expect_err("must fail");
        assert!(matches!(err, FormatError::MalformedLine { line: 1, .. }), "{err:?}");
        let err = parse("= 5").expect_err("missing key");
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn duplicate_key_last_wins_first_position() {
        let parsed = parse("a.x = 1\na.y = 2\na.x = 3\n").expect("parse");
        let keys: Vec<_> = parsed.record.keys().collect();
        assert_eq!(keys, ["a.x", "a.y"]);
        assert_eq!(parsed.record.get("a.x"), Some(&Value::Integer(3)));
    }

    #[test]
    fn serialize_groups_by_prefix_with_headers() {
        let record: ValueRecord = [("remora.v", 0i64), ("amr.max_level", 0), ("remora.max_step", 10)]
            .into_iter()
            .collect();
        let text = Codec::schemaless().serialize(&record, &SerializeOptions::default());
        assert_eq!(
            text,
            "# remora\nremora.v = 0\nremora.max_step = 10\n\n# amr\namr.max_level = 0\n"
        );
    }

    #[test]
    fn single_group_has_no_header() {
        let record: ValueRecord = [("remora.v", 0i64)].into_iter().collect();
        let text = Codec::schemaless().serialize(&record, &SerializeOptions::default());
        assert_eq!(text, "remora.v = 0\n");
    }

    #[test]
    fn header_comment_lines() {
        let record: ValueRecord = [("remora.v", 0i64)].into_iter().collect();
        let options = SerializeOptions {
            header_comment: Some("Line 1\n\nLine 2".into()),
            ..SerializeOptions::default()
        };
        let text = Codec::schemaless().serialize(&record, &options);
        assert!(text.starts_with("# Line 1\n#\n# Line 2\n\nremora.v = 0\n"), "{text}");
    }

    #[test]
    fn parsed_lexeme_is_reused() {
        let parsed = parse("remora.Tcoef = 1.70e-4\n").expect("parse");
        let text = Codec::schemaless().serialize(&parsed.record, &SerializeOptions::complete());
        assert_eq!(text, "remora.Tcoef = 1.70e-4\n");
        let edited = parsed.record.with_value("remora.Tcoef", 1.8e-4);
        let text = Codec::schemaless().serialize(&edited, &SerializeOptions::complete());
        assert_eq!(text, "remora.Tcoef = 1.8e-4\n");
    }

    #[test]
    fn rewrite_unchanged_is_byte_identical() {
        let src = "# header\nremora.v   = 1   # verbosity\n\ncustom.x=\"a b\"\n";
        let parsed = parse(src).expect("parse");
        let out = Codec::schemaless().rewrite(&parsed.document, &parsed.record, &SerializeOptions::complete());
        assert_eq!(out, src);

        let src = "remora.v = 1\r\nremora.prob_lo = 0.0  0.0 -150.0";
        let parsed = parse(src).expect("parse");
        let out = Codec::schemaless().rewrite(&parsed.document, &parsed.record, &SerializeOptions::complete());
        assert_eq!(out, src);
    }

    #[test]
    fn rewrite_changes_only_touched_lines() {
        let src = "# header\nremora.v   = 1   # verbosity\nremora.max_step = 10\namr.max_level = 0\n";
        let parsed = parse(src).expect("parse");
        let mut record = parsed.record.clone();
        record.insert("remora.v", 2i64);
        record.remove("remora.max_step");
        record.insert("custom.flag", true);
        let out = Codec::schemaless().rewrite(&parsed.document, &record, &SerializeOptions::complete());
        assert_eq!(
            out,
            "# header\nremora.v   = 2   # verbosity\namr.max_level = 0\n\ncustom.flag = true\n"
        );
    }

    #[test]
    fn rewrite_writes_header_above_layout() {
        let src = "remora.v = 1\r\n# tail\r\n";
        let parsed = parse(src).expect("parse");
        let options = SerializeOptions {
            header_comment: Some("generated\n\nrun 4".into()),
            ..SerializeOptions::complete()
        };
        let out = Codec::schemaless().rewrite(&parsed.document, &parsed.record, &options);
        assert_eq!(out, "# generated\r\n#\r\n# run 4\r\n\r\nremora.v = 1\r\n# tail\r\n");
    }

    #[test]
    fn escaped_line_breaks_round_trip() {
        let mut record = ValueRecord::new();
        record.insert("custom.note", "line1\nline2\r");
        let text = Codec::schemaless().serialize(&record, &SerializeOptions::complete());
        assert_eq!(text, "custom.note = \"line1\\nline2\\r\"\n");
        assert_eq!(parse(&text).expect("reparse").record, record);
    }

    #[test]
    fn unescape_keeps_unknown_escapes() {
        assert_eq!(unescape(r#"a\"b"#), "a\"b");
        assert_eq!(unescape(r"a\\b"), "a\\b");
        assert_eq!(unescape(r"a\nb\r"), "a\nb\r");
        assert_eq!(unescape(r"a\tb"), "a\\tb");
    }
}

//! RFC 6570 URI templates, as advertised in server link tables.
//!
//! Supports every level-4 operator (`+ # . / ; ? &`), explode (`*`) and prefix
//! (`:n`) modifiers, and list values. Simple and reserved expressions whose
//! variables are all unbound stay in the output verbatim so a partially
//! resolved link can be told apart from a literal one; every other operator
//! expands to nothing when unbound, as RFC 6570 prescribes.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::params::{LinkParams, ParamValue};
use crate::errors::{NavigationError, Result};

/// Everything except RFC 3986 unreserved characters gets encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Unreserved plus reserved characters (and `%` triplets) pass through.
const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b'%');

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    Path,
    PathParam,
    Query,
    QueryContinuation,
}

impl Operator {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '+' => Operator::Reserved,
            '#' => Operator::Fragment,
            '.' => Operator::Label,
            '/' => Operator::Path,
            ';' => Operator::PathParam,
            '?' => Operator::Query,
            '&' => Operator::QueryContinuation,
            _ => return None,
        })
    }

    fn first(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved => "",
            Operator::Fragment => "#",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::PathParam => ";",
            Operator::Query => "?",
            Operator::QueryContinuation => "&",
        }
    }

    fn separator(self) -> &'static str {
        match self {
            Operator::Simple | Operator::Reserved | Operator::Fragment => ",",
            Operator::Label => ".",
            Operator::Path => "/",
            Operator::PathParam => ";",
            Operator::Query | Operator::QueryContinuation => "&",
        }
    }

    fn named(self) -> bool {
        matches!(
            self,
            Operator::PathParam | Operator::Query | Operator::QueryContinuation
        )
    }

    /// Text placed after a named variable whose value is empty.
    fn if_empty(self) -> &'static str {
        match self {
            Operator::Query | Operator::QueryContinuation => "=",
            _ => "",
        }
    }

    fn allows_reserved(self) -> bool {
        matches!(self, Operator::Reserved | Operator::Fragment)
    }

    /// Unbound expressions of these operators denote required fields.
    fn keeps_unbound(self) -> bool {
        matches!(self, Operator::Simple | Operator::Reserved)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct VarSpec {
    name: String,
    prefix: Option<usize>,
    explode: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    Expression {
        raw: String,
        operator: Operator,
        vars: Vec<VarSpec>,
    },
}

/// A parsed URI template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UriTemplate {
    source: String,
    parts: Vec<Part>,
}

impl UriTemplate {
    pub(crate) fn parse(template: &str) -> Result<Self> {
        let malformed = |reason: &str| NavigationError::MalformedTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            if rest[..open].contains('}') {
                return Err(malformed("unmatched `}`").into());
            }
            if open > 0 {
                parts.push(Part::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| malformed("unterminated expression"))?;
            let body = &after[..close];
            if body.contains('{') {
                return Err(malformed("nested `{`").into());
            }
            parts.push(parse_expression(body).map_err(|reason| malformed(&reason))?);
            rest = &after[close + 1..];
        }
        if rest.contains('}') {
            return Err(malformed("unmatched `}`").into());
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }

        Ok(UriTemplate {
            source: template.to_string(),
            parts,
        })
    }

    /// Variable names declared anywhere in the template, in order of appearance.
    pub(crate) fn parameter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for part in &self.parts {
            if let Part::Expression { vars, .. } = part {
                for var in vars {
                    if !names.contains(&var.name.as_str()) {
                        names.push(&var.name);
                    }
                }
            }
        }
        names
    }

    pub(crate) fn has_expressions(&self) -> bool {
        self.parts
            .iter()
            .any(|p| matches!(p, Part::Expression { .. }))
    }

    pub(crate) fn expand(&self, params: &LinkParams) -> String {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Expression {
                    raw,
                    operator,
                    vars,
                } => expand_expression(&mut out, raw, *operator, vars, params),
            }
        }
        out
    }
}

fn parse_expression(body: &str) -> std::result::Result<Part, String> {
    let mut chars = body.chars();
    let (operator, list) = match chars.next() {
        None => return Err("empty expression".into()),
        Some(c) => match Operator::from_char(c) {
            Some(op) => (op, chars.as_str()),
            None if matches!(c, '=' | ',' | '!' | '@' | '|') => {
                return Err(format!("reserved operator `{c}`"));
            }
            None => (Operator::Simple, body),
        },
    };

    let mut vars = Vec::new();
    for spec in list.split(',') {
        let (name, prefix, explode) = if let Some(name) = spec.strip_suffix('*') {
            (name, None, true)
        } else if let Some((name, len)) = spec.split_once(':') {
            let len: usize = len
                .parse()
                .ok()
                .filter(|n| (1..10_000).contains(n))
                .ok_or_else(|| format!("invalid prefix length in `{spec}`"))?;
            (name, Some(len), false)
        } else {
            (spec, None, false)
        };

        if !is_valid_varname(name) {
            return Err(format!("invalid variable name `{name}`"));
        }
        vars.push(VarSpec {
            name: name.to_string(),
            prefix,
            explode,
        });
    }

    Ok(Part::Expression {
        raw: format!("{{{body}}}"),
        operator,
        vars,
    })
}

fn is_valid_varname(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '%'))
}

fn encode(value: &str, allow_reserved: bool) -> String {
    let set = if allow_reserved { RESERVED } else { UNRESERVED };
    utf8_percent_encode(value, set).to_string()
}

fn truncate(value: &str, prefix: Option<usize>) -> &str {
    match prefix {
        Some(n) => match value.char_indices().nth(n) {
            Some((idx, _)) => &value[..idx],
            None => value,
        },
        None => value,
    }
}

fn expand_expression(
    out: &mut String,
    raw: &str,
    op: Operator,
    vars: &[VarSpec],
    params: &LinkParams,
) {
    let mut pieces: Vec<String> = Vec::new();

    for var in vars {
        let Some(value) = params.get(&var.name) else {
            continue;
        };
        let allow = op.allows_reserved();

        match value {
            ParamValue::List(items) if items.is_empty() => continue,
            ParamValue::List(items) => {
                if var.explode {
                    for item in items {
                        let encoded = encode(item, allow);
                        pieces.push(named_piece(op, &var.name, &encoded, item.is_empty()));
                    }
                } else {
                    let joined = items
                        .iter()
                        .map(|item| encode(item, allow))
                        .collect::<Vec<_>>()
                        .join(",");
                    pieces.push(named_piece(op, &var.name, &joined, false));
                }
            }
            scalar => {
                let text = scalar.scalar().unwrap_or_default();
                let encoded = encode(truncate(&text, var.prefix), allow);
                pieces.push(named_piece(op, &var.name, &encoded, text.is_empty()));
            }
        }
    }

    if pieces.is_empty() {
        if op.keeps_unbound() {
            out.push_str(raw);
        }
        return;
    }

    out.push_str(op.first());
    out.push_str(&pieces.join(op.separator()));
}

fn named_piece(op: Operator, name: &str, encoded: &str, empty: bool) -> String {
    if !op.named() {
        return encoded.to_string();
    }
    if empty {
        format!("{name}{}", op.if_empty())
    } else {
        format!("{name}={encoded}")
    }
}

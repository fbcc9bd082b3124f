//! Read schema source text into forms using PEST.

use crate::ast::Form;
use crate::error::SchemaError;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct FormParser;

/// Parse source into its top-level forms, in order.
pub fn parse(source: &str) -> Result<Vec<Form>, SchemaError> {
    let pairs = FormParser::parse(Rule::program, source)
        .map_err(|e| SchemaError::Parse(e.to_string()))?;
    let program = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::Parse("empty parse".to_string()))?;
    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(build_form)
        .collect()
}

fn build_form(pair: Pair<Rule>) -> Result<Form, SchemaError> {
    match pair.as_rule() {
        Rule::list => pair
            .into_inner()
            .map(build_form)
            .collect::<Result<Vec<_>, _>>()
            .map(Form::List),
        Rule::quoted => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| SchemaError::Parse("quote without a form".to_string()))?;
            Ok(Form::quoted(build_form(inner)?))
        }
        Rule::string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Form::Str(unescape(inner)))
        }
        Rule::boolean => Ok(Form::Bool(pair.as_str() == "#t")),
        Rule::hex => parse_hex(pair.as_str()).map(Form::Int),
        Rule::float => pair
            .as_str()
            .parse()
            .map(Form::Float)
            .map_err(|_| SchemaError::Parse(format!("invalid float: {}", pair.as_str()))),
        Rule::integer => pair
            .as_str()
            .parse()
            .map(Form::Int)
            .map_err(|_| SchemaError::Parse(format!("integer out of range: {}", pair.as_str()))),
        Rule::symbol => Ok(Form::Symbol(pair.as_str().to_string())),
        other => Err(SchemaError::Parse(format!("unexpected rule {:?}", other))),
    }
}

fn parse_hex(s: &str) -> Result<i64, SchemaError> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let digits = &digits[2..];
    let n = u64::from_str_radix(digits, 16)
        .map_err(|_| SchemaError::Parse(format!("invalid hex literal: {}", s)))?;
    // Register masks like 0xFFFFFFFFFFFFFFFF keep their bit pattern.
    let n = n as i64;
    Ok(if negative { n.wrapping_neg() } else { n })
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

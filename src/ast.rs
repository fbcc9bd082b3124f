//! Syntax tree for the schema language: atoms and lists as read from source.

use std::fmt;

/// One node of the symbolic-expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Symbol(String),
    List(Vec<Form>),
}

impl Form {
    pub fn symbol(name: &str) -> Self {
        Form::Symbol(name.to_string())
    }

    /// `'x` sugar.
    pub fn quoted(inner: Form) -> Self {
        Form::List(vec![Form::symbol("quote"), inner])
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Form::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Form]> {
        match self {
            Form::List(items) => Some(items),
            _ => None,
        }
    }

    /// A non-empty list, i.e. something that is a call rather than an atom.
    pub fn is_compound(&self) -> bool {
        matches!(self, Form::List(items) if !items.is_empty())
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Form::Int(_) => "integer",
            Form::Float(_) => "float",
            Form::Str(_) => "string",
            Form::Bool(_) => "boolean",
            Form::Symbol(_) => "symbol",
            Form::List(items) if items.is_empty() => "nil",
            Form::List(_) => "list",
        }
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Form::Int(n) => write!(f, "{}", n),
            Form::Float(x) => write!(f, "{:?}", x),
            Form::Str(s) => write!(f, "{:?}", s),
            Form::Bool(true) => write!(f, "#t"),
            Form::Bool(false) => write!(f, "#f"),
            Form::Symbol(s) => write!(f, "{}", s),
            Form::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

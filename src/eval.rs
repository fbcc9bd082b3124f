//! The evaluator hosting the schema builders.
//!
//! Primitives receive their argument forms unevaluated and evaluate what they
//! need themselves; the evaluator only checks arity before dispatching. Every
//! call carries the [`BuilderContext`] of the top-level form being evaluated.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use tracing::trace;

use crate::ast::Form;
use crate::builder::{self, BuilderContext};
use crate::dump;
use crate::env::{Env, Frame};
use crate::error::SchemaError;
use crate::fixed;
use crate::parser::parse;
use crate::schema::{Device, Structure, TypeRegistry};
use crate::value::Value;

pub type PrimitiveFn =
    fn(&mut Interpreter, &[Form], &Env, &mut BuilderContext) -> Result<Value, SchemaError>;

/// Accepted argument counts of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Between(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(k) => n == k,
            Arity::AtLeast(k) => n >= k,
            Arity::Between(lo, hi) => n >= lo && n <= hi,
            Arity::Any => true,
        }
    }

    fn describe(self) -> String {
        match self {
            Arity::Exact(k) => k.to_string(),
            Arity::AtLeast(k) => format!("at least {}", k),
            Arity::Between(lo, hi) => format!("{} to {}", lo, hi),
            Arity::Any => "any number of".to_string(),
        }
    }
}

#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub func: PrimitiveFn,
}

pub struct Interpreter {
    global: Env,
    primitives: HashMap<&'static str, Primitive>,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter whose dump output goes to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter writing dump output to `out`.
    pub fn with_output(out: Box<dyn Write>) -> Self {
        let mut interp = Interpreter {
            global: Frame::global(),
            primitives: HashMap::new(),
            out,
        };
        register_core(&mut interp);
        builder::register(&mut interp);
        fixed::register(&mut interp);
        dump::register(&mut interp);
        interp
    }

    pub fn register(&mut self, name: &'static str, arity: Arity, func: PrimitiveFn) {
        self.primitives.insert(name, Primitive { name, arity, func });
    }

    pub fn global(&self) -> &Env {
        &self.global
    }

    pub(crate) fn output(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }

    pub fn lookup_structure(&self, name: &str) -> Option<Rc<Structure>> {
        self.global.lookup_structure(name)
    }

    pub fn lookup_device(&self, name: &str) -> Option<Rc<Device>> {
        self.global.lookup_device(name)
    }

    /// Evaluate every top-level form of `source` in the global environment,
    /// each with its own builder context. Returns the last value.
    pub fn load_str(&mut self, source: &str) -> Result<Value, SchemaError> {
        let forms = parse(source)?;
        let env = Rc::clone(&self.global);
        let mut last = Value::Nil;
        for form in &forms {
            let mut ctx = BuilderContext::default();
            last = self.eval(form, &env, &mut ctx)?;
        }
        Ok(last)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<Value, SchemaError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        self.load_str(&source)
    }

    pub fn eval(
        &mut self,
        form: &Form,
        env: &Env,
        ctx: &mut BuilderContext,
    ) -> Result<Value, SchemaError> {
        match form {
            Form::Int(n) => Ok(Value::Int(*n)),
            Form::Float(x) => Ok(Value::Float(*x)),
            Form::Str(s) => Ok(Value::Str(s.clone())),
            Form::Bool(b) => Ok(Value::Bool(*b)),
            Form::Symbol(name) => env
                .lookup(name)
                .ok_or_else(|| SchemaError::Unbound(name.clone())),
            Form::List(items) => {
                let (head, args) = match items.split_first() {
                    Some(split) => split,
                    None => return Ok(Value::Nil),
                };
                let name = head
                    .as_symbol()
                    .ok_or_else(|| SchemaError::NotCallable(head.to_string()))?;
                let prim = *self
                    .primitives
                    .get(name)
                    .ok_or_else(|| SchemaError::NotCallable(name.to_string()))?;
                if !prim.arity.accepts(args.len()) {
                    return Err(SchemaError::Arity {
                        name: prim.name.to_string(),
                        expected: prim.arity.describe(),
                        found: args.len(),
                    });
                }
                trace!(primitive = prim.name, args = args.len(), "apply");
                (prim.func)(self, args, env, ctx)
            }
        }
    }

    pub fn eval_args(
        &mut self,
        args: &[Form],
        env: &Env,
        ctx: &mut BuilderContext,
    ) -> Result<Vec<Value>, SchemaError> {
        args.iter().map(|a| self.eval(a, env, ctx)).collect()
    }
}

fn register_core(interp: &mut Interpreter) {
    interp.register("quote", Arity::Exact(1), prim_quote);
    interp.register("if", Arity::Between(2, 3), prim_if);
    interp.register("and", Arity::Any, prim_and);
    interp.register("or", Arity::Any, prim_or);
    interp.register("not", Arity::Exact(1), prim_not);
    interp.register("define", Arity::Exact(2), prim_define);
    interp.register("list", Arity::Any, prim_list);
    interp.register("+", Arity::Any, prim_add);
    interp.register("-", Arity::AtLeast(1), prim_sub);
    interp.register("*", Arity::Any, prim_mul);
    interp.register("/", Arity::AtLeast(1), prim_div);
    interp.register("%", Arity::Exact(2), prim_rem);
    interp.register("=", Arity::AtLeast(2), prim_eq);
    interp.register("<", Arity::AtLeast(2), prim_lt);
    interp.register(">", Arity::AtLeast(2), prim_gt);
    interp.register("<=", Arity::AtLeast(2), prim_le);
    interp.register(">=", Arity::AtLeast(2), prim_ge);
}

fn prim_quote(
    _: &mut Interpreter,
    args: &[Form],
    _: &Env,
    _: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    Ok(Value::from_form(&args[0]))
}

fn prim_if(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    if interp.eval(&args[0], env, ctx)?.is_truthy() {
        interp.eval(&args[1], env, ctx)
    } else {
        match args.get(2) {
            Some(otherwise) => interp.eval(otherwise, env, ctx),
            None => Ok(Value::Nil),
        }
    }
}

fn prim_and(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let mut last = Value::Bool(true);
    for a in args {
        last = interp.eval(a, env, ctx)?;
        if !last.is_truthy() {
            break;
        }
    }
    Ok(last)
}

fn prim_or(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    for a in args {
        let v = interp.eval(a, env, ctx)?;
        if v.is_truthy() {
            return Ok(v);
        }
    }
    Ok(Value::Bool(false))
}

fn prim_not(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    Ok(Value::Bool(!interp.eval(&args[0], env, ctx)?.is_truthy()))
}

fn prim_define(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let name = args[0].as_symbol().ok_or_else(|| SchemaError::InvalidName {
        form: "define",
        found: args[0].describe().to_string(),
    })?;
    let value = interp.eval(&args[1], env, ctx)?;
    env.define(name, value.clone());
    Ok(value)
}

fn prim_list(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let items = interp.eval_args(args, env, ctx)?;
    Ok(if items.is_empty() {
        Value::Nil
    } else {
        Value::List(items)
    })
}

fn require_number(context: &str, v: Value) -> Result<Value, SchemaError> {
    if v.is_number() {
        Ok(v)
    } else {
        Err(SchemaError::type_error(context, "numeric arguments", v.kind()))
    }
}

fn fold_numeric(
    name: &str,
    init: Value,
    rest: Vec<Value>,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, SchemaError> {
    let mut acc = require_number(name, init)?;
    for v in rest {
        let v = require_number(name, v)?;
        acc = match (&acc, &v) {
            (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
                .map(Value::Int)
                .ok_or_else(|| SchemaError::Eval(format!("{}: division by zero or overflow", name)))?,
            _ => Value::Float(float_op(
                acc.as_f64().unwrap_or_default(),
                v.as_f64().unwrap_or_default(),
            )),
        };
    }
    Ok(acc)
}

fn prim_add(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let vals = interp.eval_args(args, env, ctx)?;
    fold_numeric("+", Value::Int(0), vals, i64::checked_add, |a, b| a + b)
}

fn prim_mul(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let vals = interp.eval_args(args, env, ctx)?;
    fold_numeric("*", Value::Int(1), vals, i64::checked_mul, |a, b| a * b)
}

fn prim_sub(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let mut vals = interp.eval_args(args, env, ctx)?;
    let init = if vals.len() == 1 {
        Value::Int(0)
    } else {
        vals.remove(0)
    };
    fold_numeric("-", init, vals, i64::checked_sub, |a, b| a - b)
}

fn prim_div(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let mut vals = interp.eval_args(args, env, ctx)?;
    let init = if vals.len() == 1 {
        Value::Int(1)
    } else {
        vals.remove(0)
    };
    fold_numeric("/", init, vals, i64::checked_div, |a, b| a / b)
}

fn prim_rem(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let mut vals = interp.eval_args(args, env, ctx)?;
    let init = vals.remove(0);
    fold_numeric("%", init, vals, i64::checked_rem, |a, b| a % b)
}

fn compare_chain(
    name: &str,
    vals: &[Value],
    accept: fn(Ordering) -> bool,
) -> Result<Value, SchemaError> {
    for pair in vals.windows(2) {
        let ord = match (&pair[0], &pair[1]) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) if name == "=" => Some(a.cmp(b)),
            (a, b) if a.is_number() && b.is_number() => {
                a.as_f64().unwrap_or_default().partial_cmp(&b.as_f64().unwrap_or_default())
            }
            (a, b) => {
                let offender = if a.is_number() { b } else { a };
                return Err(SchemaError::type_error(name, "numeric arguments", offender.kind()));
            }
        };
        match ord {
            Some(o) if accept(o) => {}
            _ => return Ok(Value::Bool(false)),
        }
    }
    Ok(Value::Bool(true))
}

macro_rules! comparison {
    ($fn_name:ident, $sym:literal, $accept:expr) => {
        fn $fn_name(
            interp: &mut Interpreter,
            args: &[Form],
            env: &Env,
            ctx: &mut BuilderContext,
        ) -> Result<Value, SchemaError> {
            let vals = interp.eval_args(args, env, ctx)?;
            compare_chain($sym, &vals, $accept)
        }
    };
}

comparison!(prim_eq, "=", |o| o == Ordering::Equal);
comparison!(prim_lt, "<", |o| o == Ordering::Less);
comparison!(prim_gt, ">", |o| o == Ordering::Greater);
comparison!(prim_le, "<=", |o| o != Ordering::Greater);
comparison!(prim_ge, ">=", |o| o != Ordering::Less);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn eval_str(src: &str) -> Result<Value, SchemaError> {
        Interpreter::new().load_str(src)
    }

    #[test]
    fn arithmetic_and_comparisons() {
        assert_eq!(eval_str("(+ 1 2 3)").unwrap().as_i64(), Some(6));
        assert_eq!(eval_str("(- 5)").unwrap().as_i64(), Some(-5));
        assert_eq!(eval_str("(- 10 3 2)").unwrap().as_i64(), Some(5));
        assert_eq!(eval_str("(* 2 2.5)").unwrap().as_f64(), Some(5.0));
        assert_eq!(eval_str("(% 7 4)").unwrap().as_i64(), Some(3));
        assert!(eval_str("(<= 1 2 2)").unwrap().is_truthy());
        assert!(!eval_str("(< 3 2)").unwrap().is_truthy());
        assert!(eval_str("(= \"a\" \"a\")").unwrap().is_truthy());
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let err = eval_str("(/ 1 0)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Evaluation);
    }

    #[test]
    fn define_then_reference() {
        let v = eval_str("(define limit 10) (if (> limit 5) 'big 'small)").unwrap();
        assert!(matches!(v, Value::Symbol(ref s) if s == "big"));
    }

    #[test]
    fn and_or_short_circuit() {
        // The unbound symbol is never evaluated.
        assert!(!eval_str("(and #f undefined-thing)").unwrap().is_truthy());
        assert_eq!(eval_str("(or nil 7 undefined-thing)").unwrap().as_i64(), Some(7));
    }

    #[test]
    fn generic_arity_check() {
        let err = eval_str("(not 1 2)").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Arity);
    }

    #[test]
    fn unknown_head_and_unbound_symbol() {
        assert_eq!(eval_str("(frobnicate 1)").unwrap_err().kind(), ErrorKind::Evaluation);
        assert_eq!(eval_str("missing").unwrap_err().kind(), ErrorKind::Evaluation);
    }

    #[test]
    fn non_numeric_comparison_fails() {
        let err = eval_str("(< 1 \"x\")").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }
}

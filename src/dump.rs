//! Human-readable listings of structures (`dump-struct`, `dump-expanded`).

use std::io::Write;

use crate::ast::Form;
use crate::builder::BuilderContext;
use crate::env::Env;
use crate::error::SchemaError;
use crate::eval::{Arity, Interpreter};
use crate::schema::{Field, Structure, TypeRegistry};
use crate::value::Value;

/// Expansion stops here; a redefined structure can name itself.
const MAX_EXPAND_DEPTH: usize = 32;

impl Structure {
    /// Header line plus one line per field.
    pub fn dump_lines(&self) -> Vec<String> {
        let mut lines = vec![header_line(self)];
        for f in &self.fields {
            lines.push(field_line(&format!("{}.{}", self.name, f.name), f));
        }
        lines
    }

    /// Like [`Structure::dump_lines`], but structure-typed fields are replaced
    /// by the leaf fields of the structure they name.
    pub fn dump_expanded_lines(&self, registry: &dyn TypeRegistry) -> Vec<String> {
        let mut lines = vec![header_line(self)];
        expand_into(&mut lines, &self.name, self, registry, 0);
        lines
    }
}

fn header_line(s: &Structure) -> String {
    format!("struct {} ({} bytes)", s.name, s.size_bytes())
}

fn field_line(qualified: &str, f: &Field) -> String {
    let mut line = format!("{} {}", qualified, f.type_name);
    if f.repeat_count != 1 {
        line.push_str(&format!("x{}", f.repeat_count));
    }
    line.push_str(&format!(" {} bytes", f.total_size()));
    if let Some(r) = &f.valid_range {
        line.push_str(&format!(" range={}", r));
    }
    if let Some(vs) = &f.valid_values {
        line.push_str(&format!(" values={:?}", vs.values()));
    }
    if f.deferred_validation.is_some() {
        line.push_str(" deferred");
    }
    if f.to_json.is_some() {
        line.push_str(" to-json");
    }
    if f.from_json.is_some() {
        line.push_str(" from-json");
    }
    line
}

fn expand_into(
    lines: &mut Vec<String>,
    prefix: &str,
    s: &Structure,
    registry: &dyn TypeRegistry,
    depth: usize,
) {
    for f in &s.fields {
        let qualified = format!("{}.{}", prefix, f.name);
        let nested = match f.primitive() {
            Some(_) => None,
            None if depth < MAX_EXPAND_DEPTH => registry.lookup_structure(&f.type_name),
            None => None,
        };
        match nested {
            Some(inner) if f.repeat_count == 1 => {
                expand_into(lines, &qualified, &inner, registry, depth + 1)
            }
            Some(inner) => {
                for i in 0..f.repeat_count {
                    let element = format!("{}[{}]", qualified, i);
                    expand_into(lines, &element, &inner, registry, depth + 1);
                }
            }
            None => lines.push(field_line(&qualified, f)),
        }
    }
}

pub(crate) fn register(interp: &mut Interpreter) {
    interp.register("dump-struct", Arity::Exact(1), prim_dump_struct);
    interp.register("dump-expanded", Arity::Exact(1), prim_dump_expanded);
}

fn structure_arg(
    interp: &mut Interpreter,
    name: &'static str,
    form: &Form,
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<std::rc::Rc<Structure>, SchemaError> {
    match interp.eval(form, env, ctx)? {
        Value::Structure(s) => Ok(s),
        other => Err(SchemaError::type_error(name, "a structure", other.kind())),
    }
}

fn write_lines(interp: &mut Interpreter, lines: &[String]) -> Result<(), SchemaError> {
    let out = interp.output();
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()?;
    Ok(())
}

fn prim_dump_struct(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let s = structure_arg(interp, "dump-struct", &args[0], env, ctx)?;
    write_lines(interp, &s.dump_lines())?;
    Ok(Value::Nil)
}

fn prim_dump_expanded(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let s = structure_arg(interp, "dump-expanded", &args[0], env, ctx)?;
    let lines = s.dump_expanded_lines(&**env);
    write_lines(interp, &lines)?;
    Ok(Value::Nil)
}

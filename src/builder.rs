//! Builders for `def-device`, `def-struct`, `def-field`, `def-api` and the
//! field modifiers.
//!
//! Definitions nest: a device body evaluates structure definitions, a
//! structure body evaluates field definitions, and a field body evaluates
//! modifiers. Modifiers return nothing useful; they mutate the field that is
//! current in the [`BuilderContext`]. Each builder installs its entity in the
//! context before evaluating its body and restores the outer one afterwards,
//! whether the body succeeded or not.
//!
//! A body form that evaluates to something the enclosing definition cannot
//! hold aborts the whole definition with
//! [`ErrorKind::UnexpectedForm`](crate::ErrorKind::UnexpectedForm); nothing
//! partial is bound. Structures defined inside a device are bound only once
//! the device is complete; until then field types resolve against the device
//! under construction first.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::ast::Form;
use crate::env::Env;
use crate::error::SchemaError;
use crate::eval::{Arity, Interpreter};
use crate::schema::{
    ApiDescriptor, Deferred, Device, Field, Range, Structure, TypeRegistry, ValueSet, MAX_REPEAT,
    MAX_SIZE_BYTES,
};
use crate::value::Value;

/// Entities under construction at the current nesting depth.
#[derive(Debug, Default)]
pub struct BuilderContext {
    pub device: Option<Device>,
    pub structure: Option<Structure>,
    pub field: Option<Field>,
}

impl BuilderContext {
    /// The field modifiers apply to.
    pub fn current_field(&mut self, modifier: &'static str) -> Result<&mut Field, SchemaError> {
        self.field
            .as_mut()
            .ok_or(SchemaError::NoCurrentField { modifier })
    }
}

pub(crate) fn register(interp: &mut Interpreter) {
    interp.register("def-device", Arity::Any, def_device);
    interp.register("def-struct", Arity::Any, def_struct);
    interp.register("def-field", Arity::Any, def_field);
    interp.register("def-api", Arity::Any, def_api);
    interp.register("range", Arity::Exact(2), def_range);
    interp.register("values", Arity::AtLeast(1), def_values);
    interp.register("deferred-validation", Arity::AtLeast(1), def_deferred_validation);
    interp.register("repeat", Arity::Exact(1), def_repeat);
    interp.register("to-json", Arity::Exact(1), def_to_json);
    interp.register("from-json", Arity::Exact(1), def_from_json);
}

fn definition_name<'a>(form: &'static str, args: &'a [Form]) -> Result<&'a str, SchemaError> {
    let first = args.first().ok_or_else(|| SchemaError::InvalidName {
        form,
        found: "nothing".to_string(),
    })?;
    first.as_symbol().ok_or_else(|| SchemaError::InvalidName {
        form,
        found: first.describe().to_string(),
    })
}

fn def_device(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let name = definition_name("device", args)?;
    let body = &args[1..];
    if body.is_empty() {
        return Err(SchemaError::EmptyBody {
            form: "device",
            name: name.to_string(),
            expected: "structure",
        });
    }

    let outer = ctx.device.replace(Device::new(name));
    let built = device_body(interp, body, env, ctx);
    let device = std::mem::replace(&mut ctx.device, outer);
    built?;
    let device = device.ok_or_else(|| SchemaError::Eval("device context lost".to_string()))?;
    ctx.structure = None;

    debug!(
        device = %device.name,
        structures = device.structures.len(),
        apis = device.apis.len(),
        "Defined device"
    );
    let device = Rc::new(device);
    // A device nested in another definition is rejected by its parent, so
    // only a top-level device publishes anything.
    if ctx.device.is_none() {
        for s in &device.structures {
            env.define(&s.name, Value::Structure(Rc::clone(s)));
        }
        env.define(name, Value::Device(Rc::clone(&device)));
    }
    Ok(Value::Device(device))
}

fn device_body(
    interp: &mut Interpreter,
    body: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<(), SchemaError> {
    for form in body {
        let thing = interp.eval(form, env, ctx)?;
        let device = ctx
            .device
            .as_mut()
            .ok_or_else(|| SchemaError::Eval("device context lost".to_string()))?;
        match thing {
            Value::Structure(s) => device.add_structure(s),
            Value::Api(api) => device.add_api(api),
            other => {
                return Err(SchemaError::UnexpectedForm {
                    context: format!("device {}", device.name),
                    expected: "structure or api declaration",
                    found: other.kind(),
                })
            }
        }
    }
    Ok(())
}

fn def_struct(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let name = definition_name("struct", args)?;
    let body = &args[1..];
    if body.is_empty() {
        return Err(SchemaError::EmptyBody {
            form: "struct",
            name: name.to_string(),
            expected: "field",
        });
    }

    let outer = ctx.structure.replace(Structure::new(name));
    let outer_field = ctx.field.take();
    let built = struct_body(interp, body, env, ctx);
    let structure = std::mem::replace(&mut ctx.structure, outer);
    ctx.field = outer_field;
    built?;
    let structure =
        structure.ok_or_else(|| SchemaError::Eval("structure context lost".to_string()))?;
    check_size(&format!("struct {}", structure.name), structure.size_bytes())?;

    debug!(
        structure = %structure.name,
        fields = structure.fields.len(),
        size = structure.size_bytes(),
        "Defined structure"
    );
    let value = Value::Structure(Rc::new(structure));
    if ctx.device.is_none() {
        env.define(name, value.clone());
    }
    Ok(value)
}

fn struct_body(
    interp: &mut Interpreter,
    body: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<(), SchemaError> {
    for form in body {
        let thing = interp.eval(form, env, ctx)?;
        let structure = ctx
            .structure
            .as_mut()
            .ok_or_else(|| SchemaError::Eval("structure context lost".to_string()))?;
        match thing {
            Value::Field(field) => structure.add_field(*field),
            other => {
                return Err(SchemaError::UnexpectedForm {
                    context: format!("struct {}", structure.name),
                    expected: "field declaration",
                    found: other.kind(),
                })
            }
        }
    }
    Ok(())
}

fn def_field(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let name = definition_name("field", args)?;
    let type_form = args.get(1).ok_or_else(|| SchemaError::EmptyBody {
        form: "field",
        name: name.to_string(),
        expected: "type",
    })?;
    let type_name = type_form.as_symbol().ok_or_else(|| SchemaError::InvalidType {
        type_name: type_form.to_string(),
    })?;
    let size = type_size(env, ctx, type_name).ok_or_else(|| SchemaError::InvalidType {
        type_name: type_name.to_string(),
    })?;

    // Modifiers mutate the current field, so it must exist before they run.
    let outer = ctx.field.replace(Field::new(name, type_name, size));
    let mut modified = Ok(());
    for form in &args[2..] {
        if let Err(e) = interp.eval(form, env, ctx) {
            modified = Err(e);
            break;
        }
    }
    let field = std::mem::replace(&mut ctx.field, outer);
    modified?;
    let field = field.ok_or_else(|| SchemaError::Eval("field context lost".to_string()))?;
    check_size(&format!("field {}", field.name), field.total_size())?;

    debug!(
        field = %field.name,
        ty = %field.type_name,
        size = field.size_bytes,
        repeat = field.repeat_count,
        "Defined field"
    );
    Ok(Value::Field(Box::new(field)))
}

/// Sibling structures of a device under construction are not bound yet.
fn type_size(env: &Env, ctx: &BuilderContext, type_name: &str) -> Option<usize> {
    ctx.device
        .as_ref()
        .and_then(|d| d.size_of(type_name))
        .or_else(|| env.size_of(type_name))
}

fn check_size(what: &str, size: usize) -> Result<(), SchemaError> {
    if size > MAX_SIZE_BYTES {
        return Err(SchemaError::TooLarge {
            what: format!("size of {}", what),
            found: format!("{} bytes", size),
            max: MAX_SIZE_BYTES,
        });
    }
    Ok(())
}

fn def_api(
    _: &mut Interpreter,
    args: &[Form],
    _: &Env,
    _: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let name = definition_name("api", args)?;
    let mut api = ApiDescriptor::new(name);
    for clause in &args[1..] {
        let (head, body) = match clause.as_list().and_then(|items| items.split_first()) {
            Some((head, body)) => (head.as_symbol(), body),
            None => (None, &[][..]),
        };
        match head {
            Some("read") => api.read = Some(body.to_vec()),
            Some("write") => api.write = Some(body.to_vec()),
            _ => {
                return Err(SchemaError::type_error(
                    format!("api {}", name),
                    "a (read ...) or (write ...) clause",
                    clause,
                ))
            }
        }
    }
    debug!(
        api = %api.structure,
        read = api.read.is_some(),
        write = api.write.is_some(),
        "Defined api"
    );
    Ok(Value::Api(Rc::new(api)))
}

fn numeric_arg(
    interp: &mut Interpreter,
    modifier: &'static str,
    form: &Form,
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let v = interp.eval(form, env, ctx)?;
    if v.is_number() {
        Ok(v)
    } else {
        Err(SchemaError::type_error(modifier, "numeric arguments", v.kind()))
    }
}

fn def_range(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let lo = numeric_arg(interp, "range", &args[0], env, ctx)?;
    let hi = numeric_arg(interp, "range", &args[1], env, ctx)?;
    let range = Range {
        lo: lo.as_u32().unwrap_or_default(),
        hi: hi.as_u32().unwrap_or_default(),
    };
    ctx.current_field("range")?.valid_range = Some(range);
    Ok(Value::Nil)
}

fn def_values(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    // A single argument may supply the whole list, e.g. (values (list 1 2)) or
    // a symbol bound to a previously computed list.
    let items = if args.len() == 1 {
        match interp.eval(&args[0], env, ctx)? {
            Value::List(items) => items,
            other if args[0].is_compound() => {
                return Err(SchemaError::type_error("values", "a list of numbers", other.kind()))
            }
            other => vec![other],
        }
    } else {
        interp.eval_args(args, env, ctx)?
    };

    let mut set = ValueSet::new();
    for item in &items {
        let v = item
            .as_u32()
            .ok_or_else(|| SchemaError::type_error("values", "numeric arguments", item.kind()))?;
        set.add_value(v);
    }
    ctx.current_field("values")?.valid_values = Some(set);
    Ok(Value::Nil)
}

fn def_deferred_validation(
    _: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let field = ctx.current_field("deferred-validation")?;
    if args.len() > 1 {
        warn!(field = %field.name, ignored = args.len() - 1, "deferred-validation uses only its first argument");
    }
    field.deferred_validation = Some(Deferred::capture(args[0].clone(), env));
    Ok(Value::Nil)
}

fn def_repeat(
    interp: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let n = numeric_arg(interp, "repeat", &args[0], env, ctx)?;
    let count = n
        .as_i64()
        .and_then(|c| usize::try_from(c).ok())
        .ok_or_else(|| SchemaError::type_error("repeat", "a non-negative count", &n))?;
    if count > MAX_REPEAT {
        return Err(SchemaError::TooLarge {
            what: "repeat count".to_string(),
            found: count.to_string(),
            max: MAX_REPEAT,
        });
    }
    ctx.current_field("repeat")?.repeat_count = count;
    Ok(Value::Nil)
}

fn transform_arg(modifier: &'static str, form: &Form, env: &Env) -> Result<Deferred, SchemaError> {
    if !form.is_compound() {
        return Err(SchemaError::type_error(modifier, "a list argument", form.describe()));
    }
    Ok(Deferred::capture(form.clone(), env))
}

fn def_to_json(
    _: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let transform = transform_arg("to-json", &args[0], env)?;
    ctx.current_field("to-json")?.to_json = Some(transform);
    Ok(Value::Nil)
}

fn def_from_json(
    _: &mut Interpreter,
    args: &[Form],
    env: &Env,
    ctx: &mut BuilderContext,
) -> Result<Value, SchemaError> {
    let transform = transform_arg("from-json", &args[0], env)?;
    ctx.current_field("from-json")?.from_json = Some(transform);
    Ok(Value::Nil)
}

//! Special forms. Each handler receives the unevaluated operands and decides itself what
//! to evaluate.

use super::{Bindings, eval, eval_body};
use crate::Error;
use crate::ast::{Dict, Kind, Lambda, LambdaRec, Value, kw};
use crate::env::Env;
use std::rc::Rc;
use tracing::debug;

pub(crate) type SpecialForm = fn(&mut Bindings, &[Value]) -> Result<Value, Error>;

/// Names reserved by the special forms, in dispatch order
pub const SPECIAL_FORMS: &[&str] = &["fn", "quote", "def", "def-rec", "do", "if", "cond", "module"];

pub(crate) fn find_special_form(name: &str) -> Option<SpecialForm> {
    let form: SpecialForm = match name {
        "fn" => eval_fn,
        "quote" => eval_quote,
        "def" => eval_def,
        "def-rec" => eval_def_rec,
        "do" => eval_do,
        "if" => eval_if,
        "cond" => eval_cond,
        "module" => eval_module,
        _ => return None,
    };
    Some(form)
}

/// `(fn [params] body...)`: a closure over the current environment, frozen
fn eval_fn(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    let [param_vector, bodies @ ..] = args else {
        return Err(Error::special_form("fn", "need an argument vector and a body"));
    };
    if bodies.is_empty() {
        return Err(Error::special_form("fn", "need an argument vector and a body"));
    }
    let Value::Vector(param_vector) = param_vector else {
        return Err(Error::special_form(
            "fn",
            "first argument must be a vector of argument atoms",
        ));
    };

    let mut params: Vec<String> = Vec::with_capacity(param_vector.len());
    for param in param_vector.iter() {
        let Value::Atom(name) = param else {
            return Err(Error::special_form("fn", "one of the arguments was not an atom"));
        };
        if params.contains(name) {
            return Err(Error::special_form(
                "fn",
                format!("duplicate parameter name: {name}"),
            ));
        }
        params.push(name.clone());
    }

    Ok(Value::Lambda(Rc::new(Lambda {
        params,
        bodies: bodies.to_vec(),
        env: bindings.env().freeze(),
    })))
}

fn eval_quote(_: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    match args {
        [expr] => Ok(expr.clone()),
        _ => Err(Error::arity("quote", 1, args.len())),
    }
}

/// Shared operand checks of `def` and `def-rec`
fn definition<'a>(form: &str, args: &'a [Value]) -> Result<(&'a str, &'a Value), Error> {
    match args {
        [Value::Atom(name), expr] => Ok((name, expr)),
        [_, _] => Err(Error::special_form(form, "expects atom for first arg")),
        _ => Err(Error::arity(form, 2, args.len())),
    }
}

fn eval_def(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    let (name, expr) = definition("def", args)?;
    let value = eval(bindings, expr)?;
    debug!(ident = name, kind = %value.kind(), "def");
    bindings.define(name, value);
    Ok(Value::Null)
}

/// `(def-rec name expr)`: `expr` must build a new (non-recursive) lambda. A lambda that is
/// still shared once `expr` has finished is reachable under another name, so binding it
/// would be an alias and is rejected.
fn eval_def_rec(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    let (name, expr) = definition("def-rec", args)?;
    let value = eval(bindings, expr)?;
    let lambda = match value {
        Value::Lambda(lambda) => Rc::try_unwrap(lambda)
            .map_err(|_| Error::special_form("def-rec", "cannot be used to alias functions"))?,
        Value::LambdaRec(_) => {
            return Err(Error::special_form("def-rec", "cannot be used to alias functions"));
        }
        _ => {
            return Err(Error::special_form(
                "def-rec",
                "can only be used to define functions",
            ));
        }
    };
    debug!(ident = name, params = ?lambda.params, "def-rec");
    let rec = LambdaRec {
        name: name.to_owned(),
        lambda,
    };
    bindings.define(name, Value::LambdaRec(Rc::new(rec)));
    Ok(Value::Null)
}

fn eval_do(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    eval_body(bindings, args)
}

/// Only `#f` selects the else branch
fn eval_if(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    match args {
        [condition, then_expr, else_expr] => {
            if eval(bindings, condition)?.is_truthy() {
                eval(bindings, then_expr)
            } else {
                eval(bindings, else_expr)
            }
        }
        _ => Err(Error::arity("if", 3, args.len())),
    }
}

fn eval_cond(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    if args.len() % 2 != 0 {
        return Err(Error::arity("cond", args.len() + 1, args.len()));
    }
    for clause in args.chunks_exact(2) {
        if let [test, result] = clause
            && eval(bindings, test)?.is_truthy()
        {
            return eval(bindings, result);
        }
    }
    Ok(Value::Null)
}

/// Validated `module` metadata
struct ModuleMeta {
    name: String,
    doc: String,
    exports: Vec<String>,
}

fn module_meta(meta: &Value) -> Result<ModuleMeta, Error> {
    let dict = meta
        .as_dict()
        .ok_or_else(|| Error::invalid_declaration("must be dict", meta))?;

    let name = meta_field(dict, meta, "module", Kind::Atom)?
        .as_atom()
        .unwrap_or_default()
        .to_owned();
    let doc = match meta_field(dict, meta, "doc", Kind::String)? {
        Value::String(doc) => doc.clone(),
        _ => String::new(),
    };
    let exports = match meta_field(dict, meta, "exports", Kind::Vector)? {
        Value::Vector(items) => items
            .iter()
            .map(|item| match item {
                Value::Atom(export) => Ok(export.clone()),
                _ => Err(Error::invalid_declaration(
                    ":exports must be a vector of atoms",
                    meta,
                )),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(ModuleMeta { name, doc, exports })
}

/// The value under `:key`, required to be of `kind`
fn meta_field<'a>(dict: &'a Dict, meta: &Value, key: &str, kind: Kind) -> Result<&'a Value, Error> {
    let value = dict
        .get(&kw(key))
        .ok_or_else(|| Error::invalid_declaration(format!("missing :{key} key"), meta))?;
    if value.kind() == kind {
        Ok(value)
    } else {
        Err(Error::invalid_declaration(
            format!(":{key} must be {} {kind}", article(kind)),
            meta,
        ))
    }
}

fn article(kind: Kind) -> &'static str {
    match kind {
        Kind::Atom => "an",
        _ => "a",
    }
}

/// `(module metadata body...)`.
///
/// The body runs in a mutable copy of the entering environment, each form seeing the
/// definitions of the ones before it. The caller's environment is left as it was; store
/// writes made by the body are kept.
fn eval_module(bindings: &mut Bindings, args: &[Value]) -> Result<Value, Error> {
    let [metadata, body @ ..] = args else {
        return Err(Error::arity("module", 1, 0));
    };
    let meta = eval(bindings, metadata)?;
    let meta = module_meta(&meta)?;

    let scope = Env::Mutable(bindings.env().thaw());
    let module_env = bindings.with_env(scope, |inner| {
        for form in body {
            eval(inner, form)?;
        }
        Ok::<_, Error>(std::mem::take(inner.env_mut()))
    })?;

    let missing: Vec<String> = meta
        .exports
        .iter()
        .filter(|export| module_env.get(export).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(Error::UndefinedExports(missing));
    }

    debug!(module = %meta.name, exports = ?meta.exports, "module defined");

    let exports: Vec<Value> = meta.exports.into_iter().map(Value::Atom).collect();
    let mut result = Dict::with_capacity(4);
    result.insert(kw("module"), Value::Atom(meta.name));
    result.insert(kw("doc"), Value::String(meta.doc));
    result.insert(kw("env"), Value::Env(Rc::new(Env::Mutable(module_env.thaw()))));
    result.insert(kw("exports"), Value::Vector(Rc::new(exports)));
    Ok(Value::Dict(Rc::new(result)))
}

//! Evaluation of values against a [`Bindings`].
//!
//! [`State`] is the pure half (environment and reference store). [`Bindings`] adds the
//! capability table. Evaluation threads a `&mut Bindings`: definitions update its
//! environment, `ref`/`write-ref` update its store, and lambda calls swap in the closure
//! scope for the duration of the call.

use crate::ast::{Dict, Lambda, Value};
use crate::{Error, MAX_EVAL_DEPTH};
use crate::builtinops::PrimitiveTable;
use crate::env::Env;
use crate::refs::RefStore;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

mod special_forms;

pub use special_forms::SPECIAL_FORMS;

/// Serializable evaluation state: an environment and a reference store.
///
/// A `State` carries no capability of its own; it only becomes executable when attached to
/// a [`Bindings`] (see `base-eval`).
#[derive(Clone, Default, PartialEq)]
pub struct State {
    pub env: Env,
    pub refs: RefStore,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State {{ env: {}, refs: {} }}", self.env, self.refs.len())
    }
}

/// A [`State`] plus the capability table that decides which primitives are reachable.
#[derive(Clone)]
pub struct Bindings {
    env: Env,
    refs: RefStore,
    primitives: Rc<PrimitiveTable>,
    depth: usize,
}

impl Bindings {
    pub fn new(env: Env, primitives: PrimitiveTable, refs: RefStore) -> Self {
        Bindings {
            env,
            refs,
            primitives: Rc::new(primitives),
            depth: 0,
        }
    }

    /// Empty environment, empty store and the full shipped catalog
    pub fn pure() -> Self {
        Bindings::with_table(PrimitiveTable::pure())
    }

    /// Empty environment and store with a host-chosen table
    pub fn with_table(primitives: PrimitiveTable) -> Self {
        Bindings::new(Env::default(), primitives, RefStore::new())
    }

    /// Attach a state to an existing capability table
    pub fn from_state(state: State, primitives: Rc<PrimitiveTable>) -> Self {
        Bindings {
            env: state.env,
            refs: state.refs,
            primitives,
            depth: 0,
        }
    }

    /// Bindings for a nested evaluation of `state` under the same table; the evaluation
    /// depth carries over.
    pub(crate) fn nested(&self, state: State) -> Self {
        Bindings {
            depth: self.depth,
            ..Bindings::from_state(state, self.primitives_handle())
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn primitives(&self) -> &PrimitiveTable {
        &self.primitives
    }

    /// Bind `name` in the current environment
    pub fn define(&mut self, name: &str, value: Value) {
        self.env.define(name.to_owned(), value);
    }

    /// Reify as a pure state: frozen environment and a copy of the store
    pub fn to_state(&self) -> State {
        State {
            env: Env::Persistent(self.env.freeze()),
            refs: self.refs.clone(),
        }
    }

    /// Detach the state, dropping the capability table
    pub fn into_state(self) -> State {
        State {
            env: self.env,
            refs: self.refs,
        }
    }

    pub(crate) fn primitives_handle(&self) -> Rc<PrimitiveTable> {
        Rc::clone(&self.primitives)
    }

    pub(crate) fn refs_mut(&mut self) -> &mut RefStore {
        &mut self.refs
    }

    pub(crate) fn env_mut(&mut self) -> &mut Env {
        &mut self.env
    }

    /// Run `f` with `env` installed, then put the previous environment back.
    /// Store writes made by `f` are kept.
    pub(crate) fn with_env<T>(&mut self, env: Env, f: impl FnOnce(&mut Self) -> T) -> T {
        let outer = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = outer;
        result
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("env", &format_args!("{}", self.env))
            .field("refs", &self.refs.len())
            .field("primitives", &self.primitives.len())
            .finish()
    }
}

/// Evaluate an expression, updating `bindings` with its effects.
///
/// Nesting deeper than [`MAX_EVAL_DEPTH`] evaluations fails with an `Other` error.
pub fn eval(bindings: &mut Bindings, expr: &Value) -> Result<Value, Error> {
    if bindings.depth >= MAX_EVAL_DEPTH {
        return Err(Error::other(
            "eval",
            format!("evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"),
        ));
    }
    bindings.depth += 1;
    let result = eval_expr(bindings, expr);
    bindings.depth -= 1;
    result
}

fn eval_expr(bindings: &mut Bindings, expr: &Value) -> Result<Value, Error> {
    match expr {
        Value::Atom(name) => eval_atom(bindings, name),

        Value::List(list) => {
            let Some(head) = list.first() else {
                return Err(Error::arity("application", 2, 0));
            };
            let operands: Vec<Value> = list.iter().skip(1).cloned().collect();

            if let Value::Atom(name) = head
                && let Some(form) = special_forms::find_special_form(name)
            {
                return form(bindings, &operands);
            }

            let func = eval(bindings, head)?;
            let args = eval_args(bindings, &operands)?;
            apply(bindings, &func, args)
        }

        Value::Vector(items) => Ok(Value::Vector(Rc::new(eval_args(bindings, items)?))),

        // Keys then values, in insertion order
        Value::Dict(dict) => {
            let mut out = Dict::with_capacity(dict.len());
            for (key, value) in dict.iter() {
                let key = eval(bindings, key)?;
                let value = eval(bindings, value)?;
                out.insert(key, value);
            }
            Ok(Value::Dict(Rc::new(out)))
        }

        // Self-evaluating forms
        Value::Keyword(_)
        | Value::String(_)
        | Value::Number(_)
        | Value::Bool(_)
        | Value::Null
        | Value::Lambda(_)
        | Value::LambdaRec(_)
        | Value::PrimFn(_)
        | Value::Ref(_)
        | Value::Env(_)
        | Value::State(_) => Ok(expr.clone()),
    }
}

/// Primitives are referenced, not invoked; the capability table is consulted before the
/// lexical environment.
fn eval_atom(bindings: &Bindings, name: &str) -> Result<Value, Error> {
    if bindings.primitives.contains(name) {
        return Ok(Value::PrimFn(name.to_owned()));
    }
    bindings
        .env
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnknownIdentifier(name.to_owned()))
}

/// Evaluate expressions left to right, threading bindings
fn eval_args(bindings: &mut Bindings, exprs: &[Value]) -> Result<Vec<Value>, Error> {
    exprs.iter().map(|expr| eval(bindings, expr)).collect()
}

/// Evaluate body forms in sequence; the last value is the result
pub(crate) fn eval_body(bindings: &mut Bindings, bodies: &[Value]) -> Result<Value, Error> {
    let mut result = Value::Null;
    for body in bodies {
        result = eval(bindings, body)?;
    }
    Ok(result)
}

/// Call `func` with already evaluated arguments
pub fn apply(bindings: &mut Bindings, func: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match func {
        Value::Lambda(lambda) => call_lambda(bindings, lambda, args),
        Value::LambdaRec(rec) => {
            trace!(name = %rec.name, "unrolling recursive lambda");
            call_lambda(bindings, &rec.unroll(), args)
        }
        Value::PrimFn(name) => {
            let primitive = bindings.primitives.get(name).cloned().ok_or_else(|| {
                Error::impossible(name, "primitive is not in the capability table")
            })?;
            primitive.call(bindings, args)
        }
        other => Err(Error::NonFunctionCalled(other.clone())),
    }
}

fn call_lambda(bindings: &mut Bindings, lambda: &Lambda, args: Vec<Value>) -> Result<Value, Error> {
    if lambda.params.len() != args.len() {
        return Err(Error::arity("lambda", lambda.params.len(), args.len()));
    }
    trace!(params = ?lambda.params, "calling lambda");

    let scope = lambda
        .params
        .iter()
        .cloned()
        .zip(args)
        .fold(lambda.env.clone(), |env, (param, arg)| env.set(param, arg));

    bindings.with_env(Env::Persistent(scope), |inner| {
        eval_body(inner, &lambda.bodies)
    })
}

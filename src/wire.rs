//! Serde envelope for moving values across a process or storage boundary.
//!
//! Every variant is written as `{"type": ..., "value": ...}`:
//!
//! ```json
//! {"type": "list", "value": [{"type": "atom", "value": "f"}, {"type": "number", "value": 1}]}
//! ```
//!
//! Environments are shipped as their visible bindings, oldest first, and always decode to
//! a persistent environment. A state carries `env` plus `refs` as `[index, value]` pairs;
//! indices must run densely from zero.

use crate::Error;
use crate::ast::{Dict, Lambda, LambdaRec, List, NumberType, RefIndex, Value};
use crate::env::{Env, PersistentEnv};
use crate::evaluator::State;
use crate::refs::RefStore;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum WireValue {
    Atom(String),
    Keyword(String),
    String(String),
    Boolean(bool),
    Number(NumberType),
    Null,
    List(Vec<WireValue>),
    Vector(Vec<WireValue>),
    Dict(Vec<(WireValue, WireValue)>),
    PrimFn(String),
    Ref(RefIndex),
    Lambda(WireLambda),
    LambdaRec {
        #[serde(rename = "self")]
        name: String,
        lambda: WireLambda,
    },
    Env(Vec<(String, WireValue)>),
    State {
        env: Vec<(String, WireValue)>,
        refs: Vec<(RefIndex, WireValue)>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireLambda {
    pub params: Vec<String>,
    pub bodies: Vec<WireValue>,
    pub env: Vec<(String, WireValue)>,
}

fn encode_bindings(bindings: Vec<(String, Value)>) -> Vec<(String, WireValue)> {
    bindings
        .into_iter()
        .map(|(name, value)| (name, encode(&value)))
        .collect()
}

fn encode_lambda(lambda: &Lambda) -> WireLambda {
    WireLambda {
        params: lambda.params.clone(),
        bodies: lambda.bodies.iter().map(encode).collect(),
        env: encode_bindings(lambda.env.visible()),
    }
}

pub fn encode(value: &Value) -> WireValue {
    match value {
        Value::Atom(name) => WireValue::Atom(name.clone()),
        Value::Keyword(name) => WireValue::Keyword(name.clone()),
        Value::String(s) => WireValue::String(s.clone()),
        Value::Number(n) => WireValue::Number(*n),
        Value::Bool(b) => WireValue::Boolean(*b),
        Value::Null => WireValue::Null,
        Value::List(list) => WireValue::List(list.iter().map(encode).collect()),
        Value::Vector(items) => WireValue::Vector(items.iter().map(encode).collect()),
        Value::Dict(dict) => WireValue::Dict(
            dict.iter()
                .map(|(key, value)| (encode(key), encode(value)))
                .collect(),
        ),
        Value::PrimFn(name) => WireValue::PrimFn(name.clone()),
        Value::Ref(ix) => WireValue::Ref(*ix),
        Value::Lambda(lambda) => WireValue::Lambda(encode_lambda(lambda)),
        Value::LambdaRec(rec) => WireValue::LambdaRec {
            name: rec.name.clone(),
            lambda: encode_lambda(&rec.lambda),
        },
        Value::Env(env) => WireValue::Env(encode_bindings(env.bindings())),
        Value::State(state) => WireValue::State {
            env: encode_bindings(state.env.bindings()),
            refs: state
                .refs
                .iter()
                .map(|(ix, value)| (ix, encode(value)))
                .collect(),
        },
    }
}

fn decode_all(values: Vec<WireValue>) -> Result<Vec<Value>, Error> {
    values.into_iter().map(decode).collect()
}

fn decode_env(bindings: Vec<(String, WireValue)>) -> Result<PersistentEnv, Error> {
    bindings
        .into_iter()
        .map(|(name, value)| Ok((name, decode(value)?)))
        .collect::<Result<Vec<_>, Error>>()
        .map(|pairs| pairs.into_iter().collect())
}

fn decode_lambda(lambda: WireLambda) -> Result<Lambda, Error> {
    Ok(Lambda {
        params: lambda.params,
        bodies: decode_all(lambda.bodies)?,
        env: decode_env(lambda.env)?,
    })
}

fn decode_refs(refs: Vec<(RefIndex, WireValue)>) -> Result<RefStore, Error> {
    let mut store = RefStore::new();
    for (expected, (ix, value)) in refs.into_iter().enumerate() {
        if ix != expected {
            return Err(Error::impossible(
                "decode",
                format!("reference index {ix} out of order, expected {expected}"),
            ));
        }
        store.insert(decode(value)?);
    }
    Ok(store)
}

pub fn decode(wire: WireValue) -> Result<Value, Error> {
    let value = match wire {
        WireValue::Atom(name) => Value::Atom(name),
        WireValue::Keyword(name) => Value::Keyword(name),
        WireValue::String(s) => Value::String(s),
        WireValue::Number(n) => Value::Number(n),
        WireValue::Boolean(b) => Value::Bool(b),
        WireValue::Null => Value::Null,
        WireValue::List(items) => Value::List(decode_all(items)?.into_iter().collect::<List>()),
        WireValue::Vector(items) => Value::Vector(Rc::new(decode_all(items)?)),
        WireValue::Dict(pairs) => {
            let mut dict = Dict::with_capacity(pairs.len());
            for (key, item) in pairs {
                dict.insert(decode(key)?, decode(item)?);
            }
            Value::Dict(Rc::new(dict))
        }
        WireValue::PrimFn(name) => Value::PrimFn(name),
        WireValue::Ref(ix) => Value::Ref(ix),
        WireValue::Lambda(lambda) => Value::Lambda(Rc::new(decode_lambda(lambda)?)),
        WireValue::LambdaRec { name, lambda } => Value::LambdaRec(Rc::new(LambdaRec {
            name,
            lambda: decode_lambda(lambda)?,
        })),
        WireValue::Env(bindings) => Value::Env(Rc::new(Env::Persistent(decode_env(bindings)?))),
        WireValue::State { env, refs } => Value::State(Rc::new(State {
            env: Env::Persistent(decode_env(env)?),
            refs: decode_refs(refs)?,
        })),
    };
    Ok(value)
}

fn wire_error(e: &serde_json::Error) -> Error {
    Error::other("wire", e.to_string())
}

pub fn to_json(value: &Value) -> Result<String, Error> {
    serde_json::to_string(&encode(value)).map_err(|e| wire_error(&e))
}

pub fn from_json(text: &str) -> Result<Value, Error> {
    let wire: WireValue = serde_json::from_str(text).map_err(|e| wire_error(&e))?;
    decode(wire)
}

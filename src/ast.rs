//! This module defines the value model of the interpreter. The [`Value`] enum is the closed
//! set of data kinds programs manipulate: it is both the syntax tree handed to the evaluator
//! and the data that evaluation produces. Equality is structural (see the `PartialEq` impl
//! for the exact rules), display produces the canonical textual form, and [`Sequence`]
//! gives lists, vectors and strings one uniform slicing/indexing interface.
//!
//! Ergonomic helpers such as [`val`], [`atom`], [`kw`] and [`vector`] keep AST construction
//! in code and tests short.

use crate::env::{Env, PersistentEnv};
use crate::evaluator::State;
use indexmap::IndexMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::rc::Rc;

/// Type alias for number values in the interpreter
pub type NumberType = i64;

/// Index of a slot in a [`crate::refs::RefStore`]
pub type RefIndex = usize;

/// Key/value mapping backing `Value::Dict`, iterated in insertion order
pub type Dict = IndexMap<Value, Value>;

/// Core value type of the interpreter
#[derive(Clone)]
pub enum Value {
    /// Identifiers, used both as syntax and as first-class names
    Atom(String),
    /// Self-evaluating tagged literals, stored without the leading `:`
    Keyword(String),
    String(String),
    Number(NumberType),
    Bool(bool),
    /// Result of forms evaluated only for effect (`def`, an unmatched `cond`, ...)
    Null,
    List(List),
    Vector(Rc<Vec<Value>>),
    Dict(Rc<Dict>),
    Lambda(Rc<Lambda>),
    LambdaRec(Rc<LambdaRec>),
    /// Reference to a primitive by name, resolved through the active capability table
    PrimFn(String),
    Ref(RefIndex),
    Env(Rc<Env>),
    State(Rc<State>),
}

/// Kind tag of a [`Value`], used in type errors and primitive signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Atom,
    Keyword,
    String,
    Number,
    Boolean,
    Null,
    List,
    Vector,
    Dict,
    Lambda,
    LambdaRec,
    PrimFn,
    Ref,
    Env,
    State,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Atom => "atom",
            Kind::Keyword => "keyword",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Null => "null",
            Kind::List => "list",
            Kind::Vector => "vector",
            Kind::Dict => "dict",
            Kind::Lambda => "lambda",
            Kind::LambdaRec => "lambda-rec",
            Kind::PrimFn => "primfn",
            Kind::Ref => "ref",
            Kind::Env => "env",
            Kind::State => "state",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A closure: parameters, body forms and the environment frozen when `fn` was evaluated.
///
/// The captured environment is a [`PersistentEnv`], so later mutation of a mutable scope
/// can never leak into a closure created from it.
#[derive(Clone)]
pub struct Lambda {
    pub params: Vec<String>,
    pub bodies: Vec<Value>,
    pub env: PersistentEnv,
}

/// A closure that can see itself under `name`.
///
/// The self binding is not stored; it is added to the captured environment right before
/// every call, which avoids a cyclic structure.
#[derive(Clone)]
pub struct LambdaRec {
    pub name: String,
    pub lambda: Lambda,
}

impl LambdaRec {
    /// The plain closure to invoke: the captured scope extended with the self binding.
    pub(crate) fn unroll(self: &Rc<Self>) -> Lambda {
        Lambda {
            params: self.lambda.params.clone(),
            bodies: self.lambda.bodies.clone(),
            env: self
                .lambda
                .env
                .set(self.name.clone(), Value::LambdaRec(Rc::clone(self))),
        }
    }
}

//
// Persistent list
//

/// Persistent singly linked list with O(1) `first`, `rest` and `cons`.
///
/// Tails are shared between lists, so consing onto a list never disturbs other holders.
#[derive(Clone, Default)]
pub struct List {
    head: Option<Rc<Cell>>,
}

struct Cell {
    value: Value,
    next: List,
}

impl List {
    pub fn new() -> Self {
        List { head: None }
    }

    pub fn cons(&self, value: Value) -> List {
        List {
            head: Some(Rc::new(Cell {
                value,
                next: self.clone(),
            })),
        }
    }

    pub fn first(&self) -> Option<&Value> {
        self.head.as_ref().map(|cell| &cell.value)
    }

    pub fn rest(&self) -> Option<List> {
        self.head.as_ref().map(|cell| cell.next.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> ListIter<'_> {
        ListIter {
            cursor: self.head.as_deref(),
        }
    }

    /// Drop the first `n` elements; `None` if the list is shorter than `n`.
    pub fn drop_front(&self, n: usize) -> Option<List> {
        let mut list = self.clone();
        for _ in 0..n {
            list = list.rest()?;
        }
        Some(list)
    }
}

// Long lists would otherwise be torn down recursively, one stack frame per cell.
impl Drop for List {
    fn drop(&mut self) {
        let mut next = self.head.take();
        while let Some(cell) = next {
            match Rc::try_unwrap(cell) {
                Ok(mut cell) => next = cell.next.head.take(),
                Err(_) => break,
            }
        }
    }
}

pub struct ListIter<'a> {
    cursor: Option<&'a Cell>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.cursor?;
        self.cursor = cell.next.head.as_deref();
        Some(&cell.value)
    }
}

impl FromIterator<Value> for List {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let items: Vec<Value> = iter.into_iter().collect();
        items
            .into_iter()
            .rev()
            .fold(List::new(), |list, value| list.cons(value))
    }
}

//
// Sequence capability
//

/// Uniform read access shared by lists, vectors and strings.
pub trait Sequence {
    fn length(&self) -> usize;

    /// Element at `ix`, if in range
    fn nth(&self, ix: usize) -> Option<Value>;

    /// Sub-sequence `[begin, end)` of the same kind; `end == None` means through the end.
    /// `None` if the range does not fit.
    fn slice(&self, begin: usize, end: Option<usize>) -> Option<Value>;

    fn elements(&self) -> Box<dyn Iterator<Item = Value> + '_>;
}

impl Sequence for List {
    fn length(&self) -> usize {
        self.len()
    }

    fn nth(&self, ix: usize) -> Option<Value> {
        self.iter().nth(ix).cloned()
    }

    fn slice(&self, begin: usize, end: Option<usize>) -> Option<Value> {
        let tail = self.drop_front(begin)?;
        match end {
            None => Some(Value::List(tail)),
            Some(end) => {
                let count = end.checked_sub(begin)?;
                let taken: Vec<Value> = tail.iter().take(count).cloned().collect();
                (taken.len() == count).then(|| Value::List(taken.into_iter().collect()))
            }
        }
    }

    fn elements(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        Box::new(self.iter().cloned())
    }
}

impl Sequence for Vec<Value> {
    fn length(&self) -> usize {
        self.len()
    }

    fn nth(&self, ix: usize) -> Option<Value> {
        self.get(ix).cloned()
    }

    fn slice(&self, begin: usize, end: Option<usize>) -> Option<Value> {
        let end = end.unwrap_or(self.len());
        self.get(begin..end)
            .map(|items| Value::Vector(Rc::new(items.to_vec())))
    }

    fn elements(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        Box::new(self.iter().cloned())
    }
}

// Strings are sequences of characters; each element is a one-character string.
impl Sequence for String {
    fn length(&self) -> usize {
        self.chars().count()
    }

    fn nth(&self, ix: usize) -> Option<Value> {
        self.chars().nth(ix).map(|c| Value::String(c.to_string()))
    }

    fn slice(&self, begin: usize, end: Option<usize>) -> Option<Value> {
        let len = self.length();
        let end = end.unwrap_or(len);
        if begin > end || end > len {
            return None;
        }
        Some(Value::String(
            self.chars().skip(begin).take(end - begin).collect(),
        ))
    }

    fn elements(&self) -> Box<dyn Iterator<Item = Value> + '_> {
        Box::new(self.chars().map(|c| Value::String(c.to_string())))
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Atom(_) => Kind::Atom,
            Value::Keyword(_) => Kind::Keyword,
            Value::String(_) => Kind::String,
            Value::Number(_) => Kind::Number,
            Value::Bool(_) => Kind::Boolean,
            Value::Null => Kind::Null,
            Value::List(_) => Kind::List,
            Value::Vector(_) => Kind::Vector,
            Value::Dict(_) => Kind::Dict,
            Value::Lambda(_) => Kind::Lambda,
            Value::LambdaRec(_) => Kind::LambdaRec,
            Value::PrimFn(_) => Kind::PrimFn,
            Value::Ref(_) => Kind::Ref,
            Value::Env(_) => Kind::Env,
            Value::State(_) => Kind::State,
        }
    }

    /// Only the literal `#f` is falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn as_sequence(&self) -> Option<&dyn Sequence> {
        match self {
            Value::List(list) => Some(list),
            Value::Vector(items) => Some(items.as_ref()),
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Value::Atom(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<NumberType> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(dict) => Some(dict),
            _ => None,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(arr: [T; N]) -> Self {
        Value::List(arr.into_iter().map(Into::into).collect())
    }
}

impl From<List> for Value {
    fn from(list: List) -> Self {
        Value::List(list)
    }
}

/// Helper for creating atoms
pub fn atom<S: AsRef<str>>(name: S) -> Value {
    Value::Atom(name.as_ref().to_owned())
}

/// Helper for creating keywords (`kw("doc")` is `:doc`)
pub fn kw<S: AsRef<str>>(name: S) -> Value {
    Value::Keyword(name.as_ref().to_owned())
}

/// Helper for creating values from anything convertible; `Vec`s and arrays become lists
pub fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper for creating vectors
pub fn vector<T: Into<Value>, I: IntoIterator<Item = T>>(items: I) -> Value {
    Value::Vector(Rc::new(items.into_iter().map(Into::into).collect()))
}

/// Helper for creating dicts from key/value pairs, in order
pub fn dict<I: IntoIterator<Item = (Value, Value)>>(pairs: I) -> Value {
    Value::Dict(Rc::new(pairs.into_iter().collect()))
}

/// Helper for creating the empty list
pub fn nil() -> Value {
    Value::List(List::new())
}

//
// Structural equality
//

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Atom(a), Value::Atom(b))
            | (Value::Keyword(a), Value::Keyword(b))
            | (Value::String(a), Value::String(b))
            | (Value::PrimFn(a), Value::PrimFn(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => a.iter().eq(b.iter()),
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Lambda(a), Value::Lambda(b)) => a.as_ref() == b.as_ref(),
            (Value::LambdaRec(a), Value::LambdaRec(b)) => {
                a.name == b.name && a.lambda == b.lambda
            }
            (Value::Ref(a), Value::Ref(b)) => a == b,
            (Value::Env(a), Value::Env(b)) => a == b,
            (Value::State(a), Value::State(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Closures compare by parameters and bodies only; the captured environment is ignored.
impl PartialEq for Lambda {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.bodies == other.bodies
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Value::Atom(s) | Value::Keyword(s) | Value::String(s) | Value::PrimFn(s) => {
                s.hash(state)
            }
            Value::Number(n) => n.hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
            Value::List(list) => {
                for item in list.iter() {
                    item.hash(state);
                }
            }
            Value::Vector(items) => items.hash(state),
            Value::Dict(dict) => {
                // Order-insensitive, matching dict equality
                let combined = dict.iter().fold(0u64, |acc, entry| {
                    let mut hasher = DefaultHasher::new();
                    entry.hash(&mut hasher);
                    acc.wrapping_add(hasher.finish())
                });
                dict.len().hash(state);
                combined.hash(state);
            }
            Value::Lambda(lambda) => {
                lambda.params.hash(state);
                lambda.bodies.hash(state);
            }
            Value::LambdaRec(rec) => {
                rec.name.hash(state);
                rec.lambda.params.hash(state);
                rec.lambda.bodies.hash(state);
            }
            Value::Ref(ix) => ix.hash(state),
            Value::Env(env) => env.len().hash(state),
            // Kind tag only: states are rarely keys and have no cheap canonical hash
            Value::State(_) => {}
        }
    }
}

//
// Canonical text
//

fn write_joined<'a, I>(f: &mut fmt::Formatter<'_>, items: I) -> fmt::Result
where
    I: IntoIterator<Item = &'a Value>,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(fn [{}]", self.params.join(" "))?;
        for body in &self.bodies {
            write!(f, " {body}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atom(name) => write!(f, "{name}"),
            Value::Keyword(name) => write!(f, ":{name}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Number(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Value::Null => write!(f, "null"),
            Value::List(list) => {
                write!(f, "(")?;
                write_joined(f, list.iter())?;
                write!(f, ")")
            }
            Value::Vector(items) => {
                write!(f, "[")?;
                write_joined(f, items.iter())?;
                write!(f, "]")
            }
            Value::Dict(dict) => {
                write!(f, "{{")?;
                write_joined(f, dict.iter().flat_map(|(k, v)| [k, v]))?;
                write!(f, "}}")
            }
            Value::Lambda(lambda) => write!(f, "{lambda}"),
            Value::LambdaRec(rec) => write!(f, "#<rec:{} {}>", rec.name, rec.lambda),
            Value::PrimFn(name) => write!(f, "#<primfn:{name}>"),
            Value::Ref(ix) => write!(f, "#<ref:{ix}>"),
            Value::Env(env) => write!(f, "#<env {env}>"),
            Value::State(state) => write!(f, "#<state {} refs={}>", state.env, state.refs.len()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atom(s) => write!(f, "Atom({s})"),
            Value::Keyword(s) => write!(f, "Keyword({s})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Null => write!(f, "Null"),
            Value::List(list) => f
                .debug_tuple("List")
                .field(&list.iter().collect::<Vec<_>>())
                .finish(),
            Value::Vector(items) => f.debug_tuple("Vector").field(items).finish(),
            Value::Dict(dict) => f.debug_tuple("Dict").field(dict).finish(),
            Value::Lambda(lambda) => write!(f, "Lambda({lambda})"),
            Value::LambdaRec(rec) => write!(f, "LambdaRec({}, {})", rec.name, rec.lambda),
            Value::PrimFn(name) => write!(f, "PrimFn({name})"),
            Value::Ref(ix) => write!(f, "Ref({ix})"),
            Value::Env(env) => write!(f, "Env({env})"),
            Value::State(state) => write!(f, "State({}, refs={})", state.env, state.refs.len()),
        }
    }
}

//! Primitive operations and the capability table.
//!
//! A primitive is a named host procedure described by a [`Primitive`] descriptor: its
//! [`Arity`], the expected [`ArgKind`] per argument position, and the implementation.
//! Arity and kind violations are reported before the implementation runs.
//!
//! Programs can only reach primitives through the [`PrimitiveTable`] owned by the active
//! [`Bindings`]. An atom naming a table entry evaluates to a `PrimFn` value, and calling
//! that value resolves the name through the same table again, so a table built without an
//! entry makes the capability unreachable.
//!
//! ## Catalog
//!
//! ```text
//! base-eval apply list dict throw eq? cons first rest length take drop nth
//! lookup insert ref read-ref write-ref add-right + - * < > not string-append
//! pure-state get-current-state state-env
//! ```
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with the signature of [`BuiltinFn`]
//! 2. **Add it to `BUILTIN_OPS`** with its identifier, arity and argument kinds
//! 3. **Add tests** covering the success path and every error path

use crate::Error;
use crate::ast::{Dict, Kind, NumberType, Value};
use crate::evaluator::{self, Bindings, State};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Number of arguments an operation accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    /// Any count, including zero
    Any,
    /// Any even count, for key/value constructors
    Even,
}

impl Arity {
    /// Check an argument count, reporting failures against operation `op`
    pub fn validate(self, op: &str, count: usize) -> Result<(), Error> {
        match self {
            Arity::Exact(n) if count != n => Err(Error::arity(op, n, count)),
            Arity::AtLeast(n) if count < n => Err(Error::arity(op, n, count)),
            Arity::Even if count % 2 != 0 => Err(Error::arity(op, count + 1, count)),
            _ => Ok(()),
        }
    }
}

/// Expected kind of one primitive argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Wildcard
    Any,
    Is(Kind),
    /// Anything with the sequence capability: list, vector or string
    Sequence,
    /// List or vector
    ListLike,
}

impl ArgKind {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            ArgKind::Any => true,
            ArgKind::Is(kind) => value.kind() == kind,
            ArgKind::Sequence => value.as_sequence().is_some(),
            ArgKind::ListLike => matches!(value, Value::List(_) | Value::Vector(_)),
        }
    }
}

impl From<Kind> for ArgKind {
    fn from(kind: Kind) -> Self {
        ArgKind::Is(kind)
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgKind::Any => write!(f, "any"),
            ArgKind::Is(kind) => write!(f, "{kind}"),
            ArgKind::Sequence => write!(f, "sequence"),
            ArgKind::ListLike => write!(f, "list or vector"),
        }
    }
}

/// Signature of the shipped primitives
pub type BuiltinFn = fn(&mut Bindings, Vec<Value>) -> Result<Value, Error>;

/// Erased implementation stored in a table; host closures and [`BuiltinFn`]s both fit
pub type OperationFn = dyn Fn(&mut Bindings, Vec<Value>) -> Result<Value, Error>;

/// Descriptor of one primitive in a [`PrimitiveTable`]
#[derive(Clone)]
pub struct Primitive {
    pub name: String,
    pub arity: Arity,
    /// Expected kind per position; positions past the end are unchecked
    pub kinds: Vec<ArgKind>,
    func: Rc<OperationFn>,
}

impl Primitive {
    /// Validate arity and argument kinds, then run the implementation
    pub fn call(&self, bindings: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
        self.arity.validate(&self.name, args.len())?;
        for (arg, expected) in args.iter().zip(&self.kinds) {
            if !expected.accepts(arg) {
                return Err(Error::type_error(&self.name, *expected, arg));
            }
        }
        trace!(primitive = %self.name, args = args.len(), "calling primitive");
        (self.func)(bindings, args)
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

/// Capability table: primitive name to descriptor.
///
/// Built once by the host and owned by the [`Bindings`] it is attached to; there is no
/// global registry to mutate.
#[derive(Clone, Default, Debug)]
pub struct PrimitiveTable {
    ops: IndexMap<String, Rc<Primitive>>,
}

impl PrimitiveTable {
    /// A table granting nothing
    pub fn empty() -> Self {
        PrimitiveTable::default()
    }

    /// The full shipped catalog
    pub fn pure() -> Self {
        let mut table = PrimitiveTable::empty();
        for op in BUILTIN_OPS {
            table.insert(Primitive {
                name: op.id.to_owned(),
                arity: op.arity,
                kinds: op.kinds.to_vec(),
                func: Rc::new(op.func),
            });
        }
        table
    }

    /// Register a host primitive, replacing any entry with the same name
    pub fn register<F>(&mut self, name: &str, arity: Arity, kinds: Vec<ArgKind>, func: F)
    where
        F: Fn(&mut Bindings, Vec<Value>) -> Result<Value, Error> + 'static,
    {
        self.insert(Primitive {
            name: name.to_owned(),
            arity,
            kinds,
            func: Rc::new(func),
        });
    }

    /// A copy of this table with the named primitives removed
    pub fn without<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut table = self.clone();
        for name in names {
            table.ops.shift_remove(name);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&Rc<Primitive>> {
        self.ops.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn insert(&mut self, primitive: Primitive) {
        self.ops
            .insert(primitive.name.clone(), Rc::new(primitive));
    }
}

//
// Argument helpers
//

/// Move a checked argument vector into a fixed-size array
fn take_args<const N: usize>(op: &str, args: Vec<Value>) -> Result<[Value; N], Error> {
    args.try_into()
        .map_err(|args: Vec<Value>| Error::arity(op, N, args.len()))
}

fn number(op: &str, value: &Value) -> Result<NumberType, Error> {
    value
        .as_number()
        .ok_or_else(|| Error::type_error(op, Kind::Number, value))
}

/// A non-negative number usable as a sequence position
fn position(op: &str, value: &Value) -> Result<usize, Error> {
    let n = number(op, value)?;
    usize::try_from(n).map_err(|_| Error::other(op, format!("negative index {n}")))
}

fn dict_arg<'a>(op: &str, value: &'a Value) -> Result<&'a Dict, Error> {
    value
        .as_dict()
        .ok_or_else(|| Error::type_error(op, Kind::Dict, value))
}

fn state_arg(op: &str, value: Value) -> Result<State, Error> {
    match value {
        Value::State(state) => Ok(Rc::unwrap_or_clone(state)),
        other => Err(Error::type_error(op, Kind::State, &other)),
    }
}

fn ref_arg(op: &str, value: &Value) -> Result<usize, Error> {
    match value {
        Value::Ref(ix) => Ok(*ix),
        other => Err(Error::type_error(op, Kind::Ref, other)),
    }
}

fn sequence_len(op: &str, seq: &Value) -> Result<usize, Error> {
    seq.as_sequence()
        .map(|s| s.length())
        .ok_or_else(|| Error::type_error(op, ArgKind::Sequence, seq))
}

//
// Builtin Function Implementations
//

/// Evaluate `expr` in a nested bindings rebuilt from the caller's capability table and
/// the passed state. Returns `[result updated-state]`.
fn builtin_base_eval(bindings: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [expr, state] = take_args("base-eval", args)?;
    let state = state_arg("base-eval", state)?;
    let mut nested = bindings.nested(state);
    let result = evaluator::eval(&mut nested, &expr)?;
    Ok(Value::Vector(Rc::new(vec![
        result,
        Value::State(Rc::new(nested.into_state())),
    ])))
}

fn builtin_apply(bindings: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [func, arg_list] = take_args("apply", args)?;
    let call_args: Vec<Value> = match &arg_list {
        Value::List(list) => list.iter().cloned().collect(),
        Value::Vector(items) => items.as_ref().clone(),
        other => return Err(Error::type_error("apply", ArgKind::ListLike, other)),
    };
    evaluator::apply(bindings, &func, call_args)
}

fn builtin_list(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::List(args.into_iter().collect()))
}

fn builtin_dict(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let mut dict = Dict::with_capacity(args.len() / 2);
    let mut iter = args.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        dict.insert(key, value);
    }
    Ok(Value::Dict(Rc::new(dict)))
}

fn builtin_throw(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [label, payload] = take_args("throw", args)?;
    match label {
        Value::Atom(label) => Err(Error::Thrown { label, payload }),
        other => Err(Error::type_error("throw", Kind::Atom, &other)),
    }
}

fn builtin_eq(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [a, b] = take_args("eq?", args)?;
    Ok(Value::Bool(a == b))
}

fn builtin_cons(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [head, tail] = take_args("cons", args)?;
    match tail {
        Value::List(list) => Ok(Value::List(list.cons(head))),
        Value::Vector(items) => {
            let mut out = Vec::with_capacity(items.len() + 1);
            out.push(head);
            out.extend(items.iter().cloned());
            Ok(Value::Vector(Rc::new(out)))
        }
        other => Err(Error::type_error("cons", ArgKind::ListLike, &other)),
    }
}

fn builtin_first(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [seq] = take_args("first", args)?;
    let first = match &seq {
        Value::List(list) => list.first().cloned(),
        Value::Vector(items) => items.first().cloned(),
        other => return Err(Error::type_error("first", ArgKind::ListLike, other)),
    };
    first.ok_or_else(|| Error::other("first", "empty sequence"))
}

fn builtin_rest(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [seq] = take_args("rest", args)?;
    let rest = match &seq {
        Value::List(list) => list.rest().map(Value::List),
        Value::Vector(items) => items
            .split_first()
            .map(|(_, tail)| Value::Vector(Rc::new(tail.to_vec()))),
        other => return Err(Error::type_error("rest", ArgKind::ListLike, other)),
    };
    rest.ok_or_else(|| Error::other("rest", "empty sequence"))
}

fn builtin_length(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [seq] = take_args("length", args)?;
    let len = sequence_len("length", &seq)?;
    NumberType::try_from(len)
        .map(Value::Number)
        .map_err(|_| Error::other("length", "length exceeds the number range"))
}

fn builtin_take(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [n, seq] = take_args("take", args)?;
    let n = position("take", &n)?;
    let len = sequence_len("take", &seq)?;
    seq.as_sequence()
        .and_then(|s| s.slice(0, Some(n)))
        .ok_or_else(|| Error::other("take", format!("cannot take {n} from {len} elements")))
}

fn builtin_drop(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [n, seq] = take_args("drop", args)?;
    let n = position("drop", &n)?;
    let len = sequence_len("drop", &seq)?;
    seq.as_sequence()
        .and_then(|s| s.slice(n, None))
        .ok_or_else(|| Error::other("drop", format!("cannot drop {n} from {len} elements")))
}

fn builtin_nth(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [ix, seq] = take_args("nth", args)?;
    let ix = position("nth", &ix)?;
    let len = sequence_len("nth", &seq)?;
    seq.as_sequence()
        .and_then(|s| s.nth(ix))
        .ok_or_else(|| Error::other("nth", format!("index {ix} out of range for length {len}")))
}

fn builtin_lookup(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [key, dict] = take_args("lookup", args)?;
    dict_arg("lookup", &dict)?
        .get(&key)
        .cloned()
        .ok_or_else(|| Error::other("lookup", format!("key {key} not found")))
}

fn builtin_insert(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [key, value, dict] = take_args("insert", args)?;
    let mut out = dict_arg("insert", &dict)?.clone();
    out.insert(key, value);
    Ok(Value::Dict(Rc::new(out)))
}

fn builtin_ref(bindings: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [value] = take_args("ref", args)?;
    Ok(Value::Ref(bindings.refs_mut().insert(value)))
}

fn builtin_read_ref(bindings: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [reference] = take_args("read-ref", args)?;
    let ix = ref_arg("read-ref", &reference)?;
    bindings
        .refs()
        .get(ix)
        .cloned()
        .ok_or_else(|| Error::impossible("read-ref", format!("undefined reference {ix}")))
}

fn builtin_write_ref(bindings: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [reference, value] = take_args("write-ref", args)?;
    let ix = ref_arg("write-ref", &reference)?;
    match bindings.refs_mut().set(ix, value.clone()) {
        Some(_) => Ok(value),
        None => Err(Error::impossible(
            "write-ref",
            format!("undefined reference {ix}"),
        )),
    }
}

fn builtin_add_right(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [vector, value] = take_args("add-right", args)?;
    match vector {
        Value::Vector(mut items) => {
            Rc::make_mut(&mut items).push(value);
            Ok(Value::Vector(items))
        }
        other => Err(Error::type_error("add-right", Kind::Vector, &other)),
    }
}

// Macro to generate checked binary arithmetic
macro_rules! checked_arithmetic {
    ($name:ident, $op_str:expr, $method:ident, $what:expr) => {
        fn $name(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
            let [a, b] = take_args($op_str, args)?;
            let (a, b) = (number($op_str, &a)?, number($op_str, &b)?);
            a.$method(b)
                .map(Value::Number)
                .ok_or_else(|| Error::other($op_str, concat!("integer overflow in ", $what)))
        }
    };
}

checked_arithmetic!(builtin_add, "+", checked_add, "addition");
checked_arithmetic!(builtin_sub, "-", checked_sub, "subtraction");
checked_arithmetic!(builtin_mul, "*", checked_mul, "multiplication");

macro_rules! numeric_comparison {
    ($name:ident, $op:tt, $op_str:expr) => {
        fn $name(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
            let [a, b] = take_args($op_str, args)?;
            Ok(Value::Bool(number($op_str, &a)? $op number($op_str, &b)?))
        }
    };
}

numeric_comparison!(builtin_lt, <, "<");
numeric_comparison!(builtin_gt, >, ">");

fn builtin_not(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    match take_args("not", args)? {
        [Value::Bool(b)] => Ok(Value::Bool(!b)),
        [other] => Err(Error::type_error("not", Kind::Boolean, &other)),
    }
}

fn builtin_string_append(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let mut result = String::new();
    for arg in &args {
        match arg {
            Value::String(s) => result.push_str(s),
            other => return Err(Error::type_error("string-append", Kind::String, other)),
        }
    }
    Ok(Value::String(result))
}

fn builtin_pure_state(_: &mut Bindings, _: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::State(Rc::new(State::default())))
}

fn builtin_get_current_state(bindings: &mut Bindings, _: Vec<Value>) -> Result<Value, Error> {
    Ok(Value::State(Rc::new(bindings.to_state())))
}

fn builtin_state_env(_: &mut Bindings, args: Vec<Value>) -> Result<Value, Error> {
    let [state] = take_args("state-env", args)?;
    let state = state_arg("state-env", state)?;
    Ok(Value::Env(Rc::new(state.env)))
}

/// Static description of a shipped primitive
struct BuiltinOp {
    id: &'static str,
    arity: Arity,
    kinds: &'static [ArgKind],
    func: BuiltinFn,
}

const ANY: ArgKind = ArgKind::Any;
const NUM: ArgKind = ArgKind::Is(Kind::Number);
const SEQ: ArgKind = ArgKind::Sequence;

/// Every shipped primitive. `PrimitiveTable::pure` copies these into a fresh table.
static BUILTIN_OPS: &[BuiltinOp] = &[
    // Evaluation
    BuiltinOp {
        id: "base-eval",
        arity: Arity::Exact(2),
        kinds: &[ANY, ArgKind::Is(Kind::State)],
        func: builtin_base_eval,
    },
    BuiltinOp {
        id: "apply",
        arity: Arity::Exact(2),
        kinds: &[ANY, ArgKind::ListLike],
        func: builtin_apply,
    },
    BuiltinOp {
        id: "throw",
        arity: Arity::Exact(2),
        kinds: &[ArgKind::Is(Kind::Atom), ANY],
        func: builtin_throw,
    },
    // Constructors and equality
    BuiltinOp {
        id: "list",
        arity: Arity::Any,
        kinds: &[],
        func: builtin_list,
    },
    BuiltinOp {
        id: "dict",
        arity: Arity::Even,
        kinds: &[],
        func: builtin_dict,
    },
    BuiltinOp {
        id: "eq?",
        arity: Arity::Exact(2),
        kinds: &[ANY, ANY],
        func: builtin_eq,
    },
    // Sequences
    BuiltinOp {
        id: "cons",
        arity: Arity::Exact(2),
        kinds: &[ANY, ArgKind::ListLike],
        func: builtin_cons,
    },
    BuiltinOp {
        id: "first",
        arity: Arity::Exact(1),
        kinds: &[ArgKind::ListLike],
        func: builtin_first,
    },
    BuiltinOp {
        id: "rest",
        arity: Arity::Exact(1),
        kinds: &[ArgKind::ListLike],
        func: builtin_rest,
    },
    BuiltinOp {
        id: "length",
        arity: Arity::Exact(1),
        kinds: &[SEQ],
        func: builtin_length,
    },
    BuiltinOp {
        id: "take",
        arity: Arity::Exact(2),
        kinds: &[NUM, SEQ],
        func: builtin_take,
    },
    BuiltinOp {
        id: "drop",
        arity: Arity::Exact(2),
        kinds: &[NUM, SEQ],
        func: builtin_drop,
    },
    BuiltinOp {
        id: "nth",
        arity: Arity::Exact(2),
        kinds: &[NUM, SEQ],
        func: builtin_nth,
    },
    BuiltinOp {
        id: "add-right",
        arity: Arity::Exact(2),
        kinds: &[ArgKind::Is(Kind::Vector), ANY],
        func: builtin_add_right,
    },
    // Dicts
    BuiltinOp {
        id: "lookup",
        arity: Arity::Exact(2),
        kinds: &[ANY, ArgKind::Is(Kind::Dict)],
        func: builtin_lookup,
    },
    BuiltinOp {
        id: "insert",
        arity: Arity::Exact(3),
        kinds: &[ANY, ANY, ArgKind::Is(Kind::Dict)],
        func: builtin_insert,
    },
    // Reference store
    BuiltinOp {
        id: "ref",
        arity: Arity::Exact(1),
        kinds: &[ANY],
        func: builtin_ref,
    },
    BuiltinOp {
        id: "read-ref",
        arity: Arity::Exact(1),
        kinds: &[ArgKind::Is(Kind::Ref)],
        func: builtin_read_ref,
    },
    BuiltinOp {
        id: "write-ref",
        arity: Arity::Exact(2),
        kinds: &[ArgKind::Is(Kind::Ref), ANY],
        func: builtin_write_ref,
    },
    // Numbers, booleans, strings
    BuiltinOp {
        id: "+",
        arity: Arity::Exact(2),
        kinds: &[NUM, NUM],
        func: builtin_add,
    },
    BuiltinOp {
        id: "-",
        arity: Arity::Exact(2),
        kinds: &[NUM, NUM],
        func: builtin_sub,
    },
    BuiltinOp {
        id: "*",
        arity: Arity::Exact(2),
        kinds: &[NUM, NUM],
        func: builtin_mul,
    },
    BuiltinOp {
        id: "<",
        arity: Arity::Exact(2),
        kinds: &[NUM, NUM],
        func: builtin_lt,
    },
    BuiltinOp {
        id: ">",
        arity: Arity::Exact(2),
        kinds: &[NUM, NUM],
        func: builtin_gt,
    },
    BuiltinOp {
        id: "not",
        arity: Arity::Exact(1),
        kinds: &[ArgKind::Is(Kind::Boolean)],
        func: builtin_not,
    },
    BuiltinOp {
        id: "string-append",
        arity: Arity::Any,
        kinds: &[],
        func: builtin_string_append,
    },
    // States
    BuiltinOp {
        id: "pure-state",
        arity: Arity::Exact(0),
        kinds: &[],
        func: builtin_pure_state,
    },
    BuiltinOp {
        id: "get-current-state",
        arity: Arity::Exact(0),
        kinds: &[],
        func: builtin_get_current_state,
    },
    BuiltinOp {
        id: "state-env",
        arity: Arity::Exact(1),
        kinds: &[ArgKind::Is(Kind::State)],
        func: builtin_state_env,
    },
];

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::expect_used)] // test code OK
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::ast::{atom, dict, kw, nil, val, vector};
    use pretty_assertions::assert_eq;

    /// Helper to invoke a primitive through a fresh pure table, arity and kind checks included
    fn call_builtin(name: &str, args: &[Value]) -> Result<Value, Error> {
        let mut bindings = Bindings::pure();
        let op = Rc::clone(bindings.primitives().get(name).expect("builtin not found"));
        op.call(&mut bindings, args.to_vec())
    }

    /// Expected outcome of a builtin call
    enum Expect {
        Gives(Value),
        Fails(ErrorKind),
    }
    use Expect::*;

    fn success<T: Into<Value>>(value: T) -> Expect {
        Gives(val(value))
    }

    macro_rules! test {
        ($name:expr, $args:expr, $expected:expr) => {
            ($name, call_builtin($name, $args), $expected)
        };
    }

    #[test]
    fn test_arity_validation() {
        assert!(Arity::Exact(2).validate("x", 2).is_ok());
        assert_eq!(
            Arity::Exact(2).validate("x", 1),
            Err(Error::arity("x", 2, 1))
        );
        assert!(Arity::AtLeast(1).validate("x", 3).is_ok());
        assert!(Arity::AtLeast(1).validate("x", 0).is_err());
        assert!(Arity::Any.validate("x", 0).is_ok());
        assert!(Arity::Even.validate("x", 4).is_ok());
        assert_eq!(Arity::Even.validate("x", 3), Err(Error::arity("x", 4, 3)));
    }

    #[test]
    fn test_pure_table_contents() {
        let table = PrimitiveTable::pure();
        for name in [
            "base-eval", "apply", "list", "dict", "throw", "eq?", "cons", "first", "rest",
            "length", "take", "drop", "nth", "lookup", "ref", "read-ref", "write-ref",
            "add-right", "+",
        ] {
            assert!(table.contains(name), "missing primitive {name}");
        }
        assert!(!table.contains("fn"), "special forms are not primitives");
        assert_eq!(table.names().count(), table.len());

        let narrowed = table.without(["ref", "write-ref"]);
        assert!(!narrowed.contains("ref"));
        assert!(narrowed.contains("read-ref"));
        assert!(table.contains("ref"));
    }

    #[test]
    fn test_host_registration() {
        let mut table = PrimitiveTable::empty();
        table.register("double", Arity::Exact(1), vec![NUM], |_, args| {
            Ok(Value::Number(args[0].as_number().unwrap_or_default() * 2))
        });
        let mut bindings = Bindings::with_table(table);
        let op = Rc::clone(bindings.primitives().get("double").unwrap());

        assert_eq!(op.call(&mut bindings, vec![val(21)]), Ok(val(42)));
        assert_eq!(
            op.call(&mut bindings, vec![val("x")]).unwrap_err().kind(),
            ErrorKind::Type
        );
        assert_eq!(
            op.call(&mut bindings, vec![]).unwrap_err(),
            Error::arity("double", 1, 0)
        );
    }

    #[test]
    fn test_builtin_function_implementations() {
        type TestCase = (&'static str, Result<Value, Error>, Expect);

        let test_cases: Vec<TestCase> = vec![
            // Arithmetic
            test!("+", &[val(1), val(2)], success(3)),
            test!("+", &[val(-5), val(5)], success(0)),
            test!("+", &[val(1)], Fails(ErrorKind::WrongNumberArgs)),
            test!("+", &[val(1), val(2), val(3)], Fails(ErrorKind::WrongNumberArgs)),
            test!("+", &[val(1), val("2")], Fails(ErrorKind::Type)),
            test!("+", &[val(NumberType::MAX), val(1)], Fails(ErrorKind::Other)),
            test!("-", &[val(10), val(3)], success(7)),
            test!("-", &[val(NumberType::MIN), val(1)], Fails(ErrorKind::Other)),
            test!("*", &[val(6), val(7)], success(42)),
            test!("<", &[val(1), val(2)], success(true)),
            test!(">", &[val(1), val(2)], success(false)),
            test!("not", &[val(false)], success(true)),
            test!("not", &[val(0)], Fails(ErrorKind::Type)),
            // Strings
            test!("string-append", &[], success("")),
            test!("string-append", &[val("ab"), val("cd")], success("abcd")),
            test!("string-append", &[val("ab"), val(1)], Fails(ErrorKind::Type)),
            // Constructors
            test!("list", &[], Gives(nil())),
            test!("list", &[val(1), atom("a")], Gives(val(vec![val(1), atom("a")]))),
            test!(
                "dict",
                &[kw("a"), val(1), kw("b"), val(2)],
                Gives(dict([(kw("a"), val(1)), (kw("b"), val(2))]))
            ),
            test!("dict", &[], Gives(dict([]))),
            test!("dict", &[kw("a")], Fails(ErrorKind::WrongNumberArgs)),
            // Equality
            test!("eq?", &[val([1, 2]), val([1, 2])], success(true)),
            test!("eq?", &[val([1, 2]), vector([1, 2])], success(false)),
            test!("eq?", &[dict([(kw("k"), nil())]), dict([(kw("k"), nil())])], success(true)),
            test!("eq?", &[val(1)], Fails(ErrorKind::WrongNumberArgs)),
            // cons / first / rest
            test!("cons", &[val(1), val([2, 3])], success([1, 2, 3])),
            test!("cons", &[val(1), nil()], success([1])),
            test!("cons", &[val(1), vector([2])], Gives(vector([1, 2]))),
            test!("cons", &[val(1), val(2)], Fails(ErrorKind::Type)),
            test!("first", &[val([1, 2])], success(1)),
            test!("first", &[vector([3, 4])], success(3)),
            test!("first", &[nil()], Fails(ErrorKind::Other)),
            test!("first", &[vector(Vec::<Value>::new())], Fails(ErrorKind::Other)),
            test!("first", &[val("abc")], Fails(ErrorKind::Type)),
            test!("rest", &[val([1, 2])], success([2])),
            test!("rest", &[vector([1, 2])], Gives(vector([2]))),
            test!("rest", &[nil()], Fails(ErrorKind::Other)),
            // Sequence capability
            test!("length", &[val([1, 2, 3])], success(3)),
            test!("length", &[vector([1])], success(1)),
            test!("length", &[val("héllo")], success(5)),
            test!("length", &[val(5)], Fails(ErrorKind::Type)),
            test!("take", &[val(2), val([1, 2, 3])], success([1, 2])),
            test!("take", &[val(0), vector([1])], Gives(vector(Vec::<Value>::new()))),
            test!("take", &[val(2), val("abc")], success("ab")),
            test!("take", &[val(5), val([1])], Fails(ErrorKind::Other)),
            test!("take", &[val(-1), val([1])], Fails(ErrorKind::Other)),
            test!("drop", &[val(1), val([1, 2, 3])], success([2, 3])),
            test!("drop", &[val(3), vector([1, 2, 3])], Gives(vector(Vec::<Value>::new()))),
            test!("drop", &[val(1), val("abc")], success("bc")),
            test!("drop", &[val(4), val("abc")], Fails(ErrorKind::Other)),
            test!("nth", &[val(1), val([1, 2, 3])], success(2)),
            test!("nth", &[val(0), vector([atom("x")])], Gives(atom("x"))),
            test!("nth", &[val(2), val("abc")], success("c")),
            test!("nth", &[val(3), val([1, 2, 3])], Fails(ErrorKind::Other)),
            test!("nth", &[val("0"), val([1])], Fails(ErrorKind::Type)),
            test!("add-right", &[vector([1]), val(2)], Gives(vector([1, 2]))),
            test!("add-right", &[val([1]), val(2)], Fails(ErrorKind::Type)),
            // Dicts
            test!("lookup", &[kw("a"), dict([(kw("a"), val(1))])], success(1)),
            test!("lookup", &[val([1]), dict([(val([1]), val("list"))])], success("list")),
            test!("lookup", &[kw("b"), dict([(kw("a"), val(1))])], Fails(ErrorKind::Other)),
            test!("lookup", &[kw("a"), val([1])], Fails(ErrorKind::Type)),
            test!(
                "insert",
                &[kw("b"), val(2), dict([(kw("a"), val(1))])],
                Gives(dict([(kw("a"), val(1)), (kw("b"), val(2))]))
            ),
            // Errors
            test!("throw", &[atom("oops"), val(1)], Fails(ErrorKind::Thrown)),
            test!("throw", &[val("oops"), val(1)], Fails(ErrorKind::Type)),
            // References
            test!("ref", &[val(1)], Gives(Value::Ref(0))),
            test!("read-ref", &[Value::Ref(0)], Fails(ErrorKind::Impossible)),
            test!("write-ref", &[Value::Ref(7), val(1)], Fails(ErrorKind::Impossible)),
            test!("read-ref", &[val(0)], Fails(ErrorKind::Type)),
            // States
            test!("pure-state", &[], Gives(Value::State(Rc::new(State::default())))),
            test!("state-env", &[val(1)], Fails(ErrorKind::Type)),
        ];

        for (i, (name, result, expected)) in test_cases.into_iter().enumerate() {
            match (result, expected) {
                (Ok(actual), Gives(expected)) => {
                    assert_eq!(actual, expected, "case #{} ({name})", i + 1)
                }
                (Err(err), Fails(kind)) => {
                    assert_eq!(err.kind(), kind, "case #{} ({name}): {err}", i + 1)
                }
                (Ok(actual), Fails(kind)) => {
                    panic!("case #{} ({name}): expected {kind:?}, got {actual}", i + 1)
                }
                (Err(err), Gives(expected)) => {
                    panic!("case #{} ({name}): expected {expected}, got error {err}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_thrown_error_carries_label_and_payload() {
        let err = call_builtin("throw", &[atom("not-found"), val([1, 2])]).unwrap_err();
        assert_eq!(
            err,
            Error::Thrown {
                label: "not-found".into(),
                payload: val([1, 2]),
            }
        );
        assert_eq!(err.label(), Some("not-found"));
    }

    #[test]
    fn test_type_errors_name_expected_and_actual_kinds() {
        let err = call_builtin("+", &[val(1), val("2")]).unwrap_err();
        assert_eq!(
            err,
            Error::Type {
                op: "+".into(),
                expected: ArgKind::Is(Kind::Number),
                actual: Kind::String,
            }
        );
        assert_eq!(format!("{err}"), "TypeError(+): expected number but got string");
    }

    #[test]
    fn test_ref_cells_within_one_bindings() {
        let mut bindings = Bindings::pure();
        let table = PrimitiveTable::pure();
        let call = |b: &mut Bindings, name: &str, args: Vec<Value>| {
            Rc::clone(table.get(name).unwrap()).call(b, args)
        };

        let r = call(&mut bindings, "ref", vec![val(3)]).unwrap();
        assert_eq!(call(&mut bindings, "read-ref", vec![r.clone()]), Ok(val(3)));
        assert_eq!(call(&mut bindings, "write-ref", vec![r.clone(), val(4)]), Ok(val(4)));
        assert_eq!(call(&mut bindings, "read-ref", vec![r.clone()]), Ok(val(4)));

        let second = call(&mut bindings, "ref", vec![val(5)]).unwrap();
        assert_eq!(second, Value::Ref(1));
    }
}

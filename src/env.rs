//! Name to value bindings.
//!
//! Two variants sit behind [`Env`]:
//!
//! - [`PersistentEnv`]: a shared-tail chain. `set` prepends in O(1) and never disturbs a
//!   previously returned handle; lookups scan newest to oldest so newer bindings shadow.
//!   Closures capture this variant.
//! - [`MutableEnv`]: an owned map overwritten in place, for flat single-owner scopes such
//!   as a module body or an exported module snapshot.
//!
//! `freeze` turns either into a persistent snapshot, `thaw` into an independent mutable copy.

use crate::ast::Value;
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

/// Immutable environment backed by a shared-tail linked chain
#[derive(Clone, Default)]
pub struct PersistentEnv {
    top: Option<Rc<Frame>>,
}

struct Frame {
    name: String,
    value: Value,
    next: Option<Rc<Frame>>,
}

impl PersistentEnv {
    pub fn new() -> Self {
        PersistentEnv { top: None }
    }

    pub fn set(&self, name: String, value: Value) -> PersistentEnv {
        PersistentEnv {
            top: Some(Rc::new(Frame {
                name,
                value,
                next: self.top.clone(),
            })),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames()
            .find(|frame| frame.name == name)
            .map(|frame| &frame.value)
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Copy every visible binding into a fresh mutable environment
    pub fn thaw(&self) -> MutableEnv {
        MutableEnv {
            bindings: self.visible().into_iter().collect(),
        }
    }

    /// Visible (unshadowed) bindings, oldest first.
    ///
    /// Replaying the result through `set` rebuilds an environment with the same lookups.
    pub fn visible(&self) -> Vec<(String, Value)> {
        let mut seen: IndexMap<&str, &Value> = IndexMap::new();
        for frame in self.frames() {
            seen.entry(frame.name.as_str()).or_insert(&frame.value);
        }
        seen.into_iter()
            .rev()
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect()
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.top.as_deref(), |frame| frame.next.as_deref())
    }
}

// Environments with many definitions would otherwise drop recursively.
impl Drop for PersistentEnv {
    fn drop(&mut self) {
        let mut next = self.top.take();
        while let Some(frame) = next {
            match Rc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.next.take(),
                Err(_) => break,
            }
        }
    }
}

impl FromIterator<(String, Value)> for PersistentEnv {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(PersistentEnv::new(), |env, (name, value)| env.set(name, value))
    }
}

/// Flat environment overwritten in place; iterates in definition order
#[derive(Clone, Default)]
pub struct MutableEnv {
    bindings: IndexMap<String, Value>,
}

impl MutableEnv {
    pub fn new() -> Self {
        MutableEnv {
            bindings: IndexMap::new(),
        }
    }

    /// Bind `name`, discarding any previous value for it
    pub fn set(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn freeze(&self) -> PersistentEnv {
        self.bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }
}

/// An environment of either variant
#[derive(Clone)]
pub enum Env {
    Persistent(PersistentEnv),
    Mutable(MutableEnv),
}

impl Default for Env {
    fn default() -> Self {
        Env::Persistent(PersistentEnv::new())
    }
}

impl Env {
    /// New or updated binding.
    ///
    /// The persistent variant returns a new handle and leaves `self`'s chain untouched;
    /// the mutable variant overwrites in place and returns itself.
    pub fn set(self, name: String, value: Value) -> Env {
        match self {
            Env::Persistent(env) => Env::Persistent(env.set(name, value)),
            Env::Mutable(mut env) => {
                env.set(name, value);
                Env::Mutable(env)
            }
        }
    }

    /// In-place form of [`Env::set`] for owners of the handle
    pub fn define(&mut self, name: String, value: Value) {
        match self {
            Env::Persistent(env) => *env = env.set(name, value),
            Env::Mutable(env) => env.set(name, value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Env::Persistent(env) => env.get(name),
            Env::Mutable(env) => env.get(name),
        }
    }

    /// Immutable snapshot; free for an already persistent environment
    pub fn freeze(&self) -> PersistentEnv {
        match self {
            Env::Persistent(env) => env.clone(),
            Env::Mutable(env) => env.freeze(),
        }
    }

    /// Independent mutable copy
    pub fn thaw(&self) -> MutableEnv {
        match self {
            Env::Persistent(env) => env.thaw(),
            Env::Mutable(env) => env.clone(),
        }
    }

    pub fn is_immutable(&self) -> bool {
        matches!(self, Env::Persistent(_))
    }

    /// Visible bindings, oldest first
    pub fn bindings(&self) -> Vec<(String, Value)> {
        match self {
            Env::Persistent(env) => env.visible(),
            Env::Mutable(env) => env
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// Number of visible bindings
    pub fn len(&self) -> usize {
        match self {
            Env::Persistent(env) => env.visible().len(),
            Env::Mutable(env) => env.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Env::Persistent(env) => env.is_empty(),
            Env::Mutable(env) => env.is_empty(),
        }
    }
}

impl From<PersistentEnv> for Env {
    fn from(env: PersistentEnv) -> Self {
        Env::Persistent(env)
    }
}

impl From<MutableEnv> for Env {
    fn from(env: MutableEnv) -> Self {
        Env::Mutable(env)
    }
}

/// Two environments are equal when they expose the same visible bindings, whatever
/// their variant or definition order.
impl PartialEq for Env {
    fn eq(&self, other: &Self) -> bool {
        let mine = self.bindings();
        let theirs = other.bindings();
        mine.len() == theirs.len()
            && mine
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.bindings().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} => {value}")?;
        }
        write!(f, "}}")
    }
}

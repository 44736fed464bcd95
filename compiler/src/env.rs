//! Function environment handed down by scheduling.
//!
//! Only the `async` flag of each function's schedule is consulted by the
//! lowering passes.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Compute the function in its own task, concurrently with its consumers.
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub schedule: Schedule,
}

impl Function {
    pub fn new(name: impl Into<String>, is_async: bool) -> Self {
        Self {
            name: name.into(),
            schedule: Schedule { is_async },
        }
    }
}

/// Name-keyed function table. Iteration is in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    functions: BTreeMap<String, Function>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a function; returns the previous entry.
    pub fn insert(&mut self, func: Function) -> Option<Function> {
        self.functions.insert(func.name.clone(), func)
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn async_count(&self) -> usize {
        self.iter().filter(|f| f.schedule.is_async).count()
    }
}

impl FromIterator<Function> for Environment {
    fn from_iter<T: IntoIterator<Item = Function>>(iter: T) -> Self {
        let mut env = Environment::new();
        for f in iter {
            env.insert(f);
        }
        env
    }
}

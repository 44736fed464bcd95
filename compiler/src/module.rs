//! A parsed textual IR module: function declarations plus one statement tree.

use crate::env::Environment;
use crate::ir::Stmt;

#[derive(Debug, Clone)]
pub struct Module {
    pub env: Environment,
    pub body: Stmt,
}

impl Module {
    pub fn new(env: Environment, body: Stmt) -> Self {
        Self { env, body }
    }

    /// The same declarations around a rewritten body.
    pub fn with_body(&self, body: Stmt) -> Self {
        Self {
            env: self.env.clone(),
            body,
        }
    }
}

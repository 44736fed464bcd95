//! Semaphore materialization.
//!
//! Rewrites every semaphore binding
//!
//! ```text
//! let s = (let a = .. in make_semaphore(n)) { body }
//! ```
//!
//! into stack storage plus an explicit init call:
//!
//! ```text
//! let a = .. { let s = alloca(size) { init(s, n); body } }
//! ```
//!
//! After this pass no creation call may remain anywhere in the tree.

use crate::config::RuntimeSymbols;
use crate::error::LowerError;
use crate::ir::{CallType, Expr, ExprKind, Stmt, StmtKind, Type};
use crate::mutator::{walk_expr, walk_stmt, IrMutator};

struct SemaphoreInitializer<'a> {
    symbols: &'a RuntimeSymbols,
}

impl SemaphoreInitializer<'_> {
    fn is_storage(&self, value: &Expr) -> bool {
        matches!(
            value.kind(),
            ExprKind::Call {
                name,
                call_type: CallType::Intrinsic,
                ..
            } if *name == self.symbols.alloca
        )
    }

    fn materialize(&self, name: &str, value: &Expr, body: Stmt) -> Result<Stmt, LowerError> {
        let mut lets = Vec::new();
        let mut value = value.clone();
        while let ExprKind::Let {
            name: inner,
            value: bound,
            body: rest,
        } = value.kind()
        {
            lets.push((inner.clone(), bound.clone()));
            let rest = rest.clone();
            value = rest;
        }

        let initial = match value.kind() {
            ExprKind::Call { name: callee, args, .. } if *callee == self.symbols.make_semaphore => {
                match args.as_slice() {
                    [initial] => initial.clone(),
                    _ => {
                        return Err(LowerError::SemaphoreArity {
                            name: name.to_string(),
                            found: args.len(),
                        })
                    }
                }
            }
            _ => {
                return Err(LowerError::MalformedSemaphoreLet {
                    name: name.to_string(),
                })
            }
        };

        let sema = Expr::var(name, Type::Semaphore);
        let init = Expr::call(
            self.symbols.semaphore_init.clone(),
            vec![sema, initial],
            CallType::Extern,
            Type::I32,
        );
        let storage = Expr::call(
            self.symbols.alloca.clone(),
            vec![Expr::int(self.symbols.semaphore_size_bytes)],
            CallType::Intrinsic,
            Type::Semaphore,
        );
        let mut out = Stmt::let_stmt(name, storage, Stmt::block(Stmt::evaluate(init), body));
        while let Some((inner, bound)) = lets.pop() {
            out = Stmt::let_stmt(inner, bound, out);
        }
        Ok(out)
    }
}

impl IrMutator for SemaphoreInitializer<'_> {
    type Error = LowerError;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, LowerError> {
        match s.kind() {
            StmtKind::Let { name, value, body }
                if value.ty() == Type::Semaphore && !self.is_storage(value) =>
            {
                let body = self.mutate_stmt(body)?;
                self.materialize(name, value, body)
            }
            _ => walk_stmt(self, s),
        }
    }

    fn mutate_expr(&mut self, e: &Expr) -> Result<Expr, LowerError> {
        match e.kind() {
            ExprKind::Call { name, .. } if *name == self.symbols.make_semaphore => {
                Err(LowerError::StraySemaphoreCreation {
                    symbol: name.clone(),
                })
            }
            _ => walk_expr(self, e),
        }
    }
}

/// Lower every abstract semaphore creation into storage plus an init call.
pub fn initialize_semaphores(s: &Stmt, symbols: &RuntimeSymbols) -> Result<Stmt, LowerError> {
    SemaphoreInitializer { symbols }.mutate_stmt(s)
}

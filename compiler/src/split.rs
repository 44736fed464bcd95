//! Producer/consumer splitting of async functions.
//!
//! For every `Realize` of a function scheduled `async`, the realize body is
//! rewritten twice: once keeping only the function's produce region (the
//! producer task) and once dropping it (the consumer task). The two run
//! under a `Fork`, synchronized by one counting semaphore per consume node
//! of the original body:
//!
//! ```text
//! realize f {                        realize f {
//!   produce f { P }                    let f.semaphore_0 = make_semaphore(0) {
//!   consume f { C }         ==>          fork {
//! }                                        produce f { P; release(f.semaphore_0, 1); }
//!                                        } {
//!                                          acquire (f.semaphore_0, 1) { consume f { C } }
//!                                        }
//!                                    } }
//! ```
//!
//! Semaphores are pushed in discovery order and popped from the back on both
//! sides, so the last declared semaphore pairs the first consume node.
//!
//! Acquires that end up on both sides of a fork (a nested async function
//! waiting on an outer one) are re-targeted at a cloned semaphore on the
//! producer side, one clone per acquire. The outer split then binds every
//! clone of its semaphores, clones of clones included, and duplicates each
//! release of the original onto them.

use std::collections::BTreeMap;

use log::debug;

use crate::config::RuntimeSymbols;
use crate::env::Environment;
use crate::error::LowerError;
use crate::id::NameAllocator;
use crate::ir::{CallType, Expr, ExprKind, Stmt, StmtKind, Type};
use crate::mutator::{run_infallible, walk_stmt, IrMutator};
use crate::semaphore::SemaphoreRole;
use crate::uses::count_consume_nodes;

/// Original semaphore name → clones waited on by producer tasks, in
/// allocation order.
pub type ClonedAcquires = BTreeMap<String, Vec<String>>;

/// Every clone of `name`, then the clones of those clones. Resolved entries
/// are removed from `cloned`.
fn take_clones(cloned: &mut ClonedAcquires, name: &str) -> Vec<String> {
    let mut out = cloned.remove(name).unwrap_or_default();
    let mut next = 0;
    while next < out.len() {
        if let Some(more) = cloned.remove(&out[next]) {
            out.extend(more);
        }
        next += 1;
    }
    out
}

fn semaphore_name(semaphore: &Expr) -> Result<&str, LowerError> {
    semaphore
        .as_var()
        .ok_or_else(|| LowerError::NonVariableSemaphore {
            semaphore: semaphore.to_string(),
        })
}

fn semaphore_var(name: impl Into<String>) -> Expr {
    Expr::var(name, Type::Semaphore)
}

// ── Producer side ──────────────────────────────────────────────────────────

struct ProducerBody<'a> {
    func: &'a str,
    /// Semaphores still to be released, popped from the back.
    sema: Vec<Expr>,
    produced: bool,
    symbols: &'a RuntimeSymbols,
    cloned_acquires: &'a mut ClonedAcquires,
    names: &'a mut NameAllocator,
}

impl IrMutator for ProducerBody<'_> {
    type Error = LowerError;

    fn collapses_no_ops(&self) -> bool {
        true
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, LowerError> {
        match s.kind() {
            StmtKind::ProducerConsumer {
                name,
                is_producer: true,
                body,
            } if name == self.func => {
                if self.produced {
                    return Err(LowerError::DuplicateProduce {
                        func: self.func.to_string(),
                    });
                }
                self.produced = true;
                let mut body = body.clone();
                while let Some(sema) = self.sema.pop() {
                    let release = Expr::call(
                        self.symbols.semaphore_release.clone(),
                        vec![sema, Expr::int(1)],
                        CallType::Extern,
                        Type::I32,
                    );
                    body = Stmt::block(body, Stmt::evaluate(release));
                }
                Ok(Stmt::produce(name.clone(), body))
            }
            StmtKind::ProducerConsumer {
                name,
                is_producer,
                body,
            } => {
                let body = self.mutate_stmt(body)?;
                if body.is_no_op() || *is_producer {
                    Ok(body)
                } else {
                    Ok(Stmt::producer_consumer(name.clone(), false, body))
                }
            }
            // Consumer-side leaves: the producer task only computes.
            StmtKind::Evaluate { .. }
            | StmtKind::Provide { .. }
            | StmtKind::Assert { .. }
            | StmtKind::Prefetch { .. } => Ok(Stmt::no_op()),
            StmtKind::Acquire {
                semaphore,
                count,
                body,
            } => {
                let var = semaphore_name(semaphore)?;
                let body = self.mutate_stmt(body)?;
                if body.is_no_op() {
                    Ok(body)
                } else if SemaphoreRole::classify(var).is_folding_for(self.func) {
                    Ok(Stmt::acquire(semaphore.clone(), count.clone(), body))
                } else {
                    // The consumer keeps the original acquire; each producer
                    // task waits on its own copy.
                    let clone = self.names.fresh(var);
                    debug!("cloning semaphore {} as {}", var, clone);
                    self.cloned_acquires
                        .entry(var.to_string())
                        .or_default()
                        .push(clone.clone());
                    Ok(Stmt::acquire(semaphore_var(clone), count.clone(), body))
                }
            }
            _ => walk_stmt(self, s),
        }
    }
}

// ── Consumer side ──────────────────────────────────────────────────────────

struct ConsumerBody<'a> {
    func: &'a str,
    sema: Vec<Expr>,
}

impl IrMutator for ConsumerBody<'_> {
    type Error = LowerError;

    fn collapses_no_ops(&self) -> bool {
        true
    }

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, LowerError> {
        match s.kind() {
            StmtKind::ProducerConsumer {
                name,
                is_producer,
                body,
            } if name == self.func => {
                if *is_producer {
                    // Done by the producer task.
                    return Ok(Stmt::no_op());
                }
                // Outer consume pops first; nested consumes of the same
                // function take the following semaphores.
                let sema = self.sema.pop();
                let new_body = self.mutate_stmt(body)?;
                let consume = if new_body.same_as(body) {
                    s.clone()
                } else {
                    Stmt::consume(name.clone(), new_body)
                };
                match sema {
                    Some(sema) => Ok(Stmt::acquire(sema, Expr::int(1), consume)),
                    None => Ok(consume),
                }
            }
            StmtKind::Acquire {
                semaphore, body, ..
            } => {
                let var = semaphore_name(semaphore)?;
                if SemaphoreRole::classify(var).is_folding_for(self.func) {
                    // Folding slots are governed by the producer alone.
                    self.mutate_stmt(body)
                } else {
                    walk_stmt(self, s)
                }
            }
            _ => walk_stmt(self, s),
        }
    }
}

// ── Clone signalling ───────────────────────────────────────────────────────

/// Mirrors every release/init of `old_name` onto each of `new_vars`.
struct CloneAcquire<'a> {
    old_name: &'a str,
    new_vars: Vec<Expr>,
    symbols: &'a RuntimeSymbols,
}

impl IrMutator for CloneAcquire<'_> {
    type Error = std::convert::Infallible;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, Self::Error> {
        let StmtKind::Evaluate { value } = s.kind() else {
            return walk_stmt(self, s);
        };
        let ExprKind::Call {
            name,
            args,
            call_type,
            ty,
        } = value.kind()
        else {
            return Ok(s.clone());
        };
        let signals_old = args.first().and_then(Expr::as_var) == Some(self.old_name)
            && (*name == self.symbols.semaphore_release || *name == self.symbols.semaphore_init);
        if !signals_old {
            return Ok(s.clone());
        }
        let mut out = s.clone();
        for new_var in &self.new_vars {
            let mut new_args = args.clone();
            new_args[0] = new_var.clone();
            let mirrored = Stmt::evaluate(Expr::call(name.clone(), new_args, *call_type, *ty));
            out = Stmt::block(out, mirrored);
        }
        Ok(out)
    }
}

// ── Fork insertion ─────────────────────────────────────────────────────────

pub struct ForkAsyncProducers<'a> {
    env: &'a Environment,
    symbols: &'a RuntimeSymbols,
    cloned_acquires: ClonedAcquires,
    names: NameAllocator,
}

impl<'a> ForkAsyncProducers<'a> {
    pub fn new(env: &'a Environment, symbols: &'a RuntimeSymbols) -> Self {
        Self {
            env,
            symbols,
            cloned_acquires: ClonedAcquires::new(),
            names: NameAllocator::new(),
        }
    }

    /// Clones recorded so far, keyed by original semaphore name.
    pub fn cloned_acquires(&self) -> &ClonedAcquires {
        &self.cloned_acquires
    }

    fn make_semaphore(&self) -> Expr {
        Expr::call(
            self.symbols.make_semaphore.clone(),
            vec![Expr::int(0)],
            CallType::Extern,
            Type::Semaphore,
        )
    }

    fn split(&mut self, func: &str, body: &Stmt) -> Result<Stmt, LowerError> {
        let consumes = count_consume_nodes(body, func);
        let sema_names: Vec<String> = (0..consumes)
            .map(|i| SemaphoreRole::sync(func, i).to_string())
            .collect();
        let sema_vars: Vec<Expr> = sema_names.iter().map(semaphore_var).collect();
        debug!("splitting async function {} ({} consume nodes)", func, consumes);

        let producer = ProducerBody {
            func,
            sema: sema_vars.clone(),
            produced: false,
            symbols: self.symbols,
            cloned_acquires: &mut self.cloned_acquires,
            names: &mut self.names,
        }
        .mutate_stmt(body)?;
        let consumer = ConsumerBody {
            func,
            sema: sema_vars,
        }
        .mutate_stmt(body)?;

        // Nested async functions on either side.
        let producer = self.mutate_stmt(&producer)?;
        let consumer = self.mutate_stmt(&consumer)?;

        let mut body = Stmt::fork(producer, consumer);
        for sema_name in &sema_names {
            let clones = take_clones(&mut self.cloned_acquires, sema_name);
            if !clones.is_empty() {
                debug!("binding clones {:?} of {}", clones, sema_name);
                let mut mirror = CloneAcquire {
                    old_name: sema_name,
                    new_vars: clones.iter().map(semaphore_var).collect(),
                    symbols: self.symbols,
                };
                body = run_infallible(&mut mirror, &body);
                for clone in clones {
                    body = Stmt::let_stmt(clone, self.make_semaphore(), body);
                }
            }
            body = Stmt::let_stmt(sema_name.clone(), self.make_semaphore(), body);
        }
        Ok(body)
    }
}

impl IrMutator for ForkAsyncProducers<'_> {
    type Error = LowerError;

    fn mutate_stmt(&mut self, s: &Stmt) -> Result<Stmt, LowerError> {
        let StmtKind::Realize {
            name,
            types,
            bounds,
            condition,
            body,
        } = s.kind()
        else {
            return walk_stmt(self, s);
        };
        let func = self
            .env
            .get(name)
            .ok_or_else(|| LowerError::UnknownFunction { name: name.clone() })?;
        if !func.schedule.is_async {
            return walk_stmt(self, s);
        }
        let body = self.split(name, body)?;
        Ok(Stmt::realize(
            name.clone(),
            types.clone(),
            bounds.clone(),
            condition.clone(),
            body,
        ))
    }
}

/// Split every async function's realize into a forked producer and consumer.
pub fn split_async_producers(
    s: &Stmt,
    env: &Environment,
    symbols: &RuntimeSymbols,
) -> Result<Stmt, LowerError> {
    ForkAsyncProducers::new(env, symbols).mutate_stmt(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_module, parse_stmt};
    use crate::uses::children;

    fn split_module(src: &str) -> Result<Stmt, LowerError> {
        let module = parse_module(src);
        split_async_producers(&module.body, &module.env, &RuntimeSymbols::default())
    }

    fn fork_of(s: &Stmt) -> Option<&Stmt> {
        if matches!(s.kind(), StmtKind::Fork { .. }) {
            return Some(s);
        }
        children(s).into_iter().find_map(fork_of)
    }

    #[test]
    fn single_consumer_gets_one_semaphore() {
        let out = split_module(
            "async func f; func g;
             realize f<i32>([0, 10]) {
               produce f { provide f(0) = 1; }
               consume f { g(f(0)); }
             }",
        )
        .unwrap();
        assert_eq!(
            out.to_string(),
            "realize f<i32>([0, 10]) {
  let f.semaphore_0 = extern pf_make_semaphore(0): semaphore {
    fork {
      produce f {
        provide f(0) = 1;
        extern pf_semaphore_release(f.semaphore_0: semaphore, 1);
      }
    } {
      acquire (f.semaphore_0: semaphore, 1) {
        consume f {
          g(f(0));
        }
      }
    }
  }
}
"
        );
    }

    #[test]
    fn nested_consume_acquires_the_next_semaphore() {
        let out = split_module(
            "async func A; func B; func out;
             realize A<i32>([0, 4]) {
               produce A { provide A(0) = 1; }
               consume A {
                 produce B {
                   provide B(0) = A(0);
                   consume A { out(A(1)); }
                 }
               }
             }",
        )
        .unwrap();
        assert_eq!(
            out.to_string(),
            "realize A<i32>([0, 4]) {
  let A.semaphore_1 = extern pf_make_semaphore(0): semaphore {
    let A.semaphore_0 = extern pf_make_semaphore(0): semaphore {
      fork {
        produce A {
          provide A(0) = 1;
          extern pf_semaphore_release(A.semaphore_1: semaphore, 1);
          extern pf_semaphore_release(A.semaphore_0: semaphore, 1);
        }
      } {
        acquire (A.semaphore_1: semaphore, 1) {
          consume A {
            produce B {
              provide B(0) = A(0);
              acquire (A.semaphore_0: semaphore, 1) {
                consume A {
                  out(A(1));
                }
              }
            }
          }
        }
      }
    }
  }
}
"
        );
    }

    #[test]
    fn synchronous_realizes_are_untouched() {
        let src = "func f;
             realize f<i32>([0, 10]) {
               produce f { provide f(0) = 1; }
               consume f { f(0); }
             }";
        let module = parse_module(src);
        let out = split_async_producers(&module.body, &module.env, &RuntimeSymbols::default())
            .unwrap();
        assert!(out.same_as(&module.body));
    }

    #[test]
    fn unknown_function_is_rejected() {
        let err = split_module("realize h<i32>() { h(0); }").unwrap_err();
        assert_eq!(
            err,
            LowerError::UnknownFunction {
                name: "h".to_string()
            }
        );
    }

    #[test]
    fn duplicate_produce_is_rejected() {
        let err = split_module(
            "async func f;
             realize f<i32>() {
               produce f { provide f(0) = 1; }
               produce f { provide f(0) = 2; }
               consume f { f(0); }
             }",
        )
        .unwrap_err();
        assert_eq!(
            err,
            LowerError::DuplicateProduce {
                func: "f".to_string()
            }
        );
    }

    #[test]
    fn dead_producer_has_no_semaphores() {
        let out = split_module(
            "async func f;
             realize f<i32>() {
               produce f { provide f(0) = 1; }
             }",
        )
        .unwrap();
        let StmtKind::Realize { body, .. } = out.kind() else {
            panic!("expected realize");
        };
        let StmtKind::Fork { first, rest } = body.kind() else {
            panic!("expected a bare fork, got {body}");
        };
        assert_eq!(first.to_string(), "produce f {\n  provide f(0) = 1;\n}\n");
        assert!(rest.is_no_op());
    }

    #[test]
    fn folding_acquires_stay_on_the_producer_side() {
        let out = split_module(
            "async func f;
             realize f<i32>() {
               acquire (f.folding_semaphore.x: semaphore, 1) {
                 produce f { provide f(0) = 1; }
                 consume f { f(0); }
               }
             }",
        )
        .unwrap();
        let fork = fork_of(&out).unwrap();
        let StmtKind::Fork { first, rest } = fork.kind() else {
            unreachable!()
        };
        let producer = first.to_string();
        let consumer = rest.to_string();
        assert!(producer.contains("acquire (f.folding_semaphore.x: semaphore, 1)"));
        assert!(!consumer.contains("folding_semaphore"));
        assert!(consumer.contains("acquire (f.semaphore_0: semaphore, 1)"));
    }

    #[test]
    fn foreign_acquires_are_cloned_on_the_producer_side() {
        let env: Environment = [crate::env::Function::new("f", true)].into_iter().collect();
        let symbols = RuntimeSymbols::default();
        let mut splitter = ForkAsyncProducers::new(&env, &symbols);
        let body = parse_stmt(
            "realize f<i32>() {
               acquire (g.semaphore_0: semaphore, 1) {
                 produce f { provide f(0) = 1; }
                 consume f { f(0); }
               }
             }",
        );
        let out = splitter.mutate_stmt(&body).unwrap();
        assert_eq!(
            splitter.cloned_acquires().get("g.semaphore_0"),
            Some(&vec!["g.semaphore_0_0".to_string()])
        );
        let fork = fork_of(&out).unwrap();
        let StmtKind::Fork { first, rest } = fork.kind() else {
            unreachable!()
        };
        assert!(first.to_string().contains("acquire (g.semaphore_0_0: semaphore, 1)"));
        assert!(rest.to_string().contains("acquire (g.semaphore_0: semaphore, 1)"));
    }

    #[test]
    fn repeated_foreign_acquires_get_distinct_clones() {
        let env: Environment = [crate::env::Function::new("f", true)].into_iter().collect();
        let symbols = RuntimeSymbols::default();
        let mut splitter = ForkAsyncProducers::new(&env, &symbols);
        let body = parse_stmt(
            "realize f<i32>() {
               acquire (g.semaphore_0: semaphore, 1) {
                 acquire (g.semaphore_0: semaphore, 1) {
                   produce f { provide f(0) = 1; }
                 }
                 consume f { f(0); }
               }
             }",
        );
        let out = splitter.mutate_stmt(&body).unwrap().to_string();
        assert_eq!(
            splitter.cloned_acquires().get("g.semaphore_0"),
            Some(&vec!["g.semaphore_0_0".to_string(), "g.semaphore_0_1".to_string()])
        );
        assert!(out.contains("acquire (g.semaphore_0_0: semaphore, 1)"), "{}", out);
        assert!(out.contains("acquire (g.semaphore_0_1: semaphore, 1)"), "{}", out);
    }

    #[test]
    fn clones_of_clones_are_taken_with_their_origin() {
        let mut cloned = ClonedAcquires::new();
        cloned.insert("A.semaphore_0".to_string(), vec!["A.semaphore_0_0".to_string()]);
        cloned.insert(
            "A.semaphore_0_0".to_string(),
            vec!["A.semaphore_0_0_1".to_string()],
        );
        cloned.insert("B.semaphore_0".to_string(), vec!["B.semaphore_0_2".to_string()]);
        assert_eq!(
            take_clones(&mut cloned, "A.semaphore_0"),
            vec!["A.semaphore_0_0".to_string(), "A.semaphore_0_0_1".to_string()]
        );
        assert_eq!(cloned.len(), 1);
        assert!(take_clones(&mut cloned, "A.semaphore_0").is_empty());
    }

    #[test]
    fn every_clone_is_bound_and_released() {
        let mut cloned = ClonedAcquires::new();
        cloned.insert(
            "f.semaphore_0".to_string(),
            vec!["f.semaphore_0_7".to_string(), "f.semaphore_0_8".to_string()],
        );
        let env: Environment = [crate::env::Function::new("f", true)].into_iter().collect();
        let symbols = RuntimeSymbols::default();
        let mut splitter = ForkAsyncProducers::new(&env, &symbols);
        splitter.cloned_acquires = cloned;
        let body = parse_stmt(
            "produce f { provide f(0) = 1; }
             consume f { f(0); }",
        );
        let out = splitter.split("f", &body).unwrap().to_string();
        for name in ["f.semaphore_0_7", "f.semaphore_0_8"] {
            let binding = format!("let {name} = extern pf_make_semaphore(0)");
            let release = format!("extern pf_semaphore_release({name}: semaphore, 1);");
            assert!(out.contains(&binding), "{}", out);
            assert_eq!(out.matches(&release).count(), 1, "{}", out);
        }
        assert!(splitter.cloned_acquires().is_empty());
    }

    #[test]
    fn non_variable_semaphore_is_rejected() {
        let err = split_module(
            "async func f;
             realize f<i32>() {
               acquire (extern get_sema(): semaphore, 1) {
                 produce f { provide f(0) = 1; }
               }
             }",
        )
        .unwrap_err();
        assert!(matches!(err, LowerError::NonVariableSemaphore { .. }));
    }
}

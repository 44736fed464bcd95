//! IR – statement/expression trees consumed by the middle-end passes.
//!
//! Nodes are immutable and reference-counted. A rewrite either hands back
//! the original `Rc` (detectable with `same_as`) or builds a fresh node
//! bottom-up; nothing is mutated in place. Structural equality is the
//! derived `==`.

use std::rc::Rc;

// ── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Int(u8),
    UInt(u8),
    Float(u8),
    Bool,
    /// Opaque runtime pointer.
    Handle,
    /// Pointer to a runtime counting semaphore.
    Semaphore,
}

impl Type {
    pub const I32: Type = Type::Int(32);
}

// ── Expressions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Lt,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn yields_bool(self) -> bool {
        matches!(
            self,
            BinOp::Lt | BinOp::Le | BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or
        )
    }
}

/// How a call is resolved at code generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// C ABI function provided by the runtime.
    Extern,
    /// Built into the code generator (e.g. `alloca`).
    Intrinsic,
    /// Access to a pipeline function's values.
    Func,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntImm(i64),
    BoolImm(bool),
    StringImm(String),
    Var {
        name: String,
        ty: Type,
    },
    Binary {
        op: BinOp,
        a: Expr,
        b: Expr,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        call_type: CallType,
        ty: Type,
    },
    Let {
        name: String,
        value: Expr,
        body: Expr,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr(Rc<ExprKind>);

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr(Rc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Identity comparison: true only for the very same node.
    pub fn same_as(&self, other: &Expr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn int(value: i64) -> Self {
        Expr::new(ExprKind::IntImm(value))
    }

    pub fn bool(value: bool) -> Self {
        Expr::new(ExprKind::BoolImm(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::new(ExprKind::StringImm(value.into()))
    }

    pub fn var(name: impl Into<String>, ty: Type) -> Self {
        Expr::new(ExprKind::Var {
            name: name.into(),
            ty,
        })
    }

    pub fn binary(op: BinOp, a: Expr, b: Expr) -> Self {
        Expr::new(ExprKind::Binary { op, a, b })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, call_type: CallType, ty: Type) -> Self {
        Expr::new(ExprKind::Call {
            name: name.into(),
            args,
            call_type,
            ty,
        })
    }

    pub fn let_in(name: impl Into<String>, value: Expr, body: Expr) -> Self {
        Expr::new(ExprKind::Let {
            name: name.into(),
            value,
            body,
        })
    }

    pub fn ty(&self) -> Type {
        match self.kind() {
            ExprKind::IntImm(_) => Type::I32,
            ExprKind::BoolImm(_) => Type::Bool,
            ExprKind::StringImm(_) => Type::Handle,
            ExprKind::Var { ty, .. } | ExprKind::Call { ty, .. } => *ty,
            ExprKind::Binary { op, a, .. } => {
                if op.yields_bool() {
                    Type::Bool
                } else {
                    a.ty()
                }
            }
            ExprKind::Let { body, .. } => body.ty(),
        }
    }

    pub fn is_const(&self) -> bool {
        matches!(self.kind(), ExprKind::IntImm(_) | ExprKind::BoolImm(_))
    }

    /// The variable name, if this is a plain variable reference.
    pub fn as_var(&self) -> Option<&str> {
        match self.kind() {
            ExprKind::Var { name, .. } => Some(name),
            _ => None,
        }
    }
}

// ── Statements ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForType {
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
}

/// Half-open interval `[min, min + extent)` along one dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub min: Expr,
    pub extent: Expr,
}

impl Range {
    pub fn new(min: Expr, extent: Expr) -> Self {
        Self { min, extent }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Let {
        name: String,
        value: Expr,
        body: Stmt,
    },
    For {
        name: String,
        min: Expr,
        extent: Expr,
        for_type: ForType,
        body: Stmt,
    },
    Block {
        first: Stmt,
        rest: Stmt,
    },
    /// `first` and `rest` run as independent tasks.
    Fork {
        first: Stmt,
        rest: Stmt,
    },
    Realize {
        name: String,
        types: Vec<Type>,
        bounds: Vec<Range>,
        condition: Expr,
        body: Stmt,
    },
    IfThenElse {
        condition: Expr,
        then_case: Stmt,
        else_case: Option<Stmt>,
    },
    ProducerConsumer {
        name: String,
        is_producer: bool,
        body: Stmt,
    },
    Evaluate {
        value: Expr,
    },
    Provide {
        name: String,
        values: Vec<Expr>,
        args: Vec<Expr>,
    },
    Assert {
        condition: Expr,
        message: Expr,
    },
    Prefetch {
        name: String,
        bounds: Vec<Range>,
    },
    /// Blocks until `count` units of `semaphore` are available, then runs `body`.
    Acquire {
        semaphore: Expr,
        count: Expr,
        body: Stmt,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt(Rc<StmtKind>);

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Stmt(Rc::new(kind))
    }

    pub fn kind(&self) -> &StmtKind {
        &self.0
    }

    pub fn same_as(&self, other: &Stmt) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// The canonical no-op: `Evaluate(0)`.
    pub fn no_op() -> Self {
        Stmt::evaluate(Expr::int(0))
    }

    /// True if the statement is an evaluation of a constant.
    pub fn is_no_op(&self) -> bool {
        matches!(self.kind(), StmtKind::Evaluate { value } if value.is_const())
    }

    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Self {
        Stmt::new(StmtKind::Let {
            name: name.into(),
            value,
            body,
        })
    }

    pub fn for_loop(
        name: impl Into<String>,
        min: Expr,
        extent: Expr,
        for_type: ForType,
        body: Stmt,
    ) -> Self {
        Stmt::new(StmtKind::For {
            name: name.into(),
            min,
            extent,
            for_type,
            body,
        })
    }

    pub fn block(first: Stmt, rest: Stmt) -> Self {
        Stmt::new(StmtKind::Block { first, rest })
    }

    /// Right-nested block of a statement sequence. Empty sequences become a no-op.
    pub fn block_of(stmts: Vec<Stmt>) -> Self {
        let mut iter = stmts.into_iter().rev();
        match iter.next() {
            None => Stmt::no_op(),
            Some(last) => iter.fold(last, |rest, first| Stmt::block(first, rest)),
        }
    }

    pub fn fork(first: Stmt, rest: Stmt) -> Self {
        Stmt::new(StmtKind::Fork { first, rest })
    }

    pub fn realize(
        name: impl Into<String>,
        types: Vec<Type>,
        bounds: Vec<Range>,
        condition: Expr,
        body: Stmt,
    ) -> Self {
        Stmt::new(StmtKind::Realize {
            name: name.into(),
            types,
            bounds,
            condition,
            body,
        })
    }

    pub fn if_then_else(condition: Expr, then_case: Stmt, else_case: Option<Stmt>) -> Self {
        Stmt::new(StmtKind::IfThenElse {
            condition,
            then_case,
            else_case,
        })
    }

    pub fn producer_consumer(name: impl Into<String>, is_producer: bool, body: Stmt) -> Self {
        Stmt::new(StmtKind::ProducerConsumer {
            name: name.into(),
            is_producer,
            body,
        })
    }

    pub fn produce(name: impl Into<String>, body: Stmt) -> Self {
        Stmt::producer_consumer(name, true, body)
    }

    pub fn consume(name: impl Into<String>, body: Stmt) -> Self {
        Stmt::producer_consumer(name, false, body)
    }

    pub fn evaluate(value: Expr) -> Self {
        Stmt::new(StmtKind::Evaluate { value })
    }

    pub fn provide(name: impl Into<String>, values: Vec<Expr>, args: Vec<Expr>) -> Self {
        Stmt::new(StmtKind::Provide {
            name: name.into(),
            values,
            args,
        })
    }

    pub fn assert(condition: Expr, message: Expr) -> Self {
        Stmt::new(StmtKind::Assert { condition, message })
    }

    pub fn prefetch(name: impl Into<String>, bounds: Vec<Range>) -> Self {
        Stmt::new(StmtKind::Prefetch {
            name: name.into(),
            bounds,
        })
    }

    pub fn acquire(semaphore: Expr, count: Expr, body: Stmt) -> Self {
        Stmt::new(StmtKind::Acquire {
            semaphore,
            count,
            body,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

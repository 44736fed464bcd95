// printer.rs — Textual rendering of IR trees and modules
//
// Renders the same syntax `parser` reads: two-space indentation, one
// statement per line, fully parenthesised binary operators and `: type`
// ascriptions on variables and calls whose type is not `i32`.
//
// Preconditions: none.
// Postconditions: parse(print(m)) is structurally equal to m up to block
//   re-association, so print(parse(print(m))) == print(m).
// Failure modes: none (fmt errors only).
// Side effects: none.

use std::fmt::{self, Write as _};

use crate::ir::{BinOp, CallType, Expr, ExprKind, ForType, Range, Stmt, StmtKind, Type};
use crate::module::Module;

// ── Types ──────────────────────────────────────────────────────────────────

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::UInt(bits) => write!(f, "u{bits}"),
            Type::Float(bits) => write!(f, "f{bits}"),
            Type::Bool => f.write_str("bool"),
            Type::Handle => f.write_str("handle"),
            Type::Semaphore => f.write_str("semaphore"),
        }
    }
}

/// Inverse of `Type`'s `Display`.
pub fn parse_type(name: &str) -> Option<Type> {
    match name {
        "bool" => Some(Type::Bool),
        "handle" => Some(Type::Handle),
        "semaphore" => Some(Type::Semaphore),
        _ => {
            let mut chars = name.chars();
            let kind = chars.next()?;
            let bits: u8 = chars.as_str().parse().ok()?;
            match kind {
                'i' => Some(Type::Int(bits)),
                'u' => Some(Type::UInt(bits)),
                'f' => Some(Type::Float(bits)),
                _ => None,
            }
        }
    }
}

// ── Expressions ────────────────────────────────────────────────────────────

fn op_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Min => "min",
        BinOp::Max => "max",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_ascription(f: &mut fmt::Formatter<'_>, ty: Type) -> fmt::Result {
    if ty != Type::I32 {
        write!(f, ": {ty}")?;
    }
    Ok(())
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::IntImm(v) => write!(f, "{v}"),
            ExprKind::BoolImm(b) => write!(f, "{b}"),
            ExprKind::StringImm(s) => write_string_literal(f, s),
            ExprKind::Var { name, ty } => {
                f.write_str(name)?;
                write_ascription(f, *ty)
            }
            ExprKind::Binary { op, a, b } => match op {
                BinOp::Min | BinOp::Max => write!(f, "{}({a}, {b})", op_symbol(*op)),
                _ => write!(f, "({a} {} {b})", op_symbol(*op)),
            },
            ExprKind::Call {
                name,
                args,
                call_type,
                ty,
            } => {
                match call_type {
                    CallType::Extern => f.write_str("extern ")?,
                    CallType::Intrinsic => f.write_str("intrinsic ")?,
                    CallType::Func => {}
                }
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_char(')')?;
                write_ascription(f, *ty)
            }
            ExprKind::Let { name, value, body } => write!(f, "(let {name} = {value} in {body})"),
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.extent)
    }
}

// ── Statements ─────────────────────────────────────────────────────────────

fn indent(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_str("  ")?;
    }
    Ok(())
}

/// Body of a braced statement whose opening line is already written.
fn write_body(f: &mut fmt::Formatter<'_>, body: &Stmt, depth: usize) -> fmt::Result {
    write_stmt(f, body, depth + 1)?;
    indent(f, depth)?;
    f.write_str("}\n")
}

fn write_stmt(f: &mut fmt::Formatter<'_>, s: &Stmt, depth: usize) -> fmt::Result {
    // Blocks are flattened into consecutive lines at the same depth.
    if let StmtKind::Block { first, rest } = s.kind() {
        write_stmt(f, first, depth)?;
        return write_stmt(f, rest, depth);
    }

    indent(f, depth)?;
    match s.kind() {
        StmtKind::Block { .. } => unreachable!("handled above"),
        StmtKind::Let { name, value, body } => {
            writeln!(f, "let {name} = {value} {{")?;
            write_body(f, body, depth)
        }
        StmtKind::For {
            name,
            min,
            extent,
            for_type,
            body,
        } => {
            let prefix = match for_type {
                ForType::Serial => "",
                ForType::Parallel => "parallel ",
                ForType::Vectorized => "vectorized ",
                ForType::Unrolled => "unrolled ",
            };
            writeln!(f, "{prefix}for {name}({min}, {extent}) {{")?;
            write_body(f, body, depth)
        }
        StmtKind::Fork { first, rest } => {
            f.write_str("fork {\n")?;
            write_stmt(f, first, depth + 1)?;
            indent(f, depth)?;
            f.write_str("} {\n")?;
            write_body(f, rest, depth)
        }
        StmtKind::Realize {
            name,
            types,
            bounds,
            condition,
            body,
        } => {
            write!(f, "realize {name}")?;
            if !types.is_empty() {
                f.write_char('<')?;
                write_list(f, types)?;
                f.write_char('>')?;
            }
            f.write_char('(')?;
            write_list(f, bounds)?;
            f.write_char(')')?;
            if !matches!(condition.kind(), ExprKind::BoolImm(true)) {
                write!(f, " if {condition}")?;
            }
            f.write_str(" {\n")?;
            write_body(f, body, depth)
        }
        StmtKind::IfThenElse {
            condition,
            then_case,
            else_case,
        } => {
            writeln!(f, "if {condition} {{")?;
            write_stmt(f, then_case, depth + 1)?;
            indent(f, depth)?;
            match else_case {
                Some(else_case) => {
                    f.write_str("} else {\n")?;
                    write_body(f, else_case, depth)
                }
                None => f.write_str("}\n"),
            }
        }
        StmtKind::ProducerConsumer {
            name,
            is_producer,
            body,
        } => {
            let keyword = if *is_producer { "produce" } else { "consume" };
            writeln!(f, "{keyword} {name} {{")?;
            write_body(f, body, depth)
        }
        StmtKind::Evaluate { value } => writeln!(f, "{value};"),
        StmtKind::Provide { name, values, args } => {
            write!(f, "provide {name}(")?;
            write_list(f, args)?;
            f.write_str(") = ")?;
            if let [value] = values.as_slice() {
                write!(f, "{value}")?;
            } else {
                f.write_char('{')?;
                write_list(f, values)?;
                f.write_char('}')?;
            }
            f.write_str(";\n")
        }
        StmtKind::Assert { condition, message } => writeln!(f, "assert({condition}, {message});"),
        StmtKind::Prefetch { name, bounds } => {
            write!(f, "prefetch {name}(")?;
            write_list(f, bounds)?;
            f.write_str(");\n")
        }
        StmtKind::Acquire {
            semaphore,
            count,
            body,
        } => {
            writeln!(f, "acquire ({semaphore}, {count}) {{")?;
            write_body(f, body, depth)
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stmt(f, self, 0)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in self.env.iter() {
            if func.schedule.is_async {
                f.write_str("async ")?;
            }
            writeln!(f, "func {};", func.name)?;
        }
        write_stmt(f, &self.body, 0)
    }
}

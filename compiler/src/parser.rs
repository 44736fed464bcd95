// Parser for textual IR modules.
//
// Parses a token stream (from the lexer) into a `Module`: function
// declarations followed by a statement sequence. Uses chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns a module plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::diag::{codes, Diagnostic};
use crate::env::Function;
use crate::ir::{BinOp, CallType, Expr, ForType, Range, Stmt, Type};
use crate::lexer::{self, Token};
use crate::module::Module;
use crate::printer::parse_type;

pub type ParseError = Rich<'static, Token, SimpleSpan>;

/// Result of parsing: module plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: Vec<ParseError>,
}

impl ParseResult {
    /// Lex and parse errors as `E0001` diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.errors
            .iter()
            .map(|e| {
                let span = e.span();
                Diagnostic::error(e.to_string())
                    .with_code(codes::E0001)
                    .with_span(lexer::Span {
                        start: span.start(),
                        end: span.end(),
                    })
            })
            .collect()
    }
}

/// Parse a textual IR module. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = lexer::lex(source);
    let len = source.len();

    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = module_parser(source);
    let (module, parse_errors) = parser.parse(stream).into_output_errors();

    let mut errors: Vec<ParseError> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult { module, errors }
}

fn fold_binary((first, rest): (Expr, Vec<(BinOp, Expr)>)) -> Expr {
    rest.into_iter()
        .fold(first, |a, (op, b)| Expr::binary(op, a, b))
}

// ── Main parser builder ──
//
// All grammar rules are built inside `module_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn module_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Module, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Names and types ──

    let name = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        source[span.start()..span.end()].to_string()
    });

    let ty = name.clone().try_map(|n: String, span| {
        parse_type(&n).ok_or_else(|| Rich::custom(span, format!("unknown type '{n}'")))
    });

    let ascription = just(Token::Colon)
        .ignore_then(ty.clone())
        .or_not()
        .map(|t| t.unwrap_or(Type::I32));

    // ── Expressions ──

    let expr = recursive(|expr| {
        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let int = select! { Token::Int(v) => v };
        let literal = choice((
            just(Token::Minus)
                .ignore_then(int.clone())
                .map(|v: i64| Expr::int(-v)),
            int.map(Expr::int),
            just(Token::True).to(Expr::bool(true)),
            just(Token::False).to(Expr::bool(false)),
            select! { Token::Str(s) => Expr::string(s) },
        ));

        let call_type = choice((
            just(Token::Extern).to(CallType::Extern),
            just(Token::Intrinsic).to(CallType::Intrinsic),
        ));
        let explicit_call = call_type
            .then(name.clone())
            .then(args.clone())
            .then(ascription.clone())
            .map(|(((call_type, name), args), ty)| Expr::call(name, args, call_type, ty));

        // `f(..)` reads a pipeline function; a bare name is a variable.
        let named = name
            .clone()
            .then(args.or_not())
            .then(ascription.clone())
            .map(|((name, args), ty)| match args {
                Some(args) => Expr::call(name, args, CallType::Func, ty),
                None => Expr::var(name, ty),
            });

        let min_max = choice((
            just(Token::Min).to(BinOp::Min),
            just(Token::Max).to(BinOp::Max),
        ))
        .then(
            expr.clone()
                .then_ignore(just(Token::Comma))
                .then(expr.clone())
                .delimited_by(just(Token::LParen), just(Token::RParen)),
        )
        .map(|(op, (a, b))| Expr::binary(op, a, b));

        let let_in = just(Token::Let)
            .ignore_then(name.clone())
            .then_ignore(just(Token::Equals))
            .then(expr.clone())
            .then_ignore(just(Token::In))
            .then(expr.clone())
            .map(|((name, value), body)| Expr::let_in(name, value, body));

        let paren = let_in
            .or(expr.clone())
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let atom = choice((literal, explicit_call, min_max, named, paren)).boxed();

        let product = atom
            .clone()
            .then(
                choice((
                    just(Token::Star).to(BinOp::Mul),
                    just(Token::Slash).to(BinOp::Div),
                ))
                .then(atom)
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let sum = product
            .clone()
            .then(
                choice((
                    just(Token::Plus).to(BinOp::Add),
                    just(Token::Minus).to(BinOp::Sub),
                ))
                .then(product)
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let comparison = sum
            .clone()
            .then(
                choice((
                    just(Token::Le).to(BinOp::Le),
                    just(Token::Lt).to(BinOp::Lt),
                    just(Token::EqEq).to(BinOp::Eq),
                    just(Token::NotEq).to(BinOp::Ne),
                ))
                .then(sum)
                .repeated()
                .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        let conjunction = comparison
            .clone()
            .then(
                just(Token::AndAnd)
                    .to(BinOp::And)
                    .then(comparison)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(fold_binary)
            .boxed();

        conjunction
            .clone()
            .then(
                just(Token::OrOr)
                    .to(BinOp::Or)
                    .then(conjunction)
                    .repeated()
                    .collect::<Vec<_>>(),
            )
            .map(fold_binary)
    });

    // ── Statements ──

    let stmt = recursive(|stmt| {
        let block = stmt
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace))
            .map(Stmt::block_of)
            .boxed();

        let pair = expr
            .clone()
            .then_ignore(just(Token::Comma))
            .then(expr.clone());

        let args = expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        let ranges = pair
            .clone()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(|(min, extent)| Range::new(min, extent))
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .boxed();

        let let_stmt = just(Token::Let)
            .ignore_then(name.clone())
            .then_ignore(just(Token::Equals))
            .then(expr.clone())
            .then(block.clone())
            .map(|((name, value), body)| Stmt::let_stmt(name, value, body));

        let for_type = choice((
            just(Token::Parallel).to(ForType::Parallel),
            just(Token::Vectorized).to(ForType::Vectorized),
            just(Token::Unrolled).to(ForType::Unrolled),
        ))
        .or_not()
        .map(|t| t.unwrap_or(ForType::Serial));

        let for_stmt = for_type
            .then_ignore(just(Token::For))
            .then(name.clone())
            .then(
                pair.clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block.clone())
            .map(|(((for_type, name), (min, extent)), body)| {
                Stmt::for_loop(name, min, extent, for_type, body)
            });

        let types = ty
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::Lt), just(Token::Gt))
            .or_not()
            .map(|t| t.unwrap_or_default());

        let realize = just(Token::Realize)
            .ignore_then(name.clone())
            .then(types)
            .then(ranges.clone())
            .then(just(Token::If).ignore_then(expr.clone()).or_not())
            .then(block.clone())
            .map(|((((name, types), bounds), condition), body)| {
                let condition = condition.unwrap_or_else(|| Expr::bool(true));
                Stmt::realize(name, types, bounds, condition, body)
            });

        let if_stmt = just(Token::If)
            .ignore_then(expr.clone())
            .then(block.clone())
            .then(just(Token::Else).ignore_then(block.clone()).or_not())
            .map(|((condition, then_case), else_case)| {
                Stmt::if_then_else(condition, then_case, else_case)
            });

        let producer_consumer = choice((
            just(Token::Produce).to(true),
            just(Token::Consume).to(false),
        ))
        .then(name.clone())
        .then(block.clone())
        .map(|((is_producer, name), body)| Stmt::producer_consumer(name, is_producer, body));

        let fork = just(Token::Fork)
            .ignore_then(block.clone())
            .then(block.clone())
            .map(|(first, rest)| Stmt::fork(first, rest));

        let acquire = just(Token::Acquire)
            .ignore_then(
                pair.clone()
                    .delimited_by(just(Token::LParen), just(Token::RParen)),
            )
            .then(block)
            .map(|((semaphore, count), body)| Stmt::acquire(semaphore, count, body));

        let values = expr.clone().map(|v| vec![v]).or(expr
            .clone()
            .separated_by(just(Token::Comma))
            .collect::<Vec<_>>()
            .delimited_by(just(Token::LBrace), just(Token::RBrace)));

        let provide = just(Token::Provide)
            .ignore_then(name.clone())
            .then(args)
            .then_ignore(just(Token::Equals))
            .then(values)
            .then_ignore(just(Token::Semi))
            .map(|((name, args), values)| Stmt::provide(name, values, args));

        let assert = just(Token::Assert)
            .ignore_then(pair.delimited_by(just(Token::LParen), just(Token::RParen)))
            .then_ignore(just(Token::Semi))
            .map(|(condition, message)| Stmt::assert(condition, message));

        let prefetch = just(Token::Prefetch)
            .ignore_then(name.clone())
            .then(ranges)
            .then_ignore(just(Token::Semi))
            .map(|(name, bounds)| Stmt::prefetch(name, bounds));

        let evaluate = expr
            .clone()
            .then_ignore(just(Token::Semi))
            .map(Stmt::evaluate);

        choice((
            let_stmt,
            for_stmt,
            realize,
            if_stmt,
            producer_consumer,
            fork,
            acquire,
            provide,
            assert,
            prefetch,
            evaluate,
        ))
    });

    // ── Module ──

    let decl = just(Token::Async)
        .or_not()
        .map(|a| a.is_some())
        .then_ignore(just(Token::Func))
        .then(name)
        .then_ignore(just(Token::Semi))
        .map(|(is_async, name)| Function::new(name, is_async));

    decl.repeated()
        .collect::<Vec<_>>()
        .then(stmt.repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|(funcs, body)| Module::new(funcs.into_iter().collect(), Stmt::block_of(body)))
}

/// Parse a module that is known to be well formed.
#[cfg(test)]
pub(crate) fn parse_module(source: &str) -> Module {
    let result = parse(source);
    assert!(
        result.errors.is_empty(),
        "unexpected errors: {:#?}",
        result.errors
    );
    result.module.expect("expected module")
}

/// Parse a declaration-free statement sequence.
#[cfg(test)]
pub(crate) fn parse_stmt(source: &str) -> Stmt {
    parse_module(source).body
}

// Lexer for textual IR modules.
//
// Tokenizes the syntax written by `printer`. Uses the `logos` crate for
// DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// IR token types.
///
/// Identifiers carry no value; use the span to retrieve the text. Dotted
/// names such as `f.semaphore_0` or `f.buffer` are single identifiers.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("func")]
    Func,
    #[token("async")]
    Async,
    #[token("let")]
    Let,
    #[token("in")]
    In,
    #[token("for")]
    For,
    #[token("parallel")]
    Parallel,
    #[token("vectorized")]
    Vectorized,
    #[token("unrolled")]
    Unrolled,
    #[token("realize")]
    Realize,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("produce")]
    Produce,
    #[token("consume")]
    Consume,
    #[token("fork")]
    Fork,
    #[token("acquire")]
    Acquire,
    #[token("provide")]
    Provide,
    #[token("assert")]
    Assert,
    #[token("prefetch")]
    Prefetch,
    #[token("extern")]
    Extern,
    #[token("intrinsic")]
    Intrinsic,
    #[token("min")]
    Min,
    #[token("max")]
    Max,
    #[token("true")]
    True,
    #[token("false")]
    False,

    // ── Symbols ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token("=")]
    Equals,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,

    // ── Literals ──
    /// Unsigned integer literal; negation is a parser concern.
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),

    /// String literal with `\"`, `\\`, `\n` and `\t` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    Str(String),

    // ── Identifier ──
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Func => "func",
            Token::Async => "async",
            Token::Let => "let",
            Token::In => "in",
            Token::For => "for",
            Token::Parallel => "parallel",
            Token::Vectorized => "vectorized",
            Token::Unrolled => "unrolled",
            Token::Realize => "realize",
            Token::If => "if",
            Token::Else => "else",
            Token::Produce => "produce",
            Token::Consume => "consume",
            Token::Fork => "fork",
            Token::Acquire => "acquire",
            Token::Provide => "provide",
            Token::Assert => "assert",
            Token::Prefetch => "prefetch",
            Token::Extern => "extern",
            Token::Intrinsic => "intrinsic",
            Token::Min => "min",
            Token::Max => "max",
            Token::True => "true",
            Token::False => "false",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Semi => ";",
            Token::Colon => ":",
            Token::Equals => "=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Int(v) => return write!(f, "{v}"),
            Token::Str(s) => return write!(f, "{s:?}"),
            Token::Ident => "<ident>",
        };
        f.write_str(text)
    }
}

// ── Callbacks ──

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                'n' => result.push('\n'),
                't' => result.push('\t'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a textual IR module into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected input: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

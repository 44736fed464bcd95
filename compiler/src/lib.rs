// pfc — Pixelflow compiler middle-end
//
// Library root. Lowers async producer functions into forked producer and
// consumer tasks synchronized by runtime semaphores.

pub mod acquire_scope;
pub mod config;
pub mod consume_scope;
pub mod diag;
pub mod env;
pub mod error;
pub mod fork_scope;
pub mod id;
pub mod init_semaphores;
pub mod ir;
pub mod lexer;
pub mod module;
pub mod mutator;
pub mod noop;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod printer;
pub mod semaphore;
pub mod split;
pub mod uses;
pub mod verify;

pub use pipeline::fork_async_producers;

//! Front end for the kscope expression language: a pull-based lexer, a
//! precedence-climbing parser, the AST it builds, and a visitor protocol for
//! consumers of that AST. An S-expression printer and a tree-walking
//! interpreter ship as consumers, and `driver` ties everything into a
//! read-parse-evaluate loop.

pub mod ast;
pub mod driver;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod visitor;

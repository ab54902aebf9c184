//! # Space Lua - Abstract Syntax Tree
//!
//! Node definitions shared by the lexer, parser, and evaluator.
//!
//! The AST module is organized into focused submodules:
//!
//! - **[tokens]** - Lexical tokens with source spans
//! - **[expressions]** - Expression nodes (literals, operations, calls, tables, closures)
//! - **[operators]** - Binary and unary operators with their binding powers
//! - **[statements]** - Statement nodes (blocks, control flow, declarations)
//! - **[query]** - Collection query blocks (`query[[ from ... ]]`)
//!
//! Every node carries a [`Span`] pointing back into the source text, so
//! runtime errors can be attributed without re-parsing. Parse failure
//! surfaces as a [`crate::SyntaxError`]; no partial nodes escape the parser.

pub mod expressions;
pub mod operators;
pub mod query;
pub mod statements;
pub mod tokens;

pub use expressions::{Expr, ExprKind, FunctionBody, TableField};
pub use operators::{BinOp, UnOp};
pub use query::{CollectionQuery, OrderBy};
pub use statements::{Block, LocalName, Stmt, StmtKind};
pub use tokens::{Span, Token, TokenKind};

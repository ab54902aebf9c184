//! An embeddable Lua-dialect scripting engine with a collection query
//! extension.
//!
//! The pipeline is source → [`lexer::tokenize`] → [`parser::parse`] →
//! [`evaluator::Evaluator`]. Scripts can run `query[[ from ... ]]` blocks
//! against prefix ranges of a [`store::DataStore`].
//!
//! ```no_run
//! use space_lua::Interpreter;
//!
//! let lua = Interpreter::new();
//! let results = lua.eval("local x = 2 return x + 1")?;
//! # Ok::<(), space_lua::Error>(())
//! ```

pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod evaluator;
pub mod lexer;
pub mod output;
pub mod parser;
pub mod query;
pub mod runtime;
pub mod stdlib;
pub mod store;
pub mod value;

pub use ast::{
    BinOp, Block, CollectionQuery, Expr, ExprKind, OrderBy, Span, Stmt, StmtKind, Token,
    TokenKind, UnOp,
};
pub use evaluator::{Control, Evaluator};
pub use lexer::{strip_comments, tokenize, SyntaxError};
pub use output::{to_json, to_json_pretty, to_lua};
pub use parser::{parse, parse_expression};
pub use query::{run_query, Collection};
pub use runtime::{LuaEnv, RuntimeError, StackFrame};
pub use store::{DataStore, KvEntry, KvKey, KvPrimitives, MemoryKv, ScanStep, StoreError};
pub use value::{HostFunction, HostObject, LuaClosure, LuaKey, LuaNumber, LuaTable, LuaValue};

/// Any failure the crate can produce, from tokenizing through query
/// execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ready-to-use interpreter: a root environment with the base library
/// installed and an evaluator to run chunks in it.
pub struct Interpreter {
    evaluator: Evaluator,
    globals: LuaEnv,
}

impl Default for Interpreter {
    fn default() -> Self {
        let globals = LuaEnv::new();
        stdlib::install(&globals);
        Interpreter {
            evaluator: Evaluator::new(),
            globals,
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::default()
    }

    pub fn with_max_call_depth(max_call_depth: usize) -> Self {
        Interpreter {
            evaluator: Evaluator::with_max_call_depth(max_call_depth),
            ..Interpreter::default()
        }
    }

    /// The root (global) environment.
    pub fn globals(&self) -> &LuaEnv {
        &self.globals
    }

    /// Expose a host value (function, table, queryable collection) as a
    /// global.
    pub fn define(&self, name: &str, value: LuaValue) {
        self.globals.define_local(name, value, false);
    }

    /// Parse and run a chunk, returning the values of its top-level
    /// `return` (if any).
    pub fn eval(&self, source: &str) -> Result<Vec<LuaValue>, Error> {
        let block = parser::parse(source)?;
        let frame = StackFrame::root("main chunk");
        Ok(self.evaluator.run(&block, &self.globals, &frame)?)
    }

    /// Parse and evaluate a single expression.
    pub fn eval_expression(&self, source: &str) -> Result<LuaValue, Error> {
        let expr = parser::parse_expression(source)?;
        let frame = StackFrame::root("expression");
        Ok(self.evaluator.eval(&expr, &self.globals, &frame)?)
    }
}

use crate::ast::operators::{BinOp, UnOp};
use crate::ast::query::CollectionQuery;
use crate::ast::statements::Block;
use crate::ast::tokens::Span;

/// An expression with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// `nil`
    Nil,
    /// `true`
    True,
    /// `false`
    False,
    /// Integer literal (integer subtype is preserved through evaluation)
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal (quoted or long-bracket)
    Str(String),
    /// `...` inside a variadic function
    Varargs,
    /// Name reference, resolved against the environment chain
    Variable(String),

    /// `object[key]`
    Index { object: Box<Expr>, key: Box<Expr> },
    /// `object.name`
    Field { object: Box<Expr>, name: String },
    /// `callee(args)`, `callee{...}` or `callee "str"`
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `object:method(args)` — the receiver is passed as the first argument
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },

    /// `function(params) body end`
    Function(FunctionBody),
    /// `{ field, name = expr, [key] = expr, ... }`
    Table(Vec<TableField>),

    /// Binary operation
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation
    Unary { op: UnOp, operand: Box<Expr> },

    /// Parenthesized expression
    ///
    /// Kept as a node because `(f())` truncates a multi-value call to its
    /// first result.
    Paren(Box<Expr>),

    /// `query[[ from ... ]]` block; `source` is the `from` expression
    Query {
        source: Box<Expr>,
        query: Box<CollectionQuery>,
    },
}

/// One field of a table constructor.
#[derive(Debug, Clone, PartialEq)]
pub enum TableField {
    /// `expr` — appended to the array part
    Positional(Expr),
    /// `name = expr`
    Named { name: String, value: Expr },
    /// `[key] = expr`
    Computed { key: Expr, value: Expr },
}

/// Parameter list and body shared by function expressions and declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub params: Vec<String>,
    pub is_vararg: bool,
    pub body: Block,
}

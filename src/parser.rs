use std::mem;

use crate::ast::{
    BinOp, Block, CollectionQuery, Expr, ExprKind, FunctionBody, LocalName, OrderBy, Span, Stmt,
    StmtKind, TableField, Token, TokenKind, UnOp,
    operators::UNARY_POWER,
};
use crate::lexer::{self, SyntaxError};

/// Parse a complete chunk into a [`Block`].
pub fn parse(source: &str) -> Result<Block, SyntaxError> {
    let mut parser = Parser::new(source)?;
    let block = parser.parse_block()?;
    parser.expect(TokenKind::Eof)?;
    Ok(block)
}

/// Parse a single expression, requiring it to consume the whole input.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.parse_expr()?;
    parser.expect(TokenKind::Eof)?;
    Ok(expr)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// One entry per enclosing function; `true` when that function is
    /// variadic. The chunk itself counts as variadic, like Lua's main chunk.
    vararg_stack: Vec<bool>,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, SyntaxError> {
        Ok(Parser {
            tokens: lexer::tokenize(source)?,
            pos: 0,
            vararg_stack: vec![true],
        })
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_kind(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn span(&self) -> Span {
        self.current().span
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        mem::discriminant(self.kind()) == mem::discriminant(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected {}, got {}",
                kind.describe(),
                self.kind().describe()
            )))
        }
    }

    fn expect_name(&mut self) -> Result<String, SyntaxError> {
        match self.kind() {
            TokenKind::Name(_) => match self.advance().kind {
                TokenKind::Name(name) => Ok(name),
                _ => unreachable!(),
            },
            other => Err(self.error(format!("expected name, got {}", other.describe()))),
        }
    }

    /// Consume a contextual keyword (`from`, `where`, ...) which the lexer
    /// treats as an ordinary name.
    fn expect_contextual(&mut self, word: &str) -> Result<(), SyntaxError> {
        match self.kind() {
            TokenKind::Name(name) if name == word => {
                self.advance();
                Ok(())
            }
            other => Err(self.error(format!(
                "expected '{}', got {}",
                word,
                other.describe()
            ))),
        }
    }

    fn check_contextual(&self, word: &str) -> bool {
        matches!(self.kind(), TokenKind::Name(name) if name == word)
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.span().start)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    pub fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        let mut stmts = Vec::new();
        loop {
            match self.kind() {
                TokenKind::End
                | TokenKind::Else
                | TokenKind::Elseif
                | TokenKind::Until
                | TokenKind::Eof => break,
                TokenKind::Semi => {
                    self.advance();
                }
                TokenKind::Return => {
                    stmts.push(self.parse_return()?);
                    self.eat(&TokenKind::Semi);
                    // return ends the block
                    break;
                }
                _ => stmts.push(self.parse_statement()?),
            }
        }
        Ok(Block { stmts })
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.span();
        match self.kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Repeat => self.parse_repeat(),
            TokenKind::For => self.parse_for(),
            TokenKind::Do => {
                self.advance();
                let body = self.parse_block()?;
                let end = self.expect(TokenKind::End)?.span;
                Ok(Stmt::new(StmtKind::Do(body), start.merge(end)))
            }
            TokenKind::Function => self.parse_function_decl(),
            TokenKind::Local => self.parse_local(),
            TokenKind::Break => {
                let span = self.advance().span;
                Ok(Stmt::new(StmtKind::Break, span))
            }
            TokenKind::Goto => {
                self.advance();
                let name = self.expect_name()?;
                Ok(Stmt::new(StmtKind::Goto(name), start))
            }
            TokenKind::DoubleColon => {
                self.advance();
                let name = self.expect_name()?;
                let end = self.expect(TokenKind::DoubleColon)?.span;
                Ok(Stmt::new(StmtKind::Label(name), start.merge(end)))
            }
            _ => self.parse_expr_statement(),
        }
    }

    fn parse_return(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Return)?.span;
        let values = match self.kind() {
            TokenKind::End
            | TokenKind::Else
            | TokenKind::Elseif
            | TokenKind::Until
            | TokenKind::Eof
            | TokenKind::Semi => Vec::new(),
            _ => self.parse_expr_list()?,
        };
        Ok(Stmt::new(StmtKind::Return(values), start))
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::If)?.span;
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Then)?;
        arms.push((cond, self.parse_block()?));
        let mut else_block = None;
        loop {
            match self.kind() {
                TokenKind::Elseif => {
                    self.advance();
                    let cond = self.parse_expr()?;
                    self.expect(TokenKind::Then)?;
                    arms.push((cond, self.parse_block()?));
                }
                TokenKind::Else => {
                    self.advance();
                    else_block = Some(self.parse_block()?);
                    break;
                }
                _ => break,
            }
        }
        let end = self.expect(TokenKind::End)?.span;
        Ok(Stmt::new(
            StmtKind::If { arms, else_block },
            start.merge(end),
        ))
    }

    fn parse_while(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::While)?.span;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_block()?;
        let end = self.expect(TokenKind::End)?.span;
        Ok(Stmt::new(StmtKind::While { cond, body }, start.merge(end)))
    }

    fn parse_repeat(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Repeat)?.span;
        let body = self.parse_block()?;
        self.expect(TokenKind::Until)?;
        let until = self.parse_expr()?;
        let span = start.merge(until.span);
        Ok(Stmt::new(StmtKind::Repeat { body, until }, span))
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::For)?.span;
        let first = self.expect_name()?;

        if self.eat(&TokenKind::Assign) {
            let start_expr = self.parse_expr()?;
            self.expect(TokenKind::Comma)?;
            let stop = self.parse_expr()?;
            let step = if self.eat(&TokenKind::Comma) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(TokenKind::Do)?;
            let body = self.parse_block()?;
            let end = self.expect(TokenKind::End)?.span;
            return Ok(Stmt::new(
                StmtKind::NumericFor {
                    var: first,
                    start: start_expr,
                    stop,
                    step,
                    body,
                },
                start.merge(end),
            ));
        }

        let mut names = vec![first];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_name()?);
        }
        self.expect(TokenKind::In)?;
        let exprs = self.parse_expr_list()?;
        self.expect(TokenKind::Do)?;
        let body = self.parse_block()?;
        let end = self.expect(TokenKind::End)?.span;
        Ok(Stmt::new(
            StmtKind::GenericFor { names, exprs, body },
            start.merge(end),
        ))
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Function)?.span;
        let mut path = vec![self.expect_name()?];
        while self.eat(&TokenKind::Dot) {
            path.push(self.expect_name()?);
        }
        let method = if self.eat(&TokenKind::Colon) {
            Some(self.expect_name()?)
        } else {
            None
        };
        let is_method = method.is_some();
        let body = self.parse_function_body(is_method)?;
        Ok(Stmt::new(
            StmtKind::FunctionDecl { path, method, body },
            start,
        ))
    }

    fn parse_local(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.expect(TokenKind::Local)?.span;
        if self.eat(&TokenKind::Function) {
            let name = self.expect_name()?;
            let body = self.parse_function_body(false)?;
            return Ok(Stmt::new(StmtKind::LocalFunction { name, body }, start));
        }

        let mut names = vec![self.parse_local_name()?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.parse_local_name()?);
        }
        let values = if self.eat(&TokenKind::Assign) {
            self.parse_expr_list()?
        } else {
            Vec::new()
        };
        Ok(Stmt::new(StmtKind::Local { names, values }, start))
    }

    fn parse_local_name(&mut self) -> Result<LocalName, SyntaxError> {
        let name = self.expect_name()?;
        let mut is_const = false;
        if self.eat(&TokenKind::Lt) {
            let attrib = self.expect_name()?;
            match attrib.as_str() {
                "const" | "close" => is_const = true,
                other => {
                    return Err(self.error(format!("unknown attribute '<{}>'", other)));
                }
            }
            self.expect(TokenKind::Gt)?;
        }
        Ok(LocalName { name, is_const })
    }

    /// An expression statement is either an assignment or a call.
    fn parse_expr_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let start = self.span();
        let first = self.parse_suffixed_expr()?;

        if self.check(&TokenKind::Assign) || self.check(&TokenKind::Comma) {
            let mut targets = vec![first];
            while self.eat(&TokenKind::Comma) {
                targets.push(self.parse_suffixed_expr()?);
            }
            for target in &targets {
                match target.kind {
                    ExprKind::Variable(_) | ExprKind::Field { .. } | ExprKind::Index { .. } => {}
                    _ => {
                        return Err(SyntaxError::new(
                            "cannot assign to this expression",
                            target.span.start,
                        ));
                    }
                }
            }
            self.expect(TokenKind::Assign)?;
            let values = self.parse_expr_list()?;
            return Ok(Stmt::new(StmtKind::Assign { targets, values }, start));
        }

        match first.kind {
            ExprKind::Call { .. } | ExprKind::MethodCall { .. } | ExprKind::Query { .. } => {
                let span = first.span;
                Ok(Stmt::new(StmtKind::Expr(first), span))
            }
            _ => Err(SyntaxError::new("syntax error near expression (only calls can be used as statements)", first.span.start)),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_expr(0)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut exprs = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_expr()?);
        }
        Ok(exprs)
    }

    /// Precedence climbing over the binding powers declared on [`BinOp`].
    fn parse_binary_expr(&mut self, min_power: u8) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary_expr()?;

        loop {
            let op = match binary_op(self.kind()) {
                Some(op) => op,
                None => break,
            };
            let (left_power, right_power) = op.binding_power();
            if left_power < min_power {
                break;
            }
            self.advance();
            let right = self.parse_binary_expr(right_power)?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.kind() {
            TokenKind::Not => Some(UnOp::Not),
            TokenKind::Hash => Some(UnOp::Len),
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let operand = self.parse_binary_expr(UNARY_POWER)?;
            let span = start.merge(operand.span);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.parse_simple_expr()
    }

    fn parse_simple_expr(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        let kind = match self.kind().clone() {
            TokenKind::Nil => {
                self.advance();
                ExprKind::Nil
            }
            TokenKind::True => {
                self.advance();
                ExprKind::True
            }
            TokenKind::False => {
                self.advance();
                ExprKind::False
            }
            TokenKind::Int(n) => {
                self.advance();
                ExprKind::Int(n)
            }
            TokenKind::Float(n) => {
                self.advance();
                ExprKind::Float(n)
            }
            TokenKind::Str(s) | TokenKind::LongStr(s) => {
                self.advance();
                ExprKind::Str(s)
            }
            TokenKind::Ellipsis => {
                if !self.vararg_stack.last().copied().unwrap_or(false) {
                    return Err(self.error("cannot use '...' outside a vararg function"));
                }
                self.advance();
                ExprKind::Varargs
            }
            TokenKind::Function => {
                self.advance();
                ExprKind::Function(self.parse_function_body(false)?)
            }
            TokenKind::LBrace => return self.parse_table_constructor(),
            _ => return self.parse_suffixed_expr(),
        };
        Ok(Expr::new(kind, span))
    }

    /// Prefix expression plus any chain of index, field, call, and method
    /// suffixes.
    fn parse_suffixed_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary_expr()?;

        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_name()?;
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::Field {
                            object: Box::new(expr),
                            name,
                        },
                        span,
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    let end = self.expect(TokenKind::RBracket)?.span;
                    let span = expr.span.merge(end);
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            key: Box::new(key),
                        },
                        span,
                    );
                }
                TokenKind::Colon => {
                    self.advance();
                    let method = self.expect_name()?;
                    let args = match self.parse_call_args()? {
                        Some(args) => args,
                        None => {
                            return Err(self.error("expected arguments after method name"));
                        }
                    };
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::MethodCall {
                            object: Box::new(expr),
                            method,
                            args,
                        },
                        span,
                    );
                }
                TokenKind::LParen | TokenKind::LBrace | TokenKind::Str(_)
                | TokenKind::LongStr(_) => {
                    let args = match self.parse_call_args()? {
                        Some(args) => args,
                        None => break,
                    };
                    let span = expr.span;
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.span();
        match self.kind().clone() {
            TokenKind::Name(name) => {
                // `query[[...]]` sugar: a long-bracket string right after the
                // name `query` is a collection query block.
                if name == "query" {
                    if let Some(TokenKind::LongStr(body)) = self.peek_kind(1).cloned() {
                        self.advance();
                        let str_span = self.advance().span;
                        let (source, query) = parse_query_block(&body, str_span)?;
                        return Ok(Expr::new(
                            ExprKind::Query {
                                source: Box::new(source),
                                query: Box::new(query),
                            },
                            span.merge(str_span),
                        ));
                    }
                }
                self.advance();
                Ok(Expr::new(ExprKind::Variable(name), span))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(TokenKind::RParen)?.span;
                Ok(Expr::new(
                    ExprKind::Paren(Box::new(inner)),
                    span.merge(end),
                ))
            }
            other => Err(self.error(format!("unexpected {}", other.describe()))),
        }
    }

    /// Returns `None` when the current token cannot start call arguments.
    fn parse_call_args(&mut self) -> Result<Option<Vec<Expr>>, SyntaxError> {
        match self.kind().clone() {
            TokenKind::LParen => {
                self.advance();
                let args = if self.check(&TokenKind::RParen) {
                    Vec::new()
                } else {
                    self.parse_expr_list()?
                };
                self.expect(TokenKind::RParen)?;
                Ok(Some(args))
            }
            TokenKind::LBrace => {
                let table = self.parse_table_constructor()?;
                Ok(Some(vec![table]))
            }
            TokenKind::Str(s) | TokenKind::LongStr(s) => {
                let span = self.advance().span;
                Ok(Some(vec![Expr::new(ExprKind::Str(s), span)]))
            }
            _ => Ok(None),
        }
    }

    fn parse_table_constructor(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut fields = Vec::new();

        while !self.check(&TokenKind::RBrace) {
            let field = match self.kind() {
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_expr()?;
                    TableField::Computed { key, value }
                }
                TokenKind::Name(_) if self.peek_kind(1) == Some(&TokenKind::Assign) => {
                    let name = self.expect_name()?;
                    self.expect(TokenKind::Assign)?;
                    let value = self.parse_expr()?;
                    TableField::Named { name, value }
                }
                _ => TableField::Positional(self.parse_expr()?),
            };
            fields.push(field);

            // Comma or semicolon between fields, optionally trailing.
            if !self.eat(&TokenKind::Comma) && !self.eat(&TokenKind::Semi) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(Expr::new(ExprKind::Table(fields), start.merge(end)))
    }

    fn parse_function_body(&mut self, is_method: bool) -> Result<FunctionBody, SyntaxError> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if is_method {
            params.push("self".to_string());
        }
        let mut is_vararg = false;
        if !self.check(&TokenKind::RParen) {
            loop {
                match self.kind() {
                    TokenKind::Ellipsis => {
                        self.advance();
                        is_vararg = true;
                        // `...` must be the last parameter
                        break;
                    }
                    _ => params.push(self.expect_name()?),
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        self.vararg_stack.push(is_vararg);
        let body = self.parse_block()?;
        self.vararg_stack.pop();
        self.expect(TokenKind::End)?;

        Ok(FunctionBody {
            params,
            is_vararg,
            body,
        })
    }
}

fn binary_op(kind: &TokenKind) -> Option<BinOp> {
    let op = match kind {
        TokenKind::Or => BinOp::Or,
        TokenKind::And => BinOp::And,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Le => BinOp::Le,
        TokenKind::Ge => BinOp::Ge,
        TokenKind::Ne => BinOp::Ne,
        TokenKind::Eq => BinOp::Eq,
        TokenKind::Pipe => BinOp::BitOr,
        TokenKind::Tilde => BinOp::BitXor,
        TokenKind::Amp => BinOp::BitAnd,
        TokenKind::Shl => BinOp::Shl,
        TokenKind::Shr => BinOp::Shr,
        TokenKind::DotDot => BinOp::Concat,
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::SlashSlash => BinOp::IntDiv,
        TokenKind::Percent => BinOp::Mod,
        TokenKind::Caret => BinOp::Pow,
        _ => return None,
    };
    Some(op)
}

/// Parse the text of a `query[[ ... ]]` block:
///
/// ```text
/// from [name =] source
///   [where expr]
///   [order by expr [asc|desc] (, expr [asc|desc])*]
///   [limit n[, m]]
///   [select expr]
/// ```
///
/// The clause words are contextual: they remain valid identifiers in
/// ordinary code.
fn parse_query_block(
    body: &str,
    outer_span: Span,
) -> Result<(Expr, CollectionQuery), SyntaxError> {
    let mut parser = Parser::new(body).map_err(|e| offset_error(e, outer_span))?;
    let result = parse_query_clauses(&mut parser);
    result.map_err(|e| offset_error(e, outer_span))
}

/// Re-anchor an error produced inside a query block onto the enclosing
/// source, so positions point into the original text.
fn offset_error(error: SyntaxError, outer_span: Span) -> SyntaxError {
    SyntaxError {
        message: format!("in query block: {}", error.message),
        position: outer_span.start + error.position,
    }
}

fn parse_query_clauses(parser: &mut Parser) -> Result<(Expr, CollectionQuery), SyntaxError> {
    parser.expect_contextual("from")?;

    let mut query = CollectionQuery::default();

    // `from name = source` binds each row to `name`
    if matches!(parser.kind(), TokenKind::Name(_))
        && parser.peek_kind(1) == Some(&TokenKind::Assign)
    {
        query.object_variable = Some(parser.expect_name()?);
        parser.expect(TokenKind::Assign)?;
    }
    let source = parser.parse_expr()?;

    loop {
        if parser.check_contextual("where") {
            parser.advance();
            query.where_clause = Some(parser.parse_expr()?);
        } else if parser.check_contextual("order") {
            parser.advance();
            parser.expect_contextual("by")?;
            loop {
                let expr = parser.parse_expr()?;
                let mut desc = false;
                if parser.check_contextual("desc") {
                    parser.advance();
                    desc = true;
                } else if parser.check_contextual("asc") {
                    parser.advance();
                }
                query.order_by.push(OrderBy { expr, desc });
                if !parser.eat(&TokenKind::Comma) {
                    break;
                }
            }
        } else if parser.check_contextual("limit") {
            parser.advance();
            query.limit = Some(parser.parse_expr()?);
            if parser.eat(&TokenKind::Comma) {
                query.offset = Some(parser.parse_expr()?);
            }
        } else if parser.check_contextual("select") {
            parser.advance();
            query.select = Some(parser.parse_expr()?);
        } else {
            break;
        }
    }

    parser.expect(TokenKind::Eof)?;
    Ok((source, query))
}

use space_lua::{parse, parse_expression, BinOp, ExprKind, StmtKind, UnOp};

#[test]
fn parses_a_realistic_chunk() {
    let source = r#"
        local function factorial(n)
            if n == 0 then
                return 1
            else
                return n * factorial(n - 1)
            end
        end

        for i = 1, 10 do
            print(factorial(i))
        end

        local t = { 1, 2, name = "x", [3 + 4] = true; }
        for k, v in pairs(t) do
            print(k, v)
        end
    "#;
    let block = parse(source).unwrap();
    assert_eq!(block.stmts.len(), 4);
}

#[test]
fn operator_precedence() {
    let expr = parse_expression("1 + 2 * 3").unwrap();
    match expr.kind {
        ExprKind::Binary { op, right, .. } => {
            assert_eq!(op, BinOp::Add);
            assert!(matches!(
                right.kind,
                ExprKind::Binary { op: BinOp::Mul, .. }
            ));
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn concat_is_right_associative() {
    let expr = parse_expression(r#""a" .. "b" .. "c""#).unwrap();
    match expr.kind {
        ExprKind::Binary { op, left, right } => {
            assert_eq!(op, BinOp::Concat);
            assert!(matches!(left.kind, ExprKind::Str(_)));
            assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    op: BinOp::Concat,
                    ..
                }
            ));
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn unary_minus_binds_looser_than_pow() {
    let expr = parse_expression("-2 ^ 2").unwrap();
    match expr.kind {
        ExprKind::Unary { op, operand } => {
            assert_eq!(op, UnOp::Neg);
            assert!(matches!(
                operand.kind,
                ExprKind::Binary { op: BinOp::Pow, .. }
            ));
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn suffix_chains() {
    let expr = parse_expression(r#"a.b[1](2):m("x").field"#).unwrap();
    // outermost is the .field access on the method-call result
    match expr.kind {
        ExprKind::Field { object, name } => {
            assert_eq!(name, "field");
            assert!(matches!(object.kind, ExprKind::MethodCall { .. }));
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn call_sugar_with_table_and_string() {
    assert!(parse("setup{debug = true}").is_ok());
    assert!(parse(r#"print "hello""#).is_ok());
    assert!(parse("render [[template]]").is_ok());
}

#[test]
fn only_calls_are_valid_statements() {
    assert!(parse("f()").is_ok());
    assert!(parse("o:m()").is_ok());
    let err = parse("x + 1").unwrap_err();
    assert!(err.message.contains("statement"));
}

#[test]
fn assignment_targets_are_validated() {
    assert!(parse("a, b.c, d[1] = 1, 2, 3").is_ok());
    assert!(parse("f() = 1").is_err());
    assert!(parse("1 = 2").is_err());
}

#[test]
fn local_attributes() {
    let block = parse("local a <const>, b = 1, 2").unwrap();
    match &block.stmts[0].kind {
        StmtKind::Local { names, .. } => {
            assert!(names[0].is_const);
            assert!(!names[1].is_const);
        }
        other => panic!("unexpected statement: {:?}", other),
    }
    assert!(parse("local a <volatile> = 1").is_err());
}

#[test]
fn method_declaration_gets_self() {
    let block = parse("function obj:greet(name) return name end").unwrap();
    match &block.stmts[0].kind {
        StmtKind::FunctionDecl { method, body, .. } => {
            assert_eq!(method.as_deref(), Some("greet"));
            assert_eq!(body.params, vec!["self".to_string(), "name".to_string()]);
        }
        other => panic!("unexpected statement: {:?}", other),
    }
}

#[test]
fn varargs_placement() {
    // the chunk itself is variadic
    assert!(parse("return ...").is_ok());
    assert!(parse("local f = function(...) return ... end").is_ok());
    assert!(parse("local f = function(a) return ... end").is_err());
    // `...` must come last in the parameter list
    assert!(parse("local f = function(a, ...) return a end").is_ok());
}

#[test]
fn goto_and_labels() {
    assert!(parse("::top:: goto top").is_ok());
    assert!(parse("goto").is_err());
}

#[test]
fn query_block_structure() {
    let expr = parse_expression(
        "query[[from p = store.pages where p.count > 1 order by p.count desc, p.name limit 10, 3 select p.name]]",
    )
    .unwrap();
    match expr.kind {
        ExprKind::Query { source, query } => {
            assert!(matches!(source.kind, ExprKind::Field { .. }));
            assert_eq!(query.object_variable.as_deref(), Some("p"));
            assert!(query.where_clause.is_some());
            assert_eq!(query.order_by.len(), 2);
            assert!(query.order_by[0].desc);
            assert!(!query.order_by[1].desc);
            assert!(query.limit.is_some());
            assert!(query.offset.is_some());
            assert!(query.select.is_some());
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn query_block_defaults() {
    let expr = parse_expression("query[[from store.pages]]").unwrap();
    match expr.kind {
        ExprKind::Query { query, .. } => {
            assert_eq!(query.object_variable, None);
            assert!(query.where_clause.is_none());
            assert!(query.order_by.is_empty());
            assert!(query.limit.is_none());
        }
        other => panic!("unexpected expression: {:?}", other),
    }
}

#[test]
fn query_is_still_an_ordinary_name() {
    // without a long-bracket string right after, `query` is a variable
    assert!(parse("local query = 1 return query + 1").is_ok());
    assert!(parse("query(1, 2)").is_ok());
}

#[test]
fn query_block_errors_point_into_the_outer_source() {
    let err = parse_expression("query[[from]]").unwrap_err();
    assert!(err.message.contains("in query block"));
    assert!(err.position >= 7);
}

#[test]
fn repeat_until_sees_body_scope() {
    let block = parse("repeat local done = true until done").unwrap();
    assert!(matches!(block.stmts[0].kind, StmtKind::Repeat { .. }));
}

#[test]
fn parenthesized_call_is_a_distinct_node() {
    let expr = parse_expression("(f())").unwrap();
    assert!(matches!(expr.kind, ExprKind::Paren(_)));
}

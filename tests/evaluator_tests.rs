use space_lua::{Error, Interpreter, LuaValue, RuntimeError};

fn eval_one(source: &str) -> LuaValue {
    let lua = Interpreter::new();
    lua.eval(source)
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or(LuaValue::Nil)
}

fn eval_err(source: &str) -> RuntimeError {
    let lua = Interpreter::new();
    match lua.eval(source) {
        Err(Error::Runtime(e)) => e,
        other => panic!("expected runtime error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn integer_and_float_subtypes() {
    assert_eq!(eval_one("return 1 + 2"), LuaValue::Int(3));
    assert_eq!(eval_one("return 1 + 2.0"), LuaValue::Float(3.0));
    assert_eq!(eval_one("return 7 / 2"), LuaValue::Float(3.5));
    assert_eq!(eval_one("return 7 // 2"), LuaValue::Int(3));
    assert_eq!(eval_one("return -7 // 2"), LuaValue::Int(-4));
    assert_eq!(eval_one("return 7 % -2"), LuaValue::Int(-1));
    assert_eq!(eval_one("return 2 ^ 10"), LuaValue::Float(1024.0));
    assert_eq!(eval_one("return 1 == 1.0"), LuaValue::Boolean(true));
}

#[test]
fn integer_arithmetic_wraps_at_the_boundaries() {
    // i64::MIN // -1 and i64::MIN % -1 overflow plain division; they wrap
    assert_eq!(
        eval_one("return (-9223372036854775807 - 1) // -1"),
        LuaValue::Int(i64::MIN)
    );
    assert_eq!(
        eval_one("return (-9223372036854775807 - 1) % -1"),
        LuaValue::Int(0)
    );
}

#[test]
fn bitwise_and_shifts() {
    assert_eq!(eval_one("return 0xF0 & 0x0F"), LuaValue::Int(0));
    assert_eq!(eval_one("return 1 << 4"), LuaValue::Int(16));
    assert_eq!(eval_one("return 256 >> 4"), LuaValue::Int(16));
    assert_eq!(eval_one("return 1 << 64"), LuaValue::Int(0));
    assert_eq!(eval_one("return ~0"), LuaValue::Int(-1));
    assert!(matches!(
        eval_err("return 1.5 | 2"),
        RuntimeError::Type { .. }
    ));
}

#[test]
fn concat_coerces_numbers() {
    assert_eq!(eval_one(r#"return "n=" .. 3"#), LuaValue::str("n=3"));
    assert_eq!(eval_one(r#"return 1 .. 2.5"#), LuaValue::str("12.5"));
    assert!(matches!(
        eval_err("return {} .. 1"),
        RuntimeError::Type { .. }
    ));
}

#[test]
fn length_operator_is_byte_based() {
    assert_eq!(eval_one(r#"return #"hello""#), LuaValue::Int(5));
    // 'é' is two bytes in UTF-8
    assert_eq!(eval_one("return #\"caf\u{e9}\""), LuaValue::Int(5));
    assert_eq!(eval_one("return #{10, 20, 30}"), LuaValue::Int(3));
}

#[test]
fn truthiness() {
    assert_eq!(eval_one("return 0 and 'yes' or 'no'"), LuaValue::str("yes"));
    assert_eq!(
        eval_one("return nil and 'yes' or 'no'"),
        LuaValue::str("no")
    );
    assert_eq!(eval_one("return not ''"), LuaValue::Boolean(false));
}

#[test]
fn undeclared_reads_are_nil_and_writes_hit_root() {
    assert_eq!(eval_one("return missing"), LuaValue::Nil);
    let lua = Interpreter::new();
    lua.eval("do g = 42 end").unwrap();
    assert_eq!(lua.globals().get("g"), Some(LuaValue::Int(42)));
}

#[test]
fn lexical_scoping_and_closures() {
    let source = r#"
        local function counter()
            local n = 0
            return function()
                n = n + 1
                return n
            end
        end
        local c = counter()
        c()
        c()
        return c(), counter()()
    "#;
    let lua = Interpreter::new();
    let out = lua.eval(source).unwrap();
    assert_eq!(out, vec![LuaValue::Int(3), LuaValue::Int(1)]);
}

#[test]
fn const_assignment_is_an_error() {
    let err = eval_err("local k <const> = 1 k = 2");
    assert!(matches!(err, RuntimeError::ImmutableAssignment { ref name } if name == "k"));
}

#[test]
fn multiple_assignment_and_returns() {
    let lua = Interpreter::new();
    let out = lua
        .eval("local function pair() return 1, 2 end local a, b, c = pair() return a, b, c")
        .unwrap();
    assert_eq!(out, vec![LuaValue::Int(1), LuaValue::Int(2), LuaValue::Nil]);

    // parentheses truncate to one value
    let out = lua
        .eval("local function pair() return 1, 2 end local a, b = (pair()) return a, b")
        .unwrap();
    assert_eq!(out, vec![LuaValue::Int(1), LuaValue::Nil]);
}

#[test]
fn varargs() {
    let source = r#"
        local function tail(first, ...)
            return ...
        end
        return tail(1, 2, 3)
    "#;
    let lua = Interpreter::new();
    let out = lua.eval(source).unwrap();
    assert_eq!(out, vec![LuaValue::Int(2), LuaValue::Int(3)]);
}

#[test]
fn numeric_for() {
    assert_eq!(
        eval_one("local s = 0 for i = 1, 5 do s = s + i end return s"),
        LuaValue::Int(15)
    );
    assert_eq!(
        eval_one("local s = 0 for i = 5, 1, -2 do s = s + i end return s"),
        LuaValue::Int(9)
    );
    // float bound switches the control variable to floats
    assert_eq!(
        eval_one("local last for i = 1, 2.5 do last = i end return last"),
        LuaValue::Float(2.0)
    );
    assert!(matches!(
        eval_err("for i = 1, 10, 0 do end"),
        RuntimeError::Type { .. }
    ));
}

#[test]
fn while_repeat_break() {
    assert_eq!(
        eval_one("local n = 0 while true do n = n + 1 if n == 4 then break end end return n"),
        LuaValue::Int(4)
    );
    // until sees the body's locals
    assert_eq!(
        eval_one("local n = 0 repeat local done = n > 2 n = n + 1 until done return n"),
        LuaValue::Int(4)
    );
}

#[test]
fn generic_for_iteration_order() {
    let source = r#"
        local t = {}
        t[1] = "a"
        t.z = "map-first"
        t[2] = "b"
        t.a = "map-second"
        local keys = {}
        for k in pairs(t) do
            keys[#keys + 1] = tostring(k)
        end
        return table.concat(keys, ",")
    "#;
    // array part ascending, then map part in insertion order
    assert_eq!(eval_one(source), LuaValue::str("1,2,z,a"));
}

#[test]
fn each_iterates_values_only() {
    let source = r#"
        local total = 0
        for n in each({5, 10, 20}) do
            total = total + n
        end
        return total
    "#;
    assert_eq!(eval_one(source), LuaValue::Int(35));
}

#[test]
fn goto_forward_and_backward() {
    let source = r#"
        local n = 0
        ::top::
        n = n + 1
        if n < 3 then goto top end
        return n
    "#;
    assert_eq!(eval_one(source), LuaValue::Int(3));

    let source = r#"
        local log = {}
        for i = 1, 3 do
            if i == 2 then goto continue end
            log[#log + 1] = i
            ::continue::
        end
        return #log
    "#;
    assert_eq!(eval_one(source), LuaValue::Int(2));
}

#[test]
fn goto_may_not_skip_a_local() {
    let err = eval_err("goto after local x = 1 ::after:: return x");
    assert!(err.to_string().contains("scope of local 'x'"));
}

#[test]
fn method_calls_bind_self() {
    let source = r#"
        local account = { balance = 10 }
        function account:deposit(n)
            self.balance = self.balance + n
        end
        account:deposit(5)
        return account.balance
    "#;
    assert_eq!(eval_one(source), LuaValue::Int(15));
}

#[test]
fn table_constructor_spreads_last_call() {
    let source = r#"
        local function pair() return 8, 9 end
        local t = { pair(), pair() }
        return #t
    "#;
    // only the last positional field spreads
    assert_eq!(eval_one(source), LuaValue::Int(3));
}

#[test]
fn stack_overflow_is_reported() {
    let lua = Interpreter::with_max_call_depth(32);
    let result = lua.eval("local function loop() return loop() end return loop()");
    match result {
        Err(Error::Runtime(e)) => {
            assert!(e.to_string().contains("stack overflow"));
        }
        other => panic!("expected stack overflow, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn calling_a_non_function_errors() {
    let err = eval_err("local x = 3 return x()");
    assert!(err.to_string().contains("attempt to call a number value"));
}

#[test]
fn error_builtin_propagates_with_frame_context() {
    let err = eval_err(
        r#"
        local function inner() error("kaboom") end
        local function outer() return inner() end
        return outer()
    "#,
    );
    let rendered = err.to_string();
    assert!(rendered.contains("kaboom"));
    assert!(rendered.contains("inner"));
}

#[test]
fn string_library() {
    assert_eq!(
        eval_one(r#"return string.upper("abc")"#),
        LuaValue::str("ABC")
    );
    assert_eq!(
        eval_one(r#"return string.startswith("index.md", "index")"#),
        LuaValue::Boolean(true)
    );
    assert_eq!(
        eval_one(r#"local parts = string.split("a,b,c", ",") return parts[2]"#),
        LuaValue::str("b")
    );
    // whole match first: the pattern stops at the dot
    assert_eq!(
        eval_one(r#"return string.matches("v1.2", "v(\\d+)")"#),
        LuaValue::str("v1")
    );
    assert_eq!(
        eval_one(r#"return string.matches("v1.2", "v(\\d+\\.\\d+)")"#),
        LuaValue::str("v1.2")
    );
}

#[test]
fn tostring_keeps_float_subtype_visible() {
    assert_eq!(eval_one("return tostring(3.0)"), LuaValue::str("3.0"));
    assert_eq!(eval_one("return tostring(3)"), LuaValue::str("3"));
}

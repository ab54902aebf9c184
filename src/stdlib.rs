//! Base library installed into the root environment.

use std::cell::RefCell;
use std::rc::Rc;

use regex::Regex;

use crate::runtime::{LuaEnv, RuntimeError};
use crate::value::{LuaKey, LuaTable, LuaValue};

/// Install the base functions and the `string`/`table` libraries into `env`.
pub fn install(env: &LuaEnv) {
    env.define_local("print", LuaValue::host_fn("print", builtin_print), false);
    env.define_local("type", LuaValue::host_fn("type", builtin_type), false);
    env.define_local(
        "tostring",
        LuaValue::host_fn("tostring", builtin_tostring),
        false,
    );
    env.define_local(
        "tonumber",
        LuaValue::host_fn("tonumber", builtin_tonumber),
        false,
    );
    env.define_local("assert", LuaValue::host_fn("assert", builtin_assert), false);
    env.define_local("error", LuaValue::host_fn("error", builtin_error), false);
    env.define_local("pairs", LuaValue::host_fn("pairs", builtin_pairs), false);
    env.define_local("ipairs", LuaValue::host_fn("ipairs", builtin_ipairs), false);
    env.define_local("each", LuaValue::host_fn("each", builtin_each), false);

    let mut string = LuaTable::new();
    string.set_str("upper", LuaValue::host_fn("string.upper", string_upper));
    string.set_str("lower", LuaValue::host_fn("string.lower", string_lower));
    string.set_str("trim", LuaValue::host_fn("string.trim", string_trim));
    string.set_str("split", LuaValue::host_fn("string.split", string_split));
    string.set_str("sub", LuaValue::host_fn("string.sub", string_sub));
    string.set_str("rep", LuaValue::host_fn("string.rep", string_rep));
    string.set_str(
        "contains",
        LuaValue::host_fn("string.contains", string_contains),
    );
    string.set_str(
        "startswith",
        LuaValue::host_fn("string.startswith", string_startswith),
    );
    string.set_str(
        "endswith",
        LuaValue::host_fn("string.endswith", string_endswith),
    );
    string.set_str(
        "matches",
        LuaValue::host_fn("string.matches", string_matches),
    );
    env.define_local("string", LuaValue::table(string), false);

    let mut table = LuaTable::new();
    table.set_str("insert", LuaValue::host_fn("table.insert", table_insert));
    table.set_str("remove", LuaValue::host_fn("table.remove", table_remove));
    table.set_str("concat", LuaValue::host_fn("table.concat", table_concat));
    env.define_local("table", LuaValue::table(table), false);
}

// ----------------------------------------------------------------------
// Argument helpers
// ----------------------------------------------------------------------

fn arg(args: &[LuaValue], index: usize) -> LuaValue {
    args.get(index).cloned().unwrap_or(LuaValue::Nil)
}

fn arg_str(name: &str, args: &[LuaValue], index: usize) -> Result<String, RuntimeError> {
    match arg(args, index) {
        LuaValue::Str(s) => Ok(s),
        other => Err(RuntimeError::type_error(format!(
            "bad argument #{} to '{}' (string expected, got {})",
            index + 1,
            name,
            other.type_name()
        ))),
    }
}

fn arg_int(name: &str, args: &[LuaValue], index: usize) -> Result<i64, RuntimeError> {
    arg(args, index).as_integer().ok_or_else(|| {
        RuntimeError::type_error(format!(
            "bad argument #{} to '{}' (integer expected)",
            index + 1,
            name
        ))
    })
}

fn arg_table(
    name: &str,
    args: &[LuaValue],
    index: usize,
) -> Result<Rc<RefCell<LuaTable>>, RuntimeError> {
    match arg(args, index) {
        LuaValue::Table(t) => Ok(t),
        other => Err(RuntimeError::type_error(format!(
            "bad argument #{} to '{}' (table expected, got {})",
            index + 1,
            name,
            other.type_name()
        ))),
    }
}

// ----------------------------------------------------------------------
// Base functions
// ----------------------------------------------------------------------

fn builtin_print(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let rendered: Vec<String> = args.iter().map(|v| v.to_string()).collect();
    println!("{}", rendered.join("\t"));
    Ok(Vec::new())
}

fn builtin_type(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    Ok(vec![LuaValue::str(arg(args, 0).type_name())])
}

fn builtin_tostring(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    Ok(vec![LuaValue::Str(arg(args, 0).to_string())])
}

fn builtin_tonumber(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let value = match arg(args, 0) {
        LuaValue::Int(n) => LuaValue::Int(n),
        LuaValue::Float(n) => LuaValue::Float(n),
        LuaValue::Str(s) => parse_number(&s).unwrap_or(LuaValue::Nil),
        _ => LuaValue::Nil,
    };
    Ok(vec![value])
}

fn parse_number(s: &str) -> Option<LuaValue> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(LuaValue::Int);
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(LuaValue::Int(n));
    }
    s.parse::<f64>().ok().map(LuaValue::Float)
}

fn builtin_assert(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    if arg(args, 0).truthy() {
        return Ok(args.to_vec());
    }
    let message = match arg(args, 1) {
        LuaValue::Nil => "assertion failed!".to_string(),
        other => other.to_string(),
    };
    Err(RuntimeError::Script { message })
}

fn builtin_error(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    Err(RuntimeError::Script {
        message: arg(args, 0).to_string(),
    })
}

/// Snapshot iterator over all entries, array part first then insertion order.
fn builtin_pairs(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let table = arg_table("pairs", args, 0)?;
    let entries: Vec<(LuaKey, LuaValue)> = table.borrow().entries();
    let position = RefCell::new(0usize);
    let iterator = LuaValue::host_fn("pairs.next", move |_args| {
        let mut position = position.borrow_mut();
        match entries.get(*position) {
            Some((key, value)) => {
                *position += 1;
                Ok(vec![key.to_value(), value.clone()])
            }
            None => Ok(vec![LuaValue::Nil]),
        }
    });
    Ok(vec![iterator, LuaValue::Table(table), LuaValue::Nil])
}

fn builtin_ipairs(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let table = arg_table("ipairs", args, 0)?;
    let values = table.borrow().array_values();
    let position = RefCell::new(0usize);
    let iterator = LuaValue::host_fn("ipairs.next", move |_args| {
        let mut position = position.borrow_mut();
        match values.get(*position) {
            Some(value) => {
                *position += 1;
                Ok(vec![LuaValue::Int(*position as i64), value.clone()])
            }
            None => Ok(vec![LuaValue::Nil]),
        }
    });
    Ok(vec![iterator, LuaValue::Table(table), LuaValue::Nil])
}

/// Like `ipairs` but yields only the values, for `for v in each(t) do`.
fn builtin_each(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let table = arg_table("each", args, 0)?;
    let values = table.borrow().array_values();
    let position = RefCell::new(0usize);
    let iterator = LuaValue::host_fn("each.next", move |_args| {
        let mut position = position.borrow_mut();
        match values.get(*position) {
            Some(value) => {
                *position += 1;
                Ok(vec![value.clone()])
            }
            None => Ok(vec![LuaValue::Nil]),
        }
    });
    Ok(vec![iterator, LuaValue::Table(table), LuaValue::Nil])
}

// ----------------------------------------------------------------------
// string library
// ----------------------------------------------------------------------

fn string_upper(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    Ok(vec![LuaValue::Str(
        arg_str("upper", args, 0)?.to_uppercase(),
    )])
}

fn string_lower(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    Ok(vec![LuaValue::Str(
        arg_str("lower", args, 0)?.to_lowercase(),
    )])
}

fn string_trim(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    Ok(vec![LuaValue::str(arg_str("trim", args, 0)?.trim())])
}

fn string_split(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("split", args, 0)?;
    let sep = arg_str("split", args, 1)?;
    let mut parts = LuaTable::new();
    if sep.is_empty() {
        for ch in s.chars() {
            parts.push(LuaValue::Str(ch.to_string()));
        }
    } else {
        for part in s.split(&sep) {
            parts.push(LuaValue::str(part));
        }
    }
    Ok(vec![LuaValue::table(parts)])
}

/// `string.sub(s, i[, j])` with Lua's 1-based, negative-from-end indexing,
/// over bytes.
fn string_sub(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("sub", args, 0)?;
    let bytes = s.as_bytes();
    let len = bytes.len() as i64;
    let clamp = |i: i64| -> i64 {
        if i < 0 {
            (len + i + 1).max(1)
        } else {
            i.max(1)
        }
    };
    let start = clamp(arg_int("sub", args, 1)?);
    let stop = match arg(args, 2) {
        LuaValue::Nil => len,
        _ => {
            let j = arg_int("sub", args, 2)?;
            if j < 0 {
                len + j + 1
            } else {
                j.min(len)
            }
        }
    };
    if start > stop {
        return Ok(vec![LuaValue::str("")]);
    }
    let slice = &bytes[start as usize - 1..stop as usize];
    Ok(vec![LuaValue::Str(
        String::from_utf8_lossy(slice).into_owned(),
    )])
}

fn string_rep(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("rep", args, 0)?;
    let count = arg_int("rep", args, 1)?.max(0) as usize;
    Ok(vec![LuaValue::Str(s.repeat(count))])
}

fn string_contains(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("contains", args, 0)?;
    let needle = arg_str("contains", args, 1)?;
    Ok(vec![LuaValue::Boolean(s.contains(&needle))])
}

fn string_startswith(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("startswith", args, 0)?;
    let prefix = arg_str("startswith", args, 1)?;
    Ok(vec![LuaValue::Boolean(s.starts_with(&prefix))])
}

fn string_endswith(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("endswith", args, 0)?;
    let suffix = arg_str("endswith", args, 1)?;
    Ok(vec![LuaValue::Boolean(s.ends_with(&suffix))])
}

/// `string.matches(s, pattern)` — regular-expression match, returning the
/// whole match and any capture groups, or nil.
fn string_matches(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let s = arg_str("matches", args, 0)?;
    let pattern = arg_str("matches", args, 1)?;
    let re = Regex::new(&pattern)
        .map_err(|e| RuntimeError::type_error(format!("invalid pattern: {}", e)))?;
    match re.captures(&s) {
        Some(captures) => {
            let mut out = Vec::with_capacity(captures.len());
            for group in captures.iter() {
                out.push(match group {
                    Some(m) => LuaValue::str(m.as_str()),
                    None => LuaValue::Nil,
                });
            }
            Ok(out)
        }
        None => Ok(vec![LuaValue::Nil]),
    }
}

// ----------------------------------------------------------------------
// table library
// ----------------------------------------------------------------------

fn table_insert(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let table = arg_table("insert", args, 0)?;
    match args.len() {
        0 | 1 => Err(RuntimeError::type_error(
            "wrong number of arguments to 'insert'",
        )),
        2 => {
            table.borrow_mut().push(arg(args, 1));
            Ok(Vec::new())
        }
        _ => {
            let position = arg_int("insert", args, 1)?;
            let value = arg(args, 2);
            let mut table = table.borrow_mut();
            let len = table.len();
            if position < 1 || position > len + 1 {
                return Err(RuntimeError::type_error(
                    "bad argument #2 to 'insert' (position out of bounds)",
                ));
            }
            table.insert(position as usize - 1, value);
            Ok(Vec::new())
        }
    }
}

fn table_remove(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let table = arg_table("remove", args, 0)?;
    let mut table = table.borrow_mut();
    let len = table.len();
    if len == 0 {
        return Ok(vec![LuaValue::Nil]);
    }
    let position = match arg(args, 1) {
        LuaValue::Nil => len,
        _ => arg_int("remove", args, 1)?,
    };
    if position < 1 || position > len {
        return Err(RuntimeError::type_error(
            "bad argument #2 to 'remove' (position out of bounds)",
        ));
    }
    Ok(vec![table.remove(position as usize - 1)])
}

fn table_concat(args: &[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> {
    let table = arg_table("concat", args, 0)?;
    let sep = match arg(args, 1) {
        LuaValue::Nil => String::new(),
        _ => arg_str("concat", args, 1)?,
    };
    let mut parts = Vec::new();
    for value in table.borrow().array_values() {
        match value {
            LuaValue::Str(_) | LuaValue::Int(_) | LuaValue::Float(_) => {
                parts.push(value.to_string());
            }
            other => {
                return Err(RuntimeError::type_error(format!(
                    "invalid value (of type {}) in 'concat'",
                    other.type_name()
                )));
            }
        }
    }
    Ok(vec![LuaValue::Str(parts.join(&sep))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tonumber_parses_int_float_and_hex() {
        let out = builtin_tonumber(&[LuaValue::str("42")]).unwrap();
        assert_eq!(out, vec![LuaValue::Int(42)]);
        let out = builtin_tonumber(&[LuaValue::str("3.5")]).unwrap();
        assert_eq!(out, vec![LuaValue::Float(3.5)]);
        let out = builtin_tonumber(&[LuaValue::str("0xff")]).unwrap();
        assert_eq!(out, vec![LuaValue::Int(255)]);
        let out = builtin_tonumber(&[LuaValue::str("nope")]).unwrap();
        assert_eq!(out, vec![LuaValue::Nil]);
    }

    #[test]
    fn test_string_split() {
        let out = string_split(&[LuaValue::str("a,b,c"), LuaValue::str(",")]).unwrap();
        match &out[0] {
            LuaValue::Table(t) => {
                assert_eq!(t.borrow().array_values().len(), 3);
                assert_eq!(t.borrow().get(&LuaValue::Int(2)), LuaValue::str("b"));
            }
            other => panic!("expected table, got {}", other),
        }
    }

    #[test]
    fn test_string_sub_negative_indices() {
        let out = string_sub(&[LuaValue::str("hello"), LuaValue::Int(-3)]).unwrap();
        assert_eq!(out, vec![LuaValue::str("llo")]);
        let out = string_sub(&[
            LuaValue::str("hello"),
            LuaValue::Int(2),
            LuaValue::Int(4),
        ])
        .unwrap();
        assert_eq!(out, vec![LuaValue::str("ell")]);
    }

    #[test]
    fn test_assert_failure_message() {
        let err = builtin_assert(&[LuaValue::Nil, LuaValue::str("boom")]).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_string_matches_captures() {
        let out = string_matches(&[
            LuaValue::str("page/42"),
            LuaValue::str(r"page/(\d+)"),
        ])
        .unwrap();
        assert_eq!(out[0], LuaValue::str("page/42"));
        assert_eq!(out[1], LuaValue::str("42"));
    }
}

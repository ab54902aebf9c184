use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{CollectionQuery, FunctionBody};
use crate::evaluator::Evaluator;
use crate::runtime::{LuaEnv, RuntimeError, StackFrame};

/// A runtime value. The variant set is closed; every operator site matches
/// exhaustively over it.
#[derive(Clone)]
pub enum LuaValue {
    Nil,
    Boolean(bool),
    /// Integer-subtype number
    Int(i64),
    /// Float-subtype number
    Float(f64),
    Str(String),
    Table(Rc<RefCell<LuaTable>>),
    /// Closure over its defining environment
    Function(Rc<LuaClosure>),
    /// Function implemented by the embedding application
    HostFunction(Rc<HostFunction>),
    /// Opaque handle into the embedding application (e.g. a queryable
    /// collection over a data-store key range)
    HostObject(Rc<dyn HostObject>),
}

impl LuaValue {
    pub fn table(table: LuaTable) -> LuaValue {
        LuaValue::Table(Rc::new(RefCell::new(table)))
    }

    pub fn str(s: impl Into<String>) -> LuaValue {
        LuaValue::Str(s.into())
    }

    pub fn host_fn(
        name: &'static str,
        func: impl Fn(&[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError> + 'static,
    ) -> LuaValue {
        LuaValue::HostFunction(Rc::new(HostFunction {
            name,
            func: Box::new(func),
        }))
    }

    /// Lua truthiness: everything except `nil` and `false` is truthy.
    pub fn truthy(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            LuaValue::Nil => "nil",
            LuaValue::Boolean(_) => "boolean",
            LuaValue::Int(_) | LuaValue::Float(_) => "number",
            LuaValue::Str(_) => "string",
            LuaValue::Table(_) => "table",
            LuaValue::Function(_) | LuaValue::HostFunction(_) => "function",
            LuaValue::HostObject(_) => "userdata",
        }
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_number(&self) -> Option<LuaNumber> {
        match self {
            LuaValue::Int(n) => Some(LuaNumber::Int(*n)),
            LuaValue::Float(n) => Some(LuaNumber::Float(*n)),
            _ => None,
        }
    }

    /// Integer view, accepting only integers and integral floats.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Int(n) => Some(*n),
            LuaValue::Float(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }
}

/// Number with its Lua subtype tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LuaNumber {
    Int(i64),
    Float(f64),
}

impl LuaNumber {
    pub fn as_f64(self) -> f64 {
        match self {
            LuaNumber::Int(n) => n as f64,
            LuaNumber::Float(n) => n,
        }
    }
}

/// Equality follows each variant's own rule: numbers compare across
/// subtypes, tables/functions/host objects by identity, never deeply.
impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Int(a), LuaValue::Int(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Int(a), LuaValue::Float(b)) | (LuaValue::Float(b), LuaValue::Int(a)) => {
                (*a as f64) == *b
            }
            (LuaValue::Str(a), LuaValue::Str(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Function(a), LuaValue::Function(b)) => Rc::ptr_eq(a, b),
            (LuaValue::HostFunction(a), LuaValue::HostFunction(b)) => Rc::ptr_eq(a, b),
            (LuaValue::HostObject(a), LuaValue::HostObject(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// `tostring` rendering. Floats always show a decimal point or exponent so
/// the subtype stays visible (`3.0`, not `3`).
impl fmt::Display for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{}", b),
            LuaValue::Int(n) => write!(f, "{}", n),
            LuaValue::Float(n) => write!(f, "{}", format_float(*n)),
            LuaValue::Str(s) => write!(f, "{}", s),
            LuaValue::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            LuaValue::Function(c) => write!(f, "function: {:p}", Rc::as_ptr(c)),
            LuaValue::HostFunction(h) => write!(f, "function: builtin:{}", h.name),
            LuaValue::HostObject(o) => write!(f, "userdata: {}", o.type_name()),
        }
    }
}

pub fn format_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

/// Key of a table entry. Integral floats normalize to integers before they
/// get here; other value kinds are rejected at the insert site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LuaKey {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl LuaKey {
    pub fn from_value(value: &LuaValue) -> Result<LuaKey, RuntimeError> {
        match value {
            LuaValue::Int(n) => Ok(LuaKey::Int(*n)),
            LuaValue::Float(n) if n.fract() == 0.0 && n.is_finite() => Ok(LuaKey::Int(*n as i64)),
            LuaValue::Str(s) => Ok(LuaKey::Str(s.clone())),
            LuaValue::Boolean(b) => Ok(LuaKey::Bool(*b)),
            LuaValue::Nil => Err(RuntimeError::type_error("table index is nil")),
            other => Err(RuntimeError::type_error(format!(
                "cannot use {} as a table key",
                other.type_name()
            ))),
        }
    }

    pub fn to_value(&self) -> LuaValue {
        match self {
            LuaKey::Int(n) => LuaValue::Int(*n),
            LuaKey::Str(s) => LuaValue::Str(s.clone()),
            LuaKey::Bool(b) => LuaValue::Boolean(*b),
        }
    }
}

/// Hybrid array+map table.
///
/// Integer keys from 1 upward live in a dense array part; everything else
/// lives in an insertion-ordered list. Iteration yields the array part in
/// ascending key order first, then the rest in insertion order.
#[derive(Default)]
pub struct LuaTable {
    array: Vec<LuaValue>,
    map: Vec<(LuaKey, LuaValue)>,
}

impl LuaTable {
    pub fn new() -> Self {
        LuaTable::default()
    }

    /// Border of the array part, the `#` length.
    pub fn len(&self) -> i64 {
        self.array.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.map.is_empty()
    }

    pub fn get(&self, key: &LuaValue) -> LuaValue {
        let key = match LuaKey::from_value(key) {
            Ok(key) => key,
            Err(_) => return LuaValue::Nil,
        };
        self.get_key(&key)
    }

    pub fn get_key(&self, key: &LuaKey) -> LuaValue {
        if let LuaKey::Int(n) = key {
            if *n >= 1 && (*n as usize) <= self.array.len() {
                return self.array[*n as usize - 1].clone();
            }
        }
        self.map
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(LuaValue::Nil)
    }

    pub fn get_str(&self, key: &str) -> LuaValue {
        self.get_key(&LuaKey::Str(key.to_string()))
    }

    pub fn set(&mut self, key: LuaValue, value: LuaValue) -> Result<(), RuntimeError> {
        let key = LuaKey::from_value(&key)?;
        self.set_key(key, value);
        Ok(())
    }

    pub fn set_key(&mut self, key: LuaKey, value: LuaValue) {
        if let LuaKey::Int(n) = key {
            let len = self.array.len() as i64;
            if n >= 1 && n <= len {
                if matches!(value, LuaValue::Nil) && n == len {
                    self.array.pop();
                } else {
                    self.array[n as usize - 1] = value;
                }
                return;
            }
            if n == len + 1 && !matches!(value, LuaValue::Nil) {
                self.array.push(value);
                self.absorb_map_tail();
                return;
            }
        }
        if matches!(value, LuaValue::Nil) {
            self.map.retain(|(k, _)| *k != key);
            return;
        }
        for entry in &mut self.map {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.map.push((key, value));
    }

    pub fn set_str(&mut self, key: &str, value: LuaValue) {
        self.set_key(LuaKey::Str(key.to_string()), value);
    }

    /// Append to the array part.
    pub fn push(&mut self, value: LuaValue) {
        self.array.push(value);
    }

    /// Insert into the array part at `index` (0-based), shifting the rest up.
    pub fn insert(&mut self, index: usize, value: LuaValue) {
        self.array.insert(index, value);
    }

    /// Remove from the array part at `index` (0-based), shifting the rest down.
    pub fn remove(&mut self, index: usize) -> LuaValue {
        self.array.remove(index)
    }

    /// Move integer keys that became contiguous with the array part out of
    /// the map part.
    fn absorb_map_tail(&mut self) {
        loop {
            let next = LuaKey::Int(self.array.len() as i64 + 1);
            let index = self.map.iter().position(|(k, _)| *k == next);
            match index {
                Some(index) => {
                    let (_, value) = self.map.remove(index);
                    self.array.push(value);
                }
                None => break,
            }
        }
    }

    /// All entries in iteration order: array part first, then the rest in
    /// insertion order.
    pub fn entries(&self) -> Vec<(LuaKey, LuaValue)> {
        let mut out = Vec::with_capacity(self.array.len() + self.map.len());
        for (i, value) in self.array.iter().enumerate() {
            out.push((LuaKey::Int(i as i64 + 1), value.clone()));
        }
        for (key, value) in &self.map {
            out.push((key.clone(), value.clone()));
        }
        out
    }

    /// Array-part values, for `ipairs`/`each`.
    pub fn array_values(&self) -> Vec<LuaValue> {
        self.array.clone()
    }

    /// True when every entry lives in the array part.
    pub fn is_array(&self) -> bool {
        self.map.is_empty()
    }
}

/// A closure: parameter list, variadic flag, body, and the environment it
/// captured at its definition site.
pub struct LuaClosure {
    pub name: Option<String>,
    pub body: FunctionBody,
    pub env: LuaEnv,
}

/// Function provided by the host application.
pub struct HostFunction {
    pub name: &'static str,
    #[allow(clippy::type_complexity)]
    pub func: Box<dyn Fn(&[LuaValue]) -> Result<Vec<LuaValue>, RuntimeError>>,
}

/// Opaque host-side object exposed to scripts.
///
/// The default implementations make the object inert: not indexable and not
/// queryable. The data-store collection handle overrides [`HostObject::query`].
pub trait HostObject {
    fn type_name(&self) -> &'static str {
        "userdata"
    }

    fn index(&self, _key: &LuaValue) -> Result<LuaValue, RuntimeError> {
        Ok(LuaValue::Nil)
    }

    /// Execute a `query[[ ... ]]` block against this object.
    fn query(
        &self,
        _query: &CollectionQuery,
        _env: &LuaEnv,
        _frame: &Rc<StackFrame>,
        _evaluator: &Evaluator,
    ) -> Result<Vec<LuaValue>, RuntimeError> {
        Err(RuntimeError::type_error(format!(
            "{} is not queryable",
            self.type_name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_and_map_parts() {
        let mut t = LuaTable::new();
        t.set(LuaValue::Int(1), LuaValue::str("a")).unwrap();
        t.set(LuaValue::str("name"), LuaValue::str("x")).unwrap();
        t.set(LuaValue::Int(2), LuaValue::str("b")).unwrap();
        assert_eq!(t.len(), 2);

        let keys: Vec<LuaKey> = t.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                LuaKey::Int(1),
                LuaKey::Int(2),
                LuaKey::Str("name".to_string())
            ]
        );
    }

    #[test]
    fn test_map_tail_absorbed_into_array() {
        let mut t = LuaTable::new();
        t.set(LuaValue::Int(3), LuaValue::Int(30)).unwrap();
        t.set(LuaValue::Int(1), LuaValue::Int(10)).unwrap();
        assert_eq!(t.len(), 1);
        t.set(LuaValue::Int(2), LuaValue::Int(20)).unwrap();
        // 3 was waiting in the map part and is now contiguous
        assert_eq!(t.len(), 3);
        assert_eq!(t.get(&LuaValue::Int(3)), LuaValue::Int(30));
    }

    #[test]
    fn test_integral_float_keys_normalize() {
        let mut t = LuaTable::new();
        t.set(LuaValue::Float(1.0), LuaValue::str("one")).unwrap();
        assert_eq!(t.get(&LuaValue::Int(1)), LuaValue::str("one"));
    }

    #[test]
    fn test_number_equality_across_subtypes() {
        assert_eq!(LuaValue::Int(1), LuaValue::Float(1.0));
        assert_ne!(LuaValue::Int(1), LuaValue::Float(1.5));
        assert_ne!(LuaValue::str("1"), LuaValue::Int(1));
    }
}

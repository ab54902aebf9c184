use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;
use space_lua::{
    Collection, DataStore, Error, Interpreter, KvEntry, KvKey, KvPrimitives, LuaTable, LuaValue,
    MemoryKv, RuntimeError, ScanStep, StoreError,
};

fn page_key(name: &str) -> KvKey {
    KvKey::new(["page", name])
}

fn seed(store: &DataStore) {
    store
        .set(page_key("alpha"), json!({"name": "alpha", "count": 1}))
        .unwrap();
    store
        .set(page_key("beta"), json!({"name": "beta", "count": 3}))
        .unwrap();
    store
        .set(page_key("gamma"), json!({"name": "gamma", "count": 2}))
        .unwrap();
}

fn interpreter_with(store: DataStore) -> Interpreter {
    let lua = Interpreter::new();
    let mut globals = LuaTable::new();
    globals.set_str(
        "pages",
        Collection::value(store.clone(), KvKey::new(["page"])),
    );
    globals.set_str("tasks", Collection::value(store, KvKey::new(["task"])));
    lua.define("store", LuaValue::table(globals));
    lua
}

fn eval_one(lua: &Interpreter, source: &str) -> LuaValue {
    lua.eval(source)
        .unwrap()
        .into_iter()
        .next()
        .unwrap_or(LuaValue::Nil)
}

#[test]
fn where_order_limit_select() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);

    let out = eval_one(
        &lua,
        "return query[[from p = store.pages where p.count > 1 order by p.count desc limit 1 select p.count]]",
    );
    match out {
        LuaValue::Table(t) => {
            assert_eq!(t.borrow().array_values(), vec![LuaValue::Int(3)]);
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn where_order_desc_limit_keeps_the_top_row() {
    let store = DataStore::in_memory();
    for (name, a) in [("one", 1), ("two", 2), ("three", 3)] {
        store.set(page_key(name), json!({ "a": a })).unwrap();
    }
    let lua = interpreter_with(store);

    let out = eval_one(
        &lua,
        "return query[[from store.pages where _.a > 1 order by _.a desc limit 1]]",
    );
    match out {
        LuaValue::Table(rows) => {
            let rows = rows.borrow().array_values();
            assert_eq!(rows.len(), 1);
            match &rows[0] {
                LuaValue::Table(row) => {
                    assert_eq!(row.borrow().get_str("a"), LuaValue::Int(3));
                }
                other => panic!("expected row table, got {}", other),
            }
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn default_row_variable_is_underscore() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);

    let out = eval_one(
        &lua,
        "return query[[from store.pages where _.count == 2 select _.name]]",
    );
    match out {
        LuaValue::Table(t) => {
            assert_eq!(t.borrow().array_values(), vec![LuaValue::str("gamma")]);
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn rows_come_back_in_scan_order_without_order_by() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);

    let out = eval_one(&lua, "return query[[from p = store.pages select p.name]]");
    match out {
        LuaValue::Table(t) => {
            assert_eq!(
                t.borrow().array_values(),
                vec![
                    LuaValue::str("alpha"),
                    LuaValue::str("beta"),
                    LuaValue::str("gamma")
                ]
            );
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn limit_with_offset_can_exhaust_the_set() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);

    // three rows, skip three: nothing left
    let out = eval_one(&lua, "return #query[[from store.pages limit 10, 3]]");
    assert_eq!(out, LuaValue::Int(0));

    let out = eval_one(
        &lua,
        "return query[[from p = store.pages limit 2, 1 select p.name]]",
    );
    match out {
        LuaValue::Table(t) => {
            assert_eq!(
                t.borrow().array_values(),
                vec![LuaValue::str("beta"), LuaValue::str("gamma")]
            );
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn empty_prefix_yields_empty_result() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);
    let out = eval_one(&lua, "return #query[[from store.tasks]]");
    assert_eq!(out, LuaValue::Int(0));
}

#[test]
fn order_by_is_stable_on_ties() {
    let store = DataStore::in_memory();
    store
        .set(page_key("a"), json!({"name": "a", "rank": 1}))
        .unwrap();
    store
        .set(page_key("b"), json!({"name": "b", "rank": 1}))
        .unwrap();
    store
        .set(page_key("c"), json!({"name": "c", "rank": 0}))
        .unwrap();
    let lua = interpreter_with(store);

    let out = eval_one(
        &lua,
        "return query[[from p = store.pages order by p.rank select p.name]]",
    );
    match out {
        LuaValue::Table(t) => {
            assert_eq!(
                t.borrow().array_values(),
                vec![LuaValue::str("c"), LuaValue::str("a"), LuaValue::str("b")]
            );
        }
        other => panic!("expected table, got {}", other),
    }
}

#[test]
fn query_clauses_see_enclosing_locals() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);

    let out = eval_one(
        &lua,
        "local threshold = 1 return #query[[from p = store.pages where p.count > threshold]]",
    );
    assert_eq!(out, LuaValue::Int(2));
}

#[test]
fn row_failures_carry_the_row_key() {
    let store = DataStore::in_memory();
    seed(&store);
    let lua = interpreter_with(store);

    let result = lua.eval(r#"return query[[from p = store.pages where error("bad row")]]"#);
    match result {
        Err(Error::Runtime(e)) => {
            let rendered = e.to_string();
            assert!(rendered.contains("page/alpha"), "got: {}", rendered);
            assert!(rendered.contains("bad row"), "got: {}", rendered);
        }
        other => panic!("expected runtime error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn non_queryable_source_is_a_type_error() {
    let store = DataStore::in_memory();
    let lua = interpreter_with(store);
    let result = lua.eval("local t = {} return query[[from t]]");
    match result {
        Err(Error::Runtime(RuntimeError::Type { message })) => {
            assert!(message.contains("not a queryable collection"));
        }
        other => panic!("expected type error, got {:?}", other.map(|_| ())),
    }
}

/// Backend wrapper that counts how many entries a scan actually visits.
struct CountingKv {
    inner: MemoryKv,
    visits: Rc<Cell<usize>>,
}

impl KvPrimitives for CountingKv {
    fn batch_get(&self, keys: &[KvKey]) -> Result<Vec<Option<serde_json::Value>>, StoreError> {
        self.inner.batch_get(keys)
    }

    fn batch_set(&mut self, entries: Vec<KvEntry>) -> Result<(), StoreError> {
        self.inner.batch_set(entries)
    }

    fn batch_delete(&mut self, keys: &[KvKey]) -> Result<(), StoreError> {
        self.inner.batch_delete(keys)
    }

    fn scan(
        &self,
        prefix: &KvKey,
        visit: &mut dyn FnMut(KvEntry) -> Result<ScanStep, StoreError>,
    ) -> Result<(), StoreError> {
        let visits = self.visits.clone();
        self.inner.scan(prefix, &mut |entry| {
            visits.set(visits.get() + 1);
            visit(entry)
        })
    }
}

#[test]
fn limit_without_order_by_stops_the_scan_early() {
    let visits = Rc::new(Cell::new(0));
    let mut inner = MemoryKv::new();
    for i in 0..100 {
        inner
            .batch_set(vec![KvEntry {
                key: page_key(&format!("{:03}", i)),
                value: json!({"n": i}),
            }])
            .unwrap();
    }
    let store = DataStore::new(CountingKv {
        inner,
        visits: visits.clone(),
    });
    let lua = interpreter_with(store);

    let out = eval_one(&lua, "return #query[[from store.pages limit 5]]");
    assert_eq!(out, LuaValue::Int(5));
    assert_eq!(visits.get(), 5);
}

#[test]
fn order_by_reads_the_whole_range() {
    let visits = Rc::new(Cell::new(0));
    let mut inner = MemoryKv::new();
    for i in 0..10 {
        inner
            .batch_set(vec![KvEntry {
                key: page_key(&format!("{:03}", i)),
                value: json!({"n": i}),
            }])
            .unwrap();
    }
    let store = DataStore::new(CountingKv {
        inner,
        visits: visits.clone(),
    });
    let lua = interpreter_with(store);

    let out = eval_one(
        &lua,
        "return query[[from p = store.pages order by p.n desc limit 1 select p.n]]",
    );
    match out {
        LuaValue::Table(t) => {
            assert_eq!(t.borrow().array_values(), vec![LuaValue::Int(9)]);
        }
        other => panic!("expected table, got {}", other),
    }
    assert_eq!(visits.get(), 10);
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::Span;
use crate::lexer::SyntaxError;
use crate::store::StoreError;
use crate::value::LuaValue;

/// Errors raised during evaluation.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Operator/operand mismatch
    #[error("type error: {message}")]
    Type { message: String },

    /// Assignment to a `<const>` binding
    #[error("cannot assign to constant '{name}'")]
    ImmutableAssignment { name: String },

    /// Recursion depth exceeded the configured limit
    #[error("stack overflow (call depth exceeded {limit})")]
    StackOverflow { limit: usize },

    /// Structural error only detectable at evaluation time (e.g. a goto
    /// jumping into the scope of a local it would skip)
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Propagated unchanged from the key-value store collaborator
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `error(...)` raised from script code
    #[error("{message}")]
    Script { message: String },

    /// Failure while evaluating a query clause, tagged with the offending
    /// row's key
    #[error("query failed for row {key}: {source}")]
    QueryRow {
        key: String,
        #[source]
        source: Box<RuntimeError>,
    },

    /// Call-frame context wrapped around an inner error to form a trace
    #[error("{context}: {source}")]
    Frame {
        context: String,
        #[source]
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> RuntimeError {
        RuntimeError::Type {
            message: message.into(),
        }
    }

    /// Wrap with a call-site description for error attribution.
    pub fn in_frame(self, context: impl Into<String>) -> RuntimeError {
        RuntimeError::Frame {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

#[derive(Debug)]
struct Binding {
    value: LuaValue,
    is_const: bool,
}

#[derive(Default)]
struct EnvInner {
    vars: HashMap<String, Binding>,
    parent: Option<LuaEnv>,
}

/// A lexical scope: name bindings chained to a parent scope.
///
/// `LuaEnv` is a cheap handle; clones share the underlying frame, which is
/// what closures capture.
#[derive(Clone, Default)]
pub struct LuaEnv {
    inner: Rc<RefCell<EnvInner>>,
}

impl LuaEnv {
    /// A fresh root (global) environment.
    pub fn new() -> Self {
        LuaEnv::default()
    }

    /// A child scope for a block or function invocation.
    pub fn child(&self) -> LuaEnv {
        LuaEnv {
            inner: Rc::new(RefCell::new(EnvInner {
                vars: HashMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    /// Declare a local in this scope, shadowing any outer binding.
    pub fn define_local(&self, name: &str, value: LuaValue, is_const: bool) {
        self.inner
            .borrow_mut()
            .vars
            .insert(name.to_string(), Binding { value, is_const });
    }

    /// Look a name up through the scope chain. Unbound names read as nil
    /// (Lua semantics), so this returns `None` only for the caller to decide.
    pub fn get(&self, name: &str) -> Option<LuaValue> {
        let inner = self.inner.borrow();
        if let Some(binding) = inner.vars.get(name) {
            return Some(binding.value.clone());
        }
        match &inner.parent {
            Some(parent) => parent.get(name),
            None => None,
        }
    }

    /// Whether this exact scope (not the chain) declares `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.inner.borrow().vars.contains_key(name)
    }

    /// Assign to an existing binding, walking outward. Assignment to an
    /// undeclared name lands in the root (global) environment.
    pub fn set(&self, name: &str, value: LuaValue) -> Result<(), RuntimeError> {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(binding) = inner.vars.get_mut(name) {
                if binding.is_const {
                    return Err(RuntimeError::ImmutableAssignment {
                        name: name.to_string(),
                    });
                }
                binding.value = value;
                return Ok(());
            }
        }
        let parent = self.inner.borrow().parent.clone();
        match parent {
            Some(parent) => parent.set(name, value),
            None => {
                self.define_local(name, value, false);
                Ok(())
            }
        }
    }

    /// The outermost environment in the chain.
    pub fn root(&self) -> LuaEnv {
        let parent = self.inner.borrow().parent.clone();
        match parent {
            Some(parent) => parent.root(),
            None => self.clone(),
        }
    }
}

/// One call-stack frame, for error attribution. Frames form a parent chain
/// threaded explicitly through evaluation, so traces can be rebuilt without
/// relying on the host call stack.
pub struct StackFrame {
    pub parent: Option<Rc<StackFrame>>,
    pub description: String,
    pub span: Option<Span>,
    pub depth: usize,
}

impl StackFrame {
    /// Root frame for a fresh evaluation.
    pub fn root(description: impl Into<String>) -> Rc<StackFrame> {
        Rc::new(StackFrame {
            parent: None,
            description: description.into(),
            span: None,
            depth: 0,
        })
    }

    /// Sentinel for evaluation with no traceable call context.
    pub fn lost() -> Rc<StackFrame> {
        StackFrame::root("[lost frame]")
    }

    /// Child frame for a function call at `span`.
    pub fn push(
        self: &Rc<Self>,
        description: impl Into<String>,
        span: Option<Span>,
    ) -> Rc<StackFrame> {
        Rc::new(StackFrame {
            parent: Some(self.clone()),
            description: description.into(),
            span,
            depth: self.depth + 1,
        })
    }

    /// Frame descriptions from innermost outward, truncated to `limit`.
    pub fn trace(&self, limit: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut frame = Some(self);
        let mut parent_holder;
        while let Some(f) = frame {
            if out.len() >= limit {
                out.push("...".to_string());
                break;
            }
            match f.span {
                Some(span) => out.push(format!("{} (at offset {})", f.description, span.start)),
                None => out.push(f.description.clone()),
            }
            parent_holder = f.parent.as_deref();
            frame = parent_holder;
        }
        out
    }
}

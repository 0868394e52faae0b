use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::scope::Scope;

static NEXT_CONTEXT_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    // per-thread scope stacks, keyed by context id so that two clients in
    // one thread never share a stack
    static SCOPE_STACKS: RefCell<HashMap<usize, Vec<Scope>>> = RefCell::new(HashMap::new());
}

/// Manages the global scope and the per-thread stacks of pushed scopes.
///
/// Every client owns one context.  The global scope is shared by all
/// threads behind a mutex; pushed scopes are thread-local, so scoped data
/// set on one thread is invisible to the others.
#[derive(Debug)]
pub struct Context {
    id: usize,
    global: Mutex<Scope>,
}

impl Default for Context {
    fn default() -> Context {
        Context::new()
    }
}

impl Context {
    /// Creates a new context with an empty global scope.
    pub fn new() -> Context {
        Context {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            global: Mutex::new(Scope::new()),
        }
    }

    /// Invokes a callback with the global scope.
    pub fn with_global<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        let mut guard = self.global.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Invokes a callback with the current scope.
    ///
    /// The current scope is the top of this thread's stack, or the global
    /// scope when nothing has been pushed on this thread.
    pub fn with_current<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Scope) -> R,
    {
        SCOPE_STACKS.with(|stacks| {
            let stacks = stacks.borrow();
            match stacks.get(&self.id).and_then(|stack| stack.last()) {
                Some(scope) => f(scope),
                None => self.with_global(|scope| f(scope)),
            }
        })
    }

    /// Invokes a callback with mutable access to the current scope.
    pub fn with_current_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Scope) -> R,
    {
        SCOPE_STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            match stacks.get_mut(&self.id).and_then(|stack| stack.last_mut()) {
                Some(scope) => f(scope),
                None => self.with_global(f),
            }
        })
    }

    /// Pushes a deep copy of the global scope onto this thread's stack.
    ///
    /// Until the matching [`pop_scope`](Context::pop_scope), mutations go to
    /// the copy and leave the global scope untouched.
    pub fn push_scope(&self) {
        let scope = self.with_global(|scope| scope.clone());
        SCOPE_STACKS.with(|stacks| {
            stacks.borrow_mut().entry(self.id).or_default().push(scope);
        });
    }

    /// Pops the innermost pushed scope on this thread.
    ///
    /// Popping with nothing pushed is a no-op; the stack depth never goes
    /// negative.
    pub fn pop_scope(&self) {
        SCOPE_STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            if let Some(stack) = stacks.get_mut(&self.id) {
                stack.pop();
                if stack.is_empty() {
                    stacks.remove(&self.id);
                }
            }
        });
    }

    /// The number of scopes pushed on the calling thread.
    pub fn depth(&self) -> usize {
        SCOPE_STACKS.with(|stacks| {
            stacks
                .borrow()
                .get(&self.id)
                .map(Vec::len)
                .unwrap_or_default()
        })
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // only the dropping thread's entry is reachable here; entries left
        // on other threads stay until those threads exit.  Ids are never
        // reused, so stale entries can never resurface under a new context.
        SCOPE_STACKS.with(|stacks| {
            stacks.borrow_mut().remove(&self.id);
        });
    }
}

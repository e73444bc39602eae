//! The current-context stack.
//!
//! Every thread owns a stack of effective contexts whose bottom element is
//! the total [`Context::DEFAULT`]. The top of the stack is the ambient
//! "current context" that operations merge their per-call overrides onto.
//! Scoped overrides push a merged context and restore the previous state
//! when the scope guard is dropped, on every exit path.

use core::cell::RefCell;
use core::marker::PhantomData;

use tracing::trace;

use crate::context::Context;

/// The context stack owned by one logical thread of control. The stack is
/// never empty and its bottom element is total, so the top is total too:
/// merging a total base with anything yields a total context.
#[derive(Debug)]
pub struct ContextStack {
    stack: Vec<Context>,
}

impl ContextStack {
    pub fn new() -> Self {
        ContextStack {
            stack: vec![Context::DEFAULT],
        }
    }

    /// Returns the top of the stack. Always total.
    pub fn current(&self) -> Context {
        self.stack[self.stack.len() - 1]
    }

    /// Merges `ctx` onto the top of the stack, replacing the top in place.
    /// This permanently changes the current scope; it is not a push.
    pub fn set(&mut self, ctx: &Context) {
        let top = self.stack.len() - 1;
        let merged = self.stack[top].merge(ctx);
        self.stack[top] = merged;
    }

    /// Pushes `merge(top, ctx)` as the new top. Returns the depth of the
    /// stack after the push; the matching [`release`](Self::release) must
    /// pass the same depth back.
    pub fn push(&mut self, ctx: &Context) -> usize {
        let merged = self.current().merge(ctx);
        self.stack.push(merged);
        self.stack.len()
    }

    /// Pops the scope that left the stack at `depth`. Releasing any scope
    /// other than the innermost open one, or releasing twice, is a fatal
    /// usage error.
    pub fn release(&mut self, depth: usize) {
        if self.stack.len() != depth {
            panic!(
                "context scope released out of LIFO order: \
                 stack depth is {}, guard expected {}",
                self.stack.len(),
                depth
            );
        }
        let _ = self.stack.pop();
    }

    /// Unconditionally unwinds the stack back below `depth`. Used when the
    /// guard drops during a panic, where strict LIFO checking would turn
    /// the unwind into an abort.
    fn unwind(&mut self, depth: usize) {
        self.stack.truncate(depth.saturating_sub(1).max(1));
    }

    /// The number of contexts on the stack, the base included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static STACK: RefCell<ContextStack> =
        RefCell::new(ContextStack::new());
}

/// Returns the current (ambient) context of this thread. Always total.
pub fn get_current_context() -> Context {
    STACK.with(|s| s.borrow().current())
}

/// Merges `ctx` onto this thread's current context, replacing it in place.
/// The change persists for the rest of the innermost open scope.
pub fn set_current_context(ctx: &Context) {
    trace!(ctx = %ctx, "set current context");
    STACK.with(|s| s.borrow_mut().set(ctx));
}

/// Pushes `merge(current, ctx)` as the new current context and returns a
/// guard. Dropping the guard restores the exact pre-push state, whether
/// the scope body ran to completion or unwound through a panic. Scopes
/// nest arbitrarily; guards must be dropped innermost-first.
pub fn with_context(ctx: &Context) -> ContextGuard {
    let depth = STACK.with(|s| s.borrow_mut().push(ctx));
    trace!(ctx = %ctx, depth, "push context scope");
    ContextGuard {
        depth,
        // Keep the guard on the thread whose stack it refers to.
        _not_send: PhantomData,
    }
}

/// Resolves the effective context for one operation: the ambient current
/// context with the optional per-call override merged on top. Total by
/// construction.
pub(crate) fn resolve(call: Option<&Context>) -> Context {
    let current = get_current_context();
    let effective = match call {
        Some(ctx) => current.merge(ctx),
        None => current,
    };
    debug_assert!(effective.is_total(), "current context lost totality");
    effective
}

/// Restores the context stack when dropped. See [`with_context`].
#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the scope"]
pub struct ContextGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        STACK.with(|s| {
            let mut stack = s.borrow_mut();
            if std::thread::panicking() {
                stack.unwind(self.depth);
            } else {
                stack.release(self.depth);
            }
        });
        trace!(depth = self.depth, "pop context scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{RoundingMode, FP32, FP64};

    // The context stack is thread local; run each test in its own thread
    // so they cannot observe each other's ambient state.
    fn isolated(f: impl FnOnce() + Send + 'static) {
        std::thread::spawn(f).join().unwrap();
    }

    #[test]
    fn test_current_starts_at_default() {
        isolated(|| {
            assert_eq!(get_current_context(), Context::DEFAULT);
        });
    }

    #[test]
    fn test_set_merges_onto_top() {
        isolated(|| {
            set_current_context(&Context::new().with_rounding(RoundingMode::Zero));
            let cur = get_current_context();
            assert_eq!(cur.rounding(), Some(RoundingMode::Zero));
            // Everything else is inherited from the default.
            assert_eq!(cur.precision(), Context::DEFAULT.precision());
            assert_eq!(cur.emin(), Context::DEFAULT.emin());
        });
    }

    #[test]
    fn test_scope_restores_exactly() {
        isolated(|| {
            let before = get_current_context();
            {
                let _scope = with_context(
                    &Context::new()
                        .with_precision(24)
                        .unwrap()
                        .with_rounding(RoundingMode::Zero),
                );
                let cur = get_current_context();
                assert_eq!(cur.precision(), Some(24));
                assert_eq!(cur.rounding(), Some(RoundingMode::Zero));
            }
            assert_eq!(get_current_context(), before);
        });
    }

    #[test]
    fn test_nested_scopes() {
        isolated(|| {
            let base = get_current_context();
            let c1 = Context::new().with_precision(64).unwrap();
            let c2 = Context::new().with_rounding(RoundingMode::Negative);
            let s1 = with_context(&c1);
            let s2 = with_context(&c2);
            assert_eq!(get_current_context(), base.merge(&c1).merge(&c2));
            drop(s2);
            assert_eq!(get_current_context(), base.merge(&c1));
            drop(s1);
            assert_eq!(get_current_context(), base);
        });
    }

    #[test]
    fn test_scope_restores_after_panic() {
        isolated(|| {
            let before = get_current_context();
            let result = std::panic::catch_unwind(|| {
                let _scope = with_context(&FP32);
                panic!("boom");
            });
            assert!(result.is_err());
            assert_eq!(get_current_context(), before);
        });
    }

    #[test]
    fn test_out_of_order_release_panics() {
        isolated(|| {
            let result = std::panic::catch_unwind(|| {
                let s1 = with_context(&FP32);
                let s2 = with_context(&FP64);
                // Dropping the outer guard while the inner one is open
                // violates the LIFO discipline.
                drop(s1);
                drop(s2);
            });
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_set_inside_scope_does_not_leak() {
        isolated(|| {
            let before = get_current_context();
            {
                let _scope = with_context(&FP32);
                set_current_context(
                    &Context::new().with_rounding(RoundingMode::Positive),
                );
                assert_eq!(
                    get_current_context().rounding(),
                    Some(RoundingMode::Positive)
                );
            }
            // The permanent set only applied to the scope's own slot.
            assert_eq!(get_current_context(), before);
        });
    }

    #[test]
    fn test_resolve_merges_call_override() {
        isolated(|| {
            let call = Context::new().with_precision(24).unwrap();
            let eff = resolve(Some(&call));
            assert_eq!(eff.precision(), Some(24));
            assert_eq!(eff.rounding(), Context::DEFAULT.rounding());
            assert!(eff.is_total());
            assert_eq!(resolve(None), get_current_context());
        });
    }
}

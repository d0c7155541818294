//! Rule traits.
//!
//! Conditions and configurations are the two node functions the evaluator
//! runs itself. Behaviours are returned to the caller untouched, so they need
//! no trait here. Both traits are generic over a context type `C`, allowing a
//! rule vocabulary to read and write whatever state its host exposes.

/// A predicate over the current context.
///
/// Conditions should be idempotent within one evaluation pass. Expensive
/// predicates that appear in several places of a tree are expected to memoize
/// through the context.
pub trait Condition<C>: Send + Sync {
    fn check(&self, ctx: &mut C) -> bool;
}

/// A setup step run before (preconfiguration) or after (configuration) a
/// node's guard.
pub trait Configuration<C>: Send + Sync {
    fn configure(&self, ctx: &mut C);
}

impl<C, T: Condition<C> + ?Sized> Condition<C> for Box<T> {
    #[inline]
    fn check(&self, ctx: &mut C) -> bool {
        (**self).check(ctx)
    }
}

impl<C, T: Configuration<C> + ?Sized> Configuration<C> for Box<T> {
    #[inline]
    fn configure(&self, ctx: &mut C) {
        (**self).configure(ctx)
    }
}

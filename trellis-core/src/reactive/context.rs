//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a reactive field is read,
//! the current computation is subscribed to that field's dependency set.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. Entering a context (running
//! an effect) pushes the effect; dropping the returned guard pops it. Because
//! the pop happens in `Drop`, the enclosing effect is restored on every exit
//! path, including a panic unwinding out of the effect body.
//!
//! An entry may also be empty: [`untrack`] pushes a blank entry so that reads
//! inside it register nothing, even when an effect is running further down the
//! stack.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::EffectCore;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Rc<EffectCore>>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Make `effect` the active computation until the guard is dropped.
    pub(crate) fn enter(effect: Rc<EffectCore>) -> Self {
        let subscriber_id = Some(effect.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(effect)));
        Self { subscriber_id }
    }

    /// Suspend tracking until the guard is dropped.
    fn enter_untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self {
            subscriber_id: None,
        }
    }

    /// Check if a computation is currently collecting dependencies.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the id of the computation currently collecting dependencies.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Self::current().map(|effect| effect.id())
    }

    /// Number of entries on the stack, tracked or not.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn current() -> Option<Rc<EffectCore>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.try_with(|stack| stack.borrow_mut().pop());

        if let Ok(Some(entry)) = popped {
            debug_assert_eq!(
                entry.as_ref().map(|effect| effect.id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// Run `f` without subscribing the active computation to anything it reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveEffect;

    #[test]
    fn context_tracks_effect() {
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        let effect = ReactiveEffect::new(|| ());
        {
            let _ctx = ReactiveContext::enter(effect.core());
            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(effect.id()));
        }

        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts_restore_parent() {
        let outer = ReactiveEffect::new(|| ());
        let inner = ReactiveEffect::new(|| ());

        {
            let _outer = ReactiveContext::enter(outer.core());
            {
                let _inner = ReactiveContext::enter(inner.core());
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner.id()));
            }
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untrack_hides_the_active_effect() {
        let effect = ReactiveEffect::new(|| ());
        let _ctx = ReactiveContext::enter(effect.core());

        untrack(|| {
            assert!(!ReactiveContext::is_active());
            assert_eq!(ReactiveContext::depth(), 2);
        });

        assert!(ReactiveContext::is_active());
    }
}

//! Change notifications from the view window to its presentation layer.
//!
//! A small synchronous fan-out: subscribers register per signal kind and
//! are invoked in subscription order on the event thread, during the
//! window operation that caused the change. Handlers must not call back
//! into the emitting window; emission is non-reentrant (asserted in
//! debug builds).

use std::cell::Cell;

use rustc_hash::FxHashMap;

/// A notification emitted by the view window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSignal {
    /// The window is about to switch to a different screen.
    ScreenAboutToChange,
    /// The screen produced output; the window image is stale.
    OutputChanged,
    /// The window anchor moved to `line`.
    Scrolled { line: i32 },
    /// The selection was created, moved, or cleared.
    SelectionChanged,
    /// The search-result cursor moved.
    CurrentResultLineChanged,
}

/// Field-less key identifying a [`WindowSignal`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    ScreenAboutToChange,
    OutputChanged,
    Scrolled,
    SelectionChanged,
    CurrentResultLineChanged,
}

impl WindowSignal {
    /// The subscription key for this signal.
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::ScreenAboutToChange => SignalKind::ScreenAboutToChange,
            Self::OutputChanged => SignalKind::OutputChanged,
            Self::Scrolled { .. } => SignalKind::Scrolled,
            Self::SelectionChanged => SignalKind::SelectionChanged,
            Self::CurrentResultLineChanged => SignalKind::CurrentResultLineChanged,
        }
    }
}

type Handler = Box<dyn FnMut(&WindowSignal)>;

/// Subscriber registry keyed by signal kind.
#[derive(Default)]
pub struct SignalBus {
    subscribers: FxHashMap<SignalKind, Vec<Handler>>,
    emitting: Cell<bool>,
}

impl SignalBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one signal kind.
    ///
    /// Subscriptions last for the bus's lifetime; window and subscribers
    /// share the session, so there is no unsubscribe.
    pub fn subscribe(&mut self, kind: SignalKind, handler: impl FnMut(&WindowSignal) + 'static) {
        self.subscribers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Deliver `signal` to every handler of its kind, in subscription
    /// order.
    pub fn emit(&mut self, signal: WindowSignal) {
        debug_assert!(!self.emitting.get(), "reentrant signal emission");
        self.emitting.set(true);

        if let Some(handlers) = self.subscribers.get_mut(&signal.kind()) {
            for handler in handlers {
                handler(&signal);
            }
        }

        self.emitting.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn delivers_to_matching_kind_only() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = SignalBus::new();

        let log = Rc::clone(&seen);
        bus.subscribe(SignalKind::Scrolled, move |signal| {
            log.borrow_mut().push(*signal);
        });

        bus.emit(WindowSignal::OutputChanged);
        bus.emit(WindowSignal::Scrolled { line: 12 });

        assert_eq!(*seen.borrow(), vec![WindowSignal::Scrolled { line: 12 }]);
    }

    #[test]
    fn subscription_order_is_delivery_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut bus = SignalBus::new();

        for tag in 0..3 {
            let log = Rc::clone(&order);
            bus.subscribe(SignalKind::SelectionChanged, move |_| {
                log.borrow_mut().push(tag);
            });
        }

        bus.emit(WindowSignal::SelectionChanged);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn emit_without_subscribers_is_noop() {
        let mut bus = SignalBus::new();
        bus.emit(WindowSignal::CurrentResultLineChanged);
    }
}

//! This module provides the notification layer through which the engine reports its activity.
//!
//! Each notification kind has its own channel. Signal channels carry no payload; the runtime
//! error channel carries the failure that stopped the machine. Subscribing returns a
//! [`Subscription`] handle that removes the listener again.
//!
//! Listeners run synchronously while the engine is mutably borrowed, so they cannot reach back
//! into the engine.

use crate::types::TuringMachineError;
use std::fmt;

/// The notification kinds the engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The machine entered the halt state.
    HaltState,
    /// The machine state changed and views should refresh.
    UiUpdate,
    /// An isolated computation finished and its result was merged.
    SkipDone,
    /// An isolated computation was cancelled by `halt`.
    SkipInterrupt,
    /// An isolated computation ran out of time.
    SkipTimeout,
    /// The machine stopped on a runtime error.
    RuntimeError,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::HaltState => "haltstate",
            EventKind::UiUpdate => "uiupdate",
            EventKind::SkipDone => "skipdone",
            EventKind::SkipInterrupt => "skipinterrupt",
            EventKind::SkipTimeout => "skiptimeout",
            EventKind::RuntimeError => "runtimeerror",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

type Listener<T> = Box<dyn FnMut(&T)>;

struct Channel<T> {
    listeners: Vec<(u64, Listener<T>)>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }
}

impl<T> Channel<T> {
    fn emit(&mut self, payload: &T) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(payload);
        }
    }

    fn remove(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }
}

/// The set of notification channels owned by an engine.
#[derive(Default)]
pub struct Events {
    next_id: u64,
    halt_state: Channel<()>,
    ui_update: Channel<()>,
    skip_done: Channel<()>,
    skip_interrupt: Channel<()>,
    skip_timeout: Channel<()>,
    runtime_error: Channel<TuringMachineError>,
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Events")
            .field("halt_state", &self.halt_state.listeners.len())
            .field("ui_update", &self.ui_update.listeners.len())
            .field("skip_done", &self.skip_done.listeners.len())
            .field("skip_interrupt", &self.skip_interrupt.listeners.len())
            .field("skip_timeout", &self.skip_timeout.listeners.len())
            .field("runtime_error", &self.runtime_error.listeners.len())
            .finish()
    }
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_halt_state(&mut self, mut listener: impl FnMut() + 'static) -> Subscription {
        self.subscribe_signal(EventKind::HaltState, Box::new(move |_: &()| listener()))
    }

    pub fn on_ui_update(&mut self, mut listener: impl FnMut() + 'static) -> Subscription {
        self.subscribe_signal(EventKind::UiUpdate, Box::new(move |_: &()| listener()))
    }

    pub fn on_skip_done(&mut self, mut listener: impl FnMut() + 'static) -> Subscription {
        self.subscribe_signal(EventKind::SkipDone, Box::new(move |_: &()| listener()))
    }

    pub fn on_skip_interrupt(&mut self, mut listener: impl FnMut() + 'static) -> Subscription {
        self.subscribe_signal(EventKind::SkipInterrupt, Box::new(move |_: &()| listener()))
    }

    pub fn on_skip_timeout(&mut self, mut listener: impl FnMut() + 'static) -> Subscription {
        self.subscribe_signal(EventKind::SkipTimeout, Box::new(move |_: &()| listener()))
    }

    pub fn on_runtime_error(
        &mut self,
        listener: impl FnMut(&TuringMachineError) + 'static,
    ) -> Subscription {
        let id = self.next_id();
        self.runtime_error.listeners.push((id, Box::new(listener)));
        Subscription {
            kind: EventKind::RuntimeError,
            id,
        }
    }

    /// Removes a listener. Returns `false` if it was already removed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        match subscription.kind {
            EventKind::RuntimeError => self.runtime_error.remove(subscription.id),
            kind => self
                .signal(kind)
                .is_some_and(|channel| channel.remove(subscription.id)),
        }
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::HaltState => self.halt_state.listeners.len(),
            EventKind::UiUpdate => self.ui_update.listeners.len(),
            EventKind::SkipDone => self.skip_done.listeners.len(),
            EventKind::SkipInterrupt => self.skip_interrupt.listeners.len(),
            EventKind::SkipTimeout => self.skip_timeout.listeners.len(),
            EventKind::RuntimeError => self.runtime_error.listeners.len(),
        }
    }

    /// Notifies every listener of a signal channel.
    ///
    /// `EventKind::RuntimeError` needs a payload and is sent with [`Events::emit_runtime_error`].
    pub(crate) fn emit(&mut self, kind: EventKind) {
        if let Some(channel) = self.signal(kind) {
            channel.emit(&());
        }
    }

    pub(crate) fn emit_runtime_error(&mut self, error: &TuringMachineError) {
        self.runtime_error.emit(error);
    }

    fn subscribe_signal(&mut self, kind: EventKind, listener: Listener<()>) -> Subscription {
        let id = self.next_id();
        if let Some(channel) = self.signal(kind) {
            channel.listeners.push((id, listener));
        }
        Subscription { kind, id }
    }

    /// Returns the payload-free channel for `kind`, or `None` for the runtime error channel.
    fn signal(&mut self, kind: EventKind) -> Option<&mut Channel<()>> {
        match kind {
            EventKind::HaltState => Some(&mut self.halt_state),
            EventKind::UiUpdate => Some(&mut self.ui_update),
            EventKind::SkipDone => Some(&mut self.skip_done),
            EventKind::SkipInterrupt => Some(&mut self.skip_interrupt),
            EventKind::SkipTimeout => Some(&mut self.skip_timeout),
            EventKind::RuntimeError => None,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateId;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_signal_listeners_are_called() {
        let mut events = Events::new();
        let count = Rc::new(RefCell::new(0));

        let seen = count.clone();
        events.on_ui_update(move || *seen.borrow_mut() += 1);
        let seen = count.clone();
        events.on_ui_update(move || *seen.borrow_mut() += 10);

        events.emit(EventKind::UiUpdate);
        events.emit(EventKind::HaltState);

        assert_eq!(*count.borrow(), 11);
    }

    #[test]
    fn test_runtime_error_payload() {
        let mut events = Events::new();
        let received = Rc::new(RefCell::new(Vec::new()));

        let sink = received.clone();
        events.on_runtime_error(move |error| sink.borrow_mut().push(error.clone()));

        let error = TuringMachineError::NoMatchingTransition {
            state: StateId::initial(),
            symbol: 'x',
        };
        events.emit_runtime_error(&error);

        assert_eq!(*received.borrow(), vec![error]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut events = Events::new();
        let count = Rc::new(RefCell::new(0));

        let seen = count.clone();
        let subscription = events.on_skip_timeout(move || *seen.borrow_mut() += 1);
        let errors = events.on_runtime_error(|_| {});
        assert_eq!(events.listener_count(EventKind::SkipTimeout), 1);

        assert!(events.unsubscribe(subscription));
        assert!(!events.unsubscribe(subscription));
        assert!(events.unsubscribe(errors));
        assert_eq!(events.listener_count(EventKind::RuntimeError), 0);

        events.emit(EventKind::SkipTimeout);
        assert_eq!(*count.borrow(), 0);
    }

    #[test]
    fn test_subscriptions_are_per_kind() {
        let mut events = Events::new();
        let halt = events.on_halt_state(|| {});
        let done = events.on_skip_done(|| {});

        assert_ne!(halt, done);
        assert_eq!(halt.kind(), EventKind::HaltState);
        assert_eq!(done.kind().to_string(), "skipdone");
    }
}

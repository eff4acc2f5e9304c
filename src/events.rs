//! Change notifications raised by the client engine.

use parking_lot::Mutex;

/// Events delivered to registered observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientEvent {
    /// A probe completed and the device model was replaced.
    ProbeCompleted,
    /// An ingestion batch applied at least one observation.
    DataChanged,
    /// Sampling stopped, either explicitly or after too many consecutive
    /// failed ticks.
    SamplingStopped,
}

type Observer = Box<dyn Fn(ClientEvent) + Send + Sync>;

/// Explicit subscriber list with synchronous, in-order delivery.
///
/// Observers run on the thread/task that caused the state change; there is
/// no fan-out concurrency. Keep them short.
#[derive(Default)]
pub(crate) struct Observers {
    list: Mutex<Vec<Observer>>,
}

impl Observers {
    pub(crate) fn subscribe(&self, observer: Observer) {
        self.list.lock().push(observer);
    }

    pub(crate) fn notify(&self, event: ClientEvent) {
        for observer in self.list.lock().iter() {
            observer(event);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers").field("count", &self.list.lock().len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn observers_fire_in_subscription_order() {
        let observers = Observers::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            observers.subscribe(Box::new(move |_| order.lock().push(tag)));
        }

        observers.notify(ClientEvent::ProbeCompleted);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn notify_is_synchronous() {
        let observers = Observers::default();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        observers.subscribe(Box::new(move |event| {
            assert_eq!(event, ClientEvent::DataChanged);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        observers.notify(ClientEvent::DataChanged);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}

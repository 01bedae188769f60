use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use derive_more::Display;
use parking_lot::Mutex;

use super::ArrayShape;

/// A shape-change event, emitted by a root dataset after a successful write.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{name} {shape:?}")]
pub struct ShapeEvent {
    /// The name of the dataset.
    pub name: String,
    /// The shape of the dataset after the write.
    pub shape: ArrayShape,
}

/// A shape-change event listener.
pub trait ShapeEventListener: Send + Sync {
    /// Called after the shape of a dataset has been updated.
    fn shape_changed(&self, event: &ShapeEvent);
}

impl<F: Fn(&ShapeEvent) + Send + Sync> ShapeEventListener for F {
    fn shape_changed(&self, event: &ShapeEvent) {
        self(event);
    }
}

/// Identifies a registered [`ShapeEventListener`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display)]
pub struct ListenerId(u64);

/// Dispatches [`ShapeEvent`]s to registered listeners.
///
/// Shared by a root dataset, its views and its clones.
#[derive(Default)]
pub(crate) struct EventDelegate {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ShapeEventListener>)>>,
}

impl EventDelegate {
    pub(crate) fn add(&self, listener: Arc<dyn ShapeEventListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let len = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != len
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Notify all listeners. Listeners are called without holding the listener lock, so they may register or remove listeners.
    pub(crate) fn fire(&self, event: &ShapeEvent) {
        let listeners = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect::<Vec<_>>();
        log::trace!("shape event {event} to {} listeners", listeners.len());
        for listener in listeners {
            listener.shape_changed(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn event_delegate() {
        let delegate = EventDelegate::default();
        let count = Arc::new(AtomicUsize::new(0));
        let id = {
            let count = count.clone();
            delegate.add(Arc::new(move |event: &ShapeEvent| {
                assert_eq!(event.shape, vec![2, 6]);
                count.fetch_add(1, Ordering::Relaxed);
            }))
        };
        let event = ShapeEvent {
            name: "data".to_string(),
            shape: vec![2, 6],
        };
        assert_eq!(event.to_string(), "data [2, 6]");
        delegate.fire(&event);
        assert_eq!(count.load(Ordering::Relaxed), 1);
        assert!(delegate.remove(id));
        assert!(!delegate.remove(id));
        assert_eq!(delegate.len(), 0);
        delegate.fire(&event);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }
}

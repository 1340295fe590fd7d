use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

use crate::event::{ChangeEvent, CompoundId, Notification};
use crate::schema::Schema;

/// Receives every notification raised by a schema.
///
/// Observers run synchronously inside the mutating call and cannot reach
/// back into the schema.
pub trait ChangeObserver: Send {
    fn notify(&mut self, notification: &Notification);
}

/// Handle returned by [`Schema::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

/// Dispatches notifications and tracks open compound operations.
#[derive(Default)]
pub(crate) struct ChangeNotifier {
    observers: Vec<(ObserverId, Box<dyn ChangeObserver>)>,
    next_observer: usize,
    seq: u64,
    open: Vec<CompoundId>,
}

impl ChangeNotifier {
    pub(crate) fn subscribe(&mut self, observer: Box<dyn ChangeObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        before != self.observers.len()
    }

    pub(crate) fn emit(&mut self, event: &ChangeEvent) {
        self.seq += 1;
        let notification = Notification {
            seq: self.seq,
            compound: self.open.first().copied(),
            depth: self.open.len(),
            event: event.clone(),
        };
        for (_, observer) in &mut self.observers {
            observer.notify(&notification);
        }
    }

    pub(crate) fn begin(&mut self, message: &str) -> CompoundId {
        let id = CompoundId::new();
        self.open.push(id);
        trace!(compound = %id, depth = self.open.len(), message, "compound started");
        self.emit(&ChangeEvent::CompoundStarted {
            id,
            message: message.to_string(),
        });
        id
    }

    pub(crate) fn end(&mut self, id: CompoundId) {
        self.emit(&ChangeEvent::CompoundEnded { id });
        if let Some(position) = self.open.iter().rposition(|open| *open == id) {
            self.open.truncate(position);
        }
        trace!(compound = %id, depth = self.open.len(), "compound ended");
    }

    pub(crate) fn depth(&self) -> usize {
        self.open.len()
    }
}

/// Scope guard for a compound operation.
///
/// Every notification raised while the guard is alive is attributed to the
/// same outermost compound. The closing bracket is emitted when the guard is
/// dropped, also when the edit inside fails or panics.
pub struct CompoundGuard<'a> {
    schema: &'a mut Schema,
    id: CompoundId,
}

impl<'a> CompoundGuard<'a> {
    pub(crate) fn new(schema: &'a mut Schema, message: &str) -> Self {
        let id = schema.notifier.begin(message);
        Self { schema, id }
    }

    pub fn id(&self) -> CompoundId {
        self.id
    }
}

impl Deref for CompoundGuard<'_> {
    type Target = Schema;

    fn deref(&self) -> &Schema {
        self.schema
    }
}

impl DerefMut for CompoundGuard<'_> {
    fn deref_mut(&mut self) -> &mut Schema {
        self.schema
    }
}

impl Drop for CompoundGuard<'_> {
    fn drop(&mut self) {
        self.schema.notifier.end(self.id);
    }
}

/// Observer that records every notification in memory.
///
/// Clones share the same buffer, so a clone can be handed to
/// [`Schema::subscribe`] while the original is kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    inner: Arc<Mutex<Vec<Notification>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded events without compound brackets.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.notifications()
            .into_iter()
            .map(|notification| notification.event)
            .filter(|event| !event.is_bracket())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ChangeObserver for EventLog {
    fn notify(&mut self, notification: &Notification) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
    }
}

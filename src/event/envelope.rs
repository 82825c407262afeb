//! Event envelope and type-erased event views.

use crate::event::{Event, EventType};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A posted event together with its tracking data.
///
/// The envelope is shared by every handler the event matches, including
/// handlers running later on the main thread or in the worker pool.
pub struct EventEnvelope<E: Event> {
    event: Arc<E>,
    event_id: Uuid,
    posted_at: chrono::DateTime<chrono::Utc>,
}

impl<E: Event> EventEnvelope<E> {
    /// Create a new envelope from an event
    pub fn new(event: E) -> Self {
        Self {
            event: Arc::new(event),
            event_id: Uuid::new_v4(),
            posted_at: chrono::Utc::now(),
        }
    }

    /// Get the event ID
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        E::event_type()
    }

    /// When the event was posted
    pub fn posted_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.posted_at
    }

    /// Borrow the event
    pub fn event(&self) -> &E {
        &self.event
    }

    /// Whether a handler declared for `accepted` receives this event
    pub fn matches(&self, accepted: &EventType) -> bool {
        accepted.is_any_event() || E::is_a(accepted.id())
    }

    /// View the event as `accepted`, if it matches
    pub fn view_as(&self, accepted: &EventType) -> Option<EventView> {
        if accepted.id() == TypeId::of::<E>() {
            Some(EventView::new(Arc::clone(&self.event)))
        } else if accepted.is_any_event() {
            let event: Arc<dyn Event> = self.event.clone();
            Some(EventView::new(event))
        } else {
            E::upcast(&self.event, accepted.id())
        }
    }
}

impl<E: Event> fmt::Debug for EventEnvelope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("type_name", &E::event_type())
            .field("event_id", &self.event_id)
            .field("posted_at", &self.posted_at)
            .finish()
    }
}

/// A type-erased view of an event as one accepted type.
///
/// Holds an `Arc<T>` where `T` may be unsized (a capability such as
/// `dyn Animal`), so handlers borrow `&T` regardless of how the event was
/// matched.
pub struct EventView {
    inner: Box<dyn Any>,
    type_name: &'static str,
}

impl EventView {
    /// Wrap a shared view of an event
    pub fn new<T: ?Sized + 'static>(view: Arc<T>) -> Self {
        Self {
            inner: Box::new(view),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the view as `T`
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<Arc<T>>().map(|view| &**view)
    }

    /// Name of the viewed type
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for EventView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventView")
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impl_event;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Square {
        size: u32,
    }

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    impl_event!(Square: dyn Shape);

    #[test]
    fn test_envelope_creation() {
        let envelope = EventEnvelope::new(Square { size: 2 });
        assert_eq!(envelope.event_type(), "Square");
        assert_eq!(envelope.event().size, 2);
        assert_ne!(envelope.event_id(), Uuid::nil());
        assert_ne!(
            envelope.event_id(),
            EventEnvelope::new(Square { size: 2 }).event_id()
        );
    }

    #[test]
    fn test_envelope_matching() {
        let envelope = EventEnvelope::new(Square { size: 3 });
        assert!(envelope.matches(&EventType::of::<Square>()));
        assert!(envelope.matches(&EventType::of::<dyn Shape>()));
        assert!(envelope.matches(&EventType::of::<dyn Event>()));
        assert!(!envelope.matches(&EventType::of::<String>()));
    }

    #[test]
    fn test_view_downcast() {
        let envelope = EventEnvelope::new(Square { size: 5 });

        let exact = envelope.view_as(&EventType::of::<Square>()).unwrap();
        assert_eq!(exact.downcast::<Square>(), Some(&Square { size: 5 }));
        assert!(exact.downcast::<String>().is_none());

        let shape = envelope.view_as(&EventType::of::<dyn Shape>()).unwrap();
        assert_eq!(shape.downcast::<dyn Shape>().unwrap().sides(), 4);

        let any = envelope.view_as(&EventType::of::<dyn Event>()).unwrap();
        assert!(format!("{:?}", any.downcast::<dyn Event>().unwrap()).contains("Square"));

        assert!(envelope.view_as(&EventType::of::<String>()).is_none());
    }
}

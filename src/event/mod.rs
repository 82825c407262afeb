//! Core event system traits and types.
//!
//! This module defines the fundamental `Event` trait, the `EventType`
//! token handlers are declared against, and the `impl_event!` macro that
//! declares which capabilities (trait objects) an event satisfies.

use std::any::TypeId;
use std::fmt::{self, Debug};
use std::sync::Arc;

pub mod envelope;

pub use envelope::{EventEnvelope, EventView};

/// Core trait that all events must implement.
///
/// Events are opaque data to the bus: they are matched by their runtime
/// type only. A handler declared for the event's own type receives it, and
/// so does a handler declared for any capability the event lists through
/// [`Event::is_a`] and [`Event::upcast`]. Every event also satisfies
/// `dyn Event`.
///
/// Use [`impl_event!`](crate::impl_event) rather than implementing this by
/// hand.
///
/// # Example
///
/// ```rust
/// use threaded_events::impl_event;
///
/// trait Animal: Send + Sync {
///     fn name(&self) -> &str;
/// }
///
/// #[derive(Debug, Clone)]
/// struct Dog {
///     name: String,
/// }
///
/// impl Animal for Dog {
///     fn name(&self) -> &str {
///         &self.name
///     }
/// }
///
/// impl_event!(Dog: dyn Animal);
/// ```
pub trait Event: Send + Sync + Debug + 'static {
    /// Returns the type name of this event.
    ///
    /// This is used for debugging and logging purposes.
    fn event_type() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }

    /// Whether a handler declared for `target` accepts this event type.
    fn is_a(target: TypeId) -> bool
    where
        Self: Sized,
    {
        target == TypeId::of::<Self>()
    }

    /// View the event as one of the capabilities it declares.
    ///
    /// Only called for targets other than the event's own type and
    /// `dyn Event`, which the envelope handles itself.
    fn upcast(event: &Arc<Self>, target: TypeId) -> Option<EventView>
    where
        Self: Sized,
    {
        let _ = (event, target);
        None
    }
}

/// Token naming the type a handler accepts.
///
/// The type can be concrete (`Person`) or a capability (`dyn Animal`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    /// Token for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type identifier used for matching
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this token names the catch-all `dyn Event` capability
    pub fn is_any_event(&self) -> bool {
        self.id == TypeId::of::<dyn Event>()
    }
}

impl Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Implement [`Event`] for a type, optionally listing the capabilities it
/// satisfies.
///
/// Capabilities must be trait objects the type implements; a handler
/// declared for one of them receives the event as that trait object.
///
/// ```rust
/// use threaded_events::impl_event;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Person {
///     name: String,
///     count: u32,
/// }
///
/// impl_event!(Person);
/// ```
#[macro_export]
macro_rules! impl_event {
    ($ty:ty $(: $($capability:ty),+ $(,)?)?) => {
        impl $crate::Event for $ty {
            fn event_type() -> &'static str {
                stringify!($ty)
            }

            fn is_a(target: ::std::any::TypeId) -> bool {
                target == ::std::any::TypeId::of::<$ty>()
                    $($(|| target == ::std::any::TypeId::of::<$capability>())+)?
            }

            fn upcast(
                event: &::std::sync::Arc<Self>,
                target: ::std::any::TypeId,
            ) -> ::std::option::Option<$crate::EventView> {
                $($(
                    if target == ::std::any::TypeId::of::<$capability>() {
                        let view: ::std::sync::Arc<$capability> = event.clone();
                        return ::std::option::Option::Some($crate::EventView::new(view));
                    }
                )+)?
                let _ = (event, target);
                ::std::option::Option::None
            }
        }
    };
}

impl_event!(String);

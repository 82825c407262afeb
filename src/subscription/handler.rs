//! Handler declarations.
//!
//! A subscriber type lists its handlers in [`Subscriber::subscriptions`].
//! Each declaration names the accepted event type, an optional thread mode
//! and the callable to run; the [`scanner`](super::scanner) binds them to
//! a subscriber instance at registration.

use crate::error::BoxError;
use crate::event::{EventType, EventView};
use crate::subscription::ThreadMode;
use std::fmt;
use std::sync::Arc;

/// Erased callable taking the subscriber and the matched event view
pub(crate) type MethodFn<S> = Arc<dyn Fn(&S, &EventView) -> Result<(), BoxError> + Send + Sync>;

/// A type whose instances can be registered on the bus.
///
/// # Example
///
/// ```rust
/// use threaded_events::{impl_event, Handlers, Subscriber, ThreadMode};
///
/// #[derive(Debug, Clone)]
/// struct Person {
///     name: String,
/// }
///
/// impl_event!(Person);
///
/// struct Screen;
///
/// impl Screen {
///     fn show(&self, person: &Person) {
///         println!("{}", person.name);
///     }
/// }
///
/// impl Subscriber for Screen {
///     fn subscriptions(handlers: &mut Handlers<Self>) {
///         handlers.on(ThreadMode::Main, Self::show);
///     }
/// }
/// ```
pub trait Subscriber: Send + Sync + Sized + 'static {
    /// Declare this type's handlers
    fn subscriptions(handlers: &mut Handlers<Self>);
}

/// Conversion of a handler's return value into an invocation outcome.
pub trait IntoHandlerResult {
    /// Convert into the outcome reported by the invoker
    fn into_handler_result(self) -> Result<(), BoxError>;
}

impl IntoHandlerResult for () {
    fn into_handler_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> IntoHandlerResult for Result<(), E>
where
    E: Into<BoxError>,
{
    fn into_handler_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// One declared handler of subscriber type `S`.
///
/// This is the record a declaration mechanism hands to the scanner:
/// a name, the declared parameter types, an optional thread mode and the
/// erased callable. Typed declarations always carry exactly one parameter;
/// records built with [`HandlerMethod::new`] are validated at scan time.
pub struct HandlerMethod<S> {
    name: Arc<str>,
    params: Vec<EventType>,
    mode: Option<ThreadMode>,
    call: MethodFn<S>,
}

impl<S: 'static> HandlerMethod<S> {
    /// Create a declaration from raw metadata
    pub fn new<F>(
        name: impl Into<Arc<str>>,
        params: Vec<EventType>,
        mode: Option<ThreadMode>,
        call: F,
    ) -> Self
    where
        F: Fn(&S, &EventView) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params,
            mode,
            call: Arc::new(call),
        }
    }

    /// Create a typed declaration accepting `&T`
    pub fn typed<T, F, R>(mode: Option<ThreadMode>, handler: F) -> Self
    where
        T: ?Sized + 'static,
        F: Fn(&S, &T) -> R + Send + Sync + 'static,
        R: IntoHandlerResult,
    {
        Self::new(
            std::any::type_name::<F>(),
            vec![EventType::of::<T>()],
            mode,
            move |subscriber: &S, view: &EventView| match view.downcast::<T>() {
                Some(event) => handler(subscriber, event).into_handler_result(),
                None => Err(format!(
                    "expected {}, got {}",
                    std::any::type_name::<T>(),
                    view.type_name()
                )
                .into()),
            },
        )
    }

    /// Override the handler name used in logs and errors
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Handler name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter types
    pub fn params(&self) -> &[EventType] {
        &self.params
    }

    /// Declared thread mode, `None` when left to the default
    pub fn mode(&self) -> Option<ThreadMode> {
        self.mode
    }

    pub(crate) fn into_parts(self) -> (Arc<str>, Vec<EventType>, Option<ThreadMode>, MethodFn<S>) {
        (self.name, self.params, self.mode, self.call)
    }

    /// Re-root a base component's declaration onto the type embedding it
    fn project<P: 'static>(self, project: fn(&P) -> &S) -> HandlerMethod<P> {
        let call = self.call;
        HandlerMethod {
            name: self.name,
            params: self.params,
            mode: self.mode,
            call: Arc::new(move |outer: &P, view: &EventView| call(project(outer), view)),
        }
    }
}

impl<S> fmt::Debug for HandlerMethod<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Builder collecting the handler declarations of subscriber type `S`.
pub struct Handlers<S> {
    own: Vec<HandlerMethod<S>>,
    inherited: Vec<HandlerMethod<S>>,
}

impl<S: Subscriber> Handlers<S> {
    pub(crate) fn new() -> Self {
        Self {
            own: Vec::new(),
            inherited: Vec::new(),
        }
    }

    /// Declare a handler for `T` running on `mode`
    pub fn on<T, F, R>(&mut self, mode: ThreadMode, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        F: Fn(&S, &T) -> R + Send + Sync + 'static,
        R: IntoHandlerResult,
    {
        self.method(HandlerMethod::typed(Some(mode), handler))
    }

    /// Declare a handler for `T` with the default thread mode (posting)
    pub fn on_posting<T, F, R>(&mut self, handler: F) -> &mut Self
    where
        T: ?Sized + 'static,
        F: Fn(&S, &T) -> R + Send + Sync + 'static,
        R: IntoHandlerResult,
    {
        self.method(HandlerMethod::typed(None, handler))
    }

    /// Add a raw declaration
    pub fn method(&mut self, method: HandlerMethod<S>) -> &mut Self {
        self.own.push(method);
        self
    }

    /// Include the handlers declared by an embedded base component.
    ///
    /// They are discovered after this type's own handlers, the way a base
    /// type's methods follow the derived type's when walking up a type
    /// chain. Types that do not implement [`Subscriber`] are never walked.
    pub fn inherit<B: Subscriber>(&mut self, project: fn(&S) -> &B) -> &mut Self {
        self.inherited
            .extend(declared::<B>().into_iter().map(|method| method.project(project)));
        self
    }

    /// Number of declarations, inherited ones included
    pub fn len(&self) -> usize {
        self.own.len() + self.inherited.len()
    }

    /// Whether nothing is declared
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_methods(self) -> Vec<HandlerMethod<S>> {
        let mut methods = self.own;
        methods.extend(self.inherited);
        methods
    }
}

impl<S> fmt::Debug for Handlers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("own", &self.own)
            .field("inherited", &self.inherited)
            .finish()
    }
}

/// All declarations of `S`, own handlers first
pub(crate) fn declared<S: Subscriber>() -> Vec<HandlerMethod<S>> {
    let mut handlers = Handlers::new();
    S::subscriptions(&mut handlers);
    handlers.into_methods()
}

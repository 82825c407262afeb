//! Handler discovery.

use crate::error::{Error, Result};
use crate::event::EventView;
use crate::subscription::handler::{declared, Subscriber};
use crate::subscription::{BoundHandler, HandlerRef, SubscriberId, SubscriptionDescriptor};
use std::sync::Arc;
use tracing::trace;

/// Produce the subscription descriptors of one subscriber instance.
///
/// Walks the declarations of `S` (own handlers first, then those inherited
/// from embedded base components) and binds each to `subscriber`. A
/// declaration that does not take exactly one parameter fails the whole
/// scan. Does not touch any registry.
pub fn scan<S: Subscriber>(subscriber: &Arc<S>) -> Result<Vec<SubscriptionDescriptor>> {
    let id = SubscriberId::of(subscriber);
    let subscriber_name = std::any::type_name::<S>();
    let methods = declared::<S>();

    trace!(
        subscriber = subscriber_name,
        declared = methods.len(),
        "Scanning subscriber"
    );

    let mut descriptors = Vec::with_capacity(methods.len());
    for method in methods {
        let (name, params, mode, call) = method.into_parts();

        let accepted_type = match params.as_slice() {
            [accepted] => *accepted,
            params => {
                return Err(Error::InvalidHandler {
                    subscriber: subscriber_name,
                    handler: name.to_string(),
                    found: params.len(),
                })
            }
        };

        let target = Arc::clone(subscriber);
        let bound: BoundHandler = Arc::new(move |view: &EventView| call(&*target, view));

        descriptors.push(SubscriptionDescriptor::new(
            HandlerRef::new(id, subscriber_name, name, bound),
            mode.unwrap_or_default(),
            accepted_type,
        ));
    }

    Ok(descriptors)
}

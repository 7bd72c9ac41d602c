//! Multi-subscriber callback registries for load milestones.
//!
//! The loading pipeline reports milestones (view finished, scene completed,
//! progress ticks) to whoever subscribed. A registry owns its callbacks and
//! is dropped together with the owning context, so subscriptions never
//! outlive the load they observe.

/// Identifier handed out by [`EventRegistry::subscribe`], used to
/// unsubscribe a single callback.
pub type SubscriberId = u32;

type Subscriber<T> = Box<dyn FnMut(&T)>;

/// An ordered list of callbacks observing one kind of milestone.
///
/// Callbacks are invoked in subscription order. The registry is
/// single-threaded like the rest of the loading session.
pub struct EventRegistry<T> {
    subscribers: Vec<(SubscriberId, Subscriber<T>)>,
    next_id: SubscriberId,
}

impl<T> EventRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    /// Registers a callback and returns its id.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriberId
    where
        F: FnMut(&T) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes the callback with the given id.
    ///
    /// Returns `true` if it was present.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Invokes every subscriber with `value`, in subscription order.
    pub fn notify(&mut self, value: &T) {
        for (_, callback) in &mut self.subscribers {
            callback(value);
        }
    }

    /// Drops every subscriber.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether the registry has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl<T> Default for EventRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for EventRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn notify_calls_subscribers_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::<u32>::new();

        let a = Rc::clone(&seen);
        registry.subscribe(move |v| a.borrow_mut().push(("a", *v)));
        let b = Rc::clone(&seen);
        registry.subscribe(move |v| b.borrow_mut().push(("b", *v)));

        registry.notify(&7);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn unsubscribe_removes_one_callback() {
        let count = Rc::new(RefCell::new(0));
        let mut registry = EventRegistry::<()>::new();

        let c = Rc::clone(&count);
        let id = registry.subscribe(move |_| *c.borrow_mut() += 1);
        let c = Rc::clone(&count);
        registry.subscribe(move |_| *c.borrow_mut() += 10);

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));

        registry.notify(&());
        assert_eq!(*count.borrow(), 10);
    }

    #[test]
    fn clear_drops_everything() {
        let mut registry = EventRegistry::<()>::new();
        registry.subscribe(|_| {});
        registry.subscribe(|_| {});
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }
}

//! Observable values for the single-threaded UI. A `Channel` always holds a current value;
//! subscribers hear about the current value immediately, then about every later `publish`.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SubscriptionId(u64);

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Inner<T> {
    value: T,
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
    next_id: u64,
}

/// Cloning a channel yields another handle to the same value.
pub struct Channel<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Channel {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Channel<T> {
    pub fn new(initial: T) -> Channel<T> {
        Channel {
            inner: Rc::new(RefCell::new(Inner {
                value: initial,
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// A copy of the latest published value. Later publishes don't affect it.
    pub fn current_value(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Registers a callback and immediately replays the current value to it.
    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> SubscriptionId {
        let callback: Callback<T> = Rc::new(RefCell::new(callback));
        let (id, value) = {
            let mut inner = self.inner.borrow_mut();
            let id = SubscriptionId(inner.next_id);
            inner.next_id += 1;
            inner.subscribers.push((id, callback.clone()));
            (id, inner.value.clone())
        };
        (&mut *callback.borrow_mut())(&value);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.inner
            .borrow_mut()
            .subscribers
            .retain(|(other, _)| *other != id);
    }

    /// Replaces the value and notifies every subscriber. Callbacks may read or publish to this
    /// channel again; a callback is never re-entered while it's still running.
    pub fn publish(&self, value: T) {
        let subscribers: Vec<Callback<T>> = {
            let mut inner = self.inner.borrow_mut();
            inner.value = value.clone();
            inner.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in subscribers {
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (&mut *callback)(&value);
            }
        }
    }

    /// Clones the current value, lets `f` change the copy, then publishes it. The value handed
    /// out to subscribers earlier is never touched.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut value = self.current_value();
        f(&mut value);
        self.publish(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_latest_on_subscribe() {
        let channel = Channel::new(1);
        channel.publish(2);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        channel.subscribe(move |x| sink.borrow_mut().push(*x));
        channel.publish(3);

        assert_eq!(*seen.borrow(), vec![2, 3]);
        assert_eq!(channel.current_value(), 3);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let channel = Channel::new("a".to_string());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = channel.subscribe(move |x: &String| sink.borrow_mut().push(x.clone()));
        channel.publish("b".to_string());
        channel.unsubscribe(id);
        channel.publish("c".to_string());

        assert_eq!(*seen.borrow(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn update_never_mutates_a_published_value() {
        let channel = Channel::new(vec![1, 2]);
        let before = channel.current_value();
        channel.update(|v| v.push(3));

        assert_eq!(before, vec![1, 2]);
        assert_eq!(channel.current_value(), vec![1, 2, 3]);
    }

    #[test]
    fn callbacks_can_publish_to_other_channels() {
        let source = Channel::new(0);
        let doubled = Channel::new(0);
        let target = doubled.clone();
        source.subscribe(move |x| target.publish(x * 2));

        source.publish(21);
        assert_eq!(doubled.current_value(), 42);
    }
}

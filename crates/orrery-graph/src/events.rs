//! Typed event channel.
//!
//! Components publish into a channel; callers either drain the queue once
//! per frame or subscribe listeners that see every event as it is emitted.

use std::collections::VecDeque;

type Listener<E> = Box<dyn FnMut(&E)>;

pub struct EventChannel<E> {
    queue: VecDeque<E>,
    listeners: Vec<Listener<E>>,
    /// Oldest events are dropped past this length.
    capacity: usize,
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl<E> EventChannel<E> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { queue: VecDeque::new(), listeners: Vec::new(), capacity: capacity.max(1) }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&E) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn emit(&mut self, event: E) {
        for l in &mut self.listeners {
            l(&event);
        }
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
            log::debug!("event channel full; dropped oldest event");
        }
        self.queue.push_back(event);
    }

    pub fn emit_all(&mut self, events: impl IntoIterator<Item = E>) {
        for e in events {
            self.emit(e);
        }
    }

    /// Takes every queued event, oldest first.
    pub fn drain(&mut self) -> Vec<E> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

//! Change notification lists.
//!
//! Memory and the register file announce every mutation to the host
//! (register panels, video and keyboard displays). Callbacks run
//! synchronously, in subscription order, on the thread that mutates.

/// An ordered list of callbacks receiving events of type `E`.
pub struct Observers<E> {
    callbacks: Vec<Box<dyn FnMut(&E)>>,
}

impl<E> Observers<E> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    /// Register a callback. It will see every event notified afterwards.
    pub fn subscribe<F>(&mut self, callback: F)
    where
        F: FnMut(&E) + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Deliver an event to every callback.
    #[inline]
    pub fn notify(&mut self, event: &E) {
        for callback in &mut self.callbacks {
            callback(event);
        }
    }

    /// Drop all callbacks.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

//! LIFO resource deletion queue.
//!
//! Resources are queued for destruction in creation order and destroyed in
//! reverse, so dependents always go before their dependencies. The engine
//! keeps one global queue for init-time resources and one queue per frame
//! slot for transient per-frame resources.

use tracing::debug;

/// Deletion queue holding destruction closures.
///
/// Closures are executed in reverse push order (LIFO) when [`flush`] is
/// called or the queue is dropped.
///
/// [`flush`]: DeletionQueue::flush
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<Box<dyn FnOnce()>>,
}

impl DeletionQueue {
    /// Creates an empty deletion queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a destruction closure.
    ///
    /// The closure typically captures an RAII wrapper by move, so the
    /// wrapped resource lives until the queue is flushed.
    pub fn push(&mut self, deletor: impl FnOnce() + 'static) {
        self.deletors.push(Box::new(deletor));
    }

    /// Executes all queued closures in reverse push order and empties the
    /// queue. The queue can be reused afterwards.
    pub fn flush(&mut self) {
        if self.deletors.is_empty() {
            return;
        }

        debug!("Flushing deletion queue ({} entries)", self.deletors.len());
        while let Some(deletor) = self.deletors.pop() {
            deletor();
        }
    }

    /// Returns the number of queued closures.
    #[inline]
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    /// Returns true if no closures are queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_flush_runs_in_reverse_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut queue = DeletionQueue::new();

        for i in 0..3 {
            let order = Rc::clone(&order);
            queue.push(move || order.borrow_mut().push(i));
        }

        queue.flush();
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drop_flushes_pending_entries() {
        let ran = Rc::new(RefCell::new(false));
        {
            let mut queue = DeletionQueue::new();
            let ran = Rc::clone(&ran);
            queue.push(move || *ran.borrow_mut() = true);
        }
        assert!(*ran.borrow());
    }

    #[test]
    fn test_queue_reusable_after_flush() {
        let count = Rc::new(RefCell::new(0));
        let mut queue = DeletionQueue::new();

        let c = Rc::clone(&count);
        queue.push(move || *c.borrow_mut() += 1);
        queue.flush();
        assert_eq!(*count.borrow(), 1);

        let c = Rc::clone(&count);
        queue.push(move || *c.borrow_mut() += 1);
        queue.flush();
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_len_tracks_pushes() {
        let mut queue = DeletionQueue::new();
        assert_eq!(queue.len(), 0);
        queue.push(|| {});
        queue.push(|| {});
        assert_eq!(queue.len(), 2);
    }
}

//! Progress callbacks for multi-item operations (symbol downloads, file aggregation).
//!
//! Progress is a passive side channel: implementations observe, they never
//! influence control flow.

/// Progress callback for batch operations.
pub trait Progress {
    /// Called before an item is processed.
    fn on_start(&self, item: &str, index: usize, total: usize);

    /// Called when an item is done. `failure` carries the reason an item was
    /// skipped or failed.
    fn on_complete(&self, item: &str, index: usize, total: usize, failure: Option<&str>);

    /// Called when the entire batch is done.
    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize);
}

/// Shared reporters, so a caller can keep a handle to a reporter it lends out.
impl<P: Progress + ?Sized> Progress for std::sync::Arc<P> {
    fn on_start(&self, item: &str, index: usize, total: usize) {
        (**self).on_start(item, index, total)
    }

    fn on_complete(&self, item: &str, index: usize, total: usize, failure: Option<&str>) {
        (**self).on_complete(item, index, total, failure)
    }

    fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
        (**self).on_batch_complete(succeeded, failed, total)
    }
}

/// Reporter that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn on_start(&self, _item: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, _item: &str, _index: usize, _total: usize, _failure: Option<&str>) {}

    fn on_batch_complete(&self, _succeeded: usize, _failed: usize, _total: usize) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Progress;
    use std::cell::RefCell;

    /// Records every callback for assertions.
    #[derive(Default)]
    pub struct RecordingProgress {
        pub started: RefCell<Vec<String>>,
        pub failures: RefCell<Vec<String>>,
        pub batch: RefCell<Option<(usize, usize, usize)>>,
    }

    impl Progress for RecordingProgress {
        fn on_start(&self, item: &str, _index: usize, _total: usize) {
            self.started.borrow_mut().push(item.to_string());
        }

        fn on_complete(&self, item: &str, _index: usize, _total: usize, failure: Option<&str>) {
            if failure.is_some() {
                self.failures.borrow_mut().push(item.to_string());
            }
        }

        fn on_batch_complete(&self, succeeded: usize, failed: usize, total: usize) {
            *self.batch.borrow_mut() = Some((succeeded, failed, total));
        }
    }
}

//! Ordered undo stack for multi-stage operations
//!
//! Each forward stage that succeeds pushes the action that undoes it. If the
//! stack is dropped without `commit`, the actions run newest first, so only
//! stages that actually ran are undone, in reverse order.

pub(crate) struct Rollback<'a> {
    undo: Vec<(&'static str, Box<dyn FnOnce() + 'a>)>,
}

impl<'a> Rollback<'a> {
    pub(crate) fn new() -> Self {
        Self { undo: Vec::new() }
    }

    /// Register the undo action for a stage that just completed.
    pub(crate) fn defer(&mut self, stage: &'static str, undo: impl FnOnce() + 'a) {
        self.undo.push((stage, Box::new(undo)));
    }

    /// All stages succeeded; forget the undo actions.
    pub(crate) fn commit(mut self) {
        self.undo.clear();
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some((stage, undo)) = self.undo.pop() {
            log::debug!("vinput: rolling back {}", stage);
            undo();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_drop_runs_in_reverse() {
        let log = RefCell::new(Vec::new());
        {
            let mut rollback = Rollback::new();
            rollback.defer("first", || log.borrow_mut().push(1));
            rollback.defer("second", || log.borrow_mut().push(2));
            rollback.defer("third", || log.borrow_mut().push(3));
        }
        assert_eq!(*log.borrow(), vec![3, 2, 1]);
    }

    #[test]
    fn test_commit_disarms() {
        let log = RefCell::new(Vec::new());
        let mut rollback = Rollback::new();
        rollback.defer("first", || log.borrow_mut().push(1));
        rollback.commit();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_empty_rollback_is_noop() {
        let rollback = Rollback::new();
        drop(rollback);
    }
}

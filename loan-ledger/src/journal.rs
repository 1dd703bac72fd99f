//! Savepoints for collaborators that take part in a transition
//!
//! A transition commits its own state before issuing external transfers. If
//! any transfer fails, the ledger restores its checkpoint and rolls every
//! collaborator back to the savepoint taken when the transition began, so
//! nothing from the voided transition survives.

/// Position in a collaborator's journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(usize);

/// All-or-nothing participation in a ledger transition
pub trait Transactional {
    /// Start recording undo information
    fn savepoint(&self) -> Savepoint;

    /// Undo everything applied since `savepoint`
    fn rollback_to(&self, savepoint: Savepoint);

    /// Keep everything applied since `savepoint`
    fn release(&self, savepoint: Savepoint);
}

/// Undo log used by the in-memory collaborators
///
/// Entries are recorded only while at least one savepoint is open and
/// dropped once the outermost one is released.
#[derive(Debug)]
pub struct Journal<T> {
    entries: Vec<T>,
    open: usize,
}

impl<T> Default for Journal<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            open: 0,
        }
    }
}

impl<T> Journal<T> {
    /// Open a savepoint at the current position
    pub fn savepoint(&mut self) -> Savepoint {
        self.open += 1;
        Savepoint(self.entries.len())
    }

    /// Record an applied operation
    pub fn record(&mut self, entry: T) {
        if self.open > 0 {
            self.entries.push(entry);
        }
    }

    /// Close `savepoint` and return the operations to undo, newest first
    pub fn unwind(&mut self, savepoint: Savepoint) -> Vec<T> {
        let start = savepoint.0.min(self.entries.len());
        let undo: Vec<T> = self.entries.drain(start..).rev().collect();
        self.close();
        undo
    }

    /// Close `savepoint`, keeping its operations
    pub fn release(&mut self, _savepoint: Savepoint) {
        self.close();
    }

    /// Operations currently held for undo
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing held for undo
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn close(&mut self) {
        self.open = self.open.saturating_sub(1);
        if self.open == 0 {
            self.entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_only_inside_savepoint() {
        let mut journal = Journal::default();
        journal.record(1);
        assert!(journal.is_empty());

        let sp = journal.savepoint();
        journal.record(2);
        journal.record(3);
        assert_eq!(journal.unwind(sp), vec![3, 2]);
        assert!(journal.is_empty());
    }

    #[test]
    fn test_release_clears_outermost() {
        let mut journal = Journal::default();
        let outer = journal.savepoint();
        journal.record("a");
        let inner = journal.savepoint();
        journal.record("b");
        journal.release(inner);
        assert_eq!(journal.len(), 2);
        journal.release(outer);
        assert!(journal.is_empty());
    }

    #[test]
    fn test_nested_unwind_keeps_outer_entries() {
        let mut journal = Journal::default();
        let outer = journal.savepoint();
        journal.record(1);
        let inner = journal.savepoint();
        journal.record(2);
        assert_eq!(journal.unwind(inner), vec![2]);
        assert_eq!(journal.unwind(outer), vec![1]);
    }
}

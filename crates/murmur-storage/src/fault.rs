//! Fault injection for the in-memory store
//!
//! Lets tests fail specific reads or writes to exercise the windows where a
//! multi-step operation has committed some writes but not others.

use murmur_core::{StoreError, TreePath};
use parking_lot::Mutex;
use tracing::debug;

/// Which store operation a fault applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Read,
    Write,
}

#[derive(Debug, Clone)]
struct FaultRule {
    prefix: TreePath,
    op: FaultOp,
    remaining: usize,
}

/// Pending faults, consumed as matching operations arrive
#[derive(Debug, Default)]
pub struct FaultPlan {
    rules: Mutex<Vec<FaultRule>>,
}

impl FaultPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes at or below `prefix`
    pub fn fail_writes(&self, prefix: TreePath, count: usize) {
        self.push(prefix, FaultOp::Write, count);
    }

    /// Fail the next `count` reads at or below `prefix`
    pub fn fail_reads(&self, prefix: TreePath, count: usize) {
        self.push(prefix, FaultOp::Read, count);
    }

    /// Drop every pending fault
    pub fn clear(&self) {
        self.rules.lock().clear();
    }

    /// Number of faults that have not fired yet
    pub fn pending(&self) -> usize {
        self.rules.lock().iter().map(|r| r.remaining).sum()
    }

    fn push(&self, prefix: TreePath, op: FaultOp, count: usize) {
        if count == 0 {
            return;
        }
        self.rules.lock().push(FaultRule {
            prefix,
            op,
            remaining: count,
        });
    }

    /// Consume a matching fault, returning the error to report
    pub(crate) fn check(&self, path: &TreePath, op: FaultOp) -> Result<(), StoreError> {
        let mut rules = self.rules.lock();
        let Some(pos) = rules
            .iter()
            .position(|r| r.op == op && (r.prefix == *path || r.prefix.is_ancestor_of(path)))
        else {
            return Ok(());
        };

        rules[pos].remaining -= 1;
        if rules[pos].remaining == 0 {
            rules.remove(pos);
        }
        debug!(path = %path, ?op, "Injected store fault");

        Err(match op {
            FaultOp::Read => StoreError::fetch_failed(path, "injected fault"),
            FaultOp::Write => StoreError::write_failed(path, "injected fault"),
        })
    }
}

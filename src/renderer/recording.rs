//! Recording render target.
//!
//! Keeps every op it receives. Can be told to reject the op at a given
//! position, which is how commit failures are simulated.

use crate::error::TargetError;
use crate::types::MutationOp;

use super::commit::RenderTarget;

/// Render target that records ops instead of rendering them.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    ops: Vec<MutationOp>,
    fail_at: Option<usize>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the op at `index`, counted since the last [`take`](Self::take).
    pub fn failing_at(index: usize) -> Self {
        Self {
            ops: Vec::new(),
            fail_at: Some(index),
        }
    }

    /// Change or clear the failure point.
    pub fn set_fail_at(&mut self, index: Option<usize>) {
        self.fail_at = index;
    }

    /// Every op received so far, rejected ones included.
    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    /// Drain the recorded ops.
    pub fn take(&mut self) -> Vec<MutationOp> {
        std::mem::take(&mut self.ops)
    }
}

impl RenderTarget for RecordingTarget {
    fn apply_op(&mut self, op: &MutationOp) -> Result<(), TargetError> {
        let index = self.ops.len();
        self.ops.push(op.clone());
        if self.fail_at == Some(index) {
            return Err(TargetError::new(format!("rejected op {index}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    fn remove(index: u32) -> MutationOp {
        MutationOp::Remove {
            node: NodeId {
                index,
                generation: 0,
            },
        }
    }

    #[test]
    fn test_records_and_fails() {
        let mut target = RecordingTarget::failing_at(1);
        assert!(target.apply_op(&remove(0)).is_ok());
        assert!(target.apply_op(&remove(1)).is_err());
        assert!(target.apply_op(&remove(2)).is_ok());
        assert_eq!(target.ops().len(), 3);

        assert_eq!(target.take().len(), 3);
        assert!(target.ops().is_empty());
    }
}

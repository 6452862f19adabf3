use super::Workflow;
use crate::block::BlockId;
use crate::slot::SlotId;
use std::fmt;

/// A single reason why a workflow is not ready for code generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// A required slot has no link.
    UnconnectedSlot {
        block: BlockId,
        slot: SlotId,
        name: String,
    },
    /// Boundary slots have no meaning in a standalone program.
    ConnectedExternalSlot { slot: SlotId, name: String },
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyIssue::UnconnectedSlot { name, .. } => {
                write!(f, "required slot '{}' is not connected", name)
            }
            ConsistencyIssue::ConnectedExternalSlot { name, .. } => {
                write!(
                    f,
                    "external slot '{}' is connected, which is not allowed for execution",
                    name
                )
            }
        }
    }
}

impl Workflow {
    /// Every consistency problem of the tree, in tree order.
    pub fn consistency_issues(&self, for_execution: bool) -> Vec<ConsistencyIssue> {
        let mut issues = Vec::new();
        for id in self.slots_in_tree_order() {
            let Some(slot) = self.slot(id) else {
                continue;
            };
            if !slot.optional && !slot.is_connected() {
                issues.push(ConsistencyIssue::UnconnectedSlot {
                    block: slot.owner,
                    slot: id,
                    name: slot.name.clone(),
                });
            }
            if for_execution && slot.is_external() && slot.is_connected() {
                issues.push(ConsistencyIssue::ConnectedExternalSlot {
                    slot: id,
                    name: slot.name.clone(),
                });
            }
        }
        issues
    }

    /// `true` when every required slot is connected and, for the execution form, no
    /// external slot is.
    pub fn check_consistency(&self, for_execution: bool) -> bool {
        self.consistency_issues(for_execution).is_empty()
    }
}

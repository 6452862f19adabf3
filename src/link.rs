use crate::error::GraphError;
use crate::slot::{DataSlot, DataSlotType, SlotDirection, SlotId};

/// Index of a data link inside its [`Workflow`](crate::workflow::Workflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(crate) usize);

/// A directed edge from an output-direction slot to an input-direction slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLink {
    pub uid: String,
    pub source: SlotId,
    pub target: SlotId,
}

impl DataLink {
    /// Returns the endpoint opposite to `known`, or `None` if `known` is not an endpoint.
    pub fn other_endpoint(&self, known: SlotId) -> Option<SlotId> {
        if self.source == known {
            Some(self.target)
        } else if self.target == known {
            Some(self.source)
        } else {
            None
        }
    }

    pub fn connects(&self, a: SlotId, b: SlotId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// `direction(a) != direction(b) && (a.external || b.external || a.type == b.type)`.
pub fn compatible(a: &DataSlot, b: &DataSlot) -> bool {
    a.direction() != b.direction()
        && (a.is_external() || b.is_external() || a.slot_type == b.slot_type)
}

/// The outcome of a successful connection check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectionPlan {
    pub source: SlotId,
    pub target: SlotId,
    /// A type that an untyped external endpoint adopts when the link is created.
    pub adopt_type: Option<(SlotId, DataSlotType)>,
}

/// Validates a connection request without touching either slot.
///
/// `already_linked` reports whether a link between the two slots exists.
pub(crate) fn plan_connection(
    (a_id, a): (SlotId, &DataSlot),
    (b_id, b): (SlotId, &DataSlot),
    already_linked: bool,
) -> Result<ConnectionPlan, GraphError> {
    if a_id == b_id {
        return Err(GraphError::SelfConnection(a.name.clone()));
    }
    if a.direction() == b.direction() {
        return Err(GraphError::IncompatibleDirection {
            first: a.name.clone(),
            second: b.name.clone(),
            direction: a.direction().to_string(),
        });
    }
    if !compatible(a, b) {
        return Err(GraphError::IncompatibleType {
            first: a.name.clone(),
            first_type: a.slot_type.to_string(),
            second: b.name.clone(),
            second_type: b.slot_type.to_string(),
        });
    }
    if already_linked {
        return Err(GraphError::DuplicateConnection {
            first: a.name.clone(),
            second: b.name.clone(),
        });
    }
    for slot in [a, b] {
        if let Some(max) = slot.max_connections() {
            if slot.links.len() >= max {
                return Err(GraphError::CapacityExceeded(slot.name.clone()));
            }
        }
    }

    let (source, target) = match a.direction() {
        SlotDirection::Output => (a_id, b_id),
        SlotDirection::Input => (b_id, a_id),
    };

    let adopt_type = if a.is_external() && a.slot_type == DataSlotType::Unknown {
        Some((a_id, b.slot_type))
    } else if b.is_external() && b.slot_type == DataSlotType::Unknown {
        Some((b_id, a.slot_type))
    } else {
        None
    };

    Ok(ConnectionPlan {
        source,
        target,
        adopt_type,
    })
}

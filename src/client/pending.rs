use crate::client::error::{ClientError, Result};
use crate::protocol::RequestId;
use std::collections::HashMap;
use tracing::debug;

/// A datagram probe waiting for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingProbe {
    pub id: RequestId,
    pub sent_ns: i64,
    pub attempts: u32,
}

/// Table of in-flight datagram probes keyed by request identifier.
///
/// Replies are matched against this table; a reply whose identifier has no
/// entry is stale or unrelated and gets dropped by the caller.
#[derive(Debug)]
pub struct InFlight {
    slots: HashMap<RequestId, PendingProbe>,
    capacity: usize,
}

impl InFlight {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    pub fn insert(&mut self, id: RequestId, sent_ns: i64) -> Result<()> {
        if self.slots.len() >= self.capacity && !self.slots.contains_key(&id) {
            return Err(ClientError::InFlightFull(self.capacity));
        }
        self.slots.insert(
            id,
            PendingProbe {
                id,
                sent_ns,
                attempts: 0,
            },
        );
        Ok(())
    }

    /// Count one more transmission of `id`.
    pub fn mark_sent(&mut self, id: RequestId) -> u32 {
        match self.slots.get_mut(&id) {
            Some(pending) => {
                pending.attempts += 1;
                pending.attempts
            }
            None => 0,
        }
    }

    /// Remove and return the probe matching a reply's identifier.
    pub fn resolve(&mut self, id: RequestId) -> Option<PendingProbe> {
        let resolved = self.slots.remove(&id);
        if resolved.is_none() {
            debug!(request_id = %id, "No in-flight probe for reply");
        }
        resolved
    }

    /// Give up on `id` without a reply.
    pub fn abandon(&mut self, id: RequestId) -> Option<PendingProbe> {
        self.slots.remove(&id)
    }
}

#[cfg(test)]
impl InFlight {
    fn contains(&self, id: RequestId) -> bool {
        self.slots.contains_key(&id)
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

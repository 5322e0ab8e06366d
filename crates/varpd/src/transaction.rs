//! Outstanding SVP transactions.
//!
//! Every outbound request is paired with its eventual acknowledgement
//! through a non-zero 32-bit id. The registry keeps the request context
//! alive until the ack arrives, keyed by id for O(1) matching.

use crate::error::{Result, VarpdError};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use svp_proto::{SvpOp, Vl2Req, Vl3Req};

/// The original request an acknowledgement is interpreted against:
/// which MAC was asked about, whether the L3 lookup was v4 or v6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Vl2(Vl2Req),
    Vl3(Vl3Req),
}

impl PendingRequest {
    /// The op code the request went out under.
    pub fn op(&self) -> SvpOp {
        match self {
            PendingRequest::Vl2(_) => SvpOp::Vl2Req,
            PendingRequest::Vl3(_) => SvpOp::Vl3Req,
        }
    }
}

/// One outbound request awaiting its acknowledgement.
#[derive(Debug, Clone, Copy)]
pub struct Transaction {
    pub id: u32,
    /// The link the triggering neighbor event came in on.
    pub ifindex: i32,
    pub request: PendingRequest,
}

/// Live transactions keyed by id.
#[derive(Debug, Default)]
pub struct TransactionRegistry {
    live: HashMap<u32, Transaction>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly sent request. The id generator guarantees
    /// uniqueness among live transactions, so a collision is fatal.
    pub fn insert(&mut self, txn: Transaction) -> Result<()> {
        match self.live.entry(txn.id) {
            Entry::Occupied(_) => Err(VarpdError::DuplicateTransaction(txn.id)),
            Entry::Vacant(slot) => {
                slot.insert(txn);
                Ok(())
            }
        }
    }

    /// Consumes the transaction matching `id`, if any.
    pub fn remove(&mut self, id: u32) -> Option<Transaction> {
        self.live.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// The transaction id counter: starts at 1, wraps past zero by
/// skipping it. The all-ones handshake sentinel is not special-cased;
/// ordinary traffic takes billions of requests to reach it.
#[derive(Debug)]
pub struct IdGenerator {
    next: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        if self.next == 0 {
            self.next = 1;
        }
        id
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use svp_proto::MacAddress;

    fn txn(id: u32) -> Transaction {
        Transaction {
            id,
            ifindex: 4,
            request: PendingRequest::Vl2(Vl2Req {
                mac: MacAddress::ZERO,
                vnetid: 1,
            }),
        }
    }

    #[test]
    fn test_id_sequence_starts_at_one() {
        let mut ids = IdGenerator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.next_id(), 3);
    }

    #[test]
    fn test_id_wrap_skips_zero() {
        let mut ids = IdGenerator { next: u32::MAX };
        assert_eq!(ids.next_id(), u32::MAX);
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn test_insert_remove() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(1)).unwrap();
        registry.insert(txn(2)).unwrap();
        assert_eq!(registry.len(), 2);

        let got = registry.remove(1).unwrap();
        assert_eq!(got.id, 1);
        assert_eq!(got.ifindex, 4);
        assert!(registry.remove(1).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let mut registry = TransactionRegistry::new();
        registry.insert(txn(7)).unwrap();
        assert!(matches!(
            registry.insert(txn(7)),
            Err(VarpdError::DuplicateTransaction(7))
        ));
    }

    #[test]
    fn test_unknown_id_is_none() {
        let mut registry = TransactionRegistry::new();
        assert!(registry.remove(42).is_none());
    }
}

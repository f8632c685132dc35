//! RPC correlation ledger.
//!
//! One record per request id, holding the request, the topic it travelled
//! on and, once known, the response. The request part is write-once and the
//! response is attached at most once. Records are never removed, so a
//! redelivered request (the relay is at-least-once) is recognised as a
//! replay instead of being processed twice.
//!
//! # Thread Safety
//!
//! Check-then-write sequences run under an internal mutex. The ledger is
//! owned by the main process only.

use std::sync::{Arc, Mutex};

use pushkit_lib::storage::SharedStore;
use pushkit_lib::{RpcId, RpcRequest, RpcResponse, Topic};
use serde::{Deserialize, Serialize};

use crate::store::CodableStore;
use crate::{Result, SubscriptionError};

/// Key prefix of ledger records.
pub const RPC_RECORD_PREFIX: &str = "rpc.record.";

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRecord {
    pub id: RpcId,
    pub topic: Topic,
    pub request: RpcRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<RpcResponse>,
}

/// Durable request/response ledger.
pub struct RpcHistory {
    records: CodableStore<RpcRecord>,
    write_lock: Mutex<()>,
}

fn lock_error() -> SubscriptionError {
    SubscriptionError::Storage("RpcHistory: lock poisoned".to_string())
}

impl RpcHistory {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self {
            records: CodableStore::new(store, RPC_RECORD_PREFIX),
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self, id: RpcId) -> Result<Option<RpcRecord>> {
        self.records.get(&id.to_string())
    }

    /// Record a request seen on `topic`.
    ///
    /// Returns [`SubscriptionError::DuplicateRequest`] when the same request
    /// is already recorded and [`SubscriptionError::RequestIdConflict`] when
    /// the id is bound to a different one.
    pub fn set(&self, topic: Topic, request: RpcRequest) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| lock_error())?;
        let id = request.id;

        if let Some(existing) = self.get(id)? {
            return Err(if existing.request == request {
                SubscriptionError::DuplicateRequest(id)
            } else {
                SubscriptionError::RequestIdConflict(id)
            });
        }

        let record = RpcRecord {
            id,
            topic,
            request,
            response: None,
        };
        self.records.set(&record, &id.to_string())
    }

    /// Attach a response to its request record.
    ///
    /// Attaching the identical response again is a no-op; a different one is
    /// [`SubscriptionError::AlreadyResponded`].
    pub fn resolve(&self, response: RpcResponse) -> Result<RpcRecord> {
        let _guard = self.write_lock.lock().map_err(|_| lock_error())?;
        let id = response.id;

        let mut record = self
            .get(id)?
            .ok_or(SubscriptionError::RecordNotFound(id))?;
        match &record.response {
            Some(existing) if *existing == response => return Ok(record),
            Some(_) => return Err(SubscriptionError::AlreadyResponded(id)),
            None => {}
        }

        record.response = Some(response);
        self.records.set(&record, &id.to_string())?;
        Ok(record)
    }

    /// All records that travelled on `topic`, oldest id first.
    pub fn get_all(&self, topic: &Topic) -> Result<Vec<RpcRecord>> {
        let mut records: Vec<RpcRecord> = self
            .records
            .get_all()?
            .into_iter()
            .filter(|r| &r.topic == topic)
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    /// Records whose request has no response yet.
    pub fn get_pending(&self) -> Result<Vec<RpcRecord>> {
        let mut records: Vec<RpcRecord> = self
            .records
            .get_all()?
            .into_iter()
            .filter(|r| r.response.is_none())
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushkit_lib::rpc::RpcError;
    use pushkit_lib::storage::InMemoryStore;
    use serde_json::json;

    fn history() -> RpcHistory {
        RpcHistory::new(Arc::new(InMemoryStore::new("main.test")))
    }

    fn request(id: i64) -> RpcRequest {
        RpcRequest::new("wc_pushRequest", json!({"n": id}))
            .unwrap()
            .with_id(RpcId::from(id))
    }

    #[test]
    fn test_set_and_get() {
        let history = history();
        let topic = Topic::generate();
        history.set(topic.clone(), request(1)).unwrap();

        let record = history.get(RpcId::from(1)).unwrap().unwrap();
        assert_eq!(record.topic, topic);
        assert!(record.response.is_none());
        assert!(history.get(RpcId::from(2)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_and_conflict() {
        let history = history();
        let topic = Topic::generate();
        history.set(topic.clone(), request(1)).unwrap();

        assert!(matches!(
            history.set(topic.clone(), request(1)),
            Err(SubscriptionError::DuplicateRequest(_))
        ));

        let other = RpcRequest::new("wc_pushDelete", json!({}))
            .unwrap()
            .with_id(RpcId::from(1));
        assert!(matches!(
            history.set(topic, other),
            Err(SubscriptionError::RequestIdConflict(_))
        ));
    }

    #[test]
    fn test_resolve_once() {
        let history = history();
        history.set(Topic::generate(), request(5)).unwrap();

        let ok = RpcResponse::result(RpcId::from(5), true).unwrap();
        let record = history.resolve(ok.clone()).unwrap();
        assert_eq!(record.response, Some(ok.clone()));

        // same response again is idempotent
        assert!(history.resolve(ok).is_ok());

        let err = RpcResponse::error(RpcId::from(5), RpcError::new(5000, "User rejected"));
        assert!(matches!(
            history.resolve(err),
            Err(SubscriptionError::AlreadyResponded(_))
        ));
        assert!(matches!(
            history.resolve(RpcResponse::result(RpcId::from(6), true).unwrap()),
            Err(SubscriptionError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_get_all_by_topic() {
        let history = history();
        let a = Topic::generate();
        let b = Topic::generate();
        history.set(a.clone(), request(3)).unwrap();
        history.set(b, request(2)).unwrap();
        history.set(a.clone(), request(1)).unwrap();

        let ids: Vec<i64> = history
            .get_all(&a)
            .unwrap()
            .iter()
            .map(|r| r.id.value())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(history.get_pending().unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_set_records_once() {
        use std::thread;

        let history = Arc::new(history());
        let topic = Topic::generate();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let history = Arc::clone(&history);
                let topic = topic.clone();
                thread::spawn(move || history.set(topic, request(9)).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }
}

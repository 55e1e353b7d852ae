//! In-process RPC dispatch boundary: the request/response shapes and the
//! `Dispatcher` that the access gate and kernel sit behind. The wire
//! protocol itself is out of scope; this is what a transport layer would
//! call. Grounded on the teacher's `Session::dispatcher`/
//! `dispatcher_executor` split (`kv-cli/src/server/session.rs`) —
//! match-on-operation-kind into a kernel call.

use std::sync::Arc;
use std::time::Duration;

use crate::access::Mutation;
use crate::entry::KeyMetric;
use crate::error::Error;
use crate::events::Filter;
use crate::kernel::ops::{
    ClearOptions, InspectOptions, InspectResult, ListKeysOptions, LockOptions, RevisionResult,
    SetOptions, SetOutcome, ValueResult,
};
use crate::kernel::Kernel;
use crate::metrics::Stats;

/// Unary operations, mirroring the RPC surface in the external
/// interfaces section one-for-one.
pub enum Request {
    Set { key: String, value: Vec<u8>, opts: SetOptions },
    Get { key: String },
    Inspect { key: String, opts: InspectOptions },
    Delete { key: String },
    Exists { key: String },
    Pop { key: String },
    Clear { opts: ClearOptions },
    ListKeys { opts: ListKeysOptions },
    Stats,
    ClearHistory { key: String },
    Lock { key: String, duration: Duration, opts: LockOptions },
    Unlock { key: String },
    GetRevision { key: String, version: u64 },
    Register,
    SetReadOnly { enable: bool },
    GetKeyMetric { key: String },
}

pub enum Response {
    Set(SetOutcome),
    Get(ValueResult),
    Inspect(InspectResult),
    Deleted(bool),
    Exists(bool),
    Pop(ValueResult),
    Cleared(u64),
    Keys(Vec<String>),
    Stats(Stats),
    Ack,
    Revision(RevisionResult),
    KeyMetric(Option<KeyMetric>),
}

/// Administrative surface: not subject to the access gate's read-only
/// enforcement, but still requires a privileged client for `Prune`.
pub enum AdminRequest {
    Shutdown,
    Prune { prune_to: u64, ignore_keys: Vec<String> },
}

/// Sits in front of the kernel: resolves the caller's identity, applies
/// the access gate's authorization, then dispatches into the kernel.
pub struct Dispatcher {
    kernel: Arc<Kernel>,
}

impl Dispatcher {
    pub fn new(kernel: Arc<Kernel>) -> Self {
        Dispatcher { kernel }
    }

    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    pub async fn dispatch(&self, metadata: &[(&str, &str)], request: Request) -> Result<Response, Error> {
        let client_id = self.kernel.access().resolve_client_id(metadata)?;
        self.dispatch_as(&client_id, request).await
    }

    /// Dispatch with an already-resolved client id, used by the embedded
    /// CLI front end which authenticates once per session.
    pub async fn dispatch_as(&self, client_id: &str, request: Request) -> Result<Response, Error> {
        match request {
            Request::Set { key, value, opts } => {
                self.authorize(client_id, Mutation::Ordinary)?;
                self.kernel.set(client_id, &key, value, opts).await.map(Response::Set)
            }
            Request::Get { key } => self.kernel.get(client_id, &key).await.map(Response::Get),
            Request::Inspect { key, opts } => {
                self.kernel.inspect(client_id, &key, opts).await.map(Response::Inspect)
            }
            Request::Delete { key } => {
                self.authorize(client_id, Mutation::Ordinary)?;
                self.kernel.delete(client_id, &key).await.map(Response::Deleted)
            }
            Request::Exists { key } => Ok(Response::Exists(self.kernel.exists(&key).await)),
            Request::Pop { key } => {
                self.authorize(client_id, Mutation::Ordinary)?;
                self.kernel.pop(client_id, &key).await.map(Response::Pop)
            }
            Request::Clear { opts } => {
                let mutation = if opts.force { Mutation::ForceClear } else { Mutation::Ordinary };
                self.authorize(client_id, mutation)?;
                self.kernel.clear(client_id, opts).await.map(Response::Cleared)
            }
            Request::ListKeys { opts } => self.kernel.list_keys(opts).map(Response::Keys),
            Request::Stats => Ok(Response::Stats(self.kernel.stats())),
            Request::ClearHistory { key } => {
                self.authorize(client_id, Mutation::Ordinary)?;
                self.kernel.clear_history(&key).map(|_| Response::Ack)
            }
            Request::Lock { key, duration, opts } => {
                self.authorize(client_id, Mutation::Ordinary)?;
                self.kernel.lock(client_id, &key, duration, opts).await.map(|_| Response::Ack)
            }
            Request::Unlock { key } => {
                self.authorize(client_id, Mutation::Ordinary)?;
                self.kernel.unlock(client_id, &key).await.map(|_| Response::Ack)
            }
            Request::GetRevision { key, version } => {
                self.kernel.get_revision(&key, version).await.map(Response::Revision)
            }
            Request::Register => {
                self.kernel.register(client_id);
                Ok(Response::Ack)
            }
            Request::SetReadOnly { enable } => {
                self.authorize(client_id, Mutation::SetReadOnly)?;
                self.kernel.set_readonly(client_id, enable).map(|_| Response::Ack)
            }
            Request::GetKeyMetric { key } => {
                Ok(Response::KeyMetric(self.kernel.get_key_metric_op(&key)))
            }
        }
    }

    pub fn watch(&self, filter: Filter) -> crate::events::Subscription {
        self.kernel.subscribe(filter)
    }

    /// The narrower value-bearing channel: delivers events for a single
    /// key with the value snapshot captured under the entry mutex at
    /// publish time.
    pub fn watch_key_value(&self, key: String) -> crate::events::Subscription {
        let mut filter = Filter::default();
        filter.keys.insert(key);
        filter.with_values = true;
        self.kernel.subscribe(filter)
    }

    pub async fn admin(&self, client_id: &str, request: AdminRequest) -> Result<(), Error> {
        if !self.kernel.config().is_privileged(client_id) {
            return Err(Error::PermissionDenied(
                "administrative operations require a privileged client".to_string(),
            ));
        }
        match request {
            AdminRequest::Shutdown => Ok(()),
            AdminRequest::Prune { prune_to, ignore_keys: _ } => {
                self.kernel.prune_to(prune_to, false).await;
                Ok(())
            }
        }
    }

    fn authorize(&self, client_id: &str, mutation: Mutation) -> Result<(), Error> {
        self.kernel.access().authorize_mutation(self.kernel.config(), client_id, mutation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;

    #[tokio::test]
    async fn dispatch_set_then_get() {
        let dispatcher = Dispatcher::new(Arc::new(Kernel::new(Configuration::default())));
        let meta = [("client_id", "c1")];
        dispatcher
            .dispatch(&meta, Request::Set { key: "foo".into(), value: b"bar".to_vec(), opts: SetOptions::default() })
            .await
            .unwrap();
        let resp = dispatcher.dispatch(&meta, Request::Get { key: "foo".into() }).await.unwrap();
        match resp {
            Response::Get(v) => assert_eq!(v.value, b"bar"),
            _ => panic!("unexpected response"),
        }
    }

    #[tokio::test]
    async fn readonly_rejects_non_privileged_set() {
        let mut cfg = Configuration::default();
        cfg.readonly = Some(true);
        let dispatcher = Dispatcher::new(Arc::new(Kernel::new(cfg)));
        let meta = [("client_id", "c1")];
        let result = dispatcher
            .dispatch(&meta, Request::Set { key: "foo".into(), value: b"bar".to_vec(), opts: SetOptions::default() })
            .await;
        assert!(matches!(result, Err(Error::ReadOnly)));
    }
}

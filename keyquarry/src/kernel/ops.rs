//! Request/result shapes shared between the kernel's methods and the
//! `rpc` dispatch boundary, kept in their own module so `kernel/mod.rs`
//! reads as pure state-machine logic.

use std::time::{Duration, SystemTime};

use serde_derive::{Deserialize, Serialize};

use crate::entry::{KeyMetric, LockRecord};

#[derive(Clone, Debug, Default)]
pub struct SetOptions {
    pub content_type: Option<String>,
    pub lock_duration: Option<Duration>,
    pub lifespan: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOutcome {
    pub success: bool,
    pub is_new: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueResult {
    pub value: Vec<u8>,
    pub content_type: String,
    pub version: u64,
    pub hash: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionResult {
    pub value: Vec<u8>,
    pub content_type: String,
    pub timestamp: SystemTime,
}

#[derive(Clone, Debug, Default)]
pub struct InspectOptions {
    pub include_value: bool,
    pub include_metrics: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InspectResult {
    pub key: String,
    pub content_type: String,
    pub version: u64,
    pub hash: u64,
    pub created_at: SystemTime,
    pub updated_at: Option<SystemTime>,
    pub lifespan: Option<Duration>,
    pub lifespan_set_at: Option<SystemTime>,
    pub lock: Option<LockRecord>,
    pub history_len: usize,
    pub value: Option<Vec<u8>>,
    pub metric: Option<KeyMetric>,
}

#[derive(Clone, Debug, Default)]
pub struct ClearOptions {
    pub force: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ListKeysOptions {
    pub pattern: Option<String>,
    pub limit: Option<usize>,
    pub include_reserved: bool,
}

#[derive(Clone, Debug, Default)]
pub struct LockOptions {
    pub create_if_missing: bool,
}

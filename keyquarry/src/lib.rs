//! `keyquarry` is an in-memory, single-node key/value store kernel: a
//! concurrent key-lifecycle state machine with per-key exclusive
//! locking, bounded revision history, TTL-based expiry, capacity-bounded
//! pruning, a streaming event bus, and periodic encrypted snapshots.
//!
//! The kernel is a plain owned object — construct one per test or per
//! server process, there is no process-wide singleton.
//!
//! ## Getting started
//!
//! ```no_run
//! use keyquarry::config::Configuration;
//! use keyquarry::kernel::Kernel;
//! use keyquarry::kernel::ops::SetOptions;
//!
//! # async fn run() -> Result<(), keyquarry::error::Error> {
//! let kernel = Kernel::new(Configuration::default());
//! kernel.set("client-1", "greeting", b"hello".to_vec(), SetOptions::default()).await?;
//! let value = kernel.get("client-1", "greeting").await?;
//! assert_eq!(value.value, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod access;
pub mod config;
pub mod content_type;
pub mod entry;
pub mod error;
pub mod events;
pub mod hash;
pub mod kernel;
pub mod metrics;
pub mod pattern;
pub mod pruner;
pub mod rpc;
pub mod server;
pub mod snapshot;

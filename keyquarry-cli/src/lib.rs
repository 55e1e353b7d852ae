//! Admin REPL and daemon launcher for KeyQuarry: a rustyline front end
//! that tokenizes commands and dispatches them through the kernel's
//! `rpc::Dispatcher`, plus a binary that wires the same kernel into a
//! long-running `keyquarry::server::Server`.
//!
//! ## Getting started
//!
//! ```doc
//! ❯ ./keyquarryd
//!
//! Welcome to keyquarry.
//!
//! keyquarry > SET order_key xxx
//! OK ~
//!
//! keyquarry > KEYS
//! order_key
//!
//! keyquarry > KSIZE
//! 1
//!
//! keyquarry > GET order_key
//! xxx
//!
//! keyquarry > DEL order_key
//! OK ~
//!
//! keyquarry > GET order_key
//! N/A ~
//! ```

pub mod ast;
pub mod rusty;
pub mod server;
pub mod show;
pub mod trace;

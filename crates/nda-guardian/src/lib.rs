//! `nda-guardian` - Privacy-first NDA analysis with hybrid on-device/cloud routing
//!
//! This library segments an NDA into clauses, answers questions about it with
//! a small on-device function-calling model, and escalates to a cloud model
//! only when a question needs legal or market knowledge. Anything sent to the
//! cloud is an anonymized clause summary; the agreement itself never leaves
//! the device.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod clause;
pub mod cli;
pub mod config;
pub mod demo;
pub mod document;
pub mod error;
pub mod logging;
pub mod privacy;
pub mod routing;
pub mod server;
pub mod service;
pub mod session;
pub mod storage;
pub mod tools;

pub use clause::ClauseKey;
pub use config::Config;
pub use document::Document;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use routing::{HybridRouter, RouteSource, RoutingResult};
pub use service::{LoadResponse, QueryResponse, QueryService};
pub use session::{Session, SessionStats};
pub use storage::{QueryRecord, Storage, StorageStats};
pub use tools::Tool;

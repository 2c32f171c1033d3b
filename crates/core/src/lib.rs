//! Pure drill and objective-evaluation logic.
//!
//! Nothing in this crate touches the network, the filesystem, or child
//! processes. The harness crate fetches snapshots and probe responses and
//! passes them in.

pub mod error;
pub mod evaluation;
pub mod evidence;
pub mod markdown;
pub mod metric_names;
pub mod metrics;
pub mod objectives;
pub mod profile;
pub mod report;

//! ocs-harness library
//!
//! Building blocks for end-to-end tests of GlusterFS-backed dynamic
//! provisioning on OpenShift: a bounded polling primitive ([`waiter`]),
//! SSH command execution ([`remote`]), `oc` wrappers ([`openshift`]), the
//! heketi REST service ([`heketi`]), VM power control ([`cloud`]), and
//! node lifecycle helpers ([`node`]).

pub mod cloud;
pub mod config;
pub mod error;
pub mod heketi;
pub mod node;
pub mod openshift;
pub mod remote;
pub mod utils;
pub mod waiter;

// Re-export commonly used types
pub use config::HarnessConfig;
pub use error::{HarnessError, Result};
pub use openshift::Cluster;
pub use remote::Executor;
pub use waiter::Waiter;

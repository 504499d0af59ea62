//! Connection layer for the external job manager
//!
//! Owns the two messaging channels the coordination engine drives:
//! - a request/reply channel for job submission (strict one request at a time)
//! - a subscribe channel carrying completion broadcasts
//!
//! [`ManagerTransport`] is the seam between the engine and the wire; the TCP
//! implementation lives in [`ManagerClient`], and tests substitute scripted
//! transports.

mod client;
mod protocol;
mod transport;

pub use client::ManagerClient;
#[allow(unused_imports)]
pub use protocol::{JobReply, JobRequest, completion_topic, parse_completion};
pub use transport::{ManagerTransport, TransportError};

//! Strongly typed clients for the local RPC service interfaces the driver
//! speaks.
//!
//! Each client owns a bound [`RpcClientPort`](crate::rpc::RpcClientPort)
//! and exposes one method per procedure: inputs are marshalled, one call is
//! made, outputs are unmarshalled. The server's own status word is an
//! ordinary out-value — a successful `Result` only means the transport
//! round-trip and the marshalling worked; the caller inspects the returned
//! status.

pub mod event_log;
pub mod firewall;
pub mod samr;
pub mod svcctl;
pub mod task_scheduler;

pub use event_log::EventLogClient;
pub use firewall::FirewallClient;
pub use samr::SamClient;
pub use svcctl::ServiceControlClient;
pub use task_scheduler::TaskSchedulerClient;

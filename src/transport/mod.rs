// Shared transport primitive used by host subsystems, and the hub that lets
// one batch at a time observe it.

pub mod http_transport;
pub mod hub;
pub mod traits;

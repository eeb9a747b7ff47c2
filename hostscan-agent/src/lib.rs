//! hostscan agent: device identification, reference collectors and the
//! composition root shared by the `hostscan-agent` binary and its tests.

pub mod app;
pub mod discovery;
pub mod metrics;

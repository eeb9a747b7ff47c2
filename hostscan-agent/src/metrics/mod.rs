//! Reference collectors built on `sysinfo`, `if-addrs` and `mac_address`
//!
//! One collector per catalog entry:
//! - CPU: model, cores, frequency, usage, load averages, temperatures
//! - RAM: physical memory and swap, in MB or GB
//! - DISK: mounted filesystems with capacity and free space
//! - OS: operating system, kernel, hostname, uptime
//! - NETWORK: interfaces with IP and MAC addresses
//!
//! Every collector reports for the current machine only:
//! `{<device id>: {...}}`.

mod cpu;
mod disk;
mod memory;
mod network;
mod os;

pub use cpu::{CpuCollector, CpuInfo};
pub use disk::{DiskCollector, DiskInfo};
pub use memory::{MemoryCollector, MemoryInfo, MemoryUnit};
pub use network::NetworkCollector;
pub use os::{OsCollector, OsInfo};

use hostscan_kernel::{Collector, CollectorCatalog, CollectorError, CollectorOutput, DeviceIdentity};
use serde::Serialize;
use std::sync::Arc;

/// Registers the five reference collectors
pub fn register_builtin(catalog: &mut CollectorCatalog, identity: Arc<dyn DeviceIdentity>) {
    let id = identity.clone();
    catalog.register("CPU", move |options| {
        Ok(Box::new(CpuCollector::new(id.current_device_id(), options)) as Box<dyn Collector>)
    });

    let id = identity.clone();
    catalog.register("RAM", move |options| {
        Ok(Box::new(MemoryCollector::new(id.current_device_id(), options)?) as Box<dyn Collector>)
    });

    let id = identity.clone();
    catalog.register("DISK", move |options| {
        Ok(Box::new(DiskCollector::new(id.current_device_id(), options)) as Box<dyn Collector>)
    });

    let id = identity.clone();
    catalog.register("OS", move |options| {
        Ok(Box::new(OsCollector::new(id.current_device_id(), options)) as Box<dyn Collector>)
    });

    let id = identity;
    catalog.register("NETWORK", move |options| {
        Ok(Box::new(NetworkCollector::new(id.current_device_id(), options)) as Box<dyn Collector>)
    });
}

/// Wraps one machine's payload under its device id
fn single_device<T: Serialize>(device_id: &str, payload: &T) -> Result<CollectorOutput, CollectorError> {
    let mut output = CollectorOutput::new();
    output.insert(device_id.to_string(), serde_json::to_value(payload)?);
    Ok(output)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
fn payload(output: &CollectorOutput, device_id: &str) -> serde_json::Value {
    output.get(device_id).cloned().unwrap_or_default()
}

use super::single_device;
use crate::discovery::{enumerate_interfaces, select_primary_mac, NetworkInterface};
use hostscan_kernel::{Collector, CollectorError, CollectorOptions, CollectorOutput};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct NetworkReport {
    primary_mac: Option<String>,
    interfaces: Vec<NetworkInterface>,
}

pub struct NetworkCollector {
    device_id: String,
    include_loopback: bool,
}

impl NetworkCollector {
    pub fn new(device_id: String, options: &CollectorOptions) -> Self {
        Self {
            device_id,
            include_loopback: options.flag_or("include_loopback", false),
        }
    }
}

impl Collector for NetworkCollector {
    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        let interfaces = enumerate_interfaces(self.include_loopback)
            .map_err(|e| CollectorError::Unavailable(format!("{:#}", e)))?;

        let report = NetworkReport {
            primary_mac: select_primary_mac(&interfaces),
            interfaces,
        };
        single_device(&self.device_id, &report)
    }
}

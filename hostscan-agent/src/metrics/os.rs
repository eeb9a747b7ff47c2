use super::single_device;
use hostscan_kernel::{Collector, CollectorError, CollectorOptions, CollectorOutput};
use serde::Serialize;
use sysinfo::System;

#[derive(Debug, Serialize)]
pub struct OsInfo {
    pub name: String,
    pub version: Option<String>,
    pub long_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    pub hostname: String,
    pub architecture: String,
    pub uptime_seconds: u64,
    pub boot_time: u64,
}

pub struct OsCollector {
    device_id: String,
    include_kernel: bool,
}

impl OsCollector {
    pub fn new(device_id: String, options: &CollectorOptions) -> Self {
        Self {
            device_id,
            include_kernel: options.flag_or("include_kernel", true),
        }
    }
}

impl Collector for OsCollector {
    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        let hostname = System::host_name()
            .unwrap_or_else(|| gethostname::gethostname().to_string_lossy().to_string());

        let info = OsInfo {
            name: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            version: System::os_version(),
            long_version: System::long_os_version(),
            kernel: if self.include_kernel {
                System::kernel_version()
            } else {
                None
            },
            hostname,
            architecture: std::env::consts::ARCH.to_string(),
            uptime_seconds: System::uptime(),
            boot_time: System::boot_time(),
        };
        single_device(&self.device_id, &info)
    }
}

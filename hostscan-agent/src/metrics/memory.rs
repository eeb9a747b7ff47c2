use super::{round2, single_device};
use hostscan_kernel::{Collector, CollectorError, CollectorOptions, CollectorOutput};
use serde::Serialize;
use sysinfo::System;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryUnit {
    MB,
    GB,
}

impl MemoryUnit {
    fn divisor(&self) -> f64 {
        match self {
            MemoryUnit::MB => 1024.0 * 1024.0,
            MemoryUnit::GB => 1024.0 * 1024.0 * 1024.0,
        }
    }

    fn convert(&self, bytes: u64) -> f64 {
        round2(bytes as f64 / self.divisor())
    }
}

#[derive(Debug, Serialize)]
pub struct MemoryInfo {
    pub unit: MemoryUnit,
    pub total: f64,
    pub used: f64,
    pub available: f64,
    pub percent_used: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<SwapInfo>,
}

#[derive(Debug, Serialize)]
pub struct SwapInfo {
    pub total: f64,
    pub used: f64,
    pub free: f64,
}

pub struct MemoryCollector {
    device_id: String,
    unit: MemoryUnit,
    show_swap: bool,
}

impl MemoryCollector {
    /// Fails on a unit other than MB or GB
    pub fn new(device_id: String, options: &CollectorOptions) -> Result<Self, CollectorError> {
        let unit = match options.text("unit").unwrap_or("MB") {
            "MB" => MemoryUnit::MB,
            "GB" => MemoryUnit::GB,
            other => {
                return Err(CollectorError::InvalidOption {
                    option: "unit".to_string(),
                    reason: format!("unsupported unit '{}'", other),
                })
            }
        };

        Ok(Self {
            device_id,
            unit,
            show_swap: options.flag_or("show_swap", false),
        })
    }
}

impl Collector for MemoryCollector {
    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        let mut sys = System::new();
        sys.refresh_memory();

        let total = sys.total_memory();
        if total == 0 {
            return Err(CollectorError::Unavailable("total memory reported as 0".to_string()));
        }
        let available = sys.available_memory();
        let used = total.saturating_sub(available);

        let swap = self.show_swap.then(|| SwapInfo {
            total: self.unit.convert(sys.total_swap()),
            used: self.unit.convert(sys.used_swap()),
            free: self.unit.convert(sys.free_swap()),
        });

        let info = MemoryInfo {
            unit: self.unit,
            total: self.unit.convert(total),
            used: self.unit.convert(used),
            available: self.unit.convert(available),
            percent_used: round2(used as f64 / total as f64 * 100.0),
            swap,
        };
        single_device(&self.device_id, &info)
    }
}

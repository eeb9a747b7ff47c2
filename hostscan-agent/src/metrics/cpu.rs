use super::single_device;
use hostscan_kernel::{Collector, CollectorError, CollectorOptions, CollectorOutput};
use serde::Serialize;
use sysinfo::{Components, System};
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct CpuInfo {
    pub brand: String,
    pub vendor: String,
    pub logical_cores: usize,
    pub physical_cores: Option<usize>,
    pub frequency_mhz: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_avg: Option<[f64; 3]>, // [1min, 5min, 15min]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperatures: Option<Vec<TemperatureSensor>>,
}

#[derive(Debug, Serialize)]
pub struct TemperatureSensor {
    pub label: String,
    pub celsius: f32,
    pub critical: Option<f32>,
}

pub struct CpuCollector {
    device_id: String,
    show_usage: bool,
    show_load: bool,
    show_temperature: bool,
}

impl CpuCollector {
    pub fn new(device_id: String, options: &CollectorOptions) -> Self {
        Self {
            device_id,
            show_usage: options.flag_or("show_usage", true),
            show_load: options.flag_or("show_load", true),
            show_temperature: options.flag_or("show_temperature", false),
        }
    }

    fn read(&self) -> Result<CpuInfo, CollectorError> {
        let mut sys = System::new();
        sys.refresh_cpu();

        if self.show_usage {
            // usage is a delta between two refreshes
            std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
            sys.refresh_cpu_usage();
        }

        let cpus = sys.cpus();
        let first = cpus
            .first()
            .ok_or_else(|| CollectorError::Unavailable("no CPU reported".to_string()))?;

        let load_avg = (self.show_load && cfg!(unix)).then(|| {
            let load = System::load_average();
            [load.one, load.five, load.fifteen]
        });

        let temperatures = self.show_temperature.then(|| {
            Components::new_with_refreshed_list()
                .iter()
                .map(|c| TemperatureSensor {
                    label: c.label().to_string(),
                    celsius: c.temperature(),
                    critical: c.critical(),
                })
                .collect::<Vec<_>>()
        });

        debug!("CPU: {} logical cores", cpus.len());
        Ok(CpuInfo {
            brand: first.brand().trim().to_string(),
            vendor: first.vendor_id().to_string(),
            logical_cores: cpus.len(),
            physical_cores: sys.physical_core_count(),
            frequency_mhz: first.frequency(),
            usage_percent: self.show_usage.then(|| sys.global_cpu_info().cpu_usage()),
            load_avg,
            temperatures,
        })
    }
}

impl Collector for CpuCollector {
    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        let info = self.read()?;
        single_device(&self.device_id, &info)
    }
}

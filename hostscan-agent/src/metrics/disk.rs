use super::{round2, single_device};
use hostscan_kernel::{Collector, CollectorError, CollectorOptions, CollectorOutput};
use serde::Serialize;
use sysinfo::Disks;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Serialize)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: String,
    pub file_system: String,
    pub kind: String,
    pub removable: bool,
    pub total_gb: f64,
    pub free_gb: f64,
    pub used_gb: f64,
    pub percent_used: f64,
}

#[derive(Debug, Serialize)]
struct DiskReport {
    count: usize,
    disks: Vec<DiskInfo>,
}

pub struct DiskCollector {
    device_id: String,
    include_removable: bool,
}

impl DiskCollector {
    pub fn new(device_id: String, options: &CollectorOptions) -> Self {
        Self {
            device_id,
            include_removable: options.flag_or("include_removable", false),
        }
    }
}

impl Collector for DiskCollector {
    fn collect(&mut self) -> Result<CollectorOutput, CollectorError> {
        let disks = Disks::new_with_refreshed_list();

        let disks: Vec<DiskInfo> = disks
            .iter()
            .filter(|d| self.include_removable || !d.is_removable())
            .map(|d| {
                let total = d.total_space();
                let free = d.available_space();
                let used = total.saturating_sub(free);
                DiskInfo {
                    name: d.name().to_string_lossy().to_string(),
                    mount_point: d.mount_point().display().to_string(),
                    file_system: d.file_system().to_string_lossy().to_string(),
                    kind: format!("{:?}", d.kind()),
                    removable: d.is_removable(),
                    total_gb: round2(total as f64 / GIB),
                    free_gb: round2(free as f64 / GIB),
                    used_gb: round2(used as f64 / GIB),
                    percent_used: if total > 0 {
                        round2(used as f64 / total as f64 * 100.0)
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        let report = DiskReport {
            count: disks.len(),
            disks,
        };
        single_device(&self.device_id, &report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::payload;

    #[test]
    fn test_disk_report_shape() {
        let mut collector = DiskCollector::new("dev".into(), &CollectorOptions::new());
        let report = payload(&collector.collect().unwrap(), "dev");

        let disks = report["disks"].as_array().unwrap();
        assert_eq!(report["count"].as_u64().unwrap() as usize, disks.len());
        assert!(disks.iter().all(|d| d["removable"] == false));
    }
}

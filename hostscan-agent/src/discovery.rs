//! Network discovery and device identification for hostscan
//!
//! This module handles:
//! - Network interface enumeration with IP and MAC addresses
//! - Primary MAC address selection with priority (Ethernet > WiFi > Other)
//! - The stable device identifier used as the key of the device store

use anyhow::{Context, Result};
use hostscan_kernel::DeviceIdentity;
use if_addrs::{get_if_addrs, IfAddr};
use mac_address::MacAddress;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Network interface information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub name: String,
    pub mac: Option<String>,
    pub ip: String,
    #[serde(rename = "type")]
    pub interface_type: InterfaceType,
}

/// Interface type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Ethernet,
    Wireless,
    Loopback,
    Other,
}

/// Enumerate interface addresses; one entry per (interface, address) pair
pub fn enumerate_interfaces(include_loopback: bool) -> Result<Vec<NetworkInterface>> {
    debug!("Enumerating network interfaces...");

    let if_addrs = get_if_addrs().context("Failed to enumerate network interfaces")?;
    let mut interfaces = Vec::new();

    for if_addr in if_addrs {
        let interface_type = if if_addr.is_loopback() {
            InterfaceType::Loopback
        } else {
            classify_interface(&if_addr.name)
        };
        if interface_type == InterfaceType::Loopback && !include_loopback {
            continue;
        }

        let ip = match if_addr.addr {
            IfAddr::V4(v4) => v4.ip.to_string(),
            IfAddr::V6(v6) => v6.ip.to_string(),
        };
        let mac = interface_mac(&if_addr.name).map(format_mac);

        debug!("Found interface: {} ({:?})", if_addr.name, mac);
        interfaces.push(NetworkInterface {
            name: if_addr.name,
            mac,
            ip,
            interface_type,
        });
    }

    Ok(interfaces)
}

/// Get MAC address for a specific interface name
fn interface_mac(interface_name: &str) -> Option<MacAddress> {
    match mac_address::mac_address_by_name(interface_name) {
        Ok(Some(mac)) if mac.bytes() != [0; 6] => Some(mac),
        Ok(_) => {
            debug!("No MAC found for interface: {}", interface_name);
            None
        }
        Err(e) => {
            debug!("Error getting MAC for {}: {}", interface_name, e);
            None
        }
    }
}

/// Lowercase, colon separated (a1:b2:c3:d4:e5:f6)
pub fn format_mac(mac: MacAddress) -> String {
    let b = mac.bytes();
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        b[0], b[1], b[2], b[3], b[4], b[5]
    )
}

/// Classify interface type based on name patterns
pub fn classify_interface(name: &str) -> InterfaceType {
    let name_lower = name.to_lowercase();

    if name_lower == "lo" || name_lower.starts_with("lo0") || name_lower.starts_with("loopback") {
        return InterfaceType::Loopback;
    }

    if name_lower.starts_with("wlan")
        || name_lower.starts_with("wlp")
        || name_lower.starts_with("wlo")
        || name_lower.contains("wifi")
        || name_lower.contains("wi-fi")
    {
        return InterfaceType::Wireless;
    }

    if name_lower.starts_with("eth") || name_lower.starts_with("en") {
        return InterfaceType::Ethernet;
    }

    InterfaceType::Other
}

/// Select primary MAC address based on interface priority
pub fn select_primary_mac(interfaces: &[NetworkInterface]) -> Option<String> {
    let with_mac = |kind: InterfaceType| {
        interfaces
            .iter()
            .filter(move |i| i.interface_type == kind)
            .find_map(|i| i.mac.clone().map(|mac| (i.name.as_str(), mac)))
    };

    for kind in [InterfaceType::Ethernet, InterfaceType::Wireless, InterfaceType::Other] {
        if let Some((name, mac)) = with_mac(kind) {
            info!("Selected {:?} interface as primary: {}", kind, name);
            return Some(mac);
        }
    }
    None
}

/// Device identifier derived from the primary network hardware address.
///
/// Resolved once at construction; falls back to the system default MAC,
/// then to the hostname when no hardware address is readable.
pub struct MacDeviceIdentity {
    device_id: String,
}

impl MacDeviceIdentity {
    pub fn discover() -> Self {
        let device_id = Self::primary_mac().unwrap_or_else(|| {
            let hostname = gethostname::gethostname().to_string_lossy().to_string();
            warn!("No hardware address found, using hostname {} as device id", hostname);
            hostname
        });
        info!("Device id: {}", device_id);
        Self { device_id }
    }

    pub fn from_id(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
        }
    }

    fn primary_mac() -> Option<String> {
        let from_interfaces = match enumerate_interfaces(false) {
            Ok(interfaces) => select_primary_mac(&interfaces),
            Err(e) => {
                warn!("{:#}", e);
                None
            }
        };

        from_interfaces.or_else(|| match mac_address::get_mac_address() {
            Ok(Some(mac)) => Some(format_mac(mac)),
            _ => None,
        })
    }
}

impl DeviceIdentity for MacDeviceIdentity {
    fn current_device_id(&self) -> String {
        self.device_id.clone()
    }
}

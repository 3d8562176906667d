use crate::internal::pci::{ClassCode, PciAddress, PciReader, VendorId};
use std::path::PathBuf;

/// Discovers PCI devices by walking the sysfs tree.
///
/// Keeps only devices whose `vendor` and `class` attributes both match the
/// filter. On platforms without sysfs the reader finds nothing instead of
/// failing.
pub struct SysfsReader {
    sys_root: PathBuf,
    vendor: VendorId,
    class: ClassCode,
}

impl SysfsReader {
    pub fn new(vendor: VendorId, class: ClassCode) -> Self {
        SysfsReader {
            sys_root: PathBuf::from("/sys"),
            vendor,
            class,
        }
    }

    /// Points the reader at an alternative sysfs root.
    pub fn with_sys_root(mut self, sys_root: impl Into<PathBuf>) -> Self {
        self.sys_root = sys_root.into();
        self
    }
}

impl PciReader for SysfsReader {
    #[cfg(target_os = "linux")]
    fn read(&self) -> crate::Result<Vec<PciAddress>> {
        let devices_dir = self.sys_root.join("bus/pci/devices");
        let mut devices = Vec::new();
        for entry in std::fs::read_dir(&devices_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Ok(address) = name.to_string_lossy().parse::<PciAddress>() else {
                log::debug!("Skipping sysfs entry {name:?} that is not a PCI address");
                continue;
            };
            let class = read_sysfs_value(&entry.path().join("class"))?;
            if class != self.class {
                log::trace!("Skipping device {address} with class {class:#08x}");
                continue;
            }
            let vendor = read_sysfs_value(&entry.path().join("vendor"))?;
            if vendor != self.vendor {
                log::trace!("Skipping device {address} from vendor {vendor:#06x}");
                continue;
            }
            devices.push(address);
        }
        Ok(devices)
    }

    #[cfg(not(target_os = "linux"))]
    fn read(&self) -> crate::Result<Vec<PciAddress>> {
        log::debug!("PCI discovery is not supported on this platform");
        Ok(Vec::new())
    }
}

/// Parses a sysfs attribute holding a single hexadecimal value (`0x10de\n`).
#[cfg(target_os = "linux")]
fn read_sysfs_value(path: &std::path::Path) -> crate::Result<u32> {
    let raw = std::fs::read_to_string(path)?;
    let value = raw.trim();
    let value = value.strip_prefix("0x").unwrap_or(value);
    u32::from_str_radix(value, 16).map_err(|_| {
        crate::Error::GenericError(format!("Cannot parse sysfs value {value:?} in {path:?}"))
    })
}

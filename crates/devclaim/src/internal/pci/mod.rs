pub mod sysfs;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// PCI vendor identifier as reported by the device's `vendor` attribute.
pub type VendorId = u32;
/// Full 24-bit PCI class code (base class, subclass and programming interface).
pub type ClassCode = u32;

pub const VENDOR_NVIDIA: VendorId = 0x10de;
pub const CLASS_3D_CONTROLLER: ClassCode = 0x0302_00;

#[derive(Debug, Error)]
pub enum AddressParseError {
    #[error("Invalid PCI address '{0}'")]
    InvalidAddress(String),
}

/// Location of one device on the PCI bus.
///
/// Displays and parses in the canonical sysfs form `dddd:bb:ss.f`
/// (lower-case hex), e.g. `0000:17:00.0`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PciAddress {
    pub domain: u16,
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
}

impl PciAddress {
    pub fn new(domain: u16, bus: u8, slot: u8, function: u8) -> Self {
        PciAddress {
            domain,
            bus,
            slot,
            function,
        }
    }
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.domain, self.bus, self.slot, self.function
        )
    }
}

impl FromStr for PciAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressParseError::InvalidAddress(s.to_string());
        let (domain, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (bus, rest) = rest.split_once(':').ok_or_else(invalid)?;
        let (slot, function) = rest.split_once('.').ok_or_else(invalid)?;
        Ok(PciAddress {
            domain: u16::from_str_radix(domain, 16).map_err(|_| invalid())?,
            bus: u8::from_str_radix(bus, 16).map_err(|_| invalid())?,
            slot: u8::from_str_radix(slot, 16).map_err(|_| invalid())?,
            function: u8::from_str_radix(function, 16).map_err(|_| invalid())?,
        })
    }
}

/// Discovers the devices present on the host that match a vendor/class
/// filter. Pure discovery, never touches claim state.
pub trait PciReader: Send {
    fn read(&self) -> crate::Result<Vec<PciAddress>>;
}

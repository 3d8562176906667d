use crate::internal::claim::plugin::{ClaimPlugin, DeviceClaim, ResourceClaim};
use crate::internal::common::Map;
use crate::internal::common::error::ClaimError;
use crate::internal::common::resources::ResourceAmount;
use crate::internal::pci::{PciAddress, PciReader};
use smallvec::SmallVec;

/// Claim state of a single device.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ClaimStatus {
    Free,
    Claimed,
}

/// Claim plugin backed by a pool of individually addressed devices.
///
/// The pool is discovered once at init, the reader is consumed by it;
/// afterwards only per-device claim statuses change. Devices listed as
/// pre-claimed start out claimed and are never handed to a caller until
/// explicitly released.
pub struct DeviceClaimPlugin {
    name: String,
    devices: Map<PciAddress, ClaimStatus>,
    reader: Option<Box<dyn PciReader>>,
    pre_claimed: Vec<PciAddress>,
}

impl DeviceClaimPlugin {
    pub fn new(name: &str, reader: Box<dyn PciReader>) -> Self {
        DeviceClaimPlugin {
            name: name.to_string(),
            devices: Map::new(),
            reader: Some(reader),
            pre_claimed: Vec::new(),
        }
    }

    /// Marks the given addresses as already claimed once the pool is
    /// discovered, e.g. devices consumed by infrastructure.
    pub fn with_pre_claimed(mut self, addresses: Vec<PciAddress>) -> Self {
        self.pre_claimed = addresses;
        self
    }

    fn free_device_count(&self) -> u64 {
        self.devices
            .values()
            .filter(|&&status| status == ClaimStatus::Free)
            .count() as u64
    }
}

impl ClaimPlugin for DeviceClaimPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self) -> crate::Result<()> {
        let reader = self
            .reader
            .take()
            .ok_or_else(|| format!("Plugin {} has no device reader", self.name))?;
        for address in reader.read()? {
            log::debug!("Plugin {} discovered device {address}", self.name);
            self.devices.insert(address, ClaimStatus::Free);
        }
        for address in &self.pre_claimed {
            match self.devices.get_mut(address) {
                Some(status) => {
                    log::debug!("Plugin {} marks device {address} as pre-claimed", self.name);
                    *status = ClaimStatus::Claimed;
                }
                None => log::debug!(
                    "Plugin {} ignores pre-claimed device {address} that was not discovered",
                    self.name
                ),
            }
        }
        Ok(())
    }

    fn can_claim(&self, amount: ResourceAmount) -> bool {
        self.free_device_count() >= amount.ceil_units() as u64
    }

    fn claim(&mut self, amount: ResourceAmount) -> crate::Result<ResourceClaim> {
        if !self.can_claim(amount) {
            return Err(ClaimError::InsufficientResources(vec![self.name.clone()]));
        }
        let selected: SmallVec<[PciAddress; 2]> = self
            .devices
            .iter()
            .filter(|(_, status)| **status == ClaimStatus::Free)
            .take(amount.ceil_units() as usize)
            .map(|(address, _)| *address)
            .collect();
        for address in &selected {
            self.devices.insert(*address, ClaimStatus::Claimed);
        }
        let claim = DeviceClaim::new(selected);
        log::debug!("Plugin {} claimed devices [{claim}]", self.name);
        Ok(ResourceClaim::Devices(claim))
    }

    fn release(&mut self, claim: &ResourceClaim) -> crate::Result<()> {
        let ResourceClaim::Devices(claim) = claim else {
            return Err(ClaimError::InvalidResourceClaim);
        };
        for address in claim.devices() {
            match self.devices.get_mut(address) {
                Some(status) => {
                    log::debug!("Plugin {} released device {address}", self.name);
                    *status = ClaimStatus::Free;
                }
                None => log::debug!(
                    "Plugin {} ignores released device {address} that it does not manage",
                    self.name
                ),
            }
        }
        Ok(())
    }
}

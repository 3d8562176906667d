use crate::internal::common::resources::ResourceAmount;
use crate::internal::common::utils::format_comma_delimited;
use crate::internal::pci::PciAddress;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// An allocator owning the claim state of one resource type's device pool.
///
/// A plugin instance belongs to exactly one claimer, which serializes every
/// call onto a single task; implementations therefore need no internal
/// locking. New resource types are added by implementing this trait, the
/// claimer itself stays unchanged.
pub trait ClaimPlugin: Send {
    /// The resource name this plugin serves, used as its registry key.
    /// Stable for the plugin's lifetime.
    fn name(&self) -> &str;

    /// Discovers the device pool. Called exactly once by the owning claimer
    /// before any other method; failures abort the claimer's construction.
    fn init(&mut self) -> crate::Result<()>;

    /// Whether the pool can currently satisfy the given amount. Pure query,
    /// never mutates.
    fn can_claim(&self, amount: ResourceAmount) -> bool;

    /// Reserves devices covering the given amount and returns a handle for
    /// them. Fails without mutation when the pool cannot satisfy the amount.
    fn claim(&mut self, amount: ResourceAmount) -> crate::Result<ResourceClaim>;

    /// Returns the devices of a previously handed out claim to the pool.
    /// Idempotent per device; claims of a foreign variant are rejected.
    fn release(&mut self, claim: &ResourceClaim) -> crate::Result<()>;
}

/// Resources allocated to one request for one resource name.
///
/// Each plugin family hands out (and narrows on release) its own variant;
/// passing a foreign variant back to a plugin fails with
/// `InvalidResourceClaim` instead of panicking.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ResourceClaim {
    /// Individually addressed devices, handed out by device pool plugins.
    Devices(DeviceClaim),
    /// A plain amount without per-device identity.
    Sum(ResourceAmount),
}

/// Addresses of the devices backing one claim.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeviceClaim {
    devices: SmallVec<[PciAddress; 2]>,
}

impl DeviceClaim {
    pub fn new(devices: impl IntoIterator<Item = PciAddress>) -> Self {
        DeviceClaim {
            devices: devices.into_iter().collect(),
        }
    }

    pub fn devices(&self) -> &[PciAddress] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl fmt::Display for DeviceClaim {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format_comma_delimited(&self.devices))
    }
}

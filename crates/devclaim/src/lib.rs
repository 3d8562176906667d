#![deny(clippy::await_holding_lock)]

pub mod internal;

pub use crate::internal::common::utils::format_comma_delimited;
pub use crate::internal::common::{Map, Set};

pub type Error = internal::common::error::ClaimError;
pub type Result<T> = std::result::Result<T, Error>;

pub mod claim {
    pub use crate::internal::claim::claimer::{Claims, ResourceClaimer};
    pub use crate::internal::claim::plugin::{ClaimPlugin, DeviceClaim, ResourceClaim};
    pub use crate::internal::claim::pool::{ClaimStatus, DeviceClaimPlugin};
}

pub mod pci {
    pub use crate::internal::pci::sysfs::SysfsReader;
    pub use crate::internal::pci::{
        AddressParseError, CLASS_3D_CONTROLLER, ClassCode, PciAddress, PciReader, VENDOR_NVIDIA,
        VendorId,
    };
}

pub mod resources {
    pub use crate::internal::common::resources::amount::FRACTIONS_PER_UNIT;
    pub use crate::internal::common::resources::{
        ResourceAmount, ResourceFractions, ResourceList, ResourceName, ResourceUnits,
    };
}

pub mod recorder {
    pub use crate::internal::recorder::{Event, EventKind, EventStore, EventStoreOptions};
}

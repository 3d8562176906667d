pub mod claimer;
pub mod plugin;
pub mod pool;

pub use claimer::{Claims, ResourceClaimer};
pub use plugin::{ClaimPlugin, DeviceClaim, ResourceClaim};
pub use pool::{ClaimStatus, DeviceClaimPlugin};

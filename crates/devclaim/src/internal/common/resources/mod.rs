pub mod amount;

pub use amount::{ResourceAmount, ResourceFractions, ResourceUnits};

use crate::internal::common::Map;

/// Identifies a resource type served by a claim plugin (e.g. a device class).
pub type ResourceName = String;

/// Requested quantity per resource name. Keys are unique, the shape of both
/// claim requests and claim results.
pub type ResourceList = Map<ResourceName, ResourceAmount>;

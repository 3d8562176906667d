pub(crate) mod common;

pub mod claim;
pub mod pci;
pub mod recorder;

#[cfg(test)]
pub mod tests;

use crate::internal::claim::claimer::ResourceClaimer;
use crate::internal::claim::plugin::ClaimPlugin;
use crate::internal::claim::pool::DeviceClaimPlugin;
use crate::internal::common::resources::{ResourceAmount, ResourceList, ResourceUnits};
use crate::internal::pci::{PciAddress, PciReader};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Reader returning a fixed set of addresses.
pub struct StaticReader {
    devices: Vec<PciAddress>,
}

impl StaticReader {
    pub fn new(devices: Vec<PciAddress>) -> Self {
        StaticReader { devices }
    }
}

impl PciReader for StaticReader {
    fn read(&self) -> crate::Result<Vec<PciAddress>> {
        Ok(self.devices.clone())
    }
}

/// Reader failing every read with an IO error.
pub struct FailingReader;

impl PciReader for FailingReader {
    fn read(&self) -> crate::Result<Vec<PciAddress>> {
        Err(std::io::Error::other("device topology unavailable").into())
    }
}

pub fn device(function: u8) -> PciAddress {
    PciAddress::new(0, 0, 0, function)
}

pub fn device_plugin(name: &str, device_count: u8) -> DeviceClaimPlugin {
    let devices = (0..device_count).map(device).collect();
    DeviceClaimPlugin::new(name, Box::new(StaticReader::new(devices)))
}

pub fn res(entries: &[(&str, ResourceUnits)]) -> ResourceList {
    entries
        .iter()
        .map(|&(name, units)| (name.to_string(), ResourceAmount::new_units(units)))
        .collect()
}

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds a claimer from the given plugins, runs it on a background task and
/// waits until it accepts requests.
pub async fn started_claimer(
    plugins: Vec<Box<dyn ClaimPlugin>>,
) -> (
    Arc<ResourceClaimer>,
    CancellationToken,
    JoinHandle<crate::Result<()>>,
) {
    init_test_logging();
    let claimer = Arc::new(ResourceClaimer::new(plugins).unwrap());
    let token = CancellationToken::new();
    let handle = tokio::spawn({
        let claimer = claimer.clone();
        let token = token.clone();
        async move { claimer.start(token).await }
    });
    claimer
        .wait_until_started(&CancellationToken::new())
        .await
        .unwrap();
    (claimer, token, handle)
}

pub async fn stop_claimer(token: CancellationToken, handle: JoinHandle<crate::Result<()>>) {
    token.cancel();
    handle.await.unwrap().unwrap();
}

use crate::internal::claim::plugin::{ClaimPlugin, ResourceClaim};
use crate::internal::common::error::ClaimError;
use crate::internal::common::resources::{ResourceList, ResourceName};
use crate::internal::common::{Map, Set};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Aggregate result of a multi-resource claim request, one entry per
/// requested resource name. Never partially valid: either every requested
/// name got an entry or the whole request failed.
pub type Claims = Map<ResourceName, ResourceClaim>;

struct ClaimRequest {
    resources: ResourceList,
    response: oneshot::Sender<crate::Result<Claims>>,
}

struct ReleaseRequest {
    claims: Claims,
    response: oneshot::Sender<crate::Result<()>>,
}

/// Broker serializing claim and release operations over a set of plugins
/// keyed by resource name.
///
/// All plugin mutations happen on the command loop task spawned through
/// [`start`](Self::start); callers hand requests in through depth-one queues
/// and block until the loop answers or their token fires. Requests therefore
/// run to completion one at a time across all resource names, which keeps the
/// all-or-nothing rollback of multi-resource claims correct without any
/// locking inside plugins.
pub struct ResourceClaimer {
    plugin_names: Set<ResourceName>,
    to_claim: mpsc::Sender<ClaimRequest>,
    to_release: mpsc::Sender<ReleaseRequest>,
    started: watch::Receiver<bool>,
    core: Mutex<Option<ClaimerCore>>,
}

impl ResourceClaimer {
    /// Registers and initializes the given plugins.
    ///
    /// Fails when two plugins report the same name or when any `init` fails;
    /// no partially initialized claimer is ever returned.
    pub fn new(plugins: Vec<Box<dyn ClaimPlugin>>) -> crate::Result<ResourceClaimer> {
        let mut registry: Map<ResourceName, Box<dyn ClaimPlugin>> =
            Map::with_capacity(plugins.len());
        for plugin in plugins {
            let name = plugin.name().to_string();
            if registry.insert(name.clone(), plugin).is_some() {
                return Err(format!("Plugin {name} is already registered").into());
            }
        }
        for plugin in registry.values_mut() {
            plugin.init()?;
        }

        let (to_claim, claim_requests) = mpsc::channel(1);
        let (to_release, release_requests) = mpsc::channel(1);
        let (started_tx, started_rx) = watch::channel(false);
        Ok(ResourceClaimer {
            plugin_names: registry.keys().cloned().collect(),
            to_claim,
            to_release,
            started: started_rx,
            core: Mutex::new(Some(ClaimerCore {
                plugins: registry,
                claim_requests,
                release_requests,
                started: started_tx,
            })),
        })
    }

    /// Runs the command loop until `token` is cancelled.
    ///
    /// May be invoked once; a second invocation fails with `AlreadyStarted`.
    /// Returns after the token fired and every queued request was answered
    /// with the cancellation error. The claimer cannot be restarted.
    pub async fn start(&self, token: CancellationToken) -> crate::Result<()> {
        let core = self
            .core
            .lock()
            .expect("claimer state lock poisoned")
            .take()
            .ok_or(ClaimError::AlreadyStarted)?;
        core.run(token).await;
        Ok(())
    }

    /// Blocks until the command loop accepts requests or `token` fires.
    pub async fn wait_until_started(&self, token: &CancellationToken) -> crate::Result<()> {
        let mut started = self.started.clone();
        tokio::select! {
            result = started.wait_for(|started| *started) => match result {
                Ok(_) => Ok(()),
                Err(_) => Err(ClaimError::NotStarted),
            },
            _ = token.cancelled() => Err(ClaimError::Cancelled),
        }
    }

    /// Claims the requested amount of every resource in the list, all or
    /// nothing.
    ///
    /// Fails with `MissingPlugins` when a requested name has no plugin,
    /// `NotStarted` when the loop is not running, `InsufficientResources`
    /// when any resource cannot be satisfied (no state is mutated then), or
    /// `Cancelled` when `token` fires first. Once a request was admitted into
    /// the loop, cancelling no longer prevents the mutation; the caller only
    /// stops observing the result.
    pub async fn claim(
        &self,
        token: &CancellationToken,
        resources: ResourceList,
    ) -> crate::Result<Claims> {
        self.check_plugin_coverage(resources.keys())?;
        self.ensure_running()?;

        let (response_tx, response_rx) = oneshot::channel();
        let request = ClaimRequest {
            resources,
            response: response_tx,
        };
        tokio::select! {
            sent = self.to_claim.send(request) => {
                if sent.is_err() {
                    return Err(ClaimError::NotStarted);
                }
            }
            _ = token.cancelled() => return Err(ClaimError::Cancelled),
        }
        tokio::select! {
            result = response_rx => result.unwrap_or(Err(ClaimError::NotStarted)),
            _ = token.cancelled() => Err(ClaimError::Cancelled),
        }
    }

    /// Releases every claim in the map, best-effort.
    ///
    /// Per-entry failures are aggregated into `ReleaseFailed`; since releases
    /// are idempotent per device, retrying with the same (borrowed) map is
    /// always safe and the intended recovery.
    pub async fn release(&self, token: &CancellationToken, claims: &Claims) -> crate::Result<()> {
        self.check_plugin_coverage(claims.keys())?;
        self.ensure_running()?;

        let (response_tx, response_rx) = oneshot::channel();
        let request = ReleaseRequest {
            claims: claims.clone(),
            response: response_tx,
        };
        tokio::select! {
            sent = self.to_release.send(request) => {
                if sent.is_err() {
                    return Err(ClaimError::NotStarted);
                }
            }
            _ = token.cancelled() => return Err(ClaimError::Cancelled),
        }
        tokio::select! {
            result = response_rx => result.unwrap_or(Err(ClaimError::NotStarted)),
            _ = token.cancelled() => Err(ClaimError::Cancelled),
        }
    }

    fn check_plugin_coverage<'a>(
        &self,
        names: impl Iterator<Item = &'a ResourceName>,
    ) -> crate::Result<()> {
        let mut missing: Vec<ResourceName> = names
            .filter(|name| !self.plugin_names.contains(*name))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort_unstable();
            Err(ClaimError::MissingPlugins(missing))
        }
    }

    fn ensure_running(&self) -> crate::Result<()> {
        if !*self.started.borrow() || self.to_claim.is_closed() {
            return Err(ClaimError::NotStarted);
        }
        Ok(())
    }
}

struct ClaimerCore {
    plugins: Map<ResourceName, Box<dyn ClaimPlugin>>,
    claim_requests: mpsc::Receiver<ClaimRequest>,
    release_requests: mpsc::Receiver<ReleaseRequest>,
    started: watch::Sender<bool>,
}

impl ClaimerCore {
    async fn run(mut self, token: CancellationToken) {
        self.started.send_replace(true);
        log::debug!("Resource claimer started");
        loop {
            // Re-checked before taking new work so that a cancellation
            // arriving while a request was processed deterministically drains
            // the queues instead of serving them.
            if token.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = token.cancelled() => break,
                Some(request) = self.claim_requests.recv() => {
                    let result = self.claim(request.resources);
                    let _ = request.response.send(result);
                }
                Some(request) = self.release_requests.recv() => {
                    let result = self.release(request.claims);
                    let _ = request.response.send(result);
                }
            }
        }

        // Refuse new requests, then answer everything already queued.
        self.claim_requests.close();
        self.release_requests.close();
        while let Some(request) = self.claim_requests.recv().await {
            let _ = request.response.send(Err(ClaimError::Cancelled));
        }
        while let Some(request) = self.release_requests.recv().await {
            let _ = request.response.send(Err(ClaimError::Cancelled));
        }
        log::debug!("Resource claimer stopped");
    }

    fn claim(&mut self, resources: ResourceList) -> crate::Result<Claims> {
        // Ask every plugin first so that a short resource fails the whole
        // request before anything is mutated.
        let mut short: Vec<ResourceName> = resources
            .iter()
            .filter(|(name, amount)| {
                let plugin = self
                    .plugins
                    .get(*name)
                    .expect("unknown resource admitted into the loop");
                !plugin.can_claim(**amount)
            })
            .map(|(name, _)| name.clone())
            .collect();
        if !short.is_empty() {
            short.sort_unstable();
            return Err(ClaimError::InsufficientResources(short));
        }

        let mut claims = Claims::with_capacity(resources.len());
        for (name, &amount) in &resources {
            let plugin = self
                .plugins
                .get_mut(name)
                .expect("unknown resource admitted into the loop");
            match plugin.claim(amount) {
                Ok(claim) => {
                    claims.insert(name.clone(), claim);
                }
                Err(error) => {
                    // The caller gets the triggering error; rollback failures
                    // must not mask it.
                    if let Err(release_error) = self.release(claims) {
                        log::error!(
                            "Failed to roll back claims after a failed claim: {release_error}"
                        );
                    }
                    return Err(error);
                }
            }
        }
        Ok(claims)
    }

    fn release(&mut self, claims: Claims) -> crate::Result<()> {
        let mut failed: Vec<(ResourceName, ClaimError)> = Vec::new();
        for (name, claim) in claims {
            let plugin = self
                .plugins
                .get_mut(&name)
                .expect("unknown resource admitted into the loop");
            if let Err(error) = plugin.release(&claim) {
                failed.push((name, error));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            Err(ClaimError::ReleaseFailed(failed))
        }
    }
}

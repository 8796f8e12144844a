//! In-process host for workers.
//!
//! A `Registration` plays the platform's role for one scope: it installs and
//! activates worker versions, tracks open client pages and which worker
//! controls them, and routes each client request either through the
//! controlling worker or straight to the network.
//!
//! Version handover follows the platform rules:
//! - A newly installed version waits while pages are still controlled by the
//!   current one, unless it asked to skip waiting.
//! - On activation, pages controlled by the previous version move to the new
//!   one. Pages that were never controlled only move when the worker claims.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use pwa_cache_core::{Error, Network, Request, Response};
use serde::Serialize;
use tokio::sync::Mutex;
use url::Url;

use crate::filter::Decline;
use crate::handler::{Interception, LifecycleHandler, WorkerHost};
use crate::lifecycle::ActivationReport;
use crate::strategy::Source;

pub type WorkerId = u64;
pub type ClientId = u64;

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Registered but not yet installing.
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Result of registering a worker version.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct Deployment {
    pub worker: WorkerId,
    pub state: WorkerState,
    /// Present when the version activated during registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationReport>,
    /// Activation callback error, if it failed. The version stays active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_error: Option<String>,
}

/// A waiting worker that became active.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct Handover {
    pub worker: WorkerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationReport>,
    /// Activation callback error, if it failed. The worker stays active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_error: Option<String>,
}

/// How a client request was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(tag = "via", rename_all = "snake_case")]
pub enum Route {
    /// The controlling worker produced the response.
    Worker { worker: WorkerId, source: Source },
    /// The controlling worker declined; default network handling applied.
    Declined { worker: WorkerId, reason: Decline },
    /// No worker controls the client.
    Uncontrolled,
}

/// A response delivered to a client page.
#[derive(Debug)]
pub struct Routed {
    pub response: Response,
    pub route: Route,
}

/// Open client page as seen by the host.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    pub controller: Option<WorkerId>,
}

struct Slot<W> {
    id: WorkerId,
    handler: Arc<W>,
}

impl<W> Clone for Slot<W> {
    fn clone(&self) -> Self {
        Self { id: self.id, handler: Arc::clone(&self.handler) }
    }
}

struct ClientRecord {
    url: Url,
    controller: Option<WorkerId>,
}

struct Inner<W> {
    next_worker: WorkerId,
    next_client: ClientId,
    installing: Option<Slot<W>>,
    waiting: Option<Slot<W>>,
    active: Option<Slot<W>>,
    states: HashMap<WorkerId, WorkerState>,
    skip_waiting: HashSet<WorkerId>,
    clients: BTreeMap<ClientId, ClientRecord>,
}

/// Host for the workers of one scope.
pub struct Registration<W> {
    scope: Url,
    network: Arc<dyn Network>,
    inner: Mutex<Inner<W>>,
}

/// Host handle passed to a specific worker's callbacks.
struct ScopedHost<'a, W> {
    registration: &'a Registration<W>,
    worker: WorkerId,
}

#[async_trait]
impl<'a, W: LifecycleHandler + 'static> WorkerHost for ScopedHost<'a, W> {
    async fn skip_waiting(&self) {
        let mut inner = self.registration.inner.lock().await;
        inner.skip_waiting.insert(self.worker);
    }

    async fn claim_clients(&self) -> Result<usize, Error> {
        self.registration.claim(self.worker).await
    }
}

impl<W: LifecycleHandler + 'static> Registration<W> {
    /// Create a registration for pages under `scope`. Requests the workers
    /// decline, and requests from uncontrolled pages, go to `network`.
    pub fn new(scope: Url, network: Arc<dyn Network>) -> Self {
        Self {
            scope,
            network,
            inner: Mutex::new(Inner {
                next_worker: 1,
                next_client: 1,
                installing: None,
                waiting: None,
                active: None,
                states: HashMap::new(),
                skip_waiting: HashSet::new(),
                clients: BTreeMap::new(),
            }),
        }
    }

    pub fn scope(&self) -> &Url {
        &self.scope
    }

    fn in_scope(&self, url: &Url) -> bool {
        let origin = url.origin();
        origin.is_tuple() && origin == self.scope.origin() && url.path().starts_with(self.scope.path())
    }

    /// Install a new worker version and activate it when allowed.
    ///
    /// # Errors
    ///
    /// Returns the install callback's error; the version is then redundant.
    pub async fn register(&self, handler: Arc<W>) -> Result<Deployment, Error> {
        let slot = {
            let mut inner = self.inner.lock().await;
            let id = inner.next_worker;
            inner.next_worker += 1;
            inner.states.insert(id, WorkerState::Parsed);
            Slot { id, handler }
        };
        tracing::debug!(worker = slot.id, "worker parsed");

        {
            let mut inner = self.inner.lock().await;
            inner.states.insert(slot.id, WorkerState::Installing);
            if let Some(previous) = inner.installing.replace(slot.clone()) {
                inner.states.insert(previous.id, WorkerState::Redundant);
            }
        }

        let host = ScopedHost { registration: self, worker: slot.id };
        if let Err(e) = slot.handler.on_install(&host).await {
            tracing::warn!(worker = slot.id, error = %e, "install failed, worker is redundant");
            let mut inner = self.inner.lock().await;
            if inner.installing.as_ref().is_some_and(|s| s.id == slot.id) {
                inner.installing = None;
            }
            inner.states.insert(slot.id, WorkerState::Redundant);
            inner.skip_waiting.remove(&slot.id);
            return Err(e);
        }

        {
            let mut inner = self.inner.lock().await;
            if !inner.installing.as_ref().is_some_and(|s| s.id == slot.id) {
                tracing::info!(worker = slot.id, "worker superseded during install");
                return Ok(Deployment {
                    worker: slot.id,
                    state: WorkerState::Redundant,
                    activation: None,
                    activation_error: None,
                });
            }
            inner.installing = None;
            inner.states.insert(slot.id, WorkerState::Installed);
            if let Some(previous) = inner.waiting.replace(slot.clone()) {
                inner.states.insert(previous.id, WorkerState::Redundant);
            }
        }
        tracing::info!(worker = slot.id, "worker installed");

        let (activation, activation_error) = match self.try_activate().await {
            Some(handover) => (handover.activation, handover.activation_error),
            None => (None, None),
        };

        let state = self.state(slot.id).await.unwrap_or(WorkerState::Redundant);
        Ok(Deployment { worker: slot.id, state, activation, activation_error })
    }

    /// Promote the waiting worker if nothing holds it back.
    ///
    /// Returns `None` when no activation happened.
    async fn try_activate(&self) -> Option<Handover> {
        let slot = {
            let mut inner = self.inner.lock().await;
            let waiting_id = inner.waiting.as_ref()?.id;

            if let Some(active) = inner.active.as_ref() {
                let in_use = inner.clients.values().any(|c| c.controller == Some(active.id));
                if in_use && !inner.skip_waiting.contains(&waiting_id) {
                    tracing::debug!(worker = waiting_id, "worker waiting for controlled clients to close");
                    return None;
                }
            }

            let slot = inner.waiting.take()?;
            if let Some(previous) = inner.active.replace(slot.clone()) {
                inner.states.insert(previous.id, WorkerState::Redundant);
                for client in inner.clients.values_mut() {
                    if client.controller == Some(previous.id) {
                        client.controller = Some(slot.id);
                    }
                }
                tracing::info!(old = previous.id, new = slot.id, "worker replaced");
            }
            inner.states.insert(slot.id, WorkerState::Activating);
            inner.skip_waiting.remove(&slot.id);
            slot
        };

        let host = ScopedHost { registration: self, worker: slot.id };
        let handover = match slot.handler.on_activate(&host).await {
            Ok(report) => Handover { worker: slot.id, activation: Some(report), activation_error: None },
            Err(e) => {
                tracing::warn!(worker = slot.id, error = %e, "activate callback failed");
                Handover { worker: slot.id, activation: None, activation_error: Some(e.to_string()) }
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.active.as_ref().is_some_and(|s| s.id == slot.id) {
            inner.states.insert(slot.id, WorkerState::Activated);
        }
        Some(handover)
    }

    async fn claim(&self, worker: WorkerId) -> Result<usize, Error> {
        let mut inner = self.inner.lock().await;
        if !inner.active.as_ref().is_some_and(|s| s.id == worker) {
            return Err(Error::Host(format!("worker {worker} is not active and cannot claim clients")));
        }

        let mut claimed = 0;
        for client in inner.clients.values_mut() {
            if self.in_scope(&client.url) {
                client.controller = Some(worker);
                claimed += 1;
            }
        }
        Ok(claimed)
    }

    /// Open a client page. It is controlled right away when an active
    /// worker exists and the page is in scope.
    pub async fn open_client(&self, url: Url) -> ClientId {
        let mut inner = self.inner.lock().await;
        let id = inner.next_client;
        inner.next_client += 1;
        let controller = inner
            .active
            .as_ref()
            .filter(|_| self.in_scope(&url))
            .map(|s| s.id);
        inner.clients.insert(id, ClientRecord { url, controller });
        id
    }

    /// Close a client page, which may let a waiting worker activate.
    /// Returns the handover when that happened, even if its activate
    /// callback failed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an unknown client.
    pub async fn close_client(&self, client: ClientId) -> Result<Option<Handover>, Error> {
        {
            let mut inner = self.inner.lock().await;
            inner
                .clients
                .remove(&client)
                .ok_or_else(|| Error::InvalidInput(format!("unknown client {client}")))?;
        }

        Ok(self.try_activate().await)
    }

    /// Deliver a request made by `client`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for an unknown client, or the network
    /// error when the default handling path fails.
    pub async fn fetch(&self, client: ClientId, request: &Request) -> Result<Routed, Error> {
        let controller = {
            let inner = self.inner.lock().await;
            let record = inner
                .clients
                .get(&client)
                .ok_or_else(|| Error::InvalidInput(format!("unknown client {client}")))?;
            record
                .controller
                .and_then(|id| inner.active.as_ref().filter(|s| s.id == id).cloned())
        };

        let Some(slot) = controller else {
            let response = self.network.fetch(request).await?;
            return Ok(Routed { response, route: Route::Uncontrolled });
        };

        match slot.handler.on_intercept(request).await {
            Interception::Responded(served) => {
                Ok(Routed { response: served.response, route: Route::Worker { worker: slot.id, source: served.source } })
            }
            Interception::Declined(reason) => {
                let response = self.network.fetch(request).await?;
                Ok(Routed { response, route: Route::Declined { worker: slot.id, reason } })
            }
        }
    }

    pub async fn state(&self, worker: WorkerId) -> Option<WorkerState> {
        self.inner.lock().await.states.get(&worker).copied()
    }

    /// Currently active worker.
    pub async fn active(&self) -> Option<(WorkerId, Arc<W>)> {
        let inner = self.inner.lock().await;
        inner.active.as_ref().map(|s| (s.id, Arc::clone(&s.handler)))
    }

    /// Installed worker waiting to activate.
    pub async fn waiting(&self) -> Option<WorkerId> {
        self.inner.lock().await.waiting.as_ref().map(|s| s.id)
    }

    pub async fn controller(&self, client: ClientId) -> Option<WorkerId> {
        self.inner.lock().await.clients.get(&client).and_then(|c| c.controller)
    }

    pub async fn clients(&self) -> Vec<ClientInfo> {
        let inner = self.inner.lock().await;
        inner
            .clients
            .iter()
            .map(|(id, c)| ClientInfo { id: *id, url: c.url.to_string(), controller: c.controller })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::test_support::{CountingStorage, MockNetwork};
    use crate::worker::ServiceWorker;
    use pwa_cache_core::{CacheDb, CacheStorage, ResponseType};

    const SCOPE: &str = "http://localhost:8080/";

    struct Fixture {
        storage: Arc<CountingStorage>,
        network: Arc<MockNetwork>,
        registration: Registration<ServiceWorker>,
    }

    impl Fixture {
        async fn new() -> Self {
            let storage = Arc::new(CountingStorage::new(CacheDb::open_in_memory().await.unwrap()));
            let network = Arc::new(MockNetwork::new());
            let registration = Registration::new(Url::parse(SCOPE).unwrap(), network.clone());
            Self { storage, network, registration }
        }

        fn worker(&self, cache_name: &str) -> Arc<ServiceWorker> {
            Arc::new(ServiceWorker::new(WorkerConfig::new(cache_name), self.storage.clone(), self.network.clone()))
        }

        fn page(path: &str) -> Url {
            Url::parse(SCOPE).unwrap().join(path).unwrap()
        }
    }

    /// Worker that never asks to skip waiting.
    #[derive(Default)]
    struct PatientWorker {
        fail_activate: bool,
    }

    #[async_trait]
    impl LifecycleHandler for PatientWorker {
        async fn on_install(&self, _host: &dyn WorkerHost) -> Result<(), Error> {
            Ok(())
        }

        async fn on_activate(&self, _host: &dyn WorkerHost) -> Result<ActivationReport, Error> {
            if self.fail_activate {
                return Err(Error::Host("activate exploded".into()));
            }
            Ok(ActivationReport::default())
        }

        async fn on_intercept(&self, _request: &Request) -> Interception {
            Interception::Responded(crate::strategy::Served {
                response: Response::new(200, "patient"),
                source: Source::Cache,
            })
        }
    }

    /// Worker whose install always fails.
    struct BrokenWorker;

    #[async_trait]
    impl LifecycleHandler for BrokenWorker {
        async fn on_install(&self, _host: &dyn WorkerHost) -> Result<(), Error> {
            Err(Error::Host("install exploded".into()))
        }

        async fn on_activate(&self, _host: &dyn WorkerHost) -> Result<ActivationReport, Error> {
            Ok(ActivationReport::default())
        }

        async fn on_intercept(&self, _request: &Request) -> Interception {
            Interception::Declined(Decline::Method("GET".into()))
        }
    }

    #[tokio::test]
    async fn test_register_activates_immediately() {
        let fx = Fixture::new().await;

        let deployment = fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();

        assert_eq!(deployment.state, WorkerState::Activated);
        assert!(deployment.activation.is_some());
        assert_eq!(fx.registration.active().await.map(|(id, _)| id), Some(deployment.worker));
        assert_eq!(fx.registration.waiting().await, None);
    }

    #[tokio::test]
    async fn test_activation_removes_old_stores() {
        let fx = Fixture::new().await;
        fx.storage.open_store("my-pwa-cache-v1").await.unwrap();
        fx.storage.open_store("old-cache-v0").await.unwrap();

        let deployment = fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();

        let report = deployment.activation.unwrap();
        assert_eq!(report.deleted, vec!["old-cache-v0".to_string()]);
        assert_eq!(fx.storage.keys().await.unwrap(), vec!["my-pwa-cache-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_claim_routes_existing_pages_through_new_worker() {
        let fx = Fixture::new().await;
        let page = Fixture::page("index.html");
        let client = fx.registration.open_client(page.clone()).await;
        assert_eq!(fx.registration.controller(client).await, None);

        let request = Request::get(Fixture::page("app.js").as_str()).unwrap();
        fx.network
            .respond_with(request.url().as_str(), Response::new(200, "js").with_type(ResponseType::Basic));

        let before = fx.registration.fetch(client, &request).await.unwrap();
        assert_eq!(before.route, Route::Uncontrolled);

        let deployment = fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();
        assert_eq!(deployment.activation.unwrap().claimed, 1);
        assert_eq!(fx.registration.controller(client).await, Some(deployment.worker));

        let after = fx.registration.fetch(client, &request).await.unwrap();
        assert_eq!(after.route, Route::Worker { worker: deployment.worker, source: Source::NetworkStored });
    }

    #[tokio::test]
    async fn test_claim_skips_out_of_scope_pages() {
        let fx = Fixture::new().await;
        let outside = fx
            .registration
            .open_client(Url::parse("https://elsewhere.example/").unwrap())
            .await;

        let deployment = fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();

        assert_eq!(deployment.activation.unwrap().claimed, 0);
        assert_eq!(fx.registration.controller(outside).await, None);
    }

    #[tokio::test]
    async fn test_pages_opened_later_are_controlled() {
        let fx = Fixture::new().await;
        let deployment = fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();

        let client = fx.registration.open_client(Fixture::page("about.html")).await;
        assert_eq!(fx.registration.controller(client).await, Some(deployment.worker));
    }

    #[tokio::test]
    async fn test_version_bump_replaces_worker_and_cache() {
        let fx = Fixture::new().await;
        let v1 = fx.worker("my-pwa-cache-v1");
        let first = fx.registration.register(v1.clone()).await.unwrap();
        let client = fx.registration.open_client(Fixture::page("index.html")).await;

        let request = Request::get(Fixture::page("app.js").as_str()).unwrap();
        fx.network
            .respond_with(request.url().as_str(), Response::new(200, "v1").with_type(ResponseType::Basic));
        fx.registration.fetch(client, &request).await.unwrap();
        v1.settle().await;
        assert!(fx.storage.has("my-pwa-cache-v1").await.unwrap());

        let second = fx.registration.register(fx.worker("my-pwa-cache-v2")).await.unwrap();

        assert_eq!(second.state, WorkerState::Activated);
        assert_eq!(fx.registration.state(first.worker).await, Some(WorkerState::Redundant));
        assert_eq!(fx.registration.controller(client).await, Some(second.worker));
        assert_eq!(second.activation.unwrap().deleted, vec!["my-pwa-cache-v1".to_string()]);

        let routed = fx.registration.fetch(client, &request).await.unwrap();
        assert_eq!(routed.route, Route::Worker { worker: second.worker, source: Source::NetworkStored });
        assert_eq!(fx.network.calls(), 2);
    }

    #[tokio::test]
    async fn test_declined_request_goes_to_network() {
        let fx = Fixture::new().await;
        let deployment = fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();
        let client = fx.registration.open_client(Fixture::page("index.html")).await;

        let request = Request::new("POST", Fixture::page("api"));
        fx.network.respond_with(request.url().as_str(), Response::new(201, "created"));

        let mut routed = fx.registration.fetch(client, &request).await.unwrap();
        assert_eq!(
            routed.route,
            Route::Declined { worker: deployment.worker, reason: Decline::Method("POST".into()) }
        );
        assert_eq!(routed.response.text().unwrap(), "created");
        assert_eq!(fx.storage.reads(), 0);
    }

    #[tokio::test]
    async fn test_patient_worker_waits_for_clients() {
        let network = Arc::new(MockNetwork::new());
        let registration: Registration<PatientWorker> = Registration::new(Url::parse(SCOPE).unwrap(), network);

        let first = registration.register(Arc::new(PatientWorker::default())).await.unwrap();
        assert_eq!(first.state, WorkerState::Activated);
        let client = registration.open_client(Fixture::page("index.html")).await;

        let second = registration.register(Arc::new(PatientWorker::default())).await.unwrap();
        assert_eq!(second.state, WorkerState::Installed);
        assert_eq!(registration.waiting().await, Some(second.worker));
        assert_eq!(registration.controller(client).await, Some(first.worker));

        let handover = registration.close_client(client).await.unwrap().unwrap();
        assert_eq!(handover.worker, second.worker);
        assert!(handover.activation.is_some());
        assert!(handover.activation_error.is_none());
        assert_eq!(registration.state(second.worker).await, Some(WorkerState::Activated));
        assert_eq!(registration.state(first.worker).await, Some(WorkerState::Redundant));
    }

    #[tokio::test]
    async fn test_close_reports_failed_activation() {
        let network = Arc::new(MockNetwork::new());
        let registration: Registration<PatientWorker> = Registration::new(Url::parse(SCOPE).unwrap(), network);

        registration.register(Arc::new(PatientWorker::default())).await.unwrap();
        let client = registration.open_client(Fixture::page("index.html")).await;
        let second = registration
            .register(Arc::new(PatientWorker { fail_activate: true }))
            .await
            .unwrap();
        assert_eq!(second.state, WorkerState::Installed);

        let handover = registration.close_client(client).await.unwrap().unwrap();
        assert_eq!(handover.worker, second.worker);
        assert!(handover.activation.is_none());
        assert!(handover.activation_error.unwrap().contains("activate exploded"));
        assert_eq!(registration.state(second.worker).await, Some(WorkerState::Activated));
        assert_eq!(registration.active().await.map(|(id, _)| id), Some(second.worker));
    }

    #[tokio::test]
    async fn test_close_without_waiting_worker() {
        let fx = Fixture::new().await;
        fx.registration.register(fx.worker("my-pwa-cache-v1")).await.unwrap();
        let client = fx.registration.open_client(Fixture::page("index.html")).await;

        assert!(fx.registration.close_client(client).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_install_is_redundant() {
        let network = Arc::new(MockNetwork::new());
        let registration: Registration<BrokenWorker> = Registration::new(Url::parse(SCOPE).unwrap(), network);

        let result = registration.register(Arc::new(BrokenWorker)).await;
        assert!(matches!(result, Err(Error::Host(_))));
        assert_eq!(registration.state(1).await, Some(WorkerState::Redundant));
        assert!(registration.active().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_client() {
        let fx = Fixture::new().await;
        let request = Request::get(Fixture::page("x").as_str()).unwrap();
        assert!(matches!(fx.registration.fetch(42, &request).await, Err(Error::InvalidInput(_))));
        assert!(matches!(fx.registration.close_client(42).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_uncontrolled_network_failure_is_error() {
        let fx = Fixture::new().await;
        let client = fx.registration.open_client(Fixture::page("index.html")).await;
        let request = Request::get(Fixture::page("down").as_str()).unwrap();

        let result = fx.registration.fetch(client, &request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_route_serialization() {
        let route = Route::Worker { worker: 1, source: Source::Cache };
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["via"], "worker");
        assert_eq!(json["source"], "cache");
    }
}

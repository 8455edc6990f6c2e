//! Session Lifecycle Manager.
//!
//! Opens one provider session per endpoint for the duration of a single request
//! and releases all of them on every exit path, including the enclosing future
//! being dropped mid-flight.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use indexmap::IndexMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use intentforge_core::{
    guarded, Catalog, Interrupted, ProviderEndpoint, ProviderSession, RouterError, SessionFactory,
};
use intentforge_logging::redact_sensitive_data;

use crate::catalog::fetch_catalog;

/// The open sessions of one request, keyed by provider name in endpoint order.
#[derive(Clone, Default)]
pub struct SessionSet {
    sessions: IndexMap<String, Arc<dyn ProviderSession>>,
}

impl SessionSet {
    pub fn get(&self, provider: &str) -> Option<&Arc<dyn ProviderSession>> {
        self.sessions.get(provider)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn ProviderSession>)> {
        self.sessions.iter().map(|(name, s)| (name.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn insert(&mut self, provider: String, session: Arc<dyn ProviderSession>) {
        self.sessions.insert(provider, session);
    }

    /// Reorder to match `endpoints`.
    fn arrange(&mut self, endpoints: &[ProviderEndpoint]) {
        let mut ordered = IndexMap::with_capacity(self.sessions.len());
        for endpoint in endpoints {
            if let Some(session) = self.sessions.swap_remove(&endpoint.name) {
                ordered.insert(endpoint.name.clone(), session);
            }
        }
        self.sessions = ordered;
    }

    /// Close every session concurrently. Close failures are logged, not returned.
    pub async fn close_all(&self, limit: Duration) {
        let closes = self.sessions.iter().map(|(name, session)| async move {
            match tokio::time::timeout(limit, session.close()).await {
                Ok(Ok(())) => debug!(provider = %name, "Session closed"),
                Ok(Err(e)) => warn!(
                    provider = %name,
                    error = %redact_sensitive_data(&format!("{e:#}")),
                    "Session close failed"
                ),
                Err(_) => warn!(provider = %name, ?limit, "Session close timed out"),
            }
        });
        join_all(closes).await;
    }
}

fn lock(set: &Mutex<SessionSet>) -> MutexGuard<'_, SessionSet> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every session of a request from the moment it connects.
///
/// Dropped while armed, it closes whatever it holds in the background.
struct ReleaseGuard {
    sessions: Arc<Mutex<SessionSet>>,
    limit: Duration,
    armed: bool,
}

impl ReleaseGuard {
    fn new(limit: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            limit,
            armed: true,
        }
    }

    fn collector(&self) -> &Mutex<SessionSet> {
        &self.sessions
    }

    fn snapshot(&self) -> SessionSet {
        lock(&self.sessions).clone()
    }

    /// Hand the sessions to the caller without closing them.
    fn disarm(mut self) -> SessionSet {
        self.armed = false;
        let sessions = std::mem::take(&mut *lock(&self.sessions));
        sessions
    }

    async fn release(mut self) {
        self.armed = false;
        let sessions = std::mem::take(&mut *lock(&self.sessions));
        sessions.close_all(self.limit).await;
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let sessions = std::mem::take(&mut *lock(&self.sessions));
        if sessions.is_empty() {
            return;
        }
        let limit = self.limit;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    sessions = sessions.len(),
                    "Request dropped before release; closing sessions in background"
                );
                handle.spawn(async move { sessions.close_all(limit).await });
            }
            Err(_) => warn!(
                sessions = sessions.len(),
                "Request dropped outside a runtime; sessions left to the provider's idle timeout"
            ),
        }
    }
}

fn duplicate_endpoint(endpoints: &[ProviderEndpoint]) -> Option<&str> {
    let mut seen = HashSet::new();
    endpoints
        .iter()
        .map(|endpoint| endpoint.name.as_str())
        .find(|name| !seen.insert(*name))
}

/// Per-request scoped acquisition of provider sessions.
#[derive(Clone)]
pub struct SessionManager {
    factory: Arc<dyn SessionFactory>,
    discovery_timeout: Duration,
}

impl SessionManager {
    pub fn new(factory: Arc<dyn SessionFactory>, discovery_timeout: Duration) -> Self {
        Self {
            factory,
            discovery_timeout,
        }
    }

    pub fn discovery_timeout(&self) -> Duration {
        self.discovery_timeout
    }

    /// Connect to every endpoint concurrently.
    ///
    /// All-or-nothing: if any connect fails, or this future is dropped, the
    /// sessions that did open are closed.
    pub async fn open(
        &self,
        endpoints: &[ProviderEndpoint],
        cancel: &CancellationToken,
    ) -> Result<SessionSet, RouterError> {
        let guard = ReleaseGuard::new(self.discovery_timeout);
        match self.connect_all(endpoints, cancel, guard.collector()).await {
            Ok(()) => Ok(guard.disarm()),
            Err(e) => {
                guard.release().await;
                Err(e)
            }
        }
    }

    /// Connect concurrently, moving each session into `opened` as soon as it
    /// resolves so that a guard owns it before the next suspension point.
    async fn connect_all(
        &self,
        endpoints: &[ProviderEndpoint],
        cancel: &CancellationToken,
        opened: &Mutex<SessionSet>,
    ) -> Result<(), RouterError> {
        if let Some(name) = duplicate_endpoint(endpoints) {
            warn!(provider = name, "Endpoint name configured twice");
            return Err(RouterError::DuplicateProvider(name.to_string()));
        }

        let mut attempts: FuturesUnordered<_> = endpoints
            .iter()
            .map(|endpoint| async move {
                let outcome = guarded(
                    cancel,
                    self.discovery_timeout,
                    self.factory.connect(endpoint),
                )
                .await;
                (endpoint, outcome)
            })
            .collect();

        let mut failure: Option<RouterError> = None;
        while let Some((endpoint, outcome)) = attempts.next().await {
            match outcome {
                Ok(Ok(session)) => lock(opened).insert(endpoint.name.clone(), Arc::from(session)),
                Ok(Err(e)) => {
                    let reason = redact_sensitive_data(&format!("{e:#}"));
                    warn!(provider = %endpoint.name, url = %endpoint.url, error = %reason, "Provider connect failed");
                    failure.get_or_insert(RouterError::ProviderUnreachable {
                        provider: endpoint.name.clone(),
                        reason,
                    });
                }
                Err(Interrupted::TimedOut(limit)) => {
                    warn!(provider = %endpoint.name, ?limit, "Provider connect timed out");
                    failure.get_or_insert(RouterError::ProviderUnreachable {
                        provider: endpoint.name.clone(),
                        reason: format!("connect timed out after {limit:?}"),
                    });
                }
                Err(Interrupted::Cancelled) => {
                    failure.get_or_insert(RouterError::Cancelled);
                }
            }
        }

        if let Some(err) = failure {
            debug!(sessions = lock(opened).len(), "Releasing sessions opened before failure");
            return Err(err);
        }
        lock(opened).arrange(endpoints);
        Ok(())
    }

    /// Open sessions, build the catalog, run `body`, and release the sessions.
    ///
    /// Release happens on success, on any error from connecting, catalog
    /// building or `body`, and in the background if this future is dropped.
    pub async fn with_session<F, Fut, T>(
        &self,
        endpoints: &[ProviderEndpoint],
        cancel: &CancellationToken,
        body: F,
    ) -> Result<T, RouterError>
    where
        F: FnOnce(Arc<Catalog>, Arc<SessionSet>) -> Fut,
        Fut: Future<Output = Result<T, RouterError>>,
    {
        let guard = ReleaseGuard::new(self.discovery_timeout);
        if let Err(e) = self.connect_all(endpoints, cancel, guard.collector()).await {
            guard.release().await;
            return Err(e);
        }
        let sessions = Arc::new(guard.snapshot());
        info!(providers = sessions.len(), "Provider sessions open");

        let result = match fetch_catalog(&sessions, self.discovery_timeout, cancel).await {
            Ok(catalog) => body(Arc::new(catalog), sessions).await,
            Err(e) => Err(e),
        };

        guard.release().await;
        result
    }

    /// Connect to one endpoint, ping it, and disconnect.
    pub async fn probe(
        &self,
        endpoint: &ProviderEndpoint,
        cancel: &CancellationToken,
    ) -> Result<(), RouterError> {
        let unreachable = |reason: String| RouterError::ProviderUnreachable {
            provider: endpoint.name.clone(),
            reason,
        };
        let interrupted = |i: Interrupted| match i {
            Interrupted::Cancelled => RouterError::Cancelled,
            Interrupted::TimedOut(limit) => unreachable(format!("timed out after {limit:?}")),
        };

        let session = guarded(cancel, self.discovery_timeout, self.factory.connect(endpoint))
            .await
            .map_err(interrupted)?
            .map_err(|e| unreachable(redact_sensitive_data(&format!("{e:#}"))))?;

        let ping = guarded(cancel, self.discovery_timeout, session.ping()).await;
        if let Err(e) = session.close().await {
            debug!(provider = %endpoint.name, error = %e, "Close after probe failed");
        }
        ping.map_err(interrupted)?
            .map_err(|e| unreachable(redact_sensitive_data(&format!("{e:#}"))))
    }
}

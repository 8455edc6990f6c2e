//! Catalog Aggregator: merge every provider's operations into one namespace.

use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use intentforge_core::{guarded, Catalog, Interrupted, OperationDescriptor, RouterError};
use intentforge_logging::redact_sensitive_data;

use crate::session::SessionSet;

/// Merge per-provider listings, in order, into one catalog.
///
/// A name advertised twice is a configuration error, never resolved silently.
pub fn merge_listings(
    listings: Vec<(String, Vec<OperationDescriptor>)>,
) -> Result<Catalog, RouterError> {
    let mut catalog = Catalog::new();
    for (provider, operations) in listings {
        for descriptor in operations {
            let name = descriptor.name.clone();
            if let Err(first) = catalog.insert(descriptor, provider.clone()) {
                return Err(RouterError::DuplicateOperationName {
                    name,
                    first,
                    second: provider,
                });
            }
        }
    }
    Ok(catalog)
}

/// List every open session's operations concurrently and merge them.
pub async fn fetch_catalog(
    sessions: &SessionSet,
    limit: Duration,
    cancel: &CancellationToken,
) -> Result<Catalog, RouterError> {
    let listings = sessions.iter().map(|(provider, session)| async move {
        let outcome = guarded(cancel, limit, session.list_operations()).await;
        (provider, outcome)
    });

    let mut merged = Vec::with_capacity(sessions.len());
    for (provider, outcome) in join_all(listings).await {
        match outcome {
            Ok(Ok(operations)) => {
                debug!(provider, operations = operations.len(), "Provider listed operations");
                merged.push((provider.to_string(), operations));
            }
            Ok(Err(e)) => {
                let reason = redact_sensitive_data(&format!("{e:#}"));
                warn!(provider, error = %reason, "Operation discovery failed");
                return Err(RouterError::ProviderUnreachable {
                    provider: provider.to_string(),
                    reason,
                });
            }
            Err(Interrupted::TimedOut(limit)) => {
                warn!(provider, ?limit, "Operation discovery timed out");
                return Err(RouterError::ProviderUnreachable {
                    provider: provider.to_string(),
                    reason: format!("discovery timed out after {limit:?}"),
                });
            }
            Err(Interrupted::Cancelled) => return Err(RouterError::Cancelled),
        }
    }

    merge_listings(merged)
}

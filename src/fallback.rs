//! Ordered provider chains: try each provider in turn, first success wins.

use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Anything that can sit in a fallback chain.
pub trait Provider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Run `call` against each provider in order and return the first `Ok`.
///
/// Failures are logged and skipped. If every provider fails, the last error
/// is returned. An empty chain yields [`ProviderError::NoProviders`].
pub async fn first_success<'a, P, T, F>(
    capability: &str,
    providers: &'a [Arc<P>],
    mut call: F,
) -> Result<T, ProviderError>
where
    P: Provider + ?Sized,
    F: FnMut(&'a P) -> BoxFuture<'a, Result<T, ProviderError>>,
{
    let mut last_error = ProviderError::NoProviders(capability.to_string());

    for provider in providers {
        let provider: &'a P = provider.as_ref();
        debug!(capability, provider = provider.name(), "Trying provider");

        match call(provider).await {
            Ok(value) => return Ok(value),
            // Cancellation is not a provider fault; don't burn the rest of the chain.
            Err(ProviderError::Cancelled) => return Err(ProviderError::Cancelled),
            Err(e) => {
                warn!(capability, provider = provider.name(), error = %e, "Provider failed, falling back");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

//! Web-search capability

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::fallback::Provider;
use crate::state::SearchResult;

/// Web-search capability
///
/// Implementations return whatever partial data they have (empty `images`,
/// empty `text`) rather than failing. An `Err` means the query failed as a
/// whole.
#[async_trait]
pub trait WebSearch: Provider {
    async fn search(&self, query: &str) -> Result<SearchResult, ProviderError>;
}

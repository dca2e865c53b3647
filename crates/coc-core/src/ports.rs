use async_trait::async_trait;

use crate::{domain::EgressAddress, Result};

/// Source of the caller's public egress address.
///
/// The HTTP adapter implements this against an IP-echo service; tests supply
/// fixed addresses.
#[async_trait]
pub trait EgressLookup: Send + Sync {
    async fn lookup(&self) -> Result<EgressAddress>;
}

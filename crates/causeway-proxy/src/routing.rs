//! Routing selector: first-match endpoint lookup over the pre-compiled
//! matcher table.

use std::sync::Arc;

use crate::auth::Auth;
use crate::config::{Config, Endpoint};
use crate::error::ProxyError;
use crate::matcher::{normalize, CompiledMatcher};

/// One routing-table row: the source `Endpoint` plus its pre-compiled
/// matcher, built once from `endpoint.match` (falling back to `prefix` when
/// `match` is empty, matching the source's `e.match if e.match else e.endpoint`).
/// `auth` is resolved once here too, from `endpoint.auth`, so the HTTPS
/// backend never has to rebuild a provider per request.
pub struct CompiledEndpoint {
    pub endpoint: Endpoint,
    pub matcher: CompiledMatcher,
    pub auth: Option<Arc<dyn Auth>>,
}

pub struct RoutingTable {
    entries: Vec<CompiledEndpoint>,
}

impl RoutingTable {
    /// Compiles every endpoint's matcher. `config.endpoints` must already be
    /// weight-sorted (done by `Config::from_file`); this preserves that
    /// order, since routing's tie-break is "first match wins", not weight
    /// comparison at lookup time.
    pub fn compile(config: &Config) -> Result<Self, anyhow::Error> {
        let mut entries = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            let pattern = if endpoint.r#match.is_empty() {
                endpoint.prefix.as_str()
            } else {
                endpoint.r#match.as_str()
            };
            let matcher = CompiledMatcher::compile(pattern).map_err(|e| {
                anyhow::anyhow!("endpoint '{}' has an invalid match pattern: {e}", endpoint.prefix)
            })?;
            let auth = endpoint.auth.as_ref().map(crate::auth::build);
            entries.push(CompiledEndpoint { endpoint: endpoint.clone(), matcher, auth });
        }
        Ok(Self { entries })
    }

    /// Returns the first endpoint whose pattern matches the normalized path.
    pub fn find(&self, path: &str) -> Result<&CompiledEndpoint, ProxyError> {
        let normalized = normalize(path);
        self.entries
            .iter()
            .find(|entry| entry.matcher.is_match(&normalized))
            .ok_or_else(|| ProxyError::NotRouted(format!("no endpoint found for {normalized}")))
    }

    /// Looks an endpoint up by its `identifier`, used by the Virtual backend.
    pub fn find_by_identifier(&self, identifier: &str) -> Option<&CompiledEndpoint> {
        self.entries
            .iter()
            .find(|entry| entry.endpoint.identifier.as_deref() == Some(identifier))
    }
}

pub type SharedRoutingTable = Arc<RoutingTable>;

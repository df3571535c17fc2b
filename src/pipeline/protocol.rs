//! Protocol layer (§4.3): resolves endpoint, credentials, timeout,
//! and headers onto a request-local side channel without touching the
//! wire body.

use super::ModuleProcessingContext;
use crate::config::ProviderConfig;
use crate::error::EngineError;
use crate::provider::ProtocolFlavor;
use crate::router::RouteInfo;

pub fn build_context(
    route: &RouteInfo,
    provider: &ProviderConfig,
    flavor: ProtocolFlavor,
) -> Result<ModuleProcessingContext, EngineError> {
    let api_key = provider.api_key.first().ok_or_else(|| {
        EngineError::AuthenticationFailure(format!(
            "no usable api key configured for provider '{}'",
            provider.name
        ))
    })?;

    let base = route.metadata.endpoint_url.trim_end_matches('/');
    let url = if base.ends_with("/v1") {
        format!("{base}{}", flavor.canonical_path())
    } else {
        base.to_string()
    };

    Ok(ModuleProcessingContext {
        url,
        api_key: api_key.to_string(),
        timeout_secs: provider.timeout_secs,
        max_retries: provider.max_retries,
        custom_headers: route.metadata.custom_headers.clone(),
    })
}

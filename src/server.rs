use std::future::Future;
use std::sync::Arc;

use tracing::info;

use crate::networking::filters::routes;
use crate::settings::Settings;
use crate::validator::SignatureValidator;
use crate::JsonApiError;

/// Run the JsonApi echo service until `shutdown` completes.
///
/// Fails before binding if the signature settings are unusable (no secret,
/// unknown algorithm) or the listen address does not parse.
pub async fn run(
    settings: Settings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> crate::Result<()> {
    let validator = Arc::new(SignatureValidator::from_settings(&settings.signature)?);
    let address = settings.server.socket_addr()?;

    let (bound, server) = warp::serve(routes(validator))
        .try_bind_with_graceful_shutdown(address, shutdown)
        .map_err(|err| JsonApiError::Server(format!("could not bind {}: {}", address, err)))?;

    info!(
        "listening on {} (signatures: {}, max ttl {}s)",
        bound, settings.signature.algorithm, settings.signature.max_ttl
    );
    server.await;
    info!("shutting down");

    Ok(())
}

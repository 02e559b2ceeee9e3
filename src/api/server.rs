use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::error::Result;

/// Serve the read API until `shutdown` flips to true, then drain in-flight
/// requests and return.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let app = create_router(state);
    if let Ok(addr) = listener.local_addr() {
        info!("Risk aggregation server listening on {}", addr);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // A dropped sender also means shutdown
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    Ok(())
}

//! HTTP/1.1 accept loop.

use crate::router::handle;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use ratings_service::RatingService;
use ratings_storage::RatingStore;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve the rating API on an already-bound listener until accepting fails.
/// Each connection runs on its own task.
pub async fn serve<S: RatingStore>(
    listener: TcpListener,
    service: Arc<RatingService<S>>,
) -> std::io::Result<()> {
    tracing::info!("serving ratings on http://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let service = service.clone();
        tokio::spawn(async move {
            let conn = service_fn(move |req| {
                let service = service.clone();
                async move { Ok::<_, Infallible>(handle(&service, req).await) }
            });
            if let Err(e) = http1::Builder::new().serve_connection(io, conn).await {
                tracing::debug!(peer = %peer, "connection error: {}", e);
            }
        });
    }
}

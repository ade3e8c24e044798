//! Dev server: static files plus live-reload push
//!
//! Serves the destination root and exposes a server-sent-events endpoint at
//! `/__pipewright/events`. Each connected browser holds a broadcast
//! receiver; when a pipeline completes, the hub's event is fanned out and
//! the client script either reloads the page or swaps stylesheets in place.
//! Disconnected clients are pruned by the broadcast channel on the next
//! send, so there is no client registry to maintain.

use crate::reload::ReloadHub;
use axum::{
    extract::State,
    http::header,
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Error starting or running the dev server
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Invalid bind address
    #[error("invalid listen address '{0}': {1}")]
    Addr(String, std::net::AddrParseError),
    /// Could not bind or serve
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dev server settings
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory served as the site root
    pub dest_root: PathBuf,
    /// Host to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

/// Browser-side live-reload client, served at `/__pipewright/client.js`.
///
/// Connects to the SSE endpoint; `refresh` events re-query stylesheet
/// links with a cache buster, everything else reloads the page.
const CLIENT_JS: &str = r#"(function () {
  var source = new EventSource('/__pipewright/events');
  source.onmessage = function (message) {
    var event = JSON.parse(message.data);
    if (event.kind === 'refresh') {
      document.querySelectorAll('link[rel="stylesheet"]').forEach(function (link) {
        var href = link.href.replace(/[?&]__pw=\d+/, '');
        link.href = href + (href.indexOf('?') < 0 ? '?' : '&') + '__pw=' + event.timestamp_ms;
      });
    } else {
      location.reload();
    }
  };
})();
"#;

/// Build the router: reload endpoints first, static fallback last.
pub fn create_router(options: &ServerOptions, hub: ReloadHub) -> Router {
    Router::new()
        .route("/__pipewright/events", get(events_handler))
        .route("/__pipewright/client.js", get(client_js))
        .with_state(hub)
        .fallback_service(ServeDir::new(&options.dest_root))
        .layer(TraceLayer::new_for_http())
}

async fn client_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], CLIENT_JS)
}

async fn events_handler(
    State(hub): State<ReloadHub>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = hub.subscribe();

    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(&event)
                .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e));
            Ok(Event::default().data(data))
        });

    Sse::new(stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(15)).text("ping"),
    )
}

/// Serve until the shutdown future resolves.
pub async fn serve(
    options: ServerOptions,
    hub: ReloadHub,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", options.host, options.port)
        .parse()
        .map_err(|e| ServerError::Addr(format!("{}:{}", options.host, options.port), e))?;

    let app = create_router(&options, hub);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, root = %options.dest_root.display(), "dev server listening");
    println!("Serving {} at http://{}", options.dest_root.display(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Run the server on its own runtime until Ctrl+C.
///
/// Blocks the calling thread; used by the `watch` command alongside the
/// synchronous watch session.
pub fn run_blocking(options: ServerOptions, hub: ReloadHub) -> Result<(), ServerError> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(options, hub, async {
        let _ = tokio::signal::ctrl_c().await;
        println!();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ExecutionResult;
    use crate::reload::ReloadEvent;
    use std::fs;
    use tempfile::TempDir;

    fn options(temp: &TempDir, port: u16) -> ServerOptions {
        ServerOptions {
            dest_root: temp.path().to_path_buf(),
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                    .as_bytes(),
            )
            .await
            .unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[tokio::test]
    async fn test_serves_static_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<h1>hello</h1>").unwrap();

        let hub = ReloadHub::new();
        let opts = options(&temp, 0);
        let app = create_router(&opts, hub);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = http_get(addr, "/index.html").await;
        assert!(body.contains("<h1>hello</h1>"));
    }

    #[tokio::test]
    async fn test_client_script_served() {
        let temp = TempDir::new().unwrap();
        let hub = ReloadHub::new();
        let opts = options(&temp, 0);
        let app = create_router(&opts, hub);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let body = http_get(addr, "/__pipewright/client.js").await;
        assert!(body.contains("EventSource"));
    }

    #[tokio::test]
    async fn test_sse_delivers_reload_event() {
        let temp = TempDir::new().unwrap();
        let hub = ReloadHub::new();
        let opts = options(&temp, 0);
        let app = create_router(&opts, hub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Open the SSE stream, then emit an event once connected
        let connect = tokio::net::TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = connect;
        stream
            .write_all(b"GET /__pipewright/events HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n")
            .await
            .unwrap();

        // Give the server a beat to register the subscriber
        tokio::time::sleep(Duration::from_millis(100)).await;
        hub.emit(ReloadEvent::from_result(&ExecutionResult {
            pipeline: "css".to_string(),
            succeeded: vec![],
            failed: vec![],
            outputs: vec![PathBuf::from("/d/style.css")],
            duration: Duration::ZERO,
        }));

        let mut buf = vec![0u8; 4096];
        let mut collected = String::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(500), stream.read(&mut buf)).await
            {
                Ok(Ok(n)) if n > 0 => {
                    collected.push_str(&String::from_utf8_lossy(&buf[..n]));
                    if collected.contains("refresh") {
                        break;
                    }
                }
                _ => break,
            }
        }

        assert!(collected.contains("text/event-stream"));
        assert!(collected.contains("\"kind\":\"refresh\""));
    }
}

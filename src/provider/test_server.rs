//! Local axum server standing in for provider APIs in tests

use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

/// What the handler sees of an incoming request
#[derive(Debug, Clone)]
pub(crate) struct TestRequest {
    /// Path including the query string
    pub path: String,
    headers: HeaderMap,
}

impl TestRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Handler = dyn Fn(&TestRequest) -> (u16, String) + Send + Sync + 'static;

/// Answers every request with `handler` and counts hits
pub(crate) struct TestServer {
    addr: String,
    hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&TestRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let hits = Arc::new(AtomicUsize::new(0));
        let handler: Arc<Handler> = Arc::new(handler);

        let counter = Arc::clone(&hits);
        let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap| {
            let handler = Arc::clone(&handler);
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let path = uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| uri.path().to_string());

                let (status, body) = handler(&TestRequest { path, headers });
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, [(header::CONTENT_TYPE, "application/json")], body)
            }
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    /// Absolute URL for `path` on this server
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Base URL without a trailing slash
    pub fn base(&self) -> String {
        self.addr.clone()
    }

    /// Number of requests served so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

//! Development server
//!
//! Serves the staging directory and, when livereload is on, runs a second
//! listener on the livereload port:
//! - Static files from the staging directory
//! - `index.html` with the livereload client injected
//! - `/livereload.js` and the `/livereload` WebSocket

mod livereload;
mod watch;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::{lookup_host, TcpListener};
use tokio::sync::{broadcast, watch as signal};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{debug, error, info};

use crate::hybrid::add_livereload_script;

pub use livereload::{livereload_router, ReloadMessage, LIVERELOAD_CLIENT};
pub use watch::{SourceWatcher, WatchFilter};

/// How the dev server is started
#[derive(Debug, Clone)]
pub struct DevServerOptions {
    pub host: String,
    pub port: u16,
    /// Directory served as the site root
    pub root: PathBuf,
    pub livereload: bool,
    pub livereload_port: u16,
    pub open: bool,
}

struct ServerState {
    root: PathBuf,
    /// `(host, port)` of the livereload listener
    livereload: Option<(String, u16)>,
}

pub struct DevServer {
    options: DevServerOptions,
}

impl DevServer {
    pub fn new(options: DevServerOptions) -> Self {
        Self { options }
    }

    /// Bind both listeners and serve them in the background
    pub async fn start(self) -> Result<DevServerHandle> {
        let options = self.options;
        let (reload_tx, _) = broadcast::channel::<ReloadMessage>(16);
        let (shutdown_tx, shutdown_rx) = signal::channel(false);
        let mut tasks = Vec::new();

        let livereload_addr = if options.livereload {
            let listener = bind(&options.host, options.livereload_port).await?;
            let addr = listener.local_addr()?;
            tasks.push(serve(listener, livereload_router(reload_tx.clone()), shutdown_rx.clone()));
            info!("Livereload listening on port {}", addr.port());
            Some(addr)
        } else {
            None
        };

        let state = Arc::new(ServerState {
            root: options.root.clone(),
            livereload: livereload_addr.map(|addr| (options.host.clone(), addr.port())),
        });
        let app = Router::new()
            .route("/", get(serve_index))
            .route("/index.html", get(serve_index))
            .fallback_service(ServeDir::new(&options.root))
            .layer(CorsLayer::permissive())
            .with_state(state);

        let listener = bind(&options.host, options.port).await?;
        let addr = listener.local_addr()?;
        tasks.push(serve(listener, app, shutdown_rx));

        let url = format!("http://{}:{}/", options.host, addr.port());
        info!("Serving {} at {}", options.root.display(), url);

        if options.open {
            if let Err(e) = open_browser(&url) {
                debug!("Failed to open browser: {}", e);
            }
        }

        Ok(DevServerHandle {
            url,
            addr,
            livereload_addr,
            reload_tx,
            shutdown_tx,
            tasks,
        })
    }
}

/// Bind the first usable address for `host`, IPv4 before IPv6.
///
/// Webviews reach the host through IPv4 loopback aliases such as `10.0.2.2`,
/// so `localhost` must not end up on `::1` alone.
async fn bind(host: &str, port: u16) -> Result<TcpListener> {
    let mut addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .with_context(|| format!("Failed to resolve {}", host))?
        .collect();
    addrs.sort_by_key(|addr| !addr.is_ipv4());

    let mut last_error = None;
    for addr in addrs {
        match TcpListener::bind(addr).await {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                debug!("Could not bind {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e).with_context(|| format!("Failed to bind {}:{}", host, port)),
        None => anyhow::bail!("{} did not resolve to any address", host),
    }
}

fn serve(listener: TcpListener, app: Router, mut shutdown: signal::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = result {
            error!("Server error: {}", e);
        }
    })
}

/// A running dev server
pub struct DevServerHandle {
    url: String,
    addr: SocketAddr,
    livereload_addr: Option<SocketAddr>,
    reload_tx: broadcast::Sender<ReloadMessage>,
    shutdown_tx: signal::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl DevServerHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn livereload_addr(&self) -> Option<SocketAddr> {
        self.livereload_addr
    }

    /// Tell connected pages to reload
    pub fn reload(&self, path: Option<String>) {
        // No receivers simply means no page is open.
        let _ = self.reload_tx.send(ReloadMessage::Reload { path });
    }

    pub fn report_error(&self, message: impl Into<String>) {
        let _ = self.reload_tx.send(ReloadMessage::Error {
            message: message.into(),
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadMessage> {
        self.reload_tx.subscribe()
    }

    /// Stop accepting connections and wait for both listeners
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

async fn serve_index(State(state): State<Arc<ServerState>>) -> Response {
    let index_path = state.root.join("index.html");

    match tokio::fs::read_to_string(&index_path).await {
        Ok(content) => {
            let content = match &state.livereload {
                Some((host, port)) => add_livereload_script(&content, host, *port),
                None => content,
            };
            Html(content).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "index.html has not been built").into_response()
        }
        Err(e) => {
            error!("Failed to read {}: {}", index_path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read index.html").into_response()
        }
    }
}

fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd").args(["/C", "start", url]).spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn options(root: PathBuf, livereload: bool) -> DevServerOptions {
        DevServerOptions {
            host: "127.0.0.1".into(),
            port: 0,
            root,
            livereload,
            livereload_port: 0,
            open: false,
        }
    }

    #[tokio::test]
    async fn test_index_gets_livereload_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html><body></body></html>").unwrap();

        let handle = DevServer::new(options(dir.path().to_path_buf(), true)).start().await.unwrap();
        let lr_port = handle.livereload_addr().unwrap().port();

        let response = get(handle.addr(), "/").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(&format!("http://127.0.0.1:{}/livereload.js", lr_port)));

        let client = get(handle.livereload_addr().unwrap(), "/livereload.js").await;
        assert!(client.contains("new WebSocket"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_static_files_without_livereload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html><body></body></html>").unwrap();
        std::fs::create_dir_all(dir.path().join("js")).unwrap();
        std::fs::write(dir.path().join("js/main.js"), "console.log(1);").unwrap();

        let handle = DevServer::new(options(dir.path().to_path_buf(), false)).start().await.unwrap();
        assert!(handle.livereload_addr().is_none());

        assert!(!get(handle.addr(), "/").await.contains("livereload.js"));
        assert!(get(handle.addr(), "/js/main.js").await.contains("console.log(1);"));
        assert!(get(handle.addr(), "/missing.js").await.starts_with("HTTP/1.1 404"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_localhost_binds_ipv4_loopback() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DevServer::new(DevServerOptions {
            host: "localhost".into(),
            ..options(dir.path().to_path_buf(), true)
        })
        .start()
        .await
        .unwrap();

        assert!(handle.addr().is_ipv4());
        assert!(handle.livereload_addr().unwrap().is_ipv4());

        let ipv4_loopback = SocketAddr::from(([127, 0, 0, 1], handle.addr().port()));
        assert!(get(ipv4_loopback, "/missing.js").await.starts_with("HTTP/1.1 404"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_reaches_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let handle = DevServer::new(options(dir.path().to_path_buf(), true)).start().await.unwrap();
        let mut rx = handle.subscribe();

        handle.reload(Some("src/index.html".into()));
        assert_eq!(
            rx.recv().await.unwrap(),
            ReloadMessage::Reload {
                path: Some("src/index.html".into())
            }
        );

        handle.shutdown().await;
    }
}

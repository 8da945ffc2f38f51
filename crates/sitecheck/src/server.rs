//! Static server - serving the site tree and probing readiness
//!
//! The accept loop runs on its own thread with a private runtime, so callers
//! never join it. `stop()` signals graceful shutdown and awaits the listener
//! closing for a bounded time; `Drop` does the same with a blocking wait.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use axum::Router;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::config::ServerSettings;
use crate::error::{CheckError, CheckResult};

const PROBE_INTERVAL: Duration = Duration::from_millis(100);
const STOP_WAIT: Duration = Duration::from_secs(2);
const STOP_POLL: Duration = Duration::from_millis(10);

/// Handle to the running static server
pub struct ServerHandle {
    base_url: String,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    stopped: Option<oneshot::Receiver<()>>,
}

impl ServerHandle {
    /// Serve `root` on the configured host/port and wait until it answers.
    pub async fn start(root: PathBuf, settings: &ServerSettings) -> CheckResult<Self> {
        let bind_addr = resolve(&settings.host, settings.port)?;
        if !root.is_dir() {
            return Err(CheckError::ServerStartup(format!(
                "document root {} is not a directory",
                root.display()
            )));
        }

        let (ready_tx, ready_rx) = oneshot::channel::<std::io::Result<SocketAddr>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (stopped_tx, stopped_rx) = oneshot::channel::<()>();

        std::thread::Builder::new()
            .name("static-server".to_string())
            .spawn(move || serve_on_thread(root, bind_addr, ready_tx, shutdown_rx, stopped_tx))?;

        let addr = ready_rx
            .await
            .map_err(|_| {
                CheckError::ServerStartup("server thread exited before binding".to_string())
            })?
            .map_err(|e| CheckError::ServerStartup(format!("bind {}: {}", bind_addr, e)))?;

        let mut handle = ServerHandle {
            base_url: format!("http://{}:{}", settings.host, addr.port()),
            addr,
            shutdown: Some(shutdown_tx),
            stopped: Some(stopped_rx),
        };

        if let Err(e) = handle.wait_until_ready(settings.startup_timeout()).await {
            handle.stop().await;
            return Err(e);
        }

        info!("Static server ready at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the root URL until the server answers with any HTTP response
    async fn wait_until_ready(&self, timeout: Duration) -> CheckResult<()> {
        let probe_url = format!("{}/", self.base_url);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&probe_url).send().await {
                Ok(resp) => {
                    debug!("Readiness probe answered {} after {} attempt(s)", resp.status(), attempts);
                    return Ok(());
                }
                Err(e) => {
                    // Connection refused is expected while the listener comes up
                    if !e.is_connect() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(PROBE_INTERVAL).await;
        }

        Err(CheckError::ServerHealthCheck(attempts))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Signal shutdown; returns the confirmation channel on the first call only
    fn signal_shutdown(&mut self) -> Option<oneshot::Receiver<()>> {
        let shutdown = self.shutdown.take()?;
        info!("Stopping static server at {}", self.base_url);
        let _ = shutdown.send(());
        self.stopped.take()
    }

    /// Stop the server. Only the first call has any effect.
    pub async fn stop(&mut self) {
        let Some(stopped) = self.signal_shutdown() else {
            return;
        };
        if timeout(STOP_WAIT, stopped).await.is_err() {
            warn!("Static server did not confirm shutdown within {:?}", STOP_WAIT);
        }
    }

    /// Blocking variant of [`stop`](Self::stop) for teardown outside async code
    fn stop_blocking(&mut self) {
        let Some(mut stopped) = self.signal_shutdown() else {
            return;
        };
        let start = Instant::now();
        while start.elapsed() < STOP_WAIT {
            match stopped.try_recv() {
                Err(oneshot::error::TryRecvError::Empty) => std::thread::sleep(STOP_POLL),
                _ => return,
            }
        }
        warn!("Static server did not confirm shutdown within {:?}", STOP_WAIT);
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop_blocking();
    }
}

fn resolve(host: &str, port: u16) -> CheckResult<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| CheckError::ServerStartup(format!("cannot resolve {}:{}", host, port)))
}

fn bind_reusable(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

fn serve_on_thread(
    root: PathBuf,
    bind_addr: SocketAddr,
    ready: oneshot::Sender<std::io::Result<SocketAddr>>,
    shutdown: oneshot::Receiver<()>,
    stopped: oneshot::Sender<()>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match bind_reusable(bind_addr) {
            Ok(l) => l,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let local = match listener.local_addr() {
            Ok(a) => a,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(local));

        // No trace layer: per-request logging stays off
        let app = Router::new().fallback_service(ServeDir::new(root));

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown.await;
            })
            .await;

        if let Err(e) = result {
            warn!("Static server exited with error: {}", e);
        }
    });

    let _ = stopped.send(());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_localhost() {
        let addr = resolve("127.0.0.1", 8000).unwrap();
        assert_eq!(addr.port(), 8000);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_start_rejects_missing_root() {
        let settings = ServerSettings {
            port: 0,
            ..Default::default()
        };
        let result = ServerHandle::start(PathBuf::from("/no/such/site/root"), &settings).await;
        assert!(matches!(result, Err(CheckError::ServerStartup(_))));
    }
}

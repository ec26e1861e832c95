use std::net::{SocketAddr, TcpListener};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use rouille::{Request, Response};

/// In-process HTTP server on an ephemeral port, stopped on drop.
pub(crate) struct StubServer {
    addr: SocketAddr,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StubServer {
    pub(crate) fn start<F>(handler: F) -> anyhow::Result<Self>
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let server = rouille::Server::new("127.0.0.1:0", handler)
            .map_err(|err| anyhow::anyhow!("stub server bind failed: {err}"))?;
        let addr = server.server_addr();
        let (handle, stop) = server.stoppable();
        Ok(Self {
            addr,
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A URL on a port that was just released, so connections are refused.
pub(crate) fn closed_port_url(path: &str) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}{path}"))
}

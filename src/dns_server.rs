use crate::handler::RequestHandler;
use anyhow::Result;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;

const MAX_DATAGRAM: usize = 4096;

/// One bound UDP socket and its receive/answer loop.
pub struct Listener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    handler: Arc<RequestHandler>,
    shutdown: watch::Receiver<bool>,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, handler: Arc<RequestHandler>, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind UDP {}: {}", addr, e))?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr, handler, shutdown })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until the shutdown flag is raised. Per-datagram failures are logged and skipped.
    pub async fn serve(self) {
        let Listener { socket, local_addr, handler, mut shutdown } = self;
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() { break; }
                }
                received = socket.recv_from(&mut buf) => {
                    let (size, src) = match received {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("recv_from failed on {}: {}", local_addr, e);
                            continue;
                        }
                    };
                    match handler.handle_datagram(&buf[..size], src).await {
                        Ok(resp) => {
                            if let Err(e) = socket.send_to(&resp, src).await {
                                tracing::warn!("send_to {} failed on {}: {}", src, local_addr, e);
                            }
                        }
                        Err(e) => tracing::warn!("Failed to answer {} on {}: {}", src, local_addr, e),
                    }
                }
            }
        }
        tracing::info!("Listener on {} stopped", local_addr);
    }
}

pub struct DnsServer {
    listeners: Vec<Listener>,
}

impl DnsServer {
    /// Bind one listener per address. Addresses that fail to bind are logged
    /// and skipped; it is an error only if none could be bound.
    pub async fn bind(addresses: &[String], port: u16, handler: Arc<RequestHandler>, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let mut listeners = Vec::new();
        for address in addresses {
            let ip: IpAddr = match address.parse() {
                Ok(ip) => ip,
                Err(_) => {
                    tracing::error!("Invalid listen address '{}'", address);
                    continue;
                }
            };
            match Listener::bind(SocketAddr::new(ip, port), handler.clone(), shutdown.clone()).await {
                Ok(listener) => {
                    tracing::info!("Listening on UDP {}", listener.local_addr());
                    listeners.push(listener);
                }
                Err(e) => tracing::error!("{}", e),
            }
        }
        if listeners.is_empty() {
            anyhow::bail!("No listen address could be bound");
        }
        Ok(Self { listeners })
    }

    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners.iter().map(Listener::local_addr).collect()
    }

    /// Run every listener on its own task until shutdown.
    pub async fn run(self) -> Result<()> {
        let tasks: Vec<_> = self.listeners.into_iter().map(|l| tokio::spawn(l.serve())).collect();
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                tracing::error!("Listener task failed: {}", e);
            }
        }
        Ok(())
    }
}

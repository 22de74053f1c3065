use anyhow::{Context, Result, anyhow};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpSocket};
use tracing::{info, warn};

use crate::config::NetworkConfig;
use crate::http::connection::Dispatcher;
use crate::server::pool::ServerState;

/// Backoff before re-arming the listener after a failed accept.
const ACCEPT_RETRY: Duration = Duration::from_millis(200);

/// Binds the single listening socket: IPv4 or IPv6, never both.
pub async fn bind(net: &NetworkConfig) -> Result<TcpListener> {
    let ip: IpAddr = match &net.interface {
        Some(iface) => {
            let mut addrs = tokio::net::lookup_host((iface.as_str(), net.port))
                .await
                .with_context(|| format!("Error resolving the interface '{iface}'"))?;
            addrs
                .find(|a| a.is_ipv6() == net.ipv6)
                .map(|a| a.ip())
                .ok_or_else(|| anyhow!("No matching address for interface '{iface}'"))?
        }
        None if net.ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };

    let socket = if net.ipv6 {
        TcpSocket::new_v6()
    } else {
        TcpSocket::new_v4()
    }
    .context("Error creating the socket")?;

    socket
        .set_reuseaddr(true)
        .context("Error setting options on the socket")?;
    socket
        .bind(SocketAddr::new(ip, net.port))
        .context("Error binding the socket")?;

    socket.listen(net.listen).context("Error listening on the socket")
}

/// Binds per the network config and runs the accept dispatcher.
pub async fn run(
    net: &NetworkConfig,
    state: Arc<ServerState>,
    dispatcher: Arc<dyn Dispatcher>,
) -> Result<()> {
    let listener = bind(net).await?;
    serve(listener, state, dispatcher).await
}

/// The accept dispatcher: accepts connections and hands them to the pool.
///
/// Admission failures (max clients reached, worker creation failed) drop
/// the socket without a response; accept failures back off briefly so a
/// transient error cannot hot-loop the listener.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ServerState>,
    dispatcher: Arc<dyn Dispatcher>,
) -> Result<()> {
    info!("Listening on {}", listener.local_addr()?);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let peer = peer.ip().to_string();

                let stream = match stream.into_std() {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Failed to detach accepted socket");
                        continue;
                    }
                };

                if let Err(e) = state.assign(stream, peer.clone(), &dispatcher) {
                    warn!(peer = %peer, error = %e, "Connection dropped");
                }
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(ACCEPT_RETRY).await;
            }
        }
    }
}

use std::{io::ErrorKind, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{net::UdpSocket, time};

use service::{Service, ServiceOptions, Transport};

use crate::{config::Config, observer::Observer};

/// The outbound half of the single shared socket. Sends never block; a
/// full buffer drops the datagram and refresh repairs the loss.
#[derive(Clone)]
pub struct SocketTransport(Arc<UdpSocket>);

impl Transport for SocketTransport {
    fn send(&self, bytes: &[u8], target: SocketAddr) -> std::io::Result<usize> {
        self.0.try_send_to(bytes, target)
    }
}

/// Bind the socket and run the dispatcher until the process dies.
///
/// One task services everything: inbound datagrams, the S2S refresh tick
/// and the user keepalive reaper, so routing-core operations never
/// interleave.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let socket = Arc::new(UdpSocket::bind(config.listen).await?);
    log::info!(
        "listening on {} with {} peer(s)",
        config.listen,
        config.peers.len()
    );

    let service = Service::new(ServiceOptions {
        local: config.listen,
        peers: config.peers.clone(),
        keepalive: Duration::from_secs(config.runtime.keepalive),
        transport: SocketTransport(socket.clone()),
        observer: Observer,
    });

    let mut router = service.router();
    let mut buf = vec![0u8; 4096];
    let mut refresh = time::interval(Duration::from_secs(config.runtime.refresh_interval));
    let mut reaper = time::interval(Duration::from_secs(config.runtime.keepalive));

    loop {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                match result {
                    Ok((size, source)) => router.route(&buf[..size], source),
                    // A peer shutting down surfaces here on some
                    // platforms; the socket itself is still fine.
                    Err(e) if e.kind() == ErrorKind::ConnectionReset => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            _ = refresh.tick() => service.renew(),
            _ = reaper.tick() => service.reap(),
        }
    }
}

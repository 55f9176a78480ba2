//! NAT pinger strategies.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::eventbus::EventBus;
use crate::events::NatEvent;
use crate::nat::NatError;

const PUNCH_PACKETS: usize = 5;
const PUNCH_INTERVAL: Duration = Duration::from_millis(20);
const PUNCH_PAYLOAD: &[u8] = b"continuously pinging";

#[async_trait]
pub trait NatPinger: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a path to `peer` through the local NAT.
    async fn ping_peer(&self, peer: SocketAddr, ttl: u32) -> Result<(), NatError>;

    fn stop(&self);
}

/// Pick the implementation from the `experimental_nat_punching` option.
pub fn pinger_for(experimental: bool, bus: EventBus) -> Arc<dyn NatPinger> {
    if experimental {
        Arc::new(HolePunchingPinger::new(bus))
    } else {
        Arc::new(NoopPinger)
    }
}

/// Sends a short burst of low-TTL datagrams so the NAT opens a mapping.
pub struct HolePunchingPinger {
    bus: EventBus,
    stopped: AtomicBool,
}

impl HolePunchingPinger {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            stopped: AtomicBool::new(false),
        }
    }

    async fn punch(&self, peer: SocketAddr, ttl: u32) -> Result<(), NatError> {
        let bind: SocketAddr = if peer.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.set_ttl(ttl)?;

        for _ in 0..PUNCH_PACKETS {
            if self.stopped.load(Ordering::SeqCst) {
                return Err(NatError::Stopped);
            }
            socket.send_to(PUNCH_PAYLOAD, peer).await?;
            tokio::time::sleep(PUNCH_INTERVAL).await;
        }
        Ok(())
    }
}

#[async_trait]
impl NatPinger for HolePunchingPinger {
    fn name(&self) -> &'static str {
        "hole-punching"
    }

    async fn ping_peer(&self, peer: SocketAddr, ttl: u32) -> Result<(), NatError> {
        let result = self.punch(peer, ttl).await;
        match &result {
            Ok(()) => self.bus.publish(NatEvent::success(NatEvent::STAGE_HOLE_PUNCHING)),
            Err(e) => self.bus.publish(NatEvent::failure(NatEvent::STAGE_HOLE_PUNCHING, e)),
        }
        result
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPinger;

#[async_trait]
impl NatPinger for NoopPinger {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn ping_peer(&self, _peer: SocketAddr, _ttl: u32) -> Result<(), NatError> {
        Ok(())
    }

    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_punch_reaches_local_peer() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bus = EventBus::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let e = events.clone();
        bus.subscribe(move |event: NatEvent| e.lock().unwrap().push(event)).unwrap();

        let pinger = HolePunchingPinger::new(bus);
        pinger.ping_peer(peer.local_addr().unwrap(), 64).await.unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], PUNCH_PAYLOAD);
        assert!(events.lock().unwrap()[0].successful);
    }

    #[tokio::test]
    async fn test_stopped_pinger_fails() {
        let pinger = HolePunchingPinger::new(EventBus::new());
        pinger.stop();
        let err = pinger.ping_peer("127.0.0.1:9".parse().unwrap(), 8).await.unwrap_err();
        assert!(matches!(err, NatError::Stopped));
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(pinger_for(true, EventBus::new()).name(), "hole-punching");
        assert_eq!(pinger_for(false, EventBus::new()).name(), "noop");
    }
}

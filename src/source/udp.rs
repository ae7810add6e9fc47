//! Datagram order source.
//!
//! Owns a single-threaded tokio runtime that is driven from the producer
//! thread. Each poll waits at most `poll_timeout` for one datagram, which
//! bounds how long the producer can go without checking for shutdown.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::net::UdpSocket;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, trace, warn};

use crate::error::SourceError;
use crate::source::packet::{OrderPacket, PACKET_LEN};
use crate::source::{OrderSource, SourcePoll};

/// Receive buffer size; anything longer than a packet is rejected anyway
const RECV_BUF_LEN: usize = 64;

pub struct UdpSource {
    runtime: Runtime,
    socket: UdpSocket,
    poll_timeout: Duration,
    buf: [u8; RECV_BUF_LEN],
    rejected: u64,
    /// Receive errors since the last successful datagram
    recv_errors: u64,
}

impl UdpSource {
    /// Bind the listening socket.
    pub fn bind(addr: SocketAddr, poll_timeout: Duration) -> Result<Self, SourceError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let socket = runtime.block_on(UdpSocket::bind(addr))?;
        info!(
            local = %socket.local_addr()?,
            packet_len = PACKET_LEN,
            "listening for order packets"
        );

        Ok(Self {
            runtime,
            socket,
            poll_timeout,
            buf: [0u8; RECV_BUF_LEN],
            rejected: 0,
            recv_errors: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Datagrams dropped because they failed to decode
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Consecutive receive errors; reset by the next datagram
    pub fn recv_errors(&self) -> u64 {
        self.recv_errors
    }

    /// Wait one poll period, then report idle. Only the first error of a
    /// streak is logged at `warn`.
    fn recv_failed(&mut self, err: io::Error) -> SourcePoll {
        self.recv_errors += 1;
        if self.recv_errors == 1 {
            warn!(error = %err, "datagram receive failed");
        } else {
            debug!(error = %err, consecutive = self.recv_errors, "datagram receive failed");
        }

        let poll_timeout = self.poll_timeout;
        self.runtime.block_on(async { tokio::time::sleep(poll_timeout).await });
        SourcePoll::Idle
    }
}

impl OrderSource for UdpSource {
    fn poll_next(&mut self) -> SourcePoll {
        let received = {
            let Self {
                runtime,
                socket,
                poll_timeout,
                buf,
                ..
            } = self;
            runtime.block_on(async {
                tokio::time::timeout(*poll_timeout, socket.recv_from(&mut buf[..])).await
            })
        };

        let (len, peer) = match received {
            Ok(Ok(datagram)) => datagram,
            Ok(Err(err)) => return self.recv_failed(err),
            // Timed out; let the producer check for shutdown
            Err(_) => return SourcePoll::Idle,
        };
        self.recv_errors = 0;

        let decoded = OrderPacket::decode(&self.buf[..len])
            .and_then(|packet| packet.to_new_order().map(|order| (packet, order)));

        match decoded {
            Ok((packet, order)) => {
                let wire_latency_ns = Utc::now()
                    .timestamp_nanos_opt()
                    .map(|now| now - packet.timestamp_ns);
                trace!(
                    %peer,
                    sender_order_id = packet.order_id,
                    ?wire_latency_ns,
                    "order packet"
                );
                SourcePoll::Ready(order)
            }
            Err(err) => {
                self.rejected += 1;
                warn!(%peer, error = %err, "rejected order packet");
                SourcePoll::Idle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{NewOrder, Side};
    use crate::source::packet::SIDE_BUY;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn poll_until_settled(source: &mut UdpSource) -> SourcePoll {
        for _ in 0..50 {
            match source.poll_next() {
                SourcePoll::Idle => continue,
                other => return other,
            }
        }
        SourcePoll::Idle
    }

    #[test]
    fn test_idle_on_timeout() {
        let mut source = UdpSource::bind(loopback(), Duration::from_millis(5)).unwrap();
        assert_eq!(source.poll_next(), SourcePoll::Idle);
    }

    #[test]
    fn test_receive_error_waits_one_poll_period() {
        let poll_timeout = Duration::from_millis(30);
        let mut source = UdpSource::bind(loopback(), poll_timeout).unwrap();

        for streak in 1..=3 {
            let started = std::time::Instant::now();
            let err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
            assert_eq!(source.recv_failed(err), SourcePoll::Idle);
            assert!(started.elapsed() >= poll_timeout);
            assert_eq!(source.recv_errors(), streak);
        }
    }

    #[test]
    fn test_datagram_resets_error_streak() {
        let mut source = UdpSource::bind(loopback(), Duration::from_millis(20)).unwrap();
        let target = source.local_addr().unwrap();
        source.recv_failed(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(source.recv_errors(), 1);

        let sender = std::net::UdpSocket::bind(loopback()).unwrap();
        sender.send_to(&[1, 2, 3], target).unwrap();

        for _ in 0..50 {
            source.poll_next();
            if source.rejected() == 1 {
                assert_eq!(source.recv_errors(), 0);
                return;
            }
        }
        panic!("datagram never arrived");
    }

    #[test]
    fn test_receives_packet() {
        let mut source = UdpSource::bind(loopback(), Duration::from_millis(20)).unwrap();
        let target = source.local_addr().unwrap();

        let sender = std::net::UdpSocket::bind(loopback()).unwrap();
        let packet = OrderPacket {
            order_id: 9,
            quantity: 50,
            price: 10_000,
            side: SIDE_BUY,
            timestamp_ns: 0,
        };
        sender.send_to(&packet.encode(), target).unwrap();

        assert_eq!(
            poll_until_settled(&mut source),
            SourcePoll::Ready(NewOrder::new(Side::Buy, 10_000, 50))
        );
    }

    #[test]
    fn test_rejects_short_datagram() {
        let mut source = UdpSource::bind(loopback(), Duration::from_millis(20)).unwrap();
        let target = source.local_addr().unwrap();

        let sender = std::net::UdpSocket::bind(loopback()).unwrap();
        sender.send_to(&[1, 2, 3], target).unwrap();

        for _ in 0..50 {
            assert_eq!(source.poll_next(), SourcePoll::Idle);
            if source.rejected() == 1 {
                return;
            }
        }
        panic!("short datagram was never rejected");
    }
}

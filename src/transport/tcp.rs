//! Framed-TCP transport backend (spec.md §4.2 fallback framing: 4-byte
//! big-endian length prefix). Always available, no external SCTP stack
//! required.
//!
//! Each accepted or dialed connection gets a reader task and a writer task,
//! following the `webrtc-sctp` association's `read_loop`/`write_loop` split:
//! the reader drains framed PDUs and watches a heartbeat ticker, the writer
//! drains an outbound channel and serializes to the socket. Neither task
//! ever holds a lock across the other's I/O.

use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::heartbeat::HeartbeatTracker;
use super::{Association, CloseCause, TransportError};

const CHANNEL_DEPTH: usize = 128;

pub struct TcpAcceptor {
  listener: TcpListener,
  heartbeat_interval: Duration,
  heartbeat_misses_to_dead: u32,
}

impl TcpAcceptor {
  pub async fn bind(
    addr: &str,
    heartbeat_interval: Duration,
    heartbeat_misses_to_dead: u32,
  ) -> std::io::Result<Self> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("[tcp] listening on {addr}");
    Ok(Self {
      listener,
      heartbeat_interval,
      heartbeat_misses_to_dead,
    })
  }

  /// The address actually bound, useful when `bind_addr` asked for an
  /// ephemeral port (e.g. `127.0.0.1:0` in tests).
  pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
    self.listener.local_addr()
  }

  /// Blocks until a peer connects, then spawns its reader/writer tasks.
  pub async fn accept(&self) -> std::io::Result<Association> {
    let (stream, peer_addr) = self.listener.accept().await?;
    log::debug!("[tcp] accepted association from {peer_addr}");
    Ok(spawn_association(
      stream,
      peer_addr.to_string(),
      self.heartbeat_interval,
      self.heartbeat_misses_to_dead,
    ))
  }
}

/// Open an outbound association to `addr`.
pub async fn dial(
  addr: &str,
  heartbeat_interval: Duration,
  heartbeat_misses_to_dead: u32,
) -> Result<Association, TransportError> {
  let stream = TcpStream::connect(addr).await?;
  let peer_addr = stream
    .peer_addr()
    .map(|a| a.to_string())
    .unwrap_or_else(|_| addr.to_owned());
  log::debug!("[tcp] dialed association to {peer_addr}");
  Ok(spawn_association(
    stream,
    peer_addr,
    heartbeat_interval,
    heartbeat_misses_to_dead,
  ))
}

fn spawn_association(
  stream: TcpStream,
  peer_addr: String,
  heartbeat_interval: Duration,
  heartbeat_misses_to_dead: u32,
) -> Association {
  let framed = Framed::new(stream, LengthDelimitedCodec::new());
  let (mut sink, mut source) = framed.split();

  let (outbound_tx, mut outbound_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
  let (inbound_tx, inbound_rx) = mpsc::channel::<Bytes>(CHANNEL_DEPTH);
  let (closed_tx, closed_rx) = mpsc::channel::<CloseCause>(1);

  let reader_name = peer_addr.clone();
  let reader_closed_tx = closed_tx.clone();
  tokio::spawn(async move {
    let mut hb = HeartbeatTracker::new(heartbeat_interval, heartbeat_misses_to_dead);
    let mut ticker = tokio::time::interval(heartbeat_interval);
    loop {
      tokio::select! {
        frame = source.next() => {
          match frame {
            Some(Ok(bytes)) => {
              hb.note_activity();
              if inbound_tx.send(bytes.freeze()).await.is_err() {
                break;
              }
            }
            Some(Err(e)) => {
              log::warn!("[{reader_name}] framing error: {e}");
              let _ = reader_closed_tx.send(CloseCause::NetworkError(e.to_string())).await;
              break;
            }
            None => {
              log::debug!("[{reader_name}] peer closed association");
              let _ = reader_closed_tx.send(CloseCause::PeerClosed).await;
              break;
            }
          }
        }
        _ = ticker.tick() => {
          if hb.tick() {
            log::warn!("[{reader_name}] heartbeat timeout, declaring association dead");
            let _ = reader_closed_tx.send(CloseCause::HeartbeatTimeout).await;
            break;
          }
        }
      }
    }
    log::debug!("[{reader_name}] reader task exited");
  });

  let writer_name = peer_addr.clone();
  tokio::spawn(async move {
    while let Some(pdu) = outbound_rx.recv().await {
      if let Err(e) = sink.send(pdu).await {
        log::warn!("[{writer_name}] send failed: {e}");
        let _ = closed_tx.send(CloseCause::NetworkError(e.to_string())).await;
        break;
      }
    }
    log::debug!("[{writer_name}] writer task exited");
  });

  Association::new(peer_addr, outbound_tx, inbound_rx, closed_rx)
}

//! TCP front end: accepts clients, routes their control requests to a
//! session and writes events back as JSON lines.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use neurofeed::AreaLayout;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, RwLock};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

use crate::channel::{BroadcastChannel, ChannelError, ConnectionChannel, SubscriberChannel};
use crate::config::{ChannelMode, DaemonConfig};
use crate::protocol::{ConnectInfo, Inbound, Outbound, CONNECTION_ALREADY_ACTIVE, MAX_LINE_BYTES};
use crate::session::FeedSession;

/// Frames a slow broadcast subscriber may fall behind before it skips ahead.
const BROADCAST_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("framing error: {0}")]
    Codec(#[from] LinesCodecError),
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// The single session every client drives in broadcast mode.
struct Shared {
    session: RwLock<FeedSession>,
    frames: BroadcastChannel,
}

pub struct Server {
    config: DaemonConfig,
    layout: Arc<AreaLayout>,
    shared: Option<Shared>,
    clients: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

/// Counts a live client until dropped.
struct ClientSlot(Arc<AtomicUsize>);

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Server {
    pub fn new(config: DaemonConfig) -> Self {
        let layout = Arc::new(AreaLayout::default());
        let shared = match config.channel_mode {
            ChannelMode::PerConnection => None,
            ChannelMode::Broadcast => {
                let frames = BroadcastChannel::new(BROADCAST_CAPACITY);
                let session = FeedSession::new(
                    0,
                    Arc::new(frames.clone()),
                    Arc::clone(&layout),
                    config.simulation.clone(),
                );
                Some(Shared {
                    session: RwLock::new(session),
                    frames,
                })
            }
        };

        Self {
            config,
            layout,
            shared,
            clients: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::SeqCst)
    }

    fn try_acquire_slot(&self) -> Option<ClientSlot> {
        let limit = self.config.max_clients.unwrap_or(usize::MAX);
        self.clients
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then(|| n + 1)
            })
            .ok()
            .map(|_| ClientSlot(Arc::clone(&self.clients)))
    }

    /// Accepts clients until the listener fails.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            info!("Client connected: {}", addr);
            let server = Arc::clone(&self);

            tokio::spawn(async move {
                if let Err(e) = server.handle_client(stream, addr).await {
                    error!("Client handler error ({}): {}", addr, e);
                }
                info!("Client disconnected: {} ({} active)", addr, server.client_count());
            });
        }
    }

    async fn handle_client(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
        let (mut sink, mut lines) = framed.split();

        let Some(_slot) = self.try_acquire_slot() else {
            warn!("Refusing {}: client limit reached", addr);
            sink.send(Outbound::disconnect(CONNECTION_ALREADY_ACTIVE).to_line()?)
                .await?;
            return Ok(());
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (direct, direct_rx) = ConnectionChannel::new();
        let direct = Arc::new(direct);
        let frames_rx = self.shared.as_ref().map(|s| {
            let rx = s.frames.subscribe();
            debug!("Broadcast subscribers: {}", s.frames.subscriber_count());
            rx
        });

        direct.send(&Outbound::Connect(ConnectInfo {
            session_id: id,
            mode: self.config.channel_mode,
        }))?;

        let writer = tokio::spawn(async move {
            let mut direct_rx = direct_rx;
            let mut frames_rx = frames_rx;
            loop {
                let line: String = tokio::select! {
                    msg = direct_rx.recv() => match msg {
                        Some(line) => line,
                        None => break,
                    },
                    frame = next_broadcast(&mut frames_rx) => frame.to_string(),
                };
                if let Err(e) = sink.send(line).await {
                    debug!("Write to client failed: {}", e);
                    break;
                }
            }
        });

        // Per-connection sessions die with the connection, taking their timer along.
        let mut own_session = match self.shared {
            Some(_) => None,
            None => Some(FeedSession::new(
                id,
                direct.clone(),
                Arc::clone(&self.layout),
                self.config.simulation.clone(),
            )),
        };

        let result = self
            .read_requests(&mut lines, &direct, own_session.as_mut())
            .await;

        drop(own_session);
        writer.abort();
        result
    }

    async fn read_requests<S>(
        &self,
        lines: &mut S,
        direct: &Arc<ConnectionChannel>,
        mut own_session: Option<&mut FeedSession>,
    ) -> Result<(), ServerError>
    where
        S: futures::Stream<Item = Result<String, LinesCodecError>> + Unpin,
    {
        let mut recovering = false;
        loop {
            let line = match lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("Dropping oversized message");
                    direct.send(&Outbound::error("Message too long"))?;
                    recovering = true;
                    continue;
                }
                Some(Err(e)) => return Err(e.into()),
                // The framed reader yields one `None` after a decode error
                // even though the socket is still open.
                None if recovering => {
                    recovering = false;
                    continue;
                }
                None => break,
            };
            recovering = false;
            if line.trim().is_empty() {
                continue;
            }

            let reply = match Inbound::parse(&line) {
                Ok(request) => match (own_session.as_deref_mut(), &self.shared) {
                    (Some(session), _) => session.handle(request),
                    (None, Some(shared)) => shared.session.write().await.handle(request),
                    (None, None) => Outbound::error("No session available"),
                },
                Err(e) => {
                    warn!("Protocol error: {}", e);
                    Outbound::error(e.to_string())
                }
            };

            if direct.send(&reply).is_err() {
                // Writer is gone; the peer cannot hear us any more.
                break;
            }
        }
        Ok(())
    }
}

/// Next broadcast line; never resolves without a subscription.
async fn next_broadcast(rx: &mut Option<broadcast::Receiver<Arc<str>>>) -> Arc<str> {
    let Some(inner) = rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match inner.recv().await {
            Ok(line) => return line,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Client lagging; dropped {} broadcast events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
        }
    }
}

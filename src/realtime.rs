use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::protocol::{keepalive_message, reconcile_message, CLOSE_COMMAND};
use crate::{InfinityClient, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type FrameHandler = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(55);

/// Exponential backoff for reconnecting the socket.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub keepalive_interval: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// `delay = min(initial * 2^attempt, max)` with +-25% deterministic jitter.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(31) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter_factor = 1.0 + 0.25 * ((attempt as f64 * 7.3).sin());
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

/// Write half of the current socket. Empty while disconnected.
#[derive(Clone, Default)]
pub struct RealtimeSender {
    sink: Arc<tokio::sync::Mutex<Option<WsSink>>>,
}

impl RealtimeSender {
    async fn attach(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
    }

    async fn close(&self) {
        if let Some(mut sink) = self.sink.lock().await.take()
            && let Err(e) = sink.close().await
        {
            debug!(error = %e, "error closing realtime socket");
        }
    }

    pub async fn is_open(&self) -> bool {
        self.sink.lock().await.is_some()
    }

    /// Sends `message` as a text frame. `Ok(false)` when no socket is open.
    pub async fn send_json(&self, message: &Value) -> Result<bool> {
        let mut guard = self.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return Ok(false);
        };
        sink.send(Message::Text(message.to_string().into())).await?;
        Ok(true)
    }

    pub async fn reconcile(&self) -> Result<bool> {
        self.send_json(&reconcile_message()).await
    }

    pub async fn keepalive(&self) -> Result<bool> {
        self.send_json(&keepalive_message()).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

#[derive(Default)]
struct HandlerRegistry {
    next_id: u64,
    entries: Vec<(HandlerId, FrameHandler)>,
}

struct ChannelInner {
    client: InfinityClient,
    config: RealtimeConfig,
    handlers: RwLock<HandlerRegistry>,
    sender: RealtimeSender,
    keepalive: Mutex<Option<CancellationToken>>,
}

#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl RealtimeChannel {
    pub fn new(client: InfinityClient, config: RealtimeConfig) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                client,
                config,
                handlers: RwLock::new(HandlerRegistry::default()),
                sender: RealtimeSender::default(),
                keepalive: Mutex::new(None),
            }),
        }
    }

    /// Registers a frame handler. An `Err` from a handler is logged and
    /// delivery moves on to the next one.
    pub fn add_handler(&self, handler: impl Fn(&str) -> Result<()> + Send + Sync + 'static) -> HandlerId {
        let mut registry = self.inner.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let id = HandlerId(registry.next_id);
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(handler)));
        id
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut registry = self.inner.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let before = registry.entries.len();
        registry.entries.retain(|(h, _)| *h != id);
        registry.entries.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn sender(&self) -> RealtimeSender {
        self.inner.sender.clone()
    }

    /// Delivers one frame to every handler, in registration order.
    pub fn dispatch(&self, frame: &str) {
        let handlers: Vec<(HandlerId, FrameHandler)> = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();
        for (id, handler) in handlers {
            if let Err(e) = handler(frame) {
                warn!(handler = id.0, error = %e, "realtime handler failed");
            }
        }
    }

    /// Stops the keep-alive of the current connection, leaving the
    /// listener running. The next connection starts a new one.
    pub fn stop_keepalive(&self) {
        if let Some(token) = self.inner.keepalive.lock().unwrap_or_else(PoisonError::into_inner).take() {
            token.cancel();
        }
    }

    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move { channel.run(cancel).await })
    }

    /// Connect, listen, reconnect. Returns only once `cancel` fires or the
    /// retry limit is hit.
    pub async fn run(&self, cancel: CancellationToken) {
        let reconnect = &self.inner.config.reconnect;
        let mut attempt: u32 = 0;

        loop {
            let connection_id = Uuid::new_v4();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.listen(connection_id, &cancel) => result,
            };
            if cancel.is_cancelled() {
                break;
            }

            match result {
                Ok(()) => {
                    info!(%connection_id, "realtime socket closed, reconnecting");
                    attempt = 0;
                }
                Err(e) => {
                    warn!(%connection_id, error = %e, attempt, "realtime connection failed");
                    if let Some(max) = reconnect.max_retries
                        && attempt >= max
                    {
                        error!(max_retries = max, "realtime reconnection limit reached, giving up");
                        break;
                    }
                }
            }

            let delay = calculate_backoff(attempt, reconnect);
            debug!(delay_ms = delay.as_millis() as u64, attempt, "waiting before reconnect");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = attempt.saturating_add(1);
        }

        self.inner.sender.close().await;
        debug!("realtime listener stopped");
    }

    async fn listen(&self, connection_id: Uuid, cancel: &CancellationToken) -> Result<()> {
        let url = self.inner.client.realtime_endpoint().await?;
        debug!(%connection_id, host = url.host_str().unwrap_or_default(), "connecting realtime socket");
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        info!(%connection_id, "realtime socket connected");

        let (sink, mut source) = stream.split();
        self.inner.sender.attach(sink).await;

        let heartbeat = cancel.child_token();
        *self.inner.keepalive.lock().unwrap_or_else(PoisonError::into_inner) = Some(heartbeat.clone());
        let keepalive = tokio::spawn(keepalive_loop(
            self.inner.sender.clone(),
            self.inner.config.keepalive_interval,
            heartbeat.clone(),
            connection_id,
        ));

        let result = self.read_frames(&mut source, connection_id, cancel).await;

        heartbeat.cancel();
        if let Err(e) = keepalive.await {
            debug!(%connection_id, error = %e, "keepalive task ended abnormally");
        }
        self.inner.sender.close().await;
        info!(%connection_id, "realtime socket closed");
        result
    }

    async fn read_frames(&self, source: &mut WsSource, connection_id: Uuid, cancel: &CancellationToken) -> Result<()> {
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                frame = source.next() => frame,
            };
            match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.as_str() == CLOSE_COMMAND {
                        info!(%connection_id, "server asked to close the socket");
                        return Ok(());
                    }
                    trace!(%connection_id, bytes = text.len(), "frame received");
                    self.dispatch(text.as_str());
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(%connection_id, ?frame, "close frame received");
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            }
        }
    }
}

async fn keepalive_loop(sender: RealtimeSender, interval: Duration, cancel: CancellationToken, connection_id: Uuid) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match sender.keepalive().await {
            Ok(true) => debug!(%connection_id, "keepalive sent"),
            Ok(false) => debug!(%connection_id, "keepalive skipped, no socket open"),
            Err(e) => warn!(%connection_id, error = %e, "keepalive failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::Mutex as StdMutex;

    fn channel() -> RealtimeChannel {
        let client = InfinityClient::builder("user", "pass").build().unwrap();
        RealtimeChannel::new(client, RealtimeConfig::default())
    }

    #[test]
    fn default_config() {
        let config = RealtimeConfig::default();
        assert_eq!(config.keepalive_interval, Duration::from_secs(55));
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(1));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(30));
        assert!(config.reconnect.max_retries.is_none());
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = ReconnectConfig::default();
        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);
        assert!(d1 > d0);
        assert!(d2 > d1);
        assert!(calculate_backoff(40, &config) <= Duration::from_secs_f64(37.5));
    }

    #[test]
    fn handlers_run_in_order_and_survive_failures() {
        let channel = channel();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        channel.add_handler(move |frame| {
            s.lock().unwrap().push(format!("a:{frame}"));
            Err(Error::UnknownSystem("X".into()))
        });
        let s = Arc::clone(&seen);
        channel.add_handler(move |frame| {
            s.lock().unwrap().push(format!("b:{frame}"));
            Ok(())
        });

        channel.dispatch("f1");
        assert_eq!(*seen.lock().unwrap(), vec!["a:f1", "b:f1"]);
    }

    #[test]
    fn remove_handler_by_id() {
        let channel = channel();
        let hits = Arc::new(StdMutex::new(0));
        let h = Arc::clone(&hits);
        let id = channel.add_handler(move |_| {
            *h.lock().unwrap() += 1;
            Ok(())
        });
        channel.dispatch("x");
        assert!(channel.remove_handler(id));
        assert!(!channel.remove_handler(id));
        channel.dispatch("x");
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(channel.handler_count(), 0);
    }

    #[tokio::test]
    async fn sender_without_socket_reports_not_sent() {
        let sender = RealtimeSender::default();
        assert!(!sender.is_open().await);
        assert!(!sender.reconcile().await.unwrap());
    }
}

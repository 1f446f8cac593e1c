use std::collections::HashMap;
use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::api::events::ChannelEvent;
use crate::api::stomp::{Frame, HeartBeat, parse_frames};
use crate::error::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Publish/subscribe surface the chat session needs from a realtime connection.
pub trait MessageChannel {
    fn is_connected(&self) -> bool;
    fn subscribe(&self, topic: &str) -> Result<(), ChannelError>;
    fn unsubscribe(&self, topic: &str) -> Result<(), ChannelError>;
    fn publish(&self, destination: &str, body: String) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: Url,
    pub reconnect_delay: Duration,
    pub heart_beat: HeartBeat,
}

#[derive(Debug)]
enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Publish { destination: String, body: String },
    Close,
}

enum SessionEnd {
    Closed,
    Lost(String),
}

/// An owned STOMP-over-WebSocket connection. One background task keeps the
/// connection alive, reconnecting after a fixed delay whenever it drops.
/// Dropping the handle (or calling [`RealtimeChannel::close`]) ends the task.
pub struct RealtimeChannel {
    commands: mpsc::UnboundedSender<Command>,
    connected: watch::Receiver<bool>,
    task: Option<JoinHandle<()>>,
}

impl RealtimeChannel {
    pub fn open(config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(false);
        let task = tokio::spawn(run(config, cmd_rx, event_tx, state_tx));
        (
            Self {
                commands: cmd_tx,
                connected: state_rx,
                task: Some(task),
            },
            event_rx,
        )
    }

    /// Watch the boolean connection state.
    pub fn connection_state(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Send DISCONNECT (when connected) and wait for the task to finish.
    pub async fn close(mut self) {
        let _ = self.commands.send(Command::Close);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn command(&self, command: Command) -> Result<(), ChannelError> {
        self.commands.send(command).map_err(|_| ChannelError::Closed)
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Close);
    }
}

impl MessageChannel for RealtimeChannel {
    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    fn subscribe(&self, topic: &str) -> Result<(), ChannelError> {
        self.command(Command::Subscribe(topic.to_string()))
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), ChannelError> {
        self.command(Command::Unsubscribe(topic.to_string()))
    }

    fn publish(&self, destination: &str, body: String) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected);
        }
        self.command(Command::Publish {
            destination: destination.to_string(),
            body,
        })
    }
}

async fn run(
    config: ChannelConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    state: watch::Sender<bool>,
) {
    loop {
        match connect(&config).await {
            Ok((ws, server_beat)) => {
                state.send_replace(true);
                info!("realtime channel connected to {}", config.url);
                let _ = events.send(ChannelEvent::Connected);

                let outgoing = HeartBeat::negotiate(config.heart_beat, server_beat);
                let end = session(ws, outgoing, &mut commands, &events).await;
                state.send_replace(false);
                match end {
                    SessionEnd::Closed => {
                        info!("realtime channel disconnected");
                        return;
                    }
                    SessionEnd::Lost(reason) => {
                        warn!("realtime channel lost: {reason}");
                        let _ = events.send(ChannelEvent::Disconnected);
                    }
                }
            }
            Err(e) => warn!("could not connect to {}: {e}", config.url),
        }

        debug!("reconnecting in {:?}", config.reconnect_delay);
        if wait_or_close(&mut commands, config.reconnect_delay).await {
            return;
        }
    }
}

/// Sleep out the reconnect delay. Returns true if the owner closed the channel
/// meanwhile. Commands issued while offline are dropped.
async fn wait_or_close(commands: &mut mpsc::UnboundedReceiver<Command>, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            cmd = commands.recv() => match cmd {
                None | Some(Command::Close) => return true,
                Some(other) => debug!("dropping {other:?} while disconnected"),
            },
        }
    }
}

async fn connect(config: &ChannelConfig) -> Result<(WsStream, HeartBeat), ChannelError> {
    let (mut ws, _) = connect_async(config.url.as_str()).await?;

    let host = match (config.url.host_str(), config.url.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_string(),
        _ => String::from("localhost"),
    };
    send_frame(&mut ws, &Frame::connect(&host, config.heart_beat)).await?;

    let beat = tokio::time::timeout(HANDSHAKE_TIMEOUT, await_connected(&mut ws))
        .await
        .map_err(|_| ChannelError::Handshake)??;
    Ok((ws, beat))
}

async fn await_connected(ws: &mut WsStream) -> Result<HeartBeat, ChannelError> {
    while let Some(msg) = ws.next().await {
        let Some(text) = text_of(msg?) else { continue };
        for frame in parse_frames(&text)? {
            debug!("[STOMP] <<< {}", frame.command);
            match frame.command.as_str() {
                "CONNECTED" => {
                    return Ok(frame
                        .get("heart-beat")
                        .and_then(HeartBeat::parse)
                        .unwrap_or_default());
                }
                "ERROR" => return Err(ChannelError::Broker(error_text(&frame))),
                _ => {}
            }
        }
    }
    Err(ChannelError::Handshake)
}

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> Result<(), ChannelError>
where
    S: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    debug!("[STOMP] >>> {}", frame.command);
    sink.send(WsMessage::Text(frame.encode())).await?;
    Ok(())
}

fn text_of(msg: WsMessage) -> Option<String> {
    match msg {
        WsMessage::Text(text) => Some(text),
        WsMessage::Binary(bytes) => String::from_utf8(bytes).ok(),
        _ => None,
    }
}

fn error_text(frame: &Frame) -> String {
    match (frame.get("message"), frame.body.trim()) {
        (Some(m), "") => m.to_string(),
        (Some(m), body) => format!("{m}: {body}"),
        (None, body) => body.to_string(),
    }
}

async fn session(
    ws: WsStream,
    heartbeat: Option<Duration>,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();
    // topic -> subscription id, for this connection only
    let mut subscriptions: HashMap<String, String> = HashMap::new();
    let mut next_id = 0u64;
    let mut beat = heartbeat.map(|period| {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                let result = match cmd {
                    None | Some(Command::Close) => {
                        let _ = send_frame(&mut sink, &Frame::disconnect()).await;
                        let _ = sink.close().await;
                        return SessionEnd::Closed;
                    }
                    Some(Command::Subscribe(topic)) => {
                        if subscriptions.contains_key(&topic) {
                            continue;
                        }
                        let id = format!("sub-{next_id}");
                        next_id += 1;
                        let frame = Frame::subscribe(&id, &topic);
                        subscriptions.insert(topic, id);
                        send_frame(&mut sink, &frame).await
                    }
                    Some(Command::Unsubscribe(topic)) => match subscriptions.remove(&topic) {
                        Some(id) => send_frame(&mut sink, &Frame::unsubscribe(&id)).await,
                        None => continue,
                    },
                    Some(Command::Publish { destination, body }) => {
                        send_frame(&mut sink, &Frame::send(&destination, body)).await
                    }
                };
                if let Err(e) = result {
                    return SessionEnd::Lost(e.to_string());
                }
            }
            msg = stream.next() => {
                let msg = match msg {
                    None => return SessionEnd::Lost("connection closed".into()),
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    Some(Ok(WsMessage::Close(_))) => return SessionEnd::Lost("closed by server".into()),
                    Some(Ok(msg)) => msg,
                };
                let Some(text) = text_of(msg) else { continue };
                let frames = match parse_frames(&text) {
                    Ok(frames) => frames,
                    Err(e) => {
                        warn!("dropping unparsable STOMP frame: {e}");
                        continue;
                    }
                };
                for frame in frames {
                    debug!("[STOMP] <<< {}", frame.command);
                    match frame.command.as_str() {
                        "MESSAGE" => {
                            if let Some(event) = ChannelEvent::from_message_frame(&frame) {
                                let _ = events.send(event);
                            }
                        }
                        "ERROR" => return SessionEnd::Lost(error_text(&frame)),
                        _ => {}
                    }
                }
            }
            _ = async {
                match beat.as_mut() {
                    Some(interval) => { interval.tick().await; }
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Err(e) = sink.send(WsMessage::Text("\n".into())).await {
                    return SessionEnd::Lost(e.to_string());
                }
            }
        }
    }
}

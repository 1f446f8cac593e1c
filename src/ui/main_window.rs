use std::io::IsTerminal;
use std::path::PathBuf;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::channel::{ChannelConfig, MessageChannel, RealtimeChannel};
use crate::api::client::ApiClient;
use crate::api::events::{ChannelEvent, SEND_DESTINATION, conversation_topic};
use crate::api::models::Message;
use crate::app::ClientConfig;
use crate::error::ClientError;
use crate::identity::Identity;
use crate::storage::ConversationCache;
use crate::store::ChatStore;
use crate::ui::{chat_view, login, sidebar};
use crate::utils::{export_file_name, open_path, websocket_url};

pub const EXPORT_FAILED: &str = "Failed to generate PDF.";
pub const DELETE_PROMPT: &str = "Are you sure you want to delete this conversation? [y/N]";

const SIDEBAR_WIDTH: usize = 32;
const GUTTER: &str = " │ ";

const HELP: &str = "/list  /open <id>  /rename <id> [title]  /delete <id>  /export [id]  /menu <id>  /sidebar  /quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The chat screen: owns the local store and drives every backend call and
/// channel operation the user can trigger.
pub struct MainWindow<C: MessageChannel> {
    pub store: ChatStore,
    api: ApiClient,
    channel: C,
    identity: Identity,
    cache: Option<ConversationCache>,
    downloads_dir: PathBuf,
    open_exports: bool,
    subscribed: Option<i64>,
}

impl<C: MessageChannel> MainWindow<C> {
    pub fn new(api: ApiClient, channel: C, identity: Identity) -> Self {
        Self {
            store: ChatStore::new(),
            api,
            channel,
            identity,
            cache: None,
            downloads_dir: PathBuf::from("."),
            open_exports: false,
            subscribed: None,
        }
    }

    pub fn with_cache(mut self, cache: ConversationCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_exports(mut self, downloads_dir: PathBuf, open_exports: bool) -> Self {
        self.downloads_dir = downloads_dir;
        self.open_exports = open_exports;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Fill the sidebar from the local cache while the list request is in flight.
    pub fn show_cached(&mut self) {
        let Some(cache) = &self.cache else { return };
        match cache.conversations(self.identity.user_id()) {
            Ok(cached) if !cached.is_empty() => self.store.set_conversations(cached),
            Ok(_) => {}
            Err(e) => warn!("conversation cache unavailable: {e}"),
        }
    }

    pub async fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => self.on_connected().await,
            ChannelEvent::Disconnected => self.on_disconnected(),
            ChannelEvent::Snapshot {
                conversation_id,
                messages,
            } => self.on_snapshot(conversation_id, messages),
        }
    }

    /// Start (or resume) the user's conversation, load its history and follow
    /// its topic. Runs again after every reconnect.
    pub async fn on_connected(&mut self) {
        self.store.set_connected(true);
        // subscriptions do not survive a reconnect
        self.subscribed = None;

        let user_id = self.identity.user_id().to_string();
        let conversation_id = match self.api.start_conversation(&user_id).await {
            Ok(id) => id,
            Err(e) => {
                error!("could not start conversation: {e}");
                // keep following whatever was active before the reconnect
                self.follow_active();
                return;
            }
        };

        match self.api.history(&user_id, conversation_id).await {
            Ok(history) => self.store.start_conversation(conversation_id, history),
            Err(e) => {
                warn!("could not fetch history for {conversation_id}: {e}");
                self.store.start_conversation(conversation_id, Vec::new());
            }
        }
        self.follow_active();
    }

    pub fn on_disconnected(&mut self) {
        self.store.set_connected(false);
    }

    pub fn on_snapshot(&mut self, conversation_id: i64, messages: Vec<Message>) {
        if !self.store.apply_snapshot(conversation_id, messages) {
            warn!("ignoring snapshot for inactive conversation {conversation_id}");
        }
    }

    /// Keep exactly one subscription, on the active conversation's topic.
    fn follow_active(&mut self) {
        if self.subscribed == self.store.active {
            return;
        }
        if let Some(old) = self.subscribed.take() {
            if let Err(e) = self.channel.unsubscribe(&conversation_topic(old)) {
                warn!("unsubscribe from {old} failed: {e}");
            }
        }
        if let Some(id) = self.store.active {
            match self.channel.subscribe(&conversation_topic(id)) {
                Ok(()) => self.subscribed = Some(id),
                Err(e) => warn!("subscribe to {id} failed: {e}"),
            }
        }
    }

    /// Send a chat message. Returns whether anything was published; the reply
    /// arrives later as a snapshot.
    pub fn send(&mut self, input: &str) -> bool {
        self.store.set_connected(self.channel.is_connected());
        let Some(payload) = self.store.prepare_send(input, self.identity.publish_id()) else {
            return false;
        };
        let body = match serde_json::to_string(&payload) {
            Ok(body) => body,
            Err(e) => {
                error!("could not encode chat payload: {e}");
                return false;
            }
        };
        match self.channel.publish(SEND_DESTINATION, body) {
            Ok(()) => true,
            Err(e) => {
                warn!("publish failed: {e}");
                self.store.retract_send();
                false
            }
        }
    }

    pub async fn refresh_conversations(&mut self) {
        let user_id = self.identity.user_id();
        match self.api.conversations(user_id).await {
            Ok(list) => {
                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.replace(user_id, &list) {
                        warn!("could not cache conversations: {e}");
                    }
                }
                self.store.set_conversations(list);
            }
            Err(e) => warn!("could not fetch conversations: {e}"),
        }
    }

    pub async fn load(&mut self, id: i64) {
        match self.api.conversation_messages(id).await {
            Ok(messages) => {
                self.store.load_conversation(id, messages);
                self.store.sidebar_open = false;
                self.follow_active();
            }
            Err(e) => warn!("could not load conversation {id}: {e}"),
        }
    }

    /// Leave edit mode, submitting the draft unless it is blank.
    pub async fn commit_rename(&mut self) {
        let Some((id, title)) = self.store.take_rename() else {
            return;
        };
        if let Err(e) = self.api.rename_conversation(id, &title).await {
            warn!("could not rename conversation {id}: {e}");
            return;
        }
        self.refresh_conversations().await;
    }

    pub async fn rename(&mut self, id: i64, title: &str) {
        self.store.begin_rename(id);
        self.store.set_draft(title);
        self.commit_rename().await;
    }

    /// Delete a conversation the user already confirmed.
    pub async fn delete(&mut self, id: i64) {
        if let Err(e) = self.api.delete_conversation(id).await {
            warn!("could not delete conversation {id}: {e}");
            return;
        }
        self.refresh_conversations().await;
        self.store.remove_conversation(id);
        self.follow_active();
    }

    /// Fetch the conversation's PDF, save it under a name derived from its
    /// title and optionally open it.
    pub async fn export(&mut self, id: i64) -> Option<PathBuf> {
        let bytes = match self.api.export_pdf(id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("export of {id} failed: {e}");
                self.store.set_alert(EXPORT_FAILED);
                return None;
            }
        };

        let title = self.store.conversation(id).and_then(|c| c.title.as_deref());
        let path = self.downloads_dir.join(export_file_name(title, id));
        let written = async {
            tokio::fs::create_dir_all(&self.downloads_dir).await?;
            tokio::fs::write(&path, &bytes).await
        }
        .await;
        if let Err(e) = written {
            error!("could not save {}: {e}", path.display());
            self.store.set_alert(EXPORT_FAILED);
            return None;
        }

        info!("exported conversation {id} to {}", path.display());
        self.store.set_notice(format!("Saved {}", path.display()));
        if self.open_exports {
            if let Err(e) = open_path(&path) {
                warn!("could not open {}: {e}", path.display());
            }
        }
        Some(path)
    }

    /// Dispatch one line of terminal input.
    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim_end_matches(['\r', '\n']);

        if self.store.pending_delete.is_some() {
            let confirmed = matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
            if let Some(id) = self.store.confirm_delete(confirmed) {
                self.delete(id).await;
            }
            return Flow::Continue;
        }

        if self.store.editing.is_some() {
            self.store.set_draft(line);
            self.commit_rename().await;
            return Flow::Continue;
        }

        let (command, rest) = match line.strip_prefix('/') {
            Some(cmd) => {
                let (name, rest) = cmd.split_once(' ').unwrap_or((cmd, ""));
                (Some(name), rest.trim())
            }
            None => (None, ""),
        };

        // anything but a menu toggle counts as a click outside the menu
        if command != Some("menu") {
            self.store.close_menu();
        }

        match command {
            None => {
                self.send(line);
            }
            Some("quit") | Some("exit") => return Flow::Quit,
            Some("help") => self.store.set_notice(HELP),
            Some("list") => self.refresh_conversations().await,
            Some("sidebar") => self.store.toggle_sidebar(),
            Some("open") => match parse_id(rest) {
                Some((id, _)) => self.load(id).await,
                None => self.store.set_notice("Usage: /open <id>"),
            },
            Some("menu") => match parse_id(rest) {
                Some((id, _)) => self.store.toggle_menu(id),
                None => self.store.set_notice("Usage: /menu <id>"),
            },
            Some("rename") => match parse_id(rest) {
                Some((id, "")) => self.store.begin_rename(id),
                Some((id, title)) => self.rename(id, title).await,
                None => self.store.set_notice("Usage: /rename <id> [title]"),
            },
            Some("delete") => match parse_id(rest) {
                Some((id, _)) => self.store.request_delete(id),
                None => self.store.set_notice("Usage: /delete <id>"),
            },
            Some("export") => {
                let target = parse_id(rest).map(|(id, _)| id).or(self.store.active);
                match target {
                    Some(id) => {
                        self.export(id).await;
                    }
                    None => self.store.set_notice("No conversation selected."),
                }
            }
            Some(other) => self.store.set_notice(format!("Unknown command /{other}. {HELP}")),
        }
        Flow::Continue
    }

    /// Full screen for the given terminal width.
    pub fn render(&mut self, width: usize, breakpoint: usize) -> Vec<String> {
        let mut lines = login::navbar(Some(&self.identity), width);
        if let Some(alert) = self.store.take_alert() {
            lines.push(format!("! {alert}"));
        }
        if let Some(notice) = self.store.take_notice() {
            lines.push(notice);
        }
        lines.extend(layout(&self.store, width, breakpoint));

        if let Some((id, draft)) = &self.store.editing {
            lines.push(format!("New title for #{id} (empty to cancel) [{draft}]:"));
        } else if self.store.pending_delete.is_some() {
            lines.push(DELETE_PROMPT.to_string());
        }
        lines
    }
}

fn parse_id(rest: &str) -> Option<(i64, &str)> {
    let (id, tail) = rest.split_once(' ').unwrap_or((rest, ""));
    Some((id.parse().ok()?, tail.trim()))
}

/// Sidebar docked beside the chat at or above `breakpoint` columns; below it
/// the sidebar replaces the chat while toggled open.
pub fn layout(store: &ChatStore, width: usize, breakpoint: usize) -> Vec<String> {
    if width >= breakpoint {
        let chat_width = width.saturating_sub(SIDEBAR_WIDTH + GUTTER.chars().count());
        let left = sidebar::render(store, SIDEBAR_WIDTH);
        let right = chat_view::render(store, chat_width);
        let rows = left.len().max(right.len());
        return (0..rows)
            .map(|i| {
                let l = left.get(i).map(String::as_str).unwrap_or("");
                let r = right.get(i).map(String::as_str).unwrap_or("");
                let pad = SIDEBAR_WIDTH.saturating_sub(l.chars().count());
                format!("{l}{}{GUTTER}{r}", " ".repeat(pad)).trim_end().to_string()
            })
            .collect();
    }

    if store.sidebar_open {
        let mut lines = sidebar::render(store, width);
        lines.push(String::new());
        lines.push("(/sidebar to close)".to_string());
        lines
    } else {
        let mut lines = vec!["≡ /sidebar".to_string()];
        lines.extend(chat_view::render(store, width));
        lines
    }
}

/// `COLUMNS` if set to something usable, else 80.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .filter(|w: &usize| *w >= 20)
        .unwrap_or(80)
}

fn draw<C: MessageChannel>(window: &mut MainWindow<C>, breakpoint: usize) {
    let stdout = std::io::stdout();
    if stdout.is_terminal() {
        print!("\x1b[2J\x1b[H");
    }
    for line in window.render(terminal_width(), breakpoint) {
        println!("{line}");
    }
}

/// Run the chat screen until the user quits or stdin closes.
pub async fn run(config: &ClientConfig, identity: Identity) -> Result<(), ClientError> {
    let api = ApiClient::new(&config.api_url, config.request_timeout())?;
    let (channel, mut events) = RealtimeChannel::open(ChannelConfig {
        url: websocket_url(&config.api_url)?,
        reconnect_delay: config.reconnect_delay(),
        heart_beat: config.heart_beat(),
    });

    let mut window = MainWindow::new(api, channel, identity)
        .with_exports(config.downloads_dir(), config.open_exports);
    match ConversationCache::open_default() {
        Ok(cache) => window = window.with_cache(cache),
        Err(e) => warn!("running without conversation cache: {e}"),
    }

    window.show_cached();
    draw(&mut window, config.sidebar_breakpoint);
    window.refresh_conversations().await;
    draw(&mut window, config.sidebar_breakpoint);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if window.handle_line(&line).await == Flow::Quit {
                    break;
                }
            }
            Some(event) = events.recv() => window.handle_event(event).await,
        }
        draw(&mut window, config.sidebar_breakpoint);
    }

    window.into_channel().close().await;
    Ok(())
}

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::{Client, Request};
use tracing::{info, warn};

use crate::http::{build_request, send_json};
use crate::store::SubscriberStore;

/// Delivers one message to one destination.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Short name for logging
    fn kind(&self) -> &'static str;
}

/// Sends through the Telegram Bot API `sendMessage` method with HTML formatting.
pub struct TelegramSender {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramSender {
    pub fn new(client: Client, api_base: &str, bot_token: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    /// `sendMessage` form POST for one destination.
    pub fn request(&self, chat_id: i64, text: &str) -> Result<Request> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let req = self.client.post(url).form(&[
            ("chat_id", chat_id.to_string()),
            ("text", text.to_string()),
            ("parse_mode", "HTML".to_string()),
            ("disable_web_page_preview", "true".to_string()),
        ]);
        build_request(req, "sendMessage")
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        let req = self.request(chat_id, text)?;
        let body = send_json(&self.client, req, "sendMessage").await?;
        if body["ok"].as_bool() != Some(true) {
            anyhow::bail!(
                "sendMessage: API returned ok=false: {}",
                body["description"].as_str().unwrap_or("no description")
            );
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "telegram"
    }
}

/// Logs messages instead of sending them. Used for dry runs and when no bot
/// token is configured.
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<()> {
        info!(chat_id, "[dry-run] {text}");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "log"
    }
}

/// Admin first, then subscribers in stored order, duplicates removed.
pub fn destinations(admin_chat_id: Option<i64>, subscribers: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::new();
    admin_chat_id
        .into_iter()
        .chain(subscribers.iter().copied())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Fans a message out to the admin destination and every subscriber.
pub struct Notifier {
    sender: Arc<dyn MessageSender>,
    store: Arc<SubscriberStore>,
    admin_chat_id: Option<i64>,
}

impl Notifier {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        store: Arc<SubscriberStore>,
        admin_chat_id: Option<i64>,
    ) -> Self {
        Self {
            sender,
            store,
            admin_chat_id,
        }
    }

    pub fn store(&self) -> &SubscriberStore {
        &self.store
    }

    /// Send `text` to every destination concurrently. Failures are logged per
    /// destination and never returned; the result is the number delivered.
    pub async fn notify(&self, text: &str) -> usize {
        let subscribers = self.store.load().await;
        let targets = destinations(self.admin_chat_id, &subscribers);
        if targets.is_empty() {
            warn!("No destinations configured, dropping message");
            return 0;
        }

        let sends = targets.iter().map(|&chat_id| self.send_to(chat_id, text));
        let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();
        info!(
            "Notification delivered to {delivered}/{} destination(s) via {}",
            targets.len(),
            self.sender.kind()
        );
        delivered
    }

    /// Send to a single destination, logging the outcome. Returns `true` on success.
    pub async fn send_to(&self, chat_id: i64, text: &str) -> bool {
        match self.sender.send(chat_id, text).await {
            Ok(()) => {
                info!(chat_id, "Message sent");
                true
            }
            Err(e) => {
                warn!(chat_id, "Message send failed: {e:#}");
                false
            }
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{info, warn};

use crate::api::fetch_updates;
use crate::notifier::Notifier;
use crate::poller::{PollTask, Schedule};
use crate::reporter::{ALREADY_SUBSCRIBED_MESSAGE, SUBSCRIBED_MESSAGE};
use crate::types::Update;

/// Bot command that registers a chat for alerts.
pub const SUBSCRIBE_COMMAND: &str = "/start";

/// How long each `getUpdates` call may be held open by the server.
pub const LONG_POLL: Duration = Duration::from_secs(10);

/// True for `/start` and `/start@<botname>`, ignoring surrounding whitespace.
pub fn is_subscribe_command(text: &str) -> bool {
    let text = text.trim();
    match text.strip_prefix(SUBSCRIBE_COMMAND) {
        Some("") => true,
        Some(rest) => rest.strip_prefix('@').is_some_and(|bot| {
            !bot.is_empty() && !bot.contains(char::is_whitespace)
        }),
        None => false,
    }
}

/// Long-polls bot updates and adds every chat that sends the subscribe command
/// to the subscriber store. Re-subscribing is idempotent, so the chat id itself
/// is not deduplicated; the update offset prevents reprocessing.
pub struct CommandPoller {
    client: Client,
    api_base: String,
    bot_token: String,
    offset: i64,
    request_timeout: Duration,
    schedule: Schedule,
    notifier: Arc<Notifier>,
}

impl CommandPoller {
    pub fn new(
        client: Client,
        api_base: &str,
        bot_token: &str,
        request_timeout: Duration,
        schedule: Schedule,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.to_string(),
            bot_token: bot_token.to_string(),
            offset: 0,
            request_timeout,
            schedule,
            notifier,
        }
    }

    /// Next `update_id` to request.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Process a batch of updates, returning how many chats were newly subscribed.
    pub async fn handle_updates(&mut self, updates: &[Update]) -> usize {
        let mut added = 0;
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);

            let (Some(chat_id), Some(text)) = (update.chat_id, update.text.as_deref()) else {
                continue;
            };
            if !is_subscribe_command(text) {
                continue;
            }

            match self.notifier.store().add(chat_id).await {
                Ok(true) => {
                    info!(chat_id, "New subscriber");
                    self.notifier.send_to(chat_id, SUBSCRIBED_MESSAGE).await;
                    added += 1;
                }
                Ok(false) => {
                    self.notifier.send_to(chat_id, ALREADY_SUBSCRIBED_MESSAGE).await;
                }
                Err(e) => {
                    warn!(chat_id, "Failed to persist subscriber: {e:#}");
                }
            }
        }
        added
    }
}

#[async_trait]
impl PollTask for CommandPoller {
    fn name(&self) -> &'static str {
        "subscriptions"
    }

    fn schedule(&self) -> Schedule {
        self.schedule
    }

    async fn poll_once(&mut self) -> Result<usize> {
        let updates = fetch_updates(
            &self.client,
            &self.api_base,
            &self.bot_token,
            self.offset,
            LONG_POLL,
            self.request_timeout,
        )
        .await?;
        Ok(self.handle_updates(&updates).await)
    }
}

//! Telegram Bot API notifier.
//!
//! Sends one message per article with the article link as text and
//! like/dislike inline buttons. Button presses are picked up by long polling
//! `getUpdates` and recorded against the article.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::feedback::{encode_callback_data, parse_callback_data};
use super::Notifier;
use crate::config::TelegramConfig;
use crate::feed::Item;
use crate::store::{ReactionKind, WatermarkStore};
use crate::{CourierError, Result};

/// Pause before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// An incoming update. Only callback queries are requested.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// A press on an inline keyboard button.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// The message a button belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram bot client.
pub struct TelegramBot {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: i64,
    poll_timeout_secs: u64,
}

impl TelegramBot {
    /// Create a bot from configuration.
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        // Long polls hold the request open for poll_timeout_secs.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|e| CourierError::Notify(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            chat_id: config.chat_id,
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    /// Call a Bot API method and decode its result.
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &Value) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);

        // reqwest errors carry the request URL, which holds the token
        let resp = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| CourierError::Notify(format!("{method}: {}", e.without_url())))?;

        let status = resp.status();
        let body: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| CourierError::Notify(format!("{method}: HTTP {status}: {}", e.without_url())))?;

        if !body.ok {
            return Err(CourierError::Notify(format!(
                "{method}: {}",
                body.description.unwrap_or_else(|| format!("HTTP {status}"))
            )));
        }

        body.result
            .ok_or_else(|| CourierError::Notify(format!("{method}: response without result")))
    }

    async fn answer_callback(&self, query_id: &str) -> Result<()> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": query_id }),
            )
            .await?;
        Ok(())
    }

    async fn remove_keyboard(&self, message: &Message) -> Result<()> {
        let _: Value = self
            .call(
                "editMessageReplyMarkup",
                &json!({
                    "chat_id": message.chat.id,
                    "message_id": message.message_id,
                    "reply_markup": { "inline_keyboard": [] },
                }),
            )
            .await?;
        Ok(())
    }

    async fn set_reaction(&self, message: &Message, kind: ReactionKind) -> Result<()> {
        let _: bool = self
            .call(
                "setMessageReaction",
                &json!({
                    "chat_id": message.chat.id,
                    "message_id": message.message_id,
                    "reaction": [{ "type": "emoji", "emoji": kind.emoji() }],
                }),
            )
            .await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["callback_query"],
            }),
        )
        .await
    }

    /// Handle one button press.
    ///
    /// The press is acknowledged first. Recording the reaction, removing the
    /// keyboard and setting the message reaction then share one store
    /// transaction, which is rolled back if any required step fails. The
    /// reaction is written before the keyboard goes away, so a press that
    /// cannot be stored leaves the buttons in place. Setting the emoji
    /// reaction is best effort.
    ///
    /// Waits while an ingestion cycle holds the store.
    pub async fn handle_callback(
        &self,
        store: &dyn WatermarkStore,
        query: &CallbackQuery,
    ) -> Result<()> {
        if let Err(e) = self.answer_callback(&query.id).await {
            warn!("Failed to answer callback {}: {}", query.id, e);
        }

        let Some((kind, article_id)) = query.data.as_deref().and_then(parse_callback_data) else {
            debug!("Ignoring callback {} with data {:?}", query.id, query.data);
            return Ok(());
        };
        let Some(message) = &query.message else {
            debug!("Ignoring callback {} without message", query.id);
            return Ok(());
        };

        let mut tx = store.begin().await?;
        let result = async {
            tx.add_reaction(article_id, kind).await?;
            self.remove_keyboard(message).await?;
            if let Err(e) = self.set_reaction(message, kind).await {
                warn!(
                    "Failed to set reaction on message {}: {}",
                    message.message_id, e
                );
            }
            Ok::<(), CourierError>(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await?;
                info!("Recorded {} for article {}", kind, article_id);
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Failed to roll back reaction: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Long-poll for button presses until `shutdown` flips to true.
    pub async fn listen(&self, store: Arc<dyn WatermarkStore>, mut shutdown: watch::Receiver<bool>) {
        info!("Telegram feedback listener started");
        let mut offset = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let updates = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                updates = self.get_updates(offset) => updates,
            };

            let updates = match updates {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Polling Telegram updates failed: {}", e);
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                if let Some(query) = &update.callback_query {
                    if let Err(e) = self.handle_callback(store.as_ref(), query).await {
                        error!("Failed to handle callback {}: {}", query.id, e);
                    }
                }
            }
        }

        info!("Telegram feedback listener stopped");
    }
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn send(&self, item: &Item, article_id: Option<i64>) -> Result<()> {
        let mut payload = json!({
            "chat_id": self.chat_id,
            "text": item.link,
        });

        if let Some(id) = article_id {
            let buttons: Vec<Value> = [ReactionKind::Like, ReactionKind::Dislike]
                .into_iter()
                .map(|kind| {
                    json!({
                        "text": kind.emoji(),
                        "callback_data": encode_callback_data(kind, id),
                    })
                })
                .collect();
            payload["reply_markup"] = json!({ "inline_keyboard": [buttons] });
        }

        let _: Value = self.call("sendMessage", &payload).await?;
        debug!("Sent {} to chat {}", item.link, self.chat_id);
        Ok(())
    }
}

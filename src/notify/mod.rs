//! Notifications and the reaction feedback loop.
//!
//! A [`Notifier`] delivers one message per persisted article. The Telegram
//! implementation attaches like/dislike buttons whose presses come back
//! through [`TelegramBot::listen`] and are recorded as reactions.

mod feedback;
mod telegram;

pub use feedback::{encode_callback_data, parse_callback_data, CALLBACK_PREFIX};
pub use telegram::{CallbackQuery, Chat, Message, TelegramBot, Update};

use async_trait::async_trait;

use crate::feed::Item;
use crate::Result;

/// Delivers item notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a notification for an item.
    ///
    /// `article_id` identifies the persisted article; when present the
    /// message offers feedback buttons bound to it.
    async fn send(&self, item: &Item, article_id: Option<i64>) -> Result<()>;
}

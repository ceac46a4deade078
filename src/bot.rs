//! Bot module for handling Telegram interactions.
//!
//! Dispatches incoming messages to the ingestion workflow and implements the
//! Telegram-backed seams the workflow runs against: file-URL resolution and
//! send/edit notifications.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{FileId, MessageId};
use tracing::{error, info, warn};

use crate::db::PgStore;
use crate::vision::GroqVision;
use crate::workflow::{self, FileResolver, IngestEvent, Notifier};

/// Shared clients, constructed once at startup and passed into the handlers
/// so tests can substitute fakes at the workflow seams.
pub struct AppContext {
    pub store: PgStore,
    pub vision: GroqVision,
}

/// Resolves Telegram file ids into download URLs carrying the bot token.
pub struct TelegramFiles {
    bot: Bot,
}

impl TelegramFiles {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl FileResolver for TelegramFiles {
    async fn resolve_url(&self, image_ref: &str) -> Result<String> {
        let file = self
            .bot
            .get_file(FileId(image_ref.to_owned()))
            .await
            .context("Failed to resolve file on Telegram")?;

        Ok(format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        ))
    }
}

/// Sends and edits messages in the chat the current event came from.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    type Handle = MessageId;

    async fn send(&self, text: &str) -> Result<MessageId> {
        let message = self
            .bot
            .send_message(self.chat_id, text)
            .await
            .context("Failed to send Telegram message")?;
        Ok(message.id)
    }

    async fn edit(&self, handle: &MessageId, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(self.chat_id, *handle, text)
            .await
            .context("Failed to edit Telegram message")?;
        Ok(())
    }
}

async fn handle_text_message(bot: &Bot, msg: &Message) -> Result<()> {
    if let Some(text) = msg.text() {
        info!(chat_id = %msg.chat.id, "Received text message");

        if text == "/start" {
            let (name, id) = msg
                .from
                .as_ref()
                .map(|user| (user.full_name(), user.id.to_string()))
                .unwrap_or_else(|| ("there".to_string(), "unknown".to_string()));
            bot.send_message(
                msg.chat.id,
                format!(
                    "👋 Hi, {name}! ✨\nYour ID: {id}\nSend me a photo of a receipt and I will file it for you."
                ),
            )
            .await?;
        } else if text == "/help" {
            let help_message = [
                "🧾 **Receipts Bot Help**",
                "Send a photo of a receipt and I will read it with a vision model, \
                 store it and reply with the store name and total.",
                "You can also send the receipt as an image file (document).",
                "Commands:\n/start - introduction\n/help - this message",
                "💡 Clear, well-lit photos give the best results.",
            ]
            .join("\n\n");
            bot.send_message(msg.chat.id, help_message).await?;
        } else {
            bot.send_message(
                msg.chat.id,
                "Send me a photo of a receipt to get started. Use /help for details.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_photo_message(bot: &Bot, msg: &Message, ctx: &AppContext) -> Result<()> {
    let Some(sender) = msg.from.as_ref() else {
        warn!(chat_id = %msg.chat.id, "Photo message without a sender, ignoring");
        return Ok(());
    };

    // Telegram sends several sizes of the same photo; the last one is the
    // largest and gives the vision model the most to work with.
    if let Some(largest_photo) = msg.photo().and_then(|sizes| sizes.last()) {
        let event = IngestEvent {
            sender_id: sender.id.to_string(),
            sender_display_name: sender.full_name(),
            image_ref: largest_photo.file.id.0.clone(),
        };
        ingest_and_report(bot, msg.chat.id, ctx, event).await?;
    }
    Ok(())
}

async fn handle_document_message(bot: &Bot, msg: &Message, ctx: &AppContext) -> Result<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };

    let is_image = doc
        .mime_type
        .as_ref()
        .is_some_and(|mime| mime.to_string().starts_with("image/"));
    if !is_image {
        info!(chat_id = %msg.chat.id, "Non-image document received");
        bot.send_message(
            msg.chat.id,
            "I can only read receipts sent as photos or image files.",
        )
        .await?;
        return Ok(());
    }

    let Some(sender) = msg.from.as_ref() else {
        warn!(chat_id = %msg.chat.id, "Document message without a sender, ignoring");
        return Ok(());
    };

    let event = IngestEvent {
        sender_id: sender.id.to_string(),
        sender_display_name: sender.full_name(),
        image_ref: doc.file.id.0.clone(),
    };
    ingest_and_report(bot, msg.chat.id, ctx, event).await
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    info!(chat_id = %msg.chat.id, "Unsupported message kind received");
    bot.send_message(
        msg.chat.id,
        "🤔 I only understand receipt photos and text commands. Use /help to see what I can do.",
    )
    .await?;
    Ok(())
}

/// Run the ingestion workflow for one event and report failures to the
/// sender as a truncated human-readable message.
async fn ingest_and_report(
    bot: &Bot,
    chat_id: ChatId,
    ctx: &AppContext,
    event: IngestEvent,
) -> Result<()> {
    info!(external_id = %event.sender_id, "Receipt photo received");

    let files = TelegramFiles::new(bot.clone());
    let notifier = TelegramNotifier::new(bot.clone(), chat_id);

    match workflow::ingest_photo(&ctx.store, &ctx.store, &ctx.vision, &files, &notifier, &event)
        .await
    {
        Ok(receipt) => {
            info!(
                external_id = %event.sender_id,
                receipt_id = receipt.id,
                "Receipt ingestion completed"
            );
        }
        Err(e) => {
            error!(external_id = %event.sender_id, error = %e, "Receipt ingestion failed");
            bot.send_message(chat_id, e.user_message()).await?;
        }
    }
    Ok(())
}

/// Entry point wired into the dispatcher for every incoming message.
pub async fn message_handler(bot: Bot, msg: Message, ctx: Arc<AppContext>) -> Result<()> {
    if msg.text().is_some() {
        handle_text_message(&bot, &msg).await?;
    } else if msg.photo().is_some() {
        handle_photo_message(&bot, &msg, &ctx).await?;
    } else if msg.document().is_some() {
        handle_document_message(&bot, &msg, &ctx).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }

    Ok(())
}

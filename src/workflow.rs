//! Receipt ingestion workflow.
//!
//! One inbound photo event runs through a linear state machine: resolve the
//! sender to a user record, acknowledge, resolve the image URL, ask the
//! vision model for a structured extraction, persist the normalized receipt
//! and report a summary back. Steps never branch backwards and there is no
//! retry; replaying the same event inserts a duplicate receipt.

use crate::db::{Receipt, ReceiptStore, UserStore};
use crate::extraction;
use crate::vision::VisionExtractor;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

/// Inbound photo event, decoupled from the messaging platform types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEvent {
    /// The platform's stable sender id, used as the natural key for lookup.
    pub sender_id: String,
    pub sender_display_name: String,
    /// Opaque token the platform resolves into a fetchable image URL.
    pub image_ref: String,
}

/// Resolves an opaque image reference into a fetchable URL.
#[async_trait]
pub trait FileResolver: Send + Sync {
    async fn resolve_url(&self, image_ref: &str) -> Result<String>;
}

/// Outbound notifications to the sender of the current event.
#[async_trait]
pub trait Notifier: Send + Sync {
    type Handle: Send + Sync;

    async fn send(&self, text: &str) -> Result<Self::Handle>;
    async fn edit(&self, handle: &Self::Handle, text: &str) -> Result<()>;
}

/// Error kinds of the ingestion workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// Database unreachable or constraint violation while resolving the user
    UserResolution(String),
    /// Best-effort message delivery failed; logged, never fatal
    Notification(String),
    /// Vision service unreachable, malformed JSON or schema mismatch
    Extraction(String),
    /// Receipt insert failed
    Persistence(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::UserResolution(msg) => write!(f, "User resolution error: {msg}"),
            IngestError::Notification(msg) => write!(f, "Notification error: {msg}"),
            IngestError::Extraction(msg) => write!(f, "Extraction error: {msg}"),
            IngestError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {}

/// Maximum characters of failure detail shown to the sender.
pub const ERROR_DETAIL_LIMIT: usize = 100;

impl IngestError {
    /// Human-readable failure text for the sender, truncated to
    /// [`ERROR_DETAIL_LIMIT`] characters. Full detail stays in the logs.
    pub fn user_message(&self) -> String {
        format!("❌ {}", truncate_chars(&self.to_string(), ERROR_DETAIL_LIMIT))
    }
}

/// Provisional acknowledgement shown while the extraction runs.
pub const PROCESSING_MESSAGE: &str = "⏳ Analyzing your receipt...";

/// Final confirmation shown once the receipt is persisted.
pub fn summary_message(receipt: &Receipt) -> String {
    format!(
        "✅ Done!\n🛒 Store: {}\n💰 Total: {} {}",
        receipt.store_name, receipt.total_amount, receipt.currency
    )
}

/// First `limit` characters of `text`, cut on a character boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

/// Run the ingestion workflow for one photo event.
///
/// A failed acknowledgement is logged and skipped; any other failed step
/// aborts the remaining steps. On success the persisted receipt is returned
/// and a summary has been delivered on a best-effort basis.
pub async fn ingest_photo<U, R, V, F, N>(
    users: &U,
    receipts: &R,
    vision: &V,
    files: &F,
    notifier: &N,
    event: &IngestEvent,
) -> Result<Receipt, IngestError>
where
    U: UserStore,
    R: ReceiptStore,
    V: VisionExtractor,
    F: FileResolver,
    N: Notifier,
{
    // Step 1: resolve or register the sender.
    let user = match users.find_by_external_id(&event.sender_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            let user = users
                .create(&event.sender_id, &event.sender_display_name)
                .await
                .map_err(|e| IngestError::UserResolution(e.to_string()))?;
            info!(external_id = %event.sender_id, user_id = user.id, "Registered new user");
            user
        }
        Err(e) => return Err(IngestError::UserResolution(e.to_string())),
    };

    // Step 2: provisional acknowledgement. Best effort only.
    let handle = match notifier.send(PROCESSING_MESSAGE).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            let err = IngestError::Notification(e.to_string());
            warn!(external_id = %event.sender_id, error = %err, "Acknowledgement failed");
            None
        }
    };

    // Step 3: resolve the image reference. Without a URL no extraction can
    // happen, so failures are classified as extraction errors.
    let image_url = files
        .resolve_url(&event.image_ref)
        .await
        .map_err(|e| IngestError::Extraction(e.to_string()))?;

    // Step 4: single-turn vision extraction, validated as untrusted input.
    let raw = vision
        .extract(&image_url)
        .await
        .map_err(|e| IngestError::Extraction(e.to_string()))?;
    let extraction = extraction::parse_extraction(&raw)
        .map_err(|e| IngestError::Extraction(format!("model returned invalid JSON: {e}")))?;

    // Step 5: normalize and persist.
    let receipt = receipts
        .insert(user.id, &extraction.into_new_receipt())
        .await
        .map_err(|e| IngestError::Persistence(e.to_string()))?;
    info!(
        user_id = user.id,
        receipt_id = receipt.id,
        store = %receipt.store_name,
        "Receipt persisted"
    );

    // Step 6: replace the acknowledgement with the summary. The receipt is
    // already persisted, so delivery failures are logged only.
    let summary = summary_message(&receipt);
    let report = match &handle {
        Some(handle) => notifier.edit(handle, &summary).await,
        None => notifier.send(&summary).await.map(|_| ()),
    };
    if let Err(e) = report {
        let err = IngestError::Notification(e.to_string());
        warn!(user_id = user.id, error = %err, "Failed to deliver receipt summary");
    }

    Ok(receipt)
}

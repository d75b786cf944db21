//! Input/output DTOs and schema-bearing types
//!
//! Defines all data structures used in MCP tool contracts. Each type is
//! annotated with `JsonSchema` for automatic schema generation.

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::soap::{AttachmentMeta, EwsMessage};

/// Metadata included in all tool responses
///
/// Provides timing information and current UTC timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Meta {
    /// Current UTC timestamp in RFC 3339 format with milliseconds
    pub now_utc: String,
    /// Tool execution duration in milliseconds
    pub duration_ms: u64,
}

impl Meta {
    /// Create metadata populated with current time and elapsed duration
    pub fn now(duration_ms: u64) -> Self {
        Self {
            now_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms,
        }
    }
}

/// Standard response envelope for all tools
///
/// Wraps tool-specific data with human-readable summary and execution metadata.
/// This structure provides consistent response shape across all MCP tools.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolEnvelope<T>
where
    T: JsonSchema,
{
    /// Human-readable summary of the operation outcome
    pub summary: String,
    /// Tool-specific data payload
    pub data: T,
    /// Execution metadata (timestamp, duration)
    pub meta: Meta,
}

/// Message summary for listing and search results
///
/// Lightweight representation returned by `ews_list_messages`,
/// `ews_search_messages`, and `ews_get_thread`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageSummary {
    /// Opaque EWS item identifier
    pub message_id: String,
    /// Subject line (`(No Subject)` when absent)
    pub subject: String,
    /// Sender display name or address (`Unknown` when absent)
    pub sender: String,
    /// Timestamp the message was received (ISO 8601, as reported by EWS)
    pub datetime_received: Option<String>,
    /// Whether the message has been read
    pub is_read: bool,
    /// Whether the message carries attachments
    pub has_attachments: bool,
}

impl MessageSummary {
    /// Build a summary from a parsed EWS item, filling display defaults
    pub fn from_ews(item: &EwsMessage) -> Self {
        Self {
            message_id: item.id.clone(),
            subject: display_subject(item.subject.as_deref()),
            sender: display_sender(item.sender.as_deref()),
            datetime_received: item.datetime_received.clone(),
            is_read: item.is_read.unwrap_or(false),
            has_attachments: item.has_attachments.unwrap_or(false),
        }
    }
}

/// Attachment metadata
///
/// Returned in message details and by `ews_list_attachments`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentInfo {
    /// Opaque EWS attachment identifier
    pub attachment_id: String,
    /// Attachment filename
    pub name: String,
    /// MIME content type (e.g., `application/pdf`)
    pub content_type: Option<String>,
    /// Attachment size in bytes
    pub size_bytes: Option<u64>,
    /// Whether the attachment is inline (embedded in the body)
    pub is_inline: bool,
}

impl AttachmentInfo {
    /// Build attachment info from parsed EWS metadata
    pub fn from_ews(meta: &AttachmentMeta) -> Self {
        Self {
            attachment_id: meta.attachment_id.clone(),
            name: meta.name.clone(),
            content_type: meta.content_type.clone(),
            size_bytes: meta.size_bytes,
            is_inline: meta.is_inline,
        }
    }
}

/// Full message detail
///
/// Rich representation returned by `ews_get_message`. Includes recipients,
/// body content, and attachment metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageDetail {
    /// Opaque EWS item identifier
    pub message_id: String,
    /// Subject line (`(No Subject)` when absent)
    pub subject: String,
    /// Sender display name or address (`Unknown` when absent)
    pub sender: String,
    /// To recipients
    pub to: Vec<String>,
    /// Cc recipients
    pub cc: Vec<String>,
    /// Timestamp the message was received
    pub datetime_received: Option<String>,
    /// Timestamp the message was sent
    pub datetime_sent: Option<String>,
    /// Whether the message has been read
    pub is_read: bool,
    /// Conversation identifier for thread lookups
    pub conversation_id: Option<String>,
    /// Plain text body extracted from the HTML body
    pub body_text: Option<String>,
    /// Raw HTML body (if `include_html=true`)
    pub body_html: Option<String>,
    /// Attachment metadata
    pub attachments: Vec<AttachmentInfo>,
}

/// Page of message summaries
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessagePage {
    /// Folder that was listed or searched
    pub folder: String,
    /// Matching messages, newest first
    pub messages: Vec<MessageSummary>,
}

/// Conversation thread view
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ThreadView {
    /// Conversation identifier shared by all messages
    pub conversation_id: String,
    /// Thread messages, newest first
    pub messages: Vec<MessageSummary>,
}

/// Attachment listing for one message
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentList {
    /// Message the attachments belong to
    pub message_id: String,
    /// Attachment metadata
    pub attachments: Vec<AttachmentInfo>,
}

/// Extracted text content of one attachment
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentContent {
    /// Opaque EWS attachment identifier
    pub attachment_id: String,
    /// Attachment filename
    pub name: String,
    /// Extracted text (possibly truncated)
    pub text: String,
    /// Whether the text was truncated to `max_chars`
    pub truncated: bool,
}

/// Confirmation payload for a sent message
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SentInfo {
    /// Subject of the sent message
    pub subject: String,
    /// Resolved To recipients
    pub to: Vec<String>,
    /// Resolved Cc recipients
    pub cc: Vec<String>,
}

/// Confirmation payload for a saved draft
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DraftInfo {
    /// Item id of the new draft
    pub draft_id: String,
    /// Subject of the draft
    pub subject: String,
}

/// Result of a read-state update
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateResult {
    /// Number of messages updated
    pub updated: usize,
    /// The read state that was applied
    pub is_read: bool,
}

/// Result of a move operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MoveResult {
    /// Number of messages moved
    pub moved: usize,
    /// Destination folder as requested
    pub destination_folder: String,
}

/// Result of a delete operation
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteResult {
    /// Number of messages deleted
    pub deleted: usize,
    /// Whether the messages were permanently deleted
    pub hard_delete: bool,
}

/// Input: list newest messages in a folder
///
/// Used by `ews_list_messages`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListMessagesInput {
    /// Folder name (well-known alias or display name, defaults to `inbox`)
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Maximum messages to return (1..100, default 20)
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

/// Input: search messages with an AQS query
///
/// Used by `ews_search_messages`. The query string is passed through to
/// Exchange as Advanced Query Syntax (e.g., `from:alice subject:budget`).
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchMessagesInput {
    /// Advanced Query Syntax search string
    pub query: String,
    /// Folder to search (defaults to `inbox`)
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Maximum messages to return (1..100, default 20)
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

/// Input: get full message details
///
/// Used by `ews_get_message`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetMessageInput {
    /// Opaque EWS item identifier
    pub message_id: String,
    /// Include the raw HTML body in the response
    #[serde(default)]
    pub include_html: bool,
}

/// Input: get the conversation thread containing a message
///
/// Used by `ews_get_thread`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetThreadInput {
    /// Any message id in the conversation
    pub message_id: String,
    /// Maximum thread messages to return (1..100, default 10)
    #[serde(default = "default_thread_limit")]
    pub limit: usize,
}

/// Input: list attachments on a message
///
/// Used by `ews_list_attachments`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListAttachmentsInput {
    /// Opaque EWS item identifier
    pub message_id: String,
}

/// Input: extract text content from one attachment
///
/// Used by `ews_get_attachment_content`. The attachment can be picked by
/// id or by filename; exactly one of the two must be provided.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetAttachmentContentInput {
    /// Message the attachment belongs to
    pub message_id: String,
    /// Opaque EWS attachment identifier
    pub attachment_id: Option<String>,
    /// Attachment filename (exact match, case-insensitive)
    pub attachment_name: Option<String>,
    /// Maximum extracted characters (default 50000)
    #[serde(default = "default_attachment_max_chars")]
    pub max_chars: usize,
}

/// Input: compose and send a new message
///
/// Used by `ews_send_email`. The body is Markdown and is rendered to
/// styled HTML before sending.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SendEmailInput {
    /// To recipients, comma-separated email addresses
    pub to: String,
    /// Cc recipients, comma-separated email addresses
    pub cc: Option<String>,
    /// Subject line
    pub subject: String,
    /// Message body in Markdown
    pub body: String,
    /// Append the configured signature block
    #[serde(default = "default_true")]
    pub use_signature: bool,
    /// Client-chosen token that makes retries safe; reuse the same token
    /// when retrying a failed call
    pub idempotency_key: Option<String>,
}

/// Input: save a draft without sending
///
/// Used by `ews_save_draft`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SaveDraftInput {
    /// To recipients, comma-separated email addresses
    pub to: Option<String>,
    /// Cc recipients, comma-separated email addresses
    pub cc: Option<String>,
    /// Subject line
    pub subject: String,
    /// Message body in Markdown
    pub body: String,
    /// Append the configured signature block
    #[serde(default = "default_true")]
    pub use_signature: bool,
    /// Client-chosen token that makes retries safe
    pub idempotency_key: Option<String>,
}

/// Input: reply to a message
///
/// Used by `ews_reply_email`. The reply keeps the original thread; the
/// subject gets a `Re:` prefix unless it already has one.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReplyEmailInput {
    /// Message to reply to
    pub message_id: String,
    /// Reply body in Markdown
    pub body: String,
    /// Reply to all recipients instead of just the sender
    #[serde(default)]
    pub reply_all: bool,
    /// Append the configured signature block
    #[serde(default = "default_true")]
    pub use_signature: bool,
    /// Client-chosen token that makes retries safe
    pub idempotency_key: Option<String>,
}

/// Input: forward a message
///
/// Used by `ews_forward_email`. The subject gets a `Fw:` prefix unless it
/// already has a forward prefix.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ForwardEmailInput {
    /// Message to forward
    pub message_id: String,
    /// To recipients, comma-separated email addresses
    pub to: String,
    /// Cc recipients, comma-separated email addresses
    pub cc: Option<String>,
    /// Optional comment in Markdown, shown above the forwarded content
    pub comment: Option<String>,
    /// Append the configured signature block to the comment
    #[serde(default = "default_true")]
    pub use_signature: bool,
    /// Client-chosen token that makes retries safe
    pub idempotency_key: Option<String>,
}

/// Input: set the read state of one message
///
/// Used by `ews_mark_as_read`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MarkAsReadInput {
    /// Opaque EWS item identifier
    pub message_id: String,
    /// Read state to apply (`false` marks unread)
    #[serde(default = "default_true")]
    pub is_read: bool,
}

/// Input: move one message to another folder
///
/// Used by `ews_move_message`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MoveMessageInput {
    /// Opaque EWS item identifier
    pub message_id: String,
    /// Destination folder (well-known alias or display name)
    pub destination_folder: String,
}

/// Input: delete one message
///
/// Used by `ews_delete_message`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteMessageInput {
    /// Opaque EWS item identifier
    pub message_id: String,
    /// Permanently delete instead of moving to Deleted Items
    #[serde(default)]
    pub hard_delete: bool,
}

/// Input: set the read state of several messages at once
///
/// Used by `ews_batch_mark_as_read`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BatchMarkAsReadInput {
    /// Comma-separated EWS item identifiers
    pub message_ids: String,
    /// Read state to apply (`false` marks unread)
    #[serde(default = "default_true")]
    pub is_read: bool,
}

/// Input: move several messages at once
///
/// Used by `ews_batch_move_messages`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BatchMoveMessagesInput {
    /// Comma-separated EWS item identifiers
    pub message_ids: String,
    /// Destination folder (well-known alias or display name)
    pub destination_folder: String,
}

/// Subject shown when the item has none
pub fn display_subject(subject: Option<&str>) -> String {
    match subject {
        Some(s) if !s.trim().is_empty() => s.to_owned(),
        _ => "(No Subject)".to_owned(),
    }
}

/// Sender shown when the item has none
pub fn display_sender(sender: Option<&str>) -> String {
    match sender {
        Some(s) if !s.trim().is_empty() => s.to_owned(),
        _ => "Unknown".to_owned(),
    }
}

/// Default folder for listing and search
fn default_folder() -> String {
    "inbox".to_owned()
}

/// Default value for `bool` fields (true)
fn default_true() -> bool {
    true
}

/// Default value for `limit` in list and search
///
/// One screenful of results; larger pages are available on request up to
/// the per-call cap.
fn default_list_limit() -> usize {
    20
}

/// Default value for `limit` in thread lookup
fn default_thread_limit() -> usize {
    10
}

/// Default value for `max_chars` in attachment extraction
///
/// Bounded so a large PDF cannot flood the tool response.
fn default_attachment_max_chars() -> usize {
    50_000
}

#[cfg(test)]
mod tests {
    use super::{MessageSummary, display_sender, display_subject};
    use crate::soap::EwsMessage;

    #[test]
    fn blank_subject_and_sender_get_placeholders() {
        assert_eq!(display_subject(None), "(No Subject)");
        assert_eq!(display_subject(Some("   ")), "(No Subject)");
        assert_eq!(display_subject(Some("Hello")), "Hello");
        assert_eq!(display_sender(None), "Unknown");
        assert_eq!(display_sender(Some("alice@example.com")), "alice@example.com");
    }

    #[test]
    fn summary_defaults_flags_to_false() {
        let item = EwsMessage {
            id: "AAMk1".to_owned(),
            ..Default::default()
        };
        let summary = MessageSummary::from_ews(&item);
        assert_eq!(summary.message_id, "AAMk1");
        assert_eq!(summary.subject, "(No Subject)");
        assert_eq!(summary.sender, "Unknown");
        assert!(!summary.is_read);
        assert!(!summary.has_attachments);
    }
}

//! MCP server implementation with tool handlers
//!
//! Implements the `ServerHandler` trait and registers 15 MCP tools. Handles
//! input validation, idempotency for write tools, body rendering, and
//! response formatting.

use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{ErrorData, ServerCapabilities, ServerInfo};
use rmcp::{Json, ServerHandler, tool, tool_handler, tool_router};
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::content;
use crate::errors::{AppError, AppResult};
use crate::ews::{EwsClient, ItemKey, OutgoingMessage};
use crate::idempotency::IdempotencyGuard;
use crate::models::{
    AttachmentContent, AttachmentInfo, AttachmentList, BatchMarkAsReadInput,
    BatchMoveMessagesInput, DeleteMessageInput, DeleteResult, DraftInfo, ForwardEmailInput,
    GetAttachmentContentInput, GetMessageInput, GetThreadInput, ListAttachmentsInput,
    ListMessagesInput, MarkAsReadInput, MessageDetail, MessagePage, MessageSummary, Meta,
    MoveMessageInput, MoveResult, ReplyEmailInput, SaveDraftInput, SearchMessagesInput,
    SendEmailInput, SentInfo, ThreadView, ToolEnvelope, UpdateResult, display_sender,
    display_subject,
};
use crate::render::BodyRenderer;

/// Maximum messages per list/search/thread page
const MAX_PAGE_LIMIT: usize = 100;
/// Maximum item ids accepted by batch tools
const MAX_BATCH_ITEMS: usize = 50;
/// Maximum recipients per outgoing message
const MAX_RECIPIENTS: usize = 100;
/// Maximum accepted idempotency key length
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// EWS MCP server
///
/// Holds shared configuration, the EWS client, the body renderer, and the
/// idempotency ledger. Implements MCP tool handlers via the `#[tool]`
/// attribute macro and `ServerHandler` trait.
#[derive(Clone)]
pub struct MailEwsServer {
    /// Server config (endpoint, credentials, timeouts)
    config: Arc<ServerConfig>,
    /// Shared EWS client
    ews: Arc<EwsClient>,
    /// Markdown-to-styled-HTML body renderer
    renderer: BodyRenderer,
    /// Idempotency ledger for write tools (protected by mutex)
    idempotency: Arc<Mutex<IdempotencyGuard>>,
    /// Tool router for dispatching MCP tool calls
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl MailEwsServer {
    /// Create a new MCP server instance
    ///
    /// Initializes the EWS client and the idempotency ledger with the
    /// configured capacity.
    pub fn new(config: ServerConfig) -> AppResult<Self> {
        let ews = EwsClient::new(&config)?;
        let renderer = BodyRenderer::new(config.signature.clone());
        let guard = IdempotencyGuard::new(config.idempotency_max_entries);
        Ok(Self {
            config: Arc::new(config),
            ews: Arc::new(ews),
            renderer,
            idempotency: Arc::new(Mutex::new(guard)),
            tool_router: Self::tool_router(),
        })
    }

    /// Tool: List newest messages in a folder
    #[tool(
        name = "ews_list_messages",
        description = "List newest messages in a mailbox folder"
    )]
    async fn list_messages(
        &self,
        Parameters(input): Parameters<ListMessagesInput>,
    ) -> Result<Json<ToolEnvelope<MessagePage>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.list_messages_impl(input)
                .await
                .map(|data| (format!("{} message(s) returned", data.messages.len()), data)),
        )
    }

    /// Tool: Search messages with an AQS query
    #[tool(
        name = "ews_search_messages",
        description = "Search messages in a folder using Advanced Query Syntax"
    )]
    async fn search_messages(
        &self,
        Parameters(input): Parameters<SearchMessagesInput>,
    ) -> Result<Json<ToolEnvelope<MessagePage>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.search_messages_impl(input)
                .await
                .map(|data| (format!("{} message(s) matched", data.messages.len()), data)),
        )
    }

    /// Tool: Get full message details
    #[tool(name = "ews_get_message", description = "Get full message details")]
    async fn get_message(
        &self,
        Parameters(input): Parameters<GetMessageInput>,
    ) -> Result<Json<ToolEnvelope<MessageDetail>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.get_message_impl(input)
                .await
                .map(|data| ("Message retrieved".to_owned(), data)),
        )
    }

    /// Tool: Get the conversation thread containing a message
    #[tool(
        name = "ews_get_thread",
        description = "Get the conversation thread containing a message"
    )]
    async fn get_thread(
        &self,
        Parameters(input): Parameters<GetThreadInput>,
    ) -> Result<Json<ToolEnvelope<ThreadView>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.get_thread_impl(input)
                .await
                .map(|data| (format!("{} message(s) in thread", data.messages.len()), data)),
        )
    }

    /// Tool: List attachments on a message
    #[tool(
        name = "ews_list_attachments",
        description = "List attachments on a message"
    )]
    async fn list_attachments(
        &self,
        Parameters(input): Parameters<ListAttachmentsInput>,
    ) -> Result<Json<ToolEnvelope<AttachmentList>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.list_attachments_impl(input).await.map(|data| {
                (
                    format!("{} attachment(s)", data.attachments.len()),
                    data,
                )
            }),
        )
    }

    /// Tool: Extract text content from one attachment
    ///
    /// Supports plain text formats, HTML, and PDF. Other types are rejected.
    #[tool(
        name = "ews_get_attachment_content",
        description = "Extract text content from a message attachment"
    )]
    async fn get_attachment_content(
        &self,
        Parameters(input): Parameters<GetAttachmentContentInput>,
    ) -> Result<Json<ToolEnvelope<AttachmentContent>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.get_attachment_content_impl(input)
                .await
                .map(|data| ("Attachment content extracted".to_owned(), data)),
        )
    }

    /// Tool: Compose and send a new message
    ///
    /// The body is Markdown; it is rendered to inline-styled HTML with the
    /// configured signature before sending. Pass `idempotency_key` to make
    /// retries safe.
    #[tool(name = "ews_send_email", description = "Compose and send an email")]
    async fn send_email(
        &self,
        Parameters(input): Parameters<SendEmailInput>,
    ) -> Result<Json<ToolEnvelope<SentInfo>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.send_email_impl(input)
                .await
                .map(|data| ("Email sent".to_owned(), data)),
        )
    }

    /// Tool: Save a draft without sending
    #[tool(name = "ews_save_draft", description = "Save an email draft")]
    async fn save_draft(
        &self,
        Parameters(input): Parameters<SaveDraftInput>,
    ) -> Result<Json<ToolEnvelope<DraftInfo>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.save_draft_impl(input)
                .await
                .map(|data| ("Draft saved".to_owned(), data)),
        )
    }

    /// Tool: Reply to a message
    #[tool(name = "ews_reply_email", description = "Reply to an email")]
    async fn reply_email(
        &self,
        Parameters(input): Parameters<ReplyEmailInput>,
    ) -> Result<Json<ToolEnvelope<SentInfo>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.reply_email_impl(input)
                .await
                .map(|data| ("Reply sent".to_owned(), data)),
        )
    }

    /// Tool: Forward a message
    #[tool(name = "ews_forward_email", description = "Forward an email")]
    async fn forward_email(
        &self,
        Parameters(input): Parameters<ForwardEmailInput>,
    ) -> Result<Json<ToolEnvelope<SentInfo>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.forward_email_impl(input)
                .await
                .map(|data| ("Message forwarded".to_owned(), data)),
        )
    }

    /// Tool: Set the read state of one message
    #[tool(
        name = "ews_mark_as_read",
        description = "Mark a message as read or unread"
    )]
    async fn mark_as_read(
        &self,
        Parameters(input): Parameters<MarkAsReadInput>,
    ) -> Result<Json<ToolEnvelope<UpdateResult>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.mark_as_read_impl(input)
                .await
                .map(|data| ("Read state updated".to_owned(), data)),
        )
    }

    /// Tool: Move one message to another folder
    #[tool(name = "ews_move_message", description = "Move a message to a folder")]
    async fn move_message(
        &self,
        Parameters(input): Parameters<MoveMessageInput>,
    ) -> Result<Json<ToolEnvelope<MoveResult>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.move_message_impl(input)
                .await
                .map(|data| ("Message moved".to_owned(), data)),
        )
    }

    /// Tool: Delete one message
    ///
    /// Moves to Deleted Items by default; `hard_delete=true` deletes
    /// permanently.
    #[tool(name = "ews_delete_message", description = "Delete a message")]
    async fn delete_message(
        &self,
        Parameters(input): Parameters<DeleteMessageInput>,
    ) -> Result<Json<ToolEnvelope<DeleteResult>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.delete_message_impl(input)
                .await
                .map(|data| ("Message deleted".to_owned(), data)),
        )
    }

    /// Tool: Set the read state of several messages in one request
    #[tool(
        name = "ews_batch_mark_as_read",
        description = "Mark several messages as read or unread"
    )]
    async fn batch_mark_as_read(
        &self,
        Parameters(input): Parameters<BatchMarkAsReadInput>,
    ) -> Result<Json<ToolEnvelope<UpdateResult>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.batch_mark_as_read_impl(input)
                .await
                .map(|data| (format!("{} message(s) updated", data.updated), data)),
        )
    }

    /// Tool: Move several messages in one request
    #[tool(
        name = "ews_batch_move_messages",
        description = "Move several messages to a folder"
    )]
    async fn batch_move_messages(
        &self,
        Parameters(input): Parameters<BatchMoveMessagesInput>,
    ) -> Result<Json<ToolEnvelope<MoveResult>>, ErrorData> {
        let started = Instant::now();
        finalize_tool(
            started,
            self.batch_move_messages_impl(input)
                .await
                .map(|data| (format!("{} message(s) moved", data.moved), data)),
        )
    }
}

/// MCP server handler implementation
///
/// Provides server info and capabilities to MCP client.
#[tool_handler(router = self.tool_router)]
impl ServerHandler for MailEwsServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.instructions = Some(
            "Exchange Web Services MCP server. Write tools (send, reply, forward, draft) accept an idempotency_key; reuse the same key when retrying a failed call to avoid duplicate sends.".to_owned(),
        );
        info.capabilities = ServerCapabilities::builder().enable_tools().build();
        info
    }
}

/// Tool implementation methods
///
/// Private methods handle the actual business logic for each tool, separated
/// from the public `#[tool]` methods that handle response formatting.
impl MailEwsServer {
    async fn list_messages_impl(&self, input: ListMessagesInput) -> AppResult<MessagePage> {
        validate_range(input.limit, 1, MAX_PAGE_LIMIT, "limit")?;
        validate_folder_name(&input.folder)?;

        let folder = self.ews.resolve_folder(&input.folder).await?;
        let items = self.ews.find_messages(&folder, input.limit, None).await?;

        Ok(MessagePage {
            folder: input.folder,
            messages: items.iter().map(MessageSummary::from_ews).collect(),
        })
    }

    async fn search_messages_impl(&self, input: SearchMessagesInput) -> AppResult<MessagePage> {
        validate_range(input.limit, 1, MAX_PAGE_LIMIT, "limit")?;
        validate_folder_name(&input.folder)?;
        if input.query.trim().is_empty() {
            return Err(AppError::invalid("query must not be blank"));
        }

        let folder = self.ews.resolve_folder(&input.folder).await?;
        let items = self
            .ews
            .find_messages(&folder, input.limit, Some(input.query.trim()))
            .await?;

        Ok(MessagePage {
            folder: input.folder,
            messages: items.iter().map(MessageSummary::from_ews).collect(),
        })
    }

    async fn get_message_impl(&self, input: GetMessageInput) -> AppResult<MessageDetail> {
        validate_message_id(&input.message_id)?;

        let item = self.ews.get_message(&input.message_id, true).await?;
        let body_text = item.body_html.as_deref().map(content::html_to_text);
        let body_html = if input.include_html {
            item.body_html.clone()
        } else {
            None
        };

        Ok(MessageDetail {
            message_id: item.id.clone(),
            subject: display_subject(item.subject.as_deref()),
            sender: display_sender(item.sender.as_deref()),
            to: item.to_recipients.clone(),
            cc: item.cc_recipients.clone(),
            datetime_received: item.datetime_received.clone(),
            datetime_sent: item.datetime_sent.clone(),
            is_read: item.is_read.unwrap_or(false),
            conversation_id: item.conversation_id.clone(),
            body_text,
            body_html,
            attachments: item.attachments.iter().map(AttachmentInfo::from_ews).collect(),
        })
    }

    async fn get_thread_impl(&self, input: GetThreadInput) -> AppResult<ThreadView> {
        validate_message_id(&input.message_id)?;
        validate_range(input.limit, 1, MAX_PAGE_LIMIT, "limit")?;

        let seed = self.ews.get_message(&input.message_id, false).await?;
        let conversation_id = seed.conversation_id.ok_or_else(|| {
            AppError::NotFound(format!(
                "message '{}' has no conversation id",
                input.message_id
            ))
        })?;

        let items = self
            .ews
            .find_by_conversation(&conversation_id, input.limit)
            .await?;

        Ok(ThreadView {
            conversation_id,
            messages: items.iter().map(MessageSummary::from_ews).collect(),
        })
    }

    async fn list_attachments_impl(
        &self,
        input: ListAttachmentsInput,
    ) -> AppResult<AttachmentList> {
        validate_message_id(&input.message_id)?;

        let item = self.ews.get_message(&input.message_id, false).await?;
        Ok(AttachmentList {
            message_id: item.id,
            attachments: item.attachments.iter().map(AttachmentInfo::from_ews).collect(),
        })
    }

    async fn get_attachment_content_impl(
        &self,
        input: GetAttachmentContentInput,
    ) -> AppResult<AttachmentContent> {
        validate_message_id(&input.message_id)?;
        validate_range(input.max_chars, 100, 500_000, "max_chars")?;
        if input.attachment_id.is_none() == input.attachment_name.is_none() {
            return Err(AppError::invalid(
                "exactly one of attachment_id or attachment_name is required",
            ));
        }

        let item = self.ews.get_message(&input.message_id, false).await?;
        let meta = item
            .attachments
            .iter()
            .find(|a| match (&input.attachment_id, &input.attachment_name) {
                (Some(id), _) => &a.attachment_id == id,
                (None, Some(name)) => a.name.eq_ignore_ascii_case(name),
                (None, None) => false,
            })
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "attachment not found on message '{}'",
                    input.message_id
                ))
            })?;

        let bytes = self.ews.fetch_attachment(&meta.attachment_id).await?;
        let text = content::extract_attachment_text(&meta.name, &bytes)?;
        let (text, truncated) = truncate_chars(text, input.max_chars);

        Ok(AttachmentContent {
            attachment_id: meta.attachment_id.clone(),
            name: meta.name.clone(),
            text,
            truncated,
        })
    }

    async fn send_email_impl(&self, input: SendEmailInput) -> AppResult<SentInfo> {
        let to = parse_recipients(&input.to, "to")?;
        if to.is_empty() {
            return Err(AppError::invalid("to must contain at least one recipient"));
        }
        let cc = parse_recipients(input.cc.as_deref().unwrap_or_default(), "cc")?;
        if input.subject.trim().is_empty() {
            return Err(AppError::invalid("subject must not be blank"));
        }

        let message = OutgoingMessage {
            subject: input.subject.trim().to_owned(),
            body_html: self.renderer.render(&input.body, input.use_signature),
            to: to.clone(),
            cc: cc.clone(),
        };

        let ews = Arc::clone(&self.ews);
        self.with_idempotency(input.idempotency_key.as_deref(), async move {
            ews.send_message(&message).await
        })
        .await?;

        Ok(SentInfo {
            subject: input.subject.trim().to_owned(),
            to,
            cc,
        })
    }

    async fn save_draft_impl(&self, input: SaveDraftInput) -> AppResult<DraftInfo> {
        let to = parse_recipients(input.to.as_deref().unwrap_or_default(), "to")?;
        let cc = parse_recipients(input.cc.as_deref().unwrap_or_default(), "cc")?;
        if input.subject.trim().is_empty() {
            return Err(AppError::invalid("subject must not be blank"));
        }

        let message = OutgoingMessage {
            subject: input.subject.trim().to_owned(),
            body_html: self.renderer.render(&input.body, input.use_signature),
            to,
            cc,
        };

        let ews = Arc::clone(&self.ews);
        let draft_id = self
            .with_idempotency(input.idempotency_key.as_deref(), async move {
                ews.save_draft(&message).await
            })
            .await?;

        Ok(DraftInfo {
            draft_id,
            subject: input.subject.trim().to_owned(),
        })
    }

    async fn reply_email_impl(&self, input: ReplyEmailInput) -> AppResult<SentInfo> {
        validate_message_id(&input.message_id)?;
        if input.body.trim().is_empty() {
            return Err(AppError::invalid("body must not be blank"));
        }

        let original = self.ews.get_message(&input.message_id, false).await?;
        let subject = reply_subject(original.subject.as_deref());
        let body_html = self.renderer.render(&input.body, input.use_signature);

        let ews = Arc::clone(&self.ews);
        let message_id = input.message_id.clone();
        let reply_subject_line = subject.clone();
        self.with_idempotency(input.idempotency_key.as_deref(), async move {
            ews.reply(&message_id, &reply_subject_line, &body_html, input.reply_all)
                .await
        })
        .await?;

        Ok(SentInfo {
            subject,
            to: vec![display_sender(original.sender.as_deref())],
            cc: Vec::new(),
        })
    }

    async fn forward_email_impl(&self, input: ForwardEmailInput) -> AppResult<SentInfo> {
        validate_message_id(&input.message_id)?;
        let to = parse_recipients(&input.to, "to")?;
        if to.is_empty() {
            return Err(AppError::invalid("to must contain at least one recipient"));
        }
        let cc = parse_recipients(input.cc.as_deref().unwrap_or_default(), "cc")?;

        let original = self.ews.get_message(&input.message_id, false).await?;
        let subject = forward_subject(original.subject.as_deref());
        let comment_html = input
            .comment
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| self.renderer.render(c, input.use_signature));

        let ews = Arc::clone(&self.ews);
        let message_id = input.message_id.clone();
        let forward_subject_line = subject.clone();
        let to_for_send = to.clone();
        let cc_for_send = cc.clone();
        self.with_idempotency(input.idempotency_key.as_deref(), async move {
            ews.forward(
                &message_id,
                &forward_subject_line,
                &to_for_send,
                &cc_for_send,
                comment_html.as_deref(),
            )
            .await
        })
        .await?;

        Ok(SentInfo { subject, to, cc })
    }

    async fn mark_as_read_impl(&self, input: MarkAsReadInput) -> AppResult<UpdateResult> {
        validate_message_id(&input.message_id)?;

        // UpdateItem needs a current change key, so fetch the item first.
        let item = self.ews.get_message(&input.message_id, false).await?;
        let key = ItemKey {
            id: item.id,
            change_key: item.change_key,
        };
        self.ews.set_is_read(&[key], input.is_read).await?;

        Ok(UpdateResult {
            updated: 1,
            is_read: input.is_read,
        })
    }

    async fn move_message_impl(&self, input: MoveMessageInput) -> AppResult<MoveResult> {
        validate_message_id(&input.message_id)?;
        validate_folder_name(&input.destination_folder)?;

        let folder = self.ews.resolve_folder(&input.destination_folder).await?;
        self.ews
            .move_messages(&[input.message_id], &folder)
            .await?;

        Ok(MoveResult {
            moved: 1,
            destination_folder: input.destination_folder,
        })
    }

    async fn delete_message_impl(&self, input: DeleteMessageInput) -> AppResult<DeleteResult> {
        validate_message_id(&input.message_id)?;

        self.ews
            .delete_messages(&[input.message_id], input.hard_delete)
            .await?;

        Ok(DeleteResult {
            deleted: 1,
            hard_delete: input.hard_delete,
        })
    }

    async fn batch_mark_as_read_impl(
        &self,
        input: BatchMarkAsReadInput,
    ) -> AppResult<UpdateResult> {
        let ids = parse_id_list(&input.message_ids)?;

        let items = self.ews.get_messages(&ids, false).await?;
        if items.len() != ids.len() {
            return Err(AppError::NotFound(format!(
                "{} of {} message(s) not found",
                ids.len() - items.len(),
                ids.len()
            )));
        }
        let keys = items
            .into_iter()
            .map(|item| ItemKey {
                id: item.id,
                change_key: item.change_key,
            })
            .collect::<Vec<_>>();
        self.ews.set_is_read(&keys, input.is_read).await?;

        Ok(UpdateResult {
            updated: keys.len(),
            is_read: input.is_read,
        })
    }

    async fn batch_move_messages_impl(
        &self,
        input: BatchMoveMessagesInput,
    ) -> AppResult<MoveResult> {
        let ids = parse_id_list(&input.message_ids)?;
        validate_folder_name(&input.destination_folder)?;

        let folder = self.ews.resolve_folder(&input.destination_folder).await?;
        self.ews.move_messages(&ids, &folder).await?;

        Ok(MoveResult {
            moved: ids.len(),
            destination_folder: input.destination_folder,
        })
    }

    /// Run a write operation under the idempotency ledger
    ///
    /// Without a token the operation runs directly. With a token, the token
    /// is acquired as pending before the operation starts, promoted on
    /// success, and released on failure so the same token can be retried.
    /// The ledger lock is never held across the operation itself.
    async fn with_idempotency<T, F>(&self, token: Option<&str>, op: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let Some(token) = token else {
            return op.await;
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::invalid("idempotency_key must not be blank"));
        }
        if token.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(AppError::invalid(format!(
                "idempotency_key must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
            )));
        }

        self.idempotency.lock().await.acquire(token)?;
        match op.await {
            Ok(value) => {
                self.idempotency.lock().await.mark_success(token);
                Ok(value)
            }
            Err(e) => {
                self.idempotency.lock().await.mark_failed(token);
                Err(e)
            }
        }
    }
}

/// Calculate elapsed milliseconds
fn duration_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

/// Build a standardized MCP tool response envelope from business logic output
fn finalize_tool<T>(
    started: Instant,
    result: AppResult<(String, T)>,
) -> Result<Json<ToolEnvelope<T>>, ErrorData>
where
    T: schemars::JsonSchema,
{
    match result {
        Ok((summary, data)) => Ok(Json(ToolEnvelope {
            summary,
            data,
            meta: Meta::now(duration_ms(started)),
        })),
        Err(e) => Err(e.to_error_data()),
    }
}

/// Prefix a reply subject unless it already carries one
fn reply_subject(subject: Option<&str>) -> String {
    let base = display_subject(subject);
    if base.trim_start().to_ascii_lowercase().starts_with("re:") {
        base
    } else {
        format!("Re: {base}")
    }
}

/// Prefix a forward subject unless it already carries one
fn forward_subject(subject: Option<&str>) -> String {
    let base = display_subject(subject);
    let lower = base.trim_start().to_ascii_lowercase();
    if lower.starts_with("fw:") || lower.starts_with("fwd:") {
        base
    } else {
        format!("Fw: {base}")
    }
}

/// Split a comma-separated recipient list into trimmed addresses
fn parse_recipients(raw: &str, field: &str) -> AppResult<Vec<String>> {
    let addresses = raw
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if addresses.len() > MAX_RECIPIENTS {
        return Err(AppError::invalid(format!(
            "{field} must contain at most {MAX_RECIPIENTS} recipients"
        )));
    }
    for address in &addresses {
        if !address.contains('@') || address.chars().any(|ch| ch.is_ascii_control()) {
            return Err(AppError::invalid(format!(
                "{field} contains an invalid address '{address}'"
            )));
        }
    }
    Ok(addresses)
}

/// Split a comma-separated id list into trimmed, validated ids
fn parse_id_list(raw: &str) -> AppResult<Vec<String>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if ids.is_empty() {
        return Err(AppError::invalid(
            "message_ids must contain at least one id",
        ));
    }
    if ids.len() > MAX_BATCH_ITEMS {
        return Err(AppError::invalid(format!(
            "message_ids must contain at most {MAX_BATCH_ITEMS} ids"
        )));
    }
    for id in &ids {
        validate_message_id(id)?;
    }
    Ok(ids)
}

/// Validate an opaque EWS item id
fn validate_message_id(id: &str) -> AppResult<()> {
    if id.is_empty() || id.len() > 1_024 {
        return Err(AppError::invalid("message_id must be 1..1024 characters"));
    }
    if id.chars().any(|ch| ch.is_ascii_control()) {
        return Err(AppError::invalid(
            "message_id must not contain control characters",
        ));
    }
    Ok(())
}

/// Validate a folder name
fn validate_folder_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() || name.len() > 256 {
        return Err(AppError::invalid("folder must be 1..256 characters"));
    }
    if name.chars().any(|ch| ch.is_ascii_control()) {
        return Err(AppError::invalid(
            "folder must not contain control characters",
        ));
    }
    Ok(())
}

/// Validate numeric value in range
fn validate_range(value: usize, min: usize, max: usize, field: &str) -> AppResult<()> {
    if value < min || value > max {
        return Err(AppError::invalid(format!(
            "{field} must be in range {min}..{max}"
        )));
    }
    Ok(())
}

/// Truncate to a character count, reporting whether anything was dropped
fn truncate_chars(text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => {
            let mut truncated = text;
            truncated.truncate(byte_index);
            (truncated, true)
        }
        None => (text, false),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{
        MailEwsServer, forward_subject, parse_id_list, parse_recipients, reply_subject,
        truncate_chars, validate_folder_name, validate_message_id,
    };
    use crate::config::ServerConfig;
    use crate::errors::AppError;

    fn test_server() -> MailEwsServer {
        MailEwsServer::new(ServerConfig {
            endpoint: "https://mail.example.com/EWS/Exchange.asmx".to_owned(),
            username: "user@example.com".to_owned(),
            password: SecretString::from("secret"),
            exchange_version: "Exchange2013".to_owned(),
            signature: String::new(),
            verify_tls: true,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 1_000,
            idempotency_max_entries: 8,
        })
        .expect("server must construct")
    }

    #[test]
    fn reply_subject_adds_prefix_once() {
        assert_eq!(reply_subject(Some("Budget")), "Re: Budget");
        assert_eq!(reply_subject(Some("Re: Budget")), "Re: Budget");
        assert_eq!(reply_subject(Some("RE: Budget")), "RE: Budget");
        assert_eq!(reply_subject(None), "Re: (No Subject)");
    }

    #[test]
    fn forward_subject_accepts_both_prefixes() {
        assert_eq!(forward_subject(Some("Budget")), "Fw: Budget");
        assert_eq!(forward_subject(Some("Fw: Budget")), "Fw: Budget");
        assert_eq!(forward_subject(Some("FWD: Budget")), "FWD: Budget");
    }

    #[test]
    fn recipients_are_split_and_trimmed() {
        let parsed = parse_recipients(" a@example.com , b@example.com,, ", "to")
            .expect("must parse");
        assert_eq!(parsed, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn recipients_without_at_sign_are_rejected() {
        let err = parse_recipients("not-an-address", "to").expect_err("must fail");
        assert!(err.to_string().contains("invalid address"));
    }

    #[test]
    fn id_list_rejects_empty_and_oversized_input() {
        assert!(parse_id_list(" , ,").is_err());
        let big = vec!["AAMk1"; 51].join(",");
        assert!(parse_id_list(&big).is_err());
        let ids = parse_id_list("AAMk1, AAMk2").expect("must parse");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn message_id_and_folder_validation_reject_controls() {
        assert!(validate_message_id("AAMk\n1").is_err());
        assert!(validate_message_id("").is_err());
        assert!(validate_folder_name("Projects\r").is_err());
        assert!(validate_folder_name("Projects").is_ok());
    }

    #[test]
    fn truncation_reports_only_when_dropping() {
        let (text, truncated) = truncate_chars("hello".to_owned(), 10);
        assert_eq!(text, "hello");
        assert!(!truncated);
        let (text, truncated) = truncate_chars("héllo wörld".to_owned(), 4);
        assert_eq!(text, "héll");
        assert!(truncated);
    }

    #[tokio::test]
    async fn idempotent_op_promotes_token_on_success() {
        let server = test_server();
        let first = server
            .with_idempotency(Some("send-1"), async { Ok::<_, AppError>(42) })
            .await;
        assert_eq!(first.expect("first call must succeed"), 42);

        let second = server
            .with_idempotency(Some("send-1"), async { Ok::<_, AppError>(43) })
            .await;
        assert!(matches!(second, Err(AppError::AlreadyProcessed(_))));
    }

    #[tokio::test]
    async fn failed_op_releases_token_for_retry() {
        let server = test_server();
        let first = server
            .with_idempotency(Some("send-2"), async {
                Err::<u32, _>(AppError::Upstream("boom".to_owned()))
            })
            .await;
        assert!(matches!(first, Err(AppError::Upstream(_))));

        let retry = server
            .with_idempotency(Some("send-2"), async { Ok::<_, AppError>(1) })
            .await;
        assert_eq!(retry.expect("retry must succeed"), 1);
    }

    #[tokio::test]
    async fn blank_token_is_rejected_before_acquiring() {
        let server = test_server();
        let result = server
            .with_idempotency(Some("   "), async { Ok::<_, AppError>(()) })
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn missing_token_skips_the_ledger() {
        let server = test_server();
        for _ in 0..3 {
            let result = server
                .with_idempotency(None, async { Ok::<_, AppError>(()) })
                .await;
            assert!(result.is_ok());
        }
    }
}

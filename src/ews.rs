//! EWS transport and mailbox operations
//!
//! Wraps the Exchange Web Services SOAP endpoint behind typed operations.
//! All calls go over a single `reqwest` client with Basic authentication
//! and timeouts from server config. Envelope construction and response
//! parsing live in [`crate::soap`].

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;

use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::soap::{self, EwsMessage};

/// Reference to a mailbox folder
///
/// Either one of the well-known distinguished folders or a concrete folder
/// id resolved via FindFolder.
#[derive(Debug, Clone)]
pub enum FolderRef {
    Distinguished(&'static str),
    Id(String),
}

impl FolderRef {
    /// Render as a folder id element for ParentFolderIds/ToFolderId
    fn to_xml(&self) -> String {
        match self {
            Self::Distinguished(id) => format!("<t:DistinguishedFolderId Id=\"{id}\"/>"),
            Self::Id(id) => format!("<t:FolderId Id=\"{}\"/>", soap::escape(id)),
        }
    }
}

/// Item id plus the change key UpdateItem requires
#[derive(Debug, Clone)]
pub struct ItemKey {
    pub id: String,
    pub change_key: Option<String>,
}

/// Outgoing message fields shared by send and save-draft
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub subject: String,
    pub body_html: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

/// Map a user-facing folder name to a distinguished folder id
///
/// Accepts the common aliases clients use for the standard folders.
pub fn well_known_folder(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "inbox" => Some("inbox"),
        "sent" | "sentitems" | "sent items" => Some("sentitems"),
        "drafts" => Some("drafts"),
        "deleted" | "deleteditems" | "deleted items" | "trash" => Some("deleteditems"),
        "junk" | "junkemail" | "spam" => Some("junkemail"),
        "outbox" => Some("outbox"),
        _ => None,
    }
}

/// Additional properties fetched for message summaries
const SUMMARY_FIELDS: &str = "<t:FieldURI FieldURI=\"item:Subject\"/>\
    <t:FieldURI FieldURI=\"item:DateTimeReceived\"/>\
    <t:FieldURI FieldURI=\"message:Sender\"/>\
    <t:FieldURI FieldURI=\"message:IsRead\"/>\
    <t:FieldURI FieldURI=\"item:HasAttachments\"/>";

/// Additional properties fetched for full message details
const DETAIL_FIELDS: &str = "<t:FieldURI FieldURI=\"item:Subject\"/>\
    <t:FieldURI FieldURI=\"item:DateTimeReceived\"/>\
    <t:FieldURI FieldURI=\"item:DateTimeSent\"/>\
    <t:FieldURI FieldURI=\"message:Sender\"/>\
    <t:FieldURI FieldURI=\"message:IsRead\"/>\
    <t:FieldURI FieldURI=\"item:HasAttachments\"/>\
    <t:FieldURI FieldURI=\"message:ToRecipients\"/>\
    <t:FieldURI FieldURI=\"message:CcRecipients\"/>\
    <t:FieldURI FieldURI=\"item:ConversationId\"/>\
    <t:FieldURI FieldURI=\"item:Attachments\"/>";

/// EWS endpoint client
///
/// One instance per process, shared across tool handlers. Holds the HTTP
/// client, endpoint URL, and credentials.
#[derive(Debug, Clone)]
pub struct EwsClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: secrecy::SecretString,
    version: String,
}

impl EwsClient {
    /// Build the client from server config
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the HTTP client cannot be constructed.
    pub fn new(config: &ServerConfig) -> AppResult<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms));
        if !config.verify_tls {
            tracing::warn!("TLS certificate verification is disabled for the EWS endpoint");
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            version: config.exchange_version.clone(),
        })
    }

    /// POST one SOAP operation and return the verified response body
    ///
    /// # Errors
    ///
    /// - `Timeout` when the request deadline elapses
    /// - `AuthFailed` on HTTP 401
    /// - `NotFound`/`Upstream` from the response-class check
    async fn call(&self, operation: &str, body: &str) -> AppResult<String> {
        let envelope = soap::envelope(&self.version, body);
        tracing::debug!(operation, "sending EWS request");

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Timeout(format!("{operation} timed out"))
                } else if e.is_connect() {
                    AppError::Upstream(format!("cannot reach EWS endpoint: {e}"))
                } else {
                    AppError::Internal(format!("{operation} request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::AuthFailed(
                "EWS rejected the configured credentials".to_owned(),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::Internal(format!("{operation} response read failed: {e}")))?;

        // Faults ride on 500 responses with a SOAP body; surface those
        // before the generic status error.
        soap::check_response(&text)?;
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "{operation} returned HTTP {status}"
            )));
        }
        Ok(text)
    }

    /// Resolve a user-facing folder name to a folder reference
    ///
    /// Well-known names map directly to distinguished folder ids; anything
    /// else is looked up by display name with a deep FindFolder under the
    /// message folder root.
    pub async fn resolve_folder(&self, name: &str) -> AppResult<FolderRef> {
        if let Some(id) = well_known_folder(name) {
            return Ok(FolderRef::Distinguished(id));
        }

        let body = format!(
            "<m:FindFolder Traversal=\"Deep\">\
             <m:FolderShape><t:BaseShape>IdOnly</t:BaseShape>\
             <t:AdditionalProperties><t:FieldURI FieldURI=\"folder:DisplayName\"/></t:AdditionalProperties>\
             </m:FolderShape>\
             <m:Restriction><t:IsEqualTo><t:FieldURI FieldURI=\"folder:DisplayName\"/>\
             <t:FieldURIOrConstant><t:Constant Value=\"{}\"/></t:FieldURIOrConstant>\
             </t:IsEqualTo></m:Restriction>\
             <m:ParentFolderIds><t:DistinguishedFolderId Id=\"msgfolderroot\"/></m:ParentFolderIds>\
             </m:FindFolder>",
            soap::escape(name.trim())
        );
        let xml = self.call("FindFolder", &body).await?;
        let folders = soap::parse_folders(&xml)?;

        folders
            .into_iter()
            .find(|f| f.display_name.eq_ignore_ascii_case(name.trim()))
            .map(|f| FolderRef::Id(f.folder_id))
            .ok_or_else(|| AppError::NotFound(format!("folder '{name}' not found")))
    }

    /// List newest messages in a folder, optionally filtered by an AQS query
    ///
    /// Results are sorted by DateTimeReceived descending.
    pub async fn find_messages(
        &self,
        folder: &FolderRef,
        limit: usize,
        query: Option<&str>,
    ) -> AppResult<Vec<EwsMessage>> {
        let query_element = query
            .map(|q| format!("<m:QueryString>{}</m:QueryString>", soap::escape(q)))
            .unwrap_or_default();
        let body = format!(
            "<m:FindItem Traversal=\"Shallow\">\
             <m:ItemShape><t:BaseShape>IdOnly</t:BaseShape>\
             <t:AdditionalProperties>{SUMMARY_FIELDS}</t:AdditionalProperties></m:ItemShape>\
             <m:IndexedPageItemView MaxEntriesReturned=\"{limit}\" Offset=\"0\" BasePoint=\"Beginning\"/>\
             <m:SortOrder><t:FieldOrder Order=\"Descending\">\
             <t:FieldURI FieldURI=\"item:DateTimeReceived\"/></t:FieldOrder></m:SortOrder>\
             <m:ParentFolderIds>{}</m:ParentFolderIds>\
             {query_element}\
             </m:FindItem>",
            folder.to_xml()
        );
        let xml = self.call("FindItem", &body).await?;
        soap::parse_messages(&xml)
    }

    /// Find messages belonging to a conversation across inbox and sent items
    pub async fn find_by_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> AppResult<Vec<EwsMessage>> {
        let body = format!(
            "<m:FindItem Traversal=\"Shallow\">\
             <m:ItemShape><t:BaseShape>IdOnly</t:BaseShape>\
             <t:AdditionalProperties>{SUMMARY_FIELDS}</t:AdditionalProperties></m:ItemShape>\
             <m:IndexedPageItemView MaxEntriesReturned=\"{limit}\" Offset=\"0\" BasePoint=\"Beginning\"/>\
             <m:Restriction><t:IsEqualTo><t:FieldURI FieldURI=\"item:ConversationId\"/>\
             <t:FieldURIOrConstant><t:Constant Value=\"{}\"/></t:FieldURIOrConstant>\
             </t:IsEqualTo></m:Restriction>\
             <m:SortOrder><t:FieldOrder Order=\"Descending\">\
             <t:FieldURI FieldURI=\"item:DateTimeReceived\"/></t:FieldOrder></m:SortOrder>\
             <m:ParentFolderIds><t:DistinguishedFolderId Id=\"inbox\"/>\
             <t:DistinguishedFolderId Id=\"sentitems\"/></m:ParentFolderIds>\
             </m:FindItem>",
            soap::escape(conversation_id)
        );
        let xml = self.call("FindItem", &body).await?;
        soap::parse_messages(&xml)
    }

    /// Fetch full item details for one or more ids
    ///
    /// `include_body` adds the HTML body to the item shape. Attachment
    /// metadata is always requested.
    pub async fn get_messages(
        &self,
        ids: &[String],
        include_body: bool,
    ) -> AppResult<Vec<EwsMessage>> {
        let body_type = if include_body {
            "<t:BodyType>HTML</t:BodyType>"
        } else {
            ""
        };
        let body_field = if include_body {
            "<t:FieldURI FieldURI=\"item:Body\"/>"
        } else {
            ""
        };
        let body = format!(
            "<m:GetItem>\
             <m:ItemShape><t:BaseShape>IdOnly</t:BaseShape>{body_type}\
             <t:AdditionalProperties>{DETAIL_FIELDS}{body_field}</t:AdditionalProperties>\
             </m:ItemShape>\
             <m:ItemIds>{}</m:ItemIds>\
             </m:GetItem>",
            item_ids_xml(ids)
        );
        let xml = self.call("GetItem", &body).await?;
        soap::parse_messages(&xml)
    }

    /// Fetch a single item, failing with `NotFound` when absent
    pub async fn get_message(&self, id: &str, include_body: bool) -> AppResult<EwsMessage> {
        let ids = [id.to_owned()];
        self.get_messages(&ids, include_body)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("message '{id}' not found")))
    }

    /// Send a message and save a copy to Sent Items
    pub async fn send_message(&self, message: &OutgoingMessage) -> AppResult<()> {
        let body = format!(
            "<m:CreateItem MessageDisposition=\"SendAndSaveCopy\">\
             <m:SavedItemFolderId><t:DistinguishedFolderId Id=\"sentitems\"/></m:SavedItemFolderId>\
             <m:Items>{}</m:Items>\
             </m:CreateItem>",
            outgoing_message_xml(message)
        );
        self.call("CreateItem", &body).await?;
        Ok(())
    }

    /// Save a message to the Drafts folder, returning the new item id
    pub async fn save_draft(&self, message: &OutgoingMessage) -> AppResult<String> {
        let body = format!(
            "<m:CreateItem MessageDisposition=\"SaveOnly\">\
             <m:SavedItemFolderId><t:DistinguishedFolderId Id=\"drafts\"/></m:SavedItemFolderId>\
             <m:Items>{}</m:Items>\
             </m:CreateItem>",
            outgoing_message_xml(message)
        );
        let xml = self.call("CreateItem", &body).await?;
        soap::parse_messages(&xml)?
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| AppError::Upstream("draft saved but no item id returned".to_owned()))
    }

    /// Reply (or reply-all) to an existing message
    pub async fn reply(
        &self,
        reference_id: &str,
        subject: &str,
        body_html: &str,
        reply_all: bool,
    ) -> AppResult<()> {
        let tag = if reply_all {
            "ReplyAllToItem"
        } else {
            "ReplyToItem"
        };
        let body = format!(
            "<m:CreateItem MessageDisposition=\"SendAndSaveCopy\">\
             <m:SavedItemFolderId><t:DistinguishedFolderId Id=\"sentitems\"/></m:SavedItemFolderId>\
             <m:Items><t:{tag}>\
             <t:Subject>{}</t:Subject>\
             {}\
             <t:NewBodyContent BodyType=\"HTML\">{}</t:NewBodyContent>\
             </t:{tag}></m:Items>\
             </m:CreateItem>",
            soap::escape(subject),
            soap::item_id_element("t:ReferenceItemId", reference_id, None),
            soap::escape(body_html)
        );
        self.call("CreateItem", &body).await?;
        Ok(())
    }

    /// Forward an existing message to new recipients
    ///
    /// `body_html` becomes the prefix shown above the forwarded content.
    pub async fn forward(
        &self,
        reference_id: &str,
        subject: &str,
        to: &[String],
        cc: &[String],
        body_html: Option<&str>,
    ) -> AppResult<()> {
        let new_body = body_html
            .map(|html| {
                format!(
                    "<t:NewBodyContent BodyType=\"HTML\">{}</t:NewBodyContent>",
                    soap::escape(html)
                )
            })
            .unwrap_or_default();
        let body = format!(
            "<m:CreateItem MessageDisposition=\"SendAndSaveCopy\">\
             <m:SavedItemFolderId><t:DistinguishedFolderId Id=\"sentitems\"/></m:SavedItemFolderId>\
             <m:Items><t:ForwardItem>\
             <t:Subject>{}</t:Subject>\
             {}{}\
             {}\
             {new_body}\
             </t:ForwardItem></m:Items>\
             </m:CreateItem>",
            soap::escape(subject),
            soap::recipient_list("ToRecipients", to),
            soap::recipient_list("CcRecipients", cc),
            soap::item_id_element("t:ReferenceItemId", reference_id, None)
        );
        self.call("CreateItem", &body).await?;
        Ok(())
    }

    /// Set the IsRead flag on one or more messages in a single request
    pub async fn set_is_read(&self, items: &[ItemKey], is_read: bool) -> AppResult<()> {
        let changes: String = items
            .iter()
            .map(|item| {
                format!(
                    "<t:ItemChange>{}\
                     <t:Updates><t:SetItemField>\
                     <t:FieldURI FieldURI=\"message:IsRead\"/>\
                     <t:Message><t:IsRead>{is_read}</t:IsRead></t:Message>\
                     </t:SetItemField></t:Updates>\
                     </t:ItemChange>",
                    soap::item_id_element("t:ItemId", &item.id, item.change_key.as_deref())
                )
            })
            .collect();
        let body = format!(
            "<m:UpdateItem MessageDisposition=\"SaveOnly\" ConflictResolution=\"AutoResolve\">\
             <m:ItemChanges>{changes}</m:ItemChanges>\
             </m:UpdateItem>"
        );
        self.call("UpdateItem", &body).await?;
        Ok(())
    }

    /// Move one or more messages to a folder in a single request
    pub async fn move_messages(&self, ids: &[String], folder: &FolderRef) -> AppResult<()> {
        let body = format!(
            "<m:MoveItem>\
             <m:ToFolderId>{}</m:ToFolderId>\
             <m:ItemIds>{}</m:ItemIds>\
             </m:MoveItem>",
            folder.to_xml(),
            item_ids_xml(ids)
        );
        self.call("MoveItem", &body).await?;
        Ok(())
    }

    /// Delete messages, either to Deleted Items or permanently
    pub async fn delete_messages(&self, ids: &[String], hard_delete: bool) -> AppResult<()> {
        let delete_type = if hard_delete {
            "HardDelete"
        } else {
            "MoveToDeletedItems"
        };
        let body = format!(
            "<m:DeleteItem DeleteType=\"{delete_type}\">\
             <m:ItemIds>{}</m:ItemIds>\
             </m:DeleteItem>",
            item_ids_xml(ids)
        );
        self.call("DeleteItem", &body).await?;
        Ok(())
    }

    /// Download one attachment's content bytes
    pub async fn fetch_attachment(&self, attachment_id: &str) -> AppResult<Vec<u8>> {
        let body = format!(
            "<m:GetAttachment>\
             <m:AttachmentIds><t:AttachmentId Id=\"{}\"/></m:AttachmentIds>\
             </m:GetAttachment>",
            soap::escape(attachment_id)
        );
        let xml = self.call("GetAttachment", &body).await?;
        let encoded = soap::parse_attachment_content(&xml)?
            .ok_or_else(|| AppError::Upstream("attachment response had no content".to_owned()))?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| AppError::Internal(format!("attachment content is not valid base64: {e}")))
    }
}

/// Render an `<m:ItemIds>` body from raw item ids
fn item_ids_xml(ids: &[String]) -> String {
    ids.iter()
        .map(|id| soap::item_id_element("t:ItemId", id, None))
        .collect()
}

/// Render a `<t:Message>` element for CreateItem
fn outgoing_message_xml(message: &OutgoingMessage) -> String {
    format!(
        "<t:Message>\
         <t:Subject>{}</t:Subject>\
         <t:Body BodyType=\"HTML\">{}</t:Body>\
         {}{}\
         </t:Message>",
        soap::escape(&message.subject),
        soap::escape(&message.body_html),
        soap::recipient_list("ToRecipients", &message.to),
        soap::recipient_list("CcRecipients", &message.cc)
    )
}

#[cfg(test)]
mod tests {
    use super::{FolderRef, OutgoingMessage, item_ids_xml, outgoing_message_xml, well_known_folder};

    #[test]
    fn folder_aliases_resolve_to_distinguished_ids() {
        assert_eq!(well_known_folder("Inbox"), Some("inbox"));
        assert_eq!(well_known_folder(" sent "), Some("sentitems"));
        assert_eq!(well_known_folder("Sent Items"), Some("sentitems"));
        assert_eq!(well_known_folder("trash"), Some("deleteditems"));
        assert_eq!(well_known_folder("spam"), Some("junkemail"));
        assert_eq!(well_known_folder("Projects"), None);
    }

    #[test]
    fn folder_ref_renders_both_variants() {
        assert_eq!(
            FolderRef::Distinguished("inbox").to_xml(),
            "<t:DistinguishedFolderId Id=\"inbox\"/>"
        );
        assert_eq!(
            FolderRef::Id("AQMk\"X".to_owned()).to_xml(),
            "<t:FolderId Id=\"AQMk&quot;X\"/>"
        );
    }

    #[test]
    fn item_ids_render_in_order() {
        let xml = item_ids_xml(&["A".to_owned(), "B".to_owned()]);
        assert_eq!(xml, "<t:ItemId Id=\"A\"/><t:ItemId Id=\"B\"/>");
    }

    #[test]
    fn outgoing_message_escapes_subject_and_body() {
        let xml = outgoing_message_xml(&OutgoingMessage {
            subject: "Q1 <review>".to_owned(),
            body_html: "<p>Hi</p>".to_owned(),
            to: vec!["a@example.com".to_owned()],
            cc: vec![],
        });
        assert!(xml.contains("<t:Subject>Q1 &lt;review&gt;</t:Subject>"));
        assert!(xml.contains("<t:Body BodyType=\"HTML\">&lt;p&gt;Hi&lt;/p&gt;</t:Body>"));
        assert!(xml.contains("<t:ToRecipients>"));
        assert!(!xml.contains("<t:CcRecipients>"));
    }
}

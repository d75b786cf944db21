//! EWS SOAP plumbing
//!
//! Builds SOAP envelopes for Exchange Web Services requests and parses the
//! XML responses into typed items using `quick-xml`. Only the elements the
//! server actually consumes are modeled; everything else is skipped.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::errors::{AppError, AppResult};

/// SOAP envelope namespace
const NS_SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// EWS types namespace (prefix `t`)
const NS_TYPES: &str = "http://schemas.microsoft.com/exchange/services/2006/types";
/// EWS messages namespace (prefix `m`)
const NS_MESSAGES: &str = "http://schemas.microsoft.com/exchange/services/2006/messages";

/// Item elements that may appear under `<Items>` in a response
const ITEM_TAGS: [&str; 6] = [
    "Message",
    "Item",
    "MeetingRequest",
    "MeetingResponse",
    "MeetingCancellation",
    "MeetingMessage",
];

/// Folder elements that may appear under `<Folders>` in a response
const FOLDER_TAGS: [&str; 5] = [
    "Folder",
    "CalendarFolder",
    "ContactsFolder",
    "SearchFolder",
    "TasksFolder",
];

/// Message item as returned by FindItem/GetItem
///
/// Fields not requested in the item shape stay `None`/empty.
#[derive(Debug, Clone, Default)]
pub struct EwsMessage {
    /// EWS item id
    pub id: String,
    /// Change key required by UpdateItem
    pub change_key: Option<String>,
    pub subject: Option<String>,
    /// Sender SMTP address
    pub sender: Option<String>,
    pub datetime_received: Option<String>,
    pub datetime_sent: Option<String>,
    pub is_read: Option<bool>,
    pub has_attachments: Option<bool>,
    pub conversation_id: Option<String>,
    pub to_recipients: Vec<String>,
    pub cc_recipients: Vec<String>,
    /// HTML body, present only when the item shape requested it
    pub body_html: Option<String>,
    /// File attachment metadata, present only when requested
    pub attachments: Vec<AttachmentMeta>,
}

/// File attachment metadata from the `<Attachments>` element
#[derive(Debug, Clone, Default)]
pub struct AttachmentMeta {
    pub attachment_id: String,
    pub name: String,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub is_inline: bool,
}

/// Folder as returned by FindFolder
#[derive(Debug, Clone, Default)]
pub struct EwsFolder {
    pub folder_id: String,
    pub display_name: String,
}

/// Escape text for XML element content or attribute values
pub fn escape(value: &str) -> String {
    quick_xml::escape::escape(value).into_owned()
}

/// Wrap an operation body in a complete SOAP envelope
///
/// `version` is the Exchange schema version advertised in the header
/// (e.g. `Exchange2013`).
pub fn envelope(version: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <soap:Envelope xmlns:soap=\"{NS_SOAP}\" xmlns:t=\"{NS_TYPES}\" xmlns:m=\"{NS_MESSAGES}\">\
         <soap:Header><t:RequestServerVersion Version=\"{}\"/></soap:Header>\
         <soap:Body>{body}</soap:Body></soap:Envelope>",
        escape(version)
    )
}

/// Render a recipient list element (e.g. `<t:ToRecipients>...</t:ToRecipients>`)
///
/// Returns an empty string for an empty address list so the element is
/// omitted entirely.
pub fn recipient_list(tag: &str, addresses: &[String]) -> String {
    if addresses.is_empty() {
        return String::new();
    }
    let mailboxes: String = addresses
        .iter()
        .map(|addr| format!("<t:Mailbox><t:EmailAddress>{}</t:EmailAddress></t:Mailbox>", escape(addr)))
        .collect();
    format!("<t:{tag}>{mailboxes}</t:{tag}>")
}

/// Render an `<t:ItemId>` reference element with optional change key
pub fn item_id_element(tag_prefix: &str, id: &str, change_key: Option<&str>) -> String {
    match change_key {
        Some(ck) => format!(
            "<{tag_prefix} Id=\"{}\" ChangeKey=\"{}\"/>",
            escape(id),
            escape(ck)
        ),
        None => format!("<{tag_prefix} Id=\"{}\"/>", escape(id)),
    }
}

/// Check a response body for SOAP faults and error response messages
///
/// Scans for `soap:Fault` and for any `*ResponseMessage` element carrying
/// `ResponseClass="Error"`, collecting its `ResponseCode` and `MessageText`.
///
/// # Errors
///
/// - `NotFound` when the response code is `ErrorItemNotFound` or
///   `ErrorFolderNotFound`
/// - `Upstream` for every other error class or fault
pub fn check_response(xml: &str) -> AppResult<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_fault = false;
    let mut in_error = false;
    let mut capture: Option<&'static str> = None;
    let mut fault_string = String::new();
    let mut response_code = String::new();
    let mut message_text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name == "Fault" {
                    in_fault = true;
                }
                if in_fault && name == "faultstring" {
                    capture = Some("fault");
                }
                if name.ends_with("ResponseMessage") && attr_value(&e, "ResponseClass")?.as_deref() == Some("Error") {
                    in_error = true;
                }
                if in_error && response_code.is_empty() && name == "ResponseCode" {
                    capture = Some("code");
                }
                if in_error && message_text.is_empty() && name == "MessageText" {
                    capture = Some("text");
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(target) = capture {
                    let text = t
                        .unescape()
                        .map_err(|e| AppError::Internal(format!("malformed EWS response: {e}")))?;
                    match target {
                        "fault" => fault_string.push_str(&text),
                        "code" => response_code.push_str(&text),
                        _ => message_text.push_str(&text),
                    }
                }
            }
            Ok(Event::End(_)) => capture = None,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::Internal(format!("malformed EWS response: {e}")));
            }
        }
    }

    if !fault_string.is_empty() {
        return Err(AppError::Upstream(format!("SOAP fault: {fault_string}")));
    }
    if !response_code.is_empty() && response_code != "NoError" {
        let detail = if message_text.is_empty() {
            response_code.clone()
        } else {
            format!("{response_code}: {message_text}")
        };
        if response_code == "ErrorItemNotFound" || response_code == "ErrorFolderNotFound" {
            return Err(AppError::NotFound(detail));
        }
        return Err(AppError::Upstream(detail));
    }
    Ok(())
}

/// Parse all message items from a FindItem/GetItem/CreateItem response
pub fn parse_messages(xml: &str) -> AppResult<Vec<EwsMessage>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<EwsMessage> = None;
    let mut item_depth = 0usize;
    let mut attachment: Option<AttachmentMeta> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                stack.push(name.clone());

                if current.is_none()
                    && ITEM_TAGS.contains(&name.as_str())
                    && parent_is(&stack, "Items")
                {
                    current = Some(EwsMessage::default());
                    item_depth = stack.len();
                } else if current.is_some()
                    && attachment.is_none()
                    && (name == "FileAttachment" || name == "ItemAttachment")
                    && stack.iter().any(|n| n == "Attachments")
                {
                    attachment = Some(AttachmentMeta::default());
                } else {
                    apply_attributes(&e, &name, current.as_mut(), attachment.as_mut())?;
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                apply_attributes(&e, &name, current.as_mut(), attachment.as_mut())?;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| AppError::Internal(format!("malformed EWS response: {e}")))?;
                apply_text(&stack, &text, current.as_mut(), attachment.as_mut());
            }
            Ok(Event::End(_)) => {
                if attachment.is_some()
                    && matches!(
                        stack.last().map(String::as_str),
                        Some("FileAttachment" | "ItemAttachment")
                    )
                {
                    if let (Some(msg), Some(att)) = (current.as_mut(), attachment.take())
                        && (!att.attachment_id.is_empty() || !att.name.is_empty())
                    {
                        msg.attachments.push(att);
                    }
                } else if current.is_some()
                    && stack.len() == item_depth
                    && ITEM_TAGS.contains(&stack[item_depth - 1].as_str())
                {
                    let msg = current.take().unwrap_or_default();
                    if !msg.id.is_empty() {
                        out.push(msg);
                    }
                }
                stack.pop();
            }
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::Internal(format!("malformed EWS response: {e}")));
            }
        }
    }

    Ok(out)
}

/// Parse folders from a FindFolder response
pub fn parse_folders(xml: &str) -> AppResult<Vec<EwsFolder>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<EwsFolder> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                stack.push(name.clone());
                if current.is_none()
                    && FOLDER_TAGS.contains(&name.as_str())
                    && parent_is(&stack, "Folders")
                {
                    current = Some(EwsFolder::default());
                }
            }
            Ok(Event::Empty(e)) => {
                if local_name(&e) == "FolderId"
                    && let Some(folder) = current.as_mut()
                    && folder.folder_id.is_empty()
                    && let Some(id) = attr_value(&e, "Id")?
                {
                    folder.folder_id = id;
                }
            }
            Ok(Event::Text(t)) => {
                if stack.last().map(String::as_str) == Some("DisplayName")
                    && let Some(folder) = current.as_mut()
                {
                    let text = t
                        .unescape()
                        .map_err(|e| AppError::Internal(format!("malformed EWS response: {e}")))?;
                    folder.display_name.push_str(&text);
                }
            }
            Ok(Event::End(_)) => {
                if let Some(name) = stack.last()
                    && FOLDER_TAGS.contains(&name.as_str())
                    && parent_is(&stack, "Folders")
                    && let Some(folder) = current.take()
                    && !folder.folder_id.is_empty()
                {
                    out.push(folder);
                }
                stack.pop();
            }
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::Internal(format!("malformed EWS response: {e}")));
            }
        }
    }

    Ok(out)
}

/// Parse base64 attachment content from a GetAttachment response
pub fn parse_attachment_content(xml: &str) -> AppResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_content = false;
    let mut content = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => in_content = local_name(&e) == "Content",
            Ok(Event::Text(t)) if in_content => {
                let text = t
                    .unescape()
                    .map_err(|e| AppError::Internal(format!("malformed EWS response: {e}")))?;
                content.push_str(text.trim());
            }
            Ok(Event::End(_)) => in_content = false,
            Ok(_) => {}
            Err(e) => {
                return Err(AppError::Internal(format!("malformed EWS response: {e}")));
            }
        }
    }

    Ok((!content.is_empty()).then_some(content))
}

/// Local element name without namespace prefix
fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Whether the element below the top of the stack has the given name
fn parent_is(stack: &[String], name: &str) -> bool {
    stack.len() >= 2 && stack[stack.len() - 2] == name
}

/// Read a single attribute value by local name
fn attr_value(e: &BytesStart<'_>, key: &str) -> AppResult<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| AppError::Internal(format!("malformed EWS attribute: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Apply id-bearing elements (`ItemId`, `ConversationId`, `AttachmentId`)
/// to the message or attachment under construction
fn apply_attributes(
    e: &BytesStart<'_>,
    name: &str,
    current: Option<&mut EwsMessage>,
    attachment: Option<&mut AttachmentMeta>,
) -> AppResult<()> {
    match name {
        "ItemId" => {
            if let Some(msg) = current
                && msg.id.is_empty()
            {
                if let Some(id) = attr_value(e, "Id")? {
                    msg.id = id;
                }
                msg.change_key = attr_value(e, "ChangeKey")?;
            }
        }
        "ConversationId" => {
            if let Some(msg) = current
                && msg.conversation_id.is_none()
            {
                msg.conversation_id = attr_value(e, "Id")?;
            }
        }
        "AttachmentId" => {
            if let Some(att) = attachment
                && att.attachment_id.is_empty()
                && let Some(id) = attr_value(e, "Id")?
            {
                att.attachment_id = id;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Assign a text node to the right field based on its enclosing element
fn apply_text(
    stack: &[String],
    text: &str,
    current: Option<&mut EwsMessage>,
    attachment: Option<&mut AttachmentMeta>,
) {
    let Some(container) = stack.last().map(String::as_str) else {
        return;
    };

    if let Some(att) = attachment {
        match container {
            "Name" => att.name.push_str(text),
            "ContentType" => att.content_type = Some(text.to_owned()),
            "Size" => att.size_bytes = text.parse().ok(),
            "IsInline" => att.is_inline = text == "true",
            _ => {}
        }
        return;
    }

    let Some(msg) = current else {
        return;
    };
    match container {
        "Subject" => {
            msg.subject.get_or_insert_with(String::new).push_str(text);
        }
        "DateTimeReceived" => msg.datetime_received = Some(text.to_owned()),
        "DateTimeSent" => msg.datetime_sent = Some(text.to_owned()),
        "IsRead" => msg.is_read = Some(text == "true"),
        "HasAttachments" => msg.has_attachments = Some(text == "true"),
        "Body" => {
            msg.body_html.get_or_insert_with(String::new).push_str(text);
        }
        "EmailAddress" => {
            if stack.iter().any(|n| n == "Sender" || n == "From") {
                if msg.sender.is_none() {
                    msg.sender = Some(text.to_owned());
                }
            } else if stack.iter().any(|n| n == "ToRecipients") {
                msg.to_recipients.push(text.to_owned());
            } else if stack.iter().any(|n| n == "CcRecipients") {
                msg.cc_recipients.push(text.to_owned());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::{
        check_response, envelope, escape, parse_attachment_content, parse_folders, parse_messages,
        recipient_list,
    };

    const FIND_ITEM_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <m:FindItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
                        xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:FindItemResponseMessage ResponseClass="Success">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:RootFolder TotalItemsInView="2" IncludesLastItemInRange="true">
            <t:Items>
              <t:Message>
                <t:ItemId Id="AAMkAGI1" ChangeKey="CQAAAB"/>
                <t:Subject>Quarterly report &amp; notes</t:Subject>
                <t:Sender><t:Mailbox><t:EmailAddress>alice@example.com</t:EmailAddress></t:Mailbox></t:Sender>
                <t:DateTimeReceived>2026-03-01T10:00:00Z</t:DateTimeReceived>
                <t:IsRead>false</t:IsRead>
                <t:HasAttachments>true</t:HasAttachments>
              </t:Message>
              <t:Message>
                <t:ItemId Id="AAMkAGI2" ChangeKey="CQAAAC"/>
                <t:Subject>Re: lunch</t:Subject>
                <t:Sender><t:Mailbox><t:EmailAddress>bob@example.com</t:EmailAddress></t:Mailbox></t:Sender>
                <t:DateTimeReceived>2026-03-01T09:00:00Z</t:DateTimeReceived>
                <t:IsRead>true</t:IsRead>
                <t:HasAttachments>false</t:HasAttachments>
              </t:Message>
            </t:Items>
          </m:RootFolder>
        </m:FindItemResponseMessage>
      </m:ResponseMessages>
    </m:FindItemResponse>
  </s:Body>
</s:Envelope>"#;

    const GET_ITEM_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <m:GetItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages"
                       xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
      <m:ResponseMessages>
        <m:GetItemResponseMessage ResponseClass="Success">
          <m:ResponseCode>NoError</m:ResponseCode>
          <m:Items>
            <t:Message>
              <t:ItemId Id="AAMkAGI1" ChangeKey="CQAAAB"/>
              <t:Subject>Hello</t:Subject>
              <t:Body BodyType="HTML">&lt;p&gt;Hi &amp;amp; bye&lt;/p&gt;</t:Body>
              <t:Sender><t:Mailbox><t:EmailAddress>alice@example.com</t:EmailAddress></t:Mailbox></t:Sender>
              <t:ToRecipients>
                <t:Mailbox><t:EmailAddress>me@example.com</t:EmailAddress></t:Mailbox>
                <t:Mailbox><t:EmailAddress>you@example.com</t:EmailAddress></t:Mailbox>
              </t:ToRecipients>
              <t:CcRecipients>
                <t:Mailbox><t:EmailAddress>cc@example.com</t:EmailAddress></t:Mailbox>
              </t:CcRecipients>
              <t:ConversationId Id="CONV1"/>
              <t:DateTimeSent>2026-03-01T09:59:00Z</t:DateTimeSent>
              <t:Attachments>
                <t:FileAttachment>
                  <t:AttachmentId Id="ATT1"/>
                  <t:Name>report.pdf</t:Name>
                  <t:ContentType>application/pdf</t:ContentType>
                  <t:Size>1024</t:Size>
                  <t:IsInline>false</t:IsInline>
                </t:FileAttachment>
              </t:Attachments>
            </t:Message>
          </m:Items>
        </m:GetItemResponseMessage>
      </m:ResponseMessages>
    </m:GetItemResponse>
  </s:Body>
</s:Envelope>"#;

    const ERROR_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <m:GetItemResponse xmlns:m="http://schemas.microsoft.com/exchange/services/2006/messages">
      <m:ResponseMessages>
        <m:GetItemResponseMessage ResponseClass="Error">
          <m:MessageText>The specified object was not found in the store.</m:MessageText>
          <m:ResponseCode>ErrorItemNotFound</m:ResponseCode>
        </m:GetItemResponseMessage>
      </m:ResponseMessages>
    </m:GetItemResponse>
  </s:Body>
</s:Envelope>"#;

    #[test]
    fn envelope_includes_version_and_body() {
        let xml = envelope("Exchange2013", "<m:GetFolder/>");
        assert!(xml.contains("RequestServerVersion Version=\"Exchange2013\""));
        assert!(xml.contains("<soap:Body><m:GetFolder/></soap:Body>"));
    }

    #[test]
    fn escape_handles_markup_characters() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn recipient_list_renders_mailboxes() {
        let xml = recipient_list(
            "ToRecipients",
            &["a@example.com".to_owned(), "b@example.com".to_owned()],
        );
        assert!(xml.starts_with("<t:ToRecipients>"));
        assert!(xml.contains("<t:EmailAddress>a@example.com</t:EmailAddress>"));
        assert!(xml.contains("<t:EmailAddress>b@example.com</t:EmailAddress>"));
        assert!(xml.ends_with("</t:ToRecipients>"));

        assert_eq!(recipient_list("CcRecipients", &[]), "");
    }

    #[test]
    fn parses_find_item_summaries() {
        let messages = parse_messages(FIND_ITEM_RESPONSE).expect("parse succeeds");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "AAMkAGI1");
        assert_eq!(messages[0].change_key.as_deref(), Some("CQAAAB"));
        assert_eq!(
            messages[0].subject.as_deref(),
            Some("Quarterly report & notes")
        );
        assert_eq!(messages[0].sender.as_deref(), Some("alice@example.com"));
        assert_eq!(messages[0].is_read, Some(false));
        assert_eq!(messages[0].has_attachments, Some(true));
        assert_eq!(messages[1].id, "AAMkAGI2");
        assert_eq!(messages[1].is_read, Some(true));
    }

    #[test]
    fn parses_get_item_detail() {
        let messages = parse_messages(GET_ITEM_RESPONSE).expect("parse succeeds");
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.body_html.as_deref(), Some("<p>Hi &amp; bye</p>"));
        assert_eq!(msg.to_recipients, ["me@example.com", "you@example.com"]);
        assert_eq!(msg.cc_recipients, ["cc@example.com"]);
        assert_eq!(msg.conversation_id.as_deref(), Some("CONV1"));
        assert_eq!(msg.datetime_sent.as_deref(), Some("2026-03-01T09:59:00Z"));
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].attachment_id, "ATT1");
        assert_eq!(msg.attachments[0].name, "report.pdf");
        assert_eq!(msg.attachments[0].size_bytes, Some(1024));
        assert!(!msg.attachments[0].is_inline);
    }

    #[test]
    fn error_response_maps_not_found() {
        let err = check_response(ERROR_RESPONSE).expect_err("must fail");
        assert!(matches!(err, crate::errors::AppError::NotFound(_)));
        assert!(err.to_string().contains("ErrorItemNotFound"));
    }

    #[test]
    fn success_response_passes_check() {
        check_response(FIND_ITEM_RESPONSE).expect("success response is clean");
        check_response(GET_ITEM_RESPONSE).expect("success response is clean");
    }

    #[test]
    fn parses_folders_from_find_folder() {
        let xml = r#"<Envelope><Body><FindFolderResponse>
          <ResponseMessages><FindFolderResponseMessage ResponseClass="Success">
            <RootFolder><Folders>
              <Folder><FolderId Id="F1" ChangeKey="CK1"/><DisplayName>Projects</DisplayName></Folder>
              <Folder><FolderId Id="F2"/><DisplayName>Archive</DisplayName></Folder>
            </Folders></RootFolder>
          </FindFolderResponseMessage></ResponseMessages>
        </FindFolderResponse></Body></Envelope>"#;
        let folders = parse_folders(xml).expect("parse succeeds");
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].folder_id, "F1");
        assert_eq!(folders[0].display_name, "Projects");
        assert_eq!(folders[1].display_name, "Archive");
    }

    #[test]
    fn parses_attachment_content() {
        let xml = r#"<Envelope><Body><GetAttachmentResponse>
          <ResponseMessages><GetAttachmentResponseMessage ResponseClass="Success">
            <Attachments><FileAttachment>
              <AttachmentId Id="ATT1"/>
              <Name>notes.txt</Name>
              <Content>aGVsbG8=</Content>
            </FileAttachment></Attachments>
          </GetAttachmentResponseMessage></ResponseMessages>
        </GetAttachmentResponse></Body></Envelope>"#;
        let content = parse_attachment_content(xml).expect("parse succeeds");
        assert_eq!(content.as_deref(), Some("aGVsbG8="));
    }
}

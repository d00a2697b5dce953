//! Webhook event parsing.
//!
//! Provider events arrive in several shapes depending on event type and
//! provider version. The parser locates the first message record, filters
//! the bot's own messages, and extracts text and media fragments.

use {
    murmur_common::{InboundFragment, MediaKey, MediaKind, MediaRef},
    serde_json::Value,
    tracing::warn,
};

/// Outcome of parsing one webhook event.
#[derive(Debug, PartialEq, Eq)]
pub enum ParsedEvent {
    Skip(SkipReason),
    Message(ParsedMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Event type carries no inbound message.
    UnsupportedEvent,
    /// No message record found where one was expected.
    NoMessage,
    /// Sent by the bot itself.
    FromMe,
    /// No sender identifier could be extracted.
    NoSender,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnsupportedEvent => "unsupported_event",
            Self::NoMessage => "no_message",
            Self::FromMe => "from_me",
            Self::NoSender => "no_sender",
        }
    }
}

/// A message record reduced to its sender and content.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Sender as delivered by the provider (jid user part); not yet normalized.
    pub sender: String,
    /// Zero or more fragments in display order. Empty for unsupported content.
    pub fragments: Vec<InboundFragment>,
}

const MEDIA_FIELDS: &[(&str, MediaKind)] = &[
    ("audioMessage", MediaKind::Audio),
    ("pttMessage", MediaKind::Audio),
    ("imageMessage", MediaKind::Image),
    ("stickerMessage", MediaKind::Image),
    ("videoMessage", MediaKind::Video),
    ("documentMessage", MediaKind::Document),
];

/// Parse a decoded webhook body.
pub fn parse_event(payload: &Value) -> ParsedEvent {
    let event = payload.get("event").and_then(Value::as_str).unwrap_or("");
    let data = payload.get("data").unwrap_or(&Value::Null);

    match event {
        "messages.upsert" | "messages.received" => {
            let Some(record) = message_record(data) else {
                return ParsedEvent::Skip(SkipReason::NoMessage);
            };
            parse_record(record, data, None)
        },
        "chats.update" => {
            let Some(chat) = data.get("chats").and_then(first) else {
                return ParsedEvent::Skip(SkipReason::NoMessage);
            };
            let Some(record) = chat
                .get("messages")
                .and_then(first)
                .map(unwrap_record)
            else {
                return ParsedEvent::Skip(SkipReason::NoMessage);
            };
            let chat_id = chat.get("id").and_then(non_empty_str);
            parse_record(record, data, chat_id)
        },
        _ => ParsedEvent::Skip(SkipReason::UnsupportedEvent),
    }
}

fn parse_record(record: &Value, data: &Value, chat_id: Option<&str>) -> ParsedEvent {
    if is_from_me(record) {
        return ParsedEvent::Skip(SkipReason::FromMe);
    }
    let Some(sender) = sender_of(record, data, chat_id) else {
        return ParsedEvent::Skip(SkipReason::NoSender);
    };

    ParsedEvent::Message(ParsedMessage {
        sender: jid_user(sender).to_string(),
        fragments: fragments_of(record),
    })
}

/// First message record of a message event: `data.messages` (object or
/// array), `data.message`, or `data` itself.
fn message_record(data: &Value) -> Option<&Value> {
    if let Some(messages) = data.get("messages") {
        return first(messages);
    }
    if let Some(message) = data.get("message").filter(|m| m.get("key").is_some()) {
        return Some(message);
    }
    data.is_object().then_some(data)
}

/// Chat updates wrap each record in `{ "message": { key, message } }`.
fn unwrap_record(entry: &Value) -> &Value {
    if entry.get("key").is_none()
        && let Some(inner) = entry.get("message").filter(|m| m.is_object())
    {
        return inner;
    }
    entry
}

fn first(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first(),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

fn is_from_me(record: &Value) -> bool {
    record.pointer("/key/fromMe").and_then(Value::as_bool) == Some(true)
        || record.get("fromMe").and_then(Value::as_bool) == Some(true)
}

fn sender_of<'a>(record: &'a Value, data: &'a Value, chat_id: Option<&'a str>) -> Option<&'a str> {
    let remote_jid = record.pointer("/key/remoteJid").and_then(non_empty_str);

    // Group messages name the group in remoteJid; the person is the participant.
    let group = remote_jid.or(chat_id).is_some_and(|jid| jid.ends_with("@g.us"));
    if group {
        return record
            .pointer("/key/participant")
            .and_then(non_empty_str)
            .or_else(|| record.get("participant").and_then(non_empty_str));
    }

    chat_id
        .or(remote_jid)
        .or_else(|| record.get("from").and_then(non_empty_str))
        .or_else(|| data.get("from").and_then(non_empty_str))
}

/// User part of a jid: `972501234567:3@s.whatsapp.net` -> `972501234567`.
fn jid_user(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    user.split(':').next().unwrap_or(user)
}

fn fragments_of(record: &Value) -> Vec<InboundFragment> {
    let content = record
        .get("message")
        .filter(|m| m.is_object())
        .unwrap_or(record);

    let mut fragments = Vec::new();

    if let Some((body, kind)) = MEDIA_FIELDS
        .iter()
        .find_map(|(field, kind)| content.get(*field).map(|body| (body, *kind)))
    {
        if let Some(media) = media_ref(body, kind) {
            fragments.push(InboundFragment::MediaRef(media));
        }
        if let Some(caption) = body.get("caption").and_then(non_empty_str) {
            fragments.push(InboundFragment::text(caption));
        }
        return fragments;
    }

    if let Some(text) = text_of(record, content) {
        fragments.push(InboundFragment::text(text));
    }
    fragments
}

fn text_of<'a>(record: &'a Value, content: &'a Value) -> Option<&'a str> {
    content
        .get("conversation")
        .and_then(non_empty_str)
        .or_else(|| content.pointer("/extendedTextMessage/text").and_then(non_empty_str))
        .or_else(|| record.pointer("/text/body").and_then(non_empty_str))
        .or_else(|| record.get("text").and_then(non_empty_str))
        .or_else(|| record.get("body").and_then(non_empty_str))
        .or_else(|| record.get("conversation").and_then(non_empty_str))
}

fn media_ref(body: &Value, kind: MediaKind) -> Option<MediaRef> {
    let url = body
        .get("directPath")
        .and_then(non_empty_str)
        .or_else(|| body.get("url").and_then(non_empty_str))?;

    let key = body
        .get("mediaKey")
        .and_then(non_empty_str)
        .and_then(|encoded| match MediaKey::from_base64(encoded) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(kind = %kind, error = %e, "ignoring unusable media key");
                None
            },
        });

    Some(MediaRef {
        url: url.to_string(),
        key,
        mime: body
            .get("mimetype")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        kind,
    })
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

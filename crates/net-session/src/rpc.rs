//! RPC envelopes and reply parsing

use serde_json::{Map, Value};

use ncif_apply::RpcReply;
use ncif_config::tree::{self, TEXT_KEY};
use ncif_core::{Datastore, Filter, SessionError, NETCONF_BASE_NAMESPACE};

pub const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";
pub const CANDIDATE_CAPABILITY: &str = "urn:ietf:params:netconf:capability:candidate:1.0";
pub const VALIDATE_CAPABILITY: &str = "urn:ietf:params:netconf:capability:validate:1.0";

/// Client `<hello>` advertising base 1.0 only
pub fn hello() -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <hello xmlns=\"{}\"><capabilities><capability>{}</capability></capabilities></hello>",
        NETCONF_BASE_NAMESPACE, BASE_CAPABILITY
    )
}

/// Wrap an operation in an `<rpc>` element
pub fn envelope(message_id: u64, operation: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <rpc message-id=\"{}\" xmlns=\"{}\">{}</rpc>",
        message_id, NETCONF_BASE_NAMESPACE, operation
    )
}

pub fn get_config(source: Datastore, filter: &Filter) -> String {
    let selector = filter.as_str().trim();
    let filter = if selector.starts_with("<filter") {
        selector.to_string()
    } else {
        format!("<filter type=\"subtree\">{}</filter>", selector)
    };
    format!(
        "<get-config><source><{}/></source>{}</get-config>",
        source, filter
    )
}

pub fn lock(target: Datastore) -> String {
    format!("<lock><target><{}/></target></lock>", target)
}

pub fn unlock(target: Datastore) -> String {
    format!("<unlock><target><{}/></target></unlock>", target)
}

pub fn edit_config(target: Datastore, config: &str) -> String {
    format!(
        "<edit-config><target><{}/></target>{}</edit-config>",
        target,
        strip_declaration(config)
    )
}

pub fn validate(source: Datastore) -> String {
    format!("<validate><source><{}/></source></validate>", source)
}

pub const COMMIT: &str = "<commit/>";
pub const DISCARD_CHANGES: &str = "<discard-changes/>";
pub const CLOSE_SESSION: &str = "<close-session/>";

fn strip_declaration(document: &str) -> &str {
    let document = document.trim_start();
    if document.starts_with("<?xml") {
        if let Some(end) = document.find("?>") {
            return document[end + 2..].trim_start();
        }
    }
    document
}

/// Look up a child by local name, ignoring any namespace prefix
fn child<'a>(fields: &'a Map<String, Value>, local: &str) -> Option<&'a Value> {
    fields.iter().find_map(|(name, value)| {
        let name = name.rsplit(':').next().unwrap_or(name);
        (name == local).then_some(value)
    })
}

fn root<'a>(tree: &'a Value, local: &str) -> Result<&'a Value, SessionError> {
    tree.as_object()
        .and_then(|roots| child(roots, local))
        .ok_or_else(|| SessionError::Protocol(format!("expected <{}> from device", local)))
}

/// Capabilities announced in the server `<hello>`
pub fn parse_hello(raw: &str) -> Result<Vec<String>, SessionError> {
    let tree = tree::from_xml(raw).map_err(|e| SessionError::Protocol(e.to_string()))?;
    let hello = root(&tree, "hello")?;

    let capabilities = hello
        .as_object()
        .and_then(|fields| child(fields, "capabilities"))
        .and_then(Value::as_object)
        .and_then(|fields| child(fields, "capability"));

    let capabilities: Vec<String> = match capabilities {
        Some(Value::Array(items)) => items.iter().filter_map(text_of).collect(),
        Some(single) => text_of(single).into_iter().collect(),
        None => Vec::new(),
    };

    if !capabilities.iter().any(|c| c == BASE_CAPABILITY) {
        return Err(SessionError::Protocol(
            "device does not speak NETCONF base 1.0".to_string(),
        ));
    }
    Ok(capabilities)
}

/// An `<rpc-reply>` as seen while waiting for a given message-id
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyMatch {
    /// Reply to the awaited rpc, or one carrying no message-id
    Current(Map<String, Value>),
    /// Late reply to an earlier rpc that was given up on
    Stale(u64),
}

/// Classify a raw `<rpc-reply>` against the awaited `message_id`.
///
/// Replies to later message-ids, or with an unreadable id, are protocol
/// errors.
pub fn match_reply(raw: &str, message_id: u64) -> Result<ReplyMatch, SessionError> {
    let tree = tree::from_xml(raw).map_err(|e| SessionError::Protocol(e.to_string()))?;
    let reply = root(&tree, "rpc-reply")?;

    let fields = match reply {
        Value::Object(fields) => fields.clone(),
        Value::Null => Map::new(),
        _ => {
            return Err(SessionError::Protocol(
                "rpc-reply carries only text".to_string(),
            ))
        }
    };

    let id = match child(&fields, "@message-id").and_then(Value::as_str) {
        Some(id) => id,
        None => return Ok(ReplyMatch::Current(fields)),
    };
    match id.trim().parse::<u64>() {
        Ok(id) if id == message_id => Ok(ReplyMatch::Current(fields)),
        Ok(id) if id < message_id => Ok(ReplyMatch::Stale(id)),
        _ => Err(SessionError::Protocol(format!(
            "reply for message-id {} while waiting for {}",
            id, message_id
        ))),
    }
}

/// Contents of an `<rpc-reply>` answering `message_id`
pub fn parse_reply(raw: &str, message_id: u64) -> Result<Map<String, Value>, SessionError> {
    match match_reply(raw, message_id)? {
        ReplyMatch::Current(fields) => Ok(fields),
        ReplyMatch::Stale(id) => Err(SessionError::Protocol(format!(
            "reply for message-id {} while waiting for {}",
            id, message_id
        ))),
    }
}

/// `error-message` texts of every `<rpc-error>` with error severity
pub fn rpc_errors(fields: &Map<String, Value>) -> Vec<String> {
    let errors = match child(fields, "rpc-error") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
        None => Vec::new(),
    };

    errors
        .into_iter()
        .filter_map(|error| {
            let error = error.as_object()?;
            let severity = child(error, "error-severity").and_then(text_of);
            if severity.as_deref() == Some("warning") {
                return None;
            }
            let message = child(error, "error-message")
                .and_then(text_of)
                .or_else(|| child(error, "error-tag").and_then(text_of))
                .unwrap_or_else(|| "unspecified rpc-error".to_string());
            Some(message)
        })
        .collect()
}

/// Reply of an rpc whose rejection the caller decides on
pub fn rpc_reply(fields: &Map<String, Value>) -> RpcReply {
    let errors = rpc_errors(fields);
    if errors.is_empty() && child(fields, "ok").is_some() {
        RpcReply::ok()
    } else {
        RpcReply::rejected(errors)
    }
}

/// Require `<ok/>`, turning rpc-errors into [`SessionError::Rejected`]
pub fn expect_ok(fields: &Map<String, Value>, operation: &str) -> Result<(), SessionError> {
    let reply = rpc_reply(fields);
    if reply.ok {
        return Ok(());
    }
    let message = if reply.errors.is_empty() {
        "reply carries neither ok nor rpc-error".to_string()
    } else {
        reply.errors.join("; ")
    };
    Err(SessionError::Rejected {
        operation: operation.to_string(),
        message,
    })
}

/// The `<data>` element of a get-config reply, serialized on its own
pub fn data_document(fields: &Map<String, Value>) -> Result<String, SessionError> {
    let errors = rpc_errors(fields);
    if !errors.is_empty() {
        return Err(SessionError::Rejected {
            operation: "get-config".to_string(),
            message: errors.join("; "),
        });
    }

    let data = child(fields, "data").ok_or_else(|| {
        SessionError::Protocol("get-config reply carries no data".to_string())
    })?;
    let mut document = Map::new();
    document.insert("data".to_string(), data.clone());
    tree::to_xml(&Value::Object(document)).map_err(|e| SessionError::Protocol(e.to_string()))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Object(fields) => fields
            .get(TEXT_KEY)
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string()),
        _ => None,
    }
}

//! Pulls the assistant text out of whatever the proxy sent back.
//!
//! Proxies in the wild return different shapes (a bare `reply`, chat
//! completions, legacy text completions, the responses API). Each shape is a
//! named strategy; strategies run in order and the first non-empty string
//! wins.

use serde_json::Value;

pub const FALLBACK_REPLY: &str = "Sorry, I couldn't generate a response right now.";

pub struct ReplyStrategy {
    pub name: &'static str,
    pub extract: fn(&Value) -> Option<String>,
}

pub const REPLY_STRATEGIES: &[ReplyStrategy] = &[
    ReplyStrategy {
        name: "reply",
        extract: direct_reply,
    },
    ReplyStrategy {
        name: "choices.message.content",
        extract: chat_choice_content,
    },
    ReplyStrategy {
        name: "choices.text",
        extract: completion_choice_text,
    },
    ReplyStrategy {
        name: "output.content.text",
        extract: responses_output_text,
    },
];

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn direct_reply(body: &Value) -> Option<String> {
    non_empty(body.get("reply"))
}

pub fn chat_choice_content(body: &Value) -> Option<String> {
    non_empty(body.pointer("/choices/0/message/content"))
}

pub fn completion_choice_text(body: &Value) -> Option<String> {
    non_empty(body.pointer("/choices/0/text"))
}

pub fn responses_output_text(body: &Value) -> Option<String> {
    if !body.get("output").is_some_and(Value::is_array) {
        return None;
    }
    non_empty(body.pointer("/output/0/content/0/text"))
}

/// First matching strategy and its text, if any.
pub fn extract_with_strategy(body: &Value) -> Option<(&'static str, String)> {
    REPLY_STRATEGIES
        .iter()
        .find_map(|strategy| (strategy.extract)(body).map(|text| (strategy.name, text)))
}

pub fn extract_reply(body: &Value) -> String {
    extract_with_strategy(body)
        .map(|(_, text)| text)
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}

/// Message of an `error` member, if the body carries one.
///
/// A string `error.message` is used as is; anything else is shown as JSON.
pub fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let present = match error {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    };
    if !present {
        return None;
    }
    Some(match error.get("message").and_then(Value::as_str) {
        Some(message) if !message.is_empty() => message.to_string(),
        _ => error.to_string(),
    })
}

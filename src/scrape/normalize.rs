//! Maps raw platform comment objects onto [`CommentRecord`].
//!
//! Upstream payloads are not a stable contract, so every field is described as
//! an ordered list of candidate paths. The first candidate that resolves to a
//! usable value wins; a total miss falls back to the field default instead of
//! failing the item.

use crate::record::{CommentRecord, Platform};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("expected a comment object, got {0}")]
    NotAnObject(&'static str),
    #[error("comment object has no `{0}`")]
    MissingRoot(&'static str),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub include_user: bool,
    pub include_create_time: bool,
}

/// Where each [`CommentRecord`] field lives inside one platform's payload.
#[derive(Debug, Clone, Copy)]
pub struct RecordShape {
    pub platform: Platform,
    /// Object the field paths are relative to. `None` means the item itself.
    pub root: Option<&'static str>,
    pub text: &'static [&'static str],
    pub likes: &'static [&'static str],
    pub user: &'static [&'static str],
    pub create_time: &'static [&'static str],
    /// Relative to the item, not to `root`.
    pub replies: &'static [&'static str],
}

impl RecordShape {
    pub fn normalize(
        &self,
        item: &Value,
        options: NormalizeOptions,
    ) -> Result<CommentRecord, NormalizeError> {
        if !item.is_object() {
            return Err(NormalizeError::NotAnObject(kind_of(item)));
        }

        let body = match self.root {
            Some(root) => lookup(item, root)
                .filter(|body| body.is_object())
                .ok_or(NormalizeError::MissingRoot(root))?,
            None => item,
        };

        let mut record = CommentRecord::new(
            self.platform,
            probe_string(body, self.text).unwrap_or_default(),
            probe_count(body, self.likes).unwrap_or(0),
        );

        if options.include_user {
            record.user = probe_string(body, self.user);
        }

        if options.include_create_time {
            record.create_time = probe(body, self.create_time).cloned();
        }

        Ok(record)
    }

    pub fn reply_count(&self, item: &Value) -> u64 {
        probe_count(item, self.replies).unwrap_or(0)
    }
}

/// Resolve a dotted path such as `author.uniqueId`.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

pub fn probe<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|found| !found.is_null())
}

pub fn probe_string(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|found| match found {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

pub fn probe_count(value: &Value, candidates: &[&str]) -> Option<u64> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(as_count)
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

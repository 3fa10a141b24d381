//! Structured key encoding for the KV backend.
//!
//! Keys are colon-delimited ASCII segments (`user:email:<email>`). Segment
//! values are escaped so they can never contain the delimiter: `%` becomes
//! `%25` and `:` becomes `%3A`. Every key in the store is built by
//! [`KvKey::encode`] and parsed by [`KvKey::decode`]; nothing else splits keys.
//!
//! | key                                   | value            |
//! |---------------------------------------|------------------|
//! | `user:<id>`                           | User (JSON)      |
//! | `user:email:<email>`                  | user id          |
//! | `user:handle:<handle>`                | user id          |
//! | `link:<id>`                           | Link (JSON)      |
//! | `user:links:<user_id>:<link_id>`      | empty            |
//! | `analytics:event:<id>`                | Event (JSON)     |
//! | `analytics:user:<user_id>:<event_id>` | empty            |
//! | `analytics:link:<link_id>:<event_id>` | empty            |

use std::borrow::Cow;

use crate::errors::{DriplnkError, Result};

pub const SEP: u8 = b':';

const NS_USER: &str = "user";
const NS_LINK: &str = "link";
const NS_ANALYTICS: &str = "analytics";

const IDX_EMAIL: &str = "email";
const IDX_HANDLE: &str = "handle";
const IDX_LINKS: &str = "links";
const REC_EVENT: &str = "event";
const IDX_USER: &str = "user";
const IDX_LINK: &str = "link";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvKey {
    User { id: String },
    UserEmail { email: String },
    UserHandle { handle: String },
    Link { id: String },
    UserLink { user_id: String, link_id: String },
    Event { id: String },
    UserEvent { user_id: String, event_id: String },
    LinkEvent { link_id: String, event_id: String },
}

impl KvKey {
    pub fn user(id: &str) -> Self {
        KvKey::User { id: id.to_string() }
    }

    pub fn user_email(email: &str) -> Self {
        KvKey::UserEmail {
            email: email.to_string(),
        }
    }

    pub fn user_handle(handle: &str) -> Self {
        KvKey::UserHandle {
            handle: handle.to_string(),
        }
    }

    pub fn link(id: &str) -> Self {
        KvKey::Link { id: id.to_string() }
    }

    pub fn user_link(user_id: &str, link_id: &str) -> Self {
        KvKey::UserLink {
            user_id: user_id.to_string(),
            link_id: link_id.to_string(),
        }
    }

    pub fn event(id: &str) -> Self {
        KvKey::Event { id: id.to_string() }
    }

    pub fn user_event(user_id: &str, event_id: &str) -> Self {
        KvKey::UserEvent {
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
        }
    }

    pub fn link_event(link_id: &str, event_id: &str) -> Self {
        KvKey::LinkEvent {
            link_id: link_id.to_string(),
            event_id: event_id.to_string(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            KvKey::User { id } => key_with_segments(&[NS_USER], &[id]),
            KvKey::UserEmail { email } => key_with_segments(&[NS_USER, IDX_EMAIL], &[email]),
            KvKey::UserHandle { handle } => key_with_segments(&[NS_USER, IDX_HANDLE], &[handle]),
            KvKey::Link { id } => key_with_segments(&[NS_LINK], &[id]),
            KvKey::UserLink { user_id, link_id } => {
                key_with_segments(&[NS_USER, IDX_LINKS], &[user_id, link_id])
            }
            KvKey::Event { id } => key_with_segments(&[NS_ANALYTICS, REC_EVENT], &[id]),
            KvKey::UserEvent { user_id, event_id } => {
                key_with_segments(&[NS_ANALYTICS, IDX_USER], &[user_id, event_id])
            }
            KvKey::LinkEvent { link_id, event_id } => {
                key_with_segments(&[NS_ANALYTICS, IDX_LINK], &[link_id, event_id])
            }
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| DriplnkError::kv_store(format!("key 不是合法 UTF-8: {}", e)))?;
        let parts: Vec<&str> = text.split(SEP as char).collect();

        let key = match parts.as_slice() {
            [NS_USER, IDX_EMAIL, email] => KvKey::UserEmail {
                email: unescape(email)?,
            },
            [NS_USER, IDX_HANDLE, handle] => KvKey::UserHandle {
                handle: unescape(handle)?,
            },
            [NS_USER, IDX_LINKS, user_id, link_id] => KvKey::UserLink {
                user_id: unescape(user_id)?,
                link_id: unescape(link_id)?,
            },
            [NS_USER, id] => KvKey::User { id: unescape(id)? },
            [NS_LINK, id] => KvKey::Link { id: unescape(id)? },
            [NS_ANALYTICS, REC_EVENT, id] => KvKey::Event { id: unescape(id)? },
            [NS_ANALYTICS, IDX_USER, user_id, event_id] => KvKey::UserEvent {
                user_id: unescape(user_id)?,
                event_id: unescape(event_id)?,
            },
            [NS_ANALYTICS, IDX_LINK, link_id, event_id] => KvKey::LinkEvent {
                link_id: unescape(link_id)?,
                event_id: unescape(event_id)?,
            },
            _ => {
                return Err(DriplnkError::kv_store(format!("无法识别的 key: {}", text)));
            }
        };
        Ok(key)
    }
}

/// 前缀扫描用的 key 前缀，均以分隔符结尾
pub mod prefix {
    use super::*;

    /// 所有 `user:` 开头的 key（主记录与索引混在一起，调用方按类型过滤）
    pub fn users() -> Vec<u8> {
        key_prefix(&[NS_USER], &[])
    }

    pub fn user_emails() -> Vec<u8> {
        key_prefix(&[NS_USER, IDX_EMAIL], &[])
    }

    pub fn user_handles() -> Vec<u8> {
        key_prefix(&[NS_USER, IDX_HANDLE], &[])
    }

    pub fn all_user_links() -> Vec<u8> {
        key_prefix(&[NS_USER, IDX_LINKS], &[])
    }

    pub fn user_links(user_id: &str) -> Vec<u8> {
        key_prefix(&[NS_USER, IDX_LINKS], &[user_id])
    }

    pub fn all_user_events() -> Vec<u8> {
        key_prefix(&[NS_ANALYTICS, IDX_USER], &[])
    }

    pub fn user_events(user_id: &str) -> Vec<u8> {
        key_prefix(&[NS_ANALYTICS, IDX_USER], &[user_id])
    }

    pub fn all_link_events() -> Vec<u8> {
        key_prefix(&[NS_ANALYTICS, IDX_LINK], &[])
    }

    pub fn link_events(link_id: &str) -> Vec<u8> {
        key_prefix(&[NS_ANALYTICS, IDX_LINK], &[link_id])
    }
}

/// 固定命名段原样写入，值段需要转义
fn key_with_segments(fixed: &[&str], values: &[&str]) -> Vec<u8> {
    let mut key = Vec::new();
    let mut first = true;
    for part in fixed
        .iter()
        .map(|s| Cow::Borrowed(*s))
        .chain(values.iter().map(|v| escape(v)))
    {
        if !first {
            key.push(SEP);
        }
        key.extend_from_slice(part.as_bytes());
        first = false;
    }
    key
}

fn key_prefix(fixed: &[&str], values: &[&str]) -> Vec<u8> {
    let mut key = key_with_segments(fixed, values);
    key.push(SEP);
    key
}

fn escape(segment: &str) -> Cow<'_, str> {
    if !segment.contains(['%', ':']) {
        return Cow::Borrowed(segment);
    }
    let mut out = String::with_capacity(segment.len() + 4);
    for ch in segment.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape(segment: &str) -> Result<String> {
    if !segment.contains('%') {
        return Ok(segment.to_string());
    }
    let mut out = String::with_capacity(segment.len());
    let mut rest = segment;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3);
        match code {
            Some("25") => out.push('%'),
            Some("3A") => out.push(':'),
            _ => {
                return Err(DriplnkError::kv_store(format!(
                    "非法的转义序列: {}",
                    segment
                )));
            }
        }
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_layout_matches_table() {
        assert_eq!(KvKey::user("u1").encode(), b"user:u1");
        assert_eq!(KvKey::user_email("a@x.com").encode(), b"user:email:a@x.com");
        assert_eq!(KvKey::user_handle("alice").encode(), b"user:handle:alice");
        assert_eq!(KvKey::link("l1").encode(), b"link:l1");
        assert_eq!(KvKey::user_link("u1", "l1").encode(), b"user:links:u1:l1");
        assert_eq!(KvKey::event("e1").encode(), b"analytics:event:e1");
        assert_eq!(KvKey::user_event("u1", "e1").encode(), b"analytics:user:u1:e1");
        assert_eq!(KvKey::link_event("l1", "e1").encode(), b"analytics:link:l1:e1");
    }

    #[test]
    fn test_decode_every_variant() {
        let keys = [
            KvKey::user("u1"),
            KvKey::user_email("a@x.com"),
            KvKey::user_handle("alice"),
            KvKey::link("l1"),
            KvKey::user_link("u1", "l1"),
            KvKey::event("e1"),
            KvKey::user_event("u1", "e1"),
            KvKey::link_event("l1", "e1"),
        ];
        for key in keys {
            assert_eq!(KvKey::decode(&key.encode()).unwrap(), key);
        }
    }

    #[test]
    fn test_delimiter_in_value_is_escaped() {
        let key = KvKey::user_link("team:a", "50%");
        let raw = key.encode();
        assert_eq!(raw, b"user:links:team%3Aa:50%25");
        assert_eq!(KvKey::decode(&raw).unwrap(), key);
    }

    #[test]
    fn test_user_id_named_like_index_is_not_confused() {
        // user:email (两段) 是 id 为 "email" 的用户主记录
        assert_eq!(KvKey::decode(b"user:email").unwrap(), KvKey::user("email"));
        assert_eq!(KvKey::decode(b"user:links").unwrap(), KvKey::user("links"));
    }

    #[test]
    fn test_prefix_does_not_match_longer_id() {
        let key = KvKey::user_link("ab", "l1").encode();
        assert!(!key.starts_with(&prefix::user_links("a")));
        assert!(key.starts_with(&prefix::user_links("ab")));

        let key = KvKey::user_link("a:b", "l1").encode();
        assert!(!key.starts_with(&prefix::user_links("a")));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(KvKey::decode(b"unknown:thing").is_err());
        assert!(KvKey::decode(b"user:links:u1").is_err());
        assert!(KvKey::decode(b"link:bad%zz").is_err());
        assert!(KvKey::decode(&[0xff, 0xfe]).is_err());
    }
}

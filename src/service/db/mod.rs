pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::{
    membership::{MEMBER_DELIMITER, ResponseSet},
    types::{ResponseError, ResponseResult},
};

// Traits.

/// Generic response store trait that backends must implement.
///
/// A store maps a message identifier to the full response set of that message.
/// It owns the serialized form; callers only ever see [`ResponseSet`] values.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenericResponseStore: Send + Sync + 'static {
    /// Inserts a new record for `message_id` holding `set` (normally all groups empty).
    ///
    /// Fails with [`ResponseError::AlreadyExists`] if the message already has a record.
    async fn create_record(&self, message_id: &str, set: &ResponseSet) -> ResponseResult<()>;

    /// Loads every group of `message_id`, in display order.
    ///
    /// Fails with [`ResponseError::NotFound`] if the message has no record.
    async fn load_groups(&self, message_id: &str) -> ResponseResult<ResponseSet>;

    /// Overwrites the whole record of `message_id` with `set`.
    ///
    /// This is not a patch: every group is written. Fails with [`ResponseError::NotFound`]
    /// if the message has no record.
    async fn save_groups(&self, message_id: &str, set: &ResponseSet) -> ResponseResult<()>;
}

// Structs.

/// Response store for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ResponseStore {
    inner: Arc<dyn GenericResponseStore>,
}

impl Deref for ResponseStore {
    type Target = dyn GenericResponseStore;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ResponseStore {
    pub fn new(inner: Arc<dyn GenericResponseStore>) -> Self {
        Self { inner }
    }
}

// Codec.

/// Joins `members` into the stored form of a group.
///
/// The empty list encodes to the empty string. Members that are empty or contain
/// [`MEMBER_DELIMITER`] cannot be represented and are rejected.
pub fn encode_members(members: &[String]) -> ResponseResult<String> {
    if let Some(bad) = members.iter().find(|m| m.is_empty() || m.contains(MEMBER_DELIMITER)) {
        return Err(ResponseError::Storage(format!("member `{}` cannot be stored", bad.escape_debug())));
    }

    Ok(members.join(MEMBER_DELIMITER.to_string().as_str()))
}

/// Splits the stored form of a group back into members.
///
/// Empty entries and repeats are dropped, so the result is always a valid member list.
pub fn decode_members(stored: &str) -> Vec<String> {
    let mut members: Vec<String> = Vec::new();

    for member in stored.split(MEMBER_DELIMITER).filter(|m| !m.is_empty()) {
        if !members.iter().any(|m| m == member) {
            members.push(member.to_string());
        }
    }

    members
}

// Tests.

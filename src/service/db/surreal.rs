//! SurrealDB implementation of the response store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{debug, info, instrument};

use crate::base::{
    config::Config,
    membership::{MembershipSet, ResponseSet},
    types::{Res, ResponseError, ResponseResult},
};

use super::{GenericResponseStore, ResponseStore, decode_members, encode_members};

/// Table holding one record per message.
const TABLE: &str = "response";

// Extra methods on `ResponseStore` applied by the surreal implementation.

impl ResponseStore {
    /// Connects to the SurrealDB instance described by `config`.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let store = SurrealResponseStore::new(config).await?;
        Ok(Self { inner: Arc::new(store) })
    }

    /// Creates a store backed by a fresh in-memory SurrealDB instance.
    pub async fn surreal_memory() -> Res<Self> {
        let store = SurrealResponseStore::connect("mem://", None, "response", "bot").await?;
        Ok(Self { inner: Arc::new(store) })
    }
}

// Records.

/// The persisted form of one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredGroup {
    name: String,
    members: String,
}

/// The persisted form of one message's response set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct StoredRecord {
    prompt: String,
    groups: Vec<StoredGroup>,
    updated_at: String,
}

impl StoredRecord {
    fn encode(set: &ResponseSet) -> ResponseResult<Self> {
        let groups = set
            .groups()
            .iter()
            .map(|g| {
                Ok(StoredGroup {
                    name: g.name().to_string(),
                    members: encode_members(g.members())?,
                })
            })
            .collect::<ResponseResult<Vec<_>>>()?;

        Ok(Self {
            prompt: set.prompt().to_string(),
            groups,
            updated_at: Utc::now().to_rfc3339(),
        })
    }

    fn decode(self, message_id: &str) -> ResponseResult<ResponseSet> {
        if self.groups.is_empty() {
            return Err(ResponseError::Storage(format!("record for message `{message_id}` has no groups")));
        }

        let groups = self.groups.into_iter().map(|g| MembershipSet::from_members(g.name, decode_members(&g.members))).collect();

        Ok(ResponseSet::new(self.prompt, groups))
    }
}

fn storage_error(err: surrealdb::Error) -> ResponseError {
    ResponseError::Storage(err.to_string())
}

/// Whether `err` is a `CREATE` hitting a record that already exists.
///
/// The embedded engines report `Db::RecordExists`. Remote engines only forward the
/// server's message, "Database record `response:...` already exists".
fn is_record_exists(err: &surrealdb::Error) -> bool {
    match err {
        surrealdb::Error::Db(surrealdb::error::Db::RecordExists { .. }) => true,
        surrealdb::Error::Api(surrealdb::error::Api::Query(message)) => message.contains("already exists"),
        _ => false,
    }
}

// Specific implementations.

/// SurrealDB response store.
#[derive(Clone)]
pub struct SurrealResponseStore {
    db: Surreal<Any>,
}

impl SurrealResponseStore {
    /// Create a new store from the application configuration.
    #[instrument(name = "SurrealResponseStore::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let credentials = config.db_username.as_deref().zip(config.db_password.as_deref());

        Self::connect(&config.db_endpoint, credentials, &config.db_namespace, &config.db_database).await
    }

    /// Connect to `endpoint` (`mem://`, `ws://`, `wss://`, ...) and define the schema.
    pub async fn connect(endpoint: &str, credentials: Option<(&str, &str)>, namespace: &str, database: &str) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        // Authenticate only when credentials are configured; the embedded engine needs none.
        if let Some((username, password)) = credentials {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;

        // Define schemas.

        db.query(
            "DEFINE TABLE IF NOT EXISTS response SCHEMAFULL;
             DEFINE FIELD IF NOT EXISTS prompt ON response TYPE string;
             DEFINE FIELD IF NOT EXISTS groups ON response TYPE array<object>;
             DEFINE FIELD IF NOT EXISTS groups[*].name ON response TYPE string;
             DEFINE FIELD IF NOT EXISTS groups[*].members ON response TYPE string;
             DEFINE FIELD IF NOT EXISTS updated_at ON response TYPE string;",
        )
        .await?
        .check()?;

        info!("Response store initialized at `{}`.", endpoint);

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericResponseStore for SurrealResponseStore {
    #[instrument(skip(self, set))]
    async fn create_record(&self, message_id: &str, set: &ResponseSet) -> ResponseResult<()> {
        let existing: Option<StoredRecord> = self.db.select((TABLE, message_id)).await.map_err(storage_error)?;
        if existing.is_some() {
            return Err(ResponseError::AlreadyExists(message_id.to_string()));
        }

        let record = StoredRecord::encode(set)?;

        // Another creator can still win between the select and the create.
        let created: Option<StoredRecord> = self.db.create((TABLE, message_id)).content(record).await.map_err(|e| {
            if is_record_exists(&e) {
                ResponseError::AlreadyExists(message_id.to_string())
            } else {
                storage_error(e)
            }
        })?;

        if created.is_none() {
            return Err(ResponseError::Storage(format!("record for message `{message_id}` was not created")));
        }

        debug!("Created response record for `{}`.", message_id);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_groups(&self, message_id: &str) -> ResponseResult<ResponseSet> {
        let record: Option<StoredRecord> = self.db.select((TABLE, message_id)).await.map_err(storage_error)?;

        record.ok_or_else(|| ResponseError::NotFound(message_id.to_string()))?.decode(message_id)
    }

    #[instrument(skip(self, set))]
    async fn save_groups(&self, message_id: &str, set: &ResponseSet) -> ResponseResult<()> {
        let record = StoredRecord::encode(set)?;

        // `UPDATE` never creates, so a missing record comes back as `None`.
        let updated: Option<StoredRecord> = self.db.update((TABLE, message_id)).content(record).await.map_err(storage_error)?;

        if updated.is_none() {
            return Err(ResponseError::NotFound(message_id.to_string()));
        }

        debug!("Saved response record for `{}`.", message_id);

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::prompt::{PromptConfig, PromptFactory};

    fn quiz_set() -> ResponseSet {
        PromptFactory::build(&PromptConfig::quiz()).unwrap().initial_set()
    }

    #[tokio::test]
    async fn test_create_then_load_is_empty() {
        let store = ResponseStore::surreal_memory().await.unwrap();

        store.create_record("C1:100.1", &quiz_set()).await.unwrap();

        let loaded = store.load_groups("C1:100.1").await.unwrap();
        assert_eq!(loaded, quiz_set());
    }

    #[tokio::test]
    async fn test_create_twice_is_already_exists() {
        let store = ResponseStore::surreal_memory().await.unwrap();

        store.create_record("msg1", &quiz_set()).await.unwrap();
        let err = store.create_record("msg1", &quiz_set()).await.unwrap_err();

        assert_eq!(err, ResponseError::AlreadyExists("msg1".to_string()));
    }

    #[tokio::test]
    async fn test_second_create_is_record_exists() {
        let store = SurrealResponseStore::connect("mem://", None, "response", "bot").await.unwrap();

        let _: Option<StoredRecord> = store.db.create((TABLE, "msg1")).content(StoredRecord::encode(&quiz_set()).unwrap()).await.unwrap();
        let second: Result<Option<StoredRecord>, _> = store.db.create((TABLE, "msg1")).content(StoredRecord::encode(&quiz_set()).unwrap()).await;
        let err = second.unwrap_err();

        assert!(is_record_exists(&err), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let store = ResponseStore::surreal_memory().await.unwrap();

        assert_eq!(store.load_groups("nope").await.unwrap_err(), ResponseError::NotFound("nope".to_string()));
        assert_eq!(store.save_groups("nope", &quiz_set()).await.unwrap_err(), ResponseError::NotFound("nope".to_string()));
    }

    #[tokio::test]
    async fn test_save_overwrites_every_group() {
        let store = ResponseStore::surreal_memory().await.unwrap();
        store.create_record("msg1", &quiz_set()).await.unwrap();

        let first = ResponseSet::new("quiz", vec![MembershipSet::from_members("UP", ["alice", "bob"]), MembershipSet::from_members("DOWN", ["carol"])]);
        store.save_groups("msg1", &first).await.unwrap();

        let second = ResponseSet::new("quiz", vec![MembershipSet::from_members("UP", ["bob"]), MembershipSet::from_members("DOWN", ["carol", "alice"])]);
        store.save_groups("msg1", &second).await.unwrap();

        assert_eq!(store.load_groups("msg1").await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_messages_are_independent() {
        let store = ResponseStore::surreal_memory().await.unwrap();
        store.create_record("msg1", &quiz_set()).await.unwrap();
        store.create_record("msg2", &quiz_set()).await.unwrap();

        let changed = ResponseSet::new("quiz", vec![MembershipSet::from_members("UP", ["alice"]), MembershipSet::new("DOWN")]);
        store.save_groups("msg1", &changed).await.unwrap();

        assert_eq!(store.load_groups("msg2").await.unwrap(), quiz_set());
    }

    #[tokio::test]
    async fn test_unstorable_member_is_storage_error() {
        let store = ResponseStore::surreal_memory().await.unwrap();
        store.create_record("msg1", &quiz_set()).await.unwrap();

        let bad = ResponseSet::new("quiz", vec![MembershipSet::from_members("UP", ["al\u{1f}ice"]), MembershipSet::new("DOWN")]);

        assert!(matches!(store.save_groups("msg1", &bad).await, Err(ResponseError::Storage(_))));
        assert_eq!(store.load_groups("msg1").await.unwrap(), quiz_set());
    }
}

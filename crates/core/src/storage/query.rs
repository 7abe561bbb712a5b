//! Access-pattern routing and cursor pagination.
//!
//! Each named access pattern maps to one secondary index, a partition-key
//! template and a sort-key prefix. The table is built once and never
//! re-parsed per request. Pages resume from an opaque cursor holding the
//! backend's last evaluated key.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::chat::{validate_id, ValidationError};

use super::codec::Entity;
use super::error::{ChatError, Result, StoreError};
use super::item::{AttributeValue, Item, PrimaryKey, SecondaryIndex, PK, SK};
use super::keys::{GROUP_PREFIX, MESSAGE_PREFIX, USER_PREFIX};
use super::retry::{is_retryable, RetryPolicy};
use super::traits::ItemStore;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

// ============================================================================
// Access patterns
// ============================================================================

/// The fixed set of named read shapes served by an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessPattern {
    #[serde(rename = "groupsCreatedByUser")]
    GroupsCreatedByUser,
    #[serde(rename = "groupsUserBelongsTo")]
    GroupsUserBelongsTo,
    #[serde(rename = "messagesPerGroup")]
    MessagesPerGroup,
}

impl AccessPattern {
    /// Stable name used across the protocol boundary.
    pub fn name(&self) -> &'static str {
        match self {
            AccessPattern::GroupsCreatedByUser => "groupsCreatedByUser",
            AccessPattern::GroupsUserBelongsTo => "groupsUserBelongsTo",
            AccessPattern::MessagesPerGroup => "messagesPerGroup",
        }
    }

    /// Routing entry for this pattern.
    pub fn route(&self) -> &'static RouteSpec {
        match self {
            AccessPattern::GroupsCreatedByUser => &ACCESS_PATTERNS[0],
            AccessPattern::GroupsUserBelongsTo => &ACCESS_PATTERNS[1],
            AccessPattern::MessagesPerGroup => &ACCESS_PATTERNS[2],
        }
    }
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AccessPattern {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self> {
        ACCESS_PATTERNS
            .iter()
            .map(|route| route.pattern)
            .find(|pattern| pattern.name() == s)
            .ok_or_else(|| ChatError::NotFound {
                entity_type: "AccessPattern",
                id: s.to_string(),
            })
    }
}

/// Index, key template and order of one access pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub pattern: AccessPattern,
    pub index: SecondaryIndex,
    /// Prefix of the index partition key; the parameter is appended.
    pub partition_prefix: &'static str,
    /// `begins_with` condition on the index sort key.
    pub sort_key_prefix: &'static str,
    /// Name of the identifier parameter, used in validation errors.
    pub parameter: &'static str,
    pub ascending: bool,
}

impl RouteSpec {
    pub fn partition_key(&self, id: &str) -> String {
        format!("{}{id}", self.partition_prefix)
    }
}

/// Immutable routing table for every access pattern.
pub static ACCESS_PATTERNS: [RouteSpec; 3] = [
    RouteSpec {
        pattern: AccessPattern::GroupsCreatedByUser,
        index: SecondaryIndex::Gsi1,
        partition_prefix: USER_PREFIX,
        sort_key_prefix: GROUP_PREFIX,
        parameter: "userId",
        ascending: true,
    },
    RouteSpec {
        pattern: AccessPattern::GroupsUserBelongsTo,
        index: SecondaryIndex::Gsi3,
        partition_prefix: USER_PREFIX,
        sort_key_prefix: GROUP_PREFIX,
        parameter: "userId",
        ascending: true,
    },
    RouteSpec {
        pattern: AccessPattern::MessagesPerGroup,
        index: SecondaryIndex::Gsi2,
        partition_prefix: GROUP_PREFIX,
        sort_key_prefix: MESSAGE_PREFIX,
        parameter: "groupId",
        ascending: true,
    },
];

// ============================================================================
// Backend-neutral query shapes
// ============================================================================

/// A single-page read from a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub index: SecondaryIndex,
    pub partition_key: String,
    pub sort_key_prefix: String,
    pub ascending: bool,
    pub limit: usize,
    /// Last evaluated key of the previous page.
    pub exclusive_start_key: Option<Item>,
}

/// Raw result of one backend query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Present when more items may follow.
    pub last_evaluated_key: Option<Item>,
}

/// An ordered page of results plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` once the result set is exhausted.
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            cursor: self.cursor,
        }
    }
}

// ============================================================================
// Cursors
// ============================================================================

/// Encodes a last evaluated key as an opaque cursor.
pub fn encode_cursor(key: &Item) -> String {
    // BTreeMap gives a stable attribute order.
    let ordered: BTreeMap<&String, &AttributeValue> = key.iter().collect();
    let json = serde_json::to_vec(&ordered).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decodes a cursor for `index`, checking it belongs to `partition_key`.
pub fn decode_cursor(
    cursor: &str,
    index: SecondaryIndex,
    partition_key: &str,
) -> std::result::Result<Item, ValidationError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| ValidationError::InvalidCursor(e.to_string()))?;
    let key: Item = serde_json::from_slice(&bytes)
        .map_err(|e| ValidationError::InvalidCursor(e.to_string()))?;

    for attribute in [PK, SK, index.pk_attribute(), index.sk_attribute()] {
        if key.get(attribute).and_then(AttributeValue::as_s).is_none() {
            return Err(ValidationError::InvalidCursor(format!(
                "missing {attribute}"
            )));
        }
    }
    if key.len() != 4 {
        return Err(ValidationError::InvalidCursor(
            "unexpected attributes".to_string(),
        ));
    }
    if key.get(index.pk_attribute()).and_then(AttributeValue::as_s) != Some(partition_key) {
        return Err(ValidationError::InvalidCursor(
            "cursor belongs to a different query".to_string(),
        ));
    }
    Ok(key)
}

// ============================================================================
// Router
// ============================================================================

/// Serves access patterns and point lookups against an [`ItemStore`].
#[derive(Clone)]
pub struct QueryRouter {
    store: Arc<dyn ItemStore>,
    retry: RetryPolicy,
    default_page_size: usize,
    max_page_size: usize,
}

impl QueryRouter {
    pub fn new(store: Arc<dyn ItemStore>, retry: RetryPolicy) -> Self {
        Self {
            store,
            retry,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }

    /// Overrides the page sizes. The default is clamped to the maximum.
    pub fn with_page_sizes(mut self, default_page_size: usize, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Clamps a requested limit to `1..=max`.
    pub fn page_size(&self, limit: Option<u32>) -> usize {
        match limit {
            Some(limit) => (limit as usize).clamp(1, self.max_page_size),
            None => self.default_page_size,
        }
    }

    /// Builds the backend query for a pattern without executing it.
    pub fn route(
        &self,
        pattern: AccessPattern,
        id: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<QueryRequest> {
        let route = pattern.route();
        validate_id(route.parameter, id)?;
        let partition_key = route.partition_key(id);
        let exclusive_start_key = match cursor.filter(|c| !c.is_empty()) {
            Some(cursor) => Some(decode_cursor(cursor, route.index, &partition_key)?),
            None => None,
        };

        Ok(QueryRequest {
            index: route.index,
            partition_key,
            sort_key_prefix: route.sort_key_prefix.to_string(),
            ascending: route.ascending,
            limit: self.page_size(limit),
            exclusive_start_key,
        })
    }

    /// Executes a routed query, retrying transient failures.
    pub async fn execute(&self, request: &QueryRequest) -> Result<Page<Item>> {
        let page = (|| async { self.store.query(request).await })
            .retry(self.retry.backoff())
            .when(is_retryable)
            .notify(|err: &StoreError, delay: Duration| {
                tracing::warn!(
                    index = request.index.index_name(),
                    partition_key = %request.partition_key,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying query after transient failure"
                );
            })
            .await?;

        tracing::debug!(
            index = request.index.index_name(),
            partition_key = %request.partition_key,
            count = page.items.len(),
            has_more = page.last_evaluated_key.is_some(),
            "Query page read"
        );

        Ok(Page {
            items: page.items,
            cursor: page.last_evaluated_key.as_ref().map(encode_cursor),
        })
    }

    /// Routes and executes a pattern given by name.
    ///
    /// An unknown name is [`ChatError::NotFound`]; an empty result is not
    /// an error.
    pub async fn query(
        &self,
        pattern: &str,
        id: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<Item>> {
        let pattern: AccessPattern = pattern.parse()?;
        let request = self.route(pattern, id, cursor, limit)?;
        self.execute(&request).await
    }

    /// Routes, executes and decodes a pattern.
    pub async fn query_as<T: Entity>(
        &self,
        pattern: AccessPattern,
        id: &str,
        cursor: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Page<T>> {
        let request = self.route(pattern, id, cursor, limit)?;
        let page = self.execute(&request).await?;
        let items = page
            .items
            .iter()
            .map(decode_stored::<T>)
            .collect::<Result<Vec<T>>>()?;
        Ok(Page {
            items,
            cursor: page.cursor,
        })
    }

    /// Point lookup by primary key.
    pub async fn get<T: Entity>(&self, key: &PrimaryKey) -> Result<Option<T>> {
        let item = (|| async { self.store.get_item(key).await })
            .retry(self.retry.backoff())
            .when(is_retryable)
            .notify(|err: &StoreError, delay: Duration| {
                tracing::warn!(
                    key = %key,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying point read after transient failure"
                );
            })
            .await?;
        item.as_ref().map(decode_stored::<T>).transpose()
    }

    /// Batched point lookups. Duplicate keys are read once; missing items
    /// are skipped.
    pub async fn batch_get<T: Entity>(&self, keys: &[PrimaryKey]) -> Result<Vec<T>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let unique: Vec<PrimaryKey> = keys
            .iter()
            .filter(|key| seen.insert((*key).clone()))
            .cloned()
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let items = (|| async { self.store.batch_get_items(&unique).await })
            .retry(self.retry.backoff())
            .when(is_retryable)
            .notify(|err: &StoreError, delay: Duration| {
                tracing::warn!(
                    keys = unique.len(),
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying batch read after transient failure"
                );
            })
            .await?;
        items.iter().map(decode_stored::<T>).collect()
    }
}

/// Decodes a stored item. A row that fails to decode is corrupt data, not
/// bad input.
fn decode_stored<T: Entity>(item: &Item) -> Result<T> {
    T::from_item(item).map_err(|e| ChatError::from(StoreError::InvalidData(e.to_string())))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::chat::{ids::parse_timestamp, Message};
    use crate::storage::error::StoreResult;
    use crate::storage::item::{GSI2PK, GSI2SK};
    use crate::storage::transaction::WriteBatch;

    /// Serves scripted query results and records the requests.
    #[derive(Default)]
    struct ScriptedStore {
        pages: Mutex<Vec<StoreResult<QueryPage>>>,
        requests: Mutex<Vec<QueryRequest>>,
    }

    impl ScriptedStore {
        fn with_pages(pages: Vec<StoreResult<QueryPage>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ItemStore for ScriptedStore {
        async fn get_item(&self, _key: &PrimaryKey) -> StoreResult<Option<Item>> {
            Ok(None)
        }

        async fn batch_get_items(&self, _keys: &[PrimaryKey]) -> StoreResult<Vec<Item>> {
            Ok(Vec::new())
        }

        async fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
            self.requests.lock().unwrap().push(request.clone());
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(QueryPage::default()))
        }

        async fn transact_write(&self, _batch: &WriteBatch) -> StoreResult<()> {
            Ok(())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
        }
    }

    fn message_key(group_id: &str, ts: &str, id: &str) -> Item {
        let mut key = PrimaryKey::new(
            format!("GROUP#{group_id}"),
            format!("MESSAGE#{ts}#{id}"),
        )
        .to_item();
        key.insert(GSI2PK.to_string(), AttributeValue::S(format!("GROUP#{group_id}")));
        key.insert(GSI2SK.to_string(), AttributeValue::S(format!("MESSAGE#{ts}")));
        key
    }

    fn router(store: Arc<ScriptedStore>) -> QueryRouter {
        QueryRouter::new(store, fast_retry())
    }

    #[test]
    fn test_access_pattern_from_name() {
        assert_eq!(
            "messagesPerGroup".parse::<AccessPattern>().unwrap(),
            AccessPattern::MessagesPerGroup
        );
        assert_eq!(
            "groupsUserBelongsTo".parse::<AccessPattern>().unwrap(),
            AccessPattern::GroupsUserBelongsTo
        );
        let err = "allMessages".parse::<AccessPattern>().unwrap_err();
        assert!(matches!(err, ChatError::NotFound { .. }));
    }

    #[test]
    fn test_routing_table_is_consistent() {
        for route in &ACCESS_PATTERNS {
            assert_eq!(route.pattern.route(), route);
            assert!(route.ascending);
        }
        assert_eq!(
            AccessPattern::GroupsCreatedByUser.route().index,
            SecondaryIndex::Gsi1
        );
        assert_eq!(
            AccessPattern::MessagesPerGroup.route().index,
            SecondaryIndex::Gsi2
        );
        assert_eq!(
            AccessPattern::GroupsUserBelongsTo.route().index,
            SecondaryIndex::Gsi3
        );
    }

    #[test]
    fn test_route_builds_request() {
        let router = router(ScriptedStore::with_pages(Vec::new()));
        let request = router
            .route(AccessPattern::MessagesPerGroup, "G1", None, Some(5))
            .unwrap();

        assert_eq!(request.index, SecondaryIndex::Gsi2);
        assert_eq!(request.partition_key, "GROUP#G1");
        assert_eq!(request.sort_key_prefix, "MESSAGE#");
        assert_eq!(request.limit, 5);
        assert!(request.exclusive_start_key.is_none());
    }

    #[test]
    fn test_route_rejects_malformed_id() {
        let router = router(ScriptedStore::with_pages(Vec::new()));
        let err = router
            .route(AccessPattern::GroupsCreatedByUser, "", None, None)
            .unwrap_err();
        assert_eq!(
            err,
            ChatError::Validation(ValidationError::EmptyIdentifier { field: "userId" })
        );
    }

    #[test]
    fn test_page_size_is_clamped() {
        let router = router(ScriptedStore::with_pages(Vec::new())).with_page_sizes(10, 50);
        assert_eq!(router.page_size(None), 10);
        assert_eq!(router.page_size(Some(0)), 1);
        assert_eq!(router.page_size(Some(25)), 25);
        assert_eq!(router.page_size(Some(500)), 50);
    }

    #[test]
    fn test_cursor_round_trip_through_route() {
        let key = message_key("G1", "2024-01-15T10:00:00.000000Z", "M1");
        let cursor = encode_cursor(&key);
        let router = router(ScriptedStore::with_pages(Vec::new()));

        let request = router
            .route(AccessPattern::MessagesPerGroup, "G1", Some(&cursor), None)
            .unwrap();
        assert_eq!(request.exclusive_start_key, Some(key));
    }

    #[test]
    fn test_cursor_is_url_safe() {
        let key = message_key("G1", "2024-01-15T10:00:00.000000Z", "M1");
        let cursor = encode_cursor(&key);
        assert!(cursor
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        let err = decode_cursor("not base64!", SecondaryIndex::Gsi2, "GROUP#G1").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCursor(_)));

        let not_json = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(decode_cursor(&not_json, SecondaryIndex::Gsi2, "GROUP#G1").is_err());
    }

    #[test]
    fn test_cursor_rejects_other_partition() {
        let cursor = encode_cursor(&message_key("G2", "2024-01-15T10:00:00.000000Z", "M1"));
        let err = decode_cursor(&cursor, SecondaryIndex::Gsi2, "GROUP#G1").unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidCursor("cursor belongs to a different query".to_string())
        );
    }

    #[test]
    fn test_cursor_rejects_missing_index_attributes() {
        let key = PrimaryKey::new("GROUP#G1", "MESSAGE#x#M1").to_item();
        let cursor = encode_cursor(&key);
        assert!(decode_cursor(&cursor, SecondaryIndex::Gsi2, "GROUP#G1").is_err());
    }

    #[tokio::test]
    async fn test_unknown_pattern_is_not_found() {
        let store = ScriptedStore::with_pages(Vec::new());
        let err = router(store.clone())
            .query("everything", "U1", None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChatError::NotFound {
                entity_type: "AccessPattern",
                ..
            }
        ));
        assert!(store.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let store = ScriptedStore::with_pages(vec![Ok(QueryPage::default())]);
        let page = router(store)
            .query("groupsCreatedByUser", "U1", None, None)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.cursor.is_none());
    }

    #[tokio::test]
    async fn test_execute_retries_transient_failures() {
        let store = ScriptedStore::with_pages(vec![
            Err(StoreError::Transient("throttled".to_string())),
            Err(StoreError::Transient("throttled".to_string())),
            Ok(QueryPage::default()),
        ]);
        let page = router(store.clone())
            .query("messagesPerGroup", "G1", None, None)
            .await
            .unwrap();

        assert!(page.items.is_empty());
        assert_eq!(store.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_execute_does_not_retry_backend_failures() {
        let store = ScriptedStore::with_pages(vec![Err(StoreError::Backend("boom".to_string()))]);
        let err = router(store.clone())
            .query("messagesPerGroup", "G1", None, None)
            .await
            .unwrap_err();

        assert_eq!(err, ChatError::Unknown("boom".to_string()));
        assert_eq!(store.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_as_decodes_and_sets_cursor() {
        let created_at = parse_timestamp("2024-01-15T10:00:00Z").unwrap();
        let message = Message::new("G1", "U2", "hi").with_created_at(created_at);
        let item = message.to_item().unwrap();
        let last_key = message_key("G1", "2024-01-15T10:00:00.000000Z", &message.id);
        let store = ScriptedStore::with_pages(vec![Ok(QueryPage {
            items: vec![item],
            last_evaluated_key: Some(last_key.clone()),
        })]);

        let page: Page<Message> = router(store)
            .query_as(AccessPattern::MessagesPerGroup, "G1", None, Some(1))
            .await
            .unwrap();

        assert_eq!(page.items, vec![message]);
        assert_eq!(page.cursor, Some(encode_cursor(&last_key)));
    }

    #[tokio::test]
    async fn test_query_as_flags_corrupt_rows() {
        let mut item = Message::new("G1", "U2", "hi").to_item().unwrap();
        item.remove("senderId");
        let store = ScriptedStore::with_pages(vec![Ok(QueryPage {
            items: vec![item],
            last_evaluated_key: None,
        })]);

        let err = router(store)
            .query_as::<Message>(AccessPattern::MessagesPerGroup, "G1", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownError");
    }
}

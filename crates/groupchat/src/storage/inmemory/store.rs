//! In-memory item store.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use groupchat_core::storage::{
    AttributeValue, Item, ItemStore, OperationOutcome, PrimaryKey, QueryPage, QueryRequest,
    SecondaryIndex, StoreError, StoreResult, TransactionFailure, WriteBatch, WriteOperation,
};

/// How long a committed client token is honoured for replays.
const TOKEN_TTL: Duration = Duration::from_secs(600);

/// Most client tokens remembered at once; the oldest are forgotten first.
const MAX_TOKENS: usize = 256;

/// A fault to inject into the next store call.
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum Fault {
    /// Fail before touching any data.
    Fail(StoreError),
    /// Apply the transaction, then report the error (an ambiguous commit).
    FailAfterCommit(StoreError),
    /// Evaluate every condition, then report the operation at this position
    /// as failing its precondition.
    ConditionFailedAt(usize),
}

#[derive(Debug)]
struct TokenEntry {
    fingerprint: u64,
    expires_at: Instant,
}

/// Recently committed client tokens, bounded by age and count.
#[derive(Debug)]
struct CommittedTokens {
    entries: HashMap<String, TokenEntry>,
    order: VecDeque<String>,
    ttl: Duration,
    capacity: usize,
}

impl Default for CommittedTokens {
    fn default() -> Self {
        Self::new(TOKEN_TTL, MAX_TOKENS)
    }
}

impl CommittedTokens {
    fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            capacity,
        }
    }

    fn get(&self, token: &str) -> Option<u64> {
        self.entries
            .get(token)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.fingerprint)
    }

    fn insert(&mut self, token: String, fingerprint: u64) {
        let entry = TokenEntry {
            fingerprint,
            expires_at: Instant::now() + self.ttl,
        };
        if self.entries.insert(token.clone(), entry).is_none() {
            self.order.push_back(token);
        }
        self.evict();
    }

    /// Tokens are inserted with a fixed TTL, so `order` is also expiry order.
    fn evict(&mut self) {
        let now = Instant::now();
        while let Some(oldest) = self.order.front() {
            let expired = self
                .entries
                .get(oldest)
                .is_none_or(|entry| entry.expires_at <= now);
            if !expired && self.order.len() <= self.capacity {
                break;
            }
            if let Some(token) = self.order.pop_front() {
                self.entries.remove(&token);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Order-independent digest of a batch's operations.
fn fingerprint(operations: &[WriteOperation]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for operation in operations {
        match operation {
            WriteOperation::Put { item, condition } => {
                0u8.hash(&mut hasher);
                item.iter()
                    .collect::<BTreeMap<&String, &AttributeValue>>()
                    .hash(&mut hasher);
                condition.hash(&mut hasher);
            }
            WriteOperation::ConditionCheck { key, condition } => {
                1u8.hash(&mut hasher);
                key.hash(&mut hasher);
                condition.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

#[derive(Debug, Default)]
struct Table {
    items: BTreeMap<PrimaryKey, Item>,
    tokens: CommittedTokens,
}

/// In-memory storage backend for testing.
///
/// All items live in one ordered map behind a tokio `RwLock`. A transaction
/// evaluates every condition and applies every put under a single write
/// lock. Secondary indexes are projected on read from the index attributes
/// present on each item. Client tokens are remembered for ten minutes, up to
/// a fixed number of recent commits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    table: Arc<RwLock<Table>>,
    #[cfg(test)]
    faults: Arc<tokio::sync::Mutex<VecDeque<Fault>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(not(test))]
    async fn fail_if_injected(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
impl InMemoryStore {
    /// Creates a store that remembers client tokens for `ttl`, at most
    /// `capacity` at a time.
    pub fn with_token_window(ttl: Duration, capacity: usize) -> Self {
        let table = Table {
            items: BTreeMap::new(),
            tokens: CommittedTokens::new(ttl, capacity),
        };
        Self {
            table: Arc::new(RwLock::new(table)),
            faults: Default::default(),
        }
    }

    /// Queues a fault consumed by the next store call.
    pub async fn inject_fault(&self, fault: Fault) {
        self.faults.lock().await.push_back(fault);
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.table.read().await.items.len()
    }

    /// Snapshot of every stored item in key order.
    pub async fn items(&self) -> Vec<Item> {
        self.table.read().await.items.values().cloned().collect()
    }

    /// Number of client tokens currently remembered.
    pub async fn retained_tokens(&self) -> usize {
        self.table.read().await.tokens.len()
    }

    async fn next_fault(&self) -> Option<Fault> {
        self.faults.lock().await.pop_front()
    }

    async fn fail_if_injected(&self) -> StoreResult<()> {
        match self.next_fault().await {
            Some(Fault::Fail(err)) | Some(Fault::FailAfterCommit(err)) => Err(err),
            Some(Fault::ConditionFailedAt(_)) | None => Ok(()),
        }
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn get_item(&self, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        self.fail_if_injected().await?;
        let table = self.table.read().await;
        Ok(table.items.get(key).cloned())
    }

    async fn batch_get_items(&self, keys: &[PrimaryKey]) -> StoreResult<Vec<Item>> {
        self.fail_if_injected().await?;
        let table = self.table.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| table.items.get(key).cloned())
            .collect())
    }

    async fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        self.fail_if_injected().await?;
        let table = self.table.read().await;
        let index = request.index;

        let mut matches: Vec<(IndexPosition, &Item)> = table
            .items
            .iter()
            .filter_map(|(key, item)| {
                let (pk, sk) = index_key(item, index)?;
                (pk == request.partition_key && sk.starts_with(&request.sort_key_prefix))
                    .then(|| (IndexPosition::new(sk, key), item))
            })
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        if !request.ascending {
            matches.reverse();
        }

        let start = match &request.exclusive_start_key {
            Some(start_key) => {
                let start = IndexPosition::from_key(start_key, index)?;
                matches
                    .iter()
                    .position(|(position, _)| {
                        if request.ascending {
                            *position > start
                        } else {
                            *position < start
                        }
                    })
                    .unwrap_or(matches.len())
            }
            None => 0,
        };

        let end = (start + request.limit).min(matches.len());
        let page = &matches[start..end];
        let items: Vec<Item> = page.iter().map(|(_, item)| (*item).clone()).collect();
        let last_evaluated_key = match (end < matches.len(), page.last()) {
            (true, Some((_, item))) => Some(last_evaluated_key(item, index)),
            _ => None,
        };

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    async fn transact_write(&self, batch: &WriteBatch) -> StoreResult<()> {
        #[cfg(test)]
        let (fail_after_commit, forced_failure) = match self.next_fault().await {
            Some(Fault::Fail(err)) => return Err(err),
            Some(Fault::FailAfterCommit(err)) => (Some(err), None),
            Some(Fault::ConditionFailedAt(position)) => (None, Some(position)),
            None => (None, None),
        };
        #[cfg(not(test))]
        let forced_failure: Option<usize> = None;

        let mut table = self.table.write().await;
        let fingerprint = fingerprint(&batch.operations);

        if let Some(previous) = table.tokens.get(&batch.client_token) {
            if previous == fingerprint {
                tracing::debug!(client_token = %batch.client_token, "Replayed committed transaction");
                return Ok(());
            }
            return Err(StoreError::InvalidRequest(
                "client token reused with different operations".to_string(),
            ));
        }

        let keys = batch
            .operations
            .iter()
            .map(WriteOperation::key)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;

        let outcomes: Vec<OperationOutcome> = batch
            .operations
            .iter()
            .zip(&keys)
            .enumerate()
            .map(|(position, (operation, key))| match operation.condition() {
                _ if forced_failure == Some(position) => OperationOutcome::ConditionFailed,
                Some(condition) if !condition.holds(table.items.contains_key(key)) => {
                    OperationOutcome::ConditionFailed
                }
                _ => OperationOutcome::NoIssue,
            })
            .collect();
        if outcomes.iter().any(|o| *o != OperationOutcome::NoIssue) {
            return Err(StoreError::TransactionCanceled(TransactionFailure::new(
                outcomes,
            )));
        }

        for (operation, key) in batch.operations.iter().zip(keys) {
            if let WriteOperation::Put { item, .. } = operation {
                table.items.insert(key, item.clone());
            }
        }
        table.tokens.insert(batch.client_token.clone(), fingerprint);

        #[cfg(test)]
        if let Some(err) = fail_after_commit {
            return Err(err);
        }
        Ok(())
    }
}

// ============================================================================
// Index projection
// ============================================================================

/// Position of an item within an index: its index sort key, then its
/// primary key as a tie-breaker.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct IndexPosition {
    sk: String,
    key: PrimaryKey,
}

impl IndexPosition {
    fn new(sk: &str, key: &PrimaryKey) -> Self {
        Self {
            sk: sk.to_string(),
            key: key.clone(),
        }
    }

    fn from_key(start_key: &Item, index: SecondaryIndex) -> StoreResult<Self> {
        let key = PrimaryKey::from_item(start_key)
            .map_err(|e| StoreError::InvalidRequest(format!("exclusive start key: {e}")))?;
        let sk = start_key
            .get(index.sk_attribute())
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| {
                StoreError::InvalidRequest(format!(
                    "exclusive start key: missing {}",
                    index.sk_attribute()
                ))
            })?;
        Ok(Self::new(sk, &key))
    }
}

fn index_key(item: &Item, index: SecondaryIndex) -> Option<(&str, &str)> {
    let pk = item.get(index.pk_attribute())?.as_s()?;
    let sk = item.get(index.sk_attribute())?.as_s()?;
    Some((pk, sk))
}

/// Key attributes of an item as the index reports them: primary key plus
/// index key.
fn last_evaluated_key(item: &Item, index: SecondaryIndex) -> Item {
    [
        groupchat_core::storage::PK,
        groupchat_core::storage::SK,
        index.pk_attribute(),
        index.sk_attribute(),
    ]
    .into_iter()
    .filter_map(|name| item.get(name).map(|value| (name.to_string(), value.clone())))
    .collect()
}

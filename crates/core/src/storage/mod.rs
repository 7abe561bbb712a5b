mod codec;
mod error;
mod http_mapping;
mod item;
pub mod keys;
mod query;
mod retry;
mod traits;
mod transaction;
mod writer;

pub use codec::{
    parse_role, Entity, ENTITY_TYPE_GROUP, ENTITY_TYPE_MEMBERSHIP, ENTITY_TYPE_MESSAGE,
    ENTITY_TYPE_USER,
};
pub use error::{ChatError, Result, StoreError, StoreResult};
pub use http_mapping::chat_error_to_status_code;
pub use item::{
    get_optional_string, get_string, AttributeValue, Item, PrimaryKey, SecondaryIndex,
    ENTITY_TYPE, GSI1PK, GSI1SK, GSI2PK, GSI2SK, GSI3PK, GSI3SK, PK, SK,
};
pub use keys::{encode_keys, EntityKeys, IndexKey, KeySource};
pub use query::{
    decode_cursor, encode_cursor, AccessPattern, Page, QueryPage, QueryRequest, QueryRouter,
    RouteSpec, ACCESS_PATTERNS, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use retry::{is_retryable, RetryPolicy};
pub use traits::ItemStore;
pub use transaction::{
    Condition, OperationOutcome, TransactionFailure, WriteBatch, WriteOperation,
    MAX_TRANSACTION_OPERATIONS,
};
pub use writer::TransactionalWriter;

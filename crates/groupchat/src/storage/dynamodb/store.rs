//! DynamoDB item store implementation.
//!
//! Implements `ItemStore` from `groupchat_core::storage` on the single chat table.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeValue as DynamoValue, ConditionCheck, KeysAndAttributes, Put, TransactWriteItem,
};
use aws_sdk_dynamodb::Client;

use groupchat_core::storage::{
    Item, ItemStore, PrimaryKey, QueryPage, QueryRequest, StoreError, StoreResult, WriteBatch,
    WriteOperation,
};

use super::conversions::{
    condition_expression, from_dynamo_item, key_to_dynamo, to_dynamo_item,
};
use super::error::{
    map_batch_get_item_error, map_build_error, map_get_item_error, map_query_error,
    map_transact_write_error,
};

/// Keys per BatchGetItem request.
const BATCH_GET_SIZE: usize = 100;

/// Rounds spent re-requesting unprocessed keys before giving up.
const MAX_UNPROCESSED_ROUNDS: u32 = 5;

/// DynamoDB-based item store.
///
/// Point reads are strongly consistent; index queries are eventually
/// consistent, as DynamoDB offers nothing else on global secondary indexes.
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a new store using the AWS SDK default credential chain.
    pub async fn connect(table_name: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), table_name)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn transact_item(&self, operation: &WriteOperation) -> StoreResult<TransactWriteItem> {
        let item = match operation {
            WriteOperation::Put { item, condition } => {
                let put = Put::builder()
                    .table_name(&self.table_name)
                    .set_item(Some(to_dynamo_item(item)))
                    .set_condition_expression(
                        condition.map(|c| condition_expression(c).to_string()),
                    )
                    .build()
                    .map_err(map_build_error)?;
                TransactWriteItem::builder().put(put).build()
            }
            WriteOperation::ConditionCheck { key, condition } => {
                let check = ConditionCheck::builder()
                    .table_name(&self.table_name)
                    .set_key(Some(key_to_dynamo(key)))
                    .condition_expression(condition_expression(*condition))
                    .build()
                    .map_err(map_build_error)?;
                TransactWriteItem::builder().condition_check(check).build()
            }
        };
        Ok(item)
    }

    async fn batch_get_chunk(&self, keys: &[PrimaryKey]) -> StoreResult<Vec<Item>> {
        let mut pending: Vec<HashMap<String, DynamoValue>> =
            keys.iter().map(key_to_dynamo).collect();
        let mut items = Vec::with_capacity(keys.len());
        let mut round = 0;

        while !pending.is_empty() {
            if round == MAX_UNPROCESSED_ROUNDS {
                return Err(StoreError::Transient(format!(
                    "{} keys still unprocessed after {} rounds",
                    pending.len(),
                    round
                )));
            }
            if round > 0 {
                tokio::time::sleep(Duration::from_millis(50 << round)).await;
            }
            round += 1;

            let request = KeysAndAttributes::builder()
                .set_keys(Some(std::mem::take(&mut pending)))
                .consistent_read(true)
                .build()
                .map_err(map_build_error)?;

            let result = self
                .client
                .batch_get_item()
                .request_items(&self.table_name, request)
                .send()
                .await
                .map_err(map_batch_get_item_error)?;

            if let Some(mut responses) = result.responses {
                for item in responses.remove(&self.table_name).unwrap_or_default() {
                    items.push(from_dynamo_item(&item)?);
                }
            }

            if let Some(mut unprocessed) = result.unprocessed_keys {
                if let Some(keys) = unprocessed.remove(&self.table_name) {
                    pending = keys.keys;
                }
            }
        }

        Ok(items)
    }
}

// ============================================================================
// ItemStore implementation
// ============================================================================

#[async_trait]
impl ItemStore for DynamoDbStore {
    async fn get_item(&self, key: &PrimaryKey) -> StoreResult<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_to_dynamo(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(map_get_item_error)?;

        result.item.as_ref().map(from_dynamo_item).transpose()
    }

    async fn batch_get_items(&self, keys: &[PrimaryKey]) -> StoreResult<Vec<Item>> {
        let mut items = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(BATCH_GET_SIZE) {
            items.extend(self.batch_get_chunk(chunk).await?);
        }
        Ok(items)
    }

    async fn query(&self, request: &QueryRequest) -> StoreResult<QueryPage> {
        let index = request.index;
        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(index.index_name())
            .key_condition_expression("#pk = :pk AND begins_with(#sk, :prefix)")
            .expression_attribute_names("#pk", index.pk_attribute())
            .expression_attribute_names("#sk", index.sk_attribute())
            .expression_attribute_values(":pk", DynamoValue::S(request.partition_key.clone()))
            .expression_attribute_values(
                ":prefix",
                DynamoValue::S(request.sort_key_prefix.clone()),
            )
            .scan_index_forward(request.ascending)
            .limit(i32::try_from(request.limit).unwrap_or(i32::MAX))
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_dynamo_item))
            .send()
            .await
            .map_err(map_query_error)?;

        let items = result
            .items
            .unwrap_or_default()
            .iter()
            .map(from_dynamo_item)
            .collect::<StoreResult<Vec<_>>>()?;
        let last_evaluated_key = result
            .last_evaluated_key
            .as_ref()
            .map(from_dynamo_item)
            .transpose()?;

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    async fn transact_write(&self, batch: &WriteBatch) -> StoreResult<()> {
        let items = batch
            .operations
            .iter()
            .map(|operation| self.transact_item(operation))
            .collect::<StoreResult<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .client_request_token(&batch.client_token)
            .send()
            .await
            .map_err(|err| map_transact_write_error(err, batch.operations.len()))?;

        Ok(())
    }
}

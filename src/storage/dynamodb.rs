use super::checkpoint::Checkpoint;
use super::traits::{CheckpointStore, StorageError};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use std::collections::HashMap;

const ID_ATTRIBUTE: &str = "id";
const TIMESTAMP_ATTRIBUTE: &str = "logfile_timestamp";

/// Checkpoints as items `{id: S, logfile_timestamp: N}` in a table keyed by `id`.
pub struct DynamoDbCheckpointStore {
    client: Client,
    table_name: String,
}

impl DynamoDbCheckpointStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl CheckpointStore for DynamoDbCheckpointStore {
    async fn get(&self, id: &str) -> Result<Option<Checkpoint>, StorageError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ID_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| {
                StorageError::DynamoDb(format!(
                    "error getting checkpoint from {}: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        output.item().map(checkpoint_from_item).transpose()
    }

    async fn put(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(checkpoint_to_item(checkpoint)))
            .send()
            .await
            .map_err(|e| {
                StorageError::DynamoDb(format!(
                    "failed to save checkpoint to {}: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(())
    }
}

fn checkpoint_to_item(checkpoint: &Checkpoint) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            ID_ATTRIBUTE.to_string(),
            AttributeValue::S(checkpoint.id.clone()),
        ),
        (
            TIMESTAMP_ATTRIBUTE.to_string(),
            AttributeValue::N(checkpoint.log_file_timestamp.to_string()),
        ),
    ])
}

fn checkpoint_from_item(item: &HashMap<String, AttributeValue>) -> Result<Checkpoint, StorageError> {
    let id = item
        .get(ID_ATTRIBUTE)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| StorageError::MalformedItem(format!("missing string attribute '{}'", ID_ATTRIBUTE)))?;

    // An absent timestamp reads as 0, matching items written with the attribute omitted.
    let log_file_timestamp = match item.get(TIMESTAMP_ATTRIBUTE) {
        None => 0,
        Some(value) => {
            let raw = value.as_n().map_err(|_| {
                StorageError::MalformedItem(format!(
                    "attribute '{}' is not a number",
                    TIMESTAMP_ATTRIBUTE
                ))
            })?;
            raw.parse::<i64>().map_err(|e| {
                StorageError::MalformedItem(format!(
                    "attribute '{}' value '{}': {}",
                    TIMESTAMP_ATTRIBUTE, raw, e
                ))
            })?
        }
    };

    Ok(Checkpoint::new(id.clone(), log_file_timestamp))
}

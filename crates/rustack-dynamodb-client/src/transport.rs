//! The transport seam.
//!
//! A [`DynamoDBTransport`] sends one typed request and returns the typed
//! response or the store's error. Signing, retries, timeouts and connection
//! management all live behind it.
//!
//! # Object safety
//!
//! The client holds the transport as `Arc<dyn DynamoDBTransport>`, so the trait
//! uses `#[async_trait]`.

use std::fmt::Debug;

use rustack_dynamodb_model::DynamoDBError;
use rustack_dynamodb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, UpdateItemInput,
};
use rustack_dynamodb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, UpdateItemOutput,
};

/// One round-trip per call, for each of the eight item operations.
#[async_trait::async_trait]
pub trait DynamoDBTransport: Send + Sync + Debug {
    /// `GetItem`
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError>;

    /// `PutItem`
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError>;

    /// `UpdateItem`
    async fn update_item(&self, input: UpdateItemInput)
    -> Result<UpdateItemOutput, DynamoDBError>;

    /// `DeleteItem`
    async fn delete_item(&self, input: DeleteItemInput)
    -> Result<DeleteItemOutput, DynamoDBError>;

    /// `Query`
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError>;

    /// `Scan`
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError>;

    /// `BatchGetItem`
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError>;

    /// `BatchWriteItem`
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError>;
}

//! The client handle.
//!
//! [`Client`] is cheap to clone: it holds the transport and the configuration
//! behind `Arc`s. Every builder it hands out captures a clone, so builders are
//! independent values owned by the call chain that created them.

use std::sync::Arc;

use rustack_dynamodb_model::types::{
    ConsumedCapacity, ItemCollectionMetrics, ReturnConsumedCapacity, ReturnItemCollectionMetrics,
};
use rustack_dynamodb_model::{DynamoDBOperation, Item, Key};
use tracing::debug;

use crate::config::ClientConfig;
use crate::model::Model;
use crate::operation::{BatchGet, BatchWrite, Delete, Get, Put, Query, Scan, Update};
use crate::transport::DynamoDBTransport;

/// Entry point for every operation.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Arc<dyn DynamoDBTransport>,
    config: Arc<ClientConfig>,
}

impl Client {
    /// Create a client over `transport`.
    pub fn new(transport: impl DynamoDBTransport + 'static, config: ClientConfig) -> Self {
        Self::from_arc(Arc::new(transport), config)
    }

    /// Create a client over a shared transport.
    #[must_use]
    pub fn from_arc(transport: Arc<dyn DynamoDBTransport>, config: ClientConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The physical table name of `M`, prefix included.
    #[must_use]
    pub fn table_name<M: Model>(&self) -> String {
        self.config.table_name(M::schema().table_name())
    }

    pub(crate) fn transport(&self) -> &Arc<dyn DynamoDBTransport> {
        &self.transport
    }

    /// The consumed-capacity mode to request, omitted when it is `NONE`.
    pub(crate) fn consumed_capacity(&self, quiet: bool) -> Option<ReturnConsumedCapacity> {
        let mode = if quiet {
            ReturnConsumedCapacity::None
        } else {
            self.config.return_consumed_capacity
        };
        (mode != ReturnConsumedCapacity::None).then_some(mode)
    }

    /// The item-collection-metrics mode to request, omitted when it is `NONE`.
    pub(crate) fn collection_metrics(&self, quiet: bool) -> Option<ReturnItemCollectionMetrics> {
        let mode = if quiet {
            ReturnItemCollectionMetrics::None
        } else {
            self.config.return_item_collection_metrics
        };
        (mode != ReturnItemCollectionMetrics::None).then_some(mode)
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Read one record by primary key.
    #[must_use]
    pub fn get<M: Model>(&self, key: Key) -> Get<M> {
        Get::new(self.clone(), key)
    }

    /// Query one partition of `M`'s table or of one of its indexes.
    #[must_use]
    pub fn query<M: Model>(&self) -> Query<M> {
        Query::new(self.clone())
    }

    /// Scan `M`'s table or one of its indexes.
    #[must_use]
    pub fn scan<M: Model>(&self) -> Scan<M> {
        Scan::new(self.clone())
    }

    /// Write `record`, replacing any item with the same key.
    #[must_use]
    pub fn put<M: Model>(&self, record: &M) -> Put<M> {
        Put::new(self.clone(), record.to_item())
    }

    /// Write a raw attribute map to `M`'s table.
    #[must_use]
    pub fn put_item<M: Model>(&self, item: Item) -> Put<M> {
        Put::new(self.clone(), item)
    }

    /// Write `record` only if no item with its primary key exists yet.
    ///
    /// Every key attribute gets an `attribute_not_exists` guard.
    #[must_use]
    pub fn create<M: Model>(&self, record: &M) -> Put<M> {
        let schema = M::schema();
        let put = Put::new(self.clone(), record.to_item())
            .condition(schema.hash_key())
            .not_exists();
        match schema.range_key() {
            Some(range) => put.condition(range).not_exists(),
            None => put,
        }
    }

    /// Modify one record in place.
    #[must_use]
    pub fn update<M: Model>(&self, key: Key) -> Update<M> {
        Update::new(self.clone(), key)
    }

    /// Delete one record by primary key.
    #[must_use]
    pub fn delete<M: Model>(&self, key: Key) -> Delete<M> {
        Delete::new(self.clone(), key)
    }

    /// Read many records by primary key.
    pub fn batch_get<M: Model>(&self, keys: impl IntoIterator<Item = Key>) -> BatchGet<M> {
        BatchGet::new(self.clone(), keys.into_iter().collect())
    }

    /// Put and delete many records.
    #[must_use]
    pub fn batch_write<M: Model>(&self) -> BatchWrite<M> {
        BatchWrite::new(self.clone())
    }
}

/// Log the capacity report of a response, if the store sent one.
pub(crate) fn log_consumed_capacity(
    operation: DynamoDBOperation,
    capacity: Option<&ConsumedCapacity>,
) {
    if let Some(capacity) = capacity {
        debug!(
            %operation,
            table = capacity.table_name.as_deref().unwrap_or_default(),
            capacity_units = ?capacity.capacity_units,
            "Consumed capacity"
        );
    }
}

/// Log the item collection metrics of a write response, if the store sent any.
pub(crate) fn log_collection_metrics(
    operation: DynamoDBOperation,
    metrics: Option<&ItemCollectionMetrics>,
) {
    if let Some(metrics) = metrics {
        debug!(
            %operation,
            size_estimate_range_gb = ?metrics.size_estimate_range_gb,
            "Item collection metrics"
        );
    }
}

//! Client configuration.
//!
//! Provides [`ClientConfig`], the defaults the client applies to every
//! operation a builder does not override. Values can be loaded from
//! environment variables via [`ClientConfig::from_env`].

use rustack_dynamodb_model::types::{ReturnConsumedCapacity, ReturnItemCollectionMetrics};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// DynamoDB client configuration.
///
/// # Examples
///
/// ```
/// use rustack_dynamodb_client::config::ClientConfig;
///
/// let config = ClientConfig::builder().table_prefix("dev_".into()).build();
/// assert_eq!(config.table_name("users"), "dev_users");
/// assert!(config.auto_timestamps);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Consumed capacity reporting requested on every operation.
    #[builder(default = ReturnConsumedCapacity::Total)]
    pub return_consumed_capacity: ReturnConsumedCapacity,

    /// Item collection metrics requested on every write.
    #[builder(default = ReturnItemCollectionMetrics::Size)]
    pub return_item_collection_metrics: ReturnItemCollectionMetrics,

    /// Prefix prepended to every table name.
    #[builder(default)]
    pub table_prefix: String,

    /// Fill created/updated timestamp fields on put and update.
    #[builder(default = true)]
    pub auto_timestamps: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            return_consumed_capacity: ReturnConsumedCapacity::Total,
            return_item_collection_metrics: ReturnItemCollectionMetrics::Size,
            table_prefix: String::new(),
            auto_timestamps: true,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables (falling back to defaults):
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DYNAMODB_RETURN_CONSUMED_CAPACITY` | `TOTAL` |
    /// | `DYNAMODB_RETURN_ITEM_COLLECTION_METRICS` | `SIZE` |
    /// | `DYNAMODB_TABLE_PREFIX` | (empty) |
    /// | `DYNAMODB_AUTO_TIMESTAMPS` | `true` |
    ///
    /// Unrecognized enum values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("DYNAMODB_RETURN_CONSUMED_CAPACITY") {
            if let Some(parsed) = ReturnConsumedCapacity::from_name(&v) {
                config.return_consumed_capacity = parsed;
            }
        }
        if let Ok(v) = std::env::var("DYNAMODB_RETURN_ITEM_COLLECTION_METRICS") {
            if let Some(parsed) = ReturnItemCollectionMetrics::from_name(&v) {
                config.return_item_collection_metrics = parsed;
            }
        }
        if let Ok(v) = std::env::var("DYNAMODB_TABLE_PREFIX") {
            config.table_prefix = v;
        }
        if let Ok(v) = std::env::var("DYNAMODB_AUTO_TIMESTAMPS") {
            config.auto_timestamps = parse_bool(&v);
        }

        config
    }

    /// The physical table name for `base`.
    #[must_use]
    pub fn table_name(&self, base: &str) -> String {
        format!("{}{base}", self.table_prefix)
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

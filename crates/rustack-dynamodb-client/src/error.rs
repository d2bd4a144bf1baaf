//! Client error types.
//!
//! Local failures ([`ClientError::Expression`], [`ClientError::EmptyMutation`],
//! [`ClientError::EmptyItem`], [`ClientError::InvalidParameter`]) are detected
//! before any request is sent. Remote failures are classified once, by
//! [`DynamoDBErrorCode`], when they come back from the transport.

use rustack_dynamodb_model::{DynamoDBError, DynamoDBErrorCode};

use crate::expression::ExpressionError;

/// Errors raised while building a [`TableSchema`](crate::schema::TableSchema)
/// or extracting a key from an item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The table name is empty.
    #[error("Table name must not be empty")]
    MissingTableName,

    /// No hash key was declared.
    #[error("Table {table} has no hash key")]
    MissingHashKey {
        /// The table name.
        table: String,
    },

    /// The hash key or range key was declared twice.
    #[error("Table {table} declares key attribute {attribute} more than once")]
    DuplicateKey {
        /// The table name.
        table: String,
        /// The attribute declared twice.
        attribute: String,
    },

    /// Two indexes share a name.
    #[error("Table {table} declares index {index} more than once")]
    DuplicateIndex {
        /// The table name.
        table: String,
        /// The index name.
        index: String,
    },

    /// An item lacks one of the key attributes.
    #[error("Item is missing key attribute {attribute}")]
    MissingKeyAttribute {
        /// The key attribute.
        attribute: String,
    },

    /// The named index is not declared on the table.
    #[error("Table {table} has no index named {index}")]
    UnknownIndex {
        /// The table name.
        table: String,
        /// The requested index name.
        index: String,
    },

    /// A key with a range component was requested on a hash-only table.
    #[error("Table {table} has no range key")]
    MissingRangeKey {
        /// The table name.
        table: String,
    },
}

/// Errors surfaced by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An expression could not be compiled.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// An update accumulated no `SET` / `REMOVE` / `ADD` / `DELETE` action.
    #[error("Update requires at least one SET, REMOVE, ADD or DELETE action")]
    EmptyMutation,

    /// A put was given an item without attributes.
    #[error("Put requires an item with at least one attribute")]
    EmptyItem,

    /// A builder parameter is out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// What is wrong.
        message: String,
    },

    /// The store rejected a write condition.
    #[error("The conditional request failed: {0}")]
    ConditionalCheckFailed(#[source] DynamoDBError),

    /// Any other error returned by the transport, unmodified.
    #[error(transparent)]
    Transport(DynamoDBError),

    /// The table schema is invalid or an item does not match it.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The record layer rejected an attribute map.
    #[error("Failed to hydrate record: {message}")]
    Hydration {
        /// What is wrong.
        message: String,
    },

    /// A request could not be rendered as JSON.
    #[error("Failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DynamoDBError> for ClientError {
    fn from(err: DynamoDBError) -> Self {
        match err.code {
            DynamoDBErrorCode::ConditionalCheckFailedException => Self::ConditionalCheckFailed(err),
            _ => Self::Transport(err),
        }
    }
}

impl ClientError {
    /// Shorthand for [`ClientError::InvalidParameter`].
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Shorthand for [`ClientError::Hydration`].
    pub fn hydration(message: impl Into<String>) -> Self {
        Self::Hydration {
            message: message.into(),
        }
    }

    /// Returns `true` if the store rejected a write condition.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(self, Self::ConditionalCheckFailed(_))
    }

    /// The remote error, when this error came from the transport.
    #[must_use]
    pub fn remote(&self) -> Option<&DynamoDBError> {
        match self {
            Self::ConditionalCheckFailed(e) | Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

/// Convenient result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

//! DynamoDB expression engine and operation client for Rustack.
//!
//! This crate turns fluent, typed operation builders into the exact request
//! parameters DynamoDB expects, and drives the request/response loops the
//! API requires:
//!
//! - [`expression`]: attribute paths, the expression compiler and the logic
//!   scopes that join fragments into `KeyConditionExpression`,
//!   `FilterExpression`, `ConditionExpression`, `UpdateExpression` and
//!   `ProjectionExpression`.
//! - [`operation`]: one builder per item operation.
//! - [`pagination`]: cursor-following for `Query` / `Scan` and chunking with
//!   unprocessed-item retry for `BatchGetItem` / `BatchWriteItem`.
//!
//! The wire transport is a trait ([`transport::DynamoDBTransport`]); records
//! plug in through [`model::Model`] and a [`schema::TableSchema`].
//!
//! ```no_run
//! # use rustack_dynamodb_client::{Client, ClientResult, Model};
//! # async fn run<User: Model>(client: Client) -> ClientResult<()> {
//! let adults: Vec<User> = client
//!     .query::<User>()
//!     .key("team")
//!     .eq("core")
//!     .filter("age")
//!     .gte(18_i64)
//!     .await?;
//! # Ok(())
//! # }
//! ```
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod expression;
pub mod model;
pub mod operation;
pub mod pagination;
pub mod schema;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, SchemaError};
pub use model::Model;
pub use schema::{TableSchema, TimestampKind};
pub use transport::DynamoDBTransport;

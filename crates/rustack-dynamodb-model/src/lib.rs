//! DynamoDB wire model types for the Rustack DynamoDB client.
//!
//! This crate describes the request and response shapes of the eight item
//! operations (`GetItem`, `PutItem`, `UpdateItem`, `DeleteItem`, `Query`,
//! `Scan`, `BatchGetItem`, `BatchWriteItem`) exactly as they travel over the
//! DynamoDB JSON protocol. The types are hand-written since DynamoDB's JSON
//! protocol makes serde derives trivial.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
pub use types::{Item, Key};

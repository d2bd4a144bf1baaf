//! Shared fixtures: a scripted in-memory transport and two sample records.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, LazyLock, Once};

use parking_lot::Mutex;
use rustack_dynamodb_client::model::{take_number, take_string};
use rustack_dynamodb_client::{
    Client, ClientConfig, ClientResult, DynamoDBTransport, Model, TableSchema, TimestampKind,
};
use rustack_dynamodb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    QueryInput, ScanInput, UpdateItemInput,
};
use rustack_dynamodb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    QueryOutput, ScanOutput, UpdateItemOutput,
};
use rustack_dynamodb_model::{AttributeValue, DynamoDBError, Item, Key};

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A request the mock received.
#[derive(Debug, Clone)]
pub enum Recorded {
    GetItem(GetItemInput),
    PutItem(PutItemInput),
    UpdateItem(UpdateItemInput),
    DeleteItem(DeleteItemInput),
    Query(QueryInput),
    Scan(ScanInput),
    BatchGetItem(BatchGetItemInput),
    BatchWriteItem(BatchWriteItemInput),
}

type Reply<T> = VecDeque<Result<T, DynamoDBError>>;

#[derive(Debug, Default)]
struct Script {
    requests: Vec<Recorded>,
    get_item: Reply<GetItemOutput>,
    put_item: Reply<PutItemOutput>,
    update_item: Reply<UpdateItemOutput>,
    delete_item: Reply<DeleteItemOutput>,
    query: Reply<QueryOutput>,
    scan: Reply<ScanOutput>,
    batch_get_item: Reply<BatchGetItemOutput>,
    batch_write_item: Reply<BatchWriteItemOutput>,
}

/// Replays queued responses per operation and records every request.
///
/// With nothing queued, reads return nothing, writes succeed, batch gets
/// echo their keys back as items and batch writes leave nothing unprocessed.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply_get_item(&self, reply: Result<GetItemOutput, DynamoDBError>) {
        self.script.lock().get_item.push_back(reply);
    }

    pub fn reply_put_item(&self, reply: Result<PutItemOutput, DynamoDBError>) {
        self.script.lock().put_item.push_back(reply);
    }

    pub fn reply_update_item(&self, reply: Result<UpdateItemOutput, DynamoDBError>) {
        self.script.lock().update_item.push_back(reply);
    }

    pub fn reply_delete_item(&self, reply: Result<DeleteItemOutput, DynamoDBError>) {
        self.script.lock().delete_item.push_back(reply);
    }

    pub fn reply_query(&self, reply: Result<QueryOutput, DynamoDBError>) {
        self.script.lock().query.push_back(reply);
    }

    pub fn reply_scan(&self, reply: Result<ScanOutput, DynamoDBError>) {
        self.script.lock().scan.push_back(reply);
    }

    pub fn reply_batch_get_item(&self, reply: Result<BatchGetItemOutput, DynamoDBError>) {
        self.script.lock().batch_get_item.push_back(reply);
    }

    pub fn reply_batch_write_item(&self, reply: Result<BatchWriteItemOutput, DynamoDBError>) {
        self.script.lock().batch_write_item.push_back(reply);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.script.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.script.lock().requests.len()
    }

    pub fn queries(&self) -> Vec<QueryInput> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Query(input) => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn scans(&self) -> Vec<ScanInput> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Scan(input) => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn batch_gets(&self) -> Vec<BatchGetItemInput> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::BatchGetItem(input) => Some(input),
                _ => None,
            })
            .collect()
    }

    pub fn batch_writes(&self) -> Vec<BatchWriteItemInput> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::BatchWriteItem(input) => Some(input),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl DynamoDBTransport for MockTransport {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::GetItem(input));
        script
            .get_item
            .pop_front()
            .unwrap_or_else(|| Ok(GetItemOutput::default()))
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::PutItem(input));
        script
            .put_item
            .pop_front()
            .unwrap_or_else(|| Ok(PutItemOutput::default()))
    }

    async fn update_item(
        &self,
        input: UpdateItemInput,
    ) -> Result<UpdateItemOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::UpdateItem(input));
        script
            .update_item
            .pop_front()
            .unwrap_or_else(|| Ok(UpdateItemOutput::default()))
    }

    async fn delete_item(
        &self,
        input: DeleteItemInput,
    ) -> Result<DeleteItemOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::DeleteItem(input));
        script
            .delete_item
            .pop_front()
            .unwrap_or_else(|| Ok(DeleteItemOutput::default()))
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::Query(input));
        script
            .query
            .pop_front()
            .unwrap_or_else(|| Ok(QueryOutput::default()))
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::Scan(input));
        script
            .scan
            .pop_front()
            .unwrap_or_else(|| Ok(ScanOutput::default()))
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::BatchGetItem(input.clone()));
        script.batch_get_item.pop_front().unwrap_or_else(|| {
            Ok(BatchGetItemOutput {
                responses: input
                    .request_items
                    .into_iter()
                    .map(|(table, request)| (table, request.keys))
                    .collect(),
                ..BatchGetItemOutput::default()
            })
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        let mut script = self.script.lock();
        script.requests.push(Recorded::BatchWriteItem(input));
        script
            .batch_write_item
            .pop_front()
            .unwrap_or_else(|| Ok(BatchWriteItemOutput::default()))
    }
}

/// A client over `transport` with the default configuration.
pub fn client(transport: &Arc<MockTransport>) -> Client {
    client_with(transport, ClientConfig::default())
}

pub fn client_with(transport: &Arc<MockTransport>, config: ClientConfig) -> Client {
    init_tracing();
    Client::from_arc(transport.clone(), config)
}

/// A client that requests neither capacity nor metrics.
pub fn quiet_client(transport: &Arc<MockTransport>) -> Client {
    client_with(
        transport,
        ClientConfig::builder()
            .return_consumed_capacity(rustack_dynamodb_model::types::ReturnConsumedCapacity::None)
            .return_item_collection_metrics(
                rustack_dynamodb_model::types::ReturnItemCollectionMetrics::None,
            )
            .build(),
    )
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Keyed by `uid` + `name`, with a `team` / `age` global index.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub uid: String,
    pub name: String,
    pub team: Option<String>,
    pub age: Option<u32>,
}

impl User {
    pub fn new(uid: &str, name: &str) -> Self {
        Self {
            uid: uid.to_owned(),
            name: name.to_owned(),
            team: None,
            age: None,
        }
    }
}

static USERS: LazyLock<TableSchema> = LazyLock::new(|| {
    TableSchema::builder("users")
        .hash_key("uid")
        .range_key("name")
        .named_global_index("team-index", "team", Some("age"))
        .build()
        .expect("users schema")
});

impl Model for User {
    fn schema() -> &'static TableSchema {
        &USERS
    }

    fn from_item(mut item: Item) -> ClientResult<Self> {
        Ok(Self {
            uid: take_string(&mut item, "uid")?,
            name: take_string(&mut item, "name")?,
            team: take_string(&mut item, "team").ok(),
            age: take_number(&mut item, "age").ok(),
        })
    }

    fn to_item(&self) -> Item {
        let mut item = Item::from([
            ("uid".to_owned(), AttributeValue::from(self.uid.as_str())),
            ("name".to_owned(), AttributeValue::from(self.name.as_str())),
        ]);
        if let Some(team) = &self.team {
            item.insert("team".to_owned(), team.as_str().into());
        }
        if let Some(age) = self.age {
            item.insert("age".to_owned(), age.into());
        }
        item
    }
}

/// The key of the user `uid` / `name`.
pub fn user_key(uid: &str, name: &str) -> Key {
    User::schema()
        .key_with_range(uid, name)
        .expect("users have a range key")
}

/// Keyed by `token`, with created / updated timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub owner: String,
}

static SESSIONS: LazyLock<TableSchema> = LazyLock::new(|| {
    TableSchema::builder("sessions")
        .hash_key("token")
        .timestamp(TimestampKind::Created, "createdAt")
        .timestamp(TimestampKind::Updated, "updatedAt")
        .build()
        .expect("sessions schema")
});

impl Model for Session {
    fn schema() -> &'static TableSchema {
        &SESSIONS
    }

    fn from_item(mut item: Item) -> ClientResult<Self> {
        Ok(Self {
            token: take_string(&mut item, "token")?,
            owner: take_string(&mut item, "owner")?,
        })
    }

    fn to_item(&self) -> Item {
        Item::from([
            ("token".to_owned(), AttributeValue::from(self.token.as_str())),
            ("owner".to_owned(), AttributeValue::from(self.owner.as_str())),
        ])
    }
}

/// A string attribute value, for building expected items.
pub fn s(value: &str) -> AttributeValue {
    AttributeValue::from(value)
}

/// The key of the session `token`.
pub fn session_key(token: &str) -> Key {
    Session::schema().key(token)
}

//! Pagination and batch continuation.
//!
//! Each pager is an explicit state machine advanced by `next_page()`. One call
//! is at most one request; nothing is fetched until the caller asks for the
//! next page, so dropping a pager (or the stream built from it) stops the
//! operation without another round-trip.
//!
//! - [`CursorPager`] follows `LastEvaluatedKey` for `Query` and `Scan` until
//!   the store stops returning one.
//! - [`BatchGetPager`] and [`BatchWritePager`] split their input into chunks of
//!   the store's per-call cap and re-submit whatever the store reports as
//!   unprocessed, verbatim, before moving on to the next chunk.
//!
//! A transport error aborts the pager: it reports the error once and is done.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use rustack_dynamodb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, QueryInput, ScanInput,
};
use rustack_dynamodb_model::types::{
    KeysAndAttributes, ReturnConsumedCapacity, ReturnItemCollectionMetrics, WriteRequest,
};
use rustack_dynamodb_model::{DynamoDBError, DynamoDBOperation, Item, Key};
use tracing::{debug, warn};

use crate::client::{log_collection_metrics, log_consumed_capacity};
use crate::error::{ClientError, ClientResult};
use crate::model::{Model, hydrate};
use crate::transport::DynamoDBTransport;

/// Maximum number of keys per `BatchGetItem` call.
pub const BATCH_GET_MAX_KEYS: usize = 100;

/// Maximum number of write requests per `BatchWriteItem` call.
pub const BATCH_WRITE_MAX_ITEMS: usize = 25;

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

/// One `Query` or `Scan` response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items of this page. Empty in count mode.
    pub items: Vec<Item>,
    /// Items matched in this page, after filtering.
    pub count: u64,
    /// Items evaluated in this page, before filtering.
    pub scanned_count: u64,
    /// Where the next page starts, if there is one.
    pub cursor: Option<Key>,
}

/// A request that can be resumed from a cursor.
#[async_trait::async_trait]
pub trait CursorRequest: Clone + Debug + Send + Sync + 'static {
    /// The operation this request performs.
    const OPERATION: DynamoDBOperation;

    /// The target table.
    fn table_name(&self) -> &str;

    /// Set or clear `ExclusiveStartKey`.
    fn set_cursor(&mut self, cursor: Option<Key>);

    /// Send the request.
    async fn execute(self, transport: &dyn DynamoDBTransport) -> Result<Page, DynamoDBError>;
}

fn count(value: i32) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn cursor(last_evaluated_key: Key) -> Option<Key> {
    (!last_evaluated_key.is_empty()).then_some(last_evaluated_key)
}

#[async_trait::async_trait]
impl CursorRequest for QueryInput {
    const OPERATION: DynamoDBOperation = DynamoDBOperation::Query;

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn set_cursor(&mut self, cursor: Option<Key>) {
        self.exclusive_start_key = cursor.unwrap_or_default();
    }

    async fn execute(self, transport: &dyn DynamoDBTransport) -> Result<Page, DynamoDBError> {
        let output = transport.query(self).await?;
        log_consumed_capacity(Self::OPERATION, output.consumed_capacity.as_ref());
        Ok(Page {
            items: output.items,
            count: count(output.count),
            scanned_count: count(output.scanned_count),
            cursor: cursor(output.last_evaluated_key),
        })
    }
}

#[async_trait::async_trait]
impl CursorRequest for ScanInput {
    const OPERATION: DynamoDBOperation = DynamoDBOperation::Scan;

    fn table_name(&self) -> &str {
        &self.table_name
    }

    fn set_cursor(&mut self, cursor: Option<Key>) {
        self.exclusive_start_key = cursor.unwrap_or_default();
    }

    async fn execute(self, transport: &dyn DynamoDBTransport) -> Result<Page, DynamoDBError> {
        let output = transport.scan(self).await?;
        log_consumed_capacity(Self::OPERATION, output.consumed_capacity.as_ref());
        Ok(Page {
            items: output.items,
            count: count(output.count),
            scanned_count: count(output.scanned_count),
            cursor: cursor(output.last_evaluated_key),
        })
    }
}

#[derive(Debug)]
enum CursorState {
    Start,
    Next(Key),
    Done,
}

/// Follows the continuation cursor of a `Query` or `Scan`.
#[derive(Debug)]
pub struct CursorPager<R> {
    transport: Arc<dyn DynamoDBTransport>,
    request: R,
    state: CursorState,
    round: usize,
}

/// Pager over `Query` pages.
pub type QueryPager = CursorPager<QueryInput>;

/// Pager over `Scan` pages.
pub type ScanPager = CursorPager<ScanInput>;

impl<R: CursorRequest> CursorPager<R> {
    /// Page through `request`, starting at its first page.
    pub fn new(transport: Arc<dyn DynamoDBTransport>, request: R) -> Self {
        Self {
            transport,
            request,
            state: CursorState::Start,
            round: 0,
        }
    }

    /// Returns `true` once the last page was returned or a request failed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self.state, CursorState::Done)
    }

    /// Request the next page. `None` once there are no more.
    pub async fn next_page(&mut self) -> ClientResult<Option<Page>> {
        let cursor = match mem::replace(&mut self.state, CursorState::Done) {
            CursorState::Done => return Ok(None),
            CursorState::Start => None,
            CursorState::Next(key) => Some(key),
        };
        self.round += 1;

        debug!(
            operation = %R::OPERATION,
            table = %self.request.table_name(),
            round = self.round,
            has_cursor = cursor.is_some(),
            "Requesting page"
        );

        let mut request = self.request.clone();
        request.set_cursor(cursor);
        let page = request.execute(self.transport.as_ref()).await?;

        if let Some(next) = &page.cursor {
            self.state = CursorState::Next(next.clone());
        }
        Ok(Some(page))
    }

    /// Turn the pager into a pull-based stream of pages.
    pub fn into_stream(self) -> BoxStream<'static, ClientResult<Page>> {
        stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_page().await?.map(|page| (page, pager)))
        })
        .boxed()
    }
}

/// Typed terminals over a `Query` or `Scan` request.
///
/// Holds the rendered first-page request, or the error rendering it failed
/// with; every terminal reports that error before any call.
#[derive(Debug)]
pub(crate) struct Paged<R, M> {
    transport: Arc<dyn DynamoDBTransport>,
    request: ClientResult<R>,
    _model: PhantomData<fn() -> M>,
}

impl<R: CursorRequest, M: Model> Paged<R, M> {
    pub(crate) fn new(transport: Arc<dyn DynamoDBTransport>, request: ClientResult<R>) -> Self {
        Self {
            transport,
            request,
            _model: PhantomData,
        }
    }

    /// One `Vec` of records per page.
    pub(crate) fn pages(self) -> BoxStream<'static, ClientResult<Vec<M>>> {
        match self.request {
            Ok(request) => CursorPager::new(self.transport, request)
                .into_stream()
                .and_then(|page| future::ready(hydrate::<M>(page.items)))
                .boxed(),
            Err(e) => stream::once(future::ready(Err(e))).boxed(),
        }
    }

    /// Records one at a time.
    pub(crate) fn stream(self) -> BoxStream<'static, ClientResult<M>> {
        self.pages()
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<M, ClientError>)))
            .try_flatten()
            .boxed()
    }

    pub(crate) async fn all(self) -> ClientResult<Vec<M>> {
        self.pages().try_concat().await
    }

    /// Stops requesting pages once a record is found.
    pub(crate) async fn one(self) -> ClientResult<Option<M>> {
        self.stream().try_next().await
    }

    /// Sum of `Count` across every page. The request must already ask for
    /// `Select=COUNT`.
    pub(crate) async fn count(self) -> ClientResult<u64> {
        let mut pager = CursorPager::new(self.transport, self.request?);
        let mut total = 0;
        while let Some(page) = pager.next_page().await? {
            total += page.count;
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Batch get
// ---------------------------------------------------------------------------

/// Drives `BatchGetItem` over any number of keys.
#[derive(Debug)]
pub struct BatchGetPager {
    transport: Arc<dyn DynamoDBTransport>,
    table_name: String,
    template: KeysAndAttributes,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    pending: VecDeque<Vec<Key>>,
    unprocessed: Option<KeysAndAttributes>,
    round: usize,
}

impl BatchGetPager {
    /// Read `keys` from `table_name`. `template` carries the projection and
    /// consistency settings applied to every chunk; its keys are ignored.
    pub fn new(
        transport: Arc<dyn DynamoDBTransport>,
        table_name: impl Into<String>,
        keys: Vec<Key>,
        template: KeysAndAttributes,
        return_consumed_capacity: Option<ReturnConsumedCapacity>,
    ) -> Self {
        Self {
            transport,
            table_name: table_name.into(),
            template: KeysAndAttributes {
                keys: Vec::new(),
                ..template
            },
            return_consumed_capacity,
            pending: chunk(keys, BATCH_GET_MAX_KEYS),
            unprocessed: None,
            round: 0,
        }
    }

    /// Returns `true` once every key was processed or a request failed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.unprocessed.is_none()
    }

    /// The requests still to be sent for the remaining chunks, ignoring any
    /// unprocessed remainder.
    #[must_use]
    pub fn inputs(&self) -> Vec<BatchGetItemInput> {
        self.pending
            .iter()
            .map(|keys| self.input(self.chunk_request(keys.clone())))
            .collect()
    }

    /// Send the next round and return the items it read. `None` once done.
    pub async fn next_page(&mut self) -> ClientResult<Option<Vec<Item>>> {
        let request = match self.unprocessed.take() {
            Some(retry) => retry,
            None => match self.pending.pop_front() {
                Some(keys) => self.chunk_request(keys),
                None => return Ok(None),
            },
        };
        self.round += 1;

        debug!(
            operation = %DynamoDBOperation::BatchGetItem,
            table = %self.table_name,
            round = self.round,
            keys = request.keys.len(),
            remaining_chunks = self.pending.len(),
            "Requesting batch"
        );

        let input = self.input(request);
        let mut output = match self.transport.batch_get_item(input).await {
            Ok(output) => output,
            Err(e) => {
                self.pending.clear();
                return Err(e.into());
            }
        };

        for capacity in &output.consumed_capacity {
            log_consumed_capacity(DynamoDBOperation::BatchGetItem, Some(capacity));
        }

        if let Some(rest) = output
            .unprocessed_keys
            .remove(&self.table_name)
            .filter(|rest| !rest.keys.is_empty())
        {
            warn!(
                table = %self.table_name,
                round = self.round,
                unprocessed = rest.keys.len(),
                "Batch get left keys unprocessed, retrying"
            );
            self.unprocessed = Some(rest);
        }

        Ok(Some(
            output
                .responses
                .remove(&self.table_name)
                .unwrap_or_default(),
        ))
    }

    /// Turn the pager into a pull-based stream of item batches.
    pub fn into_stream(self) -> BoxStream<'static, ClientResult<Vec<Item>>> {
        stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_page().await?.map(|items| (items, pager)))
        })
        .boxed()
    }

    fn chunk_request(&self, keys: Vec<Key>) -> KeysAndAttributes {
        KeysAndAttributes {
            keys,
            ..self.template.clone()
        }
    }

    fn input(&self, request: KeysAndAttributes) -> BatchGetItemInput {
        BatchGetItemInput {
            request_items: HashMap::from([(self.table_name.clone(), request)]),
            return_consumed_capacity: self.return_consumed_capacity,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch write
// ---------------------------------------------------------------------------

/// Drives `BatchWriteItem` over any number of write requests.
#[derive(Debug)]
pub struct BatchWritePager {
    transport: Arc<dyn DynamoDBTransport>,
    table_name: String,
    return_consumed_capacity: Option<ReturnConsumedCapacity>,
    return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
    pending: VecDeque<Vec<WriteRequest>>,
    unprocessed: Option<Vec<WriteRequest>>,
    round: usize,
}

impl BatchWritePager {
    /// Send `requests` to `table_name`.
    pub fn new(
        transport: Arc<dyn DynamoDBTransport>,
        table_name: impl Into<String>,
        requests: Vec<WriteRequest>,
        return_consumed_capacity: Option<ReturnConsumedCapacity>,
        return_item_collection_metrics: Option<ReturnItemCollectionMetrics>,
    ) -> Self {
        Self {
            transport,
            table_name: table_name.into(),
            return_consumed_capacity,
            return_item_collection_metrics,
            pending: chunk(requests, BATCH_WRITE_MAX_ITEMS),
            unprocessed: None,
            round: 0,
        }
    }

    /// Returns `true` once every request was processed or a request failed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.unprocessed.is_none()
    }

    /// The requests still to be sent for the remaining chunks, ignoring any
    /// unprocessed remainder.
    #[must_use]
    pub fn inputs(&self) -> Vec<BatchWriteItemInput> {
        self.pending
            .iter()
            .map(|requests| self.input(requests.clone()))
            .collect()
    }

    /// Send the next round and return how many requests the store accepted.
    /// `None` once done.
    pub async fn next_page(&mut self) -> ClientResult<Option<usize>> {
        let requests = match self.unprocessed.take() {
            Some(retry) => retry,
            None => match self.pending.pop_front() {
                Some(requests) => requests,
                None => return Ok(None),
            },
        };
        self.round += 1;
        let sent = requests.len();

        debug!(
            operation = %DynamoDBOperation::BatchWriteItem,
            table = %self.table_name,
            round = self.round,
            requests = sent,
            remaining_chunks = self.pending.len(),
            "Requesting batch"
        );

        let input = self.input(requests);
        let mut output = match self.transport.batch_write_item(input).await {
            Ok(output) => output,
            Err(e) => {
                self.pending.clear();
                return Err(e.into());
            }
        };

        for capacity in &output.consumed_capacity {
            log_consumed_capacity(DynamoDBOperation::BatchWriteItem, Some(capacity));
        }
        for metrics in output.item_collection_metrics.values().flatten() {
            log_collection_metrics(DynamoDBOperation::BatchWriteItem, Some(metrics));
        }

        let mut left = 0;
        if let Some(rest) = output
            .unprocessed_items
            .remove(&self.table_name)
            .filter(|rest| !rest.is_empty())
        {
            left = rest.len();
            warn!(
                table = %self.table_name,
                round = self.round,
                unprocessed = left,
                "Batch write left requests unprocessed, retrying"
            );
            self.unprocessed = Some(rest);
        }

        Ok(Some(sent.saturating_sub(left)))
    }

    /// Turn the pager into a pull-based stream of per-round accepted counts.
    pub fn into_stream(self) -> BoxStream<'static, ClientResult<usize>> {
        stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_page().await?.map(|written| (written, pager)))
        })
        .boxed()
    }

    fn input(&self, requests: Vec<WriteRequest>) -> BatchWriteItemInput {
        BatchWriteItemInput {
            request_items: HashMap::from([(self.table_name.clone(), requests)]),
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
        }
    }
}

fn chunk<T>(items: Vec<T>, size: usize) -> VecDeque<Vec<T>> {
    let mut chunks = VecDeque::with_capacity(items.len().div_ceil(size));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        chunks.push_back(items.by_ref().take(size).collect());
    }
    chunks
}

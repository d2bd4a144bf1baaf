use std::future::IntoFuture;
use std::marker::PhantomData;

use futures::FutureExt;
use futures::stream::BoxStream;
use rustack_dynamodb_model::Key;
use rustack_dynamodb_model::input::ScanInput;
use rustack_dynamodb_model::types::Select;

use super::{
    Clause, Deferred, Group, OperationFuture, ScopeOwner, check_deferred, clause::nest, defer,
    project,
};
use crate::client::Client;
use crate::error::{ClientResult, SchemaError};
use crate::expression::{Bucket, Logic, LogicScope};
use crate::model::Model;
use crate::pagination::{CursorPager, Paged, ScanPager};

/// Full scan of a table or index, optionally one segment of a parallel scan.
///
/// The builder only sets `Segment` / `TotalSegments`; running the segments
/// concurrently is up to the caller.
#[derive(Debug)]
pub struct Scan<M> {
    client: Client,
    scope: LogicScope,
    index: Option<String>,
    limit: Option<u32>,
    segment: Option<(u32, u32)>,
    consistent: bool,
    quiet: bool,
    deferred: Option<Deferred>,
    _model: PhantomData<fn() -> M>,
}

impl<M> ScopeOwner for Scan<M> {
    fn scope_mut(&mut self) -> &mut LogicScope {
        &mut self.scope
    }
}

impl<M: Model> Scan<M> {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            scope: LogicScope::new(),
            index: None,
            limit: None,
            segment: None,
            consistent: false,
            quiet: false,
            deferred: None,
            _model: PhantomData,
        }
    }

    /// Add a filter on `path`, combined with `AND`.
    pub fn filter(self, path: impl Into<String>) -> Clause<Self> {
        Clause::new(self, Bucket::Filter, path)
    }

    /// Add a nested `AND` filter group.
    #[must_use]
    pub fn filter_and(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Filter, Logic::And, build);
        self
    }

    /// Add a nested `OR` filter group.
    #[must_use]
    pub fn filter_or(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Filter, Logic::Or, build);
        self
    }

    /// Add a nested `NOT (...)` filter group.
    #[must_use]
    pub fn filter_not(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Filter, Logic::Not, build);
        self
    }

    /// Only return the given attribute paths, separated by whitespace.
    #[must_use]
    pub fn select(mut self, paths: &str) -> Self {
        project(&mut self.scope, paths);
        self
    }

    /// Scan a secondary index.
    #[must_use]
    pub fn index(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if M::schema().index(&name).is_none() {
            defer(
                &mut self.deferred,
                Deferred::Schema(SchemaError::UnknownIndex {
                    table: M::schema().table_name().to_owned(),
                    index: name.clone(),
                }),
            );
        }
        self.index = Some(name);
        self
    }

    /// Evaluate at most `limit` items per page.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        if limit == 0 {
            defer(
                &mut self.deferred,
                Deferred::Invalid("limit must be greater than 0".to_owned()),
            );
        }
        self.limit = Some(limit);
        self
    }

    /// Scan only `segment` of `total` parallel segments.
    #[must_use]
    pub fn segment(mut self, segment: u32, total: u32) -> Self {
        if total == 0 || segment >= total {
            defer(
                &mut self.deferred,
                Deferred::Invalid(format!(
                    "segment {segment} is out of range for {total} total segments"
                )),
            );
        }
        self.segment = Some((segment, total));
        self
    }

    /// Use a strongly consistent read.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.consistent = true;
        self
    }

    /// Do not request consumed capacity.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// The first-page request this builder sends.
    pub fn to_input(&self) -> ClientResult<ScanInput> {
        self.build_input(false)
    }

    /// The first-page request as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_input()?)?)
    }

    fn build_input(&self, count: bool) -> ClientResult<ScanInput> {
        check_deferred(self.deferred.as_ref())?;
        let mut compiled = self.scope.compile()?;
        if count {
            compiled = compiled.drop_bucket(Bucket::Projection);
        }
        let to_i32 = |n: u32| i32::try_from(n).unwrap_or(i32::MAX);
        Ok(ScanInput {
            table_name: self.client.table_name::<M>(),
            index_name: self.index.clone(),
            filter_expression: compiled.expression(Bucket::Filter),
            projection_expression: compiled.expression(Bucket::Projection),
            expression_attribute_names: compiled.names(),
            expression_attribute_values: compiled.values(),
            limit: self.limit.map(to_i32),
            exclusive_start_key: Key::new(),
            segment: self.segment.map(|(segment, _)| to_i32(segment)),
            total_segments: self.segment.map(|(_, total)| to_i32(total)),
            select: count.then_some(Select::Count),
            consistent_read: self.consistent.then_some(true),
            return_consumed_capacity: self.client.consumed_capacity(self.quiet),
        })
    }

    /// A pager over the raw result pages.
    pub fn pager(&self) -> ClientResult<ScanPager> {
        Ok(CursorPager::new(
            self.client.transport().clone(),
            self.to_input()?,
        ))
    }

    fn paged(&self, count: bool) -> Paged<ScanInput, M> {
        Paged::new(self.client.transport().clone(), self.build_input(count))
    }

    /// Lazily yield one `Vec` of records per page.
    pub fn pages(self) -> BoxStream<'static, ClientResult<Vec<M>>> {
        self.paged(false).pages()
    }

    /// Lazily yield records one at a time.
    pub fn stream(self) -> BoxStream<'static, ClientResult<M>> {
        self.paged(false).stream()
    }

    /// Collect every matching record.
    pub async fn all(self) -> ClientResult<Vec<M>> {
        self.paged(false).all().await
    }

    /// The first matching record, or `None`.
    pub async fn one(self) -> ClientResult<Option<M>> {
        self.paged(false).one().await
    }

    /// Count matching records across every page without reading items.
    pub async fn count(self) -> ClientResult<u64> {
        self.paged(true).count().await
    }
}

impl<M: Model> IntoFuture for Scan<M> {
    type Output = ClientResult<Vec<M>>;
    type IntoFuture = OperationFuture<Vec<M>>;

    fn into_future(self) -> Self::IntoFuture {
        self.all().boxed()
    }
}

use std::future::IntoFuture;
use std::marker::PhantomData;

use futures::FutureExt;
use futures::stream::BoxStream;
use rustack_dynamodb_model::input::QueryInput;
use rustack_dynamodb_model::types::Select;
use rustack_dynamodb_model::{AttributeValue, Key};

use super::{
    Clause, Deferred, Group, KeyClause, OperationFuture, ScopeOwner, SortOrder, check_deferred,
    clause::nest, defer, project,
};
use crate::client::Client;
use crate::error::{ClientError, ClientResult, SchemaError};
use crate::expression::{Bucket, CompareOp, Logic, LogicScope, Operand, Operator};
use crate::model::Model;
use crate::pagination::{CursorPager, Paged, QueryPager};

/// Range query over one partition of a table or index.
///
/// Awaiting the builder collects every matching record. Use
/// [`pages`](Self::pages) or [`stream`](Self::stream) to consume lazily,
/// [`one`](Self::one) to stop at the first match and [`count`](Self::count)
/// to tally without reading items.
#[derive(Debug)]
pub struct Query<M> {
    client: Client,
    scope: LogicScope,
    index: Option<String>,
    limit: Option<u32>,
    order: SortOrder,
    consistent: bool,
    quiet: bool,
    deferred: Option<Deferred>,
    _model: PhantomData<fn() -> M>,
}

impl<M> ScopeOwner for Query<M> {
    fn scope_mut(&mut self) -> &mut LogicScope {
        &mut self.scope
    }
}

impl<M: Model> Query<M> {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            scope: LogicScope::new(),
            index: None,
            limit: None,
            order: SortOrder::Ascending,
            consistent: false,
            quiet: false,
            deferred: None,
            _model: PhantomData,
        }
    }

    /// Add a key condition on `path`.
    pub fn key(self, path: impl Into<String>) -> KeyClause<Self> {
        KeyClause::new(self, path)
    }

    /// Match the hash key of the selected index, or of the table when no
    /// index is selected. Call [`index`](Self::index) first.
    #[must_use]
    pub fn hash_eq(mut self, value: impl Into<AttributeValue>) -> Self {
        match M::schema().index_keys(self.index.as_deref()) {
            Ok((hash, _)) => {
                let operator = Operator::Compare {
                    op: CompareOp::Eq,
                    operand: Operand::Value(value.into()),
                    size: false,
                };
                self.scope.push(Bucket::KeyCondition, hash, &operator);
            }
            Err(e) => defer(&mut self.deferred, Deferred::Schema(e)),
        }
        self
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

    /// Query a secondary index.
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

    /// Set the range key order.
    #[must_use]
    pub fn sort(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Shorthand for `sort(SortOrder::Descending)`.
    #[must_use]
    pub fn desc(self) -> Self {
        self.sort(SortOrder::Descending)
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
    pub fn to_input(&self) -> ClientResult<QueryInput> {
        self.build_input(false)
    }

    /// The first-page request as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_input()?)?)
    }

    fn build_input(&self, count: bool) -> ClientResult<QueryInput> {
        check_deferred(self.deferred.as_ref())?;
        let mut compiled = self.scope.compile()?;
        if compiled.expression(Bucket::KeyCondition).is_none() {
            return Err(ClientError::invalid_parameter(
                "query requires a key condition",
            ));
        }
        if count {
            compiled = compiled.drop_bucket(Bucket::Projection);
        }
        Ok(QueryInput {
            table_name: self.client.table_name::<M>(),
            index_name: self.index.clone(),
            key_condition_expression: compiled.expression(Bucket::KeyCondition),
            filter_expression: compiled.expression(Bucket::Filter),
            projection_expression: compiled.expression(Bucket::Projection),
            expression_attribute_names: compiled.names(),
            expression_attribute_values: compiled.values(),
            scan_index_forward: (self.order == SortOrder::Descending).then_some(false),
            limit: self.limit.map(|n| i32::try_from(n).unwrap_or(i32::MAX)),
            exclusive_start_key: Key::new(),
            select: count.then_some(Select::Count),
            consistent_read: self.consistent.then_some(true),
            return_consumed_capacity: self.client.consumed_capacity(self.quiet),
        })
    }

    /// A pager over the raw result pages.
    pub fn pager(&self) -> ClientResult<QueryPager> {
        Ok(CursorPager::new(
            self.client.transport().clone(),
            self.to_input()?,
        ))
    }

    fn paged(&self, count: bool) -> Paged<QueryInput, M> {
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

    /// The first matching record, or `None`. No page is requested after the
    /// one holding the first match.
    pub async fn one(self) -> ClientResult<Option<M>> {
        self.paged(false).one().await
    }

    /// Count matching records across every page without reading items.
    pub async fn count(self) -> ClientResult<u64> {
        self.paged(true).count().await
    }
}

impl<M: Model> IntoFuture for Query<M> {
    type Output = ClientResult<Vec<M>>;
    type IntoFuture = OperationFuture<Vec<M>>;

    fn into_future(self) -> Self::IntoFuture {
        self.all().boxed()
    }
}

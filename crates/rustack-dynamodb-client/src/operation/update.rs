use std::future::IntoFuture;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use rustack_dynamodb_model::input::UpdateItemInput;
use rustack_dynamodb_model::types::ReturnValue;
use rustack_dynamodb_model::{DynamoDBOperation, Item, Key};

use super::{
    Clause, Group, OperationFuture, ScopeOwner, check_whole_item, clause::nest, non_empty,
};
use crate::client::{Client, log_collection_metrics, log_consumed_capacity};
use crate::error::{ClientError, ClientResult};
use crate::expression::{Bucket, CompareOp, Logic, LogicScope, Operand, Operator, resolve};
use crate::model::Model;
use crate::schema::{TimestampKind, timestamp_value};

/// Conditional in-place modification of one item.
///
/// At least one `SET` / `REMOVE` / `ADD` / `DELETE` action is required; an
/// update without one fails with [`ClientError::EmptyMutation`] before
/// anything is sent. Resolves to the item's new version
/// (`ReturnValues=ALL_NEW`) unless another policy is set.
#[derive(Debug)]
pub struct Update<M> {
    client: Client,
    key: Key,
    scope: LogicScope,
    /// Paths targeted by `SET` and `REMOVE` actions.
    written: Vec<String>,
    return_values: ReturnValue,
    quiet: bool,
    now: DateTime<Utc>,
    _model: PhantomData<fn() -> M>,
}

impl<M> ScopeOwner for Update<M> {
    fn scope_mut(&mut self) -> &mut LogicScope {
        &mut self.scope
    }
}

/// A `SET` action on one path, waiting for its value.
#[derive(Debug)]
#[must_use = "a set clause does nothing until a value is applied"]
pub struct SetClause<M> {
    update: Update<M>,
    path: String,
}

impl<M: Model> SetClause<M> {
    fn apply(mut self, operator: &Operator) -> Update<M> {
        self.update.scope.push(Bucket::Set, &self.path, operator);
        self.update.written.push(self.path);
        self.update
    }

    /// `#p = :p`
    pub fn to(self, value: impl Into<Operand>) -> Update<M> {
        self.apply(&Operator::Compare {
            op: CompareOp::Eq,
            operand: value.into(),
            size: false,
        })
    }

    /// `#p = #p + :p_increase`
    pub fn plus(self, value: impl Into<Operand>) -> Update<M> {
        self.apply(&Operator::Increment(value.into()))
    }

    /// `#p = #p - :p_decrease`
    pub fn minus(self, value: impl Into<Operand>) -> Update<M> {
        self.apply(&Operator::Decrement(value.into()))
    }

    /// `#p = list_append(#p, :p_list_append)`
    pub fn append(self, values: impl Into<Operand>) -> Update<M> {
        self.apply(&Operator::ListAppend {
            operand: values.into(),
            prepend: false,
        })
    }

    /// `#p = list_append(:p_list_append_prepend, #p)`
    pub fn prepend(self, values: impl Into<Operand>) -> Update<M> {
        self.apply(&Operator::ListAppend {
            operand: values.into(),
            prepend: true,
        })
    }

    /// `#p = if_not_exists(#p, :p_if_not_exists)`
    pub fn if_not_exists(self, value: impl Into<Operand>) -> Update<M> {
        self.apply(&Operator::IfNotExists(value.into()))
    }
}

impl<M: Model> Update<M> {
    pub(crate) fn new(client: Client, key: Key) -> Self {
        Self {
            client,
            key,
            scope: LogicScope::new(),
            written: Vec::new(),
            return_values: ReturnValue::AllNew,
            quiet: false,
            now: Utc::now(),
            _model: PhantomData,
        }
    }

    /// Start a `SET` action on `path`.
    pub fn set(self, path: impl Into<String>) -> SetClause<M> {
        SetClause {
            update: self,
            path: path.into(),
        }
    }

    /// `REMOVE #p`: drop the attribute, or the list element when `path` ends
    /// in an index.
    #[must_use]
    pub fn remove(mut self, path: &str) -> Self {
        self.scope
            .push(Bucket::Remove, path, &Operator::Remove(Vec::new()));
        self.written.push(path.to_owned());
        self
    }

    /// `REMOVE #p[i], #p[j]`: drop the given positions of a list.
    #[must_use]
    pub fn remove_indexes(mut self, path: &str, indexes: impl IntoIterator<Item = usize>) -> Self {
        let indexes: Vec<usize> = indexes.into_iter().collect();
        self.scope.push(Bucket::Remove, path, &Operator::Remove(indexes));
        self.written.push(path.to_owned());
        self
    }

    /// `ADD #p :p_add`: add to a number or insert into a set.
    #[must_use]
    pub fn add(mut self, path: &str, value: impl Into<Operand>) -> Self {
        self.scope
            .push(Bucket::Add, path, &Operator::Add(value.into()));
        self
    }

    /// `DELETE #p :p_delete`: remove elements from a set.
    #[must_use]
    pub fn delete(mut self, path: &str, values: impl Into<Operand>) -> Self {
        self.scope
            .push(Bucket::Delete, path, &Operator::Delete(values.into()));
        self
    }

    /// Add a write condition on `path`, combined with `AND`.
    pub fn condition(self, path: impl Into<String>) -> Clause<Self> {
        Clause::new(self, Bucket::Condition, path)
    }

    /// Add a nested `AND` condition group.
    #[must_use]
    pub fn condition_and(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Condition, Logic::And, build);
        self
    }

    /// Add a nested `OR` condition group.
    #[must_use]
    pub fn condition_or(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Condition, Logic::Or, build);
        self
    }

    /// Add a nested `NOT (...)` condition group.
    #[must_use]
    pub fn condition_not(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, Bucket::Condition, Logic::Not, build);
        self
    }

    /// Choose what the store returns.
    #[must_use]
    pub fn return_values(mut self, return_values: ReturnValue) -> Self {
        self.return_values = return_values;
        self
    }

    /// Return nothing and request no capacity or metrics.
    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self.return_values = ReturnValue::None;
        self
    }

    /// Whether a `SET` or `REMOVE` action targets the top-level attribute
    /// `name` or one of its elements. Nested attributes of the same name and
    /// condition references do not count.
    fn writes_attribute(&self, name: &str) -> bool {
        self.written
            .iter()
            .any(|path| resolve(path).is_ok_and(|path| path.root() == name))
    }

    /// The request this builder sends.
    pub fn to_input(&self) -> ClientResult<UpdateItemInput> {
        self.scope.check()?;
        if !self.scope.has_mutations() {
            return Err(ClientError::EmptyMutation);
        }

        let mut scope = self.scope.clone();
        if self.client.config().auto_timestamps {
            if let Some(field) = M::schema().timestamp_field(TimestampKind::Updated) {
                if !self.writes_attribute(field) {
                    let operator = Operator::Compare {
                        op: CompareOp::Eq,
                        operand: Operand::Value(timestamp_value(TimestampKind::Updated, self.now)),
                        size: false,
                    };
                    scope.push(Bucket::Set, field, &operator);
                }
            }
        }

        let compiled = scope.compile()?;
        Ok(UpdateItemInput {
            table_name: self.client.table_name::<M>(),
            key: self.key.clone(),
            update_expression: compiled.update_expression(),
            condition_expression: compiled.expression(Bucket::Condition),
            expression_attribute_names: compiled.names(),
            expression_attribute_values: compiled.values(),
            return_values: (self.return_values != ReturnValue::None).then_some(self.return_values),
            return_consumed_capacity: self.client.consumed_capacity(self.quiet),
            return_item_collection_metrics: self.client.collection_metrics(self.quiet),
        })
    }

    /// The request as DynamoDB JSON.
    pub fn to_json(&self) -> ClientResult<serde_json::Value> {
        Ok(serde_json::to_value(self.to_input()?)?)
    }

    /// Send the request and hydrate the returned item.
    ///
    /// Fails with [`ClientError::InvalidParameter`] before sending when the
    /// return policy yields a partial item; use [`Self::send_item`] for those.
    pub async fn send(self) -> ClientResult<Option<M>> {
        check_whole_item(self.return_values)?;
        self.send_item().await?.map(M::from_item).transpose()
    }

    /// Send the request and return the raw attributes, whatever the return
    /// policy.
    pub async fn send_item(self) -> ClientResult<Option<Item>> {
        let input = self.to_input()?;
        let output = self.client.transport().update_item(input).await?;
        log_consumed_capacity(
            DynamoDBOperation::UpdateItem,
            output.consumed_capacity.as_ref(),
        );
        log_collection_metrics(
            DynamoDBOperation::UpdateItem,
            output.item_collection_metrics.as_ref(),
        );
        Ok(non_empty(Some(output.attributes)))
    }
}

impl<M: Model> IntoFuture for Update<M> {
    type Output = ClientResult<Option<M>>;
    type IntoFuture = OperationFuture<Option<M>>;

    fn into_future(self) -> Self::IntoFuture {
        self.send().boxed()
    }
}

//! Logic scopes: per-bucket fragment collection and nesting.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rustack_dynamodb_model::AttributeValue;

use super::compiler::{Bindings, ExpressionError, ExpressionFragment, Operator, compile};

/// How the fragments of one predicate bucket are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    /// `A AND B`
    #[default]
    And,
    /// `A OR B`
    Or,
    /// `NOT (A AND B)`
    Not,
}

impl Logic {
    fn joiner(self) -> &'static str {
        match self {
            Self::And | Self::Not => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// The expression category a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bucket {
    /// `KeyConditionExpression`
    KeyCondition,
    /// `FilterExpression`
    Filter,
    /// `ConditionExpression`
    Condition,
    /// `SET` actions of the update expression.
    Set,
    /// `REMOVE` actions of the update expression.
    Remove,
    /// `ADD` actions of the update expression.
    Add,
    /// `DELETE` actions of the update expression.
    Delete,
    /// `ProjectionExpression`
    Projection,
}

impl Bucket {
    /// The mutation buckets in the order they are joined into an update
    /// expression.
    pub const MUTATIONS: [Bucket; 4] = [Bucket::Set, Bucket::Remove, Bucket::Add, Bucket::Delete];

    /// Returns `true` for buckets holding boolean predicates.
    #[must_use]
    pub fn is_predicate(self) -> bool {
        matches!(self, Self::KeyCondition | Self::Filter | Self::Condition)
    }

    /// The update-expression keyword, for mutation buckets.
    #[must_use]
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Self::Set => Some("SET"),
            Self::Remove => Some("REMOVE"),
            Self::Add => Some("ADD"),
            Self::Delete => Some("DELETE"),
            _ => None,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KeyCondition => "key condition",
            Self::Filter => "filter",
            Self::Condition => "condition",
            Self::Set => "set",
            Self::Remove => "remove",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Projection => "projection",
        })
    }
}

/// A set of fragment buckets combined with one [`Logic`].
///
/// Builders own a root scope. Nested groups [`fork`](Self::fork) a child,
/// fill it, and [`fold`](Self::fold) it back as a single parenthesized
/// fragment. The first compile error is kept and reported by
/// [`check`](Self::check) so that fluent chains do not need to return
/// `Result` at every step.
#[derive(Debug, Clone, Default)]
pub struct LogicScope {
    logic: Logic,
    nested: bool,
    fragments: BTreeMap<Bucket, Vec<String>>,
    bindings: Bindings,
    error: Option<ExpressionError>,
}

impl LogicScope {
    /// A root scope combining predicates with `AND`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope's logic operator.
    #[must_use]
    pub fn logic(&self) -> Logic {
        self.logic
    }

    /// Bindings accumulated so far.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Compile `operator` on `path` and add the result to `bucket`.
    ///
    /// A compile error is recorded and every later push is ignored.
    pub fn push(&mut self, bucket: Bucket, path: &str, operator: &Operator) {
        if self.error.is_some() {
            return;
        }
        match compile(path, operator, &self.bindings) {
            Ok(fragment) => self.add_fragment(bucket, fragment),
            Err(e) => self.error = Some(e),
        }
    }

    /// Add an already compiled fragment. Identical text is kept once.
    pub fn add_fragment(&mut self, bucket: Bucket, fragment: ExpressionFragment) {
        self.insert_text(bucket, fragment.expression);
        self.bindings.merge(fragment.bindings);
    }

    /// Start a nested scope that sees this scope's bindings.
    #[must_use]
    pub fn fork(&self, logic: Logic) -> Self {
        Self {
            logic,
            nested: true,
            fragments: BTreeMap::new(),
            bindings: self.bindings.clone(),
            error: self.error.clone(),
        }
    }

    /// Fold a nested scope back in: each of its non-empty buckets becomes one
    /// fragment of the matching bucket here.
    pub fn fold(&mut self, child: LogicScope) {
        if self.error.is_none() {
            self.error = child.error.clone();
        }
        for bucket in child.fragments.keys() {
            if let Some(joined) = child.join(*bucket) {
                self.insert_text(*bucket, joined);
            }
        }
        self.bindings.merge(child.bindings);
    }

    /// Returns `true` when `bucket` holds no fragment.
    #[must_use]
    pub fn is_empty(&self, bucket: Bucket) -> bool {
        self.fragments.get(&bucket).is_none_or(Vec::is_empty)
    }

    /// Returns `true` when any of the mutation buckets holds a fragment.
    #[must_use]
    pub fn has_mutations(&self) -> bool {
        Bucket::MUTATIONS.iter().any(|b| !self.is_empty(*b))
    }

    /// Fail with the first error recorded by [`push`](Self::push).
    pub fn check(&self) -> Result<(), ExpressionError> {
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Join every non-empty bucket. Does not modify the scope.
    pub fn compile(&self) -> Result<CompiledScope, ExpressionError> {
        self.check()?;
        let expressions = self
            .fragments
            .keys()
            .filter_map(|bucket| self.join(*bucket).map(|joined| (*bucket, joined)))
            .collect();
        Ok(CompiledScope {
            expressions,
            bindings: self.bindings.clone(),
        })
    }

    fn insert_text(&mut self, bucket: Bucket, text: String) {
        let texts = self.fragments.entry(bucket).or_default();
        if !texts.contains(&text) {
            texts.push(text);
        }
    }

    fn join(&self, bucket: Bucket) -> Option<String> {
        let texts = self.fragments.get(&bucket).filter(|t| !t.is_empty())?;
        if !bucket.is_predicate() {
            return Some(texts.join(", "));
        }
        let joined = texts.join(self.logic.joiner());
        Some(match self.logic {
            Logic::Not => format!("NOT ({joined})"),
            _ if self.nested => format!("({joined})"),
            _ => joined,
        })
    }
}

/// The read-only result of compiling a [`LogicScope`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledScope {
    expressions: BTreeMap<Bucket, String>,
    bindings: Bindings,
}

impl CompiledScope {
    /// The joined expression of `bucket`, if it is non-empty.
    #[must_use]
    pub fn expression(&self, bucket: Bucket) -> Option<String> {
        self.expressions.get(&bucket).cloned()
    }

    /// `SET ... REMOVE ... ADD ... DELETE ...`, omitting empty buckets.
    #[must_use]
    pub fn update_expression(&self) -> Option<String> {
        let clauses: Vec<String> = Bucket::MUTATIONS
            .iter()
            .filter_map(|bucket| {
                let keyword = bucket.keyword()?;
                self.expressions
                    .get(bucket)
                    .map(|joined| format!("{keyword} {joined}"))
            })
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" "))
        }
    }

    /// `ExpressionAttributeNames` for the request.
    #[must_use]
    pub fn names(&self) -> HashMap<String, String> {
        self.bindings
            .names
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// `ExpressionAttributeValues` for the request.
    #[must_use]
    pub fn values(&self) -> HashMap<String, AttributeValue> {
        self.bindings
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Remove `bucket` and every binding no remaining expression refers to.
    #[must_use]
    pub fn drop_bucket(mut self, bucket: Bucket) -> Self {
        if self.expressions.remove(&bucket).is_none() {
            return self;
        }
        let expressions: Vec<&String> = self.expressions.values().collect();
        let referenced = |token: &str| expressions.iter().any(|e| contains_token(e, token));
        let names = self
            .bindings
            .names
            .iter()
            .filter(|(token, _)| referenced(token))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let values = self
            .bindings
            .values
            .iter()
            .filter(|(token, _)| referenced(token))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.bindings = Bindings { names, values };
        self
    }
}

/// Whether `token` occurs in `expression` as a whole placeholder, so that
/// `#name` does not match inside `#name_2`.
fn contains_token(expression: &str, token: &str) -> bool {
    expression.match_indices(token).any(|(at, _)| {
        expression[at + token.len()..]
            .chars()
            .next()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::compiler::{CompareOp, Operand};

    fn eq(operand: impl Into<Operand>) -> Operator {
        Operator::Compare {
            op: CompareOp::Eq,
            operand: operand.into(),
            size: false,
        }
    }

    #[test]
    fn test_should_join_key_condition_with_and() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::KeyCondition, "uid", &eq("1"));
        scope.push(
            Bucket::KeyCondition,
            "name",
            &Operator::Between {
                lower: "a".into(),
                upper: "c".into(),
            },
        );
        let compiled = scope.compile().unwrap();
        assert_eq!(
            compiled.expression(Bucket::KeyCondition).as_deref(),
            Some("#uid = :uid AND #name BETWEEN :name_lower AND :name_upper")
        );
        let names = compiled.names();
        assert_eq!(names.len(), 2);
        assert_eq!(names["#uid"], "uid");
        assert_eq!(names["#name"], "name");
        let values = compiled.values();
        assert_eq!(values[":uid"], AttributeValue::from("1"));
        assert_eq!(values[":name_lower"], AttributeValue::from("a"));
        assert_eq!(values[":name_upper"], AttributeValue::from("c"));
    }

    #[test]
    fn test_should_fold_not_scope_as_single_fragment() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::Filter, "status", &eq("active"));
        let mut child = scope.fork(Logic::Not);
        child.push(Bucket::Filter, "a", &eq(1_i64));
        child.push(Bucket::Filter, "b", &eq(2_i64));
        scope.fold(child);

        let compiled = scope.compile().unwrap();
        assert_eq!(
            compiled.expression(Bucket::Filter).as_deref(),
            Some("#status = :status AND NOT (#a = :a AND #b = :b)")
        );
        assert_eq!(compiled.values().len(), 3);
    }

    #[test]
    fn test_should_fold_or_scope_in_parentheses() {
        let mut scope = LogicScope::new();
        let mut child = scope.fork(Logic::Or);
        child.push(Bucket::Condition, "a", &Operator::AttributeNotExists);
        child.push(Bucket::Condition, "b", &eq(2_i64));
        scope.fold(child);
        assert_eq!(
            scope.compile().unwrap().expression(Bucket::Condition).as_deref(),
            Some("(attribute_not_exists(#a) OR #b = :b)")
        );
    }

    #[test]
    fn test_should_use_or_at_top_level_without_parentheses() {
        let mut scope = LogicScope {
            logic: Logic::Or,
            ..LogicScope::default()
        };
        scope.push(Bucket::Filter, "a", &eq(1_i64));
        scope.push(Bucket::Filter, "b", &eq(2_i64));
        assert_eq!(
            scope.compile().unwrap().expression(Bucket::Filter).as_deref(),
            Some("#a = :a OR #b = :b")
        );
    }

    #[test]
    fn test_should_keep_sibling_value_tokens_distinct() {
        let mut scope = LogicScope::new();
        for value in ["x", "y"] {
            let mut child = scope.fork(Logic::Or);
            child.push(Bucket::Filter, "kind", &eq(value));
            scope.fold(child);
        }
        let compiled = scope.compile().unwrap();
        assert_eq!(
            compiled.expression(Bucket::Filter).as_deref(),
            Some("(#kind = :kind) AND (#kind = :kind_2)")
        );
        assert_eq!(compiled.values()[":kind_2"], AttributeValue::from("y"));
        assert_eq!(compiled.names().len(), 1);
    }

    #[test]
    fn test_should_order_mutations_and_omit_empty_buckets() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::Delete, "tags", &Operator::Delete(Operand::string_set(["old"])));
        scope.push(Bucket::Remove, "roles[1]", &Operator::Remove(Vec::new()));
        scope.push(Bucket::Set, "name", &eq("n"));
        scope.push(Bucket::Set, "age", &Operator::Increment(1_i64.into()));
        let compiled = scope.compile().unwrap();
        assert_eq!(
            compiled.update_expression().as_deref(),
            Some("SET #name = :name, #age = #age + :age_increase REMOVE #roles[1] DELETE #tags :tags_delete")
        );
    }

    #[test]
    fn test_should_not_emit_empty_buckets() {
        let scope = LogicScope::new();
        let compiled = scope.compile().unwrap();
        assert!(compiled.expression(Bucket::Filter).is_none());
        assert!(compiled.update_expression().is_none());
        assert!(!scope.has_mutations());
    }

    #[test]
    fn test_should_dedupe_identical_fragments() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::Projection, "id", &Operator::Name);
        scope.push(Bucket::Projection, "id", &Operator::Name);
        scope.push(Bucket::Projection, "name", &Operator::Name);
        assert_eq!(
            scope.compile().unwrap().expression(Bucket::Projection).as_deref(),
            Some("#id, #name")
        );
    }

    #[test]
    fn test_should_record_first_error_and_ignore_later_pushes() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::Filter, "a..b", &eq(1_i64));
        scope.push(Bucket::Filter, "c", &eq(1_i64));
        assert!(scope.is_empty(Bucket::Filter));
        match scope.compile() {
            Err(ExpressionError::MalformedPath { path, .. }) => assert_eq!(path, "a..b"),
            other => panic!("expected MalformedPath, got {other:?}"),
        }
    }

    #[test]
    fn test_should_propagate_child_error_on_fold() {
        let mut scope = LogicScope::new();
        let mut child = scope.fork(Logic::And);
        child.push(Bucket::Filter, "a[x]", &eq(1_i64));
        scope.fold(child);
        assert!(scope.check().is_err());
    }

    #[test]
    fn test_should_prune_bindings_when_dropping_bucket() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::KeyCondition, "id", &eq("1"));
        scope.push(Bucket::Projection, "id", &Operator::Name);
        scope.push(Bucket::Projection, "id_2", &Operator::Name);
        let compiled = scope.compile().unwrap().drop_bucket(Bucket::Projection);
        assert!(compiled.expression(Bucket::Projection).is_none());
        let names = compiled.names();
        assert_eq!(names.len(), 1);
        assert_eq!(names["#id"], "id");
        assert_eq!(compiled.values().len(), 1);
    }

    #[test]
    fn test_should_compile_idempotently() {
        let mut scope = LogicScope::new();
        scope.push(Bucket::Filter, "a", &eq(1_i64));
        assert_eq!(scope.compile().unwrap(), scope.compile().unwrap());
    }

    #[test]
    fn test_should_match_whole_tokens_only() {
        assert!(contains_token("#a = :a", "#a"));
        assert!(!contains_token("#a_2 = :a_2", "#a"));
        assert!(contains_token("(#a)", "#a"));
    }
}

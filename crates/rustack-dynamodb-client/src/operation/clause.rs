//! Predicate clauses shared by the builders.
//!
//! `builder.filter("age").gte(18)` returns the builder: the [`Clause`] borrows
//! nothing, it carries the builder by value until the operator is chosen.

use crate::expression::{
    AttributeType, Bucket, CompareOp, Logic, LogicScope, Operand, Operator,
};

/// A value owning the [`LogicScope`] that clauses write into.
pub trait ScopeOwner: Sized {
    /// The scope fragments are pushed to.
    fn scope_mut(&mut self) -> &mut LogicScope;
}

/// A predicate on one attribute path, waiting for its operator.
#[derive(Debug)]
#[must_use = "a clause does nothing until an operator is applied"]
pub struct Clause<B> {
    owner: B,
    bucket: Bucket,
    path: String,
}

impl<B: ScopeOwner> Clause<B> {
    pub(crate) fn new(owner: B, bucket: Bucket, path: impl Into<String>) -> Self {
        Self {
            owner,
            bucket,
            path: path.into(),
        }
    }

    fn apply(mut self, operator: &Operator) -> B {
        self.owner.scope_mut().push(self.bucket, &self.path, operator);
        self.owner
    }

    fn compare(self, op: CompareOp, value: impl Into<Operand>) -> B {
        self.apply(&Operator::Compare {
            op,
            operand: value.into(),
            size: false,
        })
    }

    /// `#p = :p`
    pub fn eq(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Eq, value)
    }

    /// `#p <> :p`
    pub fn ne(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Ne, value)
    }

    /// `#p < :p`
    pub fn lt(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Lt, value)
    }

    /// `#p <= :p`
    pub fn lte(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Le, value)
    }

    /// `#p > :p`
    pub fn gt(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Gt, value)
    }

    /// `#p >= :p`
    pub fn gte(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Ge, value)
    }

    /// `#p BETWEEN :p_lower AND :p_upper`
    pub fn between(self, lower: impl Into<Operand>, upper: impl Into<Operand>) -> B {
        self.apply(&Operator::Between {
            lower: lower.into(),
            upper: upper.into(),
        })
    }

    /// `#p IN (...)`
    pub fn is_in<I, V>(self, values: I) -> B
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.apply(&Operator::In(values.into_iter().map(Into::into).collect()))
    }

    /// `attribute_exists(#p)`
    pub fn exists(self) -> B {
        self.apply(&Operator::AttributeExists)
    }

    /// `attribute_not_exists(#p)`
    pub fn not_exists(self) -> B {
        self.apply(&Operator::AttributeNotExists)
    }

    /// `attribute_type(#p, :p_attribute_type)`
    pub fn attribute_type(self, kind: AttributeType) -> B {
        self.apply(&Operator::AttributeType(kind))
    }

    /// `begins_with(#p, :p_begins_with)`
    pub fn begins_with(self, prefix: impl Into<Operand>) -> B {
        self.apply(&Operator::BeginsWith(prefix.into()))
    }

    /// `contains(#p, :p_contains)`
    pub fn contains(self, value: impl Into<Operand>) -> B {
        self.apply(&Operator::Contains(value.into()))
    }

    /// Compare `size(#p)` instead of the value.
    pub fn size(self) -> SizeClause<B> {
        SizeClause(self)
    }
}

/// A comparison on `size(#p)`.
#[derive(Debug)]
#[must_use = "a clause does nothing until an operator is applied"]
pub struct SizeClause<B>(Clause<B>);

impl<B: ScopeOwner> SizeClause<B> {
    fn compare(self, op: CompareOp, value: impl Into<Operand>) -> B {
        self.0.apply(&Operator::Compare {
            op,
            operand: value.into(),
            size: true,
        })
    }

    /// `size(#p) = :p_size`
    pub fn eq(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Eq, value)
    }

    /// `size(#p) <> :p_size`
    pub fn ne(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Ne, value)
    }

    /// `size(#p) < :p_size`
    pub fn lt(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Lt, value)
    }

    /// `size(#p) <= :p_size`
    pub fn lte(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Le, value)
    }

    /// `size(#p) > :p_size`
    pub fn gt(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Gt, value)
    }

    /// `size(#p) >= :p_size`
    pub fn gte(self, value: impl Into<Operand>) -> B {
        self.compare(CompareOp::Ge, value)
    }
}

/// A key condition. Only the operators the store accepts on keys.
#[derive(Debug)]
#[must_use = "a clause does nothing until an operator is applied"]
pub struct KeyClause<B>(Clause<B>);

impl<B: ScopeOwner> KeyClause<B> {
    pub(crate) fn new(owner: B, path: impl Into<String>) -> Self {
        Self(Clause::new(owner, Bucket::KeyCondition, path))
    }

    /// `#p = :p`
    pub fn eq(self, value: impl Into<Operand>) -> B {
        self.0.eq(value)
    }

    /// `#p < :p`
    pub fn lt(self, value: impl Into<Operand>) -> B {
        self.0.lt(value)
    }

    /// `#p <= :p`
    pub fn lte(self, value: impl Into<Operand>) -> B {
        self.0.lte(value)
    }

    /// `#p > :p`
    pub fn gt(self, value: impl Into<Operand>) -> B {
        self.0.gt(value)
    }

    /// `#p >= :p`
    pub fn gte(self, value: impl Into<Operand>) -> B {
        self.0.gte(value)
    }

    /// `#p BETWEEN :p_lower AND :p_upper`
    pub fn between(self, lower: impl Into<Operand>, upper: impl Into<Operand>) -> B {
        self.0.between(lower, upper)
    }

    /// `begins_with(#p, :p_begins_with)`
    pub fn begins_with(self, prefix: impl Into<Operand>) -> B {
        self.0.begins_with(prefix)
    }
}

/// A nested predicate group, folded back into its parent as one
/// parenthesized fragment.
///
/// ```
/// # use rustack_dynamodb_client::operation::Group;
/// fn adults_or_admins(g: Group) -> Group {
///     g.or(|g| g.attr("age").gte(18_i64).attr("role").eq("admin"))
/// }
/// ```
#[derive(Debug)]
pub struct Group {
    scope: LogicScope,
    bucket: Bucket,
}

impl ScopeOwner for Group {
    fn scope_mut(&mut self) -> &mut LogicScope {
        &mut self.scope
    }
}

impl Group {
    /// Start a predicate on `path` inside this group.
    pub fn attr(self, path: impl Into<String>) -> Clause<Self> {
        let bucket = self.bucket;
        Clause::new(self, bucket, path)
    }

    /// Add a nested `AND` group.
    #[must_use]
    pub fn and(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, self.bucket, Logic::And, build);
        self
    }

    /// Add a nested `OR` group.
    #[must_use]
    pub fn or(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, self.bucket, Logic::Or, build);
        self
    }

    /// Add a nested `NOT (...)` group.
    #[must_use]
    pub fn not(mut self, build: impl FnOnce(Group) -> Group) -> Self {
        nest(&mut self.scope, self.bucket, Logic::Not, build);
        self
    }
}

/// Fork `scope`, let `build` fill the child, and fold it back.
pub(crate) fn nest(
    scope: &mut LogicScope,
    bucket: Bucket,
    logic: Logic,
    build: impl FnOnce(Group) -> Group,
) {
    let child = Group {
        scope: scope.fork(logic),
        bucket,
    };
    scope.fold(build(child).scope);
}

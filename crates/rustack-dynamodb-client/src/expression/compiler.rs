//! Expression compiler: one path plus one operator in, one fragment out.
//!
//! [`compile`] never mutates its inputs. It reads the bindings a scope has
//! already accumulated so that a literal attribute name keeps its placeholder
//! and a value token is never bound to two different values, and returns only
//! the bindings the new fragment adds.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::{self, Write};
use std::hash::BuildHasher;

use bytes::Bytes;
use rustack_dynamodb_model::AttributeValue;

use super::path::{AttributePath, resolve, sanitize};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors detected while compiling an expression. Never sent over the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// The attribute path could not be parsed.
    #[error("Malformed attribute path `{path}`: {reason}")]
    MalformedPath {
        /// The path as supplied by the caller.
        path: String,
        /// What is wrong with it.
        reason: String,
    },
    /// An `IN` operator was given no candidates.
    #[error("IN on `{path}` requires at least one operand")]
    EmptyInList {
        /// The attribute path.
        path: String,
    },
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`).
    Eq,
    /// Not equal (`<>`).
    Ne,
    /// Less than (`<`).
    Lt,
    /// Less than or equal (`<=`).
    Le,
    /// Greater than (`>`).
    Gt,
    /// Greater than or equal (`>=`).
    Ge,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        })
    }
}

/// The type names accepted by `attribute_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// `S`
    String,
    /// `N`
    Number,
    /// `B`
    Binary,
    /// `SS`
    StringSet,
    /// `NS`
    NumberSet,
    /// `BS`
    BinarySet,
    /// `BOOL`
    Boolean,
    /// `NULL`
    Null,
    /// `L`
    List,
    /// `M`
    Map,
}

impl AttributeType {
    /// The type descriptor the store expects.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
            Self::StringSet => "SS",
            Self::NumberSet => "NS",
            Self::BinarySet => "BS",
            Self::Boolean => "BOOL",
            Self::Null => "NULL",
            Self::List => "L",
            Self::Map => "M",
        }
    }
}

/// An operator applied to an attribute path, with its operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// `#p OP :p`, or `size(#p) OP :p_size` when `size` is set.
    Compare {
        /// The comparison.
        op: CompareOp,
        /// Right-hand side.
        operand: Operand,
        /// Compare the size of the attribute instead of its value.
        size: bool,
    },
    /// `#p BETWEEN :p_lower AND :p_upper`
    Between {
        /// Inclusive lower bound.
        lower: Operand,
        /// Inclusive upper bound.
        upper: Operand,
    },
    /// `#p IN (:p_index_0, ...)`
    In(Vec<Operand>),
    /// `attribute_exists(#p)`
    AttributeExists,
    /// `attribute_not_exists(#p)`
    AttributeNotExists,
    /// `attribute_type(#p, :p_attribute_type)`
    AttributeType(AttributeType),
    /// `begins_with(#p, :p_begins_with)`
    BeginsWith(Operand),
    /// `contains(#p, :p_contains)`
    Contains(Operand),
    /// `#p = #p + :p_increase`
    Increment(Operand),
    /// `#p = #p - :p_decrease`
    Decrement(Operand),
    /// `#p = list_append(#p, :p_list_append)`, or with `prepend`
    /// `#p = list_append(:p_list_append_prepend, #p)`.
    ListAppend {
        /// The list to concatenate.
        operand: Operand,
        /// Put the new elements in front.
        prepend: bool,
    },
    /// `#p = if_not_exists(#p, :p_if_not_exists)`
    IfNotExists(Operand),
    /// `#p` when empty, otherwise `#p[i], #p[j], ...`.
    Remove(Vec<usize>),
    /// `#p :p_add`
    Add(Operand),
    /// `#p :p_delete`
    Delete(Operand),
    /// `#p` only: registers the names, used for projections.
    Name,
}

// ---------------------------------------------------------------------------
// Operands
// ---------------------------------------------------------------------------

/// A caller-supplied operand before it is bound to a value placeholder.
///
/// Set-typed operands keep their collection shape here; [`Operand::normalize`]
/// is the one place they become the store's native set representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A value already in wire form.
    Value(AttributeValue),
    /// A set of strings.
    StringSet(Vec<String>),
    /// A set of numbers, string-encoded.
    NumberSet(Vec<String>),
    /// A set of binary values.
    BinarySet(Vec<Bytes>),
}

impl Operand {
    /// A string set operand.
    pub fn string_set<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::StringSet(values.into_iter().map(Into::into).collect())
    }

    /// A number set operand.
    pub fn number_set<I, N>(values: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: ToString,
    {
        Self::NumberSet(values.into_iter().map(|n| n.to_string()).collect())
    }

    /// A binary set operand.
    pub fn binary_set<I: IntoIterator<Item = Bytes>>(values: I) -> Self {
        Self::BinarySet(values.into_iter().collect())
    }

    /// Convert to the value bound under a placeholder.
    #[must_use]
    pub fn normalize(&self) -> AttributeValue {
        match self {
            Self::Value(value) => value.clone(),
            Self::StringSet(values) => AttributeValue::string_set(values.iter().cloned()),
            Self::NumberSet(values) => AttributeValue::number_set(values),
            Self::BinarySet(values) => AttributeValue::binary_set(values.iter().cloned()),
        }
    }
}

macro_rules! operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Self::Value(AttributeValue::from(value))
                }
            }
        )*
    };
}

operand_from_value!(
    AttributeValue,
    &str,
    String,
    bool,
    Bytes,
    i32,
    i64,
    u32,
    u64,
    usize,
    f64,
    Vec<AttributeValue>,
    HashMap<String, AttributeValue>,
);

impl From<Vec<String>> for Operand {
    fn from(values: Vec<String>) -> Self {
        Self::Value(AttributeValue::L(
            values.into_iter().map(AttributeValue::S).collect(),
        ))
    }
}

impl From<Vec<&str>> for Operand {
    fn from(values: Vec<&str>) -> Self {
        Self::Value(AttributeValue::L(
            values.into_iter().map(AttributeValue::from).collect(),
        ))
    }
}

impl<S: BuildHasher> From<HashSet<String, S>> for Operand {
    fn from(values: HashSet<String, S>) -> Self {
        Self::StringSet(values.into_iter().collect())
    }
}

impl From<BTreeSet<String>> for Operand {
    fn from(values: BTreeSet<String>) -> Self {
        Self::StringSet(values.into_iter().collect())
    }
}

impl<S: BuildHasher> From<HashSet<&str, S>> for Operand {
    fn from(values: HashSet<&str, S>) -> Self {
        Self::string_set(values)
    }
}

impl From<BTreeSet<&str>> for Operand {
    fn from(values: BTreeSet<&str>) -> Self {
        Self::string_set(values)
    }
}

impl<S: BuildHasher> From<HashSet<i64, S>> for Operand {
    fn from(values: HashSet<i64, S>) -> Self {
        Self::number_set(values)
    }
}

impl From<BTreeSet<i64>> for Operand {
    fn from(values: BTreeSet<i64>) -> Self {
        Self::number_set(values)
    }
}

// ---------------------------------------------------------------------------
// Fragments & bindings
// ---------------------------------------------------------------------------

/// Placeholder bindings: `#token -> name` and `:token -> value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    /// Expression attribute names.
    pub names: BTreeMap<String, String>,
    /// Expression attribute values.
    pub values: BTreeMap<String, AttributeValue>,
}

impl Bindings {
    /// Returns `true` when no placeholder is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// Merge `other` into `self`. Existing tokens win.
    pub fn merge(&mut self, other: Bindings) {
        for (token, name) in other.names {
            self.names.entry(token).or_insert(name);
        }
        for (token, value) in other.values {
            self.values.entry(token).or_insert(value);
        }
    }

    fn name_token(&self, literal: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, name)| name.as_str() == literal)
            .map(|(token, _)| token.as_str())
    }
}

/// A single compiled clause plus the bindings it introduced.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionFragment {
    /// The clause text, e.g. `#age >= :age`.
    pub expression: String,
    /// Bindings that were not already present in the scope.
    pub bindings: Bindings,
}

/// Resolve `path` and compile `operator` against it.
pub fn compile(
    path: &str,
    operator: &Operator,
    existing: &Bindings,
) -> Result<ExpressionFragment, ExpressionError> {
    let resolved = resolve(path)?;
    compile_path(&resolved, operator, existing)
}

/// Compile `operator` against an already resolved path.
pub fn compile_path(
    path: &AttributePath,
    operator: &Operator,
    existing: &Bindings,
) -> Result<ExpressionFragment, ExpressionError> {
    let mut emitter = Emitter {
        existing,
        fresh: Bindings::default(),
    };
    let target = emitter.path(path);
    let key = path.placeholder_key();

    let expression = match operator {
        Operator::Compare {
            op,
            operand,
            size: true,
        } => {
            let token = emitter.value(&format!("{key}_size"), operand);
            format!("size({target}) {op} {token}")
        }
        Operator::Compare { op, operand, .. } => {
            let token = emitter.value(&key, operand);
            format!("{target} {op} {token}")
        }
        Operator::Between { lower, upper } => {
            let lower = emitter.value(&format!("{key}_lower"), lower);
            let upper = emitter.value(&format!("{key}_upper"), upper);
            format!("{target} BETWEEN {lower} AND {upper}")
        }
        Operator::In(operands) => {
            if operands.is_empty() {
                return Err(ExpressionError::EmptyInList {
                    path: path.to_string(),
                });
            }
            let tokens: Vec<String> = operands
                .iter()
                .enumerate()
                .map(|(i, operand)| emitter.value(&format!("{key}_index_{i}"), operand))
                .collect();
            format!("{target} IN ({})", tokens.join(", "))
        }
        Operator::AttributeExists => format!("attribute_exists({target})"),
        Operator::AttributeNotExists => format!("attribute_not_exists({target})"),
        Operator::AttributeType(kind) => {
            let token = emitter.bind(
                &format!("{key}_attribute_type"),
                AttributeValue::S(kind.as_str().to_owned()),
            );
            format!("attribute_type({target}, {token})")
        }
        Operator::BeginsWith(operand) => {
            let token = emitter.value(&format!("{key}_begins_with"), operand);
            format!("begins_with({target}, {token})")
        }
        Operator::Contains(operand) => {
            let token = emitter.value(&format!("{key}_contains"), operand);
            format!("contains({target}, {token})")
        }
        Operator::Increment(operand) => {
            let token = emitter.value(&format!("{key}_increase"), operand);
            format!("{target} = {target} + {token}")
        }
        Operator::Decrement(operand) => {
            let token = emitter.value(&format!("{key}_decrease"), operand);
            format!("{target} = {target} - {token}")
        }
        Operator::ListAppend {
            operand,
            prepend: false,
        } => {
            let token = emitter.value(&format!("{key}_list_append"), operand);
            format!("{target} = list_append({target}, {token})")
        }
        Operator::ListAppend {
            operand,
            prepend: true,
        } => {
            let token = emitter.value(&format!("{key}_list_append_prepend"), operand);
            format!("{target} = list_append({token}, {target})")
        }
        Operator::IfNotExists(operand) => {
            let token = emitter.value(&format!("{key}_if_not_exists"), operand);
            format!("{target} = if_not_exists({target}, {token})")
        }
        Operator::Remove(indexes) if indexes.is_empty() => target,
        Operator::Remove(indexes) => indexes
            .iter()
            .map(|i| format!("{target}[{i}]"))
            .collect::<Vec<_>>()
            .join(", "),
        Operator::Add(operand) => {
            let token = emitter.value(&format!("{key}_add"), operand);
            format!("{target} {token}")
        }
        Operator::Delete(operand) => {
            let token = emitter.value(&format!("{key}_delete"), operand);
            format!("{target} {token}")
        }
        Operator::Name => target,
    };

    Ok(ExpressionFragment {
        expression,
        bindings: emitter.fresh,
    })
}

/// Allocates placeholders against the scope's bindings plus the ones this
/// fragment has added so far.
struct Emitter<'a> {
    existing: &'a Bindings,
    fresh: Bindings,
}

impl Emitter<'_> {
    /// Render `#a.#b[2].#c`, registering every segment name.
    fn path(&mut self, path: &AttributePath) -> String {
        let mut rendered = String::new();
        for (i, segment) in path.segments().iter().enumerate() {
            if i > 0 {
                rendered.push('.');
            }
            let token = self.name(&segment.name);
            rendered.push_str(&token);
            for index in &segment.indexes {
                let _ = write!(rendered, "[{index}]");
            }
        }
        rendered
    }

    fn name(&mut self, literal: &str) -> String {
        if let Some(token) = self
            .existing
            .name_token(literal)
            .or_else(|| self.fresh.name_token(literal))
        {
            return token.to_owned();
        }

        let base = format!("#{}", sanitize(literal));
        let mut token = base.clone();
        let mut suffix = 1;
        while self.existing.names.contains_key(&token) || self.fresh.names.contains_key(&token) {
            suffix += 1;
            token = format!("{base}_{suffix}");
        }
        self.fresh.names.insert(token.clone(), literal.to_owned());
        token
    }

    fn value(&mut self, key: &str, operand: &Operand) -> String {
        self.bind(key, operand.normalize())
    }

    /// Bind `value` under `:key`, reusing the token when it already holds an
    /// equal value and suffixing `_2`, `_3`, ... when it holds another one.
    fn bind(&mut self, key: &str, value: AttributeValue) -> String {
        let base = format!(":{key}");
        let mut token = base.clone();
        let mut suffix = 1;
        loop {
            let bound = self
                .existing
                .values
                .get(&token)
                .or_else(|| self.fresh.values.get(&token));
            match bound {
                None => break,
                Some(current) if *current == value => return token,
                Some(_) => {
                    suffix += 1;
                    token = format!("{base}_{suffix}");
                }
            }
        }
        self.fresh.values.insert(token.clone(), value);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(path: &str, operator: &Operator) -> ExpressionFragment {
        compile(path, operator, &Bindings::default()).unwrap()
    }

    fn eq(operand: impl Into<Operand>) -> Operator {
        Operator::Compare {
            op: CompareOp::Eq,
            operand: operand.into(),
            size: false,
        }
    }

    #[test]
    fn test_should_compile_nested_path_comparison() {
        let f = fragment("prop.pets[2].name", &eq("Max"));
        assert_eq!(f.expression, "#prop.#pets[2].#name = :prop_pets_2_name");
        assert_eq!(f.bindings.names.len(), 3);
        assert_eq!(f.bindings.names["#pets"], "pets");
        assert_eq!(
            f.bindings.values[":prop_pets_2_name"],
            AttributeValue::from("Max")
        );
    }

    #[test]
    fn test_should_compile_size_comparison() {
        let op = Operator::Compare {
            op: CompareOp::Ge,
            operand: 3_i64.into(),
            size: true,
        };
        assert_eq!(fragment("prop", &op).expression, "size(#prop) >= :prop_size");
    }

    #[test]
    fn test_should_compile_between_and_in() {
        let between = Operator::Between {
            lower: "a".into(),
            upper: "c".into(),
        };
        assert_eq!(
            fragment("name", &between).expression,
            "#name BETWEEN :name_lower AND :name_upper"
        );

        let within = Operator::In(vec![1_i64.into(), 2_i64.into(), 3_i64.into()]);
        let f = fragment("age", &within);
        assert_eq!(
            f.expression,
            "#age IN (:age_index_0, :age_index_1, :age_index_2)"
        );
        assert_eq!(f.bindings.values.len(), 3);
    }

    #[test]
    fn test_should_reject_empty_in_list() {
        let result = compile("age", &Operator::In(Vec::new()), &Bindings::default());
        assert!(matches!(result, Err(ExpressionError::EmptyInList { .. })));
    }

    #[test]
    fn test_should_compile_functions() {
        assert_eq!(
            fragment("prop", &Operator::AttributeNotExists).expression,
            "attribute_not_exists(#prop)"
        );
        let typed = fragment("prop", &Operator::AttributeType(AttributeType::StringSet));
        assert_eq!(typed.expression, "attribute_type(#prop, :prop_attribute_type)");
        assert_eq!(
            typed.bindings.values[":prop_attribute_type"],
            AttributeValue::from("SS")
        );
        assert_eq!(
            fragment("prop", &Operator::BeginsWith("ab".into())).expression,
            "begins_with(#prop, :prop_begins_with)"
        );
    }

    #[test]
    fn test_should_compile_update_actions() {
        assert_eq!(
            fragment("prop", &Operator::Increment(1_i64.into())).expression,
            "#prop = #prop + :prop_increase"
        );
        assert_eq!(
            fragment("prop", &Operator::Decrement(1_i64.into())).expression,
            "#prop = #prop - :prop_decrease"
        );
        assert_eq!(
            fragment("prop", &Operator::IfNotExists(0_i64.into())).expression,
            "#prop = if_not_exists(#prop, :prop_if_not_exists)"
        );
        assert_eq!(
            fragment("prop", &Operator::Add(1_i64.into())).expression,
            "#prop :prop_add"
        );
        assert_eq!(
            fragment("prop", &Operator::Delete(Operand::string_set(["a"]))).expression,
            "#prop :prop_delete"
        );
    }

    #[test]
    fn test_should_compile_list_append_both_directions() {
        let append = Operator::ListAppend {
            operand: vec!["vip"].into(),
            prepend: false,
        };
        assert_eq!(
            fragment("roles", &append).expression,
            "#roles = list_append(#roles, :roles_list_append)"
        );
        let prepend = Operator::ListAppend {
            operand: vec!["vip"].into(),
            prepend: true,
        };
        assert_eq!(
            fragment("roles", &prepend).expression,
            "#roles = list_append(:roles_list_append_prepend, #roles)"
        );
    }

    #[test]
    fn test_should_compile_remove_with_and_without_indexes() {
        assert_eq!(fragment("prop", &Operator::Remove(vec![])).expression, "#prop");
        assert_eq!(
            fragment("prop", &Operator::Remove(vec![1, 2])).expression,
            "#prop[1], #prop[2]"
        );
        assert_eq!(
            fragment("roles[1]", &Operator::Remove(vec![])).expression,
            "#roles[1]"
        );
    }

    #[test]
    fn test_should_register_repeated_segment_once() {
        let f = fragment("a.b.a", &Operator::Name);
        assert_eq!(f.expression, "#a.#b.#a");
        assert_eq!(f.bindings.names.len(), 2);
    }

    #[test]
    fn test_should_reuse_existing_name_and_equal_value_tokens() {
        let first = fragment("age", &eq(30_i64));
        let second = compile("age", &eq(30_i64), &first.bindings).unwrap();
        assert_eq!(second.expression, "#age = :age");
        assert!(second.bindings.is_empty());
    }

    #[test]
    fn test_should_suffix_value_token_bound_to_another_value() {
        let first = fragment("status", &eq("a"));
        let second = compile("status", &eq("b"), &first.bindings).unwrap();
        assert_eq!(second.expression, "#status = :status_2");
        assert_eq!(second.bindings.values[":status_2"], AttributeValue::from("b"));
        assert!(second.bindings.names.is_empty());
    }

    #[test]
    fn test_should_keep_sanitized_names_distinct() {
        let first = fragment("first-name", &Operator::Name);
        assert_eq!(first.expression, "#first_name");
        let second = compile("first_name", &Operator::Name, &first.bindings).unwrap();
        assert_eq!(second.expression, "#first_name_2");
        assert_eq!(second.bindings.names["#first_name_2"], "first_name");
    }

    #[test]
    fn test_should_normalize_set_operands_once() {
        let operand = Operand::from(HashSet::from(["b", "a", "b"]));
        assert_eq!(
            operand.normalize(),
            AttributeValue::Ss(vec!["a".to_owned(), "b".to_owned()])
        );
        let numbers = Operand::from(BTreeSet::from([3_i64, 1]));
        assert_eq!(
            numbers.normalize(),
            AttributeValue::Ns(vec!["1".to_owned(), "3".to_owned()])
        );
    }

    #[test]
    fn test_should_not_mutate_existing_bindings() {
        let existing = fragment("age", &eq(1_i64)).bindings;
        let snapshot = existing.clone();
        let _ = compile("name", &eq("x"), &existing).unwrap();
        assert_eq!(existing, snapshot);
    }
}

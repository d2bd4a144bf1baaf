//! DynamoDB expression compilation.
//!
//! The pipeline mirrors how the store reads expressions, in reverse:
//!
//! 1. **Resolving**: split a caller-supplied attribute path (`a.b[2].c`) into
//!    segments.
//! 2. **Compiling**: turn one path plus one [`Operator`] into an
//!    [`ExpressionFragment`] with the `#name` / `:value` placeholders it needs.
//! 3. **Scoping**: collect fragments per [`Bucket`] in a [`LogicScope`], nest
//!    scopes for `AND` / `OR` / `NOT` groups, and join everything into the
//!    final expression strings.

pub mod compiler;
pub mod path;
pub mod scope;

pub use compiler::{
    AttributeType, Bindings, CompareOp, ExpressionError, ExpressionFragment, Operand, Operator,
    compile, compile_path,
};
pub use path::{AttributePath, PathSegment, resolve};
pub use scope::{Bucket, CompiledScope, Logic, LogicScope};

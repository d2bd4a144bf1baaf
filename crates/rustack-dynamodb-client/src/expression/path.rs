//! Attribute path resolution.
//!
//! A path is a `.`-separated list of attribute names, each optionally followed
//! by one or more `[n]` list dereferences: `profile.pets[2].name`.

use std::fmt;

use super::compiler::ExpressionError;

/// One `.`-separated component of an [`AttributePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// The literal attribute name, without any index suffix.
    pub name: String,
    /// List positions dereferenced after the name, in order.
    pub indexes: Vec<usize>,
}

/// A resolved document path with at least one segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributePath {
    segments: Vec<PathSegment>,
}

impl AttributePath {
    /// The segments in order. Never empty.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// The literal attribute name of every segment, indexes stripped.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.name.as_str())
    }

    /// The top-level attribute this path starts from.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.segments[0].name
    }

    /// The flattened key used to derive value placeholders.
    ///
    /// Separators and indexes collapse into `_`, so `a.b[2].c` becomes
    /// `a_b_2_c`. Characters that are not valid in a placeholder are replaced
    /// with `_` as well.
    #[must_use]
    pub fn placeholder_key(&self) -> String {
        let mut parts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            parts.push(sanitize(&segment.name));
            parts.extend(segment.indexes.iter().map(ToString::to_string));
        }
        parts.join("_")
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            for index in &segment.indexes {
                write!(f, "[{index}]")?;
            }
        }
        Ok(())
    }
}

/// Resolve a path string into an [`AttributePath`].
///
/// Fails with [`ExpressionError::MalformedPath`] on an empty path, an empty
/// segment, an unbalanced bracket, or an index that is not a non-negative
/// integer.
pub fn resolve(path: &str) -> Result<AttributePath, ExpressionError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(malformed(path, "path is empty"));
    }

    let segments = trimmed
        .split('.')
        .map(|raw| parse_segment(path, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AttributePath { segments })
}

fn parse_segment(path: &str, raw: &str) -> Result<PathSegment, ExpressionError> {
    let (name, mut rest) = raw.find('[').map_or((raw, ""), |at| raw.split_at(at));

    if name.trim().is_empty() {
        return Err(malformed(path, "empty path segment"));
    }
    if name.contains(']') {
        return Err(malformed(path, "unbalanced `]`"));
    }

    let mut indexes = Vec::new();
    while !rest.is_empty() {
        let Some(body) = rest.strip_prefix('[') else {
            return Err(malformed(path, format!("unexpected `{rest}` after list index")));
        };
        let Some(close) = body.find(']') else {
            return Err(malformed(path, "unclosed `[`"));
        };
        let digits = &body[..close];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed(path, format!("invalid list index `{digits}`")));
        }
        let index = digits
            .parse::<usize>()
            .map_err(|_| malformed(path, format!("list index `{digits}` is out of range")))?;
        indexes.push(index);
        rest = &body[close + 1..];
    }

    Ok(PathSegment {
        name: name.to_owned(),
        indexes,
    })
}

fn malformed(path: &str, reason: impl Into<String>) -> ExpressionError {
    ExpressionError::MalformedPath {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

/// Replace every character that cannot appear in a placeholder token with `_`.
pub(crate) fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

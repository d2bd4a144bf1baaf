//! Table schema descriptors.
//!
//! A [`TableSchema`] is built once per record type and never mutated. It names
//! the table, its primary key, its secondary indexes and the fields that carry
//! automatic timestamps.
//!
//! # Examples
//!
//! ```
//! use rustack_dynamodb_client::schema::{TableSchema, TimestampKind};
//!
//! let schema = TableSchema::builder("users")
//!     .hash_key("id")
//!     .global_index("email", None)
//!     .timestamp(TimestampKind::Created, "createdAt")
//!     .build()
//!     .unwrap();
//! assert_eq!(schema.hash_key(), "id");
//! assert!(schema.index("email-global").is_some());
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use rustack_dynamodb_model::{AttributeValue, Item, Key};

use crate::error::SchemaError;

/// Fields the client fills with the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampKind {
    /// Set when the record is first put.
    Created,
    /// Set on every put and update.
    Updated,
    /// A TTL attribute, stored as epoch seconds.
    Expires,
}

/// Whether an index is global or local to the partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// A global secondary index.
    Global,
    /// A local secondary index. Shares the table's hash key.
    Local,
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    /// The index name.
    pub name: String,
    /// Global or local.
    pub kind: IndexKind,
    /// The index hash key attribute.
    pub hash_key: String,
    /// The index range key attribute.
    pub range_key: Option<String>,
}

/// The role a field plays in the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRole {
    /// Table hash key.
    HashKey,
    /// Table range key.
    RangeKey,
    /// Hash key of the named index.
    IndexHash(String),
    /// Range key of the named index.
    IndexRange(String),
    /// Automatic timestamp.
    Timestamp(TimestampKind),
}

/// An immutable table descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table_name: String,
    hash_key: String,
    range_key: Option<String>,
    indexes: Vec<IndexSchema>,
    timestamps: Vec<(TimestampKind, String)>,
}

impl TableSchema {
    /// Start describing `table`.
    pub fn builder(table: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            table_name: table.into(),
            hash_key: None,
            range_key: None,
            indexes: Vec::new(),
            timestamps: Vec::new(),
            duplicate: None,
        }
    }

    /// The table name, without the configured prefix.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// The hash key attribute.
    #[must_use]
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }

    /// The range key attribute, if the table has one.
    #[must_use]
    pub fn range_key(&self) -> Option<&str> {
        self.range_key.as_deref()
    }

    /// Every secondary index, in declaration order.
    #[must_use]
    pub fn indexes(&self) -> &[IndexSchema] {
        &self.indexes
    }

    /// Global secondary indexes.
    pub fn global_indexes(&self) -> impl Iterator<Item = &IndexSchema> {
        self.indexes.iter().filter(|i| i.kind == IndexKind::Global)
    }

    /// Local secondary indexes.
    pub fn local_indexes(&self) -> impl Iterator<Item = &IndexSchema> {
        self.indexes.iter().filter(|i| i.kind == IndexKind::Local)
    }

    /// Look up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// The field holding timestamps of `kind`.
    #[must_use]
    pub fn timestamp_field(&self, kind: TimestampKind) -> Option<&str> {
        self.timestamps
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, field)| field.as_str())
    }

    /// Every field with a role, as `(field, role)` pairs.
    #[must_use]
    pub fn roles(&self) -> Vec<(&str, FieldRole)> {
        let mut roles = vec![(self.hash_key.as_str(), FieldRole::HashKey)];
        if let Some(range) = &self.range_key {
            roles.push((range.as_str(), FieldRole::RangeKey));
        }
        for index in &self.indexes {
            if index.kind == IndexKind::Global {
                roles.push((index.hash_key.as_str(), FieldRole::IndexHash(index.name.clone())));
            }
            if let Some(range) = &index.range_key {
                roles.push((range.as_str(), FieldRole::IndexRange(index.name.clone())));
            }
        }
        for (kind, field) in &self.timestamps {
            roles.push((field.as_str(), FieldRole::Timestamp(*kind)));
        }
        roles
    }

    /// The hash and range key attributes of `index`, or of the table when
    /// `index` is `None`.
    pub fn index_keys(&self, index: Option<&str>) -> Result<(&str, Option<&str>), SchemaError> {
        match index {
            None => Ok((self.hash_key(), self.range_key())),
            Some(name) => self
                .index(name)
                .map(|i| (i.hash_key.as_str(), i.range_key.as_deref()))
                .ok_or_else(|| SchemaError::UnknownIndex {
                    table: self.table_name.clone(),
                    index: name.to_owned(),
                }),
        }
    }

    /// A key for a hash-only lookup.
    pub fn key(&self, hash: impl Into<AttributeValue>) -> Key {
        Key::from([(self.hash_key.clone(), hash.into())])
    }

    /// A key with both components.
    pub fn key_with_range(
        &self,
        hash: impl Into<AttributeValue>,
        range: impl Into<AttributeValue>,
    ) -> Result<Key, SchemaError> {
        let range_key = self
            .range_key
            .as_ref()
            .ok_or_else(|| SchemaError::MissingRangeKey {
                table: self.table_name.clone(),
            })?;
        Ok(Key::from([
            (self.hash_key.clone(), hash.into()),
            (range_key.clone(), range.into()),
        ]))
    }

    /// Copy the primary key attributes out of `item`.
    pub fn extract_key(&self, item: &Item) -> Result<Key, SchemaError> {
        let mut key = Key::new();
        for attribute in std::iter::once(&self.hash_key).chain(self.range_key.as_ref()) {
            let value = item
                .get(attribute)
                .ok_or_else(|| SchemaError::MissingKeyAttribute {
                    attribute: attribute.clone(),
                })?;
            key.insert(attribute.clone(), value.clone());
        }
        Ok(key)
    }
}

/// Format `now` the way fields of `kind` are stored.
#[must_use]
pub fn timestamp_value(kind: TimestampKind, now: DateTime<Utc>) -> AttributeValue {
    match kind {
        TimestampKind::Created | TimestampKind::Updated => {
            AttributeValue::S(now.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        TimestampKind::Expires => AttributeValue::from(now.timestamp()),
    }
}

/// Builder for [`TableSchema`]. Validation happens in [`build`](Self::build).
#[derive(Debug)]
pub struct TableSchemaBuilder {
    table_name: String,
    hash_key: Option<String>,
    range_key: Option<String>,
    indexes: Vec<IndexSchema>,
    timestamps: Vec<(TimestampKind, String)>,
    duplicate: Option<String>,
}

impl TableSchemaBuilder {
    /// Declare the hash key.
    #[must_use]
    pub fn hash_key(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if self.hash_key.is_some() {
            self.duplicate.get_or_insert(field);
        } else {
            self.hash_key = Some(field);
        }
        self
    }

    /// Declare the range key.
    #[must_use]
    pub fn range_key(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if self.range_key.is_some() {
            self.duplicate.get_or_insert(field);
        } else {
            self.range_key = Some(field);
        }
        self
    }

    /// Declare a global index named `<hash>-global`.
    #[must_use]
    pub fn global_index(self, hash: impl Into<String>, range: Option<&str>) -> Self {
        let hash = hash.into();
        let name = format!("{hash}-global");
        self.named_global_index(name, hash, range)
    }

    /// Declare a global index with an explicit name.
    #[must_use]
    pub fn named_global_index(
        mut self,
        name: impl Into<String>,
        hash: impl Into<String>,
        range: Option<&str>,
    ) -> Self {
        self.indexes.push(IndexSchema {
            name: name.into(),
            kind: IndexKind::Global,
            hash_key: hash.into(),
            range_key: range.map(ToOwned::to_owned),
        });
        self
    }

    /// Declare a local index named `<range>-local`.
    #[must_use]
    pub fn local_index(self, range: impl Into<String>) -> Self {
        let range = range.into();
        let name = format!("{range}-local");
        self.named_local_index(name, range)
    }

    /// Declare a local index with an explicit name.
    #[must_use]
    pub fn named_local_index(mut self, name: impl Into<String>, range: impl Into<String>) -> Self {
        self.indexes.push(IndexSchema {
            name: name.into(),
            kind: IndexKind::Local,
            hash_key: String::new(),
            range_key: Some(range.into()),
        });
        self
    }

    /// Declare the field holding timestamps of `kind`.
    #[must_use]
    pub fn timestamp(mut self, kind: TimestampKind, field: impl Into<String>) -> Self {
        self.timestamps.retain(|(k, _)| *k != kind);
        self.timestamps.push((kind, field.into()));
        self
    }

    /// Validate and freeze the schema.
    pub fn build(self) -> Result<TableSchema, SchemaError> {
        let table = self.table_name;
        if table.trim().is_empty() {
            return Err(SchemaError::MissingTableName);
        }
        if let Some(attribute) = self.duplicate {
            return Err(SchemaError::DuplicateKey { table, attribute });
        }
        let Some(hash_key) = self.hash_key else {
            return Err(SchemaError::MissingHashKey { table });
        };
        if self.range_key.as_deref() == Some(hash_key.as_str()) {
            return Err(SchemaError::DuplicateKey {
                table,
                attribute: hash_key,
            });
        }

        let mut indexes: Vec<IndexSchema> = Vec::with_capacity(self.indexes.len());
        for mut index in self.indexes {
            if indexes.iter().any(|i| i.name == index.name) {
                return Err(SchemaError::DuplicateIndex {
                    table,
                    index: index.name,
                });
            }
            if index.kind == IndexKind::Local {
                index.hash_key.clone_from(&hash_key);
            }
            indexes.push(index);
        }

        Ok(TableSchema {
            table_name: table,
            hash_key,
            range_key: self.range_key,
            indexes,
            timestamps: self.timestamps,
        })
    }
}

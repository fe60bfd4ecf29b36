//! Record schemas and uniformity checks.
//!
//! Schemas are never declared up front: they are derived from the records
//! themselves and used to reject batches (and mutations) that mix shapes.

use crate::{error::Result, Error, FieldType, Record};
use std::fmt;

/// A field in a derived schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type, `None` while only nulls have been seen
    pub field_type: Option<FieldType>,
}

impl fmt::Display for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field_type {
            Some(t) => write!(f, "{}: {}", self.name, t),
            None => write!(f, "{}: Null", self.name),
        }
    }
}

/// The ordered field layout shared by a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub fields: Vec<FieldDef>,
}

impl Schema {
    /// Derive the schema of a single record.
    pub fn of(record: &Record) -> Self {
        Self {
            fields: record
                .fields()
                .map(|(name, value)| FieldDef {
                    name: name.to_string(),
                    field_type: value.field_type(),
                })
                .collect(),
        }
    }

    /// Derive one schema for a whole batch.
    ///
    /// Returns `None` for an empty batch and fails with
    /// [`Error::SchemaMismatch`] if the records disagree.
    pub fn of_batch<'a>(
        records: impl IntoIterator<Item = &'a Record>,
        context: &str,
    ) -> Result<Option<Self>> {
        let mut schema: Option<Schema> = None;
        for record in records {
            match schema.as_mut() {
                None => schema = Some(Schema::of(record)),
                Some(s) => s.unify(&Schema::of(record), context)?,
            }
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Merge another schema into this one.
    ///
    /// Names must match in order; where both sides know a field's type the
    /// types must agree, otherwise the known type is adopted.
    pub fn unify(&mut self, other: &Schema, context: &str) -> Result<()> {
        let same_names = self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.name == b.name);
        if !same_names {
            return Err(self.mismatch(other, context));
        }

        for (mine, theirs) in self.fields.iter_mut().zip(&other.fields) {
            match (mine.field_type, theirs.field_type) {
                (Some(a), Some(b)) if a != b => {
                    return Err(Error::SchemaMismatch {
                        context: context.to_string(),
                        expected: mine.to_string(),
                        got: theirs.to_string(),
                    });
                }
                (None, Some(b)) => mine.field_type = Some(b),
                _ => {}
            }
        }
        Ok(())
    }

    /// Check that `record` can be compared with records of this schema on
    /// the named fields: each must exist in both with compatible types.
    pub fn check_comparable<'a>(
        &self,
        record: &Record,
        fields: impl IntoIterator<Item = &'a str>,
        context: &str,
    ) -> Result<()> {
        for name in fields {
            let Some(def) = self.get(name) else {
                continue;
            };
            let Some(value) = record.get(name) else {
                return Err(Error::SchemaMismatch {
                    context: context.to_string(),
                    expected: def.to_string(),
                    got: format!("{}: <absent>", name),
                });
            };
            if let (Some(expected), Some(got)) = (def.field_type, value.field_type()) {
                if expected != got {
                    return Err(Error::SchemaMismatch {
                        context: context.to_string(),
                        expected: def.to_string(),
                        got: format!("{}: {}", name, got),
                    });
                }
            }
        }
        Ok(())
    }

    fn mismatch(&self, other: &Schema, context: &str) -> Error {
        Error::SchemaMismatch {
            context: context.to_string(),
            expected: self.to_string(),
            got: other.to_string(),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        write!(f, "}}")
    }
}

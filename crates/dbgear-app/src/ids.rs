// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(MappingId);
string_id!(SegmentId);

/// `instance.table` pair naming one physical table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableRef {
    pub instance: String,
    pub table: String,
}

impl TableRef {
    pub fn new(instance: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.instance, self.table)
    }
}

impl FromStr for TableRef {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let Some((instance, table)) = value.split_once('.') else {
            bail!("table reference {value:?} must look like <instance>.<table>");
        };
        if instance.is_empty() || table.is_empty() || table.contains('.') {
            bail!("table reference {value:?} must look like <instance>.<table>");
        }
        Ok(Self::new(instance, table))
    }
}

#[cfg(test)]
mod tests {
    use super::{MappingId, TableRef};

    #[test]
    fn table_ref_parses_and_renders() {
        let parsed: TableRef = "db1.categories".parse().expect("valid table ref");
        assert_eq!(parsed, TableRef::new("db1", "categories"));
        assert_eq!(parsed.to_string(), "db1.categories");
    }

    #[test]
    fn table_ref_rejects_missing_parts() {
        assert!("categories".parse::<TableRef>().is_err());
        assert!(".categories".parse::<TableRef>().is_err());
        assert!("db1.".parse::<TableRef>().is_err());
        assert!("a.b.c".parse::<TableRef>().is_err());
    }

    #[test]
    fn mapping_id_serializes_transparently() {
        let id = MappingId::new("dev");
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, "\"dev\"");
    }
}

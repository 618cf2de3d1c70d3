// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use tracing::info;

use crate::backend::Backend;
use crate::model::{Field, Index, Table};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldFormInput {
    pub column_name: String,
    pub display_name: String,
    pub column_type: String,
    pub nullable: bool,
    pub primary_key: String,
    pub default_value: String,
    pub foreign_key_table: String,
    pub foreign_key_column: String,
    pub comment: String,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

impl FieldFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.column_name.trim().is_empty() {
            bail!("column name is required -- enter a column name and retry");
        }
        if self.column_type.trim().is_empty() {
            bail!("column type is required -- enter a type such as VARCHAR(20)");
        }
        if !self.primary_key.trim().is_empty() && self.primary_key.trim().parse::<u32>().is_err() {
            bail!(
                "primary key ordinal {:?} must be a positive number",
                self.primary_key
            );
        }
        let has_table = !self.foreign_key_table.trim().is_empty();
        let has_column = !self.foreign_key_column.trim().is_empty();
        if has_table != has_column {
            bail!("foreign key needs both a table and a column");
        }
        Ok(())
    }

    pub fn into_field(self) -> Result<Field> {
        self.validate()?;
        let foreign_key = match (
            non_empty(&self.foreign_key_table),
            non_empty(&self.foreign_key_column),
        ) {
            (Some(table), Some(column)) => Some(format!("{table}.{column}")),
            _ => None,
        };
        Ok(Field {
            column_name: self.column_name.trim().to_owned(),
            display_name: non_empty(&self.display_name),
            column_type: self.column_type.trim().to_owned(),
            nullable: self.nullable,
            primary_key: self.primary_key.trim().parse().ok(),
            default_value: non_empty(&self.default_value),
            foreign_key,
            comment: non_empty(&self.comment),
        })
    }
}

/// In-progress edit of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDraft {
    table: Table,
    dirty: bool,
}

impl TableDraft {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            dirty: false,
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    fn ensure_unique(&self, column_name: &str, skip: Option<usize>) -> Result<()> {
        if column_name.trim().is_empty() {
            bail!("column name is required");
        }
        let clash = self
            .table
            .fields
            .iter()
            .enumerate()
            .any(|(index, field)| Some(index) != skip && field.column_name == column_name);
        if clash {
            bail!(
                "column {column_name:?} already exists in {}",
                self.table.table_name
            );
        }
        Ok(())
    }

    fn check_field_index(&self, index: usize) -> Result<()> {
        if index >= self.table.fields.len() {
            bail!(
                "field index {index} is out of range ({} fields)",
                self.table.fields.len()
            );
        }
        Ok(())
    }

    pub fn add_field(&mut self, field: Field) -> Result<()> {
        self.ensure_unique(&field.column_name, None)?;
        self.table.fields.push(field);
        self.dirty = true;
        Ok(())
    }

    /// Replaces a field; a rename is carried into the indexes.
    pub fn update_field(&mut self, index: usize, field: Field) -> Result<()> {
        self.check_field_index(index)?;
        self.ensure_unique(&field.column_name, Some(index))?;
        let old_name = self.table.fields[index].column_name.clone();
        if old_name != field.column_name {
            for table_index in &mut self.table.indexes {
                for column in &mut table_index.columns {
                    if *column == old_name {
                        column.clone_from(&field.column_name);
                    }
                }
            }
        }
        self.table.fields[index] = field;
        self.dirty = true;
        Ok(())
    }

    /// Removes a field, its index memberships, and any index left without columns.
    pub fn remove_field(&mut self, index: usize) -> Result<Field> {
        self.check_field_index(index)?;
        let removed = self.table.fields.remove(index);
        for table_index in &mut self.table.indexes {
            table_index
                .columns
                .retain(|column| *column != removed.column_name);
        }
        self.table
            .indexes
            .retain(|table_index| !table_index.columns.is_empty());
        self.dirty = true;
        Ok(removed)
    }

    pub fn move_field(&mut self, from: usize, to: usize) -> Result<()> {
        self.check_field_index(from)?;
        self.check_field_index(to)?;
        let field = self.table.fields.remove(from);
        self.table.fields.insert(to, field);
        self.dirty = true;
        Ok(())
    }

    pub fn add_index(&mut self, index: Index) -> Result<()> {
        if index.index_name.trim().is_empty() {
            bail!("index name is required");
        }
        if index.columns.is_empty() {
            bail!("index {:?} needs at least one column", index.index_name);
        }
        if let Some(missing) = index
            .columns
            .iter()
            .find(|column| self.table.field(column).is_none())
        {
            bail!(
                "index {:?} names unknown column {missing:?}",
                index.index_name
            );
        }
        if self
            .table
            .indexes
            .iter()
            .any(|existing| existing.index_name == index.index_name)
        {
            bail!("index {:?} already exists", index.index_name);
        }
        self.table.indexes.push(index);
        self.dirty = true;
        Ok(())
    }

    pub fn remove_index(&mut self, index: usize) -> Result<Index> {
        if index >= self.table.indexes.len() {
            bail!(
                "index position {index} is out of range ({} indexes)",
                self.table.indexes.len()
            );
        }
        self.dirty = true;
        Ok(self.table.indexes.remove(index))
    }

    pub fn save(&mut self, backend: &mut impl Backend) -> Result<()> {
        backend.update_table(&self.table)?;
        info!(
            instance = %self.table.instance,
            table = %self.table.table_name,
            "schema saved"
        );
        self.dirty = false;
        Ok(())
    }
}

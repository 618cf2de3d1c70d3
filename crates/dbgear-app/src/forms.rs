// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

use crate::ids::{MappingId, TableRef};
use crate::model::{Layout, NewDataModel, NewMapping, SyncMode};
use crate::settings::{SettingsMap, column_of};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvironFormInput {
    pub id: String,
    pub name: String,
    pub base: String,
    pub description: String,
    pub instance: String,
    pub deployment: bool,
}

impl EnvironFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("environment id is required -- enter an id and retry");
        }
        if !self
            .id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
        {
            bail!(
                "environment id {:?} may only contain letters, digits, '_' and '-'",
                self.id
            );
        }
        if self.name.trim().is_empty() {
            bail!("environment name is required -- enter a name and retry");
        }
        if self.base == self.id {
            bail!("environment cannot inherit from itself -- choose another base");
        }
        Ok(())
    }

    pub fn into_mapping(self) -> Result<(MappingId, NewMapping)> {
        self.validate()?;
        let base = if self.base.trim().is_empty() {
            None
        } else {
            Some(MappingId::new(self.base))
        };
        let instances = if self.instance.trim().is_empty() {
            Vec::new()
        } else {
            vec![self.instance]
        };
        Ok((
            MappingId::new(self.id),
            NewMapping {
                base,
                name: self.name,
                instances,
                description: self.description,
                deployment: self.deployment,
            },
        ))
    }
}

/// Top-level inputs of the data-settings form; column settings live in `SettingsForm`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSettingsFormInput {
    pub table: String,
    pub description: String,
    pub sync_mode: SyncMode,
    pub value: String,
    pub caption: String,
    pub layout: Layout,
    pub x_axis: String,
    pub y_axis: String,
    pub cells: Vec<String>,
}

impl Default for DataSettingsFormInput {
    fn default() -> Self {
        Self {
            table: String::new(),
            description: String::new(),
            sync_mode: SyncMode::DropCreate,
            value: String::new(),
            caption: String::new(),
            layout: Layout::Table,
            x_axis: String::new(),
            y_axis: String::new(),
            cells: Vec::new(),
        }
    }
}

fn optional_column(value: &str) -> Option<String> {
    let column = column_of(value.trim());
    if column.is_empty() {
        None
    } else {
        Some(column.to_owned())
    }
}

impl DataSettingsFormInput {
    pub fn validate(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            bail!("target table is required -- choose a table and retry");
        }
        self.table.parse::<TableRef>()?;
        match self.layout {
            Layout::Table => {}
            Layout::Matrix => {
                if self.x_axis.trim().is_empty() || self.y_axis.trim().is_empty() {
                    bail!("matrix layout needs both an x axis and a y axis column");
                }
            }
            Layout::Single => {
                if self.y_axis.trim().is_empty() {
                    bail!("single layout needs a y axis column");
                }
            }
        }
        Ok(())
    }

    pub fn into_data_model(self, settings: SettingsMap) -> Result<(TableRef, NewDataModel)> {
        self.validate()?;
        let table: TableRef = self.table.parse()?;
        let uses_axes = self.layout != Layout::Table;
        let cells: Vec<String> = self
            .cells
            .iter()
            .filter_map(|cell| optional_column(cell))
            .collect();
        Ok((
            table,
            NewDataModel {
                description: self.description,
                layout: self.layout,
                settings,
                sync_mode: self.sync_mode,
                value: optional_column(&self.value),
                caption: optional_column(&self.caption),
                x_axis: if self.layout == Layout::Matrix {
                    optional_column(&self.x_axis)
                } else {
                    None
                },
                y_axis: if uses_axes {
                    optional_column(&self.y_axis)
                } else {
                    None
                },
                cells: if uses_axes && !cells.is_empty() {
                    Some(cells)
                } else {
                    None
                },
            },
        ))
    }
}

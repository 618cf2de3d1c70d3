// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{MappingId, TableRef};

pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    #[serde(rename = "type")]
    pub binding_type: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instances: Vec<String>,
    /// Regex pattern over column names -> suggested default, tried in order.
    #[serde(default)]
    pub rules: IndexMap<String, String>,
    #[serde(default)]
    pub bindings: IndexMap<String, Binding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub id: MappingId,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub base: Option<MappingId>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instances: Vec<String>,
    #[serde(default)]
    pub deployment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTree {
    #[serde(default)]
    pub group: String,
    pub children: Vec<Mapping>,
}

/// `GET /environs` has returned both shapes over time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvironsPayload {
    Trees(Vec<MappingTree>),
    Flat(Vec<Mapping>),
}

impl EnvironsPayload {
    pub fn into_trees(self) -> Vec<MappingTree> {
        match self {
            Self::Trees(trees) => trees,
            Self::Flat(mappings) => group_mappings(mappings),
        }
    }
}

/// Groups a flat mapping list by `group`, keeping first-seen group order.
pub fn group_mappings(mappings: Vec<Mapping>) -> Vec<MappingTree> {
    let mut groups: IndexMap<String, Vec<Mapping>> = IndexMap::new();
    for mapping in mappings {
        groups
            .entry(mapping.group.clone())
            .or_default()
            .push(mapping);
    }
    groups
        .into_iter()
        .map(|(group, children)| MappingTree { group, children })
        .collect()
}

pub fn all_mappings(trees: &[MappingTree]) -> impl Iterator<Item = &Mapping> {
    trees.iter().flat_map(|tree| tree.children.iter())
}

pub fn find_mapping<'a>(trees: &'a [MappingTree], id: &str) -> Option<&'a Mapping> {
    all_mappings(trees).find(|mapping| mapping.id.as_str() == id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMapping {
    pub base: Option<MappingId>,
    pub name: String,
    pub instances: Vec<String>,
    pub description: String,
    pub deployment: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilename {
    pub instance: String,
    pub table_name: String,
    #[serde(default)]
    pub display_name: String,
    /// Owning mapping, present on the project-wide reference list.
    #[serde(default)]
    pub id: Option<MappingId>,
    #[serde(default)]
    pub id_name: Option<String>,
}

impl DataFilename {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.instance, &self.table_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub column_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub column_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: Option<u32>,
    #[serde(default)]
    pub default_value: Option<String>,
    /// `table.column` of the referenced column.
    #[serde(default)]
    pub foreign_key: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl Field {
    pub fn new(column_name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            column_name: column_name.into(),
            display_name: None,
            column_type: column_type.into(),
            nullable: true,
            primary_key: None,
            default_value: None,
            foreign_key: None,
            comment: None,
        }
    }

    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.column_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub index_name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub instance: String,
    pub table_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub indexes: Vec<Index>,
}

impl Table {
    pub fn field(&self, column_name: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|field| field.column_name == column_name)
    }

    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.table_name,
        }
    }
}

/// Wire shape of one column setting; see `settings::ColumnConfig` for the typed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SettingValue {
    #[serde(rename = "type")]
    pub setting_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    Table,
    Matrix,
    Single,
}

impl Layout {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Matrix => "matrix",
            Self::Single => "single",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "table" => Some(Self::Table),
            "matrix" => Some(Self::Matrix),
            "single" => Some(Self::Single),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    #[default]
    DropCreate,
    UpdateDiff,
}

impl SyncMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DropCreate => "drop_create",
            Self::UpdateDiff => "update_diff",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "drop_create" => Some(Self::DropCreate),
            "update_diff" => Some(Self::UpdateDiff),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    #[serde(default)]
    pub id: MappingId,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub settings: IndexMap<String, SettingValue>,
    #[serde(default)]
    pub sync_mode: SyncMode,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub x_axis: Option<String>,
    #[serde(default)]
    pub y_axis: Option<String>,
    #[serde(default)]
    pub cells: Option<Vec<String>>,
    #[serde(default)]
    pub segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDataModel {
    pub description: String,
    pub layout: Layout,
    pub settings: IndexMap<String, SettingValue>,
    pub sync_mode: SyncMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub value: String,
    pub caption: String,
}

impl ListItem {
    pub fn new(value: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            caption: caption.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridColumn {
    pub field: String,
    #[serde(rename = "type", default)]
    pub column_type: String,
    #[serde(default)]
    pub header_name: String,
    #[serde(default = "default_column_width")]
    pub width: u32,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_value: Option<String>,
}

pub const DEFAULT_COLUMN_WIDTH: u32 = 150;

fn default_column_width() -> u32 {
    DEFAULT_COLUMN_WIDTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    #[serde(default)]
    pub grid_columns: Vec<GridColumn>,
    #[serde(default)]
    pub grid_rows: Vec<Row>,
    #[serde(default)]
    pub segments: Option<Vec<ListItem>>,
    #[serde(default)]
    pub current: Option<String>,
    #[serde(default)]
    pub allow_line_addition_and_removal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub model: DataModel,
    pub info: DataInfo,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub host: String,
    pub sql: String,
}

#[cfg(test)]
mod tests {
    use super::{EnvironsPayload, GridColumn, Layout, ProjectInfo, SyncMode, find_mapping};

    #[test]
    fn flat_environs_are_grouped_in_first_seen_order() {
        let payload: EnvironsPayload = serde_json::from_str(
            r#"[
                {"id":"dev","group":"main","name":"Dev"},
                {"id":"qa","group":"test","name":"QA"},
                {"id":"stg","group":"main","name":"Staging"}
            ]"#,
        )
        .expect("flat mapping list");
        let trees = payload.into_trees();
        assert_eq!(trees.len(), 2);
        assert_eq!(trees[0].group, "main");
        assert_eq!(trees[0].children.len(), 2);
        assert_eq!(trees[1].children[0].id.as_str(), "qa");
        assert!(find_mapping(&trees, "stg").is_some());
        assert!(find_mapping(&trees, "prod").is_none());
    }

    #[test]
    fn grouped_environs_deserialize_as_trees() {
        let payload: EnvironsPayload = serde_json::from_str(
            r#"[{"group":"main","children":[{"id":"dev","name":"Dev","base":null}]}]"#,
        )
        .expect("grouped mapping list");
        assert!(matches!(payload, EnvironsPayload::Trees(_)));
    }

    #[test]
    fn project_rules_keep_declaration_order() {
        let info: ProjectInfo = serde_json::from_str(
            r#"{"projectName":"p","rules":{"^z":"1","^a":"2","^m":"3"}}"#,
        )
        .expect("project info");
        let keys: Vec<&str> = info.rules.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["^z", "^a", "^m"]);
    }

    #[test]
    fn grid_column_defaults_width_and_items() {
        let column: GridColumn =
            serde_json::from_str(r#"{"field":"name","type":"string","headerName":"Name"}"#)
                .expect("grid column");
        assert_eq!(column.width, 150);
        assert!(column.items.is_empty());
        assert!(!column.hide);
    }

    #[test]
    fn layout_and_sync_mode_use_wire_names() {
        assert_eq!(Layout::parse("matrix"), Some(Layout::Matrix));
        assert_eq!(SyncMode::UpdateDiff.as_str(), "update_diff");
        assert_eq!(
            serde_json::to_string(&SyncMode::DropCreate).expect("serialize"),
            "\"drop_create\""
        );
    }
}

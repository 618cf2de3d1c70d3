// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Column settings of a managed table.
//!
//! A saved setting is either a literal default-value encoding or a reference to
//! another managed table. On the wire it is a flat `SettingValue`; inside a form it
//! is one `FieldEntry` holding the select value and the width text. The
//! `FK:<id>/<instance>.<table>` string only exists as a select option value.

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::ids::TableRef;
use crate::model::{DataFilename, ListItem, ProjectInfo, SettingValue, Table};

pub const FK_MARKER: &str = "FK";
const FIELD_PREFIX: &str = "fields.";

pub type SettingsMap = IndexMap<String, SettingValue>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSetting {
    Literal(String),
    ForeignKey {
        id: String,
        instance: String,
        table: String,
    },
}

impl ColumnSetting {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Literal(value) if value.is_empty())
    }
}

impl fmt::Display for ColumnSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::ForeignKey {
                id,
                instance,
                table,
            } => write!(f, "{FK_MARKER}:{id}/{instance}.{table}"),
        }
    }
}

impl FromStr for ColumnSetting {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let Some(target) = value
            .strip_prefix(FK_MARKER)
            .and_then(|rest| rest.strip_prefix(':'))
        else {
            return Ok(Self::Literal(value.to_owned()));
        };
        let Some((id, table_ref)) = target.split_once('/') else {
            bail!("foreign key value {value:?} must look like {FK_MARKER}:<id>/<instance>.<table>");
        };
        let Some((instance, table)) = table_ref.split_once('.') else {
            bail!("foreign key value {value:?} must look like {FK_MARKER}:<id>/<instance>.<table>");
        };
        Ok(Self::ForeignKey {
            id: id.to_owned(),
            instance: instance.to_owned(),
            table: table.to_owned(),
        })
    }
}

/// Typed form of one saved column setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnConfig {
    pub setting: ColumnSetting,
    pub width: Option<u32>,
}

impl TryFrom<&SettingValue> for ColumnConfig {
    type Error = anyhow::Error;

    fn try_from(value: &SettingValue) -> Result<Self> {
        let setting = if value.setting_type == FK_MARKER {
            let has_target = value.instance.is_some() && value.table.is_some();
            if !has_target && value.id.is_none() {
                bail!("foreign key setting needs instance and table, or an id");
            }
            ColumnSetting::ForeignKey {
                id: value.id.clone().unwrap_or_default(),
                instance: value.instance.clone().unwrap_or_default(),
                table: value.table.clone().unwrap_or_default(),
            }
        } else {
            ColumnSetting::Literal(value.setting_type.clone())
        };
        Ok(Self {
            setting,
            width: value.width,
        })
    }
}

impl From<&ColumnConfig> for SettingValue {
    fn from(config: &ColumnConfig) -> Self {
        match &config.setting {
            ColumnSetting::Literal(value) => SettingValue {
                setting_type: value.clone(),
                width: config.width,
                ..SettingValue::default()
            },
            ColumnSetting::ForeignKey {
                id,
                instance,
                table,
            } => SettingValue {
                setting_type: FK_MARKER.to_owned(),
                id: non_empty(id),
                instance: non_empty(instance),
                table: non_empty(table),
                width: config.width,
            },
        }
    }
}

/// A foreign key may name only an id or only a table; absent parts stay absent.
fn non_empty(part: &str) -> Option<String> {
    (!part.is_empty()).then(|| part.to_owned())
}

/// Compiled `rules` of a project, kept in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<(Regex, String)>,
}

impl RuleSet {
    pub fn compile(rules: &IndexMap<String, String>) -> Self {
        let rules = rules
            .iter()
            .filter_map(|(pattern, value)| match Regex::new(pattern) {
                Ok(regex) => Some((regex, value.clone())),
                Err(error) => {
                    warn!(pattern = %pattern, %error, "skipping invalid column rule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn first_match(&self, column: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(regex, _)| regex.is_match(column))
            .map(|(_, value)| value.as_str())
    }
}

/// Display-ready description of one column's settings field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSettings {
    pub key: String,
    pub label: String,
    pub name: String,
    pub def_value: String,
    pub width: String,
}

pub fn field_name(column: &str) -> String {
    format!("{FIELD_PREFIX}{column}")
}

/// Strips the `fields.` form prefix, if present.
pub fn column_of(name: &str) -> &str {
    name.strip_prefix(FIELD_PREFIX).unwrap_or(name)
}

fn saved_config(column: &str, settings: Option<&SettingsMap>) -> Option<ColumnConfig> {
    let saved = settings?.get(column)?;
    match ColumnConfig::try_from(saved) {
        Ok(config) => Some(config),
        Err(error) => {
            warn!(column, %error, "ignoring malformed saved setting");
            None
        }
    }
}

/// Saved setting first, then the first matching rule, then empty.
pub fn resolve_default(column: &str, settings: Option<&SettingsMap>, rules: &RuleSet) -> String {
    if let Some(config) = saved_config(column, settings) {
        return config.setting.to_string();
    }
    rules.first_match(column).unwrap_or_default().to_owned()
}

pub fn resolve_width(column: &str, settings: Option<&SettingsMap>) -> String {
    saved_config(column, settings)
        .and_then(|config| config.width)
        .map(|width| width.to_string())
        .unwrap_or_default()
}

pub fn build_fields(
    project: &ProjectInfo,
    table: &Table,
    settings: Option<&SettingsMap>,
) -> Vec<ColumnSettings> {
    let rules = RuleSet::compile(&project.rules);
    table
        .fields
        .iter()
        .map(|field| ColumnSettings {
            key: field.column_name.clone(),
            label: field.label().to_owned(),
            name: field_name(&field.column_name),
            def_value: resolve_default(&field.column_name, settings, &rules),
            width: resolve_width(&field.column_name, settings),
        })
        .collect()
}

/// Select options for a column setting: bindings, then reference tables by caption.
pub fn field_items(project: &ProjectInfo, refs: &[DataFilename]) -> Vec<ListItem> {
    let mut items: Vec<ListItem> = project
        .bindings
        .iter()
        .map(|(name, binding)| {
            ListItem::new(name, binding.value.clone().unwrap_or_else(|| name.clone()))
        })
        .collect();

    let mut references: Vec<ListItem> = refs
        .iter()
        .map(|data| {
            let id = data.id.as_ref().map(|id| id.as_str()).unwrap_or_default();
            let id_name = data.id_name.as_deref().unwrap_or(id);
            let setting = ColumnSetting::ForeignKey {
                id: id.to_owned(),
                instance: data.instance.clone(),
                table: data.table_name.clone(),
            };
            ListItem::new(
                setting.to_string(),
                format!(
                    "{id_name}/{}.{} ({})",
                    data.instance, data.table_name, data.display_name
                ),
            )
        })
        .collect();
    references.sort_by(|a, b| a.caption.cmp(&b.caption));
    items.extend(references);
    items
}

/// One column's pair of form inputs: the setting value and its width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldEntry {
    pub value: String,
    pub width: String,
}

/// Registered `fields.<column>` entries of the data-settings form.
#[derive(Debug, Clone, Default)]
pub struct SettingsForm {
    entries: IndexMap<String, FieldEntry>,
}

impl SettingsForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, column: &str, entry: FieldEntry) {
        self.entries.insert(column.to_owned(), entry);
    }

    pub fn unregister(&mut self, column: &str) -> Option<FieldEntry> {
        self.entries.shift_remove(column)
    }

    pub fn is_registered(&self, column: &str) -> bool {
        self.entries.contains_key(column)
    }

    pub fn entry(&self, column: &str) -> Option<&FieldEntry> {
        self.entries.get(column)
    }

    pub fn set_value(&mut self, column: &str, value: &str) -> Result<()> {
        let entry = self
            .entries
            .get_mut(column)
            .with_context(|| format!("column {column:?} is not part of the settings form"))?;
        entry.value = value.to_owned();
        Ok(())
    }

    pub fn set_width(&mut self, column: &str, width: &str) -> Result<()> {
        let entry = self
            .entries
            .get_mut(column)
            .with_context(|| format!("column {column:?} is not part of the settings form"))?;
        entry.width = width.to_owned();
        Ok(())
    }

    pub fn field_names(&self) -> Vec<String> {
        self.entries.keys().map(|column| field_name(column)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds the whole settings map from the current entries.
    pub fn decode(&self) -> Result<SettingsMap> {
        let mut settings = SettingsMap::new();
        for (column, entry) in &self.entries {
            if entry.value.is_empty() && entry.width.is_empty() {
                continue;
            }
            let setting: ColumnSetting = entry
                .value
                .parse()
                .with_context(|| format!("decode setting for column {column:?}"))?;
            let width = entry.width.trim().parse::<u32>().ok();
            settings.insert(column.clone(), SettingValue::from(&ColumnConfig { setting, width }));
        }
        Ok(settings)
    }
}

/// Keeps the settings form in step with the table it describes.
#[derive(Debug, Clone, Default)]
pub struct SettingsResolver {
    columns: Vec<ColumnSettings>,
    form: SettingsForm,
}

impl SettingsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[ColumnSettings] {
        &self.columns
    }

    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SettingsForm {
        &mut self.form
    }

    /// Fetches `instance.table` and rebuilds the fields; an empty reference is ignored.
    pub fn retrieve_table_info(
        &mut self,
        backend: &mut impl Backend,
        project: &ProjectInfo,
        table_ref: &str,
        settings: Option<&SettingsMap>,
    ) -> Result<&[ColumnSettings]> {
        if table_ref.is_empty() {
            return Ok(&self.columns);
        }
        let table_ref: TableRef = table_ref.parse()?;
        let table = backend
            .table(&table_ref)
            .with_context(|| format!("load schema of {table_ref}"))?;
        self.setup_field(project, &table, settings);
        Ok(&self.columns)
    }

    /// Same as `retrieve_table_info` for an already loaded schema.
    pub fn setup_field(
        &mut self,
        project: &ProjectInfo,
        table: &Table,
        settings: Option<&SettingsMap>,
    ) -> &[ColumnSettings] {
        let fields = build_fields(project, table, settings);
        self.reset_fields(fields);
        &self.columns
    }

    fn reset_fields(&mut self, fields: Vec<ColumnSettings>) {
        for column in &self.columns {
            self.form.unregister(&column.key);
        }
        for column in &fields {
            self.form.register(
                &column.key,
                FieldEntry {
                    value: column.def_value.clone(),
                    width: column.width.clone(),
                },
            );
        }
        debug!(
            previous = self.columns.len(),
            registered = fields.len(),
            "settings fields reset"
        );
        self.columns = fields;
    }

    pub fn decode(&self) -> Result<SettingsMap> {
        self.form.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ColumnConfig, ColumnSetting, FieldEntry, RuleSet, SettingsForm, SettingsMap,
        resolve_default,
    };
    use crate::model::SettingValue;
    use indexmap::IndexMap;

    fn fk_setting() -> SettingValue {
        SettingValue {
            setting_type: "FK".to_owned(),
            id: Some("7".to_owned()),
            instance: Some("db1".to_owned()),
            table: Some("categories".to_owned()),
            width: None,
        }
    }

    #[test]
    fn foreign_key_encodes_with_colon_and_slash() {
        let config = ColumnConfig::try_from(&fk_setting()).expect("valid fk");
        assert_eq!(config.setting.to_string(), "FK:7/db1.categories");
    }

    #[test]
    fn literal_values_parse_verbatim() {
        let parsed: ColumnSetting = "now()".parse().expect("literal");
        assert_eq!(parsed, ColumnSetting::Literal("now()".to_owned()));
        let prefixed: ColumnSetting = "FKEY".parse().expect("literal");
        assert_eq!(prefixed, ColumnSetting::Literal("FKEY".to_owned()));
    }

    #[test]
    fn malformed_foreign_key_is_rejected() {
        assert!("FK:7-db1-categories".parse::<ColumnSetting>().is_err());
        assert!("FK:7/categories".parse::<ColumnSetting>().is_err());
    }

    #[test]
    fn foreign_key_without_target_is_invalid() {
        let value = SettingValue {
            setting_type: "FK".to_owned(),
            ..SettingValue::default()
        };
        assert!(ColumnConfig::try_from(&value).is_err());
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut rules = IndexMap::new();
        rules.insert("_at$".to_owned(), "now".to_owned());
        rules.insert("^created".to_owned(), "never".to_owned());
        let rules = RuleSet::compile(&rules);
        assert_eq!(resolve_default("created_at", None, &rules), "now");
        assert_eq!(resolve_default("created_by", None, &rules), "never");
        assert_eq!(resolve_default("name", None, &rules), "");
    }

    #[test]
    fn invalid_rule_is_skipped() {
        let mut rules = IndexMap::new();
        rules.insert("([".to_owned(), "broken".to_owned());
        rules.insert("name".to_owned(), "ok".to_owned());
        let rules = RuleSet::compile(&rules);
        assert_eq!(rules.first_match("name"), Some("ok"));
    }

    #[test]
    fn saved_setting_beats_rules() {
        let mut rules = IndexMap::new();
        rules.insert("^status$".to_owned(), "draft".to_owned());
        let rules = RuleSet::compile(&rules);
        let mut settings = SettingsMap::new();
        settings.insert("status".to_owned(), fk_setting());
        assert_eq!(
            resolve_default("status", Some(&settings), &rules),
            "FK:7/db1.categories"
        );
    }

    #[test]
    fn decode_skips_fully_empty_entries_and_reads_width() {
        let mut form = SettingsForm::new();
        form.register("id", FieldEntry::default());
        form.register(
            "name",
            FieldEntry {
                value: String::new(),
                width: "200".to_owned(),
            },
        );
        form.register(
            "status",
            FieldEntry {
                value: "draft".to_owned(),
                width: "wide".to_owned(),
            },
        );

        let settings = form.decode().expect("decode");
        assert!(!settings.contains_key("id"));
        assert_eq!(settings["name"].width, Some(200));
        assert_eq!(settings["name"].setting_type, "");
        assert_eq!(settings["status"].setting_type, "draft");
        assert_eq!(settings["status"].width, None);
    }
}

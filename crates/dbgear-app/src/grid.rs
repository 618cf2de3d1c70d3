// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Editing session over one managed table's rows.
//!
//! Rows stay in memory until `save`; removals are tombstoned in place so the
//! backend sees them as deletions in the saved row array.

use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{Backend, FillAssistant, FillRequest};
use crate::ids::{MappingId, TableRef};
use crate::model::{Data, DataModel, GridColumn, ImportRequest, ListItem, Row, Table};
use crate::notice::{Notice, Notifier};

pub const ACTION_KEY: &str = "_action";
pub const DELETE_ACTION: &str = "delete";
pub const DEFAULT_PAGE_SIZE: usize = 100;
const ROW_ID_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Loaded,
    Editing,
    Saving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMethod {
    Single,
    Multiple,
    Ai,
}

impl FillMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Ai => "ai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "single" => Some(Self::Single),
            "multiple" => Some(Self::Multiple),
            "ai" => Some(Self::Ai),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortModel {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistedFill {
    pub reply: Option<String>,
    pub column: Option<String>,
    pub filled: usize,
}

/// Key the grid uses to identify a row.
pub fn row_key(row: &Row) -> Option<String> {
    match row.get(ROW_ID_KEY)? {
        Value::Null => None,
        Value::String(value) => Some(value.clone()),
        other => Some(other.to_string()),
    }
}

pub fn is_tombstoned(row: &Row) -> bool {
    row.get(ACTION_KEY).and_then(Value::as_str) == Some(DELETE_ACTION)
}

fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
    }
}

struct Target {
    id: MappingId,
    table: TableRef,
}

pub struct GridController {
    target: Option<Target>,
    state: EditorState,
    model: Option<DataModel>,
    table: Option<Table>,
    columns: Vec<GridColumn>,
    rows: Vec<Row>,
    selection: BTreeSet<String>,
    sort: Option<SortModel>,
    page: usize,
    page_size: usize,
    all_columns: bool,
    segments: Option<Vec<ListItem>>,
    segment: Option<String>,
    allow_line_changes: bool,
    notifier: Option<Arc<dyn Notifier>>,
}

impl Default for GridController {
    fn default() -> Self {
        Self {
            target: None,
            state: EditorState::Idle,
            model: None,
            table: None,
            columns: Vec::new(),
            rows: Vec::new(),
            selection: BTreeSet::new(),
            sort: None,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            all_columns: false,
            segments: None,
            segment: None,
            allow_line_changes: false,
            notifier: None,
        }
    }
}

impl GridController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn model(&self) -> Option<&DataModel> {
        self.model.as_ref()
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn columns(&self) -> &[GridColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn segments(&self) -> Option<&[ListItem]> {
        self.segments.as_deref()
    }

    pub fn segment(&self) -> Option<&str> {
        self.segment.as_deref()
    }

    pub fn allows_line_changes(&self) -> bool {
        self.allow_line_changes
    }

    pub fn all_columns(&self) -> bool {
        self.all_columns
    }

    fn notify(&self, notice: Notice) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(notice);
        }
    }

    fn target(&self) -> Result<&Target> {
        self.target
            .as_ref()
            .ok_or_else(|| anyhow!("no table is open -- load a table before editing"))
    }

    fn ensure_line_changes(&self, action: &str) -> Result<()> {
        if !self.allow_line_changes {
            bail!("{action} is not available for this table layout");
        }
        Ok(())
    }

    pub fn load(
        &mut self,
        backend: &mut impl Backend,
        id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
    ) -> Result<()> {
        let data = backend
            .data(id, table, segment)
            .with_context(|| format!("load data of {table} in {id}"))?;
        self.target = Some(Target {
            id: id.clone(),
            table: table.clone(),
        });
        self.apply_data(data, segment);
        Ok(())
    }

    pub fn reload(&mut self, backend: &mut impl Backend) -> Result<()> {
        let target = self.target()?;
        let (id, table) = (target.id.clone(), target.table.clone());
        let segment = self.segment.clone();
        self.load(backend, &id, &table, segment.as_deref())
    }

    fn apply_data(&mut self, data: Data, requested_segment: Option<&str>) {
        let Data { model, info, table } = data;
        self.columns = info.grid_columns;
        self.rows = info.grid_rows;
        self.segments = info.segments;
        self.segment = info
            .current
            .or_else(|| requested_segment.map(str::to_owned));
        self.allow_line_changes = info.allow_line_addition_and_removal;
        self.model = Some(model);
        self.table = Some(table);
        self.selection.clear();
        self.page = 0;
        self.state = EditorState::Loaded;
        info!(
            rows = self.rows.len(),
            columns = self.columns.len(),
            segment = ?self.segment,
            "grid loaded"
        );
    }

    /// Fetches a server-initialised row, selects it, and pages to it.
    pub fn append(&mut self, backend: &mut impl Backend) -> Result<Option<String>> {
        self.ensure_line_changes("appending rows")?;
        let target = self.target()?;
        let row = backend
            .new_row(&target.id, &target.table)
            .context("fetch a new row template")?;
        let key = row_key(&row);
        self.rows.push(row);
        if let Some(key) = &key {
            self.selection.clear();
            self.selection.insert(key.clone());
        }
        self.page = self.page_count().saturating_sub(1);
        self.state = EditorState::Editing;
        debug!(key = ?key, "row appended");
        Ok(key)
    }

    /// Tombstones every selected row; returns how many were marked.
    pub fn remove(&mut self) -> Result<usize> {
        self.ensure_line_changes("removing rows")?;
        self.target()?;
        let mut marked = 0;
        for row in &mut self.rows {
            let selected = row_key(row).is_some_and(|key| self.selection.contains(&key));
            if selected {
                row.insert(ACTION_KEY.to_owned(), Value::String(DELETE_ACTION.to_owned()));
                marked += 1;
            }
        }
        if marked > 0 {
            self.state = EditorState::Editing;
        }
        debug!(marked, "rows marked for removal");
        Ok(marked)
    }

    /// Sends the rows in sorted order; on failure the grid keeps its rows.
    pub fn save(&mut self, backend: &mut impl Backend) -> Result<usize> {
        let target = self.target()?;
        let (id, table) = (target.id.clone(), target.table.clone());
        let rows: Vec<Row> = self.sorted_rows().into_iter().cloned().collect();
        self.state = EditorState::Saving;
        match backend.save_rows(&id, &table, self.segment.as_deref(), &rows) {
            Ok(()) => {
                self.state = EditorState::Loaded;
                self.notify(Notice::success(format!("saved {} rows to {table}", rows.len())));
                info!(rows = rows.len(), %table, "rows saved");
                Ok(rows.len())
            }
            Err(error) => {
                self.state = EditorState::Editing;
                warn!(%error, %table, "saving rows failed");
                Err(error.context(format!("save rows of {table}")))
            }
        }
    }

    fn field_for(&self, column: &str) -> Option<String> {
        self.columns
            .iter()
            .find(|candidate| candidate.field == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|candidate| candidate.header_name == column)
            })
            .map(|candidate| candidate.field.clone())
    }

    fn sorted_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.rows.len()).collect();
        if let Some(sort) = &self.sort {
            indices.sort_by(|&a, &b| {
                let ordering = compare_values(
                    self.rows[a].get(&sort.column),
                    self.rows[b].get(&sort.column),
                );
                match sort.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });
        }
        indices
    }

    /// Sorted positions of rows not marked for removal; fills only touch these.
    fn live_indices(&self) -> Vec<usize> {
        self.sorted_indices()
            .into_iter()
            .filter(|&index| !is_tombstoned(&self.rows[index]))
            .collect()
    }

    pub fn sorted_rows(&self) -> Vec<&Row> {
        self.sorted_indices()
            .into_iter()
            .map(|index| &self.rows[index])
            .collect()
    }

    pub fn sort_by(&mut self, sort: Option<SortModel>) {
        self.sort = sort;
    }

    /// `single` writes `value` into every row; `multiple` writes one line per row in
    /// sorted order, leaving rows past the last line untouched. Rows marked for
    /// removal are skipped.
    pub fn fill_data(&mut self, method: FillMethod, column: &str, value: &str) -> Result<usize> {
        self.target()?;
        let field = self
            .field_for(column)
            .ok_or_else(|| anyhow!("unknown column {column:?} -- pick one of the grid columns"))?;
        let order = self.live_indices();
        let filled = match method {
            FillMethod::Single => {
                for &index in &order {
                    self.rows[index].insert(field.clone(), Value::String(value.to_owned()));
                }
                order.len()
            }
            FillMethod::Multiple => {
                let lines: Vec<&str> = value
                    .trim_end_matches(['\r', '\n'])
                    .split('\n')
                    .map(|line| line.trim_end_matches('\r'))
                    .collect();
                let mut filled = 0;
                for (&index, line) in order.iter().zip(lines) {
                    self.rows[index].insert(field.clone(), Value::String(line.to_owned()));
                    filled += 1;
                }
                filled
            }
            FillMethod::Ai => bail!("ai fill needs an assistant -- use fill_with_assistant"),
        };
        if filled > 0 {
            self.state = EditorState::Editing;
        }
        debug!(column = %field, method = method.as_str(), filled, "column filled");
        Ok(filled)
    }

    /// Asks the assistant for values and applies them line by line when it proposes some.
    pub fn fill_with_assistant(
        &mut self,
        assistant: &mut dyn FillAssistant,
        instruction: &str,
    ) -> Result<AssistedFill> {
        self.target()?;
        let suggestion = assistant.suggest(&FillRequest {
            columns: &self.columns,
            row_count: self.rows.iter().filter(|row| !is_tombstoned(row)).count(),
            instruction,
        })?;
        let (column, filled) = match (suggestion.column, suggestion.value) {
            (Some(column), Some(value)) => {
                let filled = self.fill_data(FillMethod::Multiple, &column, &value)?;
                (Some(column), filled)
            }
            _ => (None, 0),
        };
        Ok(AssistedFill {
            reply: suggestion.reply,
            column,
            filled,
        })
    }

    pub fn set_cell(&mut self, key: &str, column: &str, value: Value) -> Result<()> {
        let editable = self
            .columns
            .iter()
            .find(|candidate| candidate.field == column)
            .map(|candidate| candidate.editable)
            .ok_or_else(|| anyhow!("unknown column {column:?}"))?;
        if !editable {
            bail!("column {column:?} is read-only");
        }
        let row = self
            .rows
            .iter_mut()
            .find(|row| row_key(row).as_deref() == Some(key))
            .ok_or_else(|| anyhow!("no row with id {key:?}"))?;
        row.insert(column.to_owned(), value);
        self.state = EditorState::Editing;
        Ok(())
    }

    pub fn select(&mut self, key: &str) -> bool {
        let exists = self
            .rows
            .iter()
            .any(|row| row_key(row).as_deref() == Some(key));
        if exists {
            self.selection.insert(key.to_owned());
        }
        exists
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn toggle_columns(&mut self) -> bool {
        self.all_columns = !self.all_columns;
        self.all_columns
    }

    /// Field -> visible; only hidden columns appear, and nothing when all are shown.
    pub fn column_visibility_model(&self) -> IndexMap<String, bool> {
        if self.all_columns {
            return IndexMap::new();
        }
        self.columns
            .iter()
            .filter(|column| column.hide)
            .map(|column| (column.field.clone(), false))
            .collect()
    }

    pub fn visible_columns(&self) -> Vec<&GridColumn> {
        let model = self.column_visibility_model();
        self.columns
            .iter()
            .filter(|column| model.get(&column.field).copied().unwrap_or(true))
            .collect()
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.rows.len().div_ceil(self.page_size).max(1)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count() - 1);
    }

    pub fn page_rows(&self) -> Vec<&Row> {
        self.sorted_rows()
            .into_iter()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .collect()
    }

    /// Reloads the grid scoped to another segment.
    pub fn switch_segment(&mut self, backend: &mut impl Backend, segment: &str) -> Result<()> {
        let known = self
            .segments
            .as_ref()
            .ok_or_else(|| anyhow!("this table is not segmented"))?
            .iter()
            .any(|item| item.value == segment);
        if !known {
            bail!("unknown segment {segment:?}");
        }
        let target = self.target()?;
        let (id, table) = (target.id.clone(), target.table.clone());
        self.load(backend, &id, &table, Some(segment))
    }

    /// Runs an SQL import on the backend, then reloads the current segment.
    pub fn import_sql(&mut self, backend: &mut impl Backend, host: &str, sql: &str) -> Result<()> {
        self.ensure_line_changes("importing rows")?;
        if sql.trim().is_empty() {
            bail!("import SQL is empty -- enter a SELECT statement and retry");
        }
        let target = self.target()?;
        let (id, table) = (target.id.clone(), target.table.clone());
        let request = ImportRequest {
            host: host.to_owned(),
            sql: sql.to_owned(),
        };
        backend
            .import_sql(&id, &table, self.segment.as_deref(), &request)
            .with_context(|| format!("import rows into {table}"))?;
        self.notify(Notice::success(format!("imported rows into {table}")));
        self.reload(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::{compare_values, is_tombstoned, row_key};
    use crate::model::Row;
    use serde_json::{Value, json};
    use std::cmp::Ordering;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn row_key_accepts_numbers_and_strings() {
        assert_eq!(row_key(&row(json!({"id": 3}))), Some("3".to_owned()));
        assert_eq!(row_key(&row(json!({"id": "a1"}))), Some("a1".to_owned()));
        assert_eq!(row_key(&row(json!({"id": null}))), None);
        assert_eq!(row_key(&row(json!({"name": "x"}))), None);
    }

    #[test]
    fn tombstone_is_detected() {
        assert!(is_tombstoned(&row(json!({"id": 1, "_action": "delete"}))));
        assert!(!is_tombstoned(&row(json!({"id": 1}))));
    }

    #[test]
    fn values_compare_numerically_and_nulls_first() {
        assert_eq!(
            compare_values(Some(&json!(2)), Some(&json!(10))),
            Ordering::Less
        );
        assert_eq!(compare_values(None, Some(&json!("a"))), Ordering::Less);
        assert_eq!(
            compare_values(Some(&json!("b")), Some(&json!("a"))),
            Ordering::Greater
        );
    }
}

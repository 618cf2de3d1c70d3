// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use dbgear_app::{
    AssistedFill, Backend, CancelToken, ColumnSettings, DataFilename, DataSettingsFormInput,
    DataTab, EnvironFormInput, FillAssistant, FillMethod, GridController, MappingId, Notice,
    NoticeLog, Notifier, ProjectInfo, ProjectStore, Route, SettingsResolver, Table, TableRef,
};
use std::sync::Arc;
use tracing::info;

/// One user session: project store, settings resolver, and grid over a backend.
pub struct Session<B: Backend> {
    backend: B,
    store: ProjectStore,
    resolver: SettingsResolver,
    grid: GridController,
    notices: Arc<NoticeLog>,
    view: CancelToken,
    show_all_columns: bool,
}

impl<B: Backend> Session<B> {
    /// Shares `notices` with the grid so backend and editor notices land in one log.
    pub fn with_notices(
        backend: B,
        notices: Arc<NoticeLog>,
        page_size: usize,
        show_all_columns: bool,
    ) -> Self {
        let grid = GridController::new()
            .with_page_size(page_size)
            .with_notifier(notices.clone());
        let mut session = Self {
            backend,
            store: ProjectStore::new(),
            resolver: SettingsResolver::new(),
            grid,
            notices,
            view: CancelToken::new(),
            show_all_columns,
        };
        session
            .backend
            .set_cancel_token(Some(session.view.clone()));
        session
    }

    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    pub fn grid(&self) -> &GridController {
        &self.grid
    }

    pub fn resolver(&self) -> &SettingsResolver {
        &self.resolver
    }

    pub fn notices(&self) -> &Arc<NoticeLog> {
        &self.notices
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn bootstrap(&mut self) -> Result<()> {
        self.store.update_project_info(&mut self.backend)?;
        self.store.update_environs(&mut self.backend)?;
        Ok(())
    }

    fn project(&self) -> Result<&ProjectInfo> {
        self.store
            .project_info()
            .ok_or_else(|| anyhow!("project info is not loaded -- call bootstrap first"))
    }

    /// Cancels everything the previous view started and hands out a fresh token.
    fn enter_view(&mut self) {
        self.view.cancel();
        self.view = CancelToken::new();
        self.backend.set_cancel_token(Some(self.view.clone()));
    }

    /// Moves to `path`: derives the menu state, refreshes the environment's
    /// table list, and opens the table editor when the path names one.
    pub fn navigate(&mut self, path: &str) -> Result<Route> {
        let route = Route::parse(path).ok_or_else(|| {
            anyhow!("unrecognised path {path:?} -- use /environs/<id>/<instance>/<table>/_data")
        })?;
        self.enter_view();
        self.store.set_current_path(path);
        let mapping = route.environ_id().cloned();
        self.store
            .update_data_list(&mut self.backend, mapping.as_ref())?;

        if let Route::Table { id, table, tab } = &route {
            self.grid.load(&mut self.backend, id, table, None)?;
            if self.show_all_columns != self.grid.all_columns() {
                self.grid.toggle_columns();
            }
            if *tab == DataTab::Props {
                let project = self.project()?.clone();
                let settings = self.grid.model().map(|model| model.settings.clone());
                let schema = self
                    .grid
                    .table()
                    .cloned()
                    .ok_or_else(|| anyhow!("no schema returned for {table}"))?;
                self.resolver
                    .setup_field(&project, &schema, settings.as_ref());
            }
        }
        info!(path, "navigated");
        Ok(route)
    }

    pub fn data_list(&mut self, id: &MappingId) -> Result<&[DataFilename]> {
        self.store.update_data_list(&mut self.backend, Some(id))?;
        Ok(self.store.data_list())
    }

    pub fn candidates(&mut self, id: &MappingId) -> Result<Vec<DataFilename>> {
        self.backend.init_tables(id)
    }

    pub fn schema(&mut self, table: &TableRef) -> Result<Table> {
        self.backend.table(table)
    }

    /// Column defaults for `table` in environment `id`; saved settings apply when
    /// the table is already bound there.
    pub fn resolve_settings(
        &mut self,
        id: &MappingId,
        table: &TableRef,
    ) -> Result<&[ColumnSettings]> {
        let project = self.project()?.clone();
        let bound = self
            .data_list(id)?
            .iter()
            .any(|item| item.table_ref() == *table);
        if bound {
            let data = self.backend.data(id, table, None)?;
            self.resolver
                .setup_field(&project, &data.table, Some(&data.model.settings));
            return Ok(self.resolver.columns());
        }
        self.resolver
            .retrieve_table_info(&mut self.backend, &project, &table.to_string(), None)
    }

    fn ensure_table_open(&self) -> Result<()> {
        if self.grid.model().is_none() {
            bail!("no table is open -- navigate to /environs/<id>/<instance>/<table>/_data first");
        }
        Ok(())
    }

    pub fn fill(
        &mut self,
        method: FillMethod,
        column: &str,
        value: &str,
        assistant: Option<&mut dyn FillAssistant>,
    ) -> Result<AssistedFill> {
        self.ensure_table_open()?;
        if method == FillMethod::Ai {
            let assistant = assistant.ok_or_else(|| {
                anyhow!("ai fill needs the assistant -- set [llm] enabled = true in the config")
            })?;
            let instruction = if column.is_empty() {
                value.to_owned()
            } else {
                format!("{value} (column: {column})")
            };
            return self.grid.fill_with_assistant(assistant, &instruction);
        }
        let filled = self.grid.fill_data(method, column, value)?;
        Ok(AssistedFill {
            reply: None,
            column: Some(column.to_owned()),
            filled,
        })
    }

    pub fn append(&mut self) -> Result<Option<String>> {
        self.ensure_table_open()?;
        self.grid.append(&mut self.backend)
    }

    pub fn import(&mut self, host: &str, sql: &str, segment: Option<&str>) -> Result<()> {
        self.ensure_table_open()?;
        if let Some(segment) = segment
            && self.grid.segment() != Some(segment)
        {
            self.grid.switch_segment(&mut self.backend, segment)?;
        }
        self.grid.import_sql(&mut self.backend, host, sql)
    }

    pub fn save(&mut self) -> Result<usize> {
        self.ensure_table_open()?;
        self.grid.save(&mut self.backend)
    }

    /// Binds `input.table` to environment `id` with the settings currently in the
    /// resolver's form, then refetches the store.
    pub fn submit_settings(
        &mut self,
        id: &MappingId,
        input: DataSettingsFormInput,
    ) -> Result<TableRef> {
        if self.resolver.columns().is_empty() {
            bail!("no settings form is loaded -- resolve the table's settings first");
        }
        let settings = self.resolver.decode()?;
        let (table, model) = input.into_data_model(settings)?;
        self.backend
            .create_data_model(id, &table, &model)
            .with_context(|| format!("bind {table} to {id}"))?;
        self.notices
            .notify(Notice::success(format!("saved settings of {table} in {id}")));
        info!(%id, %table, columns = model.settings.len(), "data settings saved");
        self.refetch(Some(id))?;
        Ok(table)
    }

    /// Creates or updates an environment, then refetches the store.
    pub fn save_environ(&mut self, input: EnvironFormInput) -> Result<MappingId> {
        let (id, mapping) = input.into_mapping()?;
        self.backend
            .save_mapping(&id, &mapping)
            .with_context(|| format!("save environment {id}"))?;
        self.notices
            .notify(Notice::success(format!("saved environment {id}")));
        info!(%id, "environment saved");
        let current = self.store.route().and_then(Route::environ_id).cloned();
        self.refetch(current.as_ref())?;
        Ok(id)
    }

    /// Drops everything the store holds and loads it again after a write.
    fn refetch(&mut self, mapping: Option<&MappingId>) -> Result<()> {
        self.store.invalidate();
        self.bootstrap()?;
        self.store.update_data_list(&mut self.backend, mapping)?;
        Ok(())
    }
}

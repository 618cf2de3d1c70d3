// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::ids::{MappingId, TableRef};
use crate::model::{
    Data, DataFilename, GridColumn, ImportRequest, MappingTree, NewDataModel, NewMapping,
    ProjectInfo, Row, Table,
};

/// REST surface the client-side state is built from.
pub trait Backend {
    fn project_info(&mut self) -> Result<ProjectInfo>;
    fn environs(&mut self) -> Result<Vec<MappingTree>>;
    fn save_mapping(&mut self, id: &MappingId, mapping: &NewMapping) -> Result<()>;
    fn data_list(&mut self, id: &MappingId) -> Result<Vec<DataFilename>>;
    fn init_tables(&mut self, id: &MappingId) -> Result<Vec<DataFilename>>;
    fn refs(&mut self) -> Result<Vec<DataFilename>>;
    fn table(&mut self, table: &TableRef) -> Result<Table>;
    fn update_table(&mut self, table: &Table) -> Result<()>;
    fn create_data_model(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        model: &NewDataModel,
    ) -> Result<()>;
    fn data(&mut self, id: &MappingId, table: &TableRef, segment: Option<&str>) -> Result<Data>;
    fn save_rows(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
        rows: &[Row],
    ) -> Result<()>;
    fn new_row(&mut self, id: &MappingId, table: &TableRef) -> Result<Row>;
    fn import_sql(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
        request: &ImportRequest,
    ) -> Result<()>;

    /// Ties later calls to a view; once the token is cancelled their results are dropped.
    fn set_cancel_token(&mut self, _token: Option<CancelToken>) {}
}

#[derive(Debug, Clone, Copy)]
pub struct FillRequest<'a> {
    pub columns: &'a [GridColumn],
    pub row_count: usize,
    pub instruction: &'a str,
}

/// What the assistant proposed; `column`/`value` are set only when it called `setData`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FillSuggestion {
    pub reply: Option<String>,
    pub column: Option<String>,
    pub value: Option<String>,
}

/// Generates column values for the chat-assisted fill.
pub trait FillAssistant {
    fn suggest(&mut self, request: &FillRequest<'_>) -> Result<FillSuggestion>;
}

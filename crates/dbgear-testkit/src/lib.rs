// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use dbgear_app::{
    Backend, Binding, CancelToken, Data, DataFilename, DataInfo, DataModel, Field, GridColumn, ImportRequest,
    Index, Layout, ListItem, Mapping, MappingId, MappingTree, NewDataModel, NewMapping,
    ProjectInfo, Row, SettingValue, Table, TableRef,
};
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Response, Server};

const FIRST_NAMES: [&str; 16] = [
    "Avery", "Jordan", "Taylor", "Riley", "Morgan", "Casey", "Alex", "Quinn", "Parker", "Drew",
    "Kai", "Elliot", "Robin", "Cameron", "Hayden", "Rowan",
];
const LAST_NAMES: [&str; 12] = [
    "Walker", "Martin", "Hill", "Evans", "Lopez", "Gray", "Ward", "Young", "Diaz", "Reed",
    "Turner", "Brooks",
];
const STATUSES: [&str; 3] = ["draft", "active", "retired"];
const FIXTURE_TIMESTAMP: &str = "2026-01-15 09:30:00";

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator for `users` table rows.
#[derive(Debug, Clone)]
pub struct RowFaker {
    rng: DeterministicRng,
}

impl RowFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    fn pick<'a>(&mut self, values: &[&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }

    pub fn user_row(&mut self, id: u64) -> Row {
        let first = self.pick(&FIRST_NAMES);
        let last = self.pick(&LAST_NAMES);
        let status = self.pick(&STATUSES);
        let mut row = Row::new();
        row.insert("id".to_owned(), json!(id));
        row.insert("name".to_owned(), json!(format!("{first} {last}")));
        row.insert(
            "email".to_owned(),
            json!(format!(
                "{}.{}@example.com",
                first.to_lowercase(),
                last.to_lowercase()
            )),
        );
        row.insert("status".to_owned(), json!(status));
        row.insert("created_at".to_owned(), json!(FIXTURE_TIMESTAMP));
        row
    }

    pub fn user_rows(&mut self, count: usize) -> Vec<Row> {
        (1..=count as u64).map(|id| self.user_row(id)).collect()
    }
}

pub fn project_info() -> ProjectInfo {
    let mut rules = IndexMap::new();
    rules.insert("^status$".to_owned(), "'draft'".to_owned());
    rules.insert("_at$".to_owned(), "now".to_owned());
    rules.insert("^(created|updated)_".to_owned(), "never-wins".to_owned());

    let mut bindings = IndexMap::new();
    bindings.insert(
        "now".to_owned(),
        Binding {
            binding_type: "function".to_owned(),
            value: Some("current timestamp".to_owned()),
            items: Vec::new(),
        },
    );
    bindings.insert(
        "uuid".to_owned(),
        Binding {
            binding_type: "function".to_owned(),
            value: Some("random uuid".to_owned()),
            items: Vec::new(),
        },
    );

    ProjectInfo {
        project_name: "inventory".to_owned(),
        description: "inventory service schema".to_owned(),
        instances: vec!["main".to_owned(), "audit".to_owned()],
        rules,
        bindings,
    }
}

pub fn mapping(id: &str, group: &str, name: &str) -> Mapping {
    Mapping {
        id: MappingId::new(id),
        group: group.to_owned(),
        base: None,
        name: name.to_owned(),
        description: String::new(),
        instances: vec!["main".to_owned()],
        deployment: false,
    }
}

pub fn environs() -> Vec<MappingTree> {
    vec![
        MappingTree {
            group: "main".to_owned(),
            children: vec![mapping("dev", "main", "Development"), {
                let mut staging = mapping("stg", "main", "Staging");
                staging.base = Some(MappingId::new("dev"));
                staging.deployment = true;
                staging
            }],
        },
        MappingTree {
            group: "test".to_owned(),
            children: vec![mapping("qa", "test", "QA")],
        },
    ]
}

pub fn users_ref() -> TableRef {
    TableRef::new("main", "users")
}

pub fn users_table() -> Table {
    let mut id = Field::new("id", "bigint");
    id.nullable = false;
    id.primary_key = Some(1);
    let mut name = Field::new("name", "varchar(100)");
    name.display_name = Some("Name".to_owned());
    let email = Field::new("email", "varchar(200)");
    let mut status = Field::new("status", "varchar(20)");
    status.display_name = Some("Status".to_owned());
    let created_at = Field::new("created_at", "datetime");
    Table {
        instance: "main".to_owned(),
        table_name: "users".to_owned(),
        display_name: Some("Users".to_owned()),
        fields: vec![id, name, email, status, created_at],
        indexes: vec![Index {
            index_name: "ix_users_email".to_owned(),
            columns: vec!["email".to_owned()],
        }],
    }
}

pub fn users_listing(id: &str) -> DataFilename {
    DataFilename {
        instance: "main".to_owned(),
        table_name: "users".to_owned(),
        display_name: "Users".to_owned(),
        id: Some(MappingId::new(id)),
        id_name: Some(id.to_owned()),
    }
}

pub fn refs() -> Vec<DataFilename> {
    vec![
        DataFilename {
            instance: "main".to_owned(),
            table_name: "roles".to_owned(),
            display_name: "Roles".to_owned(),
            id: Some(MappingId::new("dev")),
            id_name: Some("Development".to_owned()),
        },
        DataFilename {
            instance: "audit".to_owned(),
            table_name: "actors".to_owned(),
            display_name: "Actors".to_owned(),
            id: Some(MappingId::new("dev")),
            id_name: Some("Development".to_owned()),
        },
    ]
}

pub fn grid_column(field: &str, header: &str) -> GridColumn {
    GridColumn {
        field: field.to_owned(),
        column_type: "string".to_owned(),
        header_name: header.to_owned(),
        width: dbgear_app::DEFAULT_COLUMN_WIDTH,
        editable: true,
        hide: false,
        items: Vec::new(),
        fixed_value: None,
        call_value: None,
    }
}

pub fn users_columns() -> Vec<GridColumn> {
    let mut id = grid_column("id", "id");
    id.editable = false;
    let mut created_at = grid_column("created_at", "created_at");
    created_at.hide = true;
    vec![
        id,
        grid_column("name", "Name"),
        grid_column("email", "email"),
        grid_column("status", "Status"),
        created_at,
    ]
}

/// `main.users` data with `rows` seeded rows.
pub fn users_data(id: &str, rows: usize, allow_line_changes: bool) -> Data {
    let mut settings = IndexMap::new();
    settings.insert(
        "status".to_owned(),
        SettingValue {
            setting_type: "'draft'".to_owned(),
            ..SettingValue::default()
        },
    );
    Data {
        model: DataModel {
            id: MappingId::new(id),
            instance: "main".to_owned(),
            table_name: "users".to_owned(),
            layout: Layout::Table,
            settings,
            ..DataModel::default()
        },
        info: DataInfo {
            grid_columns: users_columns(),
            grid_rows: RowFaker::new(7).user_rows(rows),
            segments: None,
            current: None,
            allow_line_addition_and_removal: allow_line_changes,
        },
        table: users_table(),
    }
}

/// Marks `data` as split into the given segments, `current` selected.
pub fn segmented(mut data: Data, segments: &[&str], current: &str) -> Data {
    data.info.segments = Some(
        segments
            .iter()
            .map(|segment| ListItem::new(*segment, segment.to_uppercase()))
            .collect(),
    );
    data.info.current = Some(current.to_owned());
    data
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ProjectInfo,
    Environs,
    SaveMapping(MappingId),
    DataList(MappingId),
    InitTables(MappingId),
    Refs,
    Table(TableRef),
    UpdateTable(String),
    CreateDataModel(MappingId, TableRef),
    Data {
        table: TableRef,
        segment: Option<String>,
    },
    SaveRows {
        table: TableRef,
        segment: Option<String>,
        rows: usize,
    },
    NewRow(TableRef),
    ImportSql {
        table: TableRef,
        segment: Option<String>,
    },
}

/// In-memory `Backend` that records calls and fails on request.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    pub project: ProjectInfo,
    pub environs: Vec<MappingTree>,
    pub data_lists: BTreeMap<MappingId, Vec<DataFilename>>,
    pub refs: Vec<DataFilename>,
    pub tables: BTreeMap<String, Table>,
    pub data: BTreeMap<String, Data>,
    pub saved_rows: Vec<Vec<Row>>,
    pub saved_mappings: Vec<(MappingId, NewMapping)>,
    pub created_models: Vec<(MappingId, TableRef, NewDataModel)>,
    pub updated_tables: Vec<Table>,
    pub imports: Vec<ImportRequest>,
    pub calls: Vec<Call>,
    failing: BTreeSet<&'static str>,
    cancel: Option<CancelToken>,
    next_row_id: u64,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// Seeded with the `inventory` project and `main.users` in `dev`.
    pub fn new() -> Self {
        let mut data_lists = BTreeMap::new();
        data_lists.insert(MappingId::new("dev"), vec![users_listing("dev")]);
        data_lists.insert(MappingId::new("qa"), Vec::new());
        let mut tables = BTreeMap::new();
        tables.insert(users_ref().to_string(), users_table());
        let mut data = BTreeMap::new();
        data.insert(users_ref().to_string(), users_data("dev", 3, true));
        Self {
            project: project_info(),
            environs: environs(),
            data_lists,
            refs: refs(),
            tables,
            data,
            saved_rows: Vec::new(),
            saved_mappings: Vec::new(),
            created_models: Vec::new(),
            updated_tables: Vec::new(),
            imports: Vec::new(),
            calls: Vec::new(),
            failing: BTreeSet::new(),
            cancel: None,
            next_row_id: 1000,
        }
    }

    pub fn with_data(mut self, table: &TableRef, data: Data) -> Self {
        self.data.insert(table.to_string(), data);
        self
    }

    /// Makes every later call of `operation` fail until `recover` is called.
    pub fn fail_on(&mut self, operation: &'static str) {
        self.failing.insert(operation);
    }

    pub fn recover(&mut self, operation: &'static str) {
        self.failing.remove(operation);
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    fn record(&mut self, operation: &'static str, call: Call) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            bail!("{operation} cancelled");
        }
        self.calls.push(call);
        if self.failing.contains(operation) {
            bail!("{operation} failed: backend unavailable");
        }
        Ok(())
    }
}

impl Backend for FakeBackend {
    fn project_info(&mut self) -> Result<ProjectInfo> {
        self.record("project_info", Call::ProjectInfo)?;
        Ok(self.project.clone())
    }

    fn environs(&mut self) -> Result<Vec<MappingTree>> {
        self.record("environs", Call::Environs)?;
        Ok(self.environs.clone())
    }

    fn save_mapping(&mut self, id: &MappingId, mapping: &NewMapping) -> Result<()> {
        self.record("save_mapping", Call::SaveMapping(id.clone()))?;
        self.saved_mappings.push((id.clone(), mapping.clone()));
        Ok(())
    }

    fn data_list(&mut self, id: &MappingId) -> Result<Vec<DataFilename>> {
        self.record("data_list", Call::DataList(id.clone()))?;
        Ok(self.data_lists.get(id).cloned().unwrap_or_default())
    }

    fn init_tables(&mut self, id: &MappingId) -> Result<Vec<DataFilename>> {
        self.record("init_tables", Call::InitTables(id.clone()))?;
        let listed: BTreeSet<String> = self
            .data_lists
            .get(id)
            .map(|list| list.iter().map(|item| item.table_ref().to_string()).collect())
            .unwrap_or_default();
        Ok(self
            .tables
            .values()
            .filter(|table| !listed.contains(&format!("{}.{}", table.instance, table.table_name)))
            .map(|table| DataFilename {
                instance: table.instance.clone(),
                table_name: table.table_name.clone(),
                display_name: table.label().to_owned(),
                id: Some(id.clone()),
                id_name: None,
            })
            .collect())
    }

    fn refs(&mut self) -> Result<Vec<DataFilename>> {
        self.record("refs", Call::Refs)?;
        Ok(self.refs.clone())
    }

    fn table(&mut self, table: &TableRef) -> Result<Table> {
        self.record("table", Call::Table(table.clone()))?;
        self.tables
            .get(&table.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("table {table} not found"))
    }

    fn update_table(&mut self, table: &Table) -> Result<()> {
        let key = format!("{}.{}", table.instance, table.table_name);
        self.record("update_table", Call::UpdateTable(key.clone()))?;
        self.tables.insert(key, table.clone());
        self.updated_tables.push(table.clone());
        Ok(())
    }

    fn create_data_model(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        model: &NewDataModel,
    ) -> Result<()> {
        self.record(
            "create_data_model",
            Call::CreateDataModel(id.clone(), table.clone()),
        )?;
        self.created_models
            .push((id.clone(), table.clone(), model.clone()));
        Ok(())
    }

    fn data(&mut self, _id: &MappingId, table: &TableRef, segment: Option<&str>) -> Result<Data> {
        self.record(
            "data",
            Call::Data {
                table: table.clone(),
                segment: segment.map(str::to_owned),
            },
        )?;
        let mut data = self
            .data
            .get(&table.to_string())
            .cloned()
            .ok_or_else(|| anyhow!("no data for {table}"))?;
        if data.info.segments.is_some() {
            if let Some(segment) = segment {
                data.info.current = Some(segment.to_owned());
            }
        }
        Ok(data)
    }

    fn save_rows(
        &mut self,
        _id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
        rows: &[Row],
    ) -> Result<()> {
        self.record(
            "save_rows",
            Call::SaveRows {
                table: table.clone(),
                segment: segment.map(str::to_owned),
                rows: rows.len(),
            },
        )?;
        self.saved_rows.push(rows.to_vec());
        Ok(())
    }

    fn new_row(&mut self, _id: &MappingId, table: &TableRef) -> Result<Row> {
        self.record("new_row", Call::NewRow(table.clone()))?;
        self.next_row_id += 1;
        let mut row = Row::new();
        row.insert("id".to_owned(), json!(self.next_row_id));
        row.insert("status".to_owned(), json!("draft"));
        Ok(row)
    }

    fn import_sql(
        &mut self,
        _id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
        request: &ImportRequest,
    ) -> Result<()> {
        self.record(
            "import_sql",
            Call::ImportSql {
                table: table.clone(),
                segment: segment.map(str::to_owned),
            },
        )?;
        self.imports.push(request.clone());
        Ok(())
    }

    fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.cancel = token;
    }
}

/// Wraps `data` in the backend's `{status, message, data}` envelope.
pub fn envelope(data: Value) -> String {
    json!({"status": "OK", "message": null, "data": data}).to_string()
}

pub fn failure_envelope(status: &str, message: &str) -> String {
    json!({"status": status, "message": message, "data": null}).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// HTTP server that answers exactly `count` requests, then stops.
pub struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub fn serve<F>(count: usize, handler: F) -> Result<Self>
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + 'static,
    {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for _ in 0..count {
                let Ok(mut request) = server.recv() else {
                    return;
                };
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let authorization = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Authorization"))
                    .map(|header| header.value.as_str().to_owned());
                let seen = RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_owned(),
                    body,
                    authorization,
                };
                let reply = handler(&seen);
                if let Ok(mut log) = recorded.lock() {
                    log.push(seen);
                }
                let mut response =
                    Response::from_string(reply.body).with_status_code(reply.status);
                if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        Ok(Self {
            base_url,
            requests,
            handle,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for the server thread and returns the requests it saw.
    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock server thread panicked"))?;
        let requests = self
            .requests
            .lock()
            .map_err(|_| anyhow!("mock request log poisoned"))?;
        Ok(requests.clone())
    }
}

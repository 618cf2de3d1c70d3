// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking client for the dbgear REST backend.
//!
//! Every response is wrapped as `{status, message, data}`; anything but
//! `status == "OK"` is an application failure. Failures are reported to the
//! notifier and returned; nothing is retried.

mod error;

pub use error::ClientError;

use anyhow::{Context, Result, bail};
use dbgear_app::{
    Backend, CancelToken, Data, DataFilename, EnvironsPayload, ImportRequest, LoadingFlag,
    MappingId, MappingTree, NewDataModel, NewMapping, Notice, Notifier, ProjectInfo, Row, Table,
    TableRef,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const STATUS_OK: &str = "OK";
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, serde::Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

impl Envelope {
    fn status_text(&self) -> String {
        match &self.status {
            Value::String(status) => status.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status_text() == STATUS_OK
    }
}

#[derive(Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    http: HttpClient,
    loading: LoadingFlag,
    notifier: Option<Arc<dyn Notifier>>,
    cancel: Option<CancelToken>,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("parse server.base_url {trimmed:?}"))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(trimmed.to_owned()).into());
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
            loading: LoadingFlag::new(),
            notifier: None,
            cancel: None,
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_loading_flag(mut self, loading: LoadingFlag) -> Self {
        self.loading = loading;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn loading(&self) -> &LoadingFlag {
        &self.loading
    }

    fn endpoint(&self, path: &[&str], segment: Option<&str>) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(path);
        if let Some(segment) = segment {
            url.query_pairs_mut().append_pair("segment", segment);
        }
        Ok(url)
    }

    pub fn get<T: DeserializeOwned>(
        &self,
        path: &[&str],
        segment: Option<&str>,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path, segment)?;
        self.execute(self.http.get(url.clone()), &url)
    }

    pub fn post<B, T>(&self, path: &[&str], segment: Option<&str>, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path, segment)?;
        self.execute(self.http.post(url.clone()).json(body), &url)
    }

    pub fn put<B, T>(&self, path: &[&str], segment: Option<&str>, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path, segment)?;
        self.execute(self.http.put(url.clone()).json(body), &url)
    }

    fn check_cancelled(&self) -> Result<(), ClientError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ClientError::Cancelled),
            _ => Ok(()),
        }
    }

    fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, ClientError> {
        self.check_cancelled()?;
        let mut loading = self.loading.begin();
        debug!(%url, "sending request");
        let outcome = self.round_trip(request, url);
        loading.finish();

        if let Err(error) = &outcome {
            if error.is_reportable() {
                warn!(%url, %error, "request failed");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(Notice::error(error.to_string()));
                }
            } else {
                debug!(%url, "dropping response of cancelled request");
            }
        }
        outcome
    }

    fn round_trip<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, ClientError> {
        let response = request.send().map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = response.status();
        let body = response.text().map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;
        self.check_cancelled()?;

        let envelope = serde_json::from_str::<Envelope>(&body);
        if !status.is_success() {
            return Err(match envelope {
                Ok(envelope) if !envelope.is_ok() => application_error(envelope, status),
                _ => http_error(status, &body),
            });
        }

        let envelope = envelope.map_err(|source| ClientError::Decode {
            what: format!("response envelope from {}", url.path()),
            source,
        })?;
        if !envelope.is_ok() {
            return Err(application_error(envelope, status));
        }
        serde_json::from_value(envelope.data).map_err(|source| ClientError::Decode {
            what: format!("response data from {}", url.path()),
            source,
        })
    }
}

fn application_error(envelope: Envelope, status: StatusCode) -> ClientError {
    let code = envelope.status_text();
    let message = envelope
        .message
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));
    ClientError::Application {
        status: code,
        message,
    }
}

fn http_error(status: StatusCode, body: &str) -> ClientError {
    let body = body.trim();
    let body = if body.is_empty() {
        status.canonical_reason().unwrap_or("no response body").to_owned()
    } else if body.chars().count() > MAX_ERROR_BODY {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    } else {
        body.to_owned()
    };
    ClientError::Http {
        status: status.as_u16(),
        body,
    }
}

fn table_path<'a>(id: &'a MappingId, table: &'a TableRef) -> [&'a str; 5] {
    [
        "environs",
        id.as_str(),
        "tables",
        table.instance.as_str(),
        table.table.as_str(),
    ]
}

impl Backend for Client {
    fn project_info(&mut self) -> Result<ProjectInfo> {
        Ok(self.get(&["project"], None)?)
    }

    fn environs(&mut self) -> Result<Vec<MappingTree>> {
        let payload: EnvironsPayload = self.get(&["environs"], None)?;
        Ok(payload.into_trees())
    }

    fn save_mapping(&mut self, id: &MappingId, mapping: &NewMapping) -> Result<()> {
        let _: Value = self.post(&["environs", id.as_str()], None, mapping)?;
        Ok(())
    }

    fn data_list(&mut self, id: &MappingId) -> Result<Vec<DataFilename>> {
        Ok(self.get(&["environs", id.as_str(), "tables"], None)?)
    }

    fn init_tables(&mut self, id: &MappingId) -> Result<Vec<DataFilename>> {
        Ok(self.get(&["environs", id.as_str(), "init"], None)?)
    }

    fn refs(&mut self) -> Result<Vec<DataFilename>> {
        Ok(self.get(&["refs"], None)?)
    }

    fn table(&mut self, table: &TableRef) -> Result<Table> {
        Ok(self.get(&["tables", table.instance.as_str(), table.table.as_str()], None)?)
    }

    fn update_table(&mut self, table: &Table) -> Result<()> {
        let path = [
            "schemas",
            table.instance.as_str(),
            "tables",
            table.table_name.as_str(),
        ];
        let _: Value = self.put(&path, None, table)?;
        Ok(())
    }

    fn create_data_model(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        model: &NewDataModel,
    ) -> Result<()> {
        let _: Value = self.post(&table_path(id, table), None, model)?;
        Ok(())
    }

    fn data(&mut self, id: &MappingId, table: &TableRef, segment: Option<&str>) -> Result<Data> {
        Ok(self.get(&table_path(id, table), segment)?)
    }

    fn save_rows(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
        rows: &[Row],
    ) -> Result<()> {
        let _: Value = self.put(&table_path(id, table), segment, rows)?;
        Ok(())
    }

    fn new_row(&mut self, id: &MappingId, table: &TableRef) -> Result<Row> {
        let [environs, id, tables, instance, name] = table_path(id, table);
        Ok(self.get(&[environs, id, tables, instance, name, "row"], None)?)
    }

    fn import_sql(
        &mut self,
        id: &MappingId,
        table: &TableRef,
        segment: Option<&str>,
        request: &ImportRequest,
    ) -> Result<()> {
        let [environs, id, tables, instance, name] = table_path(id, table);
        let _: Value = self.post(
            &[environs, id, tables, instance, name, "import"],
            segment,
            request,
        )?;
        Ok(())
    }

    /// Once `token` is cancelled, calls fail with `ClientError::Cancelled` and
    /// responses still in flight are discarded.
    fn set_cancel_token(&mut self, token: Option<CancelToken>) {
        self.cancel = token;
    }
}

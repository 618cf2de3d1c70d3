// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use dbgear_app::{
    Backend, CancelToken, GridController, ImportRequest, Layout, MappingId, NewDataModel,
    NewMapping, NoticeLevel, NoticeLog, ProjectStore, SettingValue, SettingsMap, SyncMode,
};
use dbgear_client::{Client, ClientError};
use dbgear_testkit::{
    MockResponse, MockServer, envelope, failure_envelope, project_info, users_data, users_ref,
    users_table,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn client(server: &MockServer) -> Result<Client> {
    Client::new(server.base_url(), Duration::from_secs(2))
}

#[test]
fn project_info_unwraps_envelope() -> Result<()> {
    let body = envelope(serde_json::to_value(project_info())?);
    let server = MockServer::serve(1, move |_| MockResponse::ok(body.clone()))?;
    let mut client = client(&server)?;

    let info = client.project_info()?;
    assert_eq!(info.project_name, "inventory");
    assert_eq!(
        info.rules.keys().next().map(String::as_str),
        Some("^status$")
    );

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/project");
    Ok(())
}

#[test]
fn flat_environs_are_grouped() -> Result<()> {
    let body = envelope(json!([
        {"id": "dev", "group": "main", "name": "Dev"},
        {"id": "qa", "group": "test", "name": "QA"},
        {"id": "stg", "group": "main", "name": "Staging", "base": "dev"}
    ]));
    let server = MockServer::serve(1, move |_| MockResponse::ok(body.clone()))?;
    let mut client = client(&server)?;

    let trees = client.environs()?;
    assert_eq!(trees.len(), 2);
    assert_eq!(trees[0].children.len(), 2);
    assert_eq!(
        trees[0].children[1].base.as_ref().map(MappingId::as_str),
        Some("dev")
    );
    server.finish()?;
    Ok(())
}

#[test]
fn application_failure_is_reported_and_returned() -> Result<()> {
    let server = MockServer::serve(1, |_| {
        MockResponse::ok(failure_envelope("NOT_FOUND", "environment dev is missing"))
    })?;
    let log = Arc::new(NoticeLog::new());
    let mut client = client(&server)?.with_notifier(log.clone());

    let error = client
        .data_list(&MappingId::new("dev"))
        .expect_err("non-OK status must fail");
    let client_error = error
        .downcast_ref::<ClientError>()
        .expect("client error at the root");
    assert!(matches!(
        client_error,
        ClientError::Application { status, .. } if status == "NOT_FOUND"
    ));

    let notices = log.drain();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(notices[0].message.contains("environment dev is missing"));
    assert!(!client.loading().is_loading());
    server.finish()?;
    Ok(())
}

#[test]
fn http_failure_without_envelope_is_transport_level() -> Result<()> {
    let server = MockServer::serve(1, |_| MockResponse::status(502, "bad gateway"))?;
    let mut client = client(&server)?;

    let error = client.refs().expect_err("502 must fail");
    assert!(matches!(
        error.downcast_ref::<ClientError>(),
        Some(ClientError::Http { status: 502, .. })
    ));
    server.finish()?;
    Ok(())
}

#[test]
fn unreachable_server_names_the_fix() -> Result<()> {
    let mut client = Client::new("http://127.0.0.1:1", Duration::from_millis(100))?;
    let error = client.project_info().expect_err("nothing listens on port 1");
    assert!(error.to_string().contains("dbgear server is running"));
    assert!(!client.loading().is_loading());
    Ok(())
}

#[test]
fn cancelled_token_skips_the_request() -> Result<()> {
    let log = Arc::new(NoticeLog::new());
    let mut client =
        Client::new("http://127.0.0.1:1", Duration::from_millis(100))?.with_notifier(log.clone());
    let token = CancelToken::new();
    client.set_cancel_token(Some(token.clone()));
    token.cancel();

    let error = client.environs().expect_err("cancelled");
    assert!(matches!(
        error.downcast_ref::<ClientError>(),
        Some(ClientError::Cancelled)
    ));
    assert!(log.drain().is_empty());
    Ok(())
}

#[test]
fn grid_round_trip_uses_table_endpoints() -> Result<()> {
    let data = envelope(serde_json::to_value(users_data("dev", 2, true))?);
    let server = MockServer::serve(3, move |request| match request.method.as_str() {
        "GET" if request.url.ends_with("/row") => {
            MockResponse::ok(envelope(json!({"id": 77, "status": "draft"})))
        }
        "GET" => MockResponse::ok(data.clone()),
        _ => MockResponse::ok(envelope(Value::Null)),
    })?;
    let mut client = client(&server)?;

    let mut grid = GridController::new();
    grid.load(&mut client, &MappingId::new("dev"), &users_ref(), None)?;
    grid.append(&mut client)?;
    grid.save(&mut client)?;

    let requests = server.finish()?;
    let urls: Vec<(&str, &str)> = requests
        .iter()
        .map(|request| (request.method.as_str(), request.url.as_str()))
        .collect();
    assert_eq!(
        urls,
        vec![
            ("GET", "/environs/dev/tables/main/users"),
            ("GET", "/environs/dev/tables/main/users/row"),
            ("PUT", "/environs/dev/tables/main/users"),
        ]
    );
    let sent: Vec<Value> = serde_json::from_str(&requests[2].body)?;
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[2]["id"], json!(77));
    Ok(())
}

#[test]
fn import_posts_host_and_sql_with_segment() -> Result<()> {
    let server = MockServer::serve(1, |_| MockResponse::ok(envelope(Value::Null)))?;
    let mut client = client(&server)?;
    client.import_sql(
        &MappingId::new("dev"),
        &users_ref(),
        Some("east"),
        &ImportRequest {
            host: "db.internal".to_owned(),
            sql: "select * from users".to_owned(),
        },
    )?;

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(
        requests[0].url,
        "/environs/dev/tables/main/users/import?segment=east"
    );
    let body: Value = serde_json::from_str(&requests[0].body)?;
    assert_eq!(body, json!({"host": "db.internal", "sql": "select * from users"}));
    Ok(())
}

#[test]
fn store_refreshes_refs_with_data_list() -> Result<()> {
    let server = MockServer::serve(2, |request| {
        if request.url == "/refs" {
            MockResponse::ok(envelope(json!([
                {"instance": "main", "tableName": "roles", "displayName": "Roles", "id": "dev"}
            ])))
        } else {
            MockResponse::ok(envelope(json!([
                {"instance": "main", "tableName": "users", "displayName": "Users"}
            ])))
        }
    })?;
    let mut client = client(&server)?;
    let mut store = ProjectStore::new();
    store.update_data_list(&mut client, Some(&MappingId::new("dev")))?;

    assert_eq!(store.refs().len(), 1);
    assert_eq!(store.data_list()[0].table_name, "users");
    let requests = server.finish()?;
    assert_eq!(requests[1].url, "/environs/dev/tables");
    Ok(())
}

#[test]
fn save_mapping_posts_environment_body() -> Result<()> {
    let server = MockServer::serve(1, |_| MockResponse::ok(envelope(Value::Null)))?;
    let mut client = client(&server)?;
    client.save_mapping(
        &MappingId::new("uat"),
        &NewMapping {
            base: Some(MappingId::new("dev")),
            name: "UAT".to_owned(),
            instances: vec!["main".to_owned()],
            description: "acceptance".to_owned(),
            deployment: true,
        },
    )?;

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "/environs/uat");
    let body: Value = serde_json::from_str(&requests[0].body)?;
    assert_eq!(
        body,
        json!({
            "base": "dev",
            "name": "UAT",
            "instances": ["main"],
            "description": "acceptance",
            "deployment": true
        })
    );
    Ok(())
}

#[test]
fn create_data_model_posts_settings_under_table_path() -> Result<()> {
    let server = MockServer::serve(1, |_| MockResponse::ok(envelope(Value::Null)))?;
    let mut client = client(&server)?;
    let mut settings = SettingsMap::new();
    settings.insert(
        "status".to_owned(),
        SettingValue {
            setting_type: "'draft'".to_owned(),
            ..SettingValue::default()
        },
    );
    settings.insert(
        "role_id".to_owned(),
        SettingValue {
            setting_type: "FK".to_owned(),
            table: Some("roles".to_owned()),
            width: Some(120),
            ..SettingValue::default()
        },
    );
    client.create_data_model(
        &MappingId::new("dev"),
        &users_ref(),
        &NewDataModel {
            description: "seed users".to_owned(),
            layout: Layout::Table,
            settings,
            sync_mode: SyncMode::DropCreate,
            value: None,
            caption: None,
            x_axis: None,
            y_axis: None,
            cells: None,
        },
    )?;

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "/environs/dev/tables/main/users");
    let body: Value = serde_json::from_str(&requests[0].body)?;
    assert_eq!(body["layout"], json!("table"));
    assert_eq!(body["syncMode"], json!("drop_create"));
    assert_eq!(body["description"], json!("seed users"));
    assert_eq!(body["settings"]["status"], json!({"type": "'draft'"}));
    assert_eq!(
        body["settings"]["role_id"],
        json!({"type": "FK", "table": "roles", "width": 120})
    );
    assert!(body.get("xAxis").is_none());
    Ok(())
}

#[test]
fn update_table_puts_schema_path() -> Result<()> {
    let server = MockServer::serve(1, |_| MockResponse::ok(envelope(Value::Null)))?;
    let mut client = client(&server)?;
    client.update_table(&users_table())?;

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].url, "/schemas/main/tables/users");
    let body: Value = serde_json::from_str(&requests[0].body)?;
    assert_eq!(body["tableName"], json!("users"));
    assert_eq!(body["fields"].as_array().map(Vec::len), Some(5));
    Ok(())
}

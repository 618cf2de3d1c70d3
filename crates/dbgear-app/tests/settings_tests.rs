// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use dbgear_app::{
    DataSettingsFormInput, Field, Layout, SettingValue, SettingsMap, SettingsResolver, SyncMode,
    Table, field_items,
};
use dbgear_testkit::{Call, FakeBackend, project_info, refs, users_ref};
use indexmap::IndexMap;

fn status_table() -> Table {
    Table {
        instance: "db1".to_owned(),
        table_name: "items".to_owned(),
        display_name: None,
        fields: vec![Field::new("status", "varchar(20)")],
        indexes: Vec::new(),
    }
}

#[test]
fn rule_supplies_default_without_saved_setting() {
    let mut project = project_info();
    project.rules = IndexMap::from([("^status$".to_owned(), "draft".to_owned())]);

    let mut resolver = SettingsResolver::new();
    let columns = resolver.setup_field(&project, &status_table(), None);

    assert_eq!(columns.len(), 1);
    assert_eq!(columns[0].name, "fields.status");
    assert_eq!(columns[0].def_value, "draft");
}

#[test]
fn saved_foreign_key_round_trips_through_the_form() -> Result<()> {
    let saved = SettingValue {
        setting_type: "FK".to_owned(),
        id: Some("7".to_owned()),
        instance: Some("db1".to_owned()),
        table: Some("categories".to_owned()),
        width: None,
    };
    let settings: SettingsMap = IndexMap::from([("status".to_owned(), saved.clone())]);

    let mut resolver = SettingsResolver::new();
    let columns = resolver.setup_field(&project_info(), &status_table(), Some(&settings));
    assert_eq!(columns[0].def_value, "FK:7/db1.categories");

    let decoded = resolver.decode()?;
    assert_eq!(decoded.get("status"), Some(&saved));
    Ok(())
}

#[test]
fn partial_foreign_keys_keep_absent_parts_absent() -> Result<()> {
    let table = Table {
        fields: vec![
            Field::new("owner_id", "bigint"),
            Field::new("category_id", "bigint"),
        ],
        ..status_table()
    };
    let settings: SettingsMap = IndexMap::from([
        (
            "owner_id".to_owned(),
            SettingValue {
                setting_type: "FK".to_owned(),
                id: Some("7".to_owned()),
                ..SettingValue::default()
            },
        ),
        (
            "category_id".to_owned(),
            SettingValue {
                setting_type: "FK".to_owned(),
                instance: Some("db1".to_owned()),
                table: Some("categories".to_owned()),
                width: Some(80),
                ..SettingValue::default()
            },
        ),
    ]);

    let mut resolver = SettingsResolver::new();
    resolver.setup_field(&project_info(), &table, Some(&settings));
    assert_eq!(resolver.decode()?, settings);

    let resaved = resolver.decode()?;
    resolver.setup_field(&project_info(), &table, Some(&resaved));
    assert_eq!(resolver.decode()?, settings);
    Ok(())
}

#[test]
fn saved_setting_beats_matching_rule() -> Result<()> {
    let settings: SettingsMap = IndexMap::from([(
        "status".to_owned(),
        SettingValue {
            setting_type: "active".to_owned(),
            width: Some(120),
            ..SettingValue::default()
        },
    )]);
    let mut resolver = SettingsResolver::new();
    resolver.setup_field(&project_info(), &status_table(), Some(&settings));

    let entry = resolver.form().entry("status").expect("status entry");
    assert_eq!(entry.value, "active");
    assert_eq!(entry.width, "120");
    assert_eq!(resolver.decode()?, settings);
    Ok(())
}

#[test]
fn retrieving_twice_registers_the_same_fields() -> Result<()> {
    let mut backend = FakeBackend::new();
    let project = project_info();
    let mut resolver = SettingsResolver::new();
    let table = users_ref().to_string();

    let first = resolver
        .retrieve_table_info(&mut backend, &project, &table, None)?
        .to_vec();
    let names = resolver.form().field_names();
    let second = resolver
        .retrieve_table_info(&mut backend, &project, &table, None)?
        .to_vec();

    assert_eq!(first, second);
    assert_eq!(resolver.form().field_names(), names);
    assert_eq!(resolver.form().len(), 5);
    Ok(())
}

#[test]
fn switching_tables_unregisters_stale_fields() -> Result<()> {
    let mut backend = FakeBackend::new();
    let project = project_info();
    let mut resolver = SettingsResolver::new();
    resolver.retrieve_table_info(&mut backend, &project, &users_ref().to_string(), None)?;
    assert!(resolver.form().is_registered("email"));

    resolver.setup_field(&project, &status_table(), None);
    assert!(!resolver.form().is_registered("email"));
    assert_eq!(resolver.form().field_names(), vec!["fields.status".to_owned()]);
    Ok(())
}

#[test]
fn empty_table_reference_skips_fetch() -> Result<()> {
    let mut backend = FakeBackend::new();
    let mut resolver = SettingsResolver::new();
    let columns = resolver.retrieve_table_info(&mut backend, &project_info(), "", None)?;
    assert!(columns.is_empty());
    assert_eq!(backend.count(|call| matches!(call, Call::Table(_))), 0);
    Ok(())
}

#[test]
fn first_matching_rule_wins_in_order() {
    let mut resolver = SettingsResolver::new();
    let mut table = status_table();
    table.fields = vec![Field::new("created_at", "datetime")];
    let columns = resolver.setup_field(&project_info(), &table, None);
    assert_eq!(columns[0].def_value, "now");
}

#[test]
fn field_items_list_bindings_then_sorted_references() {
    let items = field_items(&project_info(), &refs());
    let values: Vec<&str> = items.iter().map(|item| item.value.as_str()).collect();
    assert_eq!(
        values,
        vec![
            "now",
            "uuid",
            "FK:dev/audit.actors",
            "FK:dev/main.roles",
        ]
    );
    assert_eq!(items[2].caption, "Development/audit.actors (Actors)");
}

#[test]
fn settings_form_submits_new_data_model() -> Result<()> {
    let mut backend = FakeBackend::new();
    let project = project_info();
    let mut resolver = SettingsResolver::new();
    resolver.retrieve_table_info(&mut backend, &project, "main.users", None)?;
    resolver.form_mut().set_value("name", "FK:dev/main.roles")?;
    resolver.form_mut().set_width("name", "240")?;

    let input = DataSettingsFormInput {
        table: "main.users".to_owned(),
        description: "seed users".to_owned(),
        sync_mode: SyncMode::UpdateDiff,
        value: "fields.id".to_owned(),
        caption: "fields.name".to_owned(),
        layout: Layout::Table,
        x_axis: String::new(),
        y_axis: String::new(),
        cells: Vec::new(),
    };
    let (table, model) = input.into_data_model(resolver.decode()?)?;
    assert_eq!(table, users_ref());
    assert_eq!(model.value.as_deref(), Some("id"));
    assert_eq!(model.caption.as_deref(), Some("name"));

    let name = model.settings.get("name").expect("name setting");
    assert_eq!(name.setting_type, "FK");
    assert_eq!(name.instance.as_deref(), Some("main"));
    assert_eq!(name.table.as_deref(), Some("roles"));
    assert_eq!(name.width, Some(240));
    assert_eq!(
        model.settings.get("status").map(|s| s.setting_type.as_str()),
        Some("'draft'")
    );
    Ok(())
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use dbgear_app::{MappingId, ProjectStore, Slot, StoreEvent};
use dbgear_testkit::{Call, FakeBackend, environs, project_info};

#[test]
fn path_before_environs_converges_with_environs_before_path() -> Result<()> {
    let mut backend = FakeBackend::new();

    let mut path_first = ProjectStore::new();
    assert!(path_first.set_current_path("/environs/stg").is_empty());
    path_first.update_environs(&mut backend)?;

    let mut environs_first = ProjectStore::new();
    environs_first.update_environs(&mut backend)?;
    environs_first.set_current_path("/environs/stg");

    assert_eq!(path_first.main_menu(), environs_first.main_menu());
    assert!(!path_first.main_menu());
    let left = path_first.current_mapping().map(|mapping| mapping.id.clone());
    let right = environs_first
        .current_mapping()
        .map(|mapping| mapping.id.clone());
    assert_eq!(left, right);
    assert_eq!(left, Some(MappingId::new("stg")));
    Ok(())
}

#[test]
fn two_segment_path_is_main_menu() -> Result<()> {
    let mut backend = FakeBackend::new();
    let mut store = ProjectStore::new();
    store.update_environs(&mut backend)?;

    let events = store.set_current_path("/add");
    assert_eq!(
        events,
        vec![StoreEvent::MenuChanged {
            main_menu: true,
            mapping: None
        }]
    );
    assert!(store.current_mapping().is_none());
    Ok(())
}

#[test]
fn unknown_mapping_degrades_to_no_selection() -> Result<()> {
    let mut backend = FakeBackend::new();
    let mut store = ProjectStore::new();
    store.update_environs(&mut backend)?;
    store.set_current_path("/environs/missing/main/users/_data");

    assert!(!store.main_menu());
    assert!(store.current_mapping().is_none());
    Ok(())
}

#[test]
fn update_data_list_without_id_keeps_previous_list() -> Result<()> {
    let mut backend = FakeBackend::new();
    let mut store = ProjectStore::new();
    store.update_data_list(&mut backend, Some(&MappingId::new("dev")))?;
    assert_eq!(store.data_list().len(), 1);
    assert_eq!(store.refs().len(), 2);

    let calls = backend.calls.len();
    let events = store.update_data_list(&mut backend, None)?;
    assert!(events.is_empty());
    assert_eq!(backend.calls.len(), calls);
    assert_eq!(store.data_list().len(), 1);
    Ok(())
}

#[test]
fn superseded_response_is_dropped() {
    let mut store = ProjectStore::new();
    let slow = store.begin(Slot::Environs);
    let fast = store.begin(Slot::Environs);

    let mut newer = environs();
    newer.truncate(1);
    store.apply_environs(fast, newer);
    let events = store.apply_environs(slow, environs());

    assert_eq!(events, vec![StoreEvent::StaleResponseDropped(Slot::Environs)]);
    assert_eq!(store.environs().len(), 1);
}

#[test]
fn invalidate_supersedes_in_flight_requests() {
    let mut store = ProjectStore::new();
    let ticket = store.begin(Slot::ProjectInfo);
    store.invalidate();

    let events = store.apply_project_info(ticket, project_info());
    assert_eq!(
        events,
        vec![StoreEvent::StaleResponseDropped(Slot::ProjectInfo)]
    );
    assert!(store.project_info().is_none());
}

#[test]
fn invalidate_clears_selected_mapping_until_environs_reload() -> Result<()> {
    let mut backend = FakeBackend::new();
    let mut store = ProjectStore::new();
    store.update_environs(&mut backend)?;
    store.set_current_path("/environs/stg");
    assert!(store.current_mapping().is_some());

    store.invalidate();
    assert!(store.current_mapping().is_none());
    assert!(store.main_menu());
    assert_eq!(store.current_path(), Some("/environs/stg"));

    store.update_environs(&mut backend)?;
    assert_eq!(
        store.current_mapping().map(|mapping| mapping.id.clone()),
        Some(MappingId::new("stg"))
    );
    assert!(!store.main_menu());
    Ok(())
}

#[test]
fn failed_fetch_leaves_state_untouched() -> Result<()> {
    let mut backend = FakeBackend::new();
    let mut store = ProjectStore::new();
    store.update_project_info(&mut backend)?;

    backend.fail_on("project_info");
    assert!(store.update_project_info(&mut backend).is_err());
    assert_eq!(
        store.project_info().map(|info| info.project_name.as_str()),
        Some("inventory")
    );
    assert_eq!(
        backend.count(|call| matches!(call, Call::ProjectInfo)),
        2
    );
    Ok(())
}

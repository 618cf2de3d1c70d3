// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use tracing::{debug, info};

use crate::backend::Backend;
use crate::cancel::{Sequence, Ticket};
use crate::ids::MappingId;
use crate::model::{DataFilename, Mapping, MappingTree, ProjectInfo};
use crate::route::{PathInfo, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    ProjectInfo,
    Environs,
    DataList,
    Refs,
}

impl Slot {
    const ALL: [Self; 4] = [Self::ProjectInfo, Self::Environs, Self::DataList, Self::Refs];

    const fn index(self) -> usize {
        match self {
            Self::ProjectInfo => 0,
            Self::Environs => 1,
            Self::DataList => 2,
            Self::Refs => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    ProjectInfoUpdated,
    EnvironsUpdated(usize),
    MenuChanged {
        main_menu: bool,
        mapping: Option<MappingId>,
    },
    DataListUpdated(usize),
    RefsUpdated(usize),
    StaleResponseDropped(Slot),
    Invalidated,
}

/// Project metadata, environments, and the selection derived from the current path.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    project_info: Option<ProjectInfo>,
    environs: Vec<MappingTree>,
    environs_loaded: bool,
    current_path: Option<String>,
    route: Option<Route>,
    current_mapping: Option<Mapping>,
    main_menu: bool,
    data_list: Vec<DataFilename>,
    refs: Vec<DataFilename>,
    sequences: [Sequence; 4],
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self {
            project_info: None,
            environs: Vec::new(),
            environs_loaded: false,
            current_path: None,
            route: None,
            current_mapping: None,
            main_menu: true,
            data_list: Vec::new(),
            refs: Vec::new(),
            sequences: Default::default(),
        }
    }
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_info(&self) -> Option<&ProjectInfo> {
        self.project_info.as_ref()
    }

    pub fn environs(&self) -> &[MappingTree] {
        &self.environs
    }

    pub fn current_path(&self) -> Option<&str> {
        self.current_path.as_deref()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn current_mapping(&self) -> Option<&Mapping> {
        self.current_mapping.as_ref()
    }

    pub fn main_menu(&self) -> bool {
        self.main_menu
    }

    pub fn data_list(&self) -> &[DataFilename] {
        &self.data_list
    }

    pub fn refs(&self) -> &[DataFilename] {
        &self.refs
    }

    pub fn begin(&mut self, slot: Slot) -> Ticket {
        self.sequences[slot.index()].issue()
    }

    fn is_current(&self, slot: Slot, ticket: Ticket) -> bool {
        self.sequences[slot.index()].is_current(ticket)
    }

    fn stale(&self, slot: Slot, ticket: Ticket) -> Option<Vec<StoreEvent>> {
        if self.is_current(slot, ticket) {
            return None;
        }
        debug!(?slot, ticket = ticket.get(), "dropping superseded response");
        Some(vec![StoreEvent::StaleResponseDropped(slot)])
    }

    pub fn apply_project_info(&mut self, ticket: Ticket, info: ProjectInfo) -> Vec<StoreEvent> {
        if let Some(events) = self.stale(Slot::ProjectInfo, ticket) {
            return events;
        }
        self.project_info = Some(info);
        vec![StoreEvent::ProjectInfoUpdated]
    }

    pub fn apply_environs(&mut self, ticket: Ticket, environs: Vec<MappingTree>) -> Vec<StoreEvent> {
        if let Some(events) = self.stale(Slot::Environs, ticket) {
            return events;
        }
        self.environs = environs;
        self.environs_loaded = true;
        let count = self.environs.iter().map(|tree| tree.children.len()).sum();
        let mut events = vec![StoreEvent::EnvironsUpdated(count)];
        if self.current_path.is_some() {
            events.push(self.derive_menu());
        }
        events
    }

    pub fn apply_data_list(&mut self, ticket: Ticket, list: Vec<DataFilename>) -> Vec<StoreEvent> {
        if let Some(events) = self.stale(Slot::DataList, ticket) {
            return events;
        }
        self.data_list = list;
        vec![StoreEvent::DataListUpdated(self.data_list.len())]
    }

    pub fn apply_refs(&mut self, ticket: Ticket, refs: Vec<DataFilename>) -> Vec<StoreEvent> {
        if let Some(events) = self.stale(Slot::Refs, ticket) {
            return events;
        }
        self.refs = refs;
        vec![StoreEvent::RefsUpdated(self.refs.len())]
    }

    pub fn update_project_info(&mut self, backend: &mut impl Backend) -> Result<Vec<StoreEvent>> {
        let ticket = self.begin(Slot::ProjectInfo);
        let info = backend.project_info()?;
        Ok(self.apply_project_info(ticket, info))
    }

    pub fn update_environs(&mut self, backend: &mut impl Backend) -> Result<Vec<StoreEvent>> {
        let ticket = self.begin(Slot::Environs);
        let environs = backend.environs()?;
        Ok(self.apply_environs(ticket, environs))
    }

    /// Records the path; menu state is derived now if environs are loaded, otherwise
    /// when they arrive.
    pub fn set_current_path(&mut self, path: &str) -> Vec<StoreEvent> {
        self.current_path = Some(path.to_owned());
        self.route = Route::parse(path);
        if self.environs_loaded {
            vec![self.derive_menu()]
        } else {
            Vec::new()
        }
    }

    /// Without an id the previous list is left as is.
    pub fn update_data_list(
        &mut self,
        backend: &mut impl Backend,
        id: Option<&MappingId>,
    ) -> Result<Vec<StoreEvent>> {
        let Some(id) = id else {
            return Ok(Vec::new());
        };
        let mut events = self.update_refs(backend)?;
        let ticket = self.begin(Slot::DataList);
        let list = backend.data_list(id)?;
        events.extend(self.apply_data_list(ticket, list));
        Ok(events)
    }

    pub fn update_refs(&mut self, backend: &mut impl Backend) -> Result<Vec<StoreEvent>> {
        let ticket = self.begin(Slot::Refs);
        let refs = backend.refs()?;
        Ok(self.apply_refs(ticket, refs))
    }

    /// Drops loaded data and menu state and supersedes every in-flight request; the
    /// current path is kept so the next environs load derives the menu again.
    pub fn invalidate(&mut self) -> Vec<StoreEvent> {
        for slot in Slot::ALL {
            self.begin(slot);
        }
        self.project_info = None;
        self.environs.clear();
        self.environs_loaded = false;
        self.current_mapping = None;
        self.main_menu = true;
        self.data_list.clear();
        self.refs.clear();
        vec![StoreEvent::Invalidated]
    }

    fn derive_menu(&mut self) -> StoreEvent {
        let path = self.current_path.as_deref().unwrap_or("/");
        let PathInfo {
            main_menu,
            current_mapping,
        } = PathInfo::derive(path, &self.environs);
        self.main_menu = main_menu;
        self.current_mapping = current_mapping;
        let mapping = self.current_mapping.as_ref().map(|mapping| mapping.id.clone());
        info!(path, main_menu, mapping = ?mapping, "menu state derived");
        StoreEvent::MenuChanged { main_menu, mapping }
    }
}

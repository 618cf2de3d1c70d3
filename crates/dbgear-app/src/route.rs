// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::ids::{MappingId, TableRef};
use crate::model::{Mapping, MappingTree, find_mapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataTab {
    #[default]
    Data,
    Props,
}

impl DataTab {
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Data => "_data",
            Self::Props => "_props",
        }
    }

    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "_data" => Some(Self::Data),
            "_props" => Some(Self::Props),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    AddEnviron,
    Environ {
        id: MappingId,
    },
    InitData {
        id: MappingId,
    },
    Table {
        id: MappingId,
        table: TableRef,
        tab: DataTab,
    },
}

impl Route {
    /// Matches a URL path against the known views; unknown shapes yield `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        match segments.as_slice() {
            [] => Some(Self::Root),
            ["add"] => Some(Self::AddEnviron),
            ["environs", id] => Some(Self::Environ {
                id: MappingId::from(*id),
            }),
            ["environs", id, "_init"] => Some(Self::InitData {
                id: MappingId::from(*id),
            }),
            ["environs", id, instance, table] => Some(Self::Table {
                id: MappingId::from(*id),
                table: TableRef::new(*instance, *table),
                tab: DataTab::Data,
            }),
            ["environs", id, instance, table, tab] => Some(Self::Table {
                id: MappingId::from(*id),
                table: TableRef::new(*instance, *table),
                tab: DataTab::parse(tab)?,
            }),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Root => "/".to_owned(),
            Self::AddEnviron => "/add".to_owned(),
            Self::Environ { id } => format!("/environs/{id}"),
            Self::InitData { id } => format!("/environs/{id}/_init"),
            Self::Table { id, table, tab } => format!(
                "/environs/{id}/{}/{}/{}",
                table.instance,
                table.table,
                tab.segment()
            ),
        }
    }

    pub fn environ_id(&self) -> Option<&MappingId> {
        match self {
            Self::Root | Self::AddEnviron => None,
            Self::Environ { id } | Self::InitData { id } | Self::Table { id, .. } => Some(id),
        }
    }
}

/// Menu state derived from the raw path and the loaded environs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub main_menu: bool,
    pub current_mapping: Option<Mapping>,
}

impl PathInfo {
    /// Paths of at most two `/`-separated segments are the top-level menu; deeper
    /// paths look up segment 2 as a mapping id. An unknown id selects nothing.
    pub fn derive(path: &str, environs: &[MappingTree]) -> Self {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() <= 2 {
            return Self {
                main_menu: true,
                current_mapping: None,
            };
        }
        Self {
            main_menu: false,
            current_mapping: find_mapping(environs, segments[2]).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DataTab, PathInfo, Route};
    use crate::ids::{MappingId, TableRef};
    use crate::model::{Mapping, MappingTree};

    fn environs() -> Vec<MappingTree> {
        vec![MappingTree {
            group: "main".to_owned(),
            children: vec![Mapping {
                id: MappingId::new("dev"),
                group: "main".to_owned(),
                base: None,
                name: "Dev".to_owned(),
                description: String::new(),
                instances: vec!["db1".to_owned()],
                deployment: true,
            }],
        }]
    }

    #[test]
    fn parses_table_route_with_tab() {
        let route = Route::parse("/environs/dev/db1/users/_props").expect("table route");
        assert_eq!(
            route,
            Route::Table {
                id: MappingId::new("dev"),
                table: TableRef::new("db1", "users"),
                tab: DataTab::Props,
            }
        );
        assert_eq!(route.path(), "/environs/dev/db1/users/_props");
    }

    #[test]
    fn parses_top_level_routes() {
        assert_eq!(Route::parse("/"), Some(Route::Root));
        assert_eq!(Route::parse(""), Some(Route::Root));
        assert_eq!(Route::parse("/add"), Some(Route::AddEnviron));
        assert_eq!(
            Route::parse("/environs/dev/_init"),
            Some(Route::InitData {
                id: MappingId::new("dev")
            })
        );
        assert_eq!(Route::parse("/environs/dev/db1/users/_bogus"), None);
        assert_eq!(Route::parse("/unknown/place"), None);
    }

    #[test]
    fn two_segment_path_is_main_menu() {
        let info = PathInfo::derive("/add", &environs());
        assert!(info.main_menu);
        assert!(info.current_mapping.is_none());
    }

    #[test]
    fn deeper_path_selects_mapping_by_segment_two() {
        let info = PathInfo::derive("/environs/dev/db1/users/_data", &environs());
        assert!(!info.main_menu);
        assert_eq!(
            info.current_mapping.map(|mapping| mapping.id),
            Some(MappingId::new("dev"))
        );
    }

    #[test]
    fn unknown_mapping_degrades_to_no_selection() {
        let info = PathInfo::derive("/environs/missing", &environs());
        assert!(!info.main_menu);
        assert!(info.current_mapping.is_none());
    }
}

// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use dbgear_app::{
    ColumnSettings, DataFilename, GridController, MappingTree, Notice, ProjectInfo, Table,
    is_tombstoned,
};
use serde_json::Value;

pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Left-aligned plain-text table with a dashed header rule.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        padded.join("  ").trim_end().to_owned()
    };

    let mut out = line(headers);
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row));
        out.push('\n');
    }
    out
}

fn owned(headers: &[&str]) -> Vec<String> {
    headers.iter().map(|header| (*header).to_owned()).collect()
}

pub fn render_project(project: &ProjectInfo) -> String {
    let mut out = format!("{}\n", project.project_name);
    if !project.description.is_empty() {
        out.push_str(&format!("{}\n", project.description));
    }
    out.push_str(&format!("instances: {}\n", project.instances.join(", ")));
    if !project.rules.is_empty() {
        out.push_str("\nrules:\n");
        for (pattern, value) in &project.rules {
            out.push_str(&format!("  {pattern} => {value}\n"));
        }
    }
    if !project.bindings.is_empty() {
        out.push_str("\nbindings:\n");
        for (name, binding) in &project.bindings {
            out.push_str(&format!(
                "  {name} ({}) {}\n",
                binding.binding_type,
                binding.value.as_deref().unwrap_or_default()
            ));
        }
    }
    out
}

pub fn render_environs(trees: &[MappingTree]) -> String {
    let rows: Vec<Vec<String>> = trees
        .iter()
        .flat_map(|tree| {
            tree.children.iter().map(|mapping| {
                vec![
                    tree.group.clone(),
                    mapping.id.to_string(),
                    mapping.name.clone(),
                    mapping
                        .base
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    if mapping.deployment { "yes" } else { "" }.to_owned(),
                ]
            })
        })
        .collect();
    render_table(&owned(&["GROUP", "ID", "NAME", "BASE", "DEPLOY"]), &rows)
}

pub fn render_data_list(items: &[DataFilename]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            vec![
                item.table_ref().to_string(),
                item.display_name.clone(),
                item.id_name.clone().unwrap_or_default(),
            ]
        })
        .collect();
    render_table(&owned(&["TABLE", "DISPLAY NAME", "SOURCE"]), &rows)
}

pub fn render_schema(table: &Table) -> String {
    let rows: Vec<Vec<String>> = table
        .fields
        .iter()
        .map(|field| {
            vec![
                field.column_name.clone(),
                field.display_name.clone().unwrap_or_default(),
                field.column_type.clone(),
                if field.nullable { "" } else { "not null" }.to_owned(),
                field
                    .primary_key
                    .map(|ordinal| ordinal.to_string())
                    .unwrap_or_default(),
                field.foreign_key.clone().unwrap_or_default(),
            ]
        })
        .collect();
    let mut out = format!("{}.{} ({})\n\n", table.instance, table.table_name, table.label());
    out.push_str(&render_table(
        &owned(&["COLUMN", "DISPLAY", "TYPE", "NULL", "PK", "FK"]),
        &rows,
    ));
    for index in &table.indexes {
        out.push_str(&format!(
            "index {} ({})\n",
            index.index_name,
            index.columns.join(", ")
        ));
    }
    out
}

pub fn render_settings(columns: &[ColumnSettings]) -> String {
    let rows: Vec<Vec<String>> = columns
        .iter()
        .map(|column| {
            vec![
                column.key.clone(),
                column.label.clone(),
                column.def_value.clone(),
                column.width.clone(),
            ]
        })
        .collect();
    render_table(&owned(&["COLUMN", "LABEL", "DEFAULT", "WIDTH"]), &rows)
}

/// Current page of the grid; rows marked for removal are prefixed with `-`.
pub fn render_grid(grid: &GridController) -> String {
    let columns = grid.visible_columns();
    let mut headers = vec![String::new()];
    headers.extend(columns.iter().map(|column| {
        if column.header_name.is_empty() {
            column.field.clone()
        } else {
            column.header_name.clone()
        }
    }));
    let rows: Vec<Vec<String>> = grid
        .page_rows()
        .into_iter()
        .map(|row| {
            let mut cells = vec![if is_tombstoned(row) { "-" } else { "" }.to_owned()];
            cells.extend(
                columns
                    .iter()
                    .map(|column| cell_text(row.get(&column.field))),
            );
            cells
        })
        .collect();

    let mut out = render_table(&headers, &rows);
    out.push_str(&format!(
        "page {}/{} ({} rows)",
        grid.page() + 1,
        grid.page_count(),
        grid.rows().len()
    ));
    if let Some(segment) = grid.segment() {
        out.push_str(&format!(", segment {segment}"));
    }
    out.push('\n');
    out
}

pub fn render_notices(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|notice| format!("[{}] {}\n", notice.level.as_str(), notice.message))
        .collect()
}

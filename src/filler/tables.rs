use serde::Deserialize;
use serde_json::Value;

use crate::data::{render, ReportData};
use crate::docx::document::{Row, Table, TemplateDocument};
use crate::filler::FillReport;

/// Binds a template table to a data key by the text of its top-left cell.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TableRole {
    /// Expected top-left cell text (compared trimmed).
    pub header: String,
    /// Top-level data key holding `{ headers, rows }`.
    pub data_key: String,
    /// Columns filled per row.
    pub columns: usize,
}

pub fn default_table_roles() -> Vec<TableRole> {
    vec![
        TableRole {
            header: "Criteria".to_string(),
            data_key: "suitability_table".to_string(),
            columns: 2,
        },
        TableRole {
            header: "Suitability Criteria".to_string(),
            data_key: "suitability_criteria_table".to_string(),
            columns: 3,
        },
    ]
}

/// Outcome of synchronizing one table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableSync {
    pub data_key: String,
    pub rows_written: usize,
    pub rows_added: usize,
    pub rows_removed: usize,
}

/// Synchronizes every body table whose top-left cell names a role.
///
/// Tables that match no role are left untouched.
pub fn sync_tables(
    doc: &mut TemplateDocument,
    data: &ReportData,
    roles: &[TableRole],
    report: &mut FillReport,
) -> anyhow::Result<()> {
    for table in doc.tables() {
        let Some(corner) = doc.cell(table, 0, 0) else {
            continue;
        };
        let header = doc.cell_text(corner);
        let Some(role) = roles.iter().find(|r| r.header == header.trim()) else {
            continue;
        };
        let source = data.get(&role.data_key);
        let headers = source.and_then(|v| v.get("headers")).and_then(Value::as_array);
        let rows = source.and_then(|v| v.get("rows")).and_then(Value::as_array);
        let (Some(headers), Some(rows)) = (headers, rows) else {
            report.miss(format!("{}.rows", role.data_key));
            continue;
        };
        let headers: Vec<String> = headers.iter().filter_map(render).collect();
        let sync = sync_table(doc, table, role, &headers, rows, report)?;
        report.tables.push(sync);
    }
    Ok(())
}

/// Makes the table body (every row after the header) mirror `rows`.
///
/// Existing rows are overwritten in order, surplus rows are removed, and missing ones are
/// appended as copies of the last row. Column `j` of a row takes `record[headers[j]]` for the
/// first `role.columns` columns. A missing header or field leaves the cell empty and is reported.
pub fn sync_table(
    doc: &mut TemplateDocument,
    table: Table,
    role: &TableRole,
    headers: &[String],
    rows: &[Value],
    report: &mut FillReport,
) -> anyhow::Result<TableSync> {
    let mut sync = TableSync {
        data_key: role.data_key.clone(),
        ..TableSync::default()
    };
    let existing = doc.rows(table);
    let body = existing.get(1..).unwrap_or_default();

    for (i, &row) in body.iter().enumerate() {
        match rows.get(i) {
            Some(record) => {
                fill_row(doc, row, role, headers, record, i, report);
                sync.rows_written += 1;
            }
            None => {
                doc.remove_row(row);
                sync.rows_removed += 1;
            }
        }
    }
    for (i, record) in rows.iter().enumerate().skip(body.len()) {
        let row = doc.add_row(table)?;
        fill_row(doc, row, role, headers, record, i, report);
        sync.rows_added += 1;
        sync.rows_written += 1;
    }
    Ok(sync)
}

fn fill_row(
    doc: &mut TemplateDocument,
    row: Row,
    role: &TableRole,
    headers: &[String],
    record: &Value,
    index: usize,
    report: &mut FillReport,
) {
    let cells = doc.cells(row);
    for col in 0..role.columns {
        let Some(&cell) = cells.get(col) else {
            break;
        };
        let Some(header) = headers.get(col) else {
            doc.set_cell_text(cell, "");
            report.miss(format!("{}.headers.{col}", role.data_key));
            continue;
        };
        match record.get(header).and_then(render) {
            Some(text) => doc.set_cell_text(cell, &text),
            None => {
                doc.set_cell_text(cell, "");
                report.miss(format!("{}.rows.{index}.{header}", role.data_key));
            }
        }
    }
}

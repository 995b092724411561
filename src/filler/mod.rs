use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::config::FillerConfig;
use crate::data::ReportData;
use crate::docx::document::{Rgb, TemplateDocument};
use crate::error::FillError;
use crate::progress::ConsoleProgress;

pub mod databases;
pub mod lists;
pub mod scanner;
pub mod tables;

pub use tables::{TableRole, TableSync};

/// Run texts (trimmed) that are blanked wherever they appear.
pub const DEFAULT_REMOVAL_LIST: &[&str] = &[
    "[ as bullets ]",
    "database.db.name",
    "database.db.link",
    "Search Strategy",
    "Search Terms SoTA",
    "Search Terms S&P",
    "{{ for item in database.sota_terms }}",
    "{{ for item in database.sp_terms }}",
];

/// Marker expressions left over from the template's loop scaffolding; rendered as nothing.
pub const DEFAULT_STRAY_TOKENS: &[&str] = &[
    "item in database.sota_terms",
    "item in database.sp_terms",
    "database.db.name",
    "database.db.link",
];

pub const DEFAULT_SECTION_HEADER: &str = "Scientific Databases";
pub const DEFAULT_LIST_STYLE: &str = "List Bullet";
pub const DEFAULT_HEADING_COLOR: Rgb = Rgb(0x54, 0x8D, 0xD4);
pub const DEFAULT_DATE_FORMAT: &str = "%b %d, %Y";

#[derive(Clone, Debug)]
pub struct FillOptions {
    pub removal_list: Vec<String>,
    pub stray_tokens: Vec<String>,
    pub section_header: String,
    /// Paragraph style (UI name) given to every generated list item.
    pub list_style: String,
    pub heading_color: Rgb,
    pub date: NaiveDate,
    pub date_format: String,
    pub table_roles: Vec<TableRole>,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            removal_list: DEFAULT_REMOVAL_LIST.iter().map(|s| s.to_string()).collect(),
            stray_tokens: DEFAULT_STRAY_TOKENS.iter().map(|s| s.to_string()).collect(),
            section_header: DEFAULT_SECTION_HEADER.to_string(),
            list_style: DEFAULT_LIST_STYLE.to_string(),
            heading_color: DEFAULT_HEADING_COLOR,
            date: chrono::Local::now().date_naive(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            table_roles: tables::default_table_roles(),
        }
    }
}

/// What a fill run did, and which lookups came up empty.
#[derive(Clone, Debug, Default)]
pub struct FillReport {
    /// Marker expressions (or table data paths) with no data behind them.
    pub unresolved: BTreeSet<String>,
    /// Index of the body paragraph holding the section header, if seen.
    pub section_header_paragraph: Option<usize>,
    pub markers_replaced: usize,
    pub lists_materialized: usize,
    pub database_blocks: usize,
    pub tables: Vec<TableSync>,
}

impl FillReport {
    pub fn miss(&mut self, key: impl Into<String>) {
        self.unresolved.insert(key.into());
    }
}

/// Fills an opened template in place: markers first, then tables.
pub fn fill_document(
    doc: &mut TemplateDocument,
    data: &ReportData,
    opts: &FillOptions,
) -> anyhow::Result<FillReport> {
    let mut report = FillReport::default();
    scanner::scan_paragraphs(doc, data, opts, &mut report)?;
    tables::sync_tables(doc, data, &opts.table_roles, &mut report)?;
    Ok(report)
}

/// Loads data and template, fills, and saves the output.
///
/// Nothing is written unless every step succeeds.
pub fn fill_template(
    cfg: &FillerConfig,
    progress: &ConsoleProgress,
) -> Result<FillReport, FillError> {
    progress.info(format!("data: {}", cfg.data.display()));
    let data = ReportData::load(&cfg.data).map_err(|e| FillError::data_load(&cfg.data, e))?;

    progress.info(format!("template: {}", cfg.template.display()));
    let mut doc = TemplateDocument::open(&cfg.template)
        .map_err(|e| FillError::template_load(&cfg.template, e))?;

    let report = fill_document(&mut doc, &data, &cfg.options).map_err(FillError::fill)?;
    progress.info(format!(
        "filled: {} marker(s), {} list(s), {} database block(s), {} table(s)",
        report.markers_replaced,
        report.lists_materialized,
        report.database_blocks,
        report.tables.len()
    ));
    for sync in &report.tables {
        progress.info(format!(
            "table {}: {} row(s) written, {} added, {} removed",
            sync.data_key, sync.rows_written, sync.rows_added, sync.rows_removed
        ));
    }
    for key in &report.unresolved {
        progress.warn(format!("unresolved: {key}"));
    }

    if cfg.strict && !report.unresolved.is_empty() {
        return Err(FillError::Unresolved {
            markers: report.unresolved.iter().cloned().collect(),
        });
    }

    doc.save(&cfg.output)
        .map_err(|e| FillError::save(&cfg.output, e))?;
    progress.info(format!("saved: {}", cfg.output.display()));
    Ok(report)
}

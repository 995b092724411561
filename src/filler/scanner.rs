use std::fmt::Write as _;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::data::{render, string_items, ReportData};
use crate::docx::document::{Paragraph, Run, TemplateDocument};
use crate::filler::lists::{self, ListSpec};
use crate::filler::{databases, FillOptions, FillReport};

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{ (.*?) \}\}").expect("marker regex must compile"));

/// Marker expressions in `text`, in order of appearance, without the braces.
pub fn markers_in(text: &str) -> Vec<String> {
    MARKER_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// What a marker expands to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerAction {
    Date,
    InclusionCriteria,
    ExclusionCriteria,
    Databases,
    SuitabilityCaption,
    CriteriaCaption,
    Strip,
    DottedPath,
    BareKey,
}

struct MarkerRule {
    action: MarkerAction,
    matches: fn(&str, &ReportData, &FillOptions) -> bool,
}

/// Tried top to bottom; the first rule that matches decides the action.
const MARKER_RULES: &[MarkerRule] = &[
    MarkerRule { action: MarkerAction::Date, matches: is_date },
    MarkerRule { action: MarkerAction::InclusionCriteria, matches: mentions_inclusion },
    MarkerRule { action: MarkerAction::ExclusionCriteria, matches: mentions_exclusion },
    MarkerRule { action: MarkerAction::Databases, matches: mentions_databases },
    MarkerRule { action: MarkerAction::SuitabilityCaption, matches: is_suitability_caption },
    MarkerRule { action: MarkerAction::CriteriaCaption, matches: is_criteria_caption },
    MarkerRule { action: MarkerAction::Strip, matches: is_stray_token },
    MarkerRule { action: MarkerAction::DottedPath, matches: is_dotted_path },
    MarkerRule { action: MarkerAction::BareKey, matches: is_top_level_key },
];

const SUITABILITY_CAPTION_PATH: &str = "suitability_table.table_caption";
const CRITERIA_CAPTION_PATH: &str = "suitability_criteria_table.table_caption";

fn is_date(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m == "date"
}

fn mentions_inclusion(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m.contains("inclusion_criteria")
}

fn mentions_exclusion(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m.contains("exclusion_criteria")
}

fn mentions_databases(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m.contains("database in sci_databases")
}

fn is_suitability_caption(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m.contains("suitability_table_caption")
}

fn is_criteria_caption(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m.contains("suitability_criteria_table_caption")
}

fn is_stray_token(m: &str, _: &ReportData, opts: &FillOptions) -> bool {
    opts.stray_tokens.iter().any(|t| t == m)
}

fn is_dotted_path(m: &str, _: &ReportData, _: &FillOptions) -> bool {
    m.contains('.')
}

fn is_top_level_key(m: &str, data: &ReportData, _: &FillOptions) -> bool {
    data.contains_key(m)
}

/// First matching action for `marker`, `None` when nothing claims it.
pub fn classify(marker: &str, data: &ReportData, opts: &FillOptions) -> Option<MarkerAction> {
    MARKER_RULES
        .iter()
        .find(|rule| (rule.matches)(marker, data, opts))
        .map(|rule| rule.action)
}

/// Walks the body paragraphs present when called and expands every marker found in their runs.
///
/// Paragraphs inserted while expanding are never scanned themselves.
pub fn scan_paragraphs(
    doc: &mut TemplateDocument,
    data: &ReportData,
    opts: &FillOptions,
    report: &mut FillReport,
) -> anyhow::Result<()> {
    let paragraphs = doc.paragraphs();
    for (index, &para) in paragraphs.iter().enumerate() {
        for run in doc.runs(para) {
            let mut text = doc.run_text(run);
            if opts.removal_list.iter().any(|r| r == text.trim()) {
                doc.set_run_text(run, "");
                text.clear();
            }
            if text == opts.section_header {
                report.section_header_paragraph = Some(index);
                continue;
            }
            for marker in markers_in(&text) {
                expand_marker(doc, data, opts, report, para, run, &marker)?;
            }
        }
    }
    Ok(())
}

fn expand_marker(
    doc: &mut TemplateDocument,
    data: &ReportData,
    opts: &FillOptions,
    report: &mut FillReport,
    para: Paragraph,
    run: Run,
    marker: &str,
) -> anyhow::Result<()> {
    let Some(action) = classify(marker, data, opts) else {
        report.miss(marker);
        return Ok(());
    };
    match action {
        MarkerAction::Date => {
            let mut text = String::new();
            write!(text, "{}", opts.date.format(&opts.date_format))
                .map_err(|_| anyhow!("invalid date format: {}", opts.date_format))?;
            doc.set_run_text(run, &text);
            report.markers_replaced += 1;
        }
        MarkerAction::InclusionCriteria => {
            expand_list(doc, data, opts, report, para, run, marker, "inclusion_criteria")?
        }
        MarkerAction::ExclusionCriteria => {
            expand_list(doc, data, opts, report, para, run, marker, "exclusion_criteria")?
        }
        MarkerAction::Databases => match data.get("sci_databases").and_then(Value::as_array) {
            Some(entries) => {
                report.database_blocks +=
                    databases::expand_databases(doc, para, run, entries, opts, report)?;
            }
            None => report.miss(marker),
        },
        MarkerAction::SuitabilityCaption => {
            replace_run(doc, data, report, run, marker, SUITABILITY_CAPTION_PATH)
        }
        MarkerAction::CriteriaCaption => {
            replace_run(doc, data, report, run, marker, CRITERIA_CAPTION_PATH)
        }
        MarkerAction::DottedPath => replace_run(doc, data, report, run, marker, marker),
        MarkerAction::Strip => doc.set_run_text(run, ""),
        MarkerAction::BareKey => match data.get(marker).and_then(render) {
            Some(value) => {
                let current = doc.run_text(run);
                let replaced = current.replace(&format!("{{{{ {marker} }}}}"), &value);
                doc.set_run_text(run, &replaced);
                report.markers_replaced += 1;
            }
            None => report.miss(marker),
        },
    }
    Ok(())
}

/// Replaces the whole run text with the value at `path`; a miss leaves the run alone.
fn replace_run(
    doc: &mut TemplateDocument,
    data: &ReportData,
    report: &mut FillReport,
    run: Run,
    marker: &str,
    path: &str,
) {
    match data.resolve(path).and_then(render) {
        Some(value) => {
            doc.set_run_text(run, &value);
            report.markers_replaced += 1;
        }
        None => report.miss(marker),
    }
}

#[allow(clippy::too_many_arguments)]
fn expand_list(
    doc: &mut TemplateDocument,
    data: &ReportData,
    opts: &FillOptions,
    report: &mut FillReport,
    para: Paragraph,
    run: Run,
    marker: &str,
    key: &str,
) -> anyhow::Result<()> {
    let Some(items) = data.get(key).and_then(string_items) else {
        report.miss(marker);
        return Ok(());
    };
    let spec = ListSpec {
        style: &opts.list_style,
        numbered: false,
        level: 0,
    };
    lists::materialize(doc, para, Some(run), &items, &spec)?;
    report.lists_materialized += 1;
    Ok(())
}

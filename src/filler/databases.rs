use serde_json::Value;

use crate::data::{render, resolve, string_items};
use crate::docx::document::{Paragraph, Run, TemplateDocument};
use crate::filler::lists::{self, ListSpec};
use crate::filler::{FillOptions, FillReport};

pub const SEARCH_STRATEGY: &str = "Search Strategy";
pub const SEARCH_TERMS_SOTA: &str = "Search Terms SoTA";
pub const SEARCH_TERMS_SP: &str = "Search Terms S&P";

/// Replaces the databases marker with one block per entry, in data order.
///
/// The marker run is cleared; blocks follow the anchor paragraph. Returns the number of
/// blocks written.
pub fn expand_databases(
    doc: &mut TemplateDocument,
    anchor: Paragraph,
    anchor_run: Run,
    entries: &[Value],
    opts: &FillOptions,
    report: &mut FillReport,
) -> anyhow::Result<usize> {
    doc.set_run_text(anchor_run, "");
    let mut cursor = anchor;
    for (index, entry) in entries.iter().enumerate() {
        cursor = insert_block(doc, cursor, index, entry, opts, report)?;
    }
    Ok(entries.len())
}

/// One database block:
///
/// ```text
/// <name>            bold, heading color
/// <link>
///
/// Search Strategy   bold, heading color
///
/// Search Terms SoTA bold, heading color
///
/// - sota term ...
///
/// Search Terms S&P  bold, heading color
///
/// - s&p term ...
/// ```
///
/// Returns the last paragraph written.
fn insert_block(
    doc: &mut TemplateDocument,
    after: Paragraph,
    index: usize,
    entry: &Value,
    opts: &FillOptions,
    report: &mut FillReport,
) -> anyhow::Result<Paragraph> {
    let name = field(entry, "db.name", index, report);
    let link = field(entry, "db.link", index, report);

    let mut cursor = heading(doc, after, &name, opts)?;
    cursor = plain(doc, cursor, &link)?;
    cursor = plain(doc, cursor, "")?;
    cursor = heading(doc, cursor, SEARCH_STRATEGY, opts)?;
    cursor = plain(doc, cursor, "")?;
    cursor = heading(doc, cursor, SEARCH_TERMS_SOTA, opts)?;
    cursor = plain(doc, cursor, "")?;
    cursor = terms(doc, cursor, entry, "sota_terms", index, opts, report)?;
    cursor = plain(doc, cursor, "")?;
    cursor = heading(doc, cursor, SEARCH_TERMS_SP, opts)?;
    cursor = plain(doc, cursor, "")?;
    terms(doc, cursor, entry, "sp_terms", index, opts, report)
}

fn field(entry: &Value, path: &str, index: usize, report: &mut FillReport) -> String {
    match resolve(entry, path).and_then(render) {
        Some(v) => v,
        None => {
            report.miss(format!("sci_databases.{index}.{path}"));
            String::new()
        }
    }
}

fn heading(
    doc: &mut TemplateDocument,
    after: Paragraph,
    text: &str,
    opts: &FillOptions,
) -> anyhow::Result<Paragraph> {
    let p = doc.insert_paragraph_after(after)?;
    if !text.is_empty() {
        let r = doc.add_run(p, text);
        doc.set_run_bold(r, true);
        doc.set_run_color(r, opts.heading_color);
    }
    Ok(p)
}

fn plain(doc: &mut TemplateDocument, after: Paragraph, text: &str) -> anyhow::Result<Paragraph> {
    let p = doc.insert_paragraph_after(after)?;
    if !text.is_empty() {
        doc.add_run(p, text);
    }
    Ok(p)
}

fn terms(
    doc: &mut TemplateDocument,
    after: Paragraph,
    entry: &Value,
    key: &str,
    index: usize,
    opts: &FillOptions,
    report: &mut FillReport,
) -> anyhow::Result<Paragraph> {
    let Some(items) = entry.get(key).and_then(string_items) else {
        report.miss(format!("sci_databases.{index}.{key}"));
        return Ok(after);
    };
    let spec = ListSpec {
        style: &opts.list_style,
        numbered: false,
        level: 0,
    };
    let written = lists::insert_list_after(doc, after, &items, &spec)?;
    Ok(written.last().copied().unwrap_or(after))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::expand_databases;
    use crate::docx::document::tests::open_body;
    use crate::docx::document::Rgb;
    use crate::filler::{FillOptions, FillReport};

    #[test]
    fn writes_one_block_per_entry_in_order() {
        let mut doc = open_body(
            "<w:p><w:r><w:t>{{ for database in sci_databases }}</w:t></w:r></w:p><w:p><w:r><w:t>tail</w:t></w:r></w:p>",
        );
        let anchor = doc.paragraphs()[0];
        let run = doc.runs(anchor)[0];
        let entries = json!([
            {"db": {"name": "PubMed", "link": "https://pubmed.example"}, "sota_terms": ["x", "y"], "sp_terms": ["z"]},
            {"db": {"name": "Embase", "link": "https://embase.example"}, "sota_terms": [], "sp_terms": ["w"]},
        ]);
        let entries = entries.as_array().expect("array");
        let mut report = FillReport::default();

        let n = expand_databases(&mut doc, anchor, run, entries, &FillOptions::default(), &mut report)
            .expect("expand");

        assert_eq!(n, 2);
        let texts: Vec<String> = doc.paragraphs().iter().map(|&p| doc.paragraph_text(p)).collect();
        assert_eq!(
            texts,
            [
                "",
                "PubMed", "https://pubmed.example", "", "Search Strategy", "", "Search Terms SoTA", "",
                "x", "y", "", "Search Terms S&P", "", "z",
                "Embase", "https://embase.example", "", "Search Strategy", "", "Search Terms SoTA", "",
                "", "Search Terms S&P", "", "w",
                "tail",
            ]
        );
        assert!(report.unresolved.is_empty());

        let paragraphs = doc.paragraphs();
        let name_run = doc.runs(paragraphs[1])[0];
        assert_eq!(doc.run_bold(name_run), Some(true));
        assert_eq!(doc.run_color(name_run), Some(Rgb(0x54, 0x8D, 0xD4)));
        let link_run = doc.runs(paragraphs[2])[0];
        assert_eq!(doc.run_bold(link_run), None);

        let x = doc.paragraph_numbering(paragraphs[8]).expect("x numbered");
        let y = doc.paragraph_numbering(paragraphs[9]).expect("y numbered");
        let z = doc.paragraph_numbering(paragraphs[13]).expect("z numbered");
        assert_eq!(x, y);
        assert_ne!(x.0, z.0);
    }

    #[test]
    fn missing_fields_are_reported_per_entry() {
        let mut doc = open_body("<w:p><w:r><w:t>{{ sci_databases }}</w:t></w:r></w:p>");
        let anchor = doc.paragraphs()[0];
        let run = doc.runs(anchor)[0];
        let entries = json!([{"db": {"name": "PubMed"}}]);
        let mut report = FillReport::default();
        expand_databases(
            &mut doc,
            anchor,
            run,
            entries.as_array().expect("array"),
            &FillOptions::default(),
            &mut report,
        )
        .expect("expand");
        let keys: Vec<&str> = report.unresolved.iter().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["sci_databases.0.db.link", "sci_databases.0.sota_terms", "sci_databases.0.sp_terms"]
        );
    }
}

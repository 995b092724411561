use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{anyhow, Context};

use crate::docx::numbering::{parse_u32, NumberingStore, NUMBERING_PART};
use crate::docx::package::DocxPackage;
use crate::docx::styles::StyleCatalog;
use crate::docx::xml::{NodeId, XmlTree};

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

const NUMBERING_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml";
const NUMBERING_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";

// Child sequences from the WordprocessingML schema, trimmed to what we insert next to.
const P_ORDER: &[&str] = &["w:pPr", "w:r"];
const PPR_ORDER: &[&str] = &[
    "w:pStyle",
    "w:keepNext",
    "w:keepLines",
    "w:pageBreakBefore",
    "w:framePr",
    "w:widowControl",
    "w:numPr",
    "w:suppressLineNumbers",
    "w:pBdr",
    "w:shd",
    "w:tabs",
    "w:suppressAutoHyphens",
    "w:kinsoku",
    "w:wordWrap",
    "w:overflowPunct",
    "w:topLinePunct",
    "w:autoSpaceDE",
    "w:autoSpaceDN",
    "w:bidi",
    "w:adjustRightInd",
    "w:snapToGrid",
    "w:spacing",
    "w:ind",
    "w:contextualSpacing",
    "w:mirrorIndents",
    "w:suppressOverlap",
    "w:jc",
    "w:textDirection",
    "w:textAlignment",
    "w:textboxTightWrap",
    "w:outlineLvl",
    "w:divId",
    "w:cnfStyle",
    "w:rPr",
    "w:sectPr",
    "w:pPrChange",
];
const NUMPR_ORDER: &[&str] = &["w:ilvl", "w:numId"];
const R_ORDER: &[&str] = &["w:rPr", "w:t"];
const RPR_ORDER: &[&str] = &[
    "w:rStyle",
    "w:rFonts",
    "w:b",
    "w:bCs",
    "w:i",
    "w:iCs",
    "w:caps",
    "w:smallCaps",
    "w:strike",
    "w:dstrike",
    "w:outline",
    "w:shadow",
    "w:emboss",
    "w:imprint",
    "w:noProof",
    "w:snapToGrid",
    "w:vanish",
    "w:webHidden",
    "w:color",
    "w:spacing",
    "w:w",
    "w:kern",
    "w:position",
    "w:sz",
    "w:szCs",
    "w:highlight",
    "w:u",
    "w:effect",
    "w:bdr",
    "w:shd",
    "w:fitText",
    "w:vertAlign",
    "w:rtl",
    "w:cs",
    "w:em",
    "w:lang",
    "w:eastAsianLayout",
    "w:specVanish",
    "w:oMath",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Paragraph(NodeId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Run(NodeId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Table(NodeId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Row(NodeId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell(NodeId);

/// A font color as written to `w:color/@w:val`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hex(hex: &str) -> anyhow::Result<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(anyhow!("expected six hex digits for a color, got {hex:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .with_context(|| format!("invalid hex color: {hex}"))
        };
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// An opened word-processing template.
///
/// Owns the main document tree, the numbering definitions and the style catalog; every other
/// package entry is carried through to [`TemplateDocument::save`] byte for byte.
pub struct TemplateDocument {
    package: DocxPackage,
    tree: XmlTree,
    body: NodeId,
    numbering: NumberingStore,
    numbering_created: bool,
    styles: StyleCatalog,
}

impl TemplateDocument {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let package = DocxPackage::read(path)?;
        Self::from_package(package).with_context(|| format!("load template: {}", path.display()))
    }

    pub fn from_package(package: DocxPackage) -> anyhow::Result<Self> {
        let doc_bytes = package
            .part(DOCUMENT_PART)
            .with_context(|| format!("package has no {DOCUMENT_PART}"))?;
        let tree = XmlTree::parse(DOCUMENT_PART, doc_bytes)?;
        let body = tree
            .root_element()
            .and_then(|root| tree.first_child(root, "w:body"))
            .context("document has no w:body")?;

        let (numbering, numbering_created) = match package.part(NUMBERING_PART) {
            Some(bytes) => (NumberingStore::parse(bytes)?, false),
            None => (NumberingStore::with_default_bullets()?, true),
        };
        let styles = match package.part(STYLES_PART) {
            Some(bytes) => StyleCatalog::parse(bytes)?,
            None => StyleCatalog::default(),
        };

        Ok(Self {
            package,
            tree,
            body,
            numbering,
            numbering_created,
            styles,
        })
    }

    pub fn numbering(&self) -> &NumberingStore {
        &self.numbering
    }

    pub fn numbering_mut(&mut self) -> &mut NumberingStore {
        &mut self.numbering
    }

    // ---- paragraphs -------------------------------------------------------

    /// Body-level paragraphs in document order. Paragraphs inside tables are not included.
    pub fn paragraphs(&self) -> Vec<Paragraph> {
        self.tree
            .child_elements(self.body, "w:p")
            .into_iter()
            .map(Paragraph)
            .collect()
    }

    pub fn runs(&self, p: Paragraph) -> Vec<Run> {
        self.tree
            .child_elements(p.0, "w:r")
            .into_iter()
            .map(Run)
            .collect()
    }

    pub fn paragraph_text(&self, p: Paragraph) -> String {
        let mut out = String::new();
        for &child in self.tree.children(p.0) {
            match self.tree.element_name(child) {
                Some("w:r") => out.push_str(&self.run_text(Run(child))),
                Some("w:hyperlink") => {
                    for r in self.tree.child_elements(child, "w:r") {
                        out.push_str(&self.run_text(Run(r)));
                    }
                }
                _ => {}
            }
        }
        out
    }

    pub fn insert_paragraph_after(&mut self, anchor: Paragraph) -> anyhow::Result<Paragraph> {
        let p = self.tree.new_element("w:p", &[]);
        self.tree.insert_after(anchor.0, p)?;
        Ok(Paragraph(p))
    }

    pub fn delete_paragraph(&mut self, p: Paragraph) {
        self.tree.detach(p.0);
    }

    pub fn add_run(&mut self, p: Paragraph, text: &str) -> Run {
        let r = self.tree.new_element("w:r", &[]);
        self.tree.append_child(p.0, r);
        let run = Run(r);
        self.set_run_text(run, text);
        run
    }

    /// Clears the text of every run in the paragraph, keeping the runs themselves.
    pub fn clear_paragraph_text(&mut self, p: Paragraph) {
        for r in self.runs(p) {
            self.set_run_text(r, "");
        }
    }

    pub fn paragraph_style(&self, p: Paragraph) -> Option<String> {
        let ppr = self.tree.first_child(p.0, "w:pPr")?;
        let style = self.tree.first_child(ppr, "w:pStyle")?;
        self.tree.attr(style, "w:val").map(str::to_string)
    }

    /// Sets the paragraph style by UI name (e.g. `List Bullet`).
    pub fn set_paragraph_style(&mut self, p: Paragraph, style_name: &str) {
        let style_id = self.styles.id_for_name(style_name);
        let ppr = self.tree.get_or_add_ordered(p.0, "w:pPr", P_ORDER);
        let style = self.tree.get_or_add_ordered(ppr, "w:pStyle", PPR_ORDER);
        self.tree.set_attr(style, "w:val", &style_id);
    }

    /// Style id the paragraph renders with, defaulting to the template's default style.
    pub fn effective_style_id(&self, p: Paragraph) -> String {
        self.paragraph_style(p)
            .unwrap_or_else(|| self.styles.default_paragraph_style().to_string())
    }

    /// `(numId, ilvl)` from the paragraph's direct numbering properties.
    pub fn paragraph_numbering(&self, p: Paragraph) -> Option<(u32, u32)> {
        let ppr = self.tree.first_child(p.0, "w:pPr")?;
        let num_pr = self.tree.first_child(ppr, "w:numPr")?;
        let num_id = self
            .tree
            .first_child(num_pr, "w:numId")
            .and_then(|n| parse_u32(self.tree.attr(n, "w:val")))?;
        let ilvl = self
            .tree
            .first_child(num_pr, "w:ilvl")
            .and_then(|n| parse_u32(self.tree.attr(n, "w:val")))
            .unwrap_or(0);
        Some((num_id, ilvl))
    }

    pub fn set_paragraph_numbering(&mut self, p: Paragraph, num_id: u32, level: u32) {
        let ppr = self.tree.get_or_add_ordered(p.0, "w:pPr", P_ORDER);
        let num_pr = self.tree.get_or_add_ordered(ppr, "w:numPr", PPR_ORDER);
        let ilvl = self.tree.get_or_add_ordered(num_pr, "w:ilvl", NUMPR_ORDER);
        self.tree.set_attr(ilvl, "w:val", &level.to_string());
        let num = self.tree.get_or_add_ordered(num_pr, "w:numId", NUMPR_ORDER);
        self.tree.set_attr(num, "w:val", &num_id.to_string());
    }

    // ---- runs -------------------------------------------------------------

    pub fn run_text(&self, r: Run) -> String {
        let mut out = String::new();
        for &child in self.tree.children(r.0) {
            match self.tree.element_name(child) {
                Some("w:t") => out.push_str(&self.tree.text_content(child)),
                Some("w:tab") | Some("w:ptab") => out.push('\t'),
                Some("w:br") | Some("w:cr") => out.push('\n'),
                Some("w:noBreakHyphen") => out.push('-'),
                _ => {}
            }
        }
        out
    }

    /// Replaces the run's content with `text`, keeping its run properties.
    ///
    /// Tabs and newlines become `w:tab` / `w:br` elements.
    pub fn set_run_text(&mut self, r: Run, text: &str) {
        self.tree.retain_children(r.0, &["w:rPr"]);
        let mut pending = String::new();
        for ch in text.chars() {
            match ch {
                '\t' | '\n' => {
                    self.flush_text(r, &mut pending);
                    let name = if ch == '\t' { "w:tab" } else { "w:br" };
                    let el = self.tree.new_element(name, &[]);
                    self.tree.append_child(r.0, el);
                }
                _ => pending.push(ch),
            }
        }
        self.flush_text(r, &mut pending);
    }

    fn flush_text(&mut self, r: Run, pending: &mut String) {
        if pending.is_empty() {
            return;
        }
        let t = self.tree.new_element("w:t", &[("xml:space", "preserve")]);
        let txt = self.tree.new_text(pending);
        self.tree.append_child(t, txt);
        self.tree.append_child(r.0, t);
        pending.clear();
    }

    pub fn set_run_bold(&mut self, r: Run, bold: bool) {
        let rpr = self.tree.get_or_add_ordered(r.0, "w:rPr", R_ORDER);
        let b = self.tree.get_or_add_ordered(rpr, "w:b", RPR_ORDER);
        if bold {
            self.tree.remove_attr(b, "w:val");
        } else {
            self.tree.set_attr(b, "w:val", "0");
        }
    }

    pub fn run_bold(&self, r: Run) -> Option<bool> {
        let rpr = self.tree.first_child(r.0, "w:rPr")?;
        let b = self.tree.first_child(rpr, "w:b")?;
        Some(!matches!(
            self.tree.attr(b, "w:val"),
            Some("0") | Some("false") | Some("off")
        ))
    }

    pub fn set_run_color(&mut self, r: Run, color: Rgb) {
        let rpr = self.tree.get_or_add_ordered(r.0, "w:rPr", R_ORDER);
        let c = self.tree.get_or_add_ordered(rpr, "w:color", RPR_ORDER);
        self.tree.set_attr(c, "w:val", &color.to_string());
    }

    pub fn run_color(&self, r: Run) -> Option<Rgb> {
        let rpr = self.tree.first_child(r.0, "w:rPr")?;
        let c = self.tree.first_child(rpr, "w:color")?;
        self.tree.attr(c, "w:val").and_then(|v| Rgb::from_hex(v).ok())
    }

    // ---- tables -----------------------------------------------------------

    pub fn tables(&self) -> Vec<Table> {
        self.tree
            .child_elements(self.body, "w:tbl")
            .into_iter()
            .map(Table)
            .collect()
    }

    pub fn rows(&self, t: Table) -> Vec<Row> {
        self.tree
            .child_elements(t.0, "w:tr")
            .into_iter()
            .map(Row)
            .collect()
    }

    pub fn cells(&self, row: Row) -> Vec<Cell> {
        self.tree
            .child_elements(row.0, "w:tc")
            .into_iter()
            .map(Cell)
            .collect()
    }

    pub fn cell(&self, t: Table, row: usize, col: usize) -> Option<Cell> {
        let r = *self.rows(t).get(row)?;
        self.cells(r).get(col).copied()
    }

    /// Cell paragraphs' text joined with newlines.
    pub fn cell_text(&self, c: Cell) -> String {
        self.tree
            .child_elements(c.0, "w:p")
            .into_iter()
            .map(|p| self.paragraph_text(Paragraph(p)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Leaves the cell with a single paragraph holding `text`.
    ///
    /// The first paragraph's `w:pPr` and its first run's `w:rPr` are carried over so the cell
    /// keeps the template's alignment and font.
    pub fn set_cell_text(&mut self, c: Cell, text: &str) {
        self.rewrite_cell(c, text, true);
    }

    fn rewrite_cell(&mut self, c: Cell, text: &str, keep_run_props: bool) {
        let first_p = self.tree.first_child(c.0, "w:p");
        let ppr = first_p.and_then(|p| self.tree.first_child(p, "w:pPr"));
        let rpr = first_p
            .filter(|_| keep_run_props)
            .and_then(|p| self.tree.first_child(p, "w:r"))
            .and_then(|r| self.tree.first_child(r, "w:rPr"));

        self.tree.retain_children(c.0, &["w:tcPr"]);

        let p = self.tree.new_element("w:p", &[]);
        self.tree.append_child(c.0, p);
        if let Some(ppr) = ppr {
            self.tree.append_child(p, ppr);
        }
        if text.is_empty() && rpr.is_none() {
            return;
        }
        let r = self.tree.new_element("w:r", &[]);
        self.tree.append_child(p, r);
        if let Some(rpr) = rpr {
            self.tree.append_child(r, rpr);
        }
        self.set_run_text(Run(r), text);
    }

    /// Appends a copy of the table's last row with every cell emptied.
    ///
    /// The copy never repeats as a header row. When the table has only its header row, the
    /// header's run properties are dropped too.
    pub fn add_row(&mut self, t: Table) -> anyhow::Result<Row> {
        let rows = self.rows(t);
        let last = *rows
            .last()
            .context("cannot add a row to a table without rows")?;
        let from_header = rows.len() == 1;
        let copy = self.tree.deep_clone(last.0);
        self.tree.insert_after(last.0, copy)?;

        if let Some(trpr) = self.tree.first_child(copy, "w:trPr") {
            for h in self.tree.child_elements(trpr, "w:tblHeader") {
                self.tree.detach(h);
            }
            if self.tree.children(trpr).is_empty() {
                self.tree.detach(trpr);
            }
        }
        let row = Row(copy);
        for c in self.cells(row) {
            self.rewrite_cell(c, "", !from_header);
        }
        Ok(row)
    }

    pub fn remove_row(&mut self, row: Row) {
        self.tree.detach(row.0);
    }

    // ---- persistence ------------------------------------------------------

    /// Serialized main document part as it would be saved.
    pub fn to_document_bytes(&self) -> anyhow::Result<Vec<u8>> {
        self.tree.to_bytes()
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let mut replacements: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        replacements.insert(DOCUMENT_PART.to_string(), self.tree.to_bytes()?);
        replacements.insert(NUMBERING_PART.to_string(), self.numbering.to_bytes()?);
        if self.numbering_created {
            self.register_numbering_part(&mut replacements)?;
        }
        self.package
            .write_with_replacements(path, &replacements)
            .with_context(|| format!("save document: {}", path.display()))
    }

    fn register_numbering_part(
        &self,
        replacements: &mut BTreeMap<String, Vec<u8>>,
    ) -> anyhow::Result<()> {
        if let Some(bytes) = self.package.part(CONTENT_TYPES_PART) {
            let mut types = XmlTree::parse(CONTENT_TYPES_PART, bytes)?;
            let root = types.root_element().context("content types has no root")?;
            let part_name = format!("/{NUMBERING_PART}");
            let exists = types
                .child_elements(root, "Override")
                .into_iter()
                .any(|o| types.attr(o, "PartName") == Some(part_name.as_str()));
            if !exists {
                let o = types.new_element(
                    "Override",
                    &[
                        ("PartName", part_name.as_str()),
                        ("ContentType", NUMBERING_CONTENT_TYPE),
                    ],
                );
                types.append_child(root, o);
            }
            replacements.insert(CONTENT_TYPES_PART.to_string(), types.to_bytes()?);
        }

        if let Some(bytes) = self.package.part(DOCUMENT_RELS_PART) {
            let mut rels = XmlTree::parse(DOCUMENT_RELS_PART, bytes)?;
            let root = rels.root_element().context("relationships has no root")?;
            let existing = rels.child_elements(root, "Relationship");
            let exists = existing
                .iter()
                .any(|&r| rels.attr(r, "Type") == Some(NUMBERING_REL_TYPE));
            if !exists {
                let next = existing
                    .iter()
                    .filter_map(|&r| rels.attr(r, "Id"))
                    .filter_map(|id| id.strip_prefix("rId"))
                    .filter_map(|n| n.parse::<u32>().ok())
                    .max()
                    .unwrap_or(0)
                    + 1;
                let id = format!("rId{next}");
                let rel = rels.new_element(
                    "Relationship",
                    &[
                        ("Id", id.as_str()),
                        ("Type", NUMBERING_REL_TYPE),
                        ("Target", "numbering.xml"),
                    ],
                );
                rels.append_child(root, rel);
            }
            replacements.insert(DOCUMENT_RELS_PART.to_string(), rels.to_bytes()?);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Rgb, TemplateDocument};
    use crate::docx::package::{build_docx, DocxPackage};

    pub(crate) const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    pub(crate) fn document_xml(body: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#)
    }

    pub(crate) fn open_body(body: &str) -> TemplateDocument {
        let doc = document_xml(body);
        let bytes = build_docx(&[("word/document.xml", doc.as_str())]);
        TemplateDocument::from_package(DocxPackage::from_bytes(bytes).expect("package"))
            .expect("template")
    }

    #[test]
    fn run_text_reads_tabs_and_breaks() {
        let doc = open_body("<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/></w:r></w:p>");
        let p = doc.paragraphs()[0];
        let r = doc.runs(p)[0];
        assert_eq!(doc.run_text(r), "a\tb\n");
    }

    #[test]
    fn set_run_text_keeps_properties() {
        let mut doc = open_body(
            r#"<w:p><w:r><w:rPr><w:i/></w:rPr><w:t>{{ x }}</w:t></w:r></w:p>"#,
        );
        let p = doc.paragraphs()[0];
        let r = doc.runs(p)[0];
        doc.set_run_text(r, " y ");
        doc.set_run_bold(r, true);
        doc.set_run_color(r, Rgb(0x54, 0x8D, 0xD4));
        assert_eq!(doc.run_text(r), " y ");
        assert_eq!(doc.run_bold(r), Some(true));
        assert_eq!(doc.run_color(r), Some(Rgb(0x54, 0x8D, 0xD4)));
        let xml = String::from_utf8(doc.tree.to_bytes().expect("xml")).expect("utf8");
        assert!(xml.contains(r#"<w:rPr><w:b/><w:i/><w:color w:val="548DD4"/></w:rPr>"#));
    }

    #[test]
    fn paragraph_insert_and_delete() {
        let mut doc = open_body("<w:p><w:r><w:t>one</w:t></w:r></w:p><w:p><w:r><w:t>three</w:t></w:r></w:p>");
        let first = doc.paragraphs()[0];
        let second = doc.insert_paragraph_after(first).expect("insert");
        doc.add_run(second, "two");
        let texts: Vec<String> = doc.paragraphs().iter().map(|&p| doc.paragraph_text(p)).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        doc.delete_paragraph(first);
        assert_eq!(doc.paragraphs().len(), 2);
    }

    #[test]
    fn style_and_numbering_properties() {
        let mut doc = open_body(r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr></w:p>"#);
        let p = doc.paragraphs()[0];
        assert_eq!(doc.effective_style_id(p), "Normal");
        doc.set_paragraph_numbering(p, 4, 1);
        doc.set_paragraph_style(p, "List Bullet");
        assert_eq!(doc.paragraph_style(p).as_deref(), Some("ListBullet"));
        assert_eq!(doc.paragraph_numbering(p), Some((4, 1)));
        let xml = String::from_utf8(doc.tree.to_bytes().expect("xml")).expect("utf8");
        assert!(xml.contains(r#"<w:pPr><w:pStyle w:val="ListBullet"/><w:numPr><w:ilvl w:val="1"/><w:numId w:val="4"/></w:numPr><w:jc w:val="left"/></w:pPr>"#));
    }

    #[test]
    fn table_rows_and_cells() {
        let mut doc = open_body(concat!(
            "<w:tbl><w:tblPr/>",
            r#"<w:tr><w:tc><w:p><w:r><w:t>Criteria</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr>"#,
            r#"<w:tr><w:tc><w:tcPr/><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>x</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr>"#,
            "</w:tbl>"
        ));
        let t = doc.tables()[0];
        let header = doc.cell(t, 0, 0).expect("header cell");
        assert_eq!(doc.cell_text(header), "Criteria");

        let added = doc.add_row(t).expect("add row");
        assert_eq!(doc.rows(t).len(), 3);
        let c = doc.cells(added)[0];
        assert_eq!(doc.cell_text(c), "");
        doc.set_cell_text(c, "new");
        assert_eq!(doc.cell_text(c), "new");
        let xml = String::from_utf8(doc.tree.to_bytes().expect("xml")).expect("utf8");
        assert!(xml.contains(r#"<w:tc><w:tcPr/><w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">new</w:t></w:r></w:p></w:tc>"#));

        doc.remove_row(added);
        assert_eq!(doc.rows(t).len(), 2);
    }

    #[test]
    fn save_registers_created_numbering_part() {
        let doc_xml = document_xml("<w:p/>");
        let bytes = build_docx(&[
            (
                "[Content_Types].xml",
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#,
            ),
            (
                "word/_rels/document.xml.rels",
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId3" Type="urn:styles" Target="styles.xml"/></Relationships>"#,
            ),
            ("word/document.xml", doc_xml.as_str()),
        ]);
        let doc = TemplateDocument::from_package(DocxPackage::from_bytes(bytes).expect("pkg"))
            .expect("template");
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.docx");
        doc.save(&out).expect("save");

        let back = DocxPackage::read(&out).expect("reread");
        assert!(back.part("word/numbering.xml").is_some());
        let types = String::from_utf8_lossy(back.part("[Content_Types].xml").expect("types")).into_owned();
        assert!(types.contains(r#"PartName="/word/numbering.xml""#));
        let rels = String::from_utf8_lossy(back.part("word/_rels/document.xml.rels").expect("rels")).into_owned();
        assert!(rels.contains(r#"Id="rId4""#));
        assert!(rels.contains(r#"Target="numbering.xml""#));
    }

    #[test]
    fn rgb_parses_hex() {
        assert_eq!(Rgb::from_hex("548DD4").expect("hex"), Rgb(0x54, 0x8D, 0xD4));
        assert_eq!(Rgb::from_hex("#000000").expect("hex").to_string(), "000000");
        assert!(Rgb::from_hex("54").is_err());
    }
}

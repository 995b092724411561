use anyhow::Context;

use crate::docx::xml::{NodeId, XmlTree};

pub const NUMBERING_PART: &str = "word/numbering.xml";

/// Numbering part for templates that ship without one: a single bullet definition `0`.
const DEFAULT_NUMBERING_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="hybridMultilevel"/>"#,
    r#"<w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/>"#,
    r#"<w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl>"#,
    r#"</w:abstractNum></w:numbering>"#,
);

/// What an abstract definition's level is matched on.
#[derive(Clone, Copy, Debug)]
enum LevelMatch<'a> {
    Style(&'a str),
    Format(&'a str),
}

/// The template's numbering definitions, owned for the duration of a fill.
pub struct NumberingStore {
    tree: XmlTree,
    root: NodeId,
}

impl NumberingStore {
    pub fn parse(xml_bytes: &[u8]) -> anyhow::Result<Self> {
        let tree = XmlTree::parse(NUMBERING_PART, xml_bytes)?;
        let root = tree
            .root_element()
            .filter(|&r| tree.is_element(r, "w:numbering"))
            .context("numbering part has no w:numbering root")?;
        Ok(Self { tree, root })
    }

    pub fn with_default_bullets() -> anyhow::Result<Self> {
        Self::parse(DEFAULT_NUMBERING_XML.as_bytes())
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        self.tree.to_bytes()
    }

    /// Picks the abstract definition a new list should be derived from.
    ///
    /// Tried in order, lowest id wins within a step: single-level definitions styled with
    /// `style_id`, any definition whose `level` is styled with `style_id`, single-level
    /// definitions of the bullet/decimal format, any definition whose `level` has that format.
    /// Falls back to `0`.
    pub fn find_abstract(&self, style_id: &str, numbered: bool, level: u32) -> u32 {
        let format = if numbered { "decimal" } else { "bullet" };
        let searches = [
            (LevelMatch::Style(style_id), true),
            (LevelMatch::Style(style_id), false),
            (LevelMatch::Format(format), true),
            (LevelMatch::Format(format), false),
        ];
        for (wanted, single_only) in searches {
            let lvl = if single_only { 0 } else { level };
            let best = self
                .tree
                .child_elements(self.root, "w:abstractNum")
                .into_iter()
                .filter(|&an| self.abstract_matches(an, wanted, lvl, single_only))
                .filter_map(|an| parse_u32(self.tree.attr(an, "w:abstractNumId")))
                .min();
            if let Some(id) = best {
                return id;
            }
        }
        0
    }

    fn abstract_matches(&self, abstract_num: NodeId, wanted: LevelMatch<'_>, level: u32, single_only: bool) -> bool {
        let levels = self.tree.child_elements(abstract_num, "w:lvl");
        if single_only && levels.len() != 1 {
            return false;
        }
        levels
            .into_iter()
            .filter(|&l| parse_u32(self.tree.attr(l, "w:ilvl")) == Some(level))
            .any(|l| {
                let (child, want) = match wanted {
                    LevelMatch::Style(style) => ("w:pStyle", style),
                    LevelMatch::Format(fmt) => ("w:numFmt", fmt),
                };
                self.tree
                    .first_child(l, child)
                    .and_then(|c| self.tree.attr(c, "w:val"))
                    == Some(want)
            })
    }

    /// Adds a concrete numbering instance of `abstract_id` that restarts at 1 on `level`.
    pub fn allocate(&mut self, abstract_id: u32, level: u32) -> anyhow::Result<u32> {
        let used = self.num_ids();
        let num_id = (1..=used.len() as u32 + 1)
            .find(|n| !used.contains(n))
            .unwrap_or(1);

        let num_id_s = num_id.to_string();
        let abstract_s = abstract_id.to_string();
        let level_s = level.to_string();
        let num = self.tree.new_element("w:num", &[("w:numId", &num_id_s)]);
        let abstract_ref = self
            .tree
            .new_element("w:abstractNumId", &[("w:val", &abstract_s)]);
        let lvl_override = self.tree.new_element("w:lvlOverride", &[("w:ilvl", &level_s)]);
        let start = self.tree.new_element("w:startOverride", &[("w:val", "1")]);
        self.tree.append_child(lvl_override, start);
        self.tree.append_child(num, abstract_ref);
        self.tree.append_child(num, lvl_override);

        match self.tree.first_child(self.root, "w:numIdMacAtCleanup") {
            Some(cleanup) => self.tree.insert_before(cleanup, num)?,
            None => self.tree.append_child(self.root, num),
        }
        Ok(num_id)
    }

    pub fn num_ids(&self) -> Vec<u32> {
        self.tree
            .child_elements(self.root, "w:num")
            .into_iter()
            .filter_map(|n| parse_u32(self.tree.attr(n, "w:numId")))
            .collect()
    }

    pub fn start_override(&self, num_id: u32, level: u32) -> Option<u32> {
        let num = self.find_num(num_id)?;
        let ovr = self
            .tree
            .child_elements(num, "w:lvlOverride")
            .into_iter()
            .find(|&o| parse_u32(self.tree.attr(o, "w:ilvl")) == Some(level))?;
        let start = self.tree.first_child(ovr, "w:startOverride")?;
        parse_u32(self.tree.attr(start, "w:val"))
    }

    fn find_num(&self, num_id: u32) -> Option<NodeId> {
        self.tree
            .child_elements(self.root, "w:num")
            .into_iter()
            .find(|&n| parse_u32(self.tree.attr(n, "w:numId")) == Some(num_id))
    }
}

pub(crate) fn parse_u32(v: Option<&str>) -> Option<u32> {
    v.and_then(|s| s.trim().parse::<u32>().ok())
}

#[cfg(test)]
mod tests {
    use super::NumberingStore;

    const NUMBERING: &str = r#"<w:numbering xmlns:w="urn:w">
<w:abstractNum w:abstractNumId="7"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
<w:abstractNum w:abstractNumId="3"><w:lvl w:ilvl="0"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
<w:abstractNum w:abstractNumId="5"><w:lvl w:ilvl="0"><w:pStyle w:val="ListBullet"/><w:numFmt w:val="bullet"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl></w:abstractNum>
<w:abstractNum w:abstractNumId="9"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl><w:lvl w:ilvl="1"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum>
<w:num w:numId="1"><w:abstractNumId w:val="7"/></w:num>
<w:num w:numId="3"><w:abstractNumId w:val="3"/></w:num>
<w:numIdMacAtCleanup w:val="2"/>
</w:numbering>"#;

    fn store() -> NumberingStore {
        NumberingStore::parse(NUMBERING.as_bytes()).expect("parse numbering")
    }

    #[test]
    fn style_match_beats_format_match() {
        assert_eq!(store().find_abstract("ListBullet", false, 0), 5);
    }

    #[test]
    fn single_level_format_match_takes_lowest_id() {
        assert_eq!(store().find_abstract("Normal", false, 0), 3);
    }

    #[test]
    fn multi_level_format_match_uses_requested_level() {
        assert_eq!(store().find_abstract("Normal", true, 1), 9);
    }

    #[test]
    fn falls_back_to_zero() {
        let s = NumberingStore::parse(br#"<w:numbering xmlns:w="urn:w"/>"#).expect("parse");
        assert_eq!(s.find_abstract("Normal", true, 0), 0);
    }

    #[test]
    fn allocate_fills_first_gap_and_restarts_at_one() {
        let mut s = store();
        let id = s.allocate(5, 0).expect("allocate");
        assert_eq!(id, 2);
        assert_eq!(s.start_override(2, 0), Some(1));
        let next = s.allocate(5, 1).expect("allocate");
        assert_eq!(next, 4);
        assert_eq!(s.start_override(4, 1), Some(1));

        let xml = String::from_utf8(s.to_bytes().expect("write")).expect("utf8");
        assert!(xml.contains(r#"<w:num w:numId="2"><w:abstractNumId w:val="5"/>"#));
        let num_pos = xml.find(r#"<w:num w:numId="4">"#).expect("new num");
        let cleanup_pos = xml.find("<w:numIdMacAtCleanup").expect("cleanup");
        assert!(num_pos < cleanup_pos);
    }

    #[test]
    fn default_part_offers_bullets() {
        let mut s = NumberingStore::with_default_bullets().expect("default");
        assert_eq!(s.find_abstract("ListBullet", false, 0), 0);
        assert_eq!(s.allocate(0, 0).expect("allocate"), 1);
    }
}

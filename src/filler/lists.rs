use crate::docx::document::{Paragraph, Run, TemplateDocument};

/// How generated list paragraphs look.
#[derive(Clone, Copy, Debug)]
pub struct ListSpec<'a> {
    /// Paragraph style UI name, e.g. `List Bullet`.
    pub style: &'a str,
    /// Decimal numbering instead of bullets when no style-bound definition exists.
    pub numbered: bool,
    pub level: u32,
}

/// Turns `anchor` into the first item of a list of `items` and inserts the rest after it.
///
/// The first item's text goes into `anchor_run` (or the paragraph's first run). With no
/// items the anchor's text is cleared and nothing is inserted. Returns the list paragraphs in
/// document order.
pub fn materialize(
    doc: &mut TemplateDocument,
    anchor: Paragraph,
    anchor_run: Option<Run>,
    items: &[String],
    spec: &ListSpec<'_>,
) -> anyhow::Result<Vec<Paragraph>> {
    let Some((first, rest)) = items.split_first() else {
        doc.clear_paragraph_text(anchor);
        return Ok(Vec::new());
    };

    doc.set_paragraph_style(anchor, spec.style);
    list_number(doc, anchor, None, Some(spec.level), spec.numbered)?;
    match anchor_run.or_else(|| doc.runs(anchor).first().copied()) {
        Some(run) => doc.set_run_text(run, first),
        None => {
            doc.add_run(anchor, first);
        }
    }

    let mut out = Vec::with_capacity(items.len());
    out.push(anchor);
    out.extend(insert_items(doc, anchor, Some(anchor), rest, spec)?);
    Ok(out)
}

/// Inserts a fresh list of `items` right after `after`, which is not part of the list.
pub fn insert_list_after(
    doc: &mut TemplateDocument,
    after: Paragraph,
    items: &[String],
    spec: &ListSpec<'_>,
) -> anyhow::Result<Vec<Paragraph>> {
    insert_items(doc, after, None, items, spec)
}

fn insert_items(
    doc: &mut TemplateDocument,
    after: Paragraph,
    mut prev_item: Option<Paragraph>,
    items: &[String],
    spec: &ListSpec<'_>,
) -> anyhow::Result<Vec<Paragraph>> {
    let mut out = Vec::with_capacity(items.len());
    let mut cursor = after;
    for item in items {
        let p = doc.insert_paragraph_after(cursor)?;
        doc.add_run(p, item);
        doc.set_paragraph_style(p, spec.style);
        let level = prev_item.is_none().then_some(spec.level);
        list_number(doc, p, prev_item, level, spec.numbered)?;
        out.push(p);
        prev_item = Some(p);
        cursor = p;
    }
    Ok(out)
}

/// Gives `par` list numbering and returns the concrete numbering id used.
///
/// When `prev` carries numbering, `par` continues that list (same id; same level unless
/// `level` says otherwise). Otherwise a new numbering instance is allocated from the abstract
/// definition matching the paragraph's style, or the bullet/decimal format, restarting at 1.
pub fn list_number(
    doc: &mut TemplateDocument,
    par: Paragraph,
    prev: Option<Paragraph>,
    level: Option<u32>,
    numbered: bool,
) -> anyhow::Result<u32> {
    if let Some((num_id, prev_level)) = prev.and_then(|p| doc.paragraph_numbering(p)) {
        doc.set_paragraph_numbering(par, num_id, level.unwrap_or(prev_level));
        return Ok(num_id);
    }
    let level = level.unwrap_or(0);
    let style_id = doc.effective_style_id(par);
    let abstract_id = doc.numbering().find_abstract(&style_id, numbered, level);
    let num_id = doc.numbering_mut().allocate(abstract_id, level)?;
    doc.set_paragraph_numbering(par, num_id, level);
    Ok(num_id)
}

#[cfg(test)]
mod tests {
    use super::{insert_list_after, list_number, materialize, ListSpec};
    use crate::docx::document::tests::open_body;

    const BULLETS: ListSpec<'static> = ListSpec {
        style: "List Bullet",
        numbered: false,
        level: 0,
    };

    fn items(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn materializes_in_order_with_one_numbering_instance() {
        let mut doc = open_body(
            "<w:p><w:r><w:t>before</w:t></w:r></w:p><w:p><w:r><w:t>{{ inclusion_criteria }}</w:t></w:r></w:p><w:p><w:r><w:t>after</w:t></w:r></w:p>",
        );
        let anchor = doc.paragraphs()[1];
        let run = doc.runs(anchor)[0];
        let before = doc.numbering().num_ids().len();

        let list = materialize(&mut doc, anchor, Some(run), &items(&["a", "b", "c"]), &BULLETS)
            .expect("materialize");

        assert_eq!(list.len(), 3);
        assert_eq!(list[0], anchor);
        let texts: Vec<String> = doc.paragraphs().iter().map(|&p| doc.paragraph_text(p)).collect();
        assert_eq!(texts, ["before", "a", "b", "c", "after"]);

        let numbering: Vec<_> = list.iter().map(|&p| doc.paragraph_numbering(p)).collect();
        let first = numbering[0].expect("numbered");
        assert!(numbering.iter().all(|n| *n == Some(first)));
        assert_eq!(doc.numbering().num_ids().len(), before + 1);
        assert_eq!(doc.numbering().start_override(first.0, 0), Some(1));
        assert!(list
            .iter()
            .all(|&p| doc.paragraph_style(p).as_deref() == Some("ListBullet")));
    }

    #[test]
    fn empty_items_clear_anchor_only() {
        let mut doc = open_body(
            "<w:p><w:r><w:t>Criteria: </w:t></w:r><w:r><w:t>{{ exclusion_criteria }}</w:t></w:r></w:p>",
        );
        let anchor = doc.paragraphs()[0];
        let list = materialize(&mut doc, anchor, None, &[], &BULLETS).expect("materialize");
        assert!(list.is_empty());
        assert_eq!(doc.paragraphs().len(), 1);
        assert_eq!(doc.paragraph_text(anchor), "");
        assert!(doc.numbering().num_ids().is_empty());
    }

    #[test]
    fn separate_lists_restart_numbering() {
        let mut doc = open_body("<w:p/><w:p/>");
        let ps = doc.paragraphs();
        let a = insert_list_after(&mut doc, ps[0], &items(&["x"]), &BULLETS).expect("list a");
        let b = insert_list_after(&mut doc, ps[1], &items(&["y", "z"]), &BULLETS).expect("list b");
        let na = doc.paragraph_numbering(a[0]).expect("a numbered").0;
        let nb = doc.paragraph_numbering(b[0]).expect("b numbered").0;
        assert_ne!(na, nb);
        assert_eq!(doc.paragraph_numbering(b[1]).map(|n| n.0), Some(nb));
    }

    #[test]
    fn continuation_keeps_previous_level() {
        let mut doc = open_body("<w:p/><w:p/>");
        let ps = doc.paragraphs();
        let num = list_number(&mut doc, ps[0], None, Some(2), true).expect("first");
        let cont = list_number(&mut doc, ps[1], Some(ps[0]), None, true).expect("continued");
        assert_eq!(num, cont);
        assert_eq!(doc.paragraph_numbering(ps[1]), Some((num, 2)));
    }
}

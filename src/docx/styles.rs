use std::collections::HashMap;

use crate::docx::xml::XmlTree;

const FALLBACK_PARAGRAPH_STYLE: &str = "Normal";

/// Style name to style id lookup built from `word/styles.xml`.
#[derive(Clone, Debug, Default)]
pub struct StyleCatalog {
    ids_by_name: HashMap<String, String>,
    default_paragraph: Option<String>,
}

impl StyleCatalog {
    pub fn parse(xml_bytes: &[u8]) -> anyhow::Result<Self> {
        let tree = XmlTree::parse("word/styles.xml", xml_bytes)?;
        let mut catalog = StyleCatalog::default();
        let Some(root) = tree.root_element() else {
            return Ok(catalog);
        };
        for style in tree.child_elements(root, "w:style") {
            let Some(id) = tree.attr(style, "w:styleId") else {
                continue;
            };
            if let Some(name) = tree
                .first_child(style, "w:name")
                .and_then(|n| tree.attr(n, "w:val"))
            {
                catalog
                    .ids_by_name
                    .insert(name.to_lowercase(), id.to_string());
            }
            let is_paragraph = tree.attr(style, "w:type") == Some("paragraph");
            let is_default = matches!(tree.attr(style, "w:default"), Some("1") | Some("true"));
            if is_paragraph && is_default {
                catalog.default_paragraph = Some(id.to_string());
            }
        }
        Ok(catalog)
    }

    /// Resolves a UI style name such as `List Bullet` to its id.
    ///
    /// Unknown names fall back to the name with spaces removed, which is how Word derives ids
    /// for its built-in styles.
    pub fn id_for_name(&self, name: &str) -> String {
        self.ids_by_name
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.split_whitespace().collect())
    }

    pub fn default_paragraph_style(&self) -> &str {
        self.default_paragraph
            .as_deref()
            .unwrap_or(FALLBACK_PARAGRAPH_STYLE)
    }
}

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub struct DocxPackage {
    pub entries: Vec<DocxEntry>,
}

pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl DocxPackage {
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let f = File::open(path).with_context(|| format!("open docx: {}", path.display()))?;
        Self::from_reader(f).with_context(|| format!("read docx: {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> anyhow::Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    fn from_reader<R: Read + Seek>(reader: R) -> anyhow::Result<Self> {
        let mut zip = ZipArchive::new(reader).context("read zip")?;
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).context("read zip entry")?;
            entries.push(DocxEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// Writes the package with `replacements` swapped in by entry name.
    ///
    /// Replacements naming an entry the package does not have are appended as new deflated
    /// parts. The archive is assembled next to `output_path` and renamed into place only once
    /// it is complete, so a failed save never leaves a truncated document behind.
    pub fn write_with_replacements(
        &self,
        output_path: &Path,
        replacements: &BTreeMap<String, Vec<u8>>,
    ) -> anyhow::Result<()> {
        let staging = staging_path_for(output_path);
        let result = self
            .write_archive(&staging, replacements)
            .and_then(|()| {
                fs::rename(&staging, output_path).with_context(|| {
                    format!("move output docx into place: {}", output_path.display())
                })
            });
        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        result
    }

    fn write_archive(
        &self,
        path: &Path,
        replacements: &BTreeMap<String, Vec<u8>>,
    ) -> anyhow::Result<()> {
        let f = File::create(path)
            .with_context(|| format!("create output docx: {}", path.display()))?;
        let mut zout = ZipWriter::new(f);
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(&ent.name, opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(&ent.name, opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        for (name, data) in replacements {
            if self.entries.iter().any(|e| &e.name == name) {
                continue;
            }
            let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            zout.start_file(name.as_str(), opts)
                .with_context(|| format!("start zip file: {name}"))?;
            zout.write_all(data)
                .with_context(|| format!("write zip file: {name}"))?;
        }
        zout.finish().context("finish zip")?;
        Ok(())
    }
}

fn staging_path_for(output_path: &Path) -> PathBuf {
    let file_name = output_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("output.docx");
    output_path.with_file_name(format!(".{file_name}.partial"))
}

/// Builds an in-memory package from `(name, xml)` pairs.
#[cfg(test)]
pub(crate) fn build_docx(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zout.start_file(*name, SimpleFileOptions::default())
            .expect("start file");
        zout.write_all(body.as_bytes()).expect("write file");
    }
    zout.finish().expect("finish zip").into_inner()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{build_docx, DocxPackage};

    #[test]
    fn replacements_and_new_parts_are_written() {
        let bytes = build_docx(&[("a.xml", "<a/>"), ("b.xml", "<b/>")]);
        let pkg = DocxPackage::from_bytes(bytes).expect("read");
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.docx");

        let mut repl = BTreeMap::new();
        repl.insert("b.xml".to_string(), b"<b>x</b>".to_vec());
        repl.insert("c.xml".to_string(), b"<c/>".to_vec());
        pkg.write_with_replacements(&out, &repl).expect("write");

        let back = DocxPackage::read(&out).expect("reread");
        assert_eq!(back.part("a.xml"), Some(&b"<a/>"[..]));
        assert_eq!(back.part("b.xml"), Some(&b"<b>x</b>"[..]));
        assert_eq!(back.part("c.xml"), Some(&b"<c/>"[..]));
        assert!(!dir.path().join(".out.docx.partial").exists());
    }

    #[test]
    fn failed_save_leaves_no_file() {
        let bytes = build_docx(&[("a.xml", "<a/>")]);
        let pkg = DocxPackage::from_bytes(bytes).expect("read");
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("missing").join("out.docx");
        assert!(pkg.write_with_replacements(&out, &BTreeMap::new()).is_err());
        assert!(!out.exists());
    }
}

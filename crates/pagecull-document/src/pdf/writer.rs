// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — assemble an output document with `lopdf`, either as a clone
// of the source or as a fresh page tree holding a selection of its pages,
// then add bookmarks, metadata and overlay content and serialise it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use pagecull_core::error::{PagecullError, Result};
use tracing::{debug, info, instrument};

use super::reader::{INHERITABLE_KEYS, MAX_TREE_DEPTH, PdfReader, inherited_attribute, rectangle, resolve};
use super::strings::encode_text;

/// US Letter, used when a page carries no usable box at all.
const FALLBACK_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Opaque reference to a bookmark added with [`PdfWriter::add_outline_item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineHandle(usize);

#[derive(Debug, Clone)]
struct OutlineNode {
    title: String,
    page_index: usize,
    open: bool,
    children: Vec<usize>,
}

/// Builds an output PDF from a source document.
pub struct PdfWriter {
    document: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    /// Source page-tree objects to discard unless re-added (selection mode).
    retired: HashSet<ObjectId>,
    selection: bool,
    metadata: BTreeMap<String, String>,
    outline_nodes: Vec<OutlineNode>,
    outline_roots: Vec<usize>,
    outlines_dirty: bool,
}

impl PdfWriter {
    // -- Construction ---------------------------------------------------------

    /// Clone the whole source document, keeping metadata, outlines and
    /// destinations as they are.
    pub fn clone_of(reader: &PdfReader) -> Result<Self> {
        let document = reader.document().clone();
        let catalog = document
            .catalog()
            .map_err(|err| PagecullError::PdfError(format!("source has no catalog: {err}")))?;
        let pages_id = match catalog.get(b"Pages") {
            Ok(Object::Reference(id)) => *id,
            _ => {
                return Err(PagecullError::Structure(
                    "catalog /Pages is not an indirect reference".into(),
                ));
            }
        };

        Ok(Self {
            document,
            pages_id,
            page_ids: reader.page_ids().to_vec(),
            retired: HashSet::new(),
            selection: false,
            metadata: BTreeMap::new(),
            outline_nodes: Vec::new(),
            outline_roots: Vec::new(),
            outlines_dirty: false,
        })
    }

    /// Start an empty page tree over a copy of the source objects. Pages are
    /// added with [`PdfWriter::add_page`]; source outlines and metadata are
    /// not carried over.
    pub fn for_selection(reader: &PdfReader) -> Result<Self> {
        let mut document = reader.document().clone();

        let mut retired = HashSet::new();
        for page_id in reader.page_ids() {
            let mut node_id = *page_id;
            for _ in 0..MAX_TREE_DEPTH {
                if !retired.insert(node_id) {
                    break;
                }
                match document.get_dictionary(node_id).map(|node| node.get(b"Parent")) {
                    Ok(Ok(Object::Reference(parent))) => node_id = *parent,
                    _ => break,
                }
            }
        }

        let pages_id = document.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0_i64,
        });
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        document.trailer.remove(b"Info");

        Ok(Self {
            document,
            pages_id,
            page_ids: Vec::new(),
            retired,
            selection: true,
            metadata: BTreeMap::new(),
            outline_nodes: Vec::new(),
            outline_roots: Vec::new(),
            outlines_dirty: true,
        })
    }

    // -- Pages ----------------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids.get(index).copied().ok_or_else(|| {
            PagecullError::Structure(format!(
                "output page {index} out of range ({} pages)",
                self.page_ids.len()
            ))
        })
    }

    /// Append a source page to the selection and return its new index.
    ///
    /// Inherited attributes are copied onto the page first, since its new
    /// parent carries none.
    pub fn add_page(&mut self, source_page_id: ObjectId) -> Result<usize> {
        if !self.selection {
            return Err(PagecullError::Structure(
                "pages can only be added to a selection writer".into(),
            ));
        }
        if self.page_ids.contains(&source_page_id) {
            return Err(PagecullError::Structure(format!(
                "page {source_page_id:?} already added"
            )));
        }

        let mut materialized = Vec::new();
        for key in INHERITABLE_KEYS {
            if let Some(value) = inherited_attribute(&self.document, source_page_id, key)? {
                materialized.push((key, value.clone()));
            }
        }

        let page = self
            .document
            .get_object_mut(source_page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PagecullError::Structure(format!("page {source_page_id:?}: {err}")))?;
        for (key, value) in materialized {
            page.set(key, value);
        }
        page.set("Parent", self.pages_id);

        self.page_ids.push(source_page_id);
        Ok(self.page_ids.len() - 1)
    }

    /// Effective page box in points: the crop box, else the media box.
    pub fn page_box(&self, index: usize) -> Result<[f64; 4]> {
        let page_id = self.page_id(index)?;
        for key in [b"CropBox".as_slice(), b"MediaBox"] {
            if let Some(rect) = inherited_attribute(&self.document, page_id, key)?.and_then(rectangle)
            {
                return Ok(rect);
            }
        }
        Ok(FALLBACK_BOX)
    }

    // -- Metadata -------------------------------------------------------------

    /// Set one `/Info` string entry.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    // -- Outlines -------------------------------------------------------------

    /// Add a bookmark pointing at output page `page_index`, below `parent` or
    /// at the top level.
    pub fn add_outline_item(
        &mut self,
        title: &str,
        page_index: usize,
        parent: Option<OutlineHandle>,
        open: bool,
    ) -> Result<OutlineHandle> {
        self.page_id(page_index)?;
        let handle = self.outline_nodes.len();
        match parent {
            Some(OutlineHandle(parent)) => self
                .outline_nodes
                .get_mut(parent)
                .ok_or_else(|| PagecullError::OutlineCopy(format!("unknown outline parent {parent}")))?
                .children
                .push(handle),
            None => self.outline_roots.push(handle),
        }
        self.outline_nodes.push(OutlineNode {
            title: title.to_string(),
            page_index,
            open,
            children: Vec::new(),
        });
        self.outlines_dirty = true;
        Ok(OutlineHandle(handle))
    }

    /// Forget every bookmark, including any inherited from a cloned source.
    pub fn clear_outlines(&mut self) {
        self.outline_nodes.clear();
        self.outline_roots.clear();
        self.outlines_dirty = true;
    }

    pub fn outline_item_count(&self) -> usize {
        self.outline_nodes.len()
    }

    // -- Overlays -------------------------------------------------------------

    /// Store an object and return its id.
    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.document.add_object(object)
    }

    /// Make the font object `font_id` available to the page under a fresh
    /// resource name, which is returned.
    pub fn register_page_font(&mut self, page_index: usize, font_id: ObjectId) -> Result<String> {
        let page_id = self.page_id(page_index)?;

        let mut resources = match inherited_attribute(&self.document, page_id, b"Resources")? {
            Some(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        let mut fonts = match resources.get(b"Font").map(|f| resolve(&self.document, f)) {
            Ok(Ok(Object::Dictionary(dict))) => dict.clone(),
            _ => Dictionary::new(),
        };

        let name = (1..)
            .map(|n| format!("PgNum{n}"))
            .find(|candidate| !fonts.has(candidate.as_bytes()))
            .unwrap_or_else(|| "PgNum".to_string());
        fonts.set(name.as_bytes().to_vec(), font_id);
        resources.set("Font", fonts);

        self.document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PagecullError::Structure(format!("page {page_id:?}: {err}")))?
            .set("Resources", resources);
        Ok(name)
    }

    /// Append `content` as a new content stream painted after the existing
    /// ones, which are wrapped in `q … Q` so their state cannot leak into it.
    pub fn append_overlay(&mut self, page_index: usize, content: Vec<u8>) -> Result<()> {
        let page_id = self.page_id(page_index)?;
        let page = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| PagecullError::Structure(format!("page {page_id:?}: {err}")))?;

        let existing: Vec<Object> = match page.get(b"Contents") {
            Err(_) => Vec::new(),
            Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            Ok(other) => {
                return Err(PagecullError::Structure(format!(
                    "/Contents is a {}",
                    other.enum_variant()
                )));
            }
        };

        let overlay = self.document.add_object(Stream::new(dictionary! {}, content));
        let mut contents = Vec::with_capacity(existing.len() + 3);
        if !existing.is_empty() {
            let save = self.document.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            let restore = self.document.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
            contents.push(Object::Reference(save));
            contents.extend(existing);
            contents.push(Object::Reference(restore));
        }
        contents.push(Object::Reference(overlay));

        self.document
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PagecullError::Structure(format!("page {page_id:?}: {err}")))?
            .set("Contents", contents);
        Ok(())
    }

    // -- Isolation ------------------------------------------------------------

    /// Serialise output page `index` alone into a one-page PDF, copying only
    /// the objects it references.
    pub fn single_page_pdf(&self, index: usize) -> Result<Vec<u8>> {
        let page_id = self.page_id(index)?;
        let mut page = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| PagecullError::Structure(format!("page {page_id:?}: {err}")))?
            .clone();
        for key in INHERITABLE_KEYS {
            if !page.has(key)
                && let Some(value) = inherited_attribute(&self.document, page_id, key)?
            {
                page.set(key, value.clone());
            }
        }

        let mut out = Document::with_version(self.document.version.clone());
        let new_page_id = out.new_object_id();
        let mut copied = HashMap::from([(page_id, new_page_id)]);
        let Object::Dictionary(mut page) = self.import(&mut out, &Object::Dictionary(page), &mut copied, 0)
        else {
            return Err(PagecullError::Structure("page import lost its dictionary".into()));
        };

        let pages_id = out.new_object_id();
        page.set("Parent", pages_id);
        out.objects.insert(new_page_id, Object::Dictionary(page));
        out.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(new_page_id)],
                "Count" => 1_i64,
            }),
        );
        let catalog_id = out.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        out.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        out.save_to(&mut bytes)
            .map_err(|err| PagecullError::PdfError(format!("failed to serialise page {index}: {err}")))?;
        Ok(bytes)
    }

    /// Deep-copy `object` into `out`, remapping references. Links to other
    /// pages or page-tree nodes become `null`.
    fn import(
        &self,
        out: &mut Document,
        object: &Object,
        copied: &mut HashMap<ObjectId, ObjectId>,
        depth: usize,
    ) -> Object {
        if depth > MAX_TREE_DEPTH * 4 {
            return Object::Null;
        }
        match object {
            Object::Reference(id) => {
                if let Some(new_id) = copied.get(id) {
                    return Object::Reference(*new_id);
                }
                let Ok(target) = self.document.get_object(*id) else {
                    return Object::Null;
                };
                if let Ok(dict) = target.as_dict()
                    && matches!(dict.get(b"Type"), Ok(Object::Name(kind)) if kind.as_slice() == b"Page" || kind.as_slice() == b"Pages")
                {
                    return Object::Null;
                }
                let new_id = out.new_object_id();
                copied.insert(*id, new_id);
                let imported = self.import(out, target, copied, depth + 1);
                out.objects.insert(new_id, imported);
                Object::Reference(new_id)
            }
            Object::Dictionary(dict) => Object::Dictionary(self.import_dict(out, dict, copied, depth)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import(out, item, copied, depth + 1))
                    .collect(),
            ),
            Object::Stream(stream) => {
                let mut stream = stream.clone();
                stream.dict = self.import_dict(out, &stream.dict, copied, depth);
                Object::Stream(stream)
            }
            other => other.clone(),
        }
    }

    fn import_dict(
        &self,
        out: &mut Document,
        dict: &Dictionary,
        copied: &mut HashMap<ObjectId, ObjectId>,
        depth: usize,
    ) -> Dictionary {
        let mut imported = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" || key.as_slice() == b"P" {
                continue;
            }
            imported.set(key.clone(), self.import(out, value, copied, depth + 1));
        }
        imported
    }

    // -- Serialisation --------------------------------------------------------

    /// Finish the document and return its bytes.
    #[instrument(skip_all, fields(pages = self.page_ids.len(), selection = self.selection))]
    pub fn serialize(mut self) -> Result<Vec<u8>> {
        if self.selection {
            let kept: HashSet<ObjectId> = self.page_ids.iter().copied().collect();
            for id in self.retired.iter().filter(|id| !kept.contains(id)) {
                self.document.objects.remove(id);
            }
            let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
            let pages = self
                .document
                .get_object_mut(self.pages_id)
                .and_then(Object::as_dict_mut)
                .map_err(|err| PagecullError::Structure(format!("output page tree: {err}")))?;
            pages.set("Count", kids.len() as i64);
            pages.set("Kids", kids);
        }

        if !self.metadata.is_empty() {
            let mut info = Dictionary::new();
            for (key, value) in &self.metadata {
                info.set(key.as_bytes().to_vec(), encode_text(value));
            }
            let info_id = self.document.add_object(info);
            self.document.trailer.set("Info", info_id);
        }

        if self.outlines_dirty {
            self.write_outlines()?;
        }

        if self.selection {
            let pruned = self.document.prune_objects();
            debug!(pruned = pruned.len(), "Unreferenced objects pruned");
        }

        let mut bytes = Vec::new();
        self.document
            .save_to(&mut bytes)
            .map_err(|err| PagecullError::PdfError(format!("failed to serialise PDF: {err}")))?;
        info!(bytes = bytes.len(), "PDF serialised");
        Ok(bytes)
    }

    fn catalog_mut(&mut self) -> Result<&mut Dictionary> {
        let catalog_id = match self.document.trailer.get(b"Root") {
            Ok(Object::Reference(id)) => *id,
            _ => return Err(PagecullError::Structure("trailer /Root is not a reference".into())),
        };
        self.document
            .get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| PagecullError::Structure(format!("catalog: {err}")))
    }

    fn write_outlines(&mut self) -> Result<()> {
        if self.outline_roots.is_empty() {
            self.catalog_mut()?.remove(b"Outlines");
            return Ok(());
        }

        let root_id = self.document.new_object_id();
        let ids: Vec<ObjectId> = (0..self.outline_nodes.len())
            .map(|_| self.document.new_object_id())
            .collect();

        let roots = self.outline_roots.clone();
        self.link_outline_level(&roots, root_id, &ids)?;

        let visible: i64 = roots.iter().map(|&node| 1 + self.open_descendants(node)).sum();
        self.document.objects.insert(
            root_id,
            Object::Dictionary(dictionary! {
                "Type" => "Outlines",
                "First" => ids[roots[0]],
                "Last" => ids[roots[roots.len() - 1]],
                "Count" => visible,
            }),
        );
        self.catalog_mut()?.set("Outlines", root_id);
        Ok(())
    }

    fn link_outline_level(&mut self, level: &[usize], parent_id: ObjectId, ids: &[ObjectId]) -> Result<()> {
        for (position, &node_index) in level.iter().enumerate() {
            let node = self.outline_nodes[node_index].clone();
            let page_id = self.page_id(node.page_index)?;

            let mut item = dictionary! {
                "Title" => encode_text(&node.title),
                "Parent" => parent_id,
                "Dest" => vec![Object::Reference(page_id), Object::Name(b"Fit".to_vec())],
            };
            if position > 0 {
                item.set("Prev", ids[level[position - 1]]);
            }
            if let Some(next) = level.get(position + 1) {
                item.set("Next", ids[*next]);
            }
            if let (Some(first), Some(last)) = (node.children.first(), node.children.last()) {
                item.set("First", ids[*first]);
                item.set("Last", ids[*last]);
                let descendants = node
                    .children
                    .iter()
                    .map(|&child| 1 + self.open_descendants(child))
                    .sum::<i64>();
                item.set("Count", if node.open { descendants } else { -descendants });
            }
            self.document.objects.insert(ids[node_index], Object::Dictionary(item));
            self.link_outline_level(&node.children, ids[node_index], ids)?;
        }
        Ok(())
    }

    /// Descendants of `node` visible while it is displayed.
    fn open_descendants(&self, node: usize) -> i64 {
        let node = &self.outline_nodes[node];
        if !node.open {
            return 0;
        }
        node.children
            .iter()
            .map(|&child| 1 + self.open_descendants(child))
            .sum()
    }
}

/// Write `bytes` to a temporary file next to `path` and move it into place.
/// Fails rather than replacing a file that already exists at `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(directory)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist_noclobber(path)
        .map_err(|err| PagecullError::Io(err.error))?;
    debug!(path = %path.display(), bytes = bytes.len(), "Output persisted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{FixtureOutline, FixturePage, PdfFixture};

    fn reader(fixture: PdfFixture) -> PdfReader {
        PdfReader::from_bytes(fixture.to_bytes()).unwrap()
    }

    fn three_pages() -> PdfFixture {
        PdfFixture::new()
            .page(FixturePage::text("one"))
            .page(FixturePage::text("two"))
            .page(FixturePage::text("three"))
            .info("Title", "Report")
    }

    #[test]
    fn selection_keeps_only_added_pages_with_inherited_attributes() {
        let source = reader(three_pages());
        let mut writer = PdfWriter::for_selection(&source).unwrap();
        writer.add_page(source.page_ids()[2]).unwrap();
        writer.add_page(source.page_ids()[0]).unwrap();
        let output = PdfReader::from_bytes(writer.serialize().unwrap()).unwrap();

        assert_eq!(output.page_count(), 2);
        let first = output.page(0).unwrap();
        assert_eq!(first.media_box, Some([0.0, 0.0, 612.0, 792.0]));
        assert_eq!(first.resources.fonts, vec!["F1".to_string()]);
        assert_eq!(first.contents.joined(), b"BT /F1 24 Tf 72 700 Td (three) Tj ET".to_vec());
        assert!(output.metadata().is_empty());
        assert!(output.outlines().unwrap().is_empty());
    }

    #[test]
    fn adding_a_page_twice_is_rejected() {
        let source = reader(three_pages());
        let mut writer = PdfWriter::for_selection(&source).unwrap();
        writer.add_page(source.page_ids()[0]).unwrap();
        assert!(writer.add_page(source.page_ids()[0]).is_err());
    }

    #[test]
    fn metadata_is_written_as_text_strings() {
        let source = reader(three_pages());
        let mut writer = PdfWriter::for_selection(&source).unwrap();
        writer.add_page(source.page_ids()[1]).unwrap();
        writer.set_metadata("Title", "Rapport annuel é");
        let output = PdfReader::from_bytes(writer.serialize().unwrap()).unwrap();
        assert_eq!(
            output.metadata().get("Title").map(String::as_str),
            Some("Rapport annuel é")
        );
    }

    #[test]
    fn outline_items_nest_and_keep_open_state() {
        let source = reader(three_pages());
        let mut writer = PdfWriter::for_selection(&source).unwrap();
        for id in source.page_ids() {
            writer.add_page(*id).unwrap();
        }
        let part = writer.add_outline_item("Part I", 0, None, false).unwrap();
        writer.add_outline_item("Chapter 1", 1, Some(part), true).unwrap();
        writer.add_outline_item("Index", 2, None, true).unwrap();
        assert!(writer.add_outline_item("Nowhere", 9, None, true).is_err());
        assert_eq!(writer.outline_item_count(), 3);

        let output = PdfReader::from_bytes(writer.serialize().unwrap()).unwrap();
        let outlines = output.outlines().unwrap();
        assert_eq!(outlines.len(), 2);
        assert_eq!(outlines[0].title, "Part I");
        assert!(!outlines[0].open);
        assert_eq!(outlines[0].children[0].title, "Chapter 1");
        assert_eq!(outlines[0].children[0].page_index, Some(1));
        assert_eq!(outlines[1].page_index, Some(2));
    }

    #[test]
    fn clone_keeps_source_outlines_until_cleared() {
        let fixture = three_pages().outline(FixtureOutline::to_page("Start", 0));
        let source = reader(fixture);

        let kept = PdfWriter::clone_of(&source).unwrap().serialize().unwrap();
        let kept = PdfReader::from_bytes(kept).unwrap();
        assert_eq!(kept.outlines().unwrap().len(), 1);
        assert_eq!(kept.metadata().get("Title").map(String::as_str), Some("Report"));

        let mut cleared = PdfWriter::clone_of(&source).unwrap();
        cleared.clear_outlines();
        let cleared = PdfReader::from_bytes(cleared.serialize().unwrap()).unwrap();
        assert!(cleared.outlines().unwrap().is_empty());
        assert_eq!(cleared.page_count(), 3);
    }

    #[test]
    fn overlay_is_appended_after_isolated_content() {
        let source = reader(PdfFixture::new().page(FixturePage::text("body")));
        let mut writer = PdfWriter::clone_of(&source).unwrap();
        let font = writer.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let name = writer.register_page_font(0, font).unwrap();
        assert_eq!(name, "PgNum1");
        writer
            .append_overlay(0, format!("BT /{name} 10 Tf (3) Tj ET").into_bytes())
            .unwrap();

        let output = PdfReader::from_bytes(writer.serialize().unwrap()).unwrap();
        let page = output.page(0).unwrap();
        assert_eq!(page.contents.streams().len(), 4);
        assert_eq!(
            String::from_utf8(page.contents.joined()).unwrap(),
            "q\n\nBT /F1 24 Tf 72 700 Td (body) Tj ET\n\nQ\n\nBT /PgNum1 10 Tf (3) Tj ET"
        );
        assert_eq!(page.resources.fonts, vec!["F1".to_string(), "PgNum1".to_string()]);
    }

    #[test]
    fn single_page_pdf_carries_only_that_page() {
        let source = reader(three_pages());
        let writer = PdfWriter::clone_of(&source).unwrap();
        let isolated = PdfReader::from_bytes(writer.single_page_pdf(1).unwrap()).unwrap();
        assert_eq!(isolated.page_count(), 1);
        let page = isolated.page(0).unwrap();
        assert_eq!(page.media_box, Some([0.0, 0.0, 612.0, 792.0]));
        assert_eq!(page.contents.joined(), b"BT /F1 24 Tf 72 700 Td (two) Tj ET".to_vec());
    }

    #[test]
    fn page_box_prefers_crop_box() {
        let source = reader(three_pages());
        let writer = PdfWriter::clone_of(&source).unwrap();
        assert_eq!(writer.page_box(0).unwrap(), [0.0, 0.0, 612.0, 792.0]);
        assert!(writer.page_box(3).is_err());
    }

    #[test]
    fn atomic_write_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        write_atomic(&path, b"%PDF-1.5 first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5 first");
        assert!(write_atomic(&path, b"%PDF-1.5 second").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.5 first");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open an existing document with `lopdf` and expose a typed view
// of its pages (resolved resources, annotations, decoded content streams,
// boxes), its outline tree, named destinations and string metadata.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pagecull_core::error::{PagecullError, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::strings::decode_text;

/// Limit for `/Parent` chains, outline nesting and name-tree recursion.
pub(crate) const MAX_TREE_DEPTH: usize = 64;

/// Page attributes that may be inherited from an ancestor `/Pages` node.
pub(crate) const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

// -- Page model ---------------------------------------------------------------

/// Opacity entries of one `/ExtGState` resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ExtGState {
    /// `/ca`
    pub fill_opacity: Option<f32>,
    /// `/CA`
    pub stroke_opacity: Option<f32>,
}

/// The parts of a page's resource dictionary the detectors look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageResources {
    /// Top-level keys present (`Font`, `XObject`, ...).
    pub keys: Vec<String>,
    pub fonts: Vec<String>,
    pub xobjects: Vec<String>,
    pub ext_gstates: BTreeMap<String, ExtGState>,
}

/// Decoded content streams of a page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageContents {
    None,
    Single(Vec<u8>),
    Multi(Vec<Vec<u8>>),
}

impl PageContents {
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn streams(&self) -> Vec<&[u8]> {
        match self {
            Self::None => Vec::new(),
            Self::Single(bytes) => vec![bytes.as_slice()],
            Self::Multi(streams) => streams.iter().map(Vec::as_slice).collect(),
        }
    }

    /// All streams concatenated, separated by a newline so tokens never fuse
    /// across stream boundaries.
    pub fn joined(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for stream in self.streams() {
            if !out.is_empty() {
                out.push(b'\n');
            }
            out.extend_from_slice(stream);
        }
        out
    }
}

/// One page, resolved at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct PageModel {
    /// 0-based position in the page tree.
    pub index: usize,
    pub object_id: ObjectId,
    pub resources: PageResources,
    pub contents: PageContents,
    pub annotations_count: usize,
    pub media_box: Option<[f64; 4]>,
    pub crop_box: Option<[f64; 4]>,
}

/// One bookmark in the source outline tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlineEntry {
    pub title: String,
    /// Target page, when the destination resolves to a page of this document.
    pub page_index: Option<usize>,
    pub open: bool,
    pub children: Vec<OutlineEntry>,
}

impl OutlineEntry {
    /// This entry plus all of its descendants.
    pub fn item_count(&self) -> usize {
        1 + self.children.iter().map(OutlineEntry::item_count).sum::<usize>()
    }
}

// -- Reader -------------------------------------------------------------------

/// Read-only access to a source PDF.
///
/// Keeps the original bytes alongside the parsed `lopdf::Document` so that a
/// no-op rewrite can copy them unchanged and a renderer can open the same
/// input without touching the filesystem again.
pub struct PdfReader {
    document: Document,
    source_bytes: Vec<u8>,
    source_path: Option<PathBuf>,
    page_ids: Vec<ObjectId>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem. Encrypted documents are rejected.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let bytes = std::fs::read(path_ref)?;
        let mut reader = Self::load(bytes)?;
        reader.source_path = Some(path_ref.to_path_buf());
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::load(data)
    }

    fn load(bytes: Vec<u8>) -> Result<Self> {
        let document = Document::load_mem(&bytes).map_err(|err| {
            let message = err.to_string();
            if declares_encryption(&bytes) || message.to_ascii_lowercase().contains("crypt") {
                PagecullError::Encrypted
            } else {
                PagecullError::PdfError(format!("failed to load PDF: {message}"))
            }
        })?;

        if document.is_encrypted() || document.trailer.has(b"Encrypt") {
            warn!("Rejecting encrypted PDF");
            return Err(PagecullError::Encrypted);
        }

        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = page_ids.len(), "PDF loaded");

        Ok(Self {
            document,
            source_bytes: bytes,
            source_path: None,
            page_ids,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_ids(&self) -> &[ObjectId] {
        &self.page_ids
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn source_bytes(&self) -> &[u8] {
        &self.source_bytes
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Resolve one page into its typed model.
    ///
    /// Any structural surprise (wrong object type, dangling reference, broken
    /// stream filter) is reported as [`PagecullError::Structure`].
    pub fn page(&self, index: usize) -> Result<PageModel> {
        let object_id = *self.page_ids.get(index).ok_or_else(|| {
            PagecullError::Structure(format!(
                "page {index} out of range (document has {} pages)",
                self.page_ids.len()
            ))
        })?;
        let page = self
            .document
            .get_dictionary(object_id)
            .map_err(|err| structure(format!("page {index} is not a dictionary: {err}")))?;

        let resources = match inherited_attribute(&self.document, object_id, b"Resources")? {
            Some(object) => page_resources(&self.document, object)?,
            None => PageResources::default(),
        };
        let contents = page_contents(&self.document, page)?;
        let annotations_count = match page.get(b"Annots") {
            Ok(annots) => match resolve(&self.document, annots)? {
                Object::Array(items) => items.len(),
                Object::Null => 0,
                other => {
                    return Err(structure(format!(
                        "/Annots is a {}, expected an array",
                        other.enum_variant()
                    )));
                }
            },
            Err(_) => 0,
        };
        let media_box = inherited_attribute(&self.document, object_id, b"MediaBox")?
            .and_then(rectangle);
        let crop_box =
            inherited_attribute(&self.document, object_id, b"CropBox")?.and_then(rectangle);

        Ok(PageModel {
            index,
            object_id,
            resources,
            contents,
            annotations_count,
            media_box,
            crop_box,
        })
    }

    // -- Outlines and destinations --------------------------------------------

    /// Walk the `/Outlines` tree into [`OutlineEntry`] values.
    ///
    /// Returns an [`PagecullError::OutlineCopy`] error for structurally broken
    /// trees; callers drop all bookmarks in that case.
    #[instrument(skip(self))]
    pub fn outlines(&self) -> Result<Vec<OutlineEntry>> {
        let catalog = self
            .document
            .catalog()
            .map_err(|err| outline_error(format!("no catalog: {err}")))?;
        let Ok(root) = catalog.get(b"Outlines") else {
            return Ok(Vec::new());
        };
        let root = match resolve(&self.document, root).map_err(|e| outline_error(e.to_string()))? {
            Object::Dictionary(dict) => dict,
            Object::Null => return Ok(Vec::new()),
            other => {
                return Err(outline_error(format!(
                    "/Outlines is a {}, expected a dictionary",
                    other.enum_variant()
                )));
            }
        };

        let lookup: HashMap<ObjectId, usize> = self
            .page_ids
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();
        let named = self.named_destinations();
        let mut visited = HashSet::new();
        let entries = self.outline_level(root, &lookup, &named, &mut visited, 0)?;

        debug!(
            top_level = entries.len(),
            total = entries.iter().map(OutlineEntry::item_count).sum::<usize>(),
            "Outline tree read"
        );
        Ok(entries)
    }

    fn outline_level(
        &self,
        parent: &Dictionary,
        lookup: &HashMap<ObjectId, usize>,
        named: &BTreeMap<Vec<u8>, &Object>,
        visited: &mut HashSet<ObjectId>,
        depth: usize,
    ) -> Result<Vec<OutlineEntry>> {
        if depth > MAX_TREE_DEPTH {
            return Err(outline_error("outline nesting too deep".into()));
        }

        let mut entries = Vec::new();
        let mut next = parent.get(b"First").ok();
        while let Some(link) = next {
            let Object::Reference(id) = link else {
                return Err(outline_error(
                    "outline item is not an indirect object".into(),
                ));
            };
            if !visited.insert(*id) {
                warn!(?id, "Outline cycle detected; stopping sibling walk");
                break;
            }
            let item = self
                .document
                .get_dictionary(*id)
                .map_err(|err| outline_error(format!("outline item {id:?}: {err}")))?;

            let title = match item.get(b"Title").map(|t| resolve(&self.document, t)) {
                Ok(Ok(Object::String(bytes, _))) => decode_text(bytes),
                _ => "Untitled".to_string(),
            };
            let open = match item.get(b"Count") {
                Ok(Object::Integer(count)) => *count >= 0,
                _ => true,
            };
            let page_index = self.outline_target(item, lookup, named);
            let children = if item.has(b"First") {
                self.outline_level(item, lookup, named, visited, depth + 1)?
            } else {
                Vec::new()
            };

            entries.push(OutlineEntry {
                title,
                page_index,
                open,
                children,
            });
            next = item.get(b"Next").ok();
        }
        Ok(entries)
    }

    fn outline_target(
        &self,
        item: &Dictionary,
        lookup: &HashMap<ObjectId, usize>,
        named: &BTreeMap<Vec<u8>, &Object>,
    ) -> Option<usize> {
        if let Ok(dest) = item.get(b"Dest") {
            return self.destination_page(dest, lookup, named, 0);
        }
        let action = resolve(&self.document, item.get(b"A").ok()?).ok()?;
        let action = action.as_dict().ok()?;
        match action.get(b"S") {
            Ok(Object::Name(kind)) if kind.as_slice() == b"GoTo" => {
                self.destination_page(action.get(b"D").ok()?, lookup, named, 0)
            }
            _ => None,
        }
    }

    fn destination_page(
        &self,
        dest: &Object,
        lookup: &HashMap<ObjectId, usize>,
        named: &BTreeMap<Vec<u8>, &Object>,
        depth: usize,
    ) -> Option<usize> {
        if depth > 4 {
            return None;
        }
        match resolve(&self.document, dest).ok()? {
            Object::Array(items) => match items.first()? {
                Object::Reference(page_id) => lookup.get(page_id).copied(),
                Object::Integer(number) => usize::try_from(*number)
                    .ok()
                    .filter(|index| *index < self.page_ids.len()),
                _ => None,
            },
            Object::Name(name) | Object::String(name, _) => {
                self.destination_page(named.get(name)?, lookup, named, depth + 1)
            }
            Object::Dictionary(dict) => {
                self.destination_page(dict.get(b"D").ok()?, lookup, named, depth + 1)
            }
            _ => None,
        }
    }

    /// Named destinations from the catalog `/Dests` dictionary and the
    /// `/Names` → `/Dests` name tree. Malformed parts are skipped.
    pub fn named_destinations(&self) -> BTreeMap<Vec<u8>, &Object> {
        let mut out = BTreeMap::new();
        let Ok(catalog) = self.document.catalog() else {
            return out;
        };

        if let Ok(Ok(Object::Dictionary(dests))) =
            catalog.get(b"Dests").map(|d| resolve(&self.document, d))
        {
            for (name, value) in dests.iter() {
                out.insert(name.clone(), value);
            }
        }

        if let Ok(Ok(Object::Dictionary(names))) =
            catalog.get(b"Names").map(|n| resolve(&self.document, n))
            && let Ok(Ok(Object::Dictionary(tree))) =
                names.get(b"Dests").map(|d| resolve(&self.document, d))
        {
            let mut visited = HashSet::new();
            self.collect_name_tree(tree, &mut out, &mut visited, 0);
        }
        out
    }

    fn collect_name_tree<'a>(
        &'a self,
        node: &'a Dictionary,
        out: &mut BTreeMap<Vec<u8>, &'a Object>,
        visited: &mut HashSet<ObjectId>,
        depth: usize,
    ) {
        if depth > MAX_TREE_DEPTH {
            return;
        }
        if let Ok(Ok(Object::Array(pairs))) = node.get(b"Names").map(|n| resolve(&self.document, n)) {
            for pair in pairs.chunks_exact(2) {
                if let Object::String(key, _) = &pair[0] {
                    out.insert(key.clone(), &pair[1]);
                }
            }
        }
        if let Ok(Ok(Object::Array(kids))) = node.get(b"Kids").map(|k| resolve(&self.document, k)) {
            for kid in kids {
                if let Object::Reference(id) = kid
                    && !visited.insert(*id)
                {
                    continue;
                }
                if let Ok(Object::Dictionary(child)) = resolve(&self.document, kid) {
                    self.collect_name_tree(child, out, visited, depth + 1);
                }
            }
        }
    }

    pub fn named_destination_count(&self) -> usize {
        self.named_destinations().len()
    }

    // -- Metadata -------------------------------------------------------------

    /// String-valued entries of the `/Info` dictionary.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let Ok(Ok(Object::Dictionary(info))) = self
            .document
            .trailer
            .get(b"Info")
            .map(|info| resolve(&self.document, info))
        else {
            return out;
        };
        for (key, value) in info.iter() {
            if let Ok(Object::String(bytes, _)) = resolve(&self.document, value) {
                out.insert(String::from_utf8_lossy(key).into_owned(), decode_text(bytes));
            }
        }
        out
    }
}

// -- Helpers ------------------------------------------------------------------

/// Raw scan for an `/Encrypt` key in the last trailer, used when `lopdf`
/// refuses to load the document at all. The trailer is the dictionary after
/// the final `trailer` keyword, or the last cross-reference stream object.
fn declares_encryption(bytes: &[u8]) -> bool {
    const KEY: &[u8] = b"/Encrypt";
    let Some(start) = trailer_offset(bytes) else {
        return false;
    };
    let region = &bytes[start..];
    region.windows(KEY.len()).enumerate().any(|(offset, window)| {
        window == KEY
            && region
                .get(offset + KEY.len())
                .is_some_and(|next| !next.is_ascii_alphanumeric())
    })
}

fn trailer_offset(bytes: &[u8]) -> Option<usize> {
    if let Some(offset) = rfind(bytes, b"trailer") {
        return Some(offset);
    }
    let xref = rfind(bytes, b"/XRef")?;
    Some(rfind(&bytes[..xref], b" obj").unwrap_or(xref))
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|window| window == needle)
}

fn structure(message: String) -> PagecullError {
    PagecullError::Structure(message)
}

fn outline_error(message: String) -> PagecullError {
    PagecullError::OutlineCopy(message)
}

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object> {
    let mut current = object;
    let mut hops = 0;
    while let Object::Reference(id) = current {
        hops += 1;
        if hops > MAX_TREE_DEPTH {
            return Err(structure(format!("reference chain too long at {id:?}")));
        }
        current = document
            .get_object(*id)
            .map_err(|err| structure(format!("dangling reference {id:?}: {err}")))?;
    }
    Ok(current)
}

/// Look up `key` on the page or the nearest ancestor that defines it.
pub(crate) fn inherited_attribute<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>> {
    let mut node_id = page_id;
    let mut visited = HashSet::new();
    for _ in 0..MAX_TREE_DEPTH {
        if !visited.insert(node_id) {
            return Err(structure(format!("/Parent cycle at {node_id:?}")));
        }
        let node = document
            .get_dictionary(node_id)
            .map_err(|err| structure(format!("page tree node {node_id:?}: {err}")))?;
        if let Ok(value) = node.get(key) {
            return resolve(document, value).map(Some);
        }
        match node.get(b"Parent") {
            Ok(Object::Reference(parent)) => node_id = *parent,
            _ => return Ok(None),
        }
    }
    Err(structure("page tree too deep".into()))
}

fn name_list(document: &Document, dict: &Dictionary, key: &[u8]) -> Result<Vec<String>> {
    match dict.get(key) {
        Err(_) => Ok(Vec::new()),
        Ok(object) => match resolve(document, object)? {
            Object::Dictionary(sub) => Ok(sub
                .iter()
                .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
                .collect()),
            Object::Null => Ok(Vec::new()),
            other => Err(structure(format!(
                "/{} is a {}, expected a dictionary",
                String::from_utf8_lossy(key),
                other.enum_variant()
            ))),
        },
    }
}

fn page_resources(document: &Document, object: &Object) -> Result<PageResources> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Null => return Ok(PageResources::default()),
        other => {
            return Err(structure(format!(
                "/Resources is a {}, expected a dictionary",
                other.enum_variant()
            )));
        }
    };

    let mut ext_gstates = BTreeMap::new();
    if let Ok(object) = dict.get(b"ExtGState") {
        match resolve(document, object)? {
            Object::Dictionary(states) => {
                for (name, value) in states.iter() {
                    let state = match resolve(document, value)? {
                        Object::Dictionary(state) => state,
                        other => {
                            return Err(structure(format!(
                                "ExtGState {} is a {}",
                                String::from_utf8_lossy(name),
                                other.enum_variant()
                            )));
                        }
                    };
                    ext_gstates.insert(
                        String::from_utf8_lossy(name).into_owned(),
                        ExtGState {
                            fill_opacity: number(document, state, b"ca")?,
                            stroke_opacity: number(document, state, b"CA")?,
                        },
                    );
                }
            }
            Object::Null => {}
            other => {
                return Err(structure(format!(
                    "/ExtGState is a {}, expected a dictionary",
                    other.enum_variant()
                )));
            }
        }
    }

    Ok(PageResources {
        keys: dict
            .iter()
            .map(|(key, _)| String::from_utf8_lossy(key).into_owned())
            .collect(),
        fonts: name_list(document, dict, b"Font")?,
        xobjects: name_list(document, dict, b"XObject")?,
        ext_gstates,
    })
}

fn number(document: &Document, dict: &Dictionary, key: &[u8]) -> Result<Option<f32>> {
    match dict.get(key) {
        Err(_) => Ok(None),
        Ok(object) => match resolve(document, object)? {
            Object::Integer(value) => Ok(Some(*value as f32)),
            Object::Real(value) => Ok(Some(*value)),
            other => Err(structure(format!(
                "/{} is a {}, expected a number",
                String::from_utf8_lossy(key),
                other.enum_variant()
            ))),
        },
    }
}

pub(crate) fn rectangle(object: &Object) -> Option<[f64; 4]> {
    let Object::Array(items) = object else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = match item {
            Object::Integer(value) => *value as f64,
            Object::Real(value) => f64::from(*value),
            _ => return None,
        };
    }
    Some(out)
}

pub(crate) fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|err| structure(format!("cannot decode content stream: {err}")))
    } else {
        Ok(stream.content.clone())
    }
}

fn page_contents(document: &Document, page: &Dictionary) -> Result<PageContents> {
    let Ok(object) = page.get(b"Contents") else {
        return Ok(PageContents::None);
    };
    match resolve(document, object)? {
        Object::Null => Ok(PageContents::None),
        Object::Stream(stream) => Ok(PageContents::Single(decode_stream(stream)?)),
        Object::Array(items) if items.is_empty() => Ok(PageContents::None),
        Object::Array(items) => {
            let mut streams = Vec::with_capacity(items.len());
            for item in items {
                match resolve(document, item)? {
                    Object::Stream(stream) => streams.push(decode_stream(stream)?),
                    other => {
                        return Err(structure(format!(
                            "/Contents element is a {}, expected a stream",
                            other.enum_variant()
                        )));
                    }
                }
            }
            Ok(PageContents::Multi(streams))
        }
        other => Err(structure(format!(
            "/Contents is a {}, expected a stream or array",
            other.enum_variant()
        ))),
    }
}

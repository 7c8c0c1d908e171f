// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: deterministic PDFs built in memory with `lopdf`, and a
// sketch rasterizer that paints rectangles and text runs well enough for the
// render detector and stamper to be exercised without PDFium.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use pagecull_core::error::{PagecullError, Result};

use crate::pdf::content::{Operator, number, parse_content};
use crate::pdf::reader::PdfReader;
use crate::raster::{RasterDocument, Rasterizer, RenderSource};

// -- Fixture documents --------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    streams: Option<Vec<Vec<u8>>>,
    xobject: bool,
    annotations: usize,
    ext_gstates: Vec<(String, Option<f32>, Option<f32>)>,
}

impl FixturePage {
    /// No `/Contents` at all.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Helvetica text near the top of the page.
    pub fn text(text: &str) -> Self {
        Self::raw(format!("BT /F1 24 Tf 72 700 Td ({text}) Tj ET").as_bytes())
    }

    pub fn raw(content: &[u8]) -> Self {
        Self {
            streams: Some(vec![content.to_vec()]),
            ..Self::default()
        }
    }

    pub fn multi(streams: Vec<Vec<u8>>) -> Self {
        Self {
            streams: Some(streams),
            ..Self::default()
        }
    }

    pub fn with_xobject(mut self) -> Self {
        self.xobject = true;
        self
    }

    pub fn annotations(mut self, count: usize) -> Self {
        self.annotations = count;
        self
    }

    pub fn ext_gstate(mut self, name: &str, fill: Option<f32>, stroke: Option<f32>) -> Self {
        self.ext_gstates.push((name.to_string(), fill, stroke));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FixtureOutline {
    title: String,
    page: usize,
    named: Option<String>,
    closed: bool,
    children: Vec<FixtureOutline>,
}

impl FixtureOutline {
    pub fn to_page(title: &str, page: usize) -> Self {
        Self {
            title: title.to_string(),
            page,
            named: None,
            closed: false,
            children: Vec::new(),
        }
    }

    /// Bookmark whose `/Dest` is a named destination pointing at `page`.
    pub fn to_named(title: &str, name: &str, page: usize) -> Self {
        Self {
            named: Some(name.to_string()),
            ..Self::to_page(title, page)
        }
    }

    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    pub fn child(mut self, child: FixtureOutline) -> Self {
        self.children.push(child);
        self
    }
}

/// Builder for small US-Letter test documents.
#[derive(Debug, Clone, Default)]
pub struct PdfFixture {
    pages: Vec<FixturePage>,
    outlines: Vec<FixtureOutline>,
    info: Vec<(String, Object)>,
}

impl PdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: FixturePage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn outline(mut self, outline: FixtureOutline) -> Self {
        self.outlines.push(outline);
        self
    }

    pub fn info(self, key: &str, value: &str) -> Self {
        self.info_object(
            key,
            Object::String(value.as_bytes().to_vec(), StringFormat::Literal),
        )
    }

    pub fn info_object(mut self, key: &str, value: Object) -> Self {
        self.info.push((key.to_string(), value));
        self
    }

    pub fn build(&self) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let shared_resources = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_ids = Vec::new();
        for page in &self.pages {
            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
            };

            if let Some(streams) = &page.streams {
                let ids: Vec<Object> = streams
                    .iter()
                    .map(|bytes| {
                        Object::Reference(doc.add_object(Stream::new(dictionary! {}, bytes.clone())))
                    })
                    .collect();
                if ids.len() == 1 {
                    page_dict.set("Contents", ids[0].clone());
                } else {
                    page_dict.set("Contents", Object::Array(ids));
                }
            }

            if page.xobject || !page.ext_gstates.is_empty() {
                let mut resources = dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                };
                if page.xobject {
                    let form = doc.add_object(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Form",
                            "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                        },
                        b"0 0 m 100 100 l S".to_vec(),
                    ));
                    resources.set("XObject", dictionary! { "Fm1" => form });
                }
                if !page.ext_gstates.is_empty() {
                    let mut states = lopdf::Dictionary::new();
                    for (name, fill, stroke) in &page.ext_gstates {
                        let mut state = dictionary! { "Type" => "ExtGState" };
                        if let Some(fill) = fill {
                            state.set("ca", Object::Real(*fill));
                        }
                        if let Some(stroke) = stroke {
                            state.set("CA", Object::Real(*stroke));
                        }
                        states.set(name.as_bytes().to_vec(), state);
                    }
                    resources.set("ExtGState", states);
                }
                page_dict.set("Resources", resources);
            }

            if page.annotations > 0 {
                let annots: Vec<Object> = (0..page.annotations)
                    .map(|_| {
                        Object::Reference(doc.add_object(dictionary! {
                            "Type" => "Annot",
                            "Subtype" => "Text",
                            "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
                        }))
                    })
                    .collect();
                page_dict.set("Annots", annots);
            }

            page_ids.push(doc.add_object(page_dict));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => page_ids.len() as i64,
                "Resources" => shared_resources,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };

        if !self.outlines.is_empty() {
            let mut named = Vec::new();
            let outlines_id = doc.new_object_id();
            let (first, last, count) =
                add_outline_level(&mut doc, &self.outlines, outlines_id, &page_ids, &mut named);
            doc.objects.insert(
                outlines_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Outlines",
                    "First" => first,
                    "Last" => last,
                    "Count" => count,
                }),
            );
            catalog.set("Outlines", outlines_id);

            if !named.is_empty() {
                let mut pairs = Vec::new();
                for (name, page) in named {
                    pairs.push(Object::String(name.into_bytes(), StringFormat::Literal));
                    pairs.push(Object::Array(vec![
                        Object::Reference(page_ids[page]),
                        Object::Name(b"Fit".to_vec()),
                    ]));
                }
                let tree = doc.add_object(dictionary! { "Names" => pairs });
                catalog.set("Names", dictionary! { "Dests" => tree });
            }
        }

        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        if !self.info.is_empty() {
            let mut info = lopdf::Dictionary::new();
            for (key, value) in &self.info {
                info.set(key.as_bytes().to_vec(), value.clone());
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        doc
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut doc = self.build();
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("fixture serialises");
        out
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.to_bytes()).expect("fixture written");
        path
    }
}

fn add_outline_level(
    doc: &mut Document,
    items: &[FixtureOutline],
    parent: ObjectId,
    page_ids: &[ObjectId],
    named: &mut Vec<(String, usize)>,
) -> (ObjectId, ObjectId, i64) {
    let ids: Vec<ObjectId> = items.iter().map(|_| doc.new_object_id()).collect();
    let mut visible = 0i64;

    for (position, item) in items.iter().enumerate() {
        let dest = match &item.named {
            Some(name) => {
                named.push((name.clone(), item.page));
                Object::String(name.as_bytes().to_vec(), StringFormat::Literal)
            }
            None => Object::Array(vec![
                Object::Reference(page_ids[item.page]),
                Object::Name(b"Fit".to_vec()),
            ]),
        };
        let mut dict = dictionary! {
            "Title" => Object::String(item.title.as_bytes().to_vec(), StringFormat::Literal),
            "Parent" => parent,
            "Dest" => dest,
        };
        if position > 0 {
            dict.set("Prev", ids[position - 1]);
        }
        if position + 1 < ids.len() {
            dict.set("Next", ids[position + 1]);
        }
        visible += 1;
        if !item.children.is_empty() {
            let (first, last, count) =
                add_outline_level(doc, &item.children, ids[position], page_ids, named);
            dict.set("First", first);
            dict.set("Last", last);
            if item.closed {
                dict.set("Count", -count);
            } else {
                dict.set("Count", count);
                visible += count;
            }
        } else if item.closed {
            dict.set("Count", -1i64);
        }
        doc.objects.insert(ids[position], Object::Dictionary(dict));
    }

    (ids[0], ids[ids.len() - 1], visible)
}

// -- Sketch rasterizer --------------------------------------------------------

/// A stand-in renderer that interprets a small subset of the content stream:
/// filled or stroked rectangles and text runs, in the current fill colour.
/// Text rendering mode 3 and zero-size fonts paint nothing; `Do` and inline
/// images paint a 100pt square at the current origin.
#[derive(Debug, Default)]
pub struct SketchRasterizer {
    /// Page indices that fail to render.
    pub failing_pages: Vec<usize>,
    /// Fail when opening any document.
    pub fail_open: bool,
}

impl SketchRasterizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Rasterizer for SketchRasterizer {
    fn open<'a>(&'a self, source: RenderSource<'a>) -> Result<Box<dyn RasterDocument + 'a>> {
        if self.fail_open {
            return Err(PagecullError::RendererUnavailable("sketch open failure".into()));
        }
        let reader = match source {
            RenderSource::Path(path) => PdfReader::open(path)?,
            RenderSource::Bytes(bytes) => PdfReader::from_bytes(bytes.to_vec())?,
        };
        Ok(Box::new(SketchDocument {
            reader,
            failing_pages: &self.failing_pages,
        }))
    }
}

struct SketchDocument<'a> {
    reader: PdfReader,
    failing_pages: &'a [usize],
}

#[derive(Clone, Copy)]
struct SketchState {
    fill: [u8; 3],
    origin: (f64, f64),
    text_mode: i64,
    font_size: f64,
}

impl RasterDocument for SketchDocument<'_> {
    fn page_count(&self) -> usize {
        self.reader.page_count()
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<RgbaImage> {
        if self.failing_pages.contains(&index) {
            return Err(PagecullError::Render {
                page: index,
                message: "sketch render failure".into(),
            });
        }
        let page = self.reader.page(index)?;
        let [llx, lly, urx, ury] = page.media_box.unwrap_or([0.0, 0.0, 612.0, 792.0]);
        let scale = f64::from(scale);
        let width = ((urx - llx) * scale).round() as u32;
        let height = ((ury - lly) * scale).round() as u32;
        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        let mut paint = |x: f64, y: f64, w: f64, h: f64, color: [u8; 3]| {
            let x0 = ((x - llx) * scale).max(0.0) as u32;
            let x1 = (((x + w) - llx) * scale).max(0.0) as u32;
            let top = (ury - (y + h)) * scale;
            let bottom = (ury - y) * scale;
            for py in top.max(0.0) as u32..(bottom.max(0.0) as u32).min(height) {
                for px in x0..x1.min(width) {
                    image.put_pixel(px, py, Rgba([color[0], color[1], color[2], 255]));
                }
            }
        };

        let instructions = parse_content(&page.contents.joined()).map_err(|err| {
            PagecullError::Render {
                page: index,
                message: err.to_string(),
            }
        })?;
        let mut state = SketchState {
            fill: [0, 0, 0],
            origin: (0.0, 0.0),
            text_mode: 0,
            font_size: 12.0,
        };
        let mut stack = Vec::new();
        let mut text_pos = (0.0, 0.0);
        let mut rect: Option<[f64; 4]> = None;

        for instruction in instructions {
            let numbers: Vec<f64> = instruction
                .operands
                .iter()
                .filter_map(number)
                .collect();
            match instruction.operator {
                Operator::SaveState => stack.push(state),
                Operator::RestoreState => state = stack.pop().unwrap_or(state),
                Operator::SetFont => state.font_size = numbers.first().copied().unwrap_or(12.0),
                Operator::SetTextRenderingMode => {
                    state.text_mode = numbers.first().copied().unwrap_or(0.0) as i64
                }
                Operator::State("rg") if numbers.len() == 3 => {
                    state.fill = [0, 1, 2].map(|i| (numbers[i] * 255.0).round() as u8);
                }
                Operator::State("g") if numbers.len() == 1 => {
                    state.fill = [(numbers[0] * 255.0).round() as u8; 3];
                }
                Operator::State("cm") if numbers.len() == 6 => {
                    state.origin = (state.origin.0 + numbers[4], state.origin.1 + numbers[5]);
                }
                Operator::State("BT") => text_pos = state.origin,
                Operator::State("Td") | Operator::State("TD") if numbers.len() == 2 => {
                    text_pos = (text_pos.0 + numbers[0], text_pos.1 + numbers[1]);
                }
                Operator::State("Tm") if numbers.len() == 6 => {
                    text_pos = (state.origin.0 + numbers[4], state.origin.1 + numbers[5]);
                }
                Operator::State("re") if numbers.len() == 4 => {
                    rect = Some([
                        state.origin.0 + numbers[0],
                        state.origin.1 + numbers[1],
                        numbers[2],
                        numbers[3],
                    ]);
                }
                Operator::ShowText
                | Operator::ShowTextArray
                | Operator::NextLineShowText
                | Operator::NextLineSpacingShowText => {
                    if state.text_mode != 3 && state.font_size != 0.0 {
                        let glyphs = instruction
                            .operands
                            .iter()
                            .map(|operand| match operand {
                                Object::String(bytes, _) => bytes.len(),
                                Object::Array(items) => items.len(),
                                _ => 0,
                            })
                            .sum::<usize>()
                            .max(1);
                        let size = state.font_size.abs();
                        paint(
                            text_pos.0,
                            text_pos.1,
                            glyphs as f64 * size * 0.5,
                            size * 0.7,
                            state.fill,
                        );
                    }
                }
                Operator::PaintXObject | Operator::InlineImage => {
                    paint(state.origin.0, state.origin.1, 100.0, 100.0, [0, 0, 0]);
                }
                ref op if op.category() == crate::pdf::content::OperatorCategory::PathPaint => {
                    if let Some([x, y, w, h]) = rect.take() {
                        paint(x, y, w, h, state.fill);
                    }
                }
                _ => {}
            }
        }

        Ok(image)
    }
}

//! PDF serialisation: finished pages → PDF bytes via `lopdf`.
//!
//! Stateless: everything needed is on the [`Page`]s. Text is drawn with the
//! base-14 Helvetica fonts in WinAnsi encoding, so no font program is
//! embedded. Photos are image XObjects holding the JPEG stream as-is
//! (`DCTDecode`).
//!
//! Layout works in millimetres from the top-left corner; PDF user space is
//! points from the bottom-left. The conversion happens here and nowhere
//! else.

use crate::error::ExportError;
use crate::pipeline::layout::{
    Footer, ImageBlock, LayoutConfig, Page, PageConfig, PlacedElement, PlacedKind, Rgb, TextLine,
    TextStyle,
};
use crate::pipeline::metrics::{encode_win_ansi, text_width_mm, PT_PER_MM};
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::debug;

/// Helvetica cap height as a fraction of the font size.
const CAP_HEIGHT: f32 = 0.718;

const FONT_REGULAR: &str = "F1";
const FONT_BOLD: &str = "F2";

/// Document information dictionary values.
#[derive(Debug, Clone)]
pub struct PdfMetadata {
    pub title: String,
    pub producer: String,
    pub created_at: DateTime<Utc>,
}

/// Serialise `pages` into a complete PDF file.
pub fn write_pdf(
    pages: &[Page],
    meta: &PdfMetadata,
    config: &LayoutConfig,
) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let fonts_id = doc.add_object(dictionary! {
        FONT_REGULAR => dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        },
        FONT_BOLD => dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        },
    });

    let page_cfg = &config.page;
    let footer_style = config.typography.footer;
    let mut kids = Vec::with_capacity(pages.len());
    let mut image_count = 0_usize;

    for page in pages {
        let mut ops = Vec::new();
        let mut xobjects = Dictionary::new();

        for element in &page.elements {
            match &element.kind {
                PlacedKind::Text(line) => draw_text(&mut ops, element, line, page_cfg),
                PlacedKind::Image(block) => {
                    image_count += 1;
                    let name = format!("Im{image_count}");
                    let image_id = doc.add_object(image_xobject(block));
                    xobjects.set(name.as_bytes(), Object::Reference(image_id));
                    draw_image(&mut ops, element, block, &name, page_cfg);
                }
            }
        }
        if let Some(footer) = &page.footer {
            draw_footer(&mut ops, footer, &footer_style, page_cfg);
        }

        let content = Content { operations: ops }
            .encode()
            .map_err(|e| ExportError::Render {
                page: page.index,
                detail: e.to_string(),
            })?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut resources = dictionary! { "Font" => fonts_id };
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                (page_cfg.width * PT_PER_MM).into(),
                (page_cfg.height * PT_PER_MM).into(),
            ],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(info_dictionary(meta));
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::Serialize(e.to_string()))?;

    debug!(
        pages = pages.len(),
        images = image_count,
        bytes = bytes.len(),
        "Serialised PDF"
    );
    Ok(bytes)
}

fn info_dictionary(meta: &PdfMetadata) -> Dictionary {
    let date = meta.created_at.format("D:%Y%m%d%H%M%SZ").to_string();
    dictionary! {
        "Title" => Object::String(encode_win_ansi(&meta.title), StringFormat::Literal),
        "Producer" => Object::string_literal(meta.producer.as_str()),
        "CreationDate" => Object::string_literal(date),
    }
}

fn image_xobject(block: &ImageBlock) -> Stream {
    let image = &block.image;
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(image.jpeg_width),
        "Height" => i64::from(image.jpeg_height),
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8_i64,
        "Filter" => "DCTDecode",
    };
    // DCT data is stored as-is.
    Stream::new(dict, image.jpeg.to_vec()).with_compression(false)
}

// ── Drawing ──────────────────────────────────────────────────────────────────

fn pt(mm: f32) -> Object {
    Object::Real(mm * PT_PER_MM)
}

/// Baseline of a line whose box starts at `top`, in PDF user space.
fn baseline_pdf_y(top: f32, size_pt: f32, page: &PageConfig) -> f32 {
    let baseline_mm = top + size_pt / PT_PER_MM * CAP_HEIGHT;
    page.height - baseline_mm
}

fn set_fill(ops: &mut Vec<Operation>, color: Rgb) {
    let c = |v: u8| Object::Real(f32::from(v) / 255.0);
    ops.push(Operation::new("rg", vec![c(color.0), c(color.1), c(color.2)]));
}

fn show_text(ops: &mut Vec<Operation>, text: &str, style: &TextStyle, x: f32, pdf_y_mm: f32) {
    let font = if style.bold { FONT_BOLD } else { FONT_REGULAR };
    set_fill(ops, style.color);
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new(
        "Tf",
        vec![Object::Name(font.as_bytes().to_vec()), style.size_pt.into()],
    ));
    ops.push(Operation::new("Td", vec![pt(x), pt(pdf_y_mm)]));
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
    ));
    ops.push(Operation::new("ET", vec![]));
}

fn draw_text(ops: &mut Vec<Operation>, el: &PlacedElement, line: &TextLine, page: &PageConfig) {
    if line.text.is_empty() {
        return;
    }
    let y = baseline_pdf_y(el.top, line.style.size_pt, page);
    show_text(ops, &line.text, &line.style, el.x, y);
}

fn draw_footer(ops: &mut Vec<Operation>, footer: &Footer, style: &TextStyle, page: &PageConfig) {
    let width = text_width_mm(&footer.text, style.size_pt, style.bold);
    let x = (page.width - width) / 2.0;
    show_text(ops, &footer.text, style, x, page.height - footer.y);
}

fn draw_image(
    ops: &mut Vec<Operation>,
    el: &PlacedElement,
    block: &ImageBlock,
    name: &str,
    page: &PageConfig,
) {
    let bottom = page.height - (el.top + block.height);
    ops.push(Operation::new("q", vec![]));
    ops.push(Operation::new(
        "cm",
        vec![
            pt(block.width),
            Object::Integer(0),
            Object::Integer(0),
            pt(block.height),
            pt(el.x),
            pt(bottom),
        ],
    ));
    ops.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
    ops.push(Operation::new("Q", vec![]));
}

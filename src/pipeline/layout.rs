//! Cursor-based pagination.
//!
//! Layout runs in two steps, both pure:
//!
//! 1. [`flatten`] turns the section list into a flat list of [`Element`]s
//!    using the fixed [`Typography`]: text is wrapped to the content width
//!    here, images are shrunk if taller than a page.
//! 2. [`layout_elements`] threads a [`LayoutCursor`] through [`place`] for
//!    every element and collects the placed elements per page.
//!
//! All lengths are millimetres measured from the top-left page corner.
//! Footers are not laid out here; see [`crate::pipeline::footer`].

use crate::document::{
    GallerySection, KeyValueSection, QaSection, Section, TextBlockSection, TitleSection,
};
use crate::error::LayoutError;
use crate::pipeline::image::EmbeddedImage;
use crate::pipeline::metrics::{text_width_mm, wrap_text};
use tracing::debug;

/// Slack for comparisons of accumulated `f32` positions.
const EPSILON: f32 = 1e-3;

// ── Page geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageConfig {
    pub width: f32,
    pub height: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    /// Distance of the footer line from the bottom edge.
    pub footer_offset: f32,
}

impl Default for PageConfig {
    /// A4 portrait with 20 mm margins.
    fn default() -> Self {
        Self {
            width: 210.0,
            height: 297.0,
            margin_top: 20.0,
            margin_bottom: 20.0,
            margin_left: 20.0,
            margin_right: 20.0,
            footer_offset: 10.0,
        }
    }
}

impl PageConfig {
    pub fn usable_width(&self) -> f32 {
        self.width - self.margin_left - self.margin_right
    }

    pub fn usable_height(&self) -> f32 {
        self.height - self.margin_top - self.margin_bottom
    }

    /// Lowest y any element may extend to.
    pub fn bottom_limit(&self) -> f32 {
        self.height - self.margin_bottom
    }
}

// ── Typography ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const BRAND_BLUE: Rgb = Rgb(30, 64, 175);
    pub const SLATE: Rgb = Rgb(100, 116, 139);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// How one kind of text line is set. `advance` is the height of the line
/// box, i.e. how far the cursor moves after the line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f32,
    pub advance: f32,
    pub bold: bool,
    pub color: Rgb,
    pub align: Align,
}

impl TextStyle {
    const fn new(size_pt: f32, advance: f32, bold: bool, color: Rgb, align: Align) -> Self {
        Self {
            size_pt,
            advance,
            bold,
            color,
            align,
        }
    }
}

/// Fixed styles and gaps of the exported itinerary.
#[derive(Debug, Clone, PartialEq)]
pub struct Typography {
    pub banner: TextStyle,
    pub tagline: TextStyle,
    pub destination: TextStyle,
    pub heading: TextStyle,
    pub key_value: TextStyle,
    pub itinerary: TextStyle,
    pub question_label: TextStyle,
    pub question: TextStyle,
    pub answer_label: TextStyle,
    pub answer: TextStyle,
    pub footer: TextStyle,
    pub key_value_gap: f32,
    pub image_gap: f32,
    pub gallery_gap: f32,
    pub itinerary_gap: f32,
    pub question_gap: f32,
    pub answer_gap: f32,
    /// Space required below the cursor before a "Pregunta i:" label.
    pub question_keep: f32,
}

impl Default for Typography {
    fn default() -> Self {
        use Align::{Center, Left};
        Self {
            banner: TextStyle::new(24.0, 10.0, true, Rgb::BRAND_BLUE, Center),
            tagline: TextStyle::new(14.0, 20.0, false, Rgb::SLATE, Center),
            destination: TextStyle::new(18.0, 15.0, true, Rgb::BRAND_BLUE, Center),
            heading: TextStyle::new(14.0, 10.0, true, Rgb::BRAND_BLUE, Left),
            key_value: TextStyle::new(12.0, 8.0, false, Rgb::BLACK, Left),
            itinerary: TextStyle::new(11.0, 6.0, false, Rgb::BLACK, Left),
            question_label: TextStyle::new(12.0, 8.0, true, Rgb::BRAND_BLUE, Left),
            question: TextStyle::new(10.0, 6.0, false, Rgb::BLACK, Left),
            answer_label: TextStyle::new(11.0, 7.0, true, Rgb::BRAND_BLUE, Left),
            answer: TextStyle::new(10.0, 6.0, false, Rgb::BLACK, Left),
            footer: TextStyle::new(9.0, 4.0, false, Rgb::SLATE, Center),
            key_value_gap: 15.0,
            image_gap: 10.0,
            gallery_gap: 10.0,
            itinerary_gap: 15.0,
            question_gap: 5.0,
            answer_gap: 10.0,
            question_keep: 30.0,
        }
    }
}

impl Typography {
    /// Every body text style, for validation against the page height.
    pub fn text_styles(&self) -> [&TextStyle; 10] {
        [
            &self.banner,
            &self.tagline,
            &self.destination,
            &self.heading,
            &self.key_value,
            &self.itinerary,
            &self.question_label,
            &self.question,
            &self.answer_label,
            &self.answer,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutConfig {
    pub page: PageConfig,
    pub typography: Typography,
}

// ── Elements ─────────────────────────────────────────────────────────────────

/// One wrapped line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub style: TextStyle,
}

/// An image with its final display size.
#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub image: EmbeddedImage,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub enum Element {
    Text(TextLine),
    Image(ImageBlock),
    /// Vertical gap. Never breaks a page; clamped at the bottom limit.
    Spacer(f32),
    /// Break now unless at least this much height is left on the page.
    KeepSpace(f32),
}

impl Element {
    fn text(text: impl Into<String>, style: TextStyle) -> Self {
        Element::Text(TextLine {
            text: text.into(),
            style,
        })
    }
}

#[derive(Debug, Clone)]
pub enum PlacedKind {
    Text(TextLine),
    Image(ImageBlock),
}

/// An element fixed on a page. `top` and `height` describe its line box.
#[derive(Debug, Clone)]
pub struct PlacedElement {
    pub x: f32,
    pub top: f32,
    pub height: f32,
    pub kind: PlacedKind,
}

impl PlacedElement {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

/// Centred footer line stamped after layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Footer {
    pub text: String,
    /// Baseline position.
    pub y: f32,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub elements: Vec<PlacedElement>,
    pub footer: Option<Footer>,
}

impl Page {
    fn new(index: usize) -> Self {
        Self {
            index,
            elements: Vec::new(),
            footer: None,
        }
    }

    /// Text of every line on the page, in placement order.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match &e.kind {
            PlacedKind::Text(line) => Some(line.text.as_str()),
            PlacedKind::Image(_) => None,
        })
    }
}

// ── Cursor ───────────────────────────────────────────────────────────────────

/// Current page and vertical write position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutCursor {
    pub page_index: usize,
    pub y: f32,
}

impl LayoutCursor {
    pub fn start(page: &PageConfig) -> Self {
        Self {
            page_index: 0,
            y: page.margin_top,
        }
    }

    fn next_page(self, page: &PageConfig) -> Self {
        Self {
            page_index: self.page_index + 1,
            y: page.margin_top,
        }
    }
}

/// Where an element of a given height lands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Cursor after the element.
    pub cursor: LayoutCursor,
    /// Top of the element on `cursor.page_index`.
    pub top: f32,
    pub page_break: bool,
}

/// Place an element of `height` at `cursor`, breaking to a new page if it
/// would cross the bottom margin.
pub fn place(
    cursor: LayoutCursor,
    height: f32,
    page: &PageConfig,
) -> Result<Placement, LayoutError> {
    let usable = page.usable_height();
    if height > usable + EPSILON {
        return Err(LayoutError::Oversized {
            page_index: cursor.page_index,
            height,
            usable,
        });
    }

    let (start, page_break) = if cursor.y + height > page.bottom_limit() + EPSILON {
        (cursor.next_page(page), true)
    } else {
        (cursor, false)
    };

    Ok(Placement {
        cursor: LayoutCursor {
            page_index: start.page_index,
            y: start.y + height,
        },
        top: start.y,
        page_break,
    })
}

// ── Flattening ───────────────────────────────────────────────────────────────

/// Expand sections into the element stream placed by [`layout_elements`].
pub fn flatten(sections: &[Section], config: &LayoutConfig) -> Vec<Element> {
    let mut out = Vec::new();
    for section in sections {
        match section {
            Section::Title(title) => flatten_title(title, config, &mut out),
            Section::KeyValue(kv) => flatten_key_value(kv, config, &mut out),
            Section::Gallery(gallery) => flatten_gallery(gallery, config, &mut out),
            Section::TextBlock(block) => flatten_text_block(block, config, &mut out),
            Section::Qa(qa) => flatten_qa(qa, config, &mut out),
        }
    }
    out
}

fn push_wrapped(text: &str, style: TextStyle, page: &PageConfig, out: &mut Vec<Element>) {
    for line in wrap_text(text, style.size_pt, style.bold, page.usable_width()) {
        out.push(Element::text(line, style));
    }
}

fn flatten_title(title: &TitleSection, config: &LayoutConfig, out: &mut Vec<Element>) {
    let t = &config.typography;
    push_wrapped(&title.product, t.banner, &config.page, out);
    push_wrapped(&title.tagline, t.tagline, &config.page, out);
    push_wrapped(&title.destination, t.destination, &config.page, out);
}

fn flatten_key_value(kv: &KeyValueSection, config: &LayoutConfig, out: &mut Vec<Element>) {
    let t = &config.typography;
    push_wrapped(&kv.heading, t.heading, &config.page, out);
    for (key, value) in &kv.pairs {
        push_wrapped(&format!("{key}: {value}"), t.key_value, &config.page, out);
    }
    out.push(Element::Spacer(t.key_value_gap));
}

fn flatten_gallery(gallery: &GallerySection, config: &LayoutConfig, out: &mut Vec<Element>) {
    if gallery.images.is_empty() {
        return;
    }
    let t = &config.typography;
    push_wrapped(&gallery.heading, t.heading, &config.page, out);
    for image in &gallery.images {
        out.push(Element::Image(fit_image(image, &config.page)));
        out.push(Element::Spacer(t.image_gap));
    }
    out.push(Element::Spacer(t.gallery_gap));
}

/// Display size of `image` on a page, shrunk proportionally when taller
/// than the usable height.
pub fn fit_image(image: &EmbeddedImage, page: &PageConfig) -> ImageBlock {
    let usable = page.usable_height();
    let (mut width, mut height) = (image.display_width, image.display_height);
    if height > usable {
        let scale = usable / height;
        debug!(
            url = %image.url,
            height, usable, "Shrinking image to fit one page"
        );
        width *= scale;
        height = usable;
    }
    ImageBlock {
        image: image.clone(),
        width,
        height,
    }
}

fn flatten_text_block(block: &TextBlockSection, config: &LayoutConfig, out: &mut Vec<Element>) {
    let t = &config.typography;
    if let Some(heading) = &block.heading {
        push_wrapped(heading, t.heading, &config.page, out);
    }
    push_wrapped(&block.text, t.itinerary, &config.page, out);
    out.push(Element::Spacer(t.itinerary_gap));
}

fn flatten_qa(qa: &QaSection, config: &LayoutConfig, out: &mut Vec<Element>) {
    if qa.pairs.is_empty() {
        return;
    }
    let t = &config.typography;
    push_wrapped(&qa.heading, t.heading, &config.page, out);
    for (i, pair) in qa.pairs.iter().enumerate() {
        out.push(Element::KeepSpace(t.question_keep));
        out.push(Element::text(format!("Pregunta {}:", i + 1), t.question_label));
        push_wrapped(&pair.question, t.question, &config.page, out);
        out.push(Element::Spacer(t.question_gap));
        out.push(Element::text("Respuesta:", t.answer_label));
        push_wrapped(&pair.answer, t.answer, &config.page, out);
        out.push(Element::Spacer(t.answer_gap));
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

/// Lay out `sections` into pages.
pub fn layout(sections: &[Section], config: &LayoutConfig) -> Result<Vec<Page>, LayoutError> {
    layout_with(sections, config, |_| {})
}

/// Like [`layout`], calling `on_page_break` with the index of every page
/// opened after the first.
pub fn layout_with(
    sections: &[Section],
    config: &LayoutConfig,
    on_page_break: impl FnMut(usize),
) -> Result<Vec<Page>, LayoutError> {
    let elements = flatten(sections, config);
    layout_elements(&elements, &config.page, on_page_break)
}

/// Place a flat element stream. Always returns at least one page.
pub fn layout_elements(
    elements: &[Element],
    page: &PageConfig,
    mut on_page_break: impl FnMut(usize),
) -> Result<Vec<Page>, LayoutError> {
    let mut pages = vec![Page::new(0)];
    let mut cursor = LayoutCursor::start(page);

    for element in elements {
        match element {
            Element::Spacer(h) => {
                cursor.y = (cursor.y + h.max(0.0)).min(page.bottom_limit());
            }
            Element::KeepSpace(h) => {
                let at_top = cursor.y <= page.margin_top + EPSILON;
                if !at_top && page.bottom_limit() - cursor.y < *h {
                    cursor = cursor.next_page(page);
                }
            }
            Element::Text(line) => {
                let placement = place(cursor, line.style.advance, page)?;
                let x = match line.style.align {
                    Align::Left => page.margin_left,
                    Align::Center => {
                        let w = text_width_mm(&line.text, line.style.size_pt, line.style.bold);
                        (page.width - w) / 2.0
                    }
                };
                cursor = placement.cursor;
                open_pages(&mut pages, cursor.page_index, &mut on_page_break);
                pages[cursor.page_index].elements.push(PlacedElement {
                    x,
                    top: placement.top,
                    height: line.style.advance,
                    kind: PlacedKind::Text(line.clone()),
                });
            }
            Element::Image(block) => {
                let placement = place(cursor, block.height, page)?;
                let x = page.margin_left + (page.usable_width() - block.width).max(0.0) / 2.0;
                cursor = placement.cursor;
                open_pages(&mut pages, cursor.page_index, &mut on_page_break);
                pages[cursor.page_index].elements.push(PlacedElement {
                    x,
                    top: placement.top,
                    height: block.height,
                    kind: PlacedKind::Image(block.clone()),
                });
            }
        }
    }

    debug!(pages = pages.len(), elements = elements.len(), "Layout complete");
    Ok(pages)
}

/// Pages are only opened once something lands on them, so a trailing
/// conditional break never leaves an empty page.
fn open_pages(pages: &mut Vec<Page>, index: usize, on_page_break: &mut impl FnMut(usize)) {
    while pages.len() <= index {
        let next = pages.len();
        pages.push(Page::new(next));
        on_page_break(next);
    }
}

//! The structural document model built by the assembler and consumed by
//! the layout engine.
//!
//! A document is an ordered `Vec<Section>`. It is derived per export and
//! never stored; all text in it is already sanitised.

use crate::pipeline::image::EmbeddedImage;

#[derive(Debug, Clone)]
pub enum Section {
    /// Product banner, tagline and destination.
    Title(TitleSection),
    /// A heading followed by `key: value` lines.
    KeyValue(KeyValueSection),
    /// Up to the configured number of resolved photos.
    Gallery(GallerySection),
    /// Free text, wrapped to the content width.
    TextBlock(TextBlockSection),
    /// Numbered question/answer appendix.
    Qa(QaSection),
}

impl Section {
    pub fn kind(&self) -> &'static str {
        match self {
            Section::Title(_) => "title",
            Section::KeyValue(_) => "key_value",
            Section::Gallery(_) => "gallery",
            Section::TextBlock(_) => "text",
            Section::Qa(_) => "qa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleSection {
    pub product: String,
    pub tagline: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValueSection {
    pub heading: String,
    pub pairs: Vec<(String, String)>,
}

impl KeyValueSection {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            pairs: Vec::new(),
        }
    }

    pub fn pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct GallerySection {
    pub heading: String,
    pub images: Vec<EmbeddedImage>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlockSection {
    pub heading: Option<String>,
    pub text: String,
}

impl TextBlockSection {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            heading: None,
            text: text.into(),
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = Some(heading.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaSection {
    pub heading: String,
    pub pairs: Vec<QaPair>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

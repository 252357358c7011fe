//! Page footers, stamped once the final page count is known.

use crate::pipeline::layout::{Footer, Page, PageConfig};
use chrono::NaiveDate;

/// Fixed parts of the footer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FooterSpec {
    pub product: String,
    pub render_date: NaiveDate,
}

impl FooterSpec {
    pub fn new(product: impl Into<String>, render_date: NaiveDate) -> Self {
        Self {
            product: product.into(),
            render_date,
        }
    }

    /// Footer text for page `number` (1-based) of `total`.
    pub fn text(&self, number: usize, total: usize) -> String {
        format!(
            "Generated by {} — {} — Page {number} of {total}",
            self.product,
            self.render_date.format("%Y-%m-%d"),
        )
    }
}

/// Set the footer of every page. Footers already present are replaced.
pub fn stamp_footers(mut pages: Vec<Page>, spec: &FooterSpec, page: &PageConfig) -> Vec<Page> {
    let total = pages.len();
    let y = page.height - page.footer_offset;
    for (i, p) in pages.iter_mut().enumerate() {
        p.footer = Some(Footer {
            text: spec.text(i + 1, total),
            y,
        });
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::layout::{layout_elements, Element};

    fn pages(n: usize) -> Vec<Page> {
        let page = PageConfig::default();
        // a conditional break before each line forces one line per page
        let elements: Vec<Element> = (0..n)
            .flat_map(|_| [Element::KeepSpace(f32::MAX), text_line()])
            .collect();
        layout_elements(&elements, &page, |_| {}).unwrap()
    }

    fn text_line() -> Element {
        use crate::pipeline::layout::{Align, Rgb, TextLine, TextStyle};
        Element::Text(TextLine {
            text: "x".into(),
            style: TextStyle {
                size_pt: 10.0,
                advance: 6.0,
                bold: false,
                color: Rgb::BLACK,
                align: Align::Left,
            },
        })
    }

    fn spec() -> FooterSpec {
        FooterSpec::new("ViajeIA", NaiveDate::from_ymd_opt(2026, 10, 16).unwrap())
    }

    #[test]
    fn test_footer_text() {
        assert_eq!(
            spec().text(2, 5),
            "Generated by ViajeIA — 2026-10-16 — Page 2 of 5"
        );
    }

    #[test]
    fn test_all_pages_share_total() {
        let stamped = stamp_footers(pages(4), &spec(), &PageConfig::default());
        assert_eq!(stamped.len(), 4);
        for (i, p) in stamped.iter().enumerate() {
            let footer = p.footer.as_ref().unwrap();
            assert!(footer.text.ends_with(&format!("Page {} of 4", i + 1)), "{}", footer.text);
            assert_eq!(footer.y, 287.0);
        }
    }

    #[test]
    fn test_footer_below_content_area() {
        let page = PageConfig::default();
        let stamped = stamp_footers(pages(1), &spec(), &page);
        let footer = stamped[0].footer.as_ref().unwrap();
        assert!(footer.y > page.bottom_limit());
    }
}

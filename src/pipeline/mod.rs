//! Pipeline stages for itinerary export.
//!
//! Each submodule implements one step. Only [`fetch`] and [`image`] touch
//! the network; everything from [`layout`] on is a pure function of the
//! values handed to it.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ image ──▶ (sections) ──▶ layout ──▶ footer ──▶ render
//! (bytes)  (decode,    sanitize,      (pages)    (Page i    (lopdf)
//!           encode)    extract                    of N)
//! ```
//!
//! 1. [`sanitize`] — reduce assistant text to printable ASCII + Latin-1
//! 2. [`extract`]  — turn the first answer into sections (summary or full text)
//! 3. [`fetch`]    — get photo bytes from a URL or local path
//! 4. [`image`]    — decode, measure and re-encode photos under a timeout;
//!    CPU work runs in `spawn_blocking`
//! 5. [`encode`]   — downsample and JPEG-encode one decoded photo
//! 6. [`metrics`]  — Helvetica widths and line wrapping
//! 7. [`layout`]   — paginate sections with an explicit cursor
//! 8. [`footer`]   — stamp "Page i of N" on finished pages
//! 9. [`render`]   — serialise pages into PDF bytes

pub mod encode;
pub mod extract;
pub mod fetch;
pub mod footer;
pub mod image;
pub mod layout;
pub mod metrics;
pub mod render;
pub mod sanitize;

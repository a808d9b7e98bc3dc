//! Extraction core: turn a fetched [`Source`] into outcomes, listings and a title.
//!
//! Both extractors match exhaustively on the source variant, so a rendered
//! page and an API payload always produce the same output shape.

mod dom;
pub mod listing;
pub mod outcomes;
pub mod source;

pub use listing::extract_listing;
pub use outcomes::{extract_outcomes, extract_title};
pub use source::{ApiPayload, RenderedPage, Source};

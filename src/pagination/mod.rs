//! Pagination detection.
//!
//! Servers page their listings in one of a handful of conventions. This
//! module recognises them from response bodies and turns each page into the
//! request for the next one, without doing any I/O itself.

mod adapter;
mod scheme;

pub use adapter::{
    Advance, ITEM_FIELDS, NEXT_URL_FIELDS, Next, PAGE_COUNT_FIELDS, TOKEN_FIELDS, detect,
    detect_and_advance, extract_items, token_param_for,
};
pub use scheme::{Continuation, PaginationScheme};

//! Domain module - market records and shared constants
//!
//! Everything here is plain data; the extraction logic lives in
//! `infrastructure::parsing`.

pub mod constants;
pub mod market;

pub use constants::{AMOUNT_UNAVAILABLE, CHANGE_UNAVAILABLE};
pub use market::{
    is_amount_available, is_change_available, percent_change, IndexQuote, IndexTick,
    SecurityProfile, SourceKind,
};

//! Turning album pages and RPC payloads into typed media candidates.
pub mod items;
pub mod literal;
pub mod page;

pub use items::{extract_items, EntrySchema, Extracted, RawEntry, ENTRY_SCHEMA};
pub use literal::{parse_literal, LiteralError};
pub use page::extract_data_blocks;

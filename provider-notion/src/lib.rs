//! # Notion Provider
//!
//! Reads a Notion database as flat key/value rows.
//!
//! ## Components
//!
//! - **Client** (`client`): the `RecordStore` trait and its Notion REST implementation
//! - **Decoder** (`decoder`): tagged property values to plain JSON scalars and lists
//! - **Reader** (`reader`): paginated reads, schema-aware row construction, query fallback

pub mod client;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod types;

pub use client::{NotionClient, RecordStore, NOTION_API_BASE, NOTION_VERSION};
pub use decoder::{decode, decode_absent, decode_json};
pub use error::{NotionError, Result};
pub use reader::{RecordTableReader, RowSet, DEFAULT_MAX_ITEMS};
pub use types::{
    column_key, DatabaseSchema, DateRange, PropertyKind, PropertyValue, QueryPage, Record,
    RecordQuery, Row, SelectOption, TextRun, ID_KEY, URL_KEY,
};

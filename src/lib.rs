//! Workspace placeholder crate.
//!
//! Exposes feature flags that map onto the individual workspace crates so a
//! host application can depend on `cloud-ingest-workspace` and pick the
//! providers it needs without wiring each crate by hand.

#[cfg(any(
    feature = "desktop-shims",
    feature = "google-drive",
    feature = "onedrive",
    feature = "notion"
))]
pub use core_service::*;

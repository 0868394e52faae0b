/// The version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The technology identifier reported with every event.
pub const TECHNOLOGY: &str = "rust";

include!(concat!(env!("OUT_DIR"), "/constants.gen.rs"));

/// The user agent the HTTP transport reports.
pub const USER_AGENT: &str = concat!("streply.rust/", env!("CARGO_PKG_VERSION"));

/// The compiler version reported as `technologyVersion`.
pub fn technology_version() -> &'static str {
    RUSTC_VERSION.unwrap_or("unknown")
}

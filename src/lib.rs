//! xv - X/Twitter stream-archive importer
//!
//! This library provides the core functionality for turning raw stream
//! archives (zip or tar containers of bz2-compressed JSON lines) into a
//! compact RocksDB fact store.
//!
//! # Modules
//!
//! - [`archive`] - Container access for zip and tar stream archives
//! - [`pipeline`] - Bounded-concurrency decode pipeline
//! - [`decode`] - JSON line decoding into typed items
//! - [`model`] - Tweet, deletion, and profile data models
//! - [`codec`] - Binary key/value layouts and merge rules
//! - [`store`] - RocksDB storage layer
//! - [`importer`] - Transactional, resumable import
//! - [`profiles`] - Full user-profile side table

pub mod archive;
pub mod cli;
pub mod codec;
pub mod config;
pub mod decode;
pub mod error;
pub mod importer;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod profiles;
pub mod store;
pub mod twitter;

pub use archive::{Archive, collect_archives};
pub use cli::*;
pub use error::{Result, ResultExt, XvError, format_error};
pub use importer::{EntryOutcome, Importer, MutationBatch};
pub use model::*;
pub use pipeline::{FileResult, PipelineOptions};
pub use store::Store;

/// Default store directory name
pub const DEFAULT_STORE_DIR: &str = "store";

/// Default profile store directory name
pub const DEFAULT_PROFILE_DIR: &str = "profiles";

const BYTES_PER_KB: u64 = 1024;
const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// Get the default data directory for xv
#[must_use]
pub fn default_data_dir() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("xv")
}

/// Get the default store path
#[must_use]
pub fn default_store_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_STORE_DIR)
}

/// Get the default profile store path
#[must_use]
pub fn default_profile_store_path() -> std::path::PathBuf {
    default_data_dir().join(DEFAULT_PROFILE_DIR)
}

/// Format an unsigned integer with thousands separators.
#[must_use]
pub fn format_number(value: u64) -> String {
    let mut out = String::with_capacity(24);

    for (idx, ch) in value.to_string().chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out.chars().rev().collect()
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    format_number(u64::try_from(value).unwrap_or(u64::MAX))
}

/// Format bytes into a human-friendly string.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < BYTES_PER_KB {
        format!("{bytes} B")
    } else if bytes < BYTES_PER_MB {
        format_bytes_with_unit(bytes, BYTES_PER_KB, "KB")
    } else if bytes < BYTES_PER_GB {
        format_bytes_with_unit(bytes, BYTES_PER_MB, "MB")
    } else {
        format_bytes_with_unit(bytes, BYTES_PER_GB, "GB")
    }
}

fn format_bytes_with_unit(bytes: u64, unit: u64, suffix: &str) -> String {
    let whole = bytes / unit;
    let tenths = (bytes % unit) * 10 / unit;
    format!("{whole}.{tenths} {suffix}")
}

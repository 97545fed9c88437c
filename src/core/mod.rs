//! Generation core.
//!
//! Stages in pass order:
//! - [`source`]: line-oriented Go source index
//! - [`collect`]: directive scanning, parsing and target binding
//! - [`validate`]: per-file placement checks
//! - [`aggregate`]: services assembled across the files of a folder
//! - [`synth`]: field initializers and route adapters
//! - [`imports`]: import merging and alias resolution
//! - [`emit`]: output file rendering
//! - [`cache`]: incremental manifest
//! - [`pipeline`]: one folder, end to end

pub mod aggregate;
pub mod cache;
pub mod collect;
pub mod emit;
pub mod error;
pub mod file_scanner;
pub mod imports;
pub mod pipeline;
pub mod source;
pub mod synth;
pub mod validate;

pub use error::GenError;
pub use file_scanner::{PackageFolder, ScanOptions, scan_folders};
pub use pipeline::{FolderOptions, FolderOutcome, FolderReport, clean_folder, process_folder};

//! Schema archive staging for protogen
//!
//! A protocol description can be delivered as a single `.zip` holding the
//! usual input layout. This crate extracts such an archive into a private
//! staging directory and locates the `config.json` files inside it, so the
//! generator can run on the extracted tree.
//!
//! # Archive Structure
//!
//! ```text
//! demo.zip
//! └── demo/
//!     ├── config.json
//!     ├── main/
//!     │   └── packet.json
//!     └── common/
//!         └── header.json
//! ```
//!
//! # Example
//!
//! ```no_run
//! use protogen_bundle::ArchiveStager;
//!
//! let stager = ArchiveStager::new("/var/lib/protogen/staging");
//! let staged = stager.stage("incoming/demo.zip")?;
//! for config in &staged.configs {
//!     println!("found {}", config.display());
//! }
//! # Ok::<(), protogen_bundle::BundleError>(())
//! ```

mod error;

pub mod archive;

pub use archive::{ArchiveStager, StagedArchive, find_configs, is_zip};
pub use error::BundleError;

/// Result type for archive operations.
pub type BundleResult<T> = Result<T, BundleError>;

//! This is a virtual filesystem layer made of named roots. Each root
//! (`persistent`, `temporary`, `application`, `root`, and whatever else the
//! host provides) is bound to one native base directory. Entries inside a
//! root are named by URIs in several schemes, and all IO goes through a
//! pluggable native storage backend, asynchronously (via Tokio).
//!
//! rootvfs tries really hard to not care what the host is. It knows nothing
//! about any platform's storage APIs; it only knows the handful of primitive
//! operations in [`NativeStorage`](trait.NativeStorage.html). Two backends
//! come with it: the host filesystem (feature `fs`) and an in-memory tree
//! (feature `memory`).
//!
//! # Overview
//!
//! ```rust
//! # use std::sync::Arc;
//! # use rootvfs::*;
//! # tokio::runtime::Builder::new_current_thread().build().unwrap()
//! #     .block_on(async {
//! let registry = Registry::builder()
//!     .root(PERSISTENT, "/var/app/data")
//!     .root(TEMPORARY, "/var/app/tmp")
//!     .build().unwrap();
//! let storage = MemoryStorage::from_listing(&[
//!     ("/var/app/data/docs/report.txt", b"quarterly"),
//!     ("/var/app/tmp/", b""),
//! ]);
//! let vfs = VFS::new(Arc::new(registry), Arc::new(storage));
//! let copy = vfs.copy_to("cdvfile://localhost/persistent/docs/report.txt",
//!                        "file:///var/app/tmp/", None).await.unwrap();
//! assert_eq!(copy.to_url(), "cdvfile://localhost/temporary/report.txt");
//! # });
//! ```
//!
//! ## Paths
//!
//! A path within a root is a [`Path`](struct.Path.html) or
//! [`PathBuf`](struct.PathBuf.html), never a string or an OS path. Paths are
//! sanitized on the way in: separators collapse, `.` vanishes, and `..`
//! removes one component but can never climb above the root. A `..` that
//! would have is dropped, not reported. Callers that need to know must check
//! the result.
//!
//! No component may contain `\ ? * | " < > :`. See
//! [`is_valid_segment_name`](fn.is_valid_segment_name.html).
//!
//! ## URIs
//!
//! A [`Resolver`](struct.Resolver.html) accepts, in order:
//!
//! - `file:` URIs, matched against each root's native base directory
//! - named-root URIs, `cdvfile://localhost/<root>/<path>`
//! - any other URI prefix a root was registered with
//! - bare native absolute paths
//!
//! Entries print themselves back out as either kind of URL, with a trailing
//! `/` for directories and none for files.
//!
//! ## Transfers
//!
//! [`transfer`](fn.transfer.html) copies or moves files and whole directory
//! trees, within a root or between roots. All collision and self-reference
//! checks happen before anything is modified. Nothing after that is atomic.

// `p!` expands to `::rootvfs::...`, which has to work in here too.
extern crate self as rootvfs;

/// Specifies a constant, literal path. Give it a string literal and it will
/// sanitize and validate it and give you a
/// [`&'static Path`](struct.Path.html), with no runtime overhead.
///
/// ```rust
/// # use rootvfs::{Path, p};
/// const REPORT_PATH: &Path = p!("/docs/report.txt");
/// assert_eq!(p!("docs//report.txt/"), REPORT_PATH);
/// ```
///
/// Anywhere you're hardcoding a path in your code, you should use `p!()` to
/// denote it. If you've made some mistake in your path that makes it invalid,
/// this catches it at compile time instead of runtime.
///
/// The sole argument must be a single string literal. It can be a raw string
/// if you like, but it can't be a byte string, and it *definitely* can't be
/// some other expression. If you want to build a path at runtime, just use
/// [`Path`](struct.Path.html) or [`PathBuf`](struct.PathBuf.html) methods as
/// appropriate.
pub use rootvfs_pathmacro::p;

mod path;
pub use path::*;

mod error;
pub use error::*;

mod storage;
pub use storage::*;

#[cfg(feature = "fs")]
mod fs;
#[cfg(feature = "fs")]
pub use fs::FsStorage;

#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "memory")]
pub use memory::{MemoryStorage, MAX_FILE_SIZE};

mod registry;
pub use registry::*;

mod uri;
pub use uri::*;

mod locator;
pub use locator::*;

mod transfer;
pub use transfer::transfer;
pub use transfer::TransferMode;

mod vfs;
pub use vfs::*;

use std::{
    io,
    time::SystemTime,
};
use async_trait::async_trait;

/// What the native storage found at a path.
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct Metadata {
    pub kind: NodeKind,
    /// Length in bytes. Zero for directories, unless the backend knows
    /// better.
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// One direct child of a listed directory.
#[derive(Debug,Clone,PartialEq,Eq,PartialOrd,Ord)]
pub struct Child {
    pub name: String,
    pub kind: NodeKind,
}

/// The primitive storage operations of one host platform.
///
/// Every path is a native absolute path string, as produced by
/// [`FilesystemRoot::native_path`](struct.FilesystemRoot.html#method.native_path).
/// Directories are given without a trailing separator. Implementations
/// report a missing path with `ErrorKind::NotFound`; everything built on
/// top of this trait relies on that.
///
/// Nothing here is transactional. Two callers may interleave freely.
#[async_trait]
pub trait NativeStorage : Send + Sync {
    /// Reports whether a file or directory exists at the path.
    async fn stat(&self, path: &str) -> io::Result<Metadata>;
    /// Creates a new empty file. Fails with `AlreadyExists` if anything is
    /// already there, and with `NotFound` if the parent is missing.
    async fn create_file(&self, path: &str) -> io::Result<()>;
    /// Creates a new empty directory. Same failure rules as `create_file`.
    async fn create_directory(&self, path: &str) -> io::Result<()>;
    async fn delete_file(&self, path: &str) -> io::Result<()>;
    /// Deletes a directory, which must be empty.
    async fn delete_directory(&self, path: &str) -> io::Result<()>;
    /// Lists the direct children of a directory, in no particular order.
    async fn list_children(&self, path: &str) -> io::Result<Vec<Child>>;
    /// Moves a file, replacing any file already at `to`.
    async fn move_file(&self, from: &str, to: &str) -> io::Result<()>;
    /// Copies a file, replacing any file already at `to`.
    async fn copy_file(&self, from: &str, to: &str) -> io::Result<()>;
    /// Reads the bytes in `start..end`. Both are clamped to the length of
    /// the file.
    async fn read_bytes(&self, path: &str, start: u64, end: u64)
	-> io::Result<Vec<u8>>;
    /// Writes `data` at `offset`, creating the file if it doesn't exist and
    /// zero-filling any gap. Returns the number of bytes written. A write
    /// that would end beyond what the backend can address fails with
    /// `FileTooLarge`, and one that doesn't fit with `StorageFull`.
    async fn write_bytes(&self, path: &str, offset: u64, data: &[u8])
	-> io::Result<u64>;
    /// Sets the length of a file, cutting or zero-extending it.
    async fn truncate(&self, path: &str, size: u64) -> io::Result<()>;
    /// Bytes still available to the filesystem holding `path`, if the
    /// backend can tell.
    async fn free_space(&self, _path: &str) -> io::Result<Option<u64>> {
	Ok(None)
    }
}

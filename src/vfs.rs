use crate::*;
use crate::locator::is_missing;
use crate::transfer::native_join;

use std::{
    collections::VecDeque,
    fmt::{Debug, Formatter},
    io::ErrorKind,
    sync::Arc,
    time::SystemTime,
};
use base64::Engine;

/// The default ceiling for [`VFS::request_file_system`].
pub const DEFAULT_QUOTA_CEILING: u64 = 10_000_000_000;

/// The two kinds of filesystem a caller can request by number.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum FileSystemType {
    Temporary,
    Persistent,
}

impl FileSystemType {
    /// `0` is temporary, `1` is persistent.
    pub fn from_code(code: u16) -> Option<FileSystemType> {
	match code {
	    0 => Some(FileSystemType::Temporary),
	    1 => Some(FileSystemType::Persistent),
	    _ => None,
	}
    }
    pub fn root_name(self) -> &'static str {
	match self {
	    FileSystemType::Temporary => TEMPORARY,
	    FileSystemType::Persistent => PERSISTENT,
	}
    }
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub struct EntryMetadata {
    pub kind: Kind,
    pub size: u64,
    pub modification_time: Option<SystemTime>,
    pub name: String,
    pub full_path: String,
    /// Guessed from the name. `text/directory` for directories.
    pub media_type: &'static str,
}

/// How [`VFS::read_as_text`] decodes bytes.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// Byte order from a leading byte order mark, which is dropped.
    /// Big-endian if there is none.
    Utf16,
}

impl TextEncoding {
    /// Looks up an encoding by its IANA name, ignoring case.
    pub fn from_label(label: &str) -> Option<TextEncoding> {
	match label.to_ascii_lowercase().as_str() {
	    "utf-8" | "utf8" => Some(TextEncoding::Utf8),
	    "utf-16le" => Some(TextEncoding::Utf16Le),
	    "utf-16be" => Some(TextEncoding::Utf16Be),
	    "utf-16" => Some(TextEncoding::Utf16),
	    _ => None,
	}
    }
    pub fn decode(self, bytes: &[u8]) -> FileResult<String> {
	let (bytes, big_endian) = match self {
	    TextEncoding::Utf8 => return String::from_utf8(bytes.to_vec())
		.map_err(|_| FileError::Encoding),
	    TextEncoding::Utf16Le => (bytes, false),
	    TextEncoding::Utf16Be => (bytes, true),
	    TextEncoding::Utf16 => match bytes {
		[0xFF, 0xFE, rest @ ..] => (rest, false),
		[0xFE, 0xFF, rest @ ..] => (rest, true),
		_ => (bytes, true),
	    },
	};
	if bytes.len() % 2 != 0 { return Err(FileError::Encoding) }
	let units: Vec<u16> = bytes.chunks_exact(2)
	    .map(|x| if big_endian { u16::from_be_bytes([x[0], x[1]]) }
		 else { u16::from_le_bytes([x[0], x[1]]) })
	    .collect();
	String::from_utf16(&units).map_err(|_| FileError::Encoding)
    }
}

const MEDIA_TYPES: &[(&str, &str)] = &[
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("gif", "image/gif"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("webp", "image/webp"),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

/// The media type of a file, going by the extension of its name.
pub fn media_type_for(name: &str) -> &'static str {
    let extension = match name.rsplit_once('.') {
	Some((stem, x)) if !stem.is_empty() => x.to_ascii_lowercase(),
	_ => return "application/octet-stream",
    };
    match MEDIA_TYPES.binary_search_by(|(x, _)| (*x).cmp(extension.as_str())) {
	Ok(i) => MEDIA_TYPES[i].1,
	Err(_) => "application/octet-stream",
    }
}

/// Native URLs of the directories applications usually want. A directory is
/// `None` if no root provides it.
#[derive(Debug,Clone,PartialEq,Eq,Default)]
pub struct WellKnownPaths {
    pub application_directory: Option<String>,
    pub data_directory: Option<String>,
    pub cache_directory: Option<String>,
    pub temp_directory: Option<String>,
}

/// The entry operations, on URIs.
///
/// A `VFS` is cheap to clone; clones share the same registry and storage.
/// Every operation resolves its URIs and locates its entries anew. Nothing
/// is cached between calls, and nothing is locked.
#[derive(Clone)]
pub struct VFS {
    registry: Arc<Registry>,
    storage: Arc<dyn NativeStorage>,
    resolver: Arc<Resolver>,
    quota_ceiling: u64,
}

impl Debug for VFS {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	fmt.debug_struct("VFS")
	    .field("resolver", &self.resolver)
	    .field("quota_ceiling", &self.quota_ceiling)
	    .finish()
    }
}

/// Turns a pair of possibly negative offsets into a range within `0..size`.
/// Negative offsets count back from the end.
fn clamp_range(size: u64, start: i64, end: i64) -> (u64, u64) {
    let clamp = |x: i64| -> u64 {
	if x < 0 { size.saturating_sub(x.unsigned_abs()) }
	else { (x as u64).min(size) }
    };
    let start = clamp(start);
    let end = clamp(end);
    (start, end.max(start))
}

impl VFS {
    pub fn new(registry: Arc<Registry>, storage: Arc<dyn NativeStorage>)
	-> VFS {
	let resolver = Resolver::new(registry.clone());
	VFS::with_resolver(resolver, storage)
    }
    /// Uses a resolver with a custom set of matchers.
    pub fn with_resolver(resolver: Resolver, storage: Arc<dyn NativeStorage>)
	-> VFS {
	VFS {
	    registry: resolver.registry().clone(),
	    storage,
	    resolver: Arc::new(resolver),
	    quota_ceiling: DEFAULT_QUOTA_CEILING,
	}
    }
    /// The standard roots for this host, on the host filesystem.
    #[cfg(all(feature = "stdpaths", feature = "fs"))]
    pub fn with_standard_roots(unixy_name: &str)
	-> std::result::Result<VFS, RegistryError> {
	let registry = Registry::with_standard_roots(unixy_name)?;
	Ok(VFS::new(Arc::new(registry), Arc::new(FsStorage::new())))
    }
    pub fn with_quota_ceiling(mut self, bytes: u64) -> VFS {
	self.quota_ceiling = bytes;
	self
    }
    pub fn registry(&self) -> &Arc<Registry> { &self.registry }
    pub fn storage(&self) -> &Arc<dyn NativeStorage> { &self.storage }
    pub fn resolver(&self) -> &Resolver { &self.resolver }
    pub fn resolve(&self, uri: &str) -> FileResult<Resolved> {
	self.resolver.resolve(uri)
    }
    async fn locate_uri(&self, uri: &str) -> FileResult<EntryRef> {
	let resolved = self.resolve(uri)?;
	locate(&*self.storage, &resolved.root, &resolved.path).await
    }
    async fn locate_existing(&self, uri: &str) -> FileResult<EntryRef> {
	let entry = self.locate_uri(uri).await?;
	if !entry.exists() { return Err(FileError::NotFound) }
	Ok(entry)
    }
    /// Like `locate_existing`, but keeps everything the storage reported.
    async fn stat_existing(&self, uri: &str)
	-> FileResult<(EntryRef, Metadata)> {
	let resolved = self.resolve(uri)?;
	match self.storage.stat(&resolved.native_path()).await {
	    Ok(meta) => Ok((EntryRef::new(resolved.root, resolved.path,
					  meta.kind.into()), meta)),
	    Err(x) if is_missing(&x) => Err(FileError::NotFound),
	    Err(x) => Err(FileError::from_native(x, FileError::NotReadable)),
	}
    }
    /// The root entry of the temporary or persistent filesystem. Fails with
    /// `QuotaExceeded` if `size` is above the ceiling, without touching the
    /// storage.
    pub fn request_file_system(&self, ty: FileSystemType, size: u64)
	-> FileResult<EntryRef> {
	if size > self.quota_ceiling {
	    log::debug!("{} bytes requested, ceiling is {}", size,
			self.quota_ceiling);
	    return Err(FileError::QuotaExceeded)
	}
	let root = self.registry.get_root(ty.root_name())?;
	Ok(EntryRef::new(root.clone(), PathBuf::new(), Kind::Directory))
    }
    /// The root entries of every registered root, in registration order.
    pub fn request_all_file_systems(&self) -> Vec<EntryRef> {
	self.registry.all_roots().iter()
	    .map(|root| EntryRef::new(root.clone(), PathBuf::new(),
				      Kind::Directory))
	    .collect()
    }
    pub fn well_known_paths(&self) -> WellKnownPaths {
	let url = |name: &str| self.registry.get_root(name).ok()
	    .map(|x| x.native_url().to_string());
	WellKnownPaths {
	    application_directory: url(APPLICATION),
	    data_directory: url(PERSISTENT),
	    cache_directory: url(CACHE).or_else(|| url(TEMPORARY)),
	    temp_directory: url(TEMPORARY),
	}
    }
    /// The entry a URI refers to, which must exist.
    pub async fn resolve_local_file_system_uri(&self, uri: &str)
	-> FileResult<EntryRef> {
	self.locate_existing(uri).await
    }
    async fn get(&self, dir_uri: &str, path: &str, wanted: NodeKind,
		 flags: Flags) -> FileResult<EntryRef> {
	let dir = self.resolve(dir_uri)?;
	if !path.split('/').filter(|x| !matches!(*x, "" | "." | ".."))
	    .all(is_valid_segment_name) {
	    log::debug!("{:?} has an invalid component", path);
	    return Err(FileError::Encoding)
	}
	let full = dir.path.join_or_replace(path);
	get_entry(&*self.storage, &dir.root, &full, wanted, flags).await
    }
    /// Looks up, or creates, a file. `path` is relative to the directory
    /// `dir_uri`, or to its root if it begins with `/`.
    pub async fn get_file(&self, dir_uri: &str, path: &str, flags: Flags)
	-> FileResult<EntryRef> {
	self.get(dir_uri, path, NodeKind::File, flags).await
    }
    /// Looks up, or creates, a directory. Same rules as
    /// [`get_file`](#method.get_file).
    pub async fn get_directory(&self, dir_uri: &str, path: &str, flags: Flags)
	-> FileResult<EntryRef> {
	self.get(dir_uri, path, NodeKind::Directory, flags).await
    }
    /// The directory containing an entry. The parent of a root is the root
    /// itself.
    pub async fn get_parent(&self, uri: &str) -> FileResult<EntryRef> {
	let resolved = self.resolve(uri)?;
	let parent = locate(&*self.storage, &resolved.root,
			    resolved.path.parent()).await?;
	if !parent.is_dir() { return Err(FileError::InvalidState) }
	Ok(parent)
    }
    pub async fn get_metadata(&self, uri: &str) -> FileResult<EntryMetadata> {
	let (entry, meta) = self.stat_existing(uri).await?;
	Ok(EntryMetadata {
	    kind: entry.kind(),
	    size: meta.size,
	    modification_time: meta.modified,
	    name: entry.name().to_string(),
	    full_path: entry.full_path(),
	    media_type: if entry.is_dir() { "text/directory" }
	    else { media_type_for(entry.name()) },
	})
    }
    /// The children of a directory, sorted by name. Children whose names
    /// can't be part of a path are left out.
    pub async fn read_entries(&self, uri: &str) -> FileResult<Vec<EntryRef>> {
	let dir = self.locate_existing(uri).await?;
	if !dir.is_dir() { return Err(FileError::TypeMismatch) }
	let mut children = self.storage.list_children(&dir.native_path())
	    .await
	    .map_err(|x| FileError::from_native(x, FileError::NotReadable))?;
	children.sort();
	let mut ret = Vec::with_capacity(children.len());
	for child in children {
	    let mut path = dir.path().to_owned();
	    if let Err(x) = path.push(&child.name) {
		log::debug!("skipping {:?} in {}:{} ({})", child.name,
			    dir.root().name(), dir.path(), x);
		continue
	    }
	    ret.push(EntryRef::new(dir.root().clone(), path,
				   child.kind.into()));
	}
	Ok(ret)
    }
    /// Removes a file, or an empty directory.
    pub async fn remove(&self, uri: &str) -> FileResult<()> {
	let entry = self.locate_existing(uri).await?;
	if entry.is_root() || entry.root().is_read_only() {
	    return Err(FileError::NoModificationAllowed)
	}
	let native = entry.native_path();
	let result = if entry.is_dir() {
	    let children = self.storage.list_children(&native).await
		.map_err(|x| FileError::from_native(x,
						    FileError::NotReadable))?;
	    if !children.is_empty() {
		return Err(FileError::InvalidModification)
	    }
	    self.storage.delete_directory(&native).await
	}
	else {
	    self.storage.delete_file(&native).await
	};
	result.map_err(|x| FileError::from_native(x,
						  FileError::InvalidModification))
    }
    /// Removes a directory and everything under it. A failure partway
    /// through leaves whatever wasn't removed yet.
    pub async fn remove_recursively(&self, uri: &str) -> FileResult<()> {
	let entry = self.locate_existing(uri).await?;
	if entry.is_root() || entry.root().is_read_only() {
	    return Err(FileError::NoModificationAllowed)
	}
	if !entry.is_dir() { return Err(FileError::TypeMismatch) }
	let storage = &*self.storage;
	let mut queue = VecDeque::new();
	let mut visited = Vec::new();
	queue.push_back(entry.native_path());
	while let Some(dir) = queue.pop_front() {
	    let children = storage.list_children(&dir).await
		.map_err(|x| FileError::from_native(x,
						    FileError::NotReadable))?;
	    for child in children {
		let path = native_join(&dir, &child.name);
		match child.kind {
		    NodeKind::File => {
			log::trace!("removing file {:?}", path);
			storage.delete_file(&path).await
			    .map_err(|x| FileError::from_native(x,
								FileError::InvalidModification))?;
		    },
		    NodeKind::Directory => queue.push_back(path),
		}
	    }
	    visited.push(dir);
	}
	for dir in visited.iter().rev() {
	    log::trace!("removing directory {:?}", dir);
	    storage.delete_directory(dir).await
		.map_err(|x| FileError::from_native(x,
						    FileError::InvalidModification))?;
	}
	Ok(())
    }
    /// Reads the bytes of a file between `start` and `end`. Negative offsets
    /// count back from the end of the file; both are clamped to the file.
    pub async fn read(&self, uri: &str, start: i64, end: i64)
	-> FileResult<Vec<u8>> {
	let (entry, meta) = self.stat_existing(uri).await?;
	if !entry.is_file() { return Err(FileError::TypeMismatch) }
	let (start, end) = clamp_range(meta.size, start, end);
	if start == end { return Ok(vec![]) }
	self.storage.read_bytes(&entry.native_path(), start, end).await
	    .map_err(|x| FileError::from_native(x, FileError::NotReadable))
    }
    /// Reads part of a file as text. Bytes that aren't valid in `encoding`
    /// are an `Encoding` error.
    pub async fn read_as_text(&self, uri: &str, encoding: TextEncoding,
			      start: i64, end: i64) -> FileResult<String> {
	let bytes = self.read(uri, start, end).await?;
	encoding.decode(&bytes)
    }
    /// Reads part of a file as a string with one char per byte, U+0000
    /// through U+00FF.
    pub async fn read_as_binary_string(&self, uri: &str, start: i64, end: i64)
	-> FileResult<String> {
	let bytes = self.read(uri, start, end).await?;
	Ok(bytes.into_iter().map(char::from).collect())
    }
    /// Reads part of a file as a `data:` URL, base64-encoded, with the media
    /// type guessed from the file's name.
    pub async fn read_as_data_url(&self, uri: &str, start: i64, end: i64)
	-> FileResult<String> {
	let resolved = self.resolve(uri)?;
	let bytes = self.read(uri, start, end).await?;
	Ok(format!("data:{};base64,{}", media_type_for(resolved.path.name()),
		   base64::engine::general_purpose::STANDARD.encode(bytes)))
    }
    /// Bytes still free under the root `uri` belongs to, if the storage
    /// can tell.
    pub async fn free_disk_space(&self, uri: &str) -> FileResult<Option<u64>> {
	let resolved = self.resolve(uri)?;
	let base = resolved.root.native_path(Path::root());
	self.storage.free_space(&base).await
	    .map_err(|x| FileError::from_native(x, FileError::NotReadable))
    }
    /// Writes `data` into a file at `offset`, creating the file if it
    /// doesn't exist. Returns the number of bytes written.
    pub async fn write(&self, uri: &str, offset: u64, data: &[u8])
	-> FileResult<u64> {
	let entry = self.locate_uri(uri).await?;
	if entry.root().is_read_only() {
	    return Err(FileError::NoModificationAllowed)
	}
	match entry.kind() {
	    Kind::Directory => return Err(FileError::InvalidModification),
	    Kind::Missing => {
		let parent = locate(&*self.storage, entry.root(),
				    entry.path().parent()).await?;
		if !parent.is_dir() { return Err(FileError::NotFound) }
	    },
	    Kind::File => (),
	}
	self.storage.write_bytes(&entry.native_path(), offset, data).await
	    .map_err(|x| FileError::from_native(x,
						FileError::InvalidModification))
    }
    /// Cuts a file down to `size` bytes. A file already that small is left
    /// alone. Returns the new length.
    pub async fn truncate(&self, uri: &str, size: u64) -> FileResult<u64> {
	let (entry, meta) = self.stat_existing(uri).await?;
	if entry.root().is_read_only() {
	    return Err(FileError::NoModificationAllowed)
	}
	if !entry.is_file() { return Err(FileError::TypeMismatch) }
	if size >= meta.size { return Ok(meta.size) }
	match self.storage.truncate(&entry.native_path(), size).await {
	    Ok(()) => Ok(size),
	    Err(x) if x.kind() == ErrorKind::NotFound
		=> Err(FileError::NotFound),
	    Err(x) => Err(FileError::from_native(x,
						 FileError::InvalidModification)),
	}
    }
    async fn transfer_uri(&self, mode: TransferMode, source_uri: &str,
			  parent_uri: &str, name: Option<&str>)
	-> FileResult<EntryRef> {
	let source = self.resolve(source_uri)?;
	let parent = self.resolve(parent_uri)?;
	transfer(&*self.storage, mode, &source, &parent, name).await
    }
    /// Copies an entry into the directory `parent_uri`, as `name` (or under
    /// its own name). See [`transfer`](fn.transfer.html) for the rules.
    pub async fn copy_to(&self, source_uri: &str, parent_uri: &str,
			 name: Option<&str>) -> FileResult<EntryRef> {
	self.transfer_uri(TransferMode::Copy, source_uri, parent_uri, name)
	    .await
    }
    /// Moves an entry into the directory `parent_uri`, as `name` (or under
    /// its own name). See [`transfer`](fn.transfer.html) for the rules.
    pub async fn move_to(&self, source_uri: &str, parent_uri: &str,
			 name: Option<&str>) -> FileResult<EntryRef> {
	self.transfer_uri(TransferMode::Move, source_uri, parent_uri, name)
	    .await
    }
}

#[cfg(all(test, feature = "memory"))]
mod test {
    use super::*;
    const PERSISTENT_URI: &str = "cdvfile://localhost/persistent/";
    fn vfs() -> VFS {
	let registry = Registry::builder()
	    .root(PERSISTENT, "/data")
	    .root(TEMPORARY, "/tmp")
	    .root(APPLICATION, "/app")
	    .build().unwrap();
	let storage = MemoryStorage::from_listing(&[
	    ("/data/note.txt", b"hello world"),
	    ("/data/docs/a.txt", b"a"),
	    ("/data/docs/b/", b""),
	    ("/data/docs/c.txt", b"c"),
	    ("/data/empty/", b""),
	    ("/data/binary", b"\xFF\xFE"),
	    ("/tmp/", b""),
	    ("/app/www/index.html", b"<html>"),
	]);
	VFS::new(Arc::new(registry), Arc::new(storage))
    }
    #[test] fn quota() {
	let vfs = vfs();
	assert_eq!(vfs.request_file_system(FileSystemType::Persistent,
					   DEFAULT_QUOTA_CEILING + 1),
		   Err(FileError::QuotaExceeded));
	let vfs = vfs.with_quota_ceiling(100);
	assert_eq!(vfs.request_file_system(FileSystemType::Temporary, 101),
		   Err(FileError::QuotaExceeded));
	let root = vfs.request_file_system(FileSystemType::Temporary, 100)
	    .unwrap();
	assert_eq!(root.to_url(), "cdvfile://localhost/temporary/");
	assert!(root.is_dir());
	let lonely = VFS::new(Arc::new(Registry::builder()
				       .root(PERSISTENT, "/data")
				       .build().unwrap()),
			      Arc::new(MemoryStorage::new()));
	assert_eq!(lonely.request_file_system(FileSystemType::Temporary, 0),
		   Err(FileError::NotFound));
	assert_eq!(FileSystemType::from_code(1),
		   Some(FileSystemType::Persistent));
	assert_eq!(FileSystemType::from_code(2), None);
    }
    #[test] fn all_roots_and_well_known_paths() {
	let vfs = vfs();
	let names: Vec<String> = vfs.request_all_file_systems().iter()
	    .map(|x| x.root().name().to_string()).collect();
	assert_eq!(names, &[PERSISTENT, TEMPORARY, APPLICATION]);
	assert_eq!(vfs.well_known_paths(), WellKnownPaths {
	    application_directory: Some("file:///app/".to_string()),
	    data_directory: Some("file:///data/".to_string()),
	    cache_directory: Some("file:///tmp/".to_string()),
	    temp_directory: Some("file:///tmp/".to_string()),
	});
    }
    #[tokio::test]
    async fn exclusive_create_of_existing_file() {
	let vfs = vfs();
	let err = vfs.get_file(PERSISTENT_URI, "note.txt", Flags::CREATE_NEW)
	    .await.unwrap_err();
	assert_eq!(err, FileError::PathExists);
	assert_eq!(err.code(), 12);
    }
    #[tokio::test]
    async fn get_file_and_directory() {
	let vfs = vfs();
	let docs = "cdvfile://localhost/persistent/docs/";
	let entry = vfs.get_file(docs, "a.txt", Flags::OPEN).await.unwrap();
	assert_eq!(entry.full_path(), "/docs/a.txt");
	let entry = vfs.get_file(docs, "/note.txt", Flags::OPEN).await
	    .unwrap();
	assert_eq!(entry.full_path(), "/note.txt");
	let entry = vfs.get_file(docs, "../../../note.txt", Flags::OPEN)
	    .await.unwrap();
	assert_eq!(entry.full_path(), "/note.txt");
	assert_eq!(vfs.get_file(docs, "b", Flags::OPEN).await,
		   Err(FileError::TypeMismatch));
	assert_eq!(vfs.get_file(docs, "bad|name", Flags::CREATE).await,
		   Err(FileError::Encoding));
	assert_eq!(vfs.get_directory(docs, "x/y", Flags::CREATE).await,
		   Err(FileError::NotFound));
	let entry = vfs.get_directory(docs, "x", Flags::CREATE).await
	    .unwrap();
	assert_eq!(entry.to_url(), "cdvfile://localhost/persistent/docs/x/");
	assert_eq!(vfs.get_file(docs, "c.txt", Flags::CREATE).await.unwrap()
		   .to_url(), "cdvfile://localhost/persistent/docs/c.txt");
	assert_eq!(vfs.read(&format!("{}c.txt", docs), 0, 100).await
		   .unwrap(), b"c");
	assert_eq!(vfs.get_file("cdvfile://localhost/nowhere/", "a",
				Flags::OPEN).await,
		   Err(FileError::Encoding));
    }
    #[tokio::test]
    async fn trailing_slash_canonicalization() {
	let vfs = vfs();
	let a = vfs.resolve_local_file_system_uri(
	    "cdvfile://localhost/persistent/docs").await.unwrap();
	let b = vfs.resolve_local_file_system_uri(
	    "cdvfile://localhost/persistent/docs/").await.unwrap();
	assert_eq!(a, b);
	assert!(a.to_url().ends_with('/'));
	let f = vfs.resolve_local_file_system_uri(
	    "cdvfile://localhost/persistent/note.txt/").await.unwrap();
	assert_eq!(f.to_url(), "cdvfile://localhost/persistent/note.txt");
	assert_eq!(vfs.resolve_local_file_system_uri(
	    "cdvfile://localhost/persistent/nope").await,
		   Err(FileError::NotFound));
    }
    #[tokio::test]
    async fn parents() {
	let vfs = vfs();
	let parent = vfs.get_parent("/data/docs/a.txt").await.unwrap();
	assert_eq!(parent.full_path(), "/docs/");
	let parent = vfs.get_parent(PERSISTENT_URI).await.unwrap();
	assert!(parent.is_root());
	assert_eq!(vfs.get_parent("/data/gone/a.txt").await,
		   Err(FileError::InvalidState));
    }
    #[tokio::test]
    async fn metadata() {
	let vfs = vfs();
	let meta = vfs.get_metadata("/data/note.txt").await.unwrap();
	assert_eq!(meta.kind, Kind::File);
	assert_eq!(meta.size, 11);
	assert_eq!(meta.name, "note.txt");
	assert_eq!(meta.full_path, "/note.txt");
	assert!(meta.modification_time.is_some());
	assert_eq!(meta.media_type, "text/plain");
	let meta = vfs.get_metadata("/data/docs").await.unwrap();
	assert_eq!(meta.kind, Kind::Directory);
	assert_eq!(meta.full_path, "/docs/");
	assert_eq!(meta.media_type, "text/directory");
	assert_eq!(vfs.get_metadata("/data/note.txt/under").await,
		   Err(FileError::NotFound));
	assert_eq!(vfs.get_metadata("/data/nope").await,
		   Err(FileError::NotFound));
    }
    #[tokio::test]
    async fn listing() {
	let vfs = vfs();
	let entries = vfs.read_entries("/data/docs").await.unwrap();
	let paths: Vec<String> = entries.iter()
	    .map(EntryRef::full_path).collect();
	assert_eq!(paths, &["/docs/a.txt", "/docs/b/", "/docs/c.txt"]);
	assert_eq!(vfs.read_entries("/data/note.txt").await,
		   Err(FileError::TypeMismatch));
	assert_eq!(vfs.read_entries("/data/nope").await,
		   Err(FileError::NotFound));
	assert!(vfs.read_entries("/data/empty").await.unwrap().is_empty());
    }
    #[tokio::test]
    async fn removal() {
	let vfs = vfs();
	assert_eq!(vfs.remove(PERSISTENT_URI).await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.remove("/data/docs").await,
		   Err(FileError::InvalidModification));
	assert_eq!(vfs.remove("/data/nope").await, Err(FileError::NotFound));
	vfs.remove("/data/empty").await.unwrap();
	vfs.remove("/data/note.txt").await.unwrap();
	assert!(vfs.storage().stat("/data/note.txt").await.is_err());
	assert_eq!(vfs.remove_recursively(PERSISTENT_URI).await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.remove_recursively("/data/binary").await,
		   Err(FileError::TypeMismatch));
	assert_eq!(vfs.remove_recursively("/data/nope").await,
		   Err(FileError::NotFound));
	vfs.remove_recursively("/app/www").await.unwrap();
	vfs.remove_recursively("/data/docs/").await.unwrap();
	assert!(vfs.storage().stat("/data/docs").await.is_err());
	let left = vfs.read_entries(PERSISTENT_URI).await.unwrap();
	assert_eq!(left.len(), 1);
	assert_eq!(left[0].name(), "binary");
    }
    #[tokio::test]
    async fn reading() {
	let vfs = vfs();
	const CASES: &[(i64, i64, &str)] = &[
	    (0, 5, "hello"),
	    (6, i64::MAX, "world"),
	    (-5, 11, "world"),
	    (-100, 2, "he"),
	    (6, 3, ""),
	    (0, -6, "hello"),
	    (20, 30, ""),
	];
	for &(start, end, expected) in CASES {
	    assert_eq!(vfs.read_as_text("/data/note.txt", TextEncoding::Utf8,
					start, end).await.unwrap(),
		       expected, "{}..{}", start, end);
	}
	assert_eq!(vfs.read_as_text("/data/binary", TextEncoding::Utf8, 0, 2)
		   .await,
		   Err(FileError::Encoding));
	assert_eq!(vfs.read("/data/docs", 0, 2).await,
		   Err(FileError::TypeMismatch));
	assert_eq!(vfs.read("/data/nope", 0, 2).await,
		   Err(FileError::NotFound));
	assert_eq!(vfs.read("/data/note.txt/under", 0, 2).await,
		   Err(FileError::NotFound));
    }
    #[tokio::test]
    async fn other_read_forms() {
	let vfs = vfs();
	assert_eq!(vfs.read_as_binary_string("/data/binary", 0, 2).await
		   .unwrap(), "\u{FF}\u{FE}");
	assert_eq!(vfs.read_as_data_url("/data/note.txt", 0, 5).await
		   .unwrap(), "data:text/plain;base64,aGVsbG8=");
	assert_eq!(vfs.read_as_data_url("/data/binary", 0, 100).await
		   .unwrap(), "data:application/octet-stream;base64,//4=");
	assert_eq!(vfs.read_as_data_url("/app/www/index.html", 0, 0).await
		   .unwrap(), "data:text/html;base64,");
	assert_eq!(vfs.read_as_data_url("/data/docs", 0, 1).await,
		   Err(FileError::TypeMismatch));
    }
    #[tokio::test]
    async fn text_encodings() {
	let vfs = vfs();
	// "hi\u{e9}" three ways, and with byte order marks
	vfs.write("/tmp/le", 0, b"h\0i\0\xE9\0").await.unwrap();
	vfs.write("/tmp/be", 0, b"\0h\0i\0\xE9").await.unwrap();
	vfs.write("/tmp/bom-le", 0, b"\xFF\xFEh\0i\0\xE9\0").await.unwrap();
	vfs.write("/tmp/bom-be", 0, b"\xFE\xFF\0h\0i\0\xE9").await.unwrap();
	const CASES: &[(&str, TextEncoding, FileResult<&str>)] = &[
	    ("/tmp/le", TextEncoding::Utf16Le, Ok("hi\u{e9}")),
	    ("/tmp/be", TextEncoding::Utf16Be, Ok("hi\u{e9}")),
	    ("/tmp/be", TextEncoding::Utf16, Ok("hi\u{e9}")),
	    ("/tmp/bom-le", TextEncoding::Utf16, Ok("hi\u{e9}")),
	    ("/tmp/bom-be", TextEncoding::Utf16, Ok("hi\u{e9}")),
	    ("/data/note.txt", TextEncoding::Utf16Le,
	     Err(FileError::Encoding)),
	    ("/data/binary", TextEncoding::Utf8, Err(FileError::Encoding)),
	];
	for &(uri, encoding, expected) in CASES {
	    assert_eq!(vfs.read_as_text(uri, encoding, 0, 100).await
		       .as_deref().map_err(|x| *x), expected,
		       "{} as {:?}", uri, encoding);
	}
	assert_eq!(TextEncoding::from_label("UTF-16LE"),
		   Some(TextEncoding::Utf16Le));
	assert_eq!(TextEncoding::from_label("utf8"), Some(TextEncoding::Utf8));
	assert_eq!(TextEncoding::from_label("latin1"), None);
    }
    #[test] fn media_types() {
	assert!(MEDIA_TYPES.windows(2).all(|x| x[0].0 < x[1].0));
	const CASES: &[(&str, &str)] = &[
	    ("index.html", "text/html"),
	    ("PHOTO.JPG", "image/jpeg"),
	    ("archive.tar.zip", "application/zip"),
	    ("README", "application/octet-stream"),
	    (".profile", "application/octet-stream"),
	    ("what.ever", "application/octet-stream"),
	];
	for &(name, expected) in CASES {
	    assert_eq!(media_type_for(name), expected, "{:?}", name);
	}
    }
    #[tokio::test]
    async fn free_space() {
	let registry = Registry::builder().root(PERSISTENT, "/data")
	    .build().unwrap();
	let storage = MemoryStorage::from_listing(&[
	    ("/data/a", b"12345"),
	]).with_capacity(100);
	let vfs = VFS::new(Arc::new(registry), Arc::new(storage));
	assert_eq!(vfs.free_disk_space("cdvfile://localhost/persistent/a")
		   .await, Ok(Some(95)));
	assert_eq!(vfs.write("/data/b", 0, &[0; 96]).await,
		   Err(FileError::QuotaExceeded));
	assert_eq!(vfs.free_disk_space("/data").await, Ok(Some(95)));
	assert_eq!(vfs.free_disk_space("cdvfile://localhost/nope/").await,
		   Err(FileError::Encoding));
	assert_eq!(self::vfs().free_disk_space("/data").await, Ok(None));
    }
    #[tokio::test]
    async fn read_only_roots() {
	let registry = Registry::builder()
	    .root(PERSISTENT, "/data")
	    .add(RootConfig::new(APPLICATION, "/app").read_only())
	    .build().unwrap();
	let storage = MemoryStorage::from_listing(&[
	    ("/data/", b""),
	    ("/app/www/index.html", b"<html>"),
	]);
	let vfs = VFS::new(Arc::new(registry), Arc::new(storage));
	let page = "/app/www/index.html";
	assert_eq!(vfs.read_as_text(page, TextEncoding::Utf8, 0, 100).await
		   .unwrap(), "<html>");
	assert_eq!(vfs.write(page, 0, b"x").await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.write("/app/www/new", 0, b"x").await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.truncate(page, 1).await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.remove(page).await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.remove_recursively("/app/www").await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.get_file("/app/www", "other.html", Flags::CREATE).await,
		   Err(FileError::NoModificationAllowed));
	assert!(vfs.get_file("/app/www", "index.html", Flags::CREATE).await
		.unwrap().is_file());
	assert_eq!(vfs.move_to(page, "/data", None).await,
		   Err(FileError::NoModificationAllowed));
	assert_eq!(vfs.copy_to(page, "/data", None).await.unwrap().to_url(),
		   "cdvfile://localhost/persistent/index.html");
	assert_eq!(vfs.read(page, 0, 100).await.unwrap(), b"<html>");
    }
    #[tokio::test]
    async fn writing() {
	let vfs = vfs();
	assert_eq!(vfs.write("/data/new.txt", 0, b"fresh").await, Ok(5));
	assert_eq!(vfs.write("/data/new.txt", 5, b" start").await, Ok(6));
	assert_eq!(vfs.read_as_text("/data/new.txt", TextEncoding::Utf8, 0,
				    100).await.unwrap(),
		   "fresh start");
	assert_eq!(vfs.write("/data/docs", 0, b"x").await,
		   Err(FileError::InvalidModification));
	assert_eq!(vfs.write("/data/nope/x", 0, b"x").await,
		   Err(FileError::NotFound));
	assert_eq!(vfs.truncate("/data/new.txt", 100).await, Ok(11));
	assert_eq!(vfs.truncate("/data/new.txt", 5).await, Ok(5));
	assert_eq!(vfs.read_as_text("/data/new.txt", TextEncoding::Utf8, 0,
				    100).await.unwrap(),
		   "fresh");
	assert_eq!(vfs.truncate("/data/nope", 5).await,
		   Err(FileError::NotFound));
	assert_eq!(vfs.truncate("/data/note.txt/under", 5).await,
		   Err(FileError::NotFound));
	for offset in [u64::MAX, u64::MAX - 4] {
	    assert_eq!(vfs.write("/data/far", offset, b"y").await,
		       Err(FileError::QuotaExceeded), "{}", offset);
	}
	assert_eq!(vfs.get_metadata("/data/far").await,
		   Err(FileError::NotFound));
    }
    #[tokio::test]
    async fn copy_and_move() {
	let vfs = vfs();
	let copied = vfs.copy_to("/data/docs", "cdvfile://localhost/temporary/",
				 Some("docs2")).await.unwrap();
	assert_eq!(copied.to_url(), "cdvfile://localhost/temporary/docs2/");
	let moved = vfs.move_to("/data/note.txt", "/data/docs", None).await
	    .unwrap();
	assert_eq!(moved.full_path(), "/docs/note.txt");
	assert_eq!(vfs.read_as_text(&moved.to_url(), TextEncoding::Utf8, 0,
				    100).await.unwrap(),
		   "hello world");
	assert_eq!(vfs.move_to("/data/docs/note.txt", "/data/docs", None)
		   .await, Err(FileError::InvalidModification));
	assert_eq!(vfs.read_entries("/tmp/docs2").await.unwrap().len(), 3);
    }
    #[test] fn ranges() {
	assert_eq!(clamp_range(10, 0, 10), (0, 10));
	assert_eq!(clamp_range(10, -3, -1), (7, 9));
	assert_eq!(clamp_range(10, 8, 2), (8, 8));
	assert_eq!(clamp_range(10, i64::MIN, i64::MAX), (0, 10));
	assert_eq!(clamp_range(0, 5, 10), (0, 0));
    }
}

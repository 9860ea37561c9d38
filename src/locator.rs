use crate::*;

use std::{
    io, io::ErrorKind,
    sync::Arc,
};

/// What a located entry turned out to be.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum Kind {
    File,
    Directory,
    /// Nothing is there. Not an error by itself.
    Missing,
}

impl From<NodeKind> for Kind {
    fn from(x: NodeKind) -> Kind {
	match x {
	    NodeKind::File => Kind::File,
	    NodeKind::Directory => Kind::Directory,
	}
    }
}

/// The `{create, exclusive}` options of a lookup.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default)]
pub struct Flags {
    pub create: bool,
    pub exclusive: bool,
}

impl Flags {
    /// Look up only. The entry must already exist.
    pub const OPEN: Flags = Flags { create: false, exclusive: false };
    /// Create the entry if it's missing.
    pub const CREATE: Flags = Flags { create: true, exclusive: false };
    /// Create the entry, failing if anything is already there.
    pub const CREATE_NEW: Flags = Flags { create: true, exclusive: true };
}

/// One (root, path) location, and what was found there when it was last
/// located. Entries are never cached; the storage may change under them at
/// any time.
#[derive(Debug,Clone,PartialEq,Eq)]
pub struct EntryRef {
    root: Arc<FilesystemRoot>,
    path: PathBuf,
    kind: Kind,
}

impl EntryRef {
    pub fn new(root: Arc<FilesystemRoot>, path: PathBuf, kind: Kind)
	-> EntryRef {
	EntryRef { root, path, kind }
    }
    pub fn root(&self) -> &Arc<FilesystemRoot> { &self.root }
    pub fn path(&self) -> &Path { &self.path }
    pub fn kind(&self) -> Kind { self.kind }
    /// The last component of the path. Empty only for the root entry.
    pub fn name(&self) -> &str { self.path.name() }
    pub fn is_file(&self) -> bool { self.kind == Kind::File }
    pub fn is_dir(&self) -> bool { self.kind == Kind::Directory }
    pub fn exists(&self) -> bool { self.kind != Kind::Missing }
    pub fn is_root(&self) -> bool { self.path.is_root() }
    pub fn native_path(&self) -> String { self.root.native_path(&self.path) }
    /// The same location, as a resolved URI.
    pub fn resolved(&self) -> Resolved {
	Resolved::new(self.root.clone(), self.path.clone())
    }
    pub(crate) fn with_kind(self, kind: Kind) -> EntryRef {
	EntryRef { kind, ..self }
    }
    /// The path within the root, ending in `/` for directories only.
    pub fn full_path(&self) -> String {
	let mut ret = self.path.as_str().to_string();
	if self.is_dir() && !self.path.is_root() { ret.push('/') }
	ret
    }
    /// `cdvfile://localhost/<root>/<path>`
    pub fn to_url(&self) -> String {
	self.with_prefix(&self.root.named_root_prefix())
    }
    /// The path appended to the root's native URL.
    pub fn native_url(&self) -> String {
	self.with_prefix(self.root.native_url())
    }
    fn with_prefix(&self, prefix: &str) -> String {
	// prefixes always end in '/'
	let mut ret = prefix.to_string();
	if !self.path.is_root() {
	    ret.push_str(&encode_uri_path(&self.path[1..]));
	    if self.is_dir() { ret.push('/') }
	}
	ret
    }
}

/// True if the storage failed because nothing is at the path. A path that
/// runs through a file counts.
pub(crate) fn is_missing(err: &io::Error) -> bool {
    err.kind() == ErrorKind::NotFound || err.kind() == ErrorKind::NotADirectory
}

/// Asks the storage what is at `path` inside `root`.
///
/// A missing path is a normal outcome (`Kind::Missing`). So is a path that
/// runs through a file, since nothing can be there. Any other storage
/// failure is `NotReadable`, or whatever
/// [`FileError::from_native`](enum.FileError.html#method.from_native) makes
/// of it.
pub async fn locate(storage: &dyn NativeStorage, root: &Arc<FilesystemRoot>,
		    path: &Path) -> FileResult<EntryRef> {
    let native = root.native_path(path);
    let kind = match storage.stat(&native).await {
	Ok(meta) => meta.kind.into(),
	Err(x) if is_missing(&x) => Kind::Missing,
	Err(x) => return Err(FileError::from_native(x,
						    FileError::NotReadable)),
    };
    Ok(EntryRef::new(root.clone(), path.to_owned(), kind))
}

/// What a lookup should do about what it found.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Action {
    ReturnExisting,
    Create,
}

/// The create policy. `found` is what [`locate`] reported, `wanted` is what
/// the caller asked for.
pub fn decide(found: Kind, wanted: NodeKind, flags: Flags)
    -> FileResult<Action> {
    let matches = found == Kind::from(wanted);
    match (flags.create, flags.exclusive, found) {
	(false, _, Kind::Missing) => Err(FileError::NotFound),
	(false, _, _) if matches => Ok(Action::ReturnExisting),
	(false, _, _) => Err(FileError::TypeMismatch),
	(true, _, Kind::Missing) => Ok(Action::Create),
	(true, true, _) => Err(FileError::PathExists),
	(true, false, _) if matches => Ok(Action::ReturnExisting),
	(true, false, _) => Err(FileError::InvalidModification),
    }
}

/// Looks up a file or directory, creating it if `flags` say so. A created
/// entry needs its parent to exist as a directory already, and a root that
/// isn't read-only. An existing file is never truncated.
///
/// If something else creates the entry between the lookup and the create,
/// the storage's `AlreadyExists` comes back as `PathExists`.
pub async fn get_entry(storage: &dyn NativeStorage,
		       root: &Arc<FilesystemRoot>, path: &Path,
		       wanted: NodeKind, flags: Flags)
    -> FileResult<EntryRef> {
    let entry = locate(storage, root, path).await?;
    match decide(entry.kind, wanted, flags)? {
	Action::ReturnExisting => Ok(entry),
	Action::Create => {
	    if root.is_read_only() {
		return Err(FileError::NoModificationAllowed)
	    }
	    let parent = locate(storage, root, path.parent()).await?;
	    if !parent.is_dir() {
		log::debug!("can't create {}:{}, parent missing",
			    root.name(), path);
		return Err(FileError::NotFound)
	    }
	    let native = entry.native_path();
	    log::trace!("creating {:?} {:?}", wanted, native);
	    let result = match wanted {
		NodeKind::File => storage.create_file(&native).await,
		NodeKind::Directory => storage.create_directory(&native).await,
	    };
	    result.map_err(|x| FileError::from_native(x,
						      FileError::InvalidModification))?;
	    Ok(entry.with_kind(wanted.into()))
	},
    }
}

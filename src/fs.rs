use crate::*;

use std::{
    io, io::{ErrorKind, SeekFrom},
    path::Path as StdPath,
};
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use async_trait::async_trait;

/// [`NativeStorage`](trait.NativeStorage.html) on the host filesystem, via
/// `tokio::fs`. Native path strings are handed to the OS as they are.
#[derive(Debug,Clone,Copy,Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> FsStorage { FsStorage }
}

/// A symlink is a leaf, never a directory, whatever it points at. Nothing
/// that walks a tree may follow one out of its root.
fn kind_of(file_type: std::fs::FileType) -> NodeKind {
    if file_type.is_dir() && !file_type.is_symlink() { NodeKind::Directory }
    else { NodeKind::File }
}

async fn is_link(path: &str) -> bool {
    fs::symlink_metadata(path).await
	.map(|meta| meta.file_type().is_symlink()).unwrap_or(false)
}

#[cfg(unix)]
async fn make_link(target: &StdPath, link: &str) -> io::Result<()> {
    fs::symlink(target, link).await
}

#[cfg(windows)]
async fn make_link(target: &StdPath, link: &str) -> io::Result<()> {
    let points_at_dir = fs::metadata(StdPath::new(link).with_file_name(target))
	.await.map(|meta| meta.is_dir()).unwrap_or(false);
    if points_at_dir { fs::symlink_dir(target, link).await }
    else { fs::symlink_file(target, link).await }
}

#[cfg(not(any(unix, windows)))]
async fn make_link(_target: &StdPath, _link: &str) -> io::Result<()> {
    Err(io::Error::new(ErrorKind::Unsupported,
		       "can't make symlinks on this platform"))
}

/// Copies a symlink as a symlink, replacing any file at `to`.
async fn copy_link(from: &str, to: &str) -> io::Result<()> {
    let target = fs::read_link(from).await?;
    match fs::symlink_metadata(to).await {
	Ok(meta) if meta.is_dir() => {
	    return Err(io::Error::from(ErrorKind::IsADirectory))
	},
	Ok(_) => fs::remove_file(to).await?,
	Err(x) if x.kind() == ErrorKind::NotFound => (),
	Err(x) => return Err(x),
    }
    log::trace!("copying link {:?} -> {:?} (to {:?})", from, to, target);
    make_link(&target, to).await
}

#[cfg(unix)]
fn available_bytes(path: &str) -> io::Result<Option<u64>> {
    let path = std::ffi::CString::new(path)
	.map_err(|x| io::Error::new(ErrorKind::InvalidInput, x))?;
    // SAFETY: `path` is NUL-terminated and `stat` is a plain C struct that
    // statvfs fills in completely on success.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(path.as_ptr(), &mut stat) } != 0 {
	return Err(io::Error::last_os_error())
    }
    Ok(Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64)))
}

#[cfg(not(unix))]
fn available_bytes(_path: &str) -> io::Result<Option<u64>> {
    Ok(None)
}

async fn copy_leaf(from: &str, to: &str) -> io::Result<()> {
    if is_link(from).await { copy_link(from, to).await }
    else { fs::copy(from, to).await.map(|_| ()) }
}

#[async_trait]
impl NativeStorage for FsStorage {
    async fn stat(&self, path: &str) -> io::Result<Metadata> {
	let mut meta = fs::symlink_metadata(path).await?;
	if meta.file_type().is_symlink() {
	    // still a leaf, but if it leads to a file, that file's size is
	    // what reads will see
	    if let Ok(target) = fs::metadata(path).await {
		if target.is_file() { meta = target }
	    }
	}
	let kind = kind_of(meta.file_type());
	Ok(Metadata {
	    kind,
	    size: if kind == NodeKind::File { meta.len() } else { 0 },
	    modified: meta.modified().ok(),
	})
    }
    async fn create_file(&self, path: &str) -> io::Result<()> {
	OpenOptions::new().write(true).create_new(true).open(path).await?;
	Ok(())
    }
    async fn create_directory(&self, path: &str) -> io::Result<()> {
	fs::create_dir(path).await
    }
    async fn delete_file(&self, path: &str) -> io::Result<()> {
	let result = fs::remove_file(path).await;
	// Windows removes links to directories like directories
	if result.is_err() && cfg!(windows) && is_link(path).await {
	    return fs::remove_dir(path).await
	}
	result
    }
    async fn delete_directory(&self, path: &str) -> io::Result<()> {
	fs::remove_dir(path).await
    }
    async fn list_children(&self, path: &str) -> io::Result<Vec<Child>> {
	let mut children = Vec::new();
	let mut dir = fs::read_dir(path).await?;
	while let Some(entry) = dir.next_entry().await? {
	    let name = match entry.file_name().to_str() {
		Some(x) => x.to_string(),
		None => {
		    log::debug!("skipping non-UTF-8 name under {:?}", path);
		    continue
		},
	    };
	    // doesn't follow symlinks
	    let kind = match entry.file_type().await {
		Ok(file_type) => kind_of(file_type),
		Err(x) if x.kind() == ErrorKind::NotFound => continue,
		Err(x) => return Err(x),
	    };
	    children.push(Child { name, kind });
	}
	Ok(children)
    }
    async fn move_file(&self, from: &str, to: &str) -> io::Result<()> {
	match fs::rename(from, to).await {
	    Ok(()) => Ok(()),
	    Err(x) => {
		// Possibly a move across devices. Do it the hard way.
		log::trace!("rename {:?} -> {:?} failed ({}), copying",
			    from, to, x);
		let to_is_dir = fs::symlink_metadata(to).await
		    .map(|meta| meta.is_dir()).unwrap_or(false);
		if to_is_dir { return Err(x) }
		copy_leaf(from, to).await?;
		fs::remove_file(from).await
	    },
	}
    }
    async fn copy_file(&self, from: &str, to: &str) -> io::Result<()> {
	copy_leaf(from, to).await
    }
    async fn read_bytes(&self, path: &str, start: u64, end: u64)
	-> io::Result<Vec<u8>> {
	let mut file = fs::File::open(path).await?;
	let len = file.metadata().await?.len();
	let end = end.min(len);
	let start = start.min(end);
	file.seek(SeekFrom::Start(start)).await?;
	let mut buf = Vec::new();
	file.take(end - start).read_to_end(&mut buf).await?;
	Ok(buf)
    }
    async fn write_bytes(&self, path: &str, offset: u64, data: &[u8])
	-> io::Result<u64> {
	if offset.checked_add(data.len() as u64).is_none() {
	    return Err(io::Error::new(ErrorKind::FileTooLarge,
				      "write would end past the largest \
				       possible offset"))
	}
	let mut file = OpenOptions::new().write(true).create(true)
	    .open(path).await?;
	file.seek(SeekFrom::Start(offset)).await?;
	file.write_all(data).await?;
	file.flush().await?;
	Ok(data.len() as u64)
    }
    async fn truncate(&self, path: &str, size: u64) -> io::Result<()> {
	let file = OpenOptions::new().write(true).open(path).await?;
	file.set_len(size).await
    }
    async fn free_space(&self, path: &str) -> io::Result<Option<u64>> {
	available_bytes(path)
    }
}

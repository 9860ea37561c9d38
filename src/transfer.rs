use crate::*;

use std::collections::VecDeque;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum TransferMode {
    Copy,
    Move,
}

/// Appends one name to a native directory path.
pub(crate) fn native_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') { format!("{}{}", dir, name) }
    else { format!("{}/{}", dir, name) }
}

/// Returns true if `inner` is `outer`, or lies somewhere below it.
fn native_contains(outer: &str, inner: &str) -> bool {
    if outer == inner { return true }
    match inner.strip_prefix(outer) {
	Some(rest) => outer.ends_with('/') || rest.starts_with('/'),
	None => false,
    }
}

async fn transfer_file(storage: &dyn NativeStorage, mode: TransferMode,
		       from: &str, to: &str) -> FileResult<()> {
    log::trace!("{:?} file {:?} -> {:?}", mode, from, to);
    let result = match mode {
	TransferMode::Copy => storage.copy_file(from, to).await,
	TransferMode::Move => storage.move_file(from, to).await,
    };
    result.map_err(|x| FileError::from_native(x,
					      FileError::InvalidModification))
}

/// Copies or moves the tree at `from` to a new directory `to`, which must not
/// exist yet.
///
/// Directories are visited breadth first. Each one is created at the
/// destination, then all its files are transferred, and only then are its
/// subdirectories queued. In a move, the emptied source directories are
/// deleted, deepest first, once everything else has succeeded. A failure
/// leaves whatever was already transferred where it is.
async fn transfer_tree(storage: &dyn NativeStorage, mode: TransferMode,
		       from: &str, to: &str) -> FileResult<()> {
    let mut queue = VecDeque::new();
    let mut visited = Vec::new();
    queue.push_back((from.to_string(), to.to_string()));
    while let Some((from, to)) = queue.pop_front() {
	log::trace!("{:?} directory {:?} -> {:?}", mode, from, to);
	storage.create_directory(&to).await
	    .map_err(|x| FileError::from_native(x,
						FileError::InvalidModification))?;
	let mut children = storage.list_children(&from).await
	    .map_err(|x| FileError::from_native(x, FileError::NotReadable))?;
	children.sort();
	let mut subdirs = Vec::new();
	for child in children {
	    let child_from = native_join(&from, &child.name);
	    let child_to = native_join(&to, &child.name);
	    match child.kind {
		NodeKind::File => transfer_file(storage, mode, &child_from,
						&child_to).await?,
		NodeKind::Directory => subdirs.push((child_from, child_to)),
	    }
	}
	queue.extend(subdirs);
	visited.push(from);
    }
    if mode == TransferMode::Move {
	for dir in visited.iter().rev() {
	    log::trace!("removing emptied directory {:?}", dir);
	    storage.delete_directory(dir).await
		.map_err(|x| FileError::from_native(x,
						    FileError::InvalidModification))?;
	}
    }
    Ok(())
}

/// Copies or moves `source` into the directory `dest_parent`, as `name`
/// (`None` or `""` to keep the source's name).
///
/// Every policy check happens before the storage is modified:
///
/// - the new name must be a valid segment name, and not `.` or `..`
///   (`Encoding`)
/// - the source must exist (`NotFound`)
/// - a root can't be moved (`NoModificationAllowed`), and can't be copied
///   without a new name (`InvalidModification`)
/// - nothing can be moved out of, or put into, a read-only root
///   (`NoModificationAllowed`)
/// - the source can't be transferred onto itself, or a directory into
///   itself (`InvalidModification`)
/// - the destination parent must be an existing directory (`NotFound`)
/// - an existing target must be of the same kind as the source, and if it's
///   a directory it must be empty (`InvalidModification`)
///
/// An existing target file is replaced. An existing, empty target directory
/// is deleted first. The returned entry describes the new location.
///
/// None of this is atomic. If a directory transfer fails partway through,
/// nothing is rolled back, and the whole call reports the failure.
pub async fn transfer(storage: &dyn NativeStorage, mode: TransferMode,
		      source: &Resolved, dest_parent: &Resolved,
		      name: Option<&str>) -> FileResult<EntryRef> {
    let name = name.filter(|x| !x.is_empty());
    if let Some(name) = name {
	if !is_valid_segment_name(name) {
	    log::debug!("{:?} is not a valid name", name);
	    return Err(FileError::Encoding)
	}
    }
    let source = locate(storage, &source.root, &source.path).await?;
    if !source.exists() { return Err(FileError::NotFound) }
    if mode == TransferMode::Move
	&& (source.is_root() || source.root().is_read_only()) {
	return Err(FileError::NoModificationAllowed)
    }
    if dest_parent.root.is_read_only() {
	return Err(FileError::NoModificationAllowed)
    }
    let name = match name {
	Some(x) => x,
	None if source.is_root() => return Err(FileError::InvalidModification),
	None => source.name(),
    };
    let mut target_path = dest_parent.path.clone();
    if let Err(x) = target_path.push(name) {
	log::debug!("{:?} is not a valid name ({})", name, x);
	return Err(FileError::Encoding)
    }
    let target = Resolved::new(dest_parent.root.clone(), target_path);
    let source_native = source.native_path();
    let parent_native = dest_parent.native_path();
    let target_native = target.native_path();
    if source_native == parent_native || source_native == target_native
	|| (source.is_dir()
	    && native_contains(&source_native, &parent_native)) {
	log::debug!("refusing to {:?} {:?} into {:?}", mode, source_native,
		    parent_native);
	return Err(FileError::InvalidModification)
    }
    let parent = locate(storage, &dest_parent.root, &dest_parent.path).await?;
    if !parent.is_dir() { return Err(FileError::NotFound) }
    let existing = locate(storage, &target.root, &target.path).await?;
    match (source.kind(), existing.kind()) {
	(_, Kind::Missing) => (),
	(Kind::File, Kind::File) => (),
	(Kind::Directory, Kind::Directory) => {
	    let children = storage.list_children(&target_native).await
		.map_err(|x| FileError::from_native(x,
						    FileError::NotReadable))?;
	    if !children.is_empty() {
		return Err(FileError::InvalidModification)
	    }
	    storage.delete_directory(&target_native).await
		.map_err(|x| FileError::from_native(x,
						    FileError::InvalidModification))?;
	},
	_ => return Err(FileError::InvalidModification),
    }
    let result = if source.is_dir() {
	transfer_tree(storage, mode, &source_native, &target_native).await
    }
    else {
	transfer_file(storage, mode, &source_native, &target_native).await
    };
    if let Err(x) = result {
	log::warn!("{:?} of {:?} to {:?} failed partway ({}), leaving what \
		    was already done", mode, source_native, target_native, x);
	return Err(x)
    }
    Ok(EntryRef::new(target.root, target.path, source.kind()))
}

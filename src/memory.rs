use crate::*;

use std::{
    fmt,
    io, io::ErrorKind,
    time::SystemTime,
};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Clone)]
enum Node {
    File { data: Vec<u8>, modified: SystemTime },
    Dir { children: Vec<(String, Node)>, modified: SystemTime },
}

impl fmt::Debug for Node {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
	match self {
	    Node::File { data, .. } => write!(fmt, "Node::File({} bytes)",
					      data.len()),
	    Node::Dir { children, .. } => write!(fmt, "Node::Dir({} entries)",
						 children.len()),
	}
    }
}

impl Node {
    fn new_file(data: Vec<u8>) -> Node {
	Node::File { data, modified: SystemTime::now() }
    }
    fn new_dir() -> Node {
	Node::Dir { children: vec![], modified: SystemTime::now() }
    }
    fn kind(&self) -> NodeKind {
	match self {
	    Node::File { .. } => NodeKind::File,
	    Node::Dir { .. } => NodeKind::Directory,
	}
    }
}

/// No single file may grow past this, whatever the capacity.
pub const MAX_FILE_SIZE: u64 = u32::MAX as u64;

/// Total bytes of file data at and under `node`.
fn used(node: &Node) -> u64 {
    match node {
	Node::File { data, .. } => data.len() as u64,
	Node::Dir { children, .. } => children.iter()
	    .map(|(_, x)| used(x)).sum(),
    }
}

fn file_len(root: &Node, components: &[&str]) -> u64 {
    match resolve(root, components) {
	Some(Node::File { data, .. }) => data.len() as u64,
	_ => 0,
    }
}

fn find(children: &[(String, Node)], name: &str) -> Result<usize, usize> {
    children.binary_search_by(|(x, _)| x.as_str().cmp(name))
}

fn split(path: &str) -> io::Result<Vec<&str>> {
    if !path.starts_with('/') {
	let err = format!("not an absolute native path: {:?}", path);
	return Err(io::Error::new(ErrorKind::InvalidInput, err))
    }
    Ok(path.split('/').filter(|x| !x.is_empty()).collect())
}

fn resolve<'a>(mut node: &'a Node, components: &[&str]) -> Option<&'a Node> {
    for component in components {
	node = match node {
	    Node::File { .. } => return None,
	    Node::Dir { children, .. } => &children[find(children, component)
						    .ok()?].1,
	};
    }
    Some(node)
}

fn resolve_mut<'a>(mut node: &'a mut Node, components: &[&str])
    -> Option<&'a mut Node> {
    for component in components {
	node = match node {
	    Node::File { .. } => return None,
	    Node::Dir { children, .. } => {
		let i = find(children, component).ok()?;
		&mut children[i].1
	    },
	};
    }
    Some(node)
}

/// Returns the child list of the directory that would contain the last
/// component, plus that last component.
fn parent_of<'a, 'b>(root: &'a mut Node, components: &[&'b str])
    -> io::Result<(&'a mut Vec<(String, Node)>, &'b str)> {
    let (name, parent) = match components.split_last() {
	Some(x) => x,
	None => return Err(io::Error::new(ErrorKind::PermissionDenied,
					  "the storage root is fixed")),
    };
    match resolve_mut(root, parent) {
	Some(Node::Dir { children, modified }) => {
	    *modified = SystemTime::now();
	    Ok((children, *name))
	},
	Some(Node::File { .. })
	    => Err(io::Error::from(ErrorKind::NotADirectory)),
	None => Err(io::Error::from(ErrorKind::NotFound)),
    }
}

/// A [`NativeStorage`](trait.NativeStorage.html) kept entirely in memory.
///
/// Paths are `/`-separated and must be absolute. Useful as a fake host in
/// tests, or for embedders that want scratch roots without touching disk.
///
/// Unless given a capacity, it holds as much as it's given, up to
/// [`MAX_FILE_SIZE`] per file.
pub struct MemoryStorage {
    root: RwLock<Node>,
    capacity: Option<u64>,
}

impl MemoryStorage {
    /// An empty storage: just `/`.
    pub fn new() -> MemoryStorage {
	MemoryStorage { root: RwLock::new(Node::new_dir()), capacity: None }
    }
    /// Limits the total size of all files. Anything that would go over fails
    /// with `StorageFull`.
    pub fn with_capacity(mut self, bytes: u64) -> MemoryStorage {
	self.capacity = Some(bytes);
	self
    }
    fn make_room(&self, root: &Node, growth: u64) -> io::Result<()> {
	match self.capacity {
	    Some(capacity) if used(root).saturating_add(growth) > capacity
		=> Err(io::Error::from(ErrorKind::StorageFull)),
	    _ => Ok(()),
	}
    }
    /// Builds a storage from a listing of native paths. Paths ending in `/`
    /// are directories; everything else is a file with the given contents.
    /// Missing intermediate directories are created.
    pub fn from_listing(listing: &[(&str, &[u8])]) -> MemoryStorage {
	let mut root = Node::new_dir();
	for &(path, data) in listing {
	    let is_dir = path.ends_with('/');
	    if is_dir && !data.is_empty() {
		panic!("BUG IN YOUR PROGRAM: \
			MemoryStorage listing contained a directory with \
			data! {:?}", path)
	    }
	    let components = match split(path) {
		Ok(x) if !x.is_empty() => x,
		_ => panic!("BUG IN YOUR PROGRAM: \
			     MemoryStorage listing contained a relative path \
			     or an explicit root! {:?}", path),
	    };
	    let mut this_node = &mut root;
	    let (last, parents) = components.split_last().unwrap();
	    for component in parents {
		this_node = match this_node {
		    Node::File { .. } =>
			panic!("BUG IN YOUR PROGRAM: \
				MemoryStorage listing contained a file that \
				was \"under\" another file! {:?}", path),
		    Node::Dir { children, .. } => {
			let i = match find(children, component) {
			    Ok(i) => i,
			    Err(i) => {
				children.insert(i, (component.to_string(),
						    Node::new_dir()));
				i
			    },
			};
			&mut children[i].1
		    },
		};
	    }
	    match this_node {
		Node::File { .. } =>
		    panic!("BUG IN YOUR PROGRAM: \
			    MemoryStorage listing contained a file that was \
			    \"under\" another file! {:?}", path),
		Node::Dir { children, .. } => match find(children, last) {
		    Ok(i) if is_dir && children[i].1.kind()
			== NodeKind::Directory => (),
		    Ok(_) => panic!("BUG IN YOUR PROGRAM: \
				     MemoryStorage listing contained a \
				     duplicate! {:?}", path),
		    Err(i) => {
			let node = if is_dir { Node::new_dir() }
			else { Node::new_file(data.to_vec()) };
			children.insert(i, (last.to_string(), node));
		    },
		},
	    }
	}
	MemoryStorage { root: RwLock::new(root), capacity: None }
    }
    async fn create(&self, path: &str, node: Node) -> io::Result<()> {
	let components = split(path)?;
	let mut root = self.root.write().await;
	let (children, name) = parent_of(&mut root, &components)?;
	match find(children, name) {
	    Ok(_) => Err(io::Error::from(ErrorKind::AlreadyExists)),
	    Err(i) => {
		children.insert(i, (name.to_string(), node));
		Ok(())
	    },
	}
    }
    async fn transfer(&self, from: &str, to: &str, keep_source: bool)
	-> io::Result<()> {
	let from = split(from)?;
	let to = split(to)?;
	let mut root = self.root.write().await;
	match resolve(&root, &from) {
	    Some(Node::File { .. }) => (),
	    Some(Node::Dir { .. })
		=> return Err(io::Error::from(ErrorKind::IsADirectory)),
	    None => return Err(io::Error::from(ErrorKind::NotFound)),
	}
	let (to_children, to_name) = parent_of(&mut root, &to)?;
	if let Ok(i) = find(to_children, to_name) {
	    if to_children[i].1.kind() == NodeKind::Directory {
		return Err(io::Error::from(ErrorKind::IsADirectory))
	    }
	}
	let node = if keep_source {
	    let growth = file_len(&root, &from)
		.saturating_sub(file_len(&root, &to));
	    self.make_room(&root, growth)?;
	    match resolve(&root, &from) {
		Some(Node::File { data, .. }) => Node::new_file(data.clone()),
		_ => return Err(io::Error::from(ErrorKind::NotFound)),
	    }
	}
	else {
	    let (from_children, from_name) = parent_of(&mut root, &from)?;
	    match find(from_children, from_name) {
		Ok(i) => from_children.remove(i).1,
		Err(_) => return Err(io::Error::from(ErrorKind::NotFound)),
	    }
	};
	let (to_children, to_name) = parent_of(&mut root, &to)?;
	match find(to_children, to_name) {
	    Ok(i) => to_children[i].1 = node,
	    Err(i) => to_children.insert(i, (to_name.to_string(), node)),
	}
	Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> MemoryStorage { MemoryStorage::new() }
}

#[async_trait]
impl NativeStorage for MemoryStorage {
    async fn stat(&self, path: &str) -> io::Result<Metadata> {
	let components = split(path)?;
	let root = self.root.read().await;
	match resolve(&root, &components) {
	    Some(Node::File { data, modified }) => Ok(Metadata {
		kind: NodeKind::File,
		size: data.len() as u64,
		modified: Some(*modified),
	    }),
	    Some(Node::Dir { modified, .. }) => Ok(Metadata {
		kind: NodeKind::Directory,
		size: 0,
		modified: Some(*modified),
	    }),
	    None => Err(io::Error::from(ErrorKind::NotFound)),
	}
    }
    async fn create_file(&self, path: &str) -> io::Result<()> {
	self.create(path, Node::new_file(vec![])).await
    }
    async fn create_directory(&self, path: &str) -> io::Result<()> {
	self.create(path, Node::new_dir()).await
    }
    async fn delete_file(&self, path: &str) -> io::Result<()> {
	let components = split(path)?;
	let mut root = self.root.write().await;
	let (children, name) = parent_of(&mut root, &components)?;
	match find(children, name) {
	    Ok(i) if children[i].1.kind() == NodeKind::File => {
		children.remove(i);
		Ok(())
	    },
	    Ok(_) => Err(io::Error::from(ErrorKind::IsADirectory)),
	    Err(_) => Err(io::Error::from(ErrorKind::NotFound)),
	}
    }
    async fn delete_directory(&self, path: &str) -> io::Result<()> {
	let components = split(path)?;
	let mut root = self.root.write().await;
	let (children, name) = parent_of(&mut root, &components)?;
	let i = match find(children, name) {
	    Ok(i) => i,
	    Err(_) => return Err(io::Error::from(ErrorKind::NotFound)),
	};
	match &children[i].1 {
	    Node::File { .. }
		=> Err(io::Error::from(ErrorKind::NotADirectory)),
	    Node::Dir { children: grandchildren, .. }
		if !grandchildren.is_empty()
		=> Err(io::Error::from(ErrorKind::DirectoryNotEmpty)),
	    Node::Dir { .. } => {
		children.remove(i);
		Ok(())
	    },
	}
    }
    async fn list_children(&self, path: &str) -> io::Result<Vec<Child>> {
	let components = split(path)?;
	let root = self.root.read().await;
	match resolve(&root, &components) {
	    Some(Node::Dir { children, .. }) => Ok(children.iter()
		.map(|(name, node)| Child {
		    name: name.clone(),
		    kind: node.kind(),
		}).collect()),
	    Some(Node::File { .. })
		=> Err(io::Error::from(ErrorKind::NotADirectory)),
	    None => Err(io::Error::from(ErrorKind::NotFound)),
	}
    }
    async fn move_file(&self, from: &str, to: &str) -> io::Result<()> {
	self.transfer(from, to, false).await
    }
    async fn copy_file(&self, from: &str, to: &str) -> io::Result<()> {
	self.transfer(from, to, true).await
    }
    async fn read_bytes(&self, path: &str, start: u64, end: u64)
	-> io::Result<Vec<u8>> {
	let components = split(path)?;
	let root = self.root.read().await;
	match resolve(&root, &components) {
	    Some(Node::File { data, .. }) => {
		let end = (end.min(data.len() as u64)) as usize;
		let start = (start as usize).min(end);
		Ok(data[start..end].to_vec())
	    },
	    Some(Node::Dir { .. })
		=> Err(io::Error::from(ErrorKind::IsADirectory)),
	    None => Err(io::Error::from(ErrorKind::NotFound)),
	}
    }
    async fn write_bytes(&self, path: &str, offset: u64, data: &[u8])
	-> io::Result<u64> {
	let components = split(path)?;
	let end = match offset.checked_add(data.len() as u64) {
	    Some(x) if x <= MAX_FILE_SIZE => x,
	    _ => return Err(io::Error::from(ErrorKind::FileTooLarge)),
	};
	let mut root = self.root.write().await;
	let growth = end.saturating_sub(file_len(&root, &components));
	self.make_room(&root, growth)?;
	let (children, name) = parent_of(&mut root, &components)?;
	let i = match find(children, name) {
	    Ok(i) => i,
	    Err(i) => {
		children.insert(i, (name.to_string(),
				    Node::new_file(vec![])));
		i
	    },
	};
	match &mut children[i].1 {
	    Node::File { data: contents, modified } => {
		// both fit in a usize, they're under MAX_FILE_SIZE
		let (offset, end) = (offset as usize, end as usize);
		if contents.len() < end { contents.resize(end, 0) }
		contents[offset..end].copy_from_slice(data);
		*modified = SystemTime::now();
		Ok(data.len() as u64)
	    },
	    Node::Dir { .. } => Err(io::Error::from(ErrorKind::IsADirectory)),
	}
    }
    async fn truncate(&self, path: &str, size: u64) -> io::Result<()> {
	let components = split(path)?;
	if size > MAX_FILE_SIZE {
	    return Err(io::Error::from(ErrorKind::FileTooLarge))
	}
	let mut root = self.root.write().await;
	let growth = size.saturating_sub(file_len(&root, &components));
	self.make_room(&root, growth)?;
	match resolve_mut(&mut root, &components) {
	    Some(Node::File { data, modified }) => {
		data.resize(size as usize, 0);
		*modified = SystemTime::now();
		Ok(())
	    },
	    Some(Node::Dir { .. })
		=> Err(io::Error::from(ErrorKind::IsADirectory)),
	    None => Err(io::Error::from(ErrorKind::NotFound)),
	}
    }
    async fn free_space(&self, _path: &str) -> io::Result<Option<u64>> {
	let root = self.root.read().await;
	Ok(self.capacity.map(|x| x.saturating_sub(used(&root))))
    }
}

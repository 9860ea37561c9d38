use crate::*;

use std::{
    collections::HashMap,
    sync::Arc,
};
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "stdpaths")]
mod stdpaths;

pub const PERSISTENT: &str = "persistent";
pub const TEMPORARY: &str = "temporary";
pub const APPLICATION: &str = "application";
pub const ROOT: &str = "root";
/// Only registered on hosts that have a per-user cache directory.
pub const CACHE: &str = "cache";

/// Scheme and authority of named-root URIs,
/// `cdvfile://localhost/<root>/<path>`.
pub const NAMED_ROOT_URI_PREFIX: &str = "cdvfile://localhost/";

static DRIVE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[A-Za-z]:(?:/|$)"#)
	.unwrap()
});

/// One named filesystem, bound to a native base directory.
///
/// Roots are created when their [`Registry`] is built and never change
/// afterward. Entries hold them by `Arc`.
#[derive(Debug,PartialEq,Eq)]
pub struct FilesystemRoot {
    name: String,
    native_base: String,
    native_url: String,
    uri_prefixes: Vec<String>,
    read_only: bool,
}

impl FilesystemRoot {
    pub fn name(&self) -> &str { &self.name }
    /// The native base directory, with `/` separators and no trailing
    /// separator. Empty for a root at the top of the host hierarchy.
    pub fn native_base(&self) -> &str { &self.native_base }
    /// The URL native entries of this root are reported under. Always ends
    /// with `/`.
    pub fn native_url(&self) -> &str { &self.native_url }
    /// Every URI prefix this root answers to, its native URL first and its
    /// named-root prefix second.
    pub fn uri_prefixes(&self) -> &[String] { &self.uri_prefixes }
    /// Nothing in a read-only root may be created, written, truncated,
    /// removed, or moved out.
    pub fn is_read_only(&self) -> bool { self.read_only }
    /// `cdvfile://localhost/<name>/`
    pub fn named_root_prefix(&self) -> String {
	format!("{}{}/", NAMED_ROOT_URI_PREFIX, self.name)
    }
    /// The native path of `path` within this root.
    pub fn native_path(&self, path: &Path) -> String {
	if !path.is_root() {
	    format!("{}{}", self.native_base, path)
	}
	else if self.native_base.is_empty() {
	    "/".to_string()
	}
	else {
	    self.native_base.clone()
	}
    }
    /// If `native` lies inside this root's base directory, returns the part
    /// after the base (unsanitized, `/` for the base itself).
    pub fn path_for_native<'a>(&self, native: &'a str) -> Option<&'a str> {
	if self.native_base.is_empty() {
	    if native.starts_with('/') || DRIVE_PATTERN.is_match(native) {
		return Some(native)
	    }
	    return None
	}
	match native.strip_prefix(self.native_base.as_str()) {
	    Some("") => Some("/"),
	    Some(rest) if rest.starts_with('/') => Some(rest),
	    _ => None,
	}
    }
}

/// Everything needed to register one root.
#[derive(Debug,Clone,PartialEq,Eq)]
pub struct RootConfig {
    name: String,
    base: String,
    native_url: Option<String>,
    prefixes: Vec<String>,
    read_only: bool,
}

impl RootConfig {
    pub fn new(name: &str, base: &str) -> RootConfig {
	RootConfig {
	    name: name.to_string(),
	    base: base.to_string(),
	    native_url: None,
	    prefixes: vec![],
	    read_only: false,
	}
    }
    /// Overrides the native URL, which defaults to `file://` followed by the
    /// base directory.
    pub fn native_url(mut self, url: &str) -> RootConfig {
	self.native_url = Some(url.to_string());
	self
    }
    /// Adds another URI prefix this root should be recognized by.
    pub fn prefix(mut self, prefix: &str) -> RootConfig {
	self.prefixes.push(prefix.to_string());
	self
    }
    /// Marks the root read-only, like an application bundle.
    pub fn read_only(mut self) -> RootConfig {
	self.read_only = true;
	self
    }
}

fn normalize_base(base: &str) -> Result<String, RegistryError> {
    let base = base.replace('\\', "/");
    if !base.is_empty() && !base.starts_with('/')
	&& !DRIVE_PATTERN.is_match(&base) {
	return Err(RegistryError::NotAbsolute(base))
    }
    let mut collapsed = String::with_capacity(base.len());
    for c in base.chars() {
	if c == '/' && collapsed.ends_with('/') { continue }
	collapsed.push(c);
    }
    while collapsed.ends_with('/') { collapsed.pop(); }
    Ok(collapsed)
}

fn default_native_url(base: &str) -> String {
    let mut ret = String::from("file://");
    if !base.is_empty() && !base.starts_with('/') { ret.push('/') }
    // a drive letter's colon stays literal
    match base.split_once('/') {
	Some((drive, rest)) if DRIVE_PATTERN.is_match(base) => {
	    ret.push_str(drive);
	    ret.push('/');
	    ret.push_str(&encode_uri_path(rest));
	},
	_ if DRIVE_PATTERN.is_match(base) => ret.push_str(base),
	_ => ret.push_str(&encode_uri_path(base)),
    }
    ret.push('/');
    ret
}

#[derive(Debug,Default)]
pub struct RegistryBuilder {
    roots: Vec<RootConfig>,
}

impl RegistryBuilder {
    pub fn new() -> RegistryBuilder { RegistryBuilder::default() }
    /// Registers a root with the default native URL.
    pub fn root(self, name: &str, base: &str) -> RegistryBuilder {
	self.add(RootConfig::new(name, base))
    }
    pub fn add(mut self, config: RootConfig) -> RegistryBuilder {
	self.roots.push(config);
	self
    }
    pub fn build(self) -> Result<Registry, RegistryError> {
	let mut roots: Vec<Arc<FilesystemRoot>> = Vec::new();
	let mut owners: HashMap<String, String> = HashMap::new();
	for config in self.roots {
	    if !is_valid_segment_name(&config.name) {
		return Err(RegistryError::InvalidName(config.name))
	    }
	    if roots.iter().any(|x| x.name == config.name) {
		return Err(RegistryError::DuplicateName(config.name))
	    }
	    let native_base = normalize_base(&config.base)?;
	    let mut native_url = config.native_url
		.unwrap_or_else(|| default_native_url(&native_base));
	    if !native_url.ends_with('/') { native_url.push('/') }
	    let mut uri_prefixes = vec![
		native_url.clone(),
		format!("{}{}/", NAMED_ROOT_URI_PREFIX, config.name),
	    ];
	    for prefix in config.prefixes {
		if !uri_prefixes.contains(&prefix) {
		    uri_prefixes.push(prefix);
		}
	    }
	    for prefix in uri_prefixes.iter() {
		if let Some(owner) = owners.get(prefix) {
		    return Err(RegistryError::DuplicatePrefix {
			prefix: prefix.clone(),
			root: config.name,
			owner: owner.clone(),
		    })
		}
	    }
	    for prefix in uri_prefixes.iter() {
		owners.insert(prefix.clone(), config.name.clone());
	    }
	    roots.push(Arc::new(FilesystemRoot {
		name: config.name,
		native_base,
		native_url,
		uri_prefixes,
		read_only: config.read_only,
	    }));
	}
	Ok(Registry { roots })
    }
}

/// The set of named roots for one process.
///
/// Build one at startup and hand it (usually inside an `Arc`) to whatever
/// resolves URIs. Tests build their own, with fake native bases.
#[derive(Debug)]
pub struct Registry {
    roots: Vec<Arc<FilesystemRoot>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder { RegistryBuilder::new() }
    /// The standard roots for this host (`persistent`, `temporary`,
    /// `application`, `root`, and `cache` where the host has one).
    #[cfg(feature = "stdpaths")]
    pub fn with_standard_roots(app_name: &str)
	-> Result<Registry, RegistryError> {
	stdpaths::standard_roots(app_name).build()
    }
    pub fn get_root(&self, name: &str) -> FileResult<&Arc<FilesystemRoot>> {
	self.roots.iter().find(|x| x.name == name)
	    .ok_or(FileError::NotFound)
    }
    /// All roots, in registration order.
    pub fn all_roots(&self) -> &[Arc<FilesystemRoot>] { &self.roots }
    /// Finds the root whose native base contains `native`. The longest base
    /// wins. Returns the root and the native remainder.
    pub fn root_for_native_path<'a>(&self, native: &'a str)
	-> Option<(&Arc<FilesystemRoot>, &'a str)> {
	let mut best: Option<(&Arc<FilesystemRoot>, &'a str)> = None;
	for root in self.roots.iter() {
	    if let Some(rest) = root.path_for_native(native) {
		match best {
		    Some((x, _)) if x.native_base.len()
			>= root.native_base.len() => (),
		    _ => best = Some((root, rest)),
		}
	    }
	}
	best
    }
    /// Finds the root owning the longest of its URI prefixes that `uri`
    /// starts with. Returns the root and the rest of the URI, which always
    /// begins with `/`.
    pub fn root_for_uri_prefix<'a>(&self, uri: &'a str)
	-> Option<(&Arc<FilesystemRoot>, &'a str)> {
	let mut best: Option<(&Arc<FilesystemRoot>, usize)> = None;
	for root in self.roots.iter() {
	    for prefix in root.uri_prefixes.iter() {
		let bare = prefix.strip_suffix('/').unwrap_or(prefix);
		let hit = match uri.strip_prefix(bare) {
		    Some(rest) => rest.is_empty() || rest.starts_with('/'),
		    None => false,
		};
		if !hit { continue }
		match best {
		    Some((_, len)) if len >= bare.len() => (),
		    _ => best = Some((root, bare.len())),
		}
	    }
	}
	best.map(|(root, len)| {
	    let rest = &uri[len..];
	    (root, if rest.is_empty() { "/" } else { rest })
	})
    }
}

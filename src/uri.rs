use crate::*;

use std::{
    fmt::{Debug, Formatter},
    sync::Arc,
};
use once_cell::sync::Lazy;
use regex::Regex;

static DRIVE_AFTER_SLASHES_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/+([A-Za-z]:)"#)
	.unwrap()
});

/// Percent-encodes each component of a path, so it can be appended to a URI
/// prefix. Separators are kept.
pub fn encode_uri_path(path: &str) -> String {
    let mut ret = String::with_capacity(path.len());
    for (i, component) in path.split('/').enumerate() {
	if i > 0 { ret.push('/') }
	ret.push_str(&urlencoding::encode(component));
    }
    ret
}

/// A URI, resolved down to the root it belongs to and the sanitized path
/// inside that root.
#[derive(Debug,Clone,PartialEq,Eq)]
pub struct Resolved {
    pub root: Arc<FilesystemRoot>,
    pub path: PathBuf,
}

impl Resolved {
    pub fn new(root: Arc<FilesystemRoot>, path: PathBuf) -> Resolved {
	Resolved { root, path }
    }
    pub fn native_path(&self) -> String {
	self.root.native_path(&self.path)
    }
}

/// Recognizes one form of URI.
///
/// A matcher receives the URI after the query has been stripped and
/// percent-decoding has been applied. If the URI is of its form, it returns
/// the root and the raw (unsanitized) path within that root. The
/// [`Resolver`] takes care of sanitizing and validating that path.
pub trait SchemeMatcher : Send + Sync {
    fn match_uri(&self, registry: &Registry, uri: &str)
	-> Option<(Arc<FilesystemRoot>, String)>;
}

fn match_native(registry: &Registry, native: &str)
    -> Option<(Arc<FilesystemRoot>, String)> {
    if !is_valid_path(native) { return None }
    registry.root_for_native_path(native)
	.map(|(root, rest)| (root.clone(), rest.to_string()))
}

/// `file:/path`, `file:///path`, and `file://localhost/path`. The remaining
/// native path is matched against each root's native base.
#[derive(Debug,Default)]
pub struct FileScheme;

impl SchemeMatcher for FileScheme {
    fn match_uri(&self, registry: &Registry, uri: &str)
	-> Option<(Arc<FilesystemRoot>, String)> {
	let rest = uri.strip_prefix("file:")?;
	let native = if rest.starts_with("//localhost/") {
	    &rest["//localhost".len()..]
	}
	else if let Some(x) = rest.strip_prefix("//") {
	    // an empty authority, or somebody else's host
	    if !x.starts_with('/') { return None }
	    x
	}
	else if rest.starts_with('/') { rest }
	else { return None };
	let native = DRIVE_AFTER_SLASHES_PATTERN.replace(native, "$1");
	match_native(registry, &native)
    }
}

/// `cdvfile://localhost/<root>/<path>`, and `cdvfile://localhost/<root>`
/// for the root itself.
#[derive(Debug,Default)]
pub struct NamedRoot;

impl SchemeMatcher for NamedRoot {
    fn match_uri(&self, registry: &Registry, uri: &str)
	-> Option<(Arc<FilesystemRoot>, String)> {
	let rest = uri.strip_prefix(NAMED_ROOT_URI_PREFIX)?;
	let (name, path) = match rest.find('/') {
	    Some(i) => (&rest[..i], &rest[i..]),
	    None => (rest, "/"),
	};
	registry.get_root(name).ok()
	    .map(|root| (root.clone(), path.to_string()))
    }
}

/// Any other URI prefix a root was registered with, longest first. A prefix
/// of the form `scheme:///` also accepts `scheme://localhost/`.
#[derive(Debug,Default)]
pub struct RootPrefix;

impl SchemeMatcher for RootPrefix {
    fn match_uri(&self, registry: &Registry, uri: &str)
	-> Option<(Arc<FilesystemRoot>, String)> {
	if let Some((root, rest)) = registry.root_for_uri_prefix(uri) {
	    return Some((root.clone(), rest.to_string()))
	}
	let i = uri.find("://localhost/")?;
	let rewritten = format!("{}://{}", &uri[..i],
				&uri[i + "://localhost".len()..]);
	registry.root_for_uri_prefix(&rewritten)
	    .map(|(root, rest)| (root.clone(), rest.to_string()))
    }
}

/// A native absolute path with no scheme at all.
#[derive(Debug,Default)]
pub struct BarePath;

impl SchemeMatcher for BarePath {
    fn match_uri(&self, registry: &Registry, uri: &str)
	-> Option<(Arc<FilesystemRoot>, String)> {
	let native = uri.replace('\\', "/");
	match_native(registry, &native)
    }
}

/// Turns entry URIs into `(root, path)` pairs.
///
/// Before any matcher sees it, a URI has its query (everything from the
/// first `?`) stripped and is percent-decoded exactly once. Matchers are
/// tried in order; the first to recognize the URI decides the root.
pub struct Resolver {
    registry: Arc<Registry>,
    matchers: Vec<Box<dyn SchemeMatcher>>,
}

impl Debug for Resolver {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	fmt.debug_struct("Resolver")
	    .field("registry", &self.registry)
	    .field("matchers", &self.matchers.len())
	    .finish()
    }
}

impl Resolver {
    /// A resolver with the default matchers: `file:` URIs, named-root URIs,
    /// other registered root prefixes, and bare native paths, in that order.
    pub fn new(registry: Arc<Registry>) -> Resolver {
	Resolver::with_matchers(registry, vec![
	    Box::new(FileScheme),
	    Box::new(NamedRoot),
	    Box::new(RootPrefix),
	    Box::new(BarePath),
	])
    }
    pub fn with_matchers(registry: Arc<Registry>,
			 matchers: Vec<Box<dyn SchemeMatcher>>) -> Resolver {
	Resolver { registry, matchers }
    }
    /// Adds a matcher, tried before all the existing ones.
    pub fn push_front(&mut self, matcher: Box<dyn SchemeMatcher>) {
	self.matchers.insert(0, matcher);
    }
    pub fn registry(&self) -> &Arc<Registry> { &self.registry }
    pub fn resolve(&self, uri: &str) -> FileResult<Resolved> {
	let stripped = match uri.find('?') {
	    Some(i) => &uri[..i],
	    None => uri,
	};
	let decoded = match urlencoding::decode(stripped) {
	    Ok(x) => x,
	    Err(_) => {
		log::debug!("{:?} doesn't decode to UTF-8", uri);
		return Err(FileError::Encoding)
	    },
	};
	for matcher in self.matchers.iter() {
	    let (root, raw) = match matcher.match_uri(&self.registry,
						      &decoded) {
		Some(x) => x,
		None => continue,
	    };
	    return match PathBuf::try_from_str(&raw) {
		Ok(path) => {
		    log::debug!("{:?} resolved to {}:{}", uri, root.name(),
				path);
		    Ok(Resolved { root, path })
		},
		Err(x) => {
		    log::debug!("{:?} has an invalid path: {}", uri, x);
		    Err(FileError::Encoding)
		},
	    }
	}
	log::debug!("{:?} doesn't belong to any root", uri);
	Err(FileError::Encoding)
    }
}

use std::{
    borrow::{Borrow, Cow},
    fmt::{Debug, Display, Formatter},
    ops::Deref,
    str,
};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug,PartialEq,Eq,Clone,Copy,Error)]
pub enum PathFromStrError {
    /// A name was empty.
    #[error("empty name")]
    Empty,
    /// A single name contained a `/`.
    #[error("name contains a path separator")]
    Separator,
    /// You used one of the forbidden characters (`\ ? * | " < > :`).
    #[error("invalid char in name")]
    InvalidChar,
    /// A single name was `.` or `..`, which would name some other entry.
    #[error("name is `.` or `..`")]
    Dots,
}

static INVALID_NAME_CHAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\\?*|"<>:]"#)
	.unwrap()
});
static DRIVE_PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^/*[A-Za-z]:"#)
	.unwrap()
});

/// Normalizes a slash-delimited path into a root-contained [`PathBuf`].
///
/// Runs of `/` collapse into one, `.` components vanish, and each `..`
/// removes the component before it. A `..` with nothing left to remove is
/// dropped silently: the result never denotes anything above the root, but
/// it also never reports that the input tried. The result always begins
/// with `/` and never ends with one, except for the root itself (`/`).
///
/// ```
/// # use rootvfs::sanitize;
/// assert_eq!(sanitize("/a//b/../c").as_str(), "/a/c");
/// assert_eq!(sanitize("/a/../../b").as_str(), "/b");
/// assert_eq!(sanitize("").as_str(), "/");
/// ```
pub fn sanitize(path: &str) -> PathBuf {
    let mut kept: Vec<&str> = Vec::new();
    for component in path.split('/') {
	match component {
	    "" | "." => (),
	    ".." => { kept.pop(); },
	    x => kept.push(x),
	}
    }
    let mut inner = String::with_capacity(path.len() + 1);
    for component in kept {
	inner.push('/');
	inner.push_str(component);
    }
    if inner.is_empty() { inner.push('/') }
    PathBuf { inner }
}

/// Checks a single new name supplied to a create, copy, or move.
pub fn validate_segment_name(name: &str) -> Result<(), PathFromStrError> {
    if name.is_empty() {
	Err(PathFromStrError::Empty)
    }
    else if name.contains('/') {
	Err(PathFromStrError::Separator)
    }
    else if name == "." || name == ".." {
	Err(PathFromStrError::Dots)
    }
    else if INVALID_NAME_CHAR_PATTERN.is_match(name) {
	Err(PathFromStrError::InvalidChar)
    }
    else {
	Ok(())
    }
}

/// Returns true if `name` may be used as one component of a path.
pub fn is_valid_segment_name(name: &str) -> bool {
    validate_segment_name(name).is_ok()
}

/// Returns true if no component of `path` contains a forbidden character.
/// A leading drive designator (`C:`, `/C:`) is allowed, separators are
/// allowed, and so are empty components.
pub fn is_valid_path(path: &str) -> bool {
    let path = DRIVE_PREFIX_PATTERN.replace(path, "");
    !INVALID_NAME_CHAR_PATTERN.is_match(&path)
}

fn is_canonical(s: &str) -> bool {
    if s == "/" { return true }
    match s.strip_prefix('/') {
	None => false,
	Some(rest) => rest.split('/')
	    .all(|x| !x.is_empty() && x != "." && x != ".."),
    }
}

/// A sanitized path relative to the base of one filesystem root. This is a
/// non-owned slice; see [`PathBuf`] for the owned version.
///
/// # Invariants
///
/// - A path always begins with `/`. `/` alone is the root of the filesystem.
/// - A path never ends with `/`, except for the root.
/// - A path never contains empty, `.`, or `..` components.
///
/// Whether a path names a file or a directory is not part of the path. That
/// is decided by asking the native storage (see
/// [`locate`](fn.locate.html)), and only shows up again when an entry is
/// formatted for output.
#[repr(transparent)]
#[derive(PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct Path {
    inner: str
}

impl Path {
    /// Internal use only. Takes a `&str` and transmutes it into a `&Path`,
    /// without rechecking.
    ///
    /// Used by the `p!` macro, which has already sanitized its literal.
    #[doc(hidden)]
    pub const fn from_str_preverified(s: &str) -> &Path {
	// This is `unsafe`, but sound. It's sound because `Path` is a
	// transparent wrapper around `str`.
	unsafe { std::mem::transmute(s) }
    }
    /// The root path, `/`.
    pub const fn root() -> &'static Path {
	Path::from_str_preverified("/")
    }
    /// Creates a new `Path` or `PathBuf` from a `&str`. If the passed string
    /// is already sanitized, no copying will take place. Panics if any
    /// component contains a forbidden character. Convenient, but fragile.
    pub fn from_str(s: &str) -> Cow<'_, Path> {
	Path::try_from_str(s).expect("Invalid path")
    }
    /// Creates a new `Path` or `PathBuf` from a `&str`, sanitizing it if
    /// needed. Returns an error if any component contains a forbidden
    /// character.
    pub fn try_from_str(s: &str) -> Result<Cow<'_, Path>, PathFromStrError> {
	let ret = if is_canonical(s) {
	    Cow::Borrowed(Path::from_str_preverified(s))
	}
	else {
	    Cow::Owned(sanitize(s))
	};
	for component in ret.components() {
	    validate_segment_name(component.as_str())?;
	}
	Ok(ret)
    }
    /// Returns the path as a `&str`.
    pub fn as_str(&self) -> &str { &self.inner }
    /// Returns true if this is the root of the filesystem.
    pub fn is_root(&self) -> bool { &self.inner == "/" }
    /// Returns the components of this path. The root has none.
    pub fn components(&self) -> PathComponents<'_> {
	let slice = self.inner.strip_prefix('/').unwrap_or(&self.inner);
	if slice.is_empty() {
	    let mut iter = slice.split('/');
	    iter.next();
	    PathComponents::new(iter)
	}
	else { PathComponents::new(slice.split('/')) }
    }
    /// The last component of this path, or `""` for the root.
    pub fn name(&self) -> &str {
	match self.inner.rfind('/') {
	    Some(i) => &self.inner[i+1..],
	    None => &self.inner,
	}
    }
    /// Returns the path to the parent directory. The parent of the root is
    /// the root.
    pub fn parent(&self) -> &Path {
	match self.inner.rfind('/') {
	    Some(0) | None => Path::root(),
	    Some(i) => Path::from_str_preverified(&self.inner[..i]),
	}
    }
    /// Appends `moar` to this path and sanitizes the result. A leading `/`
    /// on `moar` is ignored; `..` never climbs above the root.
    pub fn join(&self, moar: &str) -> PathBuf {
	let mut joined = String::with_capacity(self.inner.len()
					       + moar.len() + 1);
	joined.push_str(&self.inner);
	joined.push('/');
	joined.push_str(moar);
	sanitize(&joined)
    }
    /// Like [`join`](#method.join), except that if `moar` begins with `/` it
    /// replaces this path entirely.
    pub fn join_or_replace(&self, moar: &str) -> PathBuf {
	if moar.starts_with('/') { sanitize(moar) }
	else { self.join(moar) }
    }
}

impl Display for Path {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	Display::fmt(&self.inner, fmt)
    }
}

impl Debug for Path {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	write!(fmt, "\"{}\"", &self.inner)
    }
}

impl<'a> From<&'a Path> for &'a str {
    fn from(x: &Path) -> &str { &x.inner }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str { &self.inner }
}

impl ToOwned for Path {
    type Owned = PathBuf;
    fn to_owned(&self) -> PathBuf {
	PathBuf { inner: self.inner.to_string() }
    }
}

impl Deref for Path {
    type Target = str;
    fn deref(&self) -> &str {
	&self.inner
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
	&self.inner == other
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
	&self.inner == *other
    }
}

/// An iterator over the components of a `Path`.
pub struct PathComponents<'a> {
    inner: str::Split<'a, char>,
}

impl<'a> PathComponents<'a> {
    fn new(inner: str::Split<'a, char>) -> PathComponents<'a> {
	PathComponents { inner }
    }
}

impl<'a> Iterator for PathComponents<'a> {
    type Item = &'a Path;
    fn next(&mut self) -> Option<&'a Path> {
	self.inner.next().map(Path::from_str_preverified)
    }
}

impl<'a> DoubleEndedIterator for PathComponents<'a> {
    fn next_back(&mut self) -> Option<&'a Path> {
	self.inner.next_back().map(Path::from_str_preverified)
    }
}

/// The owned, heap-allocated counterpart of [`Path`].
#[repr(transparent)]
#[derive(PartialEq,Eq,PartialOrd,Ord,Hash,Clone)]
pub struct PathBuf {
    inner: String
}

impl PathBuf {
    /// Creates a new `PathBuf` denoting the root.
    pub fn new() -> PathBuf {
	PathBuf { inner: "/".to_string() }
    }
    /// Creates a new `PathBuf` from a `&str`. Panics if the passed path is
    /// invalid in any way. Convenient, but fragile.
    pub fn from_str(s: &str) -> PathBuf {
	PathBuf::try_from_str(s).expect("Invalid path")
    }
    /// Creates a new `PathBuf` from a `&str`. Returns an error if the passed
    /// path is invalid in any way.
    pub fn try_from_str(s: &str) -> Result<PathBuf, PathFromStrError> {
	Path::try_from_str(s).map(Cow::into_owned)
    }
    /// Borrows this `PathBuf`'s contents as a `&Path`.
    pub fn as_path(&self) -> &Path {
	self.as_ref()
    }
    /// Appends one validated component.
    pub fn push(&mut self, name: &str) -> Result<&mut Self, PathFromStrError> {
	validate_segment_name(name)?;
	if !self.is_root() { self.inner.push('/') }
	self.inner.push_str(name);
	Ok(self)
    }
}

impl PartialEq<str> for PathBuf {
    fn eq(&self, other: &str) -> bool {
	self.inner == other
    }
}

impl Default for PathBuf {
    fn default() -> PathBuf { PathBuf::new() }
}

impl Borrow<Path> for PathBuf {
    fn borrow(&self) -> &Path {
	Path::from_str_preverified(self.inner.as_str())
    }
}

impl AsRef<Path> for PathBuf {
    fn as_ref(&self) -> &Path {
	self.borrow()
    }
}

impl AsRef<str> for PathBuf {
    fn as_ref(&self) -> &str {
	self.inner.as_str()
    }
}

impl Deref for PathBuf {
    type Target = Path;
    fn deref(&self) -> &Path {
	self.as_ref()
    }
}

impl Display for PathBuf {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	Display::fmt(self.as_path(), fmt)
    }
}

impl Debug for PathBuf {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	Debug::fmt(self.as_path(), fmt)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    fn is_borrowed(wat: &Cow<Path>) -> bool {
	matches!(wat, Cow::Borrowed(_))
    }
    #[test] fn sanitize_examples() {
	const PAIRS_TO_CHECK: &[(&str, &str)] = &[
	    ("/a//b/../c", "/a/c"),
	    ("/a/../../b", "/b"),
	    ("", "/"),
	    ("/", "/"),
	    ("//", "/"),
	    ("..", "/"),
	    ("../../..", "/"),
	    ("a/b", "/a/b"),
	    ("/a/b/", "/a/b"),
	    ("/a/./b", "/a/b"),
	    ("/docs/report.txt", "/docs/report.txt"),
	    ("///x///y///", "/x/y"),
	    ("/x/y/..", "/x"),
	    ("/x/../y/../..", "/"),
	];
	for (big, small) in PAIRS_TO_CHECK.iter() {
	    assert_eq!(sanitize(big).as_str(), *small, "sanitize({:?})", big);
	}
    }
    #[test] fn sanitize_is_idempotent_and_contained() {
	const INPUTS: &[&str] = &[
	    "", "/", "//", "..", "/..", "../a", "a/../..", "/a//b/../c",
	    "/a/b/c/../../../../d", "x/./y/.", "/ spaced / name", "/a/b/",
	    "....", "/.../..", "/a/..b/c", "\\a\\..\\b",
	];
	for input in INPUTS.iter() {
	    let once = sanitize(input);
	    let twice = sanitize(once.as_str());
	    assert_eq!(once, twice, "sanitize not idempotent on {:?}", input);
	    assert!(once.starts_with('/'));
	    assert!(once.components().all(|x| x != ".." && x != "."
					  && !x.is_empty()),
		    "{:?} left {:?}", input, once);
	}
    }
    #[test] fn segment_names() {
	const NAMES_TO_CHECK: &[(&str, Result<(), PathFromStrError>)] = &[
	    ("note.txt", Ok(())),
	    ("with space", Ok(())),
	    ("résumé", Ok(())),
	    ("", Err(PathFromStrError::Empty)),
	    ("a/b", Err(PathFromStrError::Separator)),
	    ("a\\b", Err(PathFromStrError::InvalidChar)),
	    ("what?", Err(PathFromStrError::InvalidChar)),
	    ("star*", Err(PathFromStrError::InvalidChar)),
	    ("pi|pe", Err(PathFromStrError::InvalidChar)),
	    ("\"quoted\"", Err(PathFromStrError::InvalidChar)),
	    ("<tag>", Err(PathFromStrError::InvalidChar)),
	    ("c:", Err(PathFromStrError::InvalidChar)),
	    (".", Err(PathFromStrError::Dots)),
	    ("..", Err(PathFromStrError::Dots)),
	    ("...", Ok(())),
	    (".hidden", Ok(())),
	];
	for (name, expected) in NAMES_TO_CHECK.iter() {
	    assert_eq!(validate_segment_name(name), *expected, "{:?}", name);
	    assert_eq!(is_valid_segment_name(name), expected.is_ok());
	}
    }
    #[test] fn whole_paths() {
	assert!(is_valid_path(""));
	assert!(is_valid_path("/docs/report.txt"));
	assert!(is_valid_path("C:/Users/someone"));
	assert!(is_valid_path("///C:/Users/someone"));
	assert!(!is_valid_path("/docs/a:b"));
	assert!(!is_valid_path("/docs/C:/x"));
	assert!(!is_valid_path("/what?"));
    }
    #[test] fn components() {
	assert_eq!(Path::from_str_preverified("/sora/donald/goofy").components()
		   .collect::<Vec<_>>(),
		   &["sora", "donald", "goofy"]);
	assert_eq!(Path::root().components().count(), 0);
    }
    #[test] fn names_and_parents() {
	const CASES: &[(&str, &str, &str)] = &[
	    ("/", "", "/"),
	    ("/a", "a", "/"),
	    ("/a/b", "b", "/a"),
	    ("/a/b/c.txt", "c.txt", "/a/b"),
	];
	for (path, name, parent) in CASES.iter() {
	    let path = Path::from_str_preverified(path);
	    assert_eq!(path.name(), *name);
	    assert_eq!(path.parent(), *parent);
	}
    }
    #[test] fn joins() {
	const JOINS_TO_CHECK: &[(&str, &str, &str)] = &[
	    ("/", "note.txt", "/note.txt"),
	    ("/docs", "report.txt", "/docs/report.txt"),
	    ("/docs", "../up", "/up"),
	    ("/docs", "../../../up", "/up"),
	    ("/docs", "/abs", "/docs/abs"),
	    ("/a/b", "", "/a/b"),
	];
	for (a, b, r) in JOINS_TO_CHECK.iter() {
	    assert_eq!(Path::from_str_preverified(a).join(b).as_str(), *r);
	}
	assert_eq!(Path::from_str_preverified("/docs").join_or_replace("/abs")
		   .as_str(), "/abs");
	assert_eq!(Path::from_str_preverified("/docs").join_or_replace("rel")
		   .as_str(), "/docs/rel");
    }
    #[test] fn push() {
	let mut buf = PathBuf::new();
	buf.push("a").unwrap().push("b").unwrap();
	assert_eq!(buf.as_str(), "/a/b");
	assert_eq!(buf.push("x:y").unwrap_err(), PathFromStrError::InvalidChar);
	assert_eq!(buf.push("..").unwrap_err(), PathFromStrError::Dots);
	assert_eq!(buf.push(".").unwrap_err(), PathFromStrError::Dots);
	assert_eq!(buf.as_str(), "/a/b");
    }
    #[test] fn copies_vs_keeps() {
	const PATHS_TO_CHECK: &[(&str, bool)] = &[
	    ("/asdf", true),
	    ("/asdf/truth", true),
	    ("/", true),
	    ("/asdf/../foxes", false),
	    ("relative", false),
	    ("/trailing/", false),
	    ("//double", false),
	];
	for (src, kept) in PATHS_TO_CHECK.iter() {
	    let result = Path::from_str(src);
	    if is_borrowed(&result) != *kept {
		if *kept {
		    panic!("{:?} is supposed to be borrowed but is copied.",
			   src);
		}
		else {
		    panic!("{:?} is supposed to be copied but is borrowed.",
			   src);
		}
	    }
	}
    }
    #[test] fn rejects_bad_components() {
	assert_eq!(Path::try_from_str("/ok/not:ok").unwrap_err(),
		   PathFromStrError::InvalidChar);
	assert_eq!(PathBuf::try_from_str("/a/../b?").unwrap_err(),
		   PathFromStrError::InvalidChar);
    }
}

use std::io::{self, ErrorKind};
use thiserror::Error;

/// The error kinds returned to callers of every entry operation.
///
/// The numeric codes (see [`code`](#method.code)) are stable; dispatch
/// layers are free to serialize them.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Error)]
pub enum FileError {
    /// The path does not exist, and existence was required.
    #[error("not found")]
    NotFound,
    /// The native storage refused access.
    #[error("security error")]
    Security,
    #[error("aborted")]
    Abort,
    /// The native storage failed to open or read something.
    #[error("not readable")]
    NotReadable,
    /// The URI could not be resolved, or a supplied name has forbidden
    /// characters in it.
    #[error("encoding error")]
    Encoding,
    /// The operation targets a protected object, like a filesystem root.
    #[error("no modification allowed")]
    NoModificationAllowed,
    #[error("invalid state")]
    InvalidState,
    #[error("syntax error")]
    Syntax,
    /// A collision or self-transfer rule was violated.
    #[error("invalid modification")]
    InvalidModification,
    /// A requested allocation is larger than the configured ceiling, or the
    /// storage ran out of room.
    #[error("quota exceeded")]
    QuotaExceeded,
    /// Found a file where a directory was required, or vice versa.
    #[error("type mismatch")]
    TypeMismatch,
    /// Exclusive creation of something that already exists.
    #[error("path exists")]
    PathExists,
}

impl FileError {
    const ALL: [FileError; 12] = [
	FileError::NotFound,
	FileError::Security,
	FileError::Abort,
	FileError::NotReadable,
	FileError::Encoding,
	FileError::NoModificationAllowed,
	FileError::InvalidState,
	FileError::Syntax,
	FileError::InvalidModification,
	FileError::QuotaExceeded,
	FileError::TypeMismatch,
	FileError::PathExists,
    ];
    /// The stable numeric code of this error, 1 through 12.
    pub fn code(self) -> u16 {
	match self {
	    FileError::NotFound => 1,
	    FileError::Security => 2,
	    FileError::Abort => 3,
	    FileError::NotReadable => 4,
	    FileError::Encoding => 5,
	    FileError::NoModificationAllowed => 6,
	    FileError::InvalidState => 7,
	    FileError::Syntax => 8,
	    FileError::InvalidModification => 9,
	    FileError::QuotaExceeded => 10,
	    FileError::TypeMismatch => 11,
	    FileError::PathExists => 12,
	}
    }
    pub fn from_code(code: u16) -> Option<FileError> {
	FileError::ALL.iter().copied().find(|x| x.code() == code)
    }
    /// Converts a failure of the native storage into a `FileError`. The
    /// kinds with an obvious counterpart map onto it; everything else is
    /// opaque to us and becomes `fallback`.
    pub fn from_native(err: io::Error, fallback: FileError) -> FileError {
	match err.kind() {
	    ErrorKind::NotFound => FileError::NotFound,
	    ErrorKind::PermissionDenied => FileError::Security,
	    ErrorKind::AlreadyExists => FileError::PathExists,
	    ErrorKind::StorageFull | ErrorKind::FileTooLarge
		=> FileError::QuotaExceeded,
	    ErrorKind::ReadOnlyFilesystem => FileError::NoModificationAllowed,
	    _ => {
		log::debug!("native storage failed ({}), reporting {}",
			    err, fallback);
		fallback
	    },
	}
    }
}

pub type FileResult<T> = std::result::Result<T, FileError>;

/// Problems building a [`Registry`](struct.Registry.html).
#[derive(Debug,Clone,PartialEq,Eq,Error)]
pub enum RegistryError {
    #[error("a root named {0:?} is already registered")]
    DuplicateName(String),
    #[error("URI prefix {prefix:?} of root {root:?} is already claimed by \
	     root {owner:?}")]
    DuplicatePrefix { prefix: String, root: String, owner: String },
    #[error("native base path {0:?} is not absolute")]
    NotAbsolute(String),
    #[error("invalid root name {0:?}")]
    InvalidName(String),
}

#[cfg(test)]
mod test {
    use super::*;
    #[test] fn codes_are_stable() {
	const CODES: &[(FileError, u16)] = &[
	    (FileError::NotFound, 1),
	    (FileError::Security, 2),
	    (FileError::Abort, 3),
	    (FileError::NotReadable, 4),
	    (FileError::Encoding, 5),
	    (FileError::NoModificationAllowed, 6),
	    (FileError::InvalidState, 7),
	    (FileError::Syntax, 8),
	    (FileError::InvalidModification, 9),
	    (FileError::QuotaExceeded, 10),
	    (FileError::TypeMismatch, 11),
	    (FileError::PathExists, 12),
	];
	for &(err, code) in CODES {
	    assert_eq!(err.code(), code);
	    assert_eq!(FileError::from_code(code), Some(err));
	}
	assert_eq!(FileError::from_code(0), None);
	assert_eq!(FileError::from_code(13), None);
    }
    #[test] fn native_mapping() {
	let cases = [
	    (ErrorKind::NotFound, FileError::NotFound),
	    (ErrorKind::PermissionDenied, FileError::Security),
	    (ErrorKind::AlreadyExists, FileError::PathExists),
	    (ErrorKind::StorageFull, FileError::QuotaExceeded),
	    (ErrorKind::FileTooLarge, FileError::QuotaExceeded),
	    (ErrorKind::ReadOnlyFilesystem, FileError::NoModificationAllowed),
	    (ErrorKind::Other, FileError::NotReadable),
	    (ErrorKind::InvalidData, FileError::NotReadable),
	];
	for (kind, expected) in cases {
	    assert_eq!(FileError::from_native(io::Error::from(kind),
					      FileError::NotReadable),
		       expected);
	}
    }
}

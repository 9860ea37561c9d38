use std::{
    error::Error,
    fmt::{Display, Formatter},
};
use proc_macro::TokenStream;
use syn::{parse_macro_input, LitStr};
use once_cell::sync::Lazy;
use regex::Regex;
use quote::quote;

// Let's duplicate the logic of `rootvfs::sanitize` and
// `rootvfs::validate_segment_name`!
#[derive(Debug,PartialEq,Eq)]
enum PathFromStrError {
    /// You used one of the forbidden characters in a name.
    InvalidChar,
}

impl Display for PathFromStrError {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> std::fmt::Result {
	match *self {
	    PathFromStrError::InvalidChar
		=> write!(fmt, "invalid char in path (no \\ ? * | \" < > :)"),
	}
    }
}

impl Error for PathFromStrError {}

static INVALID_NAME_CHAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\\?*|"<>:]"#)
	.unwrap()
});

fn sanitized(s: &str) -> Result<String, PathFromStrError> {
    let mut kept: Vec<&str> = Vec::new();
    for component in s.split('/') {
	match component {
	    "" | "." => (),
	    ".." => { kept.pop(); },
	    x if INVALID_NAME_CHAR_PATTERN.is_match(x)
		=> return Err(PathFromStrError::InvalidChar),
	    x => kept.push(x),
	}
    }
    // this string might grow slightly beyond this, hope that's OK
    let mut ret = String::with_capacity(s.len()+1);
    for component in kept {
	ret.push('/');
	ret.push_str(component);
    }
    if ret.is_empty() { ret.push('/') }
    Ok(ret)
}

#[proc_macro]
pub fn p(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as LitStr);
    let value = input.value();
    let value = match sanitized(&value) {
	Ok(x) => x,
	Err(x) => {
	    return proc_macro::TokenStream::from(syn::parse::Error::new_spanned(input, x.to_string()).to_compile_error())
	},
    };
    (quote!{
	::rootvfs::Path::from_str_preverified(#value)
    }).into()
}

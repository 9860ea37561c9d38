use std::{
    env,
    fs,
    path,
};
use path::Path as StdPath;
use path::PathBuf as StdPathBuf;

use super::*;

fn get_us_dir() -> StdPathBuf {
    match std::env::current_exe() {
	Ok(mut x) => {
	    if x.pop() {
		x
	    }
	    else {
		".".into()
	    }
	},
	Err(x) => {
	    log::warn!("Couldn't get the path to our own executable! {:?}",
		       x);
	    log::warn!("Assuming it's in the working directory.");
	    ".".into()
	},
    }
}

fn env_dir(var: &str) -> Option<StdPathBuf> {
    env::var_os(var).filter(|x| !x.is_empty()).map(StdPathBuf::from)
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
enum Access {
    /// Writable, and the directory is created if it's missing.
    Create,
    /// Left exactly as we found it.
    ReadOnly,
}

/// Adds a root at `dir`. Roots whose directory can't be expressed as UTF-8
/// are left out, loudly.
fn add_root(builder: RegistryBuilder, name: &str, dir: &StdPath,
	    access: Access) -> RegistryBuilder {
    if access == Access::Create {
	if let Err(x) = fs::create_dir_all(dir) {
	    log::warn!("{:?}: {:?}", dir, x);
	}
    }
    // Relative directories (like the "." fallback) have to be anchored
    // first, or the registry will refuse them.
    let dir = if dir.is_absolute() { dir.to_owned() }
    else {
	match env::current_dir() {
	    Ok(cwd) => cwd.join(dir),
	    Err(x) => {
		log::error!("{:?}: {:?}", dir, x);
		return builder
	    },
	}
    };
    // FsStorage won't see through a symlinked base. Not on Windows, where
    // this would make a verbatim `\\?\` path.
    let dir = if cfg!(unix) { fs::canonicalize(&dir).unwrap_or(dir) }
    else { dir };
    match dir.to_str() {
	Some(x) => {
	    log::info!("Root {:?} is at {:?}", name, dir);
	    let config = RootConfig::new(name, x);
	    builder.add(match access {
		Access::Create => config,
		Access::ReadOnly => config.read_only(),
	    })
	},
	None => {
	    log::error!("Root {:?} would be at {:?}, which isn't UTF-8. \
			 Leaving it out.", name, dir);
	    builder
	},
    }
}

pub(crate) fn standard_roots(unixy_name: &str) -> RegistryBuilder {
    let mut builder = RegistryBuilder::new();
    let us_dir = get_us_dir();
    let mut temp_dir = env::temp_dir();
    temp_dir.push(unixy_name);
    if cfg!(target_family="windows") {
	let mut data_dir = env_dir("LOCALAPPDATA")
	    .or_else(|| env_dir("APPDATA"))
	    .unwrap_or_else(|| us_dir.clone());
	data_dir.push(unixy_name);
	builder = add_root(builder, PERSISTENT, &data_dir, Access::Create);
	builder = add_root(builder, TEMPORARY, &temp_dir, Access::Create);
	builder = add_root(builder, APPLICATION, &us_dir, Access::ReadOnly);
	// Every drive is reachable under the empty base.
	builder = builder.root(ROOT, "");
    }
    else if cfg!(target_family="wasm") {
	builder = builder.root(PERSISTENT, "/data")
	    .root(TEMPORARY, "/tmp")
	    .add(RootConfig::new(APPLICATION, "/app").read_only())
	    .root(ROOT, "/");
    }
    else if cfg!(target_family="unix") {
	// The XDG Base Directory Specification, as far as it applies. If HOME
	// isn't set there is no reasonable default, and XDG-compliant shell
	// scripts would act as though it were empty.
	let home: StdPathBuf = env_dir("HOME")
	    .unwrap_or_else(|| "/".into());
	let mut xdg_data_home = env_dir("XDG_DATA_HOME")
	    .unwrap_or_else(|| {
		let mut ret = home.clone();
		ret.push(".local");
		ret.push("share");
		ret
	    });
	xdg_data_home.push(unixy_name);
	let mut xdg_cache_home = env_dir("XDG_CACHE_HOME")
	    .unwrap_or_else(|| {
		let mut ret = home.clone();
		ret.push(".cache");
		ret
	    });
	xdg_cache_home.push(unixy_name);
	builder = add_root(builder, PERSISTENT, &xdg_data_home, Access::Create);
	builder = add_root(builder, TEMPORARY, &temp_dir, Access::Create);
	builder = add_root(builder, APPLICATION, &us_dir, Access::ReadOnly);
	builder = add_root(builder, CACHE, &xdg_cache_home, Access::Create);
	builder = builder.root(ROOT, "/");
    }
    else {
	panic!("Unknown platform, no idea what the standard roots should \
		be!\nPlease figure out what they should be on your platform, \
		and then make a pull request.\n(Or, if appropriate, just \
		disable the `stdpaths` feature and build a Registry by \
		hand.)");
    }
    builder
}

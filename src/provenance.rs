//! "Where from" provenance recorded by the source filesystem

use std::path::Path;

/// Extended attribute browsers and download tools set on unix desktops
#[cfg(unix)]
pub const ORIGIN_URL_ATTR: &str = "user.xdg.origin.url";

/// Provenance URL of `path`, if the filesystem recorded one.
///
/// Missing attributes, unsupported filesystems and non-UTF-8 values all yield `None`.
#[cfg(unix)]
pub fn where_from(path: &Path) -> Option<String> {
    match xattr::get(path, ORIGIN_URL_ATTR) {
        Ok(Some(value)) => {
            let url = String::from_utf8(value).ok()?;
            let url = url.trim_end_matches('\0').trim();
            (!url.is_empty()).then(|| url.to_string())
        }
        Ok(None) => None,
        Err(err) => {
            log::debug!("No provenance for {:?}: {}", path, err);
            None
        }
    }
}

#[cfg(not(unix))]
pub fn where_from(_path: &Path) -> Option<String> {
    None
}

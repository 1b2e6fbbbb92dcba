// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Destination naming for downloaded documents.
//!
//! - [`sanitize`] turns a sender-supplied filename into one that is safe to
//!   join onto the download folder and short enough to carry a `_N` suffix.
//! - [`make_unique`] tries `name.ext`, `name_1.ext`, `name_2.ext`, ... and
//!   returns the first candidate that does not exist.
//! - [`create_exclusive`] is what the downloader actually uses: it opens the
//!   candidate with `create_new`, and when another writer won the race it
//!   asks [`make_unique`] for the next free name and tries again. The
//!   existence check only proposes names; the exclusive create decides.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};

/// Characters that are unsafe in filenames on at least one platform.
const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Used when nothing printable survives sanitizing.
pub const PLACEHOLDER_NAME: &str = "unnamed_file";

/// Upper bound on create attempts before giving up on a name.
const MAX_CREATE_ATTEMPTS: usize = 64;

/// Longest filename, in bytes, that common filesystems accept.
pub const MAX_NAME_BYTES: usize = 255;

/// Bytes kept free for the `_N` suffix added by [`make_unique`].
const SUFFIX_RESERVE: usize = 21;

/// Extensions longer than this are not preserved when a name is shortened.
const MAX_EXTENSION_BYTES: usize = 32;

/// Replace unsafe characters with `_`, drop control characters and trim
/// leading/trailing spaces and dots. Names that would not leave room for a
/// `_N` suffix within [`MAX_NAME_BYTES`] are cut at a char boundary, keeping
/// the extension. Returns [`PLACEHOLDER_NAME`] if the result is empty.
///
/// ```
/// use tgdrop::files::sanitize;
///
/// assert_eq!(sanitize("a/b:c?.txt"), "a_b_c_.txt");
/// assert_eq!(sanitize(" ..hidden. "), "hidden");
/// assert_eq!(sanitize("..."), "unnamed_file");
/// assert_eq!(sanitize("a\0b.txt"), "ab.txt");
/// ```
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if INVALID_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim_matches(is_edge_char);
    let shortened = shorten(trimmed, MAX_NAME_BYTES - SUFFIX_RESERVE);
    if shortened.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        shortened
    }
}

fn is_edge_char(c: char) -> bool {
    c == ' ' || c == '.'
}

/// Cut `name` to at most `limit` bytes, shortening the stem first.
fn shorten(name: &str, limit: usize) -> String {
    if name.len() <= limit {
        return name.to_string();
    }

    let (stem, ext) = match split_extension(name) {
        (stem, ext) if ext.len() <= MAX_EXTENSION_BYTES => (stem, ext),
        _ => (name, ""),
    };
    let stem = floor_char_boundary(stem, limit - ext.len()).trim_end_matches(is_edge_char);
    format!("{}{}", stem, ext)
}

fn floor_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Split a filename into stem and extension (including the dot). The
/// extension starts at the last dot; a name without a dot has none.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) => file_name.split_at(idx),
        None => (file_name, ""),
    }
}

/// Lower-case extension without the leading dot, or an empty string.
pub fn extension_of(file_name: &str) -> String {
    let (_, ext) = split_extension(file_name);
    ext.trim_start_matches('.').to_lowercase()
}

/// `Ok(false)` when something exists at `path`. Errors other than
/// `NotFound` (bad name, parent not a directory, no permission) are returned.
async fn is_free(path: &Path) -> io::Result<bool> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

/// Return `path` if nothing exists there, otherwise the first free
/// `stem_N.ext` sibling with N counting up from 1.
pub async fn make_unique(path: &Path) -> io::Result<PathBuf> {
    if is_free(path).await? {
        return Ok(path.to_path_buf());
    }

    let dir = path.parent().unwrap_or_else(|| Path::new(""));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&file_name);

    let mut n: u64 = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, n, ext));
        if is_free(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Create a new file at `path` or, if taken, at the next free sibling.
///
/// Returns the path that was actually created together with the open
/// handle. Fails with the last I/O error if no name could be claimed.
pub async fn create_exclusive(path: &Path) -> io::Result<(PathBuf, File)> {
    let mut last_err = None;

    for _ in 0..MAX_CREATE_ATTEMPTS {
        let candidate = make_unique(path).await?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(
                    "{} was claimed between check and create, trying the next name",
                    candidate.display()
                );
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::AlreadyExists, "no free filename found")
    }))
}

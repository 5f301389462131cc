//-
// Copyright (c) 2026, the keywsync authors
//
// This file is part of keywsync.
//
// keywsync is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// keywsync is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// keywsync. If not, see <http://www.gnu.org/licenses/>.

//! Miscellaneous functions for working with files.

use std::fs;
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;
use nix::sys::time::{TimeVal, TimeValLike};
use nix::unistd::{Gid, Uid};

/// Replace the contents of the existing file at `path` with `data`,
/// atomically where possible.
///
/// The new contents are staged in a temporary file within `staging` (the
/// directory of `path` if `None`), which is given the permissions, owner and,
/// if `preserve_times` is set, timestamps of the original, then renamed over
/// it. If the rename fails because the staging directory is on another file
/// system, the staged data is copied over the original instead. The staging
/// file is removed on every path out of this function.
pub fn replace_contents(
    path: &Path,
    staging: Option<&Path>,
    data: &[u8],
    preserve_times: bool,
) -> io::Result<()> {
    let original = fs::metadata(path)?;
    let staging = match staging {
        Some(staging) => staging,
        None => path.parent().unwrap_or_else(|| Path::new(".")),
    };

    let mut tf = tempfile::NamedTempFile::new_in(staging)?;
    tf.as_file_mut().write_all(data)?;
    fs::set_permissions(tf.path(), original.permissions())?;
    copy_owner(tf.path(), &original);
    if preserve_times {
        copy_times(tf.path(), &original)?;
    }
    tf.as_file_mut().sync_all()?;

    match tf.persist(path) {
        Ok(_) => Ok(()),
        Err(e) if is_cross_device(&e.error) => {
            debug!(
                "{} is on another file system than {}, copying",
                e.file.path().display(),
                path.display()
            );
            // `e.file` still owns the staged file and deletes it on drop.
            fs::copy(e.file.path(), path)?;
            if preserve_times {
                copy_times(path, &original)?;
            }
            Ok(())
        },
        Err(e) => Err(e.error),
    }
}

/// Whether any of `paths` was modified at or after `threshold`.
pub fn modified_since(
    paths: &[impl AsRef<Path>],
    threshold: SystemTime,
) -> io::Result<bool> {
    for path in paths {
        if fs::metadata(path)?.modified()? >= threshold {
            return Ok(true);
        }
    }

    Ok(false)
}

fn is_cross_device(e: &io::Error) -> bool {
    Some(nix::libc::EXDEV) == e.raw_os_error()
}

// Only root can give files away, so failure here is normal for unprivileged
// runs, where the staged file already has the right owner anyway.
fn copy_owner(path: &Path, original: &fs::Metadata) {
    if let Err(e) = nix::unistd::chown(
        path,
        Some(Uid::from_raw(original.uid())),
        Some(Gid::from_raw(original.gid())),
    ) {
        debug!("chown({}): {}", path.display(), e);
    }
}

fn copy_times(path: &Path, original: &fs::Metadata) -> io::Result<()> {
    let atime = to_timeval(original.accessed()?);
    let mtime = to_timeval(original.modified()?);
    nix::sys::stat::utimes(path, &atime, &mtime).map_err(nix_to_io)
}

fn to_timeval(t: SystemTime) -> TimeVal {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => TimeVal::microseconds(d.as_micros() as i64),
        Err(e) => TimeVal::microseconds(-(e.duration().as_micros() as i64)),
    }
}

fn nix_to_io(e: nix::Error) -> io::Error {
    match e {
        nix::Error::Sys(errno) => io::Error::from_raw_os_error(errno as i32),
        e => io::Error::new(io::ErrorKind::Other, e),
    }
}

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

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::sysexits::*;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{}: no X-Keywords header", .0.display())]
    MissingHeader(PathBuf),
    #[error("{id}: backing files disagree on keywords")]
    InconsistentFiles { id: String },
    #[error("{}: {count} X-Keywords headers", path.display())]
    DuplicateHeader { path: PathBuf, count: usize },
    #[error(
        "{}: no X-Keywords header and header insertion is not \
         allowed here",
        .0.display()
    )]
    HeaderInsertionDisallowed(PathBuf),
    #[error("{}: not a mail message", .0.display())]
    MalformedMessage(PathBuf),
    #[error("{id}: tag '{tag}' cannot be stored as a keyword")]
    UnencodableTag { id: String, tag: String },
    #[error("Keywords split on extra characters cannot be re-encoded")]
    NonInvertibleSplit,
    #[error("{id}: failed to {op} tag '{tag}': {source}")]
    IndexMutation {
        id: String,
        op: &'static str,
        tag: String,
        source: notmuch::Error,
    },
    #[error("{id}: failed to sync maildir flags: {source}")]
    MaildirFlags { id: String, source: notmuch::Error },
    #[error("Bad split characters: {0}")]
    BadSplitPattern(#[from] regex::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Notmuch(#[from] notmuch::Error),
}

impl Error {
    /// The `sysexits.h` code a run aborted by this error exits with.
    pub fn exit_code(&self) -> Sysexit {
        match *self {
            Error::MissingHeader(..)
            | Error::InconsistentFiles { .. }
            | Error::DuplicateHeader { .. }
            | Error::HeaderInsertionDisallowed(..)
            | Error::MalformedMessage(..)
            | Error::UnencodableTag { .. } => EX_DATAERR,
            Error::NonInvertibleSplit | Error::BadSplitPattern(..) => {
                EX_CONFIG
            },
            Error::IndexMutation { .. }
            | Error::MaildirFlags { .. }
            | Error::Notmuch(..) => EX_UNAVAILABLE,
            Error::Io(ref e) if io::ErrorKind::NotFound == e.kind() => {
                EX_NOINPUT
            },
            Error::Io(..) => EX_IOERR,
        }
    }
}

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

//! Reading the keywords of every file backing one message and checking that
//! they agree.

use std::fs;
use std::path::{Path, PathBuf};
use std::str;

use log::warn;

use super::codec::Codec;
use super::tag_set::TagSet;
use crate::mime::header_block::{HeaderBlock, KEYWORDS};
use crate::support::error::Error;

/// The raw `X-Keywords` value of one backing file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeywordSource {
    pub path: PathBuf,
    /// `None` if the file has no `X-Keywords` header.
    pub value: Option<String>,
}

/// The combined tags of all files of a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Consistency {
    /// Whether every file decoded to the same tags.
    pub consistent: bool,
    /// The union of the tags of all files.
    pub tags: TagSet,
}

/// Read the `X-Keywords` header of `path`.
///
/// Several occurrences are merged into one comma-separated value with a
/// warning, or rejected if `paranoid`. Bytes which are not UTF-8 are
/// replaced, also with a warning.
pub fn read_source(
    path: &Path,
    paranoid: bool,
) -> Result<KeywordSource, Error> {
    let data = fs::read(path)?;
    let block = HeaderBlock::parse(&data);
    if !block.has_fields() {
        return Err(Error::MalformedMessage(path.to_owned()));
    }

    let values = block.values(KEYWORDS);
    if values.len() > 1 {
        if paranoid {
            return Err(Error::DuplicateHeader {
                path: path.to_owned(),
                count: values.len(),
            });
        }

        warn!(
            "{}: {} X-Keywords headers, merging them",
            path.display(),
            values.len()
        );
    }

    if values.is_empty() {
        return Ok(KeywordSource {
            path: path.to_owned(),
            value: None,
        });
    }

    let joined = values.join(&b","[..]);
    let value = match str::from_utf8(&joined) {
        Ok(s) => s.to_owned(),
        Err(_) => {
            warn!("{}: X-Keywords is not valid UTF-8", path.display());
            String::from_utf8_lossy(&joined).into_owned()
        },
    };

    Ok(KeywordSource {
        path: path.to_owned(),
        value: Some(value),
    })
}

/// `read_source()` for each path, in order.
pub fn read_sources(
    paths: &[PathBuf],
    paranoid: bool,
) -> Result<Vec<KeywordSource>, Error> {
    paths.iter().map(|p| read_source(p, paranoid)).collect()
}

/// Decode every source and check that they agree.
///
/// A source without a header counts as having no tags. The returned tags
/// are a superset of the tags of every source even if they disagree.
pub fn check(
    codec: &Codec,
    sources: &[KeywordSource],
    unfiltered: bool,
) -> Consistency {
    let mut consistent = true;
    let mut union: Option<TagSet> = None;

    for source in sources {
        let tags = source
            .value
            .as_deref()
            .map(|v| codec.decode(v, unfiltered))
            .unwrap_or_default();

        union = Some(match union {
            None => tags,
            Some(union) => {
                let extra = tags.difference(&union);
                if extra.is_empty() {
                    union
                } else {
                    warn!(
                        "{}: has keywords {} not found in other files",
                        source.path.display(),
                        extra
                    );
                    consistent = false;
                    union.union(&extra)
                }
            },
        });
    }

    Consistency {
        consistent,
        tags: union.unwrap_or_default(),
    }
}

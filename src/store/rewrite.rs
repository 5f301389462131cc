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


use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::mime::header_block::{Field, HeaderBlock, KEYWORDS};
use crate::support::config::{DuplicateHeaderPolicy, RewriteConfig};
use crate::support::error::Error;
use crate::support::file_ops;

/// Writes new `X-Keywords` values into message files.
#[derive(Clone, Copy, Debug)]
pub struct Rewriter<'a> {
    config: &'a RewriteConfig,
    paranoid: bool,
}

impl<'a> Rewriter<'a> {
    pub fn new(config: &'a RewriteConfig, paranoid: bool) -> Self {
        Rewriter { config, paranoid }
    }

    /// Set the `X-Keywords` header of the message at `path` to `value`.
    ///
    /// Only the header block changes; every other field and the body are
    /// written back byte-for-byte. Returns whether the file was rewritten,
    /// which it is not if it already had exactly this header.
    pub fn rewrite(&self, path: &Path, value: &str) -> Result<bool, Error> {
        let data = fs::read(path)?;
        let mut block = HeaderBlock::parse(&data);
        if !block.has_fields() {
            return Err(Error::MalformedMessage(path.to_owned()));
        }

        let positions = block.positions(KEYWORDS);
        // Keep whatever capitalisation the file already uses
        let name = positions
            .first()
            .and_then(|&ix| block.fields()[ix].name())
            .unwrap_or(KEYWORDS)
            .to_owned();
        let field = Field::new(&name, value, block.line_ending());

        match positions.len() {
            0 => {
                if !self.config.may_insert(path) {
                    return Err(Error::HeaderInsertionDisallowed(
                        path.to_owned(),
                    ));
                }

                debug!("{}: adding X-Keywords header", path.display());
                block.push(field);
            },

            1 => block.replace(positions[0], field),

            count if self.paranoid => {
                return Err(Error::DuplicateHeader {
                    path: path.to_owned(),
                    count,
                });
            },

            count => match self.config.duplicate_headers {
                DuplicateHeaderPolicy::Collapse => {
                    warn!(
                        "{}: collapsing {} X-Keywords headers into one",
                        path.display(),
                        count
                    );
                    block.replace(positions[0], field);
                    for &ix in positions[1..].iter().rev() {
                        block.remove(ix);
                    }
                },
                DuplicateHeaderPolicy::UpdateAll => {
                    warn!(
                        "{}: updating all {} X-Keywords headers",
                        path.display(),
                        count
                    );
                    for &ix in &positions {
                        block.replace(ix, field.clone());
                    }
                },
            },
        }

        let new_data = block.serialise(&data);
        if new_data == data {
            return Ok(false);
        }

        file_ops::replace_contents(
            path,
            self.config.staging_dir.as_deref(),
            &new_data,
            self.config.preserve_times,
        )?;
        Ok(true)
    }
}

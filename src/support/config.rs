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

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Which side of a run is authoritative.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// notmuch tags are copied into the `X-Keywords` header of the files.
    TagToKeyword,
    /// `X-Keywords` headers are copied into the notmuch tags.
    KeywordToTag,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Direction::TagToKeyword => write!(f, "tag-to-keyword"),
            Direction::KeywordToTag => write!(f, "keyword-to-tag"),
        }
    }
}

/// Which halves of a computed change are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangePolicy {
    Both,
    OnlyAdd,
    OnlyRemove,
}

impl ChangePolicy {
    pub fn allows_add(self) -> bool {
        ChangePolicy::OnlyRemove != self
    }

    pub fn allows_remove(self) -> bool {
        ChangePolicy::OnlyAdd != self
    }
}

/// What to do with a file carrying more than one `X-Keywords` header when
/// rewriting it in non-paranoid mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateHeaderPolicy {
    /// Replace the first occurrence and drop the others.
    Collapse,
    /// Write the new value into every occurrence.
    UpdateAll,
}

impl Default for DuplicateHeaderPolicy {
    fn default() -> Self {
        DuplicateHeaderPolicy::Collapse
    }
}

impl FromStr for DuplicateHeaderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "collapse" => Ok(DuplicateHeaderPolicy::Collapse),
            "update-all" => Ok(DuplicateHeaderPolicy::UpdateAll),
            _ => Err(format!(
                "unknown duplicate header policy '{}' \
                 (expected 'collapse' or 'update-all')",
                s
            )),
        }
    }
}

/// The tables that turn raw keywords into tags and back.
///
/// Stored in the `[tags]` table of the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagRules {
    /// Tags which are never compared between the two sides. These are either
    /// internal notmuch tags or tags handled by maildir flags.
    ///
    /// Kept sorted and deduplicated by `normalise()`.
    pub ignore: Vec<String>,

    /// `(keyword, tag)` pairs. The first pair whose keyword equals a token
    /// wins; when encoding, the first pair whose tag matches wins.
    pub keyword_map: Vec<(String, String)>,

    /// `(from, to)` character replacements, applied in order to every token
    /// before `keyword_map` when decoding and in reverse after it when
    /// encoding.
    pub replace_chars: Vec<(char, char)>,

    /// Split every token further on `split_patterns`.
    ///
    /// This is how older headers nested keywords, but the split cannot be
    /// undone, so headers cannot be written while this is set.
    pub legacy_split: bool,

    /// Regular expressions matching the extra delimiters of `legacy_split`.
    pub split_patterns: Vec<String>,
}

impl Default for TagRules {
    fn default() -> Self {
        TagRules {
            ignore: [
                "draft",
                "flagged",
                "important",
                "new",
                "passed",
                "replied",
                "sent",
                "signed",
                "unread",
            ]
            .iter()
            .map(|&s| s.to_owned())
            .collect(),
            keyword_map: vec![
                ("\\Important".to_owned(), "important".to_owned()),
                ("\\Sent".to_owned(), "sent".to_owned()),
                ("\\Inbox".to_owned(), "inbox".to_owned()),
            ],
            replace_chars: vec![('/', '.')],
            legacy_split: false,
            split_patterns: vec!["/".to_owned()],
        }
    }
}

impl TagRules {
    /// Put the ignore list into sorted, deduplicated form.
    pub fn normalise(&mut self) {
        self.ignore.sort();
        self.ignore.dedup();
    }
}

/// How files are rewritten.
///
/// Stored in the `[rewrite]` table of the configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Files under any of these directories may gain an `X-Keywords` header
    /// if they have none.
    pub insert_under: Vec<PathBuf>,

    /// Handling of files with several `X-Keywords` headers.
    pub duplicate_headers: DuplicateHeaderPolicy,

    /// Where rewritten files are staged before replacing the original.
    ///
    /// By default, the directory of the file being rewritten. If this is on
    /// another file system, the file is copied over the original instead of
    /// being renamed.
    pub staging_dir: Option<PathBuf>,

    /// Carry the access and modification times of the original file over to
    /// the rewritten one.
    pub preserve_times: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        RewriteConfig {
            insert_under: vec![],
            duplicate_headers: DuplicateHeaderPolicy::default(),
            staging_dir: None,
            preserve_times: true,
        }
    }
}

impl RewriteConfig {
    pub fn may_insert(&self, path: &Path) -> bool {
        self.insert_under.iter().any(|prefix| path.starts_with(prefix))
    }
}

/// The contents of the file passed with `--config`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub tags: TagRules,
    pub rewrite: RewriteConfig,
}

/// Everything that governs one run.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub direction: Direction,
    pub query: String,
    /// Restrict the run to messages changed since this index revision.
    pub since_revision: Option<u64>,
    pub dry_run: bool,
    /// Treat anything unexpected as fatal instead of skipping the message.
    pub paranoid: bool,
    pub changes: ChangePolicy,
    /// keyword-to-tag only: skip messages none of whose files were modified
    /// at or after this time.
    pub mtime_threshold: Option<SystemTime>,
    /// keyword-to-tag only: have the index rename files to match the
    /// maildir flags implied by their new tags.
    pub maildir_flags: bool,
    pub tags: TagRules,
    pub rewrite: RewriteConfig,
}

impl SyncConfig {
    pub fn new(direction: Direction, query: impl Into<String>) -> Self {
        SyncConfig {
            direction,
            query: query.into(),
            since_revision: None,
            dry_run: false,
            paranoid: false,
            changes: ChangePolicy::Both,
            mtime_threshold: None,
            maildir_flags: false,
            tags: TagRules::default(),
            rewrite: RewriteConfig::default(),
        }
    }
}

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


//! The mail index, seen only through the operations a sync run needs.

use std::path::{Path, PathBuf};

use notmuch::{Database, DatabaseMode};

use crate::keywords::TagSet;
use crate::support::error::Error;

pub trait Index {
    type Message: IndexedMessage;

    /// The current revision of the index, which grows with every change.
    fn revision(&self) -> u64;

    fn count(&self, query: &str) -> Result<u32, Error>;

    fn search(&self, query: &str) -> Result<Vec<Self::Message>, Error>;
}

pub trait IndexedMessage {
    fn id(&self) -> String;

    /// Every file backing this message. Never empty.
    fn paths(&self) -> Vec<PathBuf>;

    fn tags(&self) -> TagSet;

    fn add_tag(&self, tag: &str) -> Result<(), Error>;

    fn remove_tag(&self, tag: &str) -> Result<(), Error>;

    /// Rename the backing files so their maildir flags match the tags.
    fn sync_maildir_flags(&self) -> Result<(), Error>;
}

pub struct NotmuchIndex {
    db: Database,
}

impl NotmuchIndex {
    /// Open the notmuch database at `path`, for writing only if `writable`.
    pub fn open(path: &Path, writable: bool) -> Result<Self, Error> {
        let mode = if writable {
            DatabaseMode::ReadWrite
        } else {
            DatabaseMode::ReadOnly
        };

        let db = Database::open_with_config(
            Some(path),
            mode,
            None::<&Path>,
            None,
        )?;
        Ok(NotmuchIndex { db })
    }
}

impl Index for NotmuchIndex {
    type Message = NotmuchMessage;

    fn revision(&self) -> u64 {
        self.db.revision().revision
    }

    fn count(&self, query: &str) -> Result<u32, Error> {
        Ok(self.db.create_query(query)?.count_messages()?)
    }

    fn search(&self, query: &str) -> Result<Vec<NotmuchMessage>, Error> {
        let query = self.db.create_query(query)?;
        Ok(query.search_messages()?.map(NotmuchMessage).collect())
    }
}

pub struct NotmuchMessage(notmuch::Message);

impl IndexedMessage for NotmuchMessage {
    fn id(&self) -> String {
        self.0.id().into_owned()
    }

    fn paths(&self) -> Vec<PathBuf> {
        self.0.filenames().collect()
    }

    fn tags(&self) -> TagSet {
        self.0.tags().collect()
    }

    fn add_tag(&self, tag: &str) -> Result<(), Error> {
        self.0.add_tag(tag).map_err(|source| Error::IndexMutation {
            id: self.id(),
            op: "add",
            tag: tag.to_owned(),
            source,
        })
    }

    fn remove_tag(&self, tag: &str) -> Result<(), Error> {
        self.0.remove_tag(tag).map_err(|source| Error::IndexMutation {
            id: self.id(),
            op: "remove",
            tag: tag.to_owned(),
            source,
        })
    }

    fn sync_maildir_flags(&self) -> Result<(), Error> {
        self.0
            .tags_to_maildir_flags()
            .map_err(|source| Error::MaildirFlags {
                id: self.id(),
                source,
            })
    }
}

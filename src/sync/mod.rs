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


//! One pass of synchronisation over the messages matching a query.
//!
//! For each message, the keywords of all its files are read and checked for
//! agreement, the difference against the index tags (minus the ignore list)
//! is computed, and whichever side the direction makes subordinate is
//! updated.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, trace, warn};

use crate::keywords::consistency::{self, KeywordSource};
use crate::keywords::{diff, Codec, TagDelta, TagSet};
use crate::store::{Index, IndexedMessage, Rewriter};
use crate::support::config::{Direction, SyncConfig};
use crate::support::cpu_time::Stopwatch;
use crate::support::error::Error;
use crate::support::file_ops;

/// Counters reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub checked: u64,
    /// Messages which needed a change, whether or not it was made.
    pub changed: u64,
    pub skipped: u64,
    /// Messages with no file modified since the mtime threshold.
    pub outside_window: u64,
    pub wall: Duration,
    pub cpu: Duration,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "checked {} messages, changed {}, skipped {}, \
             {} outside mtime window in {:.3}s ({:.3}s CPU)",
            self.checked,
            self.changed,
            self.skipped,
            self.outside_window,
            self.wall.as_secs_f64(),
            self.cpu.as_secs_f64()
        )
    }
}

/// What one message needed, as logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Change {
    /// Tags added to and removed from the index.
    Tags(TagDelta),
    /// The new `X-Keywords` value of every file.
    Header(String),
}

pub struct Driver<'a, I: Index> {
    index: &'a I,
    config: &'a SyncConfig,
    codec: Codec,
    rewriter: Rewriter<'a>,
    stats: Stats,
}

impl<'a, I: Index> Driver<'a, I> {
    pub fn new(index: &'a I, config: &'a SyncConfig) -> Result<Self, Error> {
        let codec = Codec::new(config.tags.clone())?;
        if Direction::TagToKeyword == config.direction && !codec.can_encode() {
            return Err(Error::NonInvertibleSplit);
        }

        Ok(Driver {
            index,
            config,
            codec,
            rewriter: Rewriter::new(&config.rewrite, config.paranoid),
            stats: Stats::default(),
        })
    }

    /// Process every message the configured query selects.
    ///
    /// Returns at the first fatal error; everything done to earlier messages
    /// stays done.
    pub fn run(mut self) -> Result<Stats, Error> {
        let watch = Stopwatch::start();
        let revision = self.index.revision();
        let query = effective_query(
            &self.config.query,
            self.config.since_revision,
            revision,
        );
        info!(
            "{} at revision {}, query: {}{}",
            self.config.direction,
            revision,
            query,
            if self.config.dry_run { " [dry-run]" } else { "" }
        );

        let query_watch = Stopwatch::start();
        let count = self.index.count(&query)?;
        let messages = self.index.search(&query)?;
        info!(
            "{} messages to check (query took {:.3}s)",
            count,
            query_watch.wall().as_secs_f64()
        );

        for message in &messages {
            self.sync_message(message)?;
        }

        self.stats.wall = watch.wall();
        self.stats.cpu = watch.cpu();
        info!("{}", self.stats);
        Ok(self.stats)
    }

    /// Bring one message in sync, returning the change it needed, if any.
    ///
    /// In a dry run, the change is only logged.
    fn sync_message(
        &mut self,
        message: &I::Message,
    ) -> Result<Option<Change>, Error> {
        let config = self.config;
        let id = message.id();
        let paths = message.paths();
        self.stats.checked += 1;
        trace!("{}: {} file(s)", id, paths.len());

        if Direction::KeywordToTag == config.direction {
            if let Some(threshold) = config.mtime_threshold {
                if !file_ops::modified_since(&paths, threshold)? {
                    trace!("{}: not modified recently", id);
                    self.stats.outside_window += 1;
                    return Ok(None);
                }
            }
        }

        let sources = consistency::read_sources(&paths, config.paranoid)?;
        for source in sources.iter().filter(|s| s.value.is_none()) {
            if !self.accept_missing_header(&id, &source.path)? {
                self.stats.skipped += 1;
                return Ok(None);
            }
        }

        let files = consistency::check(&self.codec, &sources, false);
        if !files.consistent {
            if config.paranoid {
                return Err(Error::InconsistentFiles { id });
            }

            warn!("{}: files disagree on keywords, skipping", id);
            self.stats.skipped += 1;
            return Ok(None);
        }

        let db = message.tags().difference(self.codec.ignore());
        let (current, desired) = match config.direction {
            Direction::KeywordToTag => (&db, &files.tags),
            Direction::TagToKeyword => (&files.tags, &db),
        };
        let delta = diff(current, desired).restrict(config.changes);
        if delta.is_empty() {
            trace!("{}: in sync", id);
            return Ok(None);
        }

        let change = match config.direction {
            Direction::KeywordToTag => {
                self.apply_to_index(message, &id, &delta)?;
                Change::Tags(delta)
            },
            Direction::TagToKeyword => {
                if let Some(tag) =
                    delta.add.iter().find(|t| !self.codec.round_trips(t))
                {
                    if config.paranoid {
                        return Err(Error::UnencodableTag {
                            id,
                            tag: tag.clone(),
                        });
                    }

                    warn!(
                        "{}: tag '{}' cannot be stored as a keyword, skipping",
                        id, tag
                    );
                    self.stats.skipped += 1;
                    return Ok(None);
                }

                Change::Header(self.apply_to_files(
                    &id,
                    &sources,
                    &files.tags,
                    &delta,
                )?)
            },
        };

        self.stats.changed += 1;
        Ok(Some(change))
    }

    /// Decide what a file without any `X-Keywords` header means.
    ///
    /// Returns whether the message can still be processed.
    fn accept_missing_header(
        &self,
        id: &str,
        path: &Path,
    ) -> Result<bool, Error> {
        match self.config.direction {
            Direction::TagToKeyword if self.config.rewrite.may_insert(path) => {
                debug!("{}: {}: no X-Keywords header yet", id, path.display());
                Ok(true)
            },
            _ if self.config.paranoid => {
                Err(Error::MissingHeader(path.to_owned()))
            },
            Direction::KeywordToTag => {
                warn!(
                    "{}: {}: no X-Keywords header, treating as empty",
                    id,
                    path.display()
                );
                Ok(true)
            },
            Direction::TagToKeyword => {
                warn!(
                    "{}: {}: no X-Keywords header, skipping",
                    id,
                    path.display()
                );
                Ok(false)
            },
        }
    }

    fn apply_to_index(
        &self,
        message: &I::Message,
        id: &str,
        delta: &TagDelta,
    ) -> Result<(), Error> {
        let dry_run = self.config.dry_run;
        let suffix = if dry_run { " [dry-run]" } else { "" };

        for tag in &delta.add {
            info!("{}: +{}{}", id, tag, suffix);
            if !dry_run {
                message.add_tag(tag)?;
            }
        }

        for tag in &delta.remove {
            info!("{}: -{}{}", id, tag, suffix);
            if !dry_run {
                message.remove_tag(tag)?;
            }
        }

        if self.config.maildir_flags && !dry_run {
            debug!("{}: syncing maildir flags", id);
            message.sync_maildir_flags()?;
        }

        Ok(())
    }

    fn apply_to_files(
        &self,
        id: &str,
        sources: &[KeywordSource],
        file_tags: &TagSet,
        delta: &TagDelta,
    ) -> Result<String, Error> {
        // Ignored tags never take part in the comparison, so carry over any
        // the files already have.
        let unfiltered = consistency::check(&self.codec, sources, true).tags;
        let ignored = unfiltered.difference(file_tags);
        let new_tags = delta.apply(file_tags).union(&ignored);
        let value = self.codec.encode(&new_tags)?;

        info!(
            "{}: +{} -{} => X-Keywords: {}{}",
            id,
            delta.add,
            delta.remove,
            value,
            if self.config.dry_run { " [dry-run]" } else { "" }
        );
        if self.config.dry_run {
            return Ok(value);
        }

        for source in sources {
            if self.rewriter.rewrite(&source.path, &value)? {
                debug!("{}: rewrote {}", id, source.path.display());
            }
        }

        Ok(value)
    }
}

/// The query actually run, restricted to messages changed since
/// `since_revision` if given.
pub fn effective_query(
    query: &str,
    since_revision: Option<u64>,
    revision: u64,
) -> String {
    match since_revision {
        None => query.to_owned(),
        Some(since) if "*" == query.trim() => {
            format!("lastmod:{}..{}", since, revision)
        },
        Some(since) => {
            format!("lastmod:{}..{} and ({})", since, revision, query)
        },
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use nix::sys::time::{TimeVal, TimeValLike};

    use super::*;
    use crate::keywords::tag_set::tags;
    use crate::store::memory::{MemoryIndex, Mutation};
    use crate::support::config::{ChangePolicy, TagRules};

    struct Setup {
        tmpdir: tempfile::TempDir,
        index: MemoryIndex,
        config: SyncConfig,
    }

    impl Setup {
        fn new(direction: Direction) -> Self {
            crate::init_test_log();

            let mut config = SyncConfig::new(direction, "*");
            config.tags = TagRules {
                ignore: vec![],
                keyword_map: vec![
                    ("\\Inbox".to_owned(), "inbox".to_owned()),
                    ("\\Important".to_owned(), "important".to_owned()),
                ],
                ..TagRules::default()
            };

            Setup {
                tmpdir: tempfile::TempDir::new().unwrap(),
                index: MemoryIndex::new(),
                config,
            }
        }

        fn file(&self, name: &str, keywords: Option<&str>) -> PathBuf {
            let path = self.tmpdir.path().join(name);
            let mut data = b"From: a@b.c\n".to_vec();
            if let Some(keywords) = keywords {
                data.extend_from_slice(
                    format!("X-Keywords: {}\n", keywords).as_bytes(),
                );
            }
            data.extend_from_slice(b"Subject: test\n\nbody\n");
            fs::write(&path, data).unwrap();
            path
        }

        fn message(&self, id: &str, keywords: &[Option<&str>], db: &[&str]) {
            let paths = keywords
                .iter()
                .enumerate()
                .map(|(ix, kw)| self.file(&format!("{}.{}", id, ix), *kw))
                .collect::<Vec<_>>();
            self.index.insert(id, &paths, db);
        }

        fn run(&self) -> Result<Stats, Error> {
            Driver::new(&self.index, &self.config)?.run()
        }

        /// Sync only message `id`, returning what it needed.
        fn plan(&self, id: &str) -> Option<Change> {
            let mut driver = Driver::new(&self.index, &self.config).unwrap();
            let message = self
                .index
                .search(&format!("id:{}", id))
                .unwrap()
                .pop()
                .unwrap();
            driver.sync_message(&message).unwrap()
        }

        fn keywords(&self, id: &str, ix: usize) -> Option<String> {
            let path = self.tmpdir.path().join(format!("{}.{}", id, ix));
            consistency::read_source(&path, true).unwrap().value
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        let t = TimeVal::seconds(secs as i64);
        nix::sys::stat::utimes(path, &t, &t).unwrap();
    }

    #[test]
    fn keyword_to_tag_removes_extra_tag() {
        let setup = Setup::new(Direction::KeywordToTag);
        setup.message(
            "m",
            &[Some("\\Inbox,\\Important")],
            &["inbox", "important", "spam"],
        );

        let stats = setup.run().unwrap();
        assert_eq!(1, stats.checked);
        assert_eq!(1, stats.changed);
        assert_eq!(tags(&["important", "inbox"]), setup.index.tags("m"));
        assert_eq!(
            vec![Mutation::Remove("m".to_owned(), "spam".to_owned())],
            setup.index.mutations()
        );
    }

    #[test]
    fn keyword_to_tag_adds_and_syncs_flags() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.config.maildir_flags = true;
        setup.message("m", &[Some("work,\\Inbox"), Some("\\Inbox,work")], &[]);
        setup.message("n", &[Some("work")], &["work"]);

        let stats = setup.run().unwrap();
        assert_eq!(2, stats.checked);
        assert_eq!(1, stats.changed);
        assert_eq!(
            vec![
                Mutation::Add("m".to_owned(), "inbox".to_owned()),
                Mutation::Add("m".to_owned(), "work".to_owned()),
                Mutation::MaildirFlags("m".to_owned()),
            ],
            setup.index.mutations()
        );
    }

    #[test]
    fn tag_to_keyword_adds_to_header() {
        let setup = Setup::new(Direction::TagToKeyword);
        setup.message(
            "m",
            &[Some("inbox"), Some("inbox")],
            &["inbox", "urgent"],
        );

        let stats = setup.run().unwrap();
        assert_eq!(1, stats.changed);
        assert_eq!(Some("\\Inbox,urgent".to_owned()), setup.keywords("m", 0));
        assert_eq!(Some("\\Inbox,urgent".to_owned()), setup.keywords("m", 1));
        assert!(setup.index.mutations().is_empty());

        // Nothing left to do
        let stats = setup.run().unwrap();
        assert_eq!(0, stats.changed);
    }

    #[test]
    fn tag_to_keyword_preserves_ignored_tags() {
        let mut setup = Setup::new(Direction::TagToKeyword);
        setup.config.tags.ignore =
            vec!["unread".to_owned(), "important".to_owned()];
        setup.message(
            "m",
            &[Some("\\Inbox,unread,\\Important,old")],
            &["inbox", "work"],
        );

        setup.run().unwrap();
        assert_eq!(
            Some("\\Important,\\Inbox,unread,work".to_owned()),
            setup.keywords("m", 0)
        );
    }

    #[test]
    fn tag_to_keyword_skips_tags_keywords_cannot_hold() {
        let mut setup = Setup::new(Direction::TagToKeyword);
        setup.config.tags = TagRules::default();
        setup.message("m", &[Some("\\Inbox")], &["inbox", "a,b", "x/y"]);
        setup.message("n", &[Some("\\Inbox")], &["inbox", "work"]);

        let stats = setup.run().unwrap();
        assert_eq!(1, stats.skipped);
        assert_eq!(1, stats.changed);
        assert_eq!(Some("\\Inbox".to_owned()), setup.keywords("m", 0));
        assert_eq!(Some("\\Inbox,work".to_owned()), setup.keywords("n", 0));

        setup.config.paranoid = true;
        assert_matches!(
            Err(Error::UnencodableTag { .. }),
            setup.run()
        );
    }

    #[test]
    fn ignored_tags_not_compared() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.config.tags.ignore = vec!["unread".to_owned()];
        setup.message("m", &[Some("a")], &["a", "unread"]);
        setup.message("n", &[Some("a,unread")], &["a"]);

        let stats = setup.run().unwrap();
        assert_eq!(0, stats.changed);
        assert!(setup.index.mutations().is_empty());
    }

    #[test]
    fn dry_run_changes_nothing() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.config.dry_run = true;
        setup.config.maildir_flags = true;
        setup.message("m", &[Some("a")], &["b"]);

        assert_eq!(
            Some(Change::Tags(TagDelta {
                add: tags(&["a"]),
                remove: tags(&["b"]),
            })),
            setup.plan("m")
        );
        let stats = setup.run().unwrap();
        assert_eq!(1, stats.changed);
        assert!(setup.index.mutations().is_empty());
        assert_eq!(tags(&["b"]), setup.index.tags("m"));

        setup.config.direction = Direction::TagToKeyword;
        assert_eq!(Some(Change::Header("b".to_owned())), setup.plan("m"));
        let stats = setup.run().unwrap();
        assert_eq!(1, stats.changed);
        assert_eq!(Some("a".to_owned()), setup.keywords("m", 0));
    }

    #[test]
    fn change_policies() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.config.changes = ChangePolicy::OnlyRemove;
        setup.message("m", &[Some("a,b")], &["b", "c"]);

        setup.run().unwrap();
        assert_eq!(tags(&["b"]), setup.index.tags("m"));

        setup.config.changes = ChangePolicy::OnlyAdd;
        setup.run().unwrap();
        assert_eq!(tags(&["a", "b"]), setup.index.tags("m"));

        setup.config.direction = Direction::TagToKeyword;
        setup.message("n", &[Some("a,b")], &["b", "c"]);
        setup.run().unwrap();
        assert_eq!(Some("a,b".to_owned()), setup.keywords("m", 0));
        assert_eq!(Some("a,b,c".to_owned()), setup.keywords("n", 0));

        setup.config.changes = ChangePolicy::OnlyRemove;
        setup.run().unwrap();
        assert_eq!(Some("b,c".to_owned()), setup.keywords("n", 0));
    }

    #[test]
    fn inconsistent_files() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.message("m", &[Some("a,b"), Some("a,b,c")], &[]);

        let stats = setup.run().unwrap();
        assert_eq!(1, stats.skipped);
        assert_eq!(0, stats.changed);
        assert!(setup.index.mutations().is_empty());

        setup.config.paranoid = true;
        assert_matches!(
            Err(Error::InconsistentFiles { .. }),
            setup.run()
        );
    }

    #[test]
    fn mtime_window() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.config.mtime_threshold =
            Some(UNIX_EPOCH + Duration::from_secs(2_000_000));
        setup.message("old", &[Some("a"), Some("a")], &[]);
        setup.message("new", &[Some("a"), Some("a")], &[]);
        for ix in 0..2 {
            set_mtime(
                &setup.tmpdir.path().join(format!("old.{}", ix)),
                1_000_000,
            );
        }
        set_mtime(&setup.tmpdir.path().join("new.0"), 1_000_000);
        set_mtime(&setup.tmpdir.path().join("new.1"), 2_000_000);

        let stats = setup.run().unwrap();
        assert_eq!(2, stats.checked);
        assert_eq!(1, stats.outside_window);
        assert_eq!(1, stats.changed);
        assert_eq!(
            vec![Mutation::Add("new".to_owned(), "a".to_owned())],
            setup.index.mutations()
        );

        // Not applicable when writing headers
        setup.config.direction = Direction::TagToKeyword;
        setup.config.mtime_threshold = Some(SystemTime::now());
        let stats = setup.run().unwrap();
        assert_eq!(0, stats.outside_window);
        assert_eq!(1, stats.changed);
    }

    #[test]
    fn missing_header_reading_keywords() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.message("m", &[None], &["a"]);

        let stats = setup.run().unwrap();
        assert_eq!(0, stats.skipped);
        assert!(setup.index.tags("m").is_empty());

        setup.config.paranoid = true;
        assert_matches!(Err(Error::MissingHeader(_)), setup.run());
    }

    #[test]
    fn missing_header_writing_keywords() {
        let mut setup = Setup::new(Direction::TagToKeyword);
        setup.message("m", &[None], &["a"]);

        let stats = setup.run().unwrap();
        assert_eq!(1, stats.skipped);
        assert_eq!(None, setup.keywords("m", 0));

        setup.config.paranoid = true;
        assert_matches!(Err(Error::MissingHeader(_)), setup.run());

        setup.config.rewrite.insert_under =
            vec![setup.tmpdir.path().to_owned()];
        let stats = setup.run().unwrap();
        assert_eq!(0, stats.skipped);
        assert_eq!(1, stats.changed);
        assert_eq!(Some("a".to_owned()), setup.keywords("m", 0));
    }

    #[test]
    fn index_failure_is_fatal() {
        let setup = Setup::new(Direction::KeywordToTag);
        setup.message("m", &[Some("a,b")], &[]);
        setup.message("n", &[Some("c")], &[]);
        setup.index.fail_on("b");

        assert_matches!(
            Err(Error::IndexMutation { op: "add", .. }),
            setup.run()
        );
        assert_eq!(
            vec![Mutation::Add("m".to_owned(), "a".to_owned())],
            setup.index.mutations()
        );
    }

    #[test]
    fn legacy_split_only_reads() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.config.tags.legacy_split = true;
        setup.message("m", &[Some("lists/rust,\\Inbox")], &[]);
        setup.run().unwrap();
        assert_eq!(tags(&["inbox", "lists", "rust"]), setup.index.tags("m"));

        setup.config.direction = Direction::TagToKeyword;
        assert_matches!(Err(Error::NonInvertibleSplit), setup.run());
    }

    #[test]
    fn since_revision() {
        let mut setup = Setup::new(Direction::KeywordToTag);
        setup.message("m", &[Some("a")], &[]);
        setup.message("n", &[Some("b")], &[]);
        setup.config.since_revision = Some(2);

        let stats = setup.run().unwrap();
        assert_eq!(1, stats.checked);
        assert_eq!(tags(&["b"]), setup.index.tags("n"));
        assert!(setup.index.tags("m").is_empty());
        assert_eq!(
            Some(&"lastmod:2..2".to_owned()),
            setup.index.queries().last()
        );
    }

    #[test]
    fn query_restriction() {
        assert_eq!("tag:x", effective_query("tag:x", None, 7));
        assert_eq!("lastmod:3..7", effective_query(" * ", Some(3), 7));
        assert_eq!(
            "lastmod:3..7 and (tag:x or tag:y)",
            effective_query("tag:x or tag:y", Some(3), 7)
        );
    }

    #[test]
    fn summary_line() {
        let stats = Stats {
            checked: 10,
            changed: 2,
            skipped: 1,
            outside_window: 3,
            wall: Duration::from_millis(1500),
            cpu: Duration::from_millis(250),
        };
        assert_eq!(
            "checked 10 messages, changed 2, skipped 1, \
             3 outside mtime window in 1.500s (0.250s CPU)",
            stats.to_string()
        );
    }
}

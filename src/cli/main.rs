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


use std::path::PathBuf;

use structopt::StructOpt;

use crate::support::config::DuplicateHeaderPolicy;
use crate::support::sysexits::*;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    Sync(SyncSubcommand),
    /// Print the current revision of the notmuch database.
    ///
    /// Recording this after a run and passing it to `--since-revision` on
    /// the next one restricts that run to the messages changed in between.
    Revision(RevisionSubcommand),
}

/// Synchronise notmuch tags with the X-Keywords headers of the mail files.
///
/// Exactly one direction must be chosen. With -k, the headers are taken as
/// the truth and the tags of each message are changed to match them. With
/// -t, the tags are taken as the truth and the headers of every file of each
/// message are rewritten to match them.
///
/// Tags on the ignore list (by default draft, flagged, important, new,
/// passed, replied, sent, signed and unread) are never compared, and are
/// kept as they are when headers are rewritten.
///
/// If the files of a message disagree on their keywords, the message is
/// skipped with a warning, or the run is aborted with --paranoid.
#[derive(StructOpt)]
pub(super) struct SyncSubcommand {
    /// Path to the notmuch database.
    #[structopt(short = "m", long, parse(from_os_str))]
    pub(super) database: PathBuf,

    /// Copy keywords from X-Keywords headers into tags.
    #[structopt(short = "k", long)]
    pub(super) keywords_to_tags: bool,

    /// Copy tags into X-Keywords headers.
    #[structopt(short = "t", long)]
    pub(super) tags_to_keywords: bool,

    /// notmuch query selecting the messages to synchronise ("*" for all).
    #[structopt(short, long)]
    pub(super) query: String,

    /// Log what would change without changing anything.
    #[structopt(short, long)]
    pub(super) dry_run: bool,

    /// Log more detail. Can be given twice.
    #[structopt(short, long, parse(from_occurrences))]
    pub(super) verbose: u8,

    /// Abort on anything suspicious instead of skipping the message.
    #[structopt(short, long)]
    pub(super) paranoid: bool,

    /// Only add tags or keywords, never remove them.
    #[structopt(short = "a", long)]
    pub(super) only_add: bool,

    /// Only remove tags or keywords, never add them.
    #[structopt(short = "r", long)]
    pub(super) only_remove: bool,

    /// With -k, skip messages none of whose files were modified at or after
    /// this time, given as Unix seconds or an RFC 3339 timestamp.
    #[structopt(long)]
    pub(super) mtime: Option<String>,

    /// Only look at messages changed since this database revision.
    #[structopt(long)]
    pub(super) since_revision: Option<u64>,

    /// With -k, rename files to match the maildir flags of their new tags.
    #[structopt(long)]
    pub(super) maildir_flags: bool,

    /// With -t, files under this directory which have no X-Keywords header
    /// get one added. Can be passed multiple times.
    #[structopt(long, parse(from_os_str), number_of_values(1))]
    pub(super) insert_header_under: Vec<PathBuf>,

    /// What to do with files with several X-Keywords headers when not
    /// paranoid: "collapse" them into one or "update-all" of them.
    #[structopt(long, parse(try_from_str))]
    pub(super) duplicate_headers: Option<DuplicateHeaderPolicy>,

    /// TOML file with [tags] and [rewrite] tables.
    #[structopt(long, parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// log4rs configuration file to use instead of logging to standard
    /// error.
    #[structopt(long, parse(from_os_str))]
    pub(super) log_config: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct RevisionSubcommand {
    /// Path to the notmuch database.
    #[structopt(short = "m", long, parse(from_os_str))]
    pub(super) database: PathBuf,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    match cmd {
        Command::Sync(cmd) => super::sync::main(cmd),
        Command::Revision(cmd) => super::revision::main(cmd),
    }
}

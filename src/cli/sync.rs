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


use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, info, LevelFilter};

use super::main::SyncSubcommand;
use crate::store::NotmuchIndex;
use crate::support::config::{ChangePolicy, Direction, FileConfig, SyncConfig};
use crate::support::sysexits::*;
use crate::sync::Driver;

pub(super) fn main(cmd: SyncSubcommand) {
    let config = match configure(&cmd) {
        Ok(config) => config,
        Err((exit, message)) => {
            eprintln!("{}", message);
            exit.exit()
        },
    };

    init_logging(cmd.verbose, cmd.log_config.as_deref());

    // Writing headers never changes the index
    let writable =
        Direction::KeywordToTag == config.direction && !config.dry_run;
    info!(
        "Opening {}{}",
        cmd.database.display(),
        if writable { "" } else { " read-only" }
    );
    let index = match NotmuchIndex::open(&cmd.database, writable) {
        Ok(index) => index,
        Err(e) => {
            error!("{}: {}", cmd.database.display(), e);
            e.exit_code().exit()
        },
    };

    if let Err(e) = Driver::new(&index, &config).and_then(Driver::run) {
        error!("{}", e);
        e.exit_code().exit();
    }
}

/// Turn the command line and configuration file into a `SyncConfig`.
///
/// On failure, returns the exit code and the message to show.
fn configure(cmd: &SyncSubcommand) -> Result<SyncConfig, (Sysexit, String)> {
    let direction = match (cmd.keywords_to_tags, cmd.tags_to_keywords) {
        (true, false) => Direction::KeywordToTag,
        (false, true) => Direction::TagToKeyword,
        _ => {
            return Err(usage(
                "Exactly one of -k/--keywords-to-tags and \
                 -t/--tags-to-keywords must be given",
            ))
        },
    };

    let changes = match (cmd.only_add, cmd.only_remove) {
        (false, false) => ChangePolicy::Both,
        (true, false) => ChangePolicy::OnlyAdd,
        (false, true) => ChangePolicy::OnlyRemove,
        (true, true) => {
            return Err(usage(
                "-a/--only-add and -r/--only-remove are mutually exclusive",
            ))
        },
    };

    if cmd.query.trim().is_empty() {
        return Err(usage("The query must not be empty; use '*' for all"));
    }

    if Direction::TagToKeyword == direction {
        if cmd.mtime.is_some() {
            return Err(usage("--mtime can only be used with -k"));
        }
        if cmd.maildir_flags {
            return Err(usage("--maildir-flags can only be used with -k"));
        }
    } else if !cmd.insert_header_under.is_empty() {
        return Err(usage("--insert-header-under can only be used with -t"));
    }

    let file_config = match cmd.config {
        Some(ref path) => load_config(path)?,
        None => FileConfig::default(),
    };

    let mut config = SyncConfig::new(direction, cmd.query.clone());
    config.since_revision = cmd.since_revision;
    config.dry_run = cmd.dry_run;
    config.paranoid = cmd.paranoid;
    config.changes = changes;
    config.maildir_flags = cmd.maildir_flags;
    config.mtime_threshold = match cmd.mtime {
        Some(ref mtime) => Some(parse_mtime(mtime).map_err(usage)?),
        None => None,
    };
    config.tags = file_config.tags;
    config.rewrite = file_config.rewrite;
    config
        .rewrite
        .insert_under
        .extend(cmd.insert_header_under.iter().cloned());
    config.rewrite.insert_under = config
        .rewrite
        .insert_under
        .iter()
        .map(|p| absolute(p))
        .collect();
    if let Some(policy) = cmd.duplicate_headers {
        config.rewrite.duplicate_headers = policy;
    }

    Ok(config)
}

fn usage(message: impl Into<String>) -> (Sysexit, String) {
    (EX_USAGE, message.into())
}

fn load_config(path: &Path) -> Result<FileConfig, (Sysexit, String)> {
    let data = fs::read(path).map_err(|e| {
        (
            EX_CONFIG,
            format!("Error reading '{}': {}", path.display(), e),
        )
    })?;
    toml::from_slice(&data).map_err(|e| {
        (
            EX_CONFIG,
            format!("Error in config file at '{}': {}", path.display(), e),
        )
    })
}

/// Parse Unix seconds or an RFC 3339 timestamp.
fn parse_mtime(s: &str) -> Result<SystemTime, String> {
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(UNIX_EPOCH + Duration::from_secs(secs));
    }

    chrono::DateTime::parse_from_rfc3339(s)
        .map(SystemTime::from)
        .map_err(|e| format!("Bad --mtime '{}': {}", s, e))
}

// Paths from the index are absolute, so prefixes must be too
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_owned();
    }

    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_owned(),
    }
}

fn init_logging(verbose: u8, log_config: Option<&Path>) {
    if let Some(path) = log_config {
        if let Err(e) =
            log4rs::init_file(path, log4rs::file::Deserializers::new())
        {
            eprintln!("Error in log config at '{}': {}", path.display(), e);
            EX_CONFIG.exit();
        }
        return;
    }

    crate::init_simple_log(match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    });
}

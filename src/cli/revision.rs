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


use std::io::{self, Write};

use log::LevelFilter;

use super::main::RevisionSubcommand;
use crate::store::{Index, NotmuchIndex};
use crate::support::sysexits::*;

pub(super) fn main(cmd: RevisionSubcommand) {
    crate::init_simple_log(LevelFilter::Warn);

    let index = match NotmuchIndex::open(&cmd.database, false) {
        Ok(index) => index,
        Err(e) => {
            eprintln!("{}: {}", cmd.database.display(), e);
            e.exit_code().exit()
        },
    };

    if let Err(e) = print_revision(&index, &mut io::stdout()) {
        eprintln!("{}", e);
        EX_IOERR.exit();
    }
}

fn print_revision(index: &impl Index, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", index.revision())
}

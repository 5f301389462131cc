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

//! Keyword/tag reconciliation: turning header values into canonical tag
//! sets and back, comparing tag sets and checking that the files of a
//! message agree.

pub mod codec;
pub mod consistency;
pub mod diff;
pub mod tag_set;

pub use self::codec::Codec;
pub use self::diff::{diff, TagDelta};
pub use self::tag_set::TagSet;

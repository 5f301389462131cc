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

use super::tag_set::TagSet;
use crate::support::config::ChangePolicy;

/// The changes which turn one tag set into another.
///
/// `add` and `remove` are always disjoint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagDelta {
    pub add: TagSet,
    pub remove: TagSet,
}

/// Compute what must change for `current` to become `desired`.
pub fn diff(current: &TagSet, desired: &TagSet) -> TagDelta {
    TagDelta {
        add: desired.difference(current),
        remove: current.difference(desired),
    }
}

impl TagDelta {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Drop whichever half `policy` does not allow.
    pub fn restrict(self, policy: ChangePolicy) -> Self {
        TagDelta {
            add: if policy.allows_add() {
                self.add
            } else {
                TagSet::new()
            },
            remove: if policy.allows_remove() {
                self.remove
            } else {
                TagSet::new()
            },
        }
    }

    /// The result of applying this delta to `current`.
    pub fn apply(&self, current: &TagSet) -> TagSet {
        current.union(&self.add).difference(&self.remove)
    }
}

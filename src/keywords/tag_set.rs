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

use std::cmp::Ordering;
use std::fmt;
use std::iter::FromIterator;
use std::slice;

/// A set of tags in canonical form: sorted by byte value with no duplicates.
///
/// The set operations are linear merges and depend on both operands being
/// canonical. The only ways to build a `TagSet` are collecting from an
/// iterator, which canonicalises, and the set operations themselves, which
/// preserve the order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        TagSet(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Tags in `self` but not in `other`.
    pub fn difference(&self, other: &TagSet) -> TagSet {
        let mut out = Vec::with_capacity(self.len());
        let mut theirs = other.0.iter().peekable();
        for tag in &self.0 {
            while theirs.peek().map_or(false, |t| *t < tag) {
                theirs.next();
            }

            if theirs.peek() != Some(&tag) {
                out.push(tag.clone());
            }
        }

        TagSet::from_canonical(out)
    }

    /// Tags in either `self` or `other`.
    pub fn union(&self, other: &TagSet) -> TagSet {
        let mut out = Vec::with_capacity(self.len() + other.len());
        let mut mine = self.0.iter().peekable();
        let mut theirs = other.0.iter().peekable();
        loop {
            let next = match (mine.peek(), theirs.peek()) {
                (None, None) => break,
                (Some(_), None) => mine.next(),
                (None, Some(_)) => theirs.next(),
                (Some(a), Some(b)) => match a.cmp(b) {
                    Ordering::Less => mine.next(),
                    Ordering::Greater => theirs.next(),
                    Ordering::Equal => {
                        theirs.next();
                        mine.next()
                    },
                },
            };
            out.extend(next.cloned());
        }

        TagSet::from_canonical(out)
    }

    /// Join the tags with `sep`.
    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }

    fn from_canonical(tags: Vec<String>) -> Self {
        debug_assert!(is_canonical(&tags), "not canonical: {:?}", tags);
        TagSet(tags)
    }
}

fn is_canonical(tags: &[String]) -> bool {
    tags.windows(2).all(|w| w[0] < w[1])
}

impl FromIterator<String> for TagSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut tags = iter.into_iter().collect::<Vec<_>>();
        tags.sort();
        tags.dedup();
        TagSet(tags)
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(str::to_owned).collect()
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a String;
    type IntoIter = slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{{}}}", self.0.join(" "))
    }
}

#[cfg(test)]
pub(crate) fn tags(s: &[&str]) -> TagSet {
    s.iter().copied().collect()
}

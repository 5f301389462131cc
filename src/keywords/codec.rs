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

//! Conversion between `X-Keywords` header values and tag sets.
//!
//! Decoding runs, in order: modified UTF-7 decoding of the whole value,
//! splitting on ',' (and the legacy split patterns, if enabled),
//! canonicalisation, character replacement, keyword-to-tag mapping,
//! re-canonicalisation and finally removal of ignored tags. Encoding undoes
//! the mapping and replacement, sorts, joins with ',' and re-encodes.

use log::trace;
use regex::Regex;

use super::tag_set::TagSet;
use crate::mime::utf7;
use crate::support::config::TagRules;
use crate::support::error::Error;

#[derive(Clone, Debug)]
pub struct Codec {
    rules: TagRules,
    ignore: TagSet,
    split: Vec<Regex>,
}

impl Codec {
    pub fn new(mut rules: TagRules) -> Result<Self, Error> {
        rules.normalise();
        let split = if rules.legacy_split {
            rules
                .split_patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            vec![]
        };

        Ok(Codec {
            ignore: rules.ignore.iter().cloned().collect(),
            rules,
            split,
        })
    }

    /// The tags excluded from comparison.
    pub fn ignore(&self) -> &TagSet {
        &self.ignore
    }

    /// Whether `encode` can work at all.
    pub fn can_encode(&self) -> bool {
        self.split.is_empty()
    }

    /// Decode a raw header value into tags.
    ///
    /// Ignored tags are removed unless `unfiltered` is set.
    pub fn decode(&self, value: &str, unfiltered: bool) -> TagSet {
        let value = utf7::decode(value);

        let mut tokens = value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        for pattern in &self.split {
            tokens = tokens
                .iter()
                .flat_map(|t| pattern.split(t))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect();
        }

        let raw = tokens.into_iter().collect::<TagSet>();
        trace!("keywords: {}", raw);

        let mapped = raw
            .iter()
            .map(|keyword| self.keyword_to_tag(keyword))
            .collect::<TagSet>();
        trace!("keywords after map: {}", mapped);

        if unfiltered {
            mapped
        } else {
            mapped.difference(&self.ignore)
        }
    }

    /// Encode `tags` into a header value.
    pub fn encode(&self, tags: &TagSet) -> Result<String, Error> {
        if !self.can_encode() {
            return Err(Error::NonInvertibleSplit);
        }

        let keywords = tags
            .iter()
            .map(|tag| self.tag_to_keyword(tag))
            .collect::<TagSet>();
        Ok(utf7::encode(&keywords.join(",")).into_owned())
    }

    /// Whether `tag` comes back unchanged from being encoded and decoded.
    ///
    /// Tags containing ',', a replacement target or surrounding whitespace
    /// do not.
    pub fn round_trips(&self, tag: &str) -> bool {
        let alone = Some(tag).into_iter().collect::<TagSet>();
        match self.encode(&alone) {
            Ok(value) => self.decode(&value, true) == alone,
            Err(_) => false,
        }
    }

    fn keyword_to_tag(&self, keyword: &str) -> String {
        let replaced = self
            .rules
            .replace_chars
            .iter()
            .fold(keyword.to_owned(), |s, &(from, to)| {
                s.replace(from, to.encode_utf8(&mut [0u8; 4]))
            });

        self.rules
            .keyword_map
            .iter()
            .find(|(kw, _)| *kw == replaced)
            .map(|(_, tag)| tag.clone())
            .unwrap_or(replaced)
    }

    fn tag_to_keyword(&self, tag: &str) -> String {
        let keyword = self
            .rules
            .keyword_map
            .iter()
            .find(|(_, t)| t == tag)
            .map_or(tag, |(kw, _)| kw.as_str());

        self.rules
            .replace_chars
            .iter()
            .rev()
            .fold(keyword.to_owned(), |s, &(from, to)| {
                s.replace(to, from.encode_utf8(&mut [0u8; 4]))
            })
    }
}

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


//! An `Index` held entirely in memory, which records every mutation made
//! through it.
//!
//! Only the query forms a sync run produces are understood: `*`, `id:ID`
//! and `lastmod:LO..HI`, optionally followed by `and (QUERY)`.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use super::index::{Index, IndexedMessage};
use crate::keywords::TagSet;
use crate::support::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Add(String, String),
    Remove(String, String),
    MaildirFlags(String),
}

#[derive(Debug)]
struct Entry {
    id: String,
    paths: Vec<PathBuf>,
    tags: TagSet,
    lastmod: u64,
}

#[derive(Debug, Default)]
struct State {
    revision: u64,
    entries: Vec<Entry>,
    mutations: Vec<Mutation>,
    queries: Vec<String>,
    failing_tag: Option<String>,
}

impl State {
    fn entry_mut(&mut self, id: &str) -> &mut Entry {
        self.revision += 1;
        let revision = self.revision;
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .expect("no such message");
        entry.lastmod = revision;
        entry
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryIndex(Rc<RefCell<State>>);

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, paths: &[PathBuf], tags: &[&str]) {
        let mut state = self.0.borrow_mut();
        state.revision += 1;
        let lastmod = state.revision;
        state.entries.push(Entry {
            id: id.to_owned(),
            paths: paths.to_vec(),
            tags: tags.iter().copied().collect(),
            lastmod,
        });
    }

    pub fn tags(&self, id: &str) -> TagSet {
        self.0
            .borrow()
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.tags.clone())
            .expect("no such message")
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.0.borrow().mutations.clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.0.borrow().queries.clone()
    }

    /// Make every later attempt to add or remove `tag` fail.
    pub fn fail_on(&self, tag: &str) {
        self.0.borrow_mut().failing_tag = Some(tag.to_owned());
    }

    fn mutate(
        &self,
        id: &str,
        op: &'static str,
        tag: &str,
        mutation: Mutation,
    ) -> Result<(), Error> {
        let mut state = self.0.borrow_mut();
        if state.failing_tag.as_deref() == Some(tag) {
            return Err(Error::IndexMutation {
                id: id.to_owned(),
                op,
                tag: tag.to_owned(),
                source: notmuch::Error::UnspecifiedError,
            });
        }

        let entry = state.entry_mut(id);
        let change = Some(tag).into_iter().collect::<TagSet>();
        entry.tags = match mutation {
            Mutation::Add(..) => entry.tags.union(&change),
            _ => entry.tags.difference(&change),
        };
        state.mutations.push(mutation);
        Ok(())
    }
}

impl Index for MemoryIndex {
    type Message = MemoryMessage;

    fn revision(&self) -> u64 {
        self.0.borrow().revision
    }

    fn count(&self, query: &str) -> Result<u32, Error> {
        Ok(self.search(query)?.len() as u32)
    }

    fn search(&self, query: &str) -> Result<Vec<MemoryMessage>, Error> {
        self.0.borrow_mut().queries.push(query.to_owned());
        Ok(self
            .0
            .borrow()
            .entries
            .iter()
            .filter(|e| matches(e, query))
            .map(|e| MemoryMessage {
                id: e.id.clone(),
                index: self.clone(),
            })
            .collect())
    }
}

fn matches(entry: &Entry, query: &str) -> bool {
    if "*" == query {
        return true;
    }

    if let Some(id) = query.strip_prefix("id:") {
        return id == entry.id;
    }

    if let Some(rest) = query.strip_prefix("lastmod:") {
        let (range, inner) = match rest.find(" and (") {
            Some(ix) => (&rest[..ix], Some(&rest[ix + 6..rest.len() - 1])),
            None => (rest, None),
        };
        let mut bounds = range.splitn(2, "..").map(|b| b.parse::<u64>());
        let lo = bounds.next().unwrap().unwrap();
        let hi = bounds.next().unwrap().unwrap();
        return (lo..=hi).contains(&entry.lastmod)
            && inner.map_or(true, |q| matches(entry, q));
    }

    panic!("unsupported query: {}", query)
}

pub struct MemoryMessage {
    id: String,
    index: MemoryIndex,
}

impl IndexedMessage for MemoryMessage {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn paths(&self) -> Vec<PathBuf> {
        self.index
            .0
            .borrow()
            .entries
            .iter()
            .find(|e| e.id == self.id)
            .map(|e| e.paths.clone())
            .unwrap_or_default()
    }

    fn tags(&self) -> TagSet {
        self.index.tags(&self.id)
    }

    fn add_tag(&self, tag: &str) -> Result<(), Error> {
        self.index.mutate(
            &self.id,
            "add",
            tag,
            Mutation::Add(self.id.clone(), tag.to_owned()),
        )
    }

    fn remove_tag(&self, tag: &str) -> Result<(), Error> {
        self.index.mutate(
            &self.id,
            "remove",
            tag,
            Mutation::Remove(self.id.clone(), tag.to_owned()),
        )
    }

    fn sync_maildir_flags(&self) -> Result<(), Error> {
        let mut state = self.index.0.borrow_mut();
        state.entry_mut(&self.id);
        state.mutations.push(Mutation::MaildirFlags(self.id.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keywords::tag_set::tags;

    #[test]
    fn queries_and_mutations() {
        let index = MemoryIndex::new();
        index.insert("a", &[PathBuf::from("/a")], &["inbox"]);
        index.insert("b", &[PathBuf::from("/b")], &[]);
        assert_eq!(2, index.revision());
        assert_eq!(2, index.count("*").unwrap());
        assert_eq!(1, index.count("id:b").unwrap());
        assert_eq!(1, index.count("lastmod:2..2").unwrap());
        assert_eq!(0, index.count("lastmod:2..2 and (id:a)").unwrap());

        let a = index.search("id:a").unwrap().pop().unwrap();
        a.add_tag("work").unwrap();
        a.remove_tag("inbox").unwrap();
        assert_eq!(tags(&["work"]), index.tags("a"));
        assert_eq!(4, index.revision());
        assert_eq!(1, index.count("lastmod:3..4").unwrap());

        index.fail_on("x");
        assert_matches!(
            Err(Error::IndexMutation { op: "add", .. }),
            a.add_tag("x")
        );
        assert_eq!(
            vec![
                Mutation::Add("a".to_owned(), "work".to_owned()),
                Mutation::Remove("a".to_owned(), "inbox".to_owned()),
            ],
            index.mutations()
        );
    }
}

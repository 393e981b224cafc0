// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! In-memory phone book, used as the test fixture backend and as the
//! default storage when no filesystem tree is configured.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use crate::errors::PbapError;
use crate::vcard::{VCard, parse::parse};
use crate::vfolder::{
    PHONEBOOK_OBJECTS, Phonebook, SearchQuery, SortOrder, apply_query_and_sort, parent,
    strip_vcf,
};

#[derive(Debug, Default)]
struct Inner {
    /// Plain folders without records of their own.
    dirs: BTreeSet<String>,
    /// Object folders and their ordered records; the folder path doubles
    /// as the key of the `<name>.vcf` concatenation file.
    books: BTreeMap<String, Vec<VCard>>,
}

#[derive(Debug, Default)]
pub struct MemPhonebook {
    inner: RwLock<Inner>,
}

impl MemPhonebook {
    /// An empty phone book with the well-known folder skeleton: `telecom/`
    /// and `SIM1/telecom/`, each holding every phone-book object.
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for dir in ["/", "/telecom", "/SIM1", "/SIM1/telecom"] {
            inner.dirs.insert(dir.to_string());
        }
        for prefix in ["/telecom", "/SIM1/telecom"] {
            for object in PHONEBOOK_OBJECTS {
                inner.books.insert(format!("{prefix}/{object}"), Vec::new());
            }
        }
        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Parses and appends one record to the named object folder.
    pub fn insert_vcard(&self, book: &str, text: &str) -> Result<(), PbapError> {
        let record = parse(text)?;
        let mut inner = self.inner.write().expect("phonebook lock poisoned");
        inner
            .books
            .get_mut(book)
            .ok_or_else(|| PbapError::PathNotFound(book.to_string()))?
            .push(record);
        Ok(())
    }

    /// Seeds several `(book, vcard-text)` pairs at once.
    pub fn with_records(records: &[(&str, &str)]) -> Result<Self, PbapError> {
        let book = Self::new();
        for (path, text) in records {
            book.insert_vcard(path, text)?;
        }
        Ok(book)
    }

    fn file_index(path: &str) -> Option<(String, usize)> {
        let stripped = strip_vcf(path);
        if stripped == path {
            return None;
        }
        let dir = parent(path);
        let stem = stripped.rsplit('/').next()?;
        let index = stem.parse::<usize>().ok()?;
        Some((dir, index))
    }
}

impl Phonebook for MemPhonebook {
    fn exists(&self, path: &str) -> bool {
        self.isdir(path) || self.isfile(path)
    }

    fn isdir(&self, path: &str) -> bool {
        let inner = self.inner.read().expect("phonebook lock poisoned");
        inner.dirs.contains(path) || inner.books.contains_key(path)
    }

    fn isfile(&self, path: &str) -> bool {
        if !path.ends_with(".vcf") {
            return false;
        }
        let inner = self.inner.read().expect("phonebook lock poisoned");
        if inner.books.contains_key(strip_vcf(path)) {
            return true;
        }
        match Self::file_index(path) {
            Some((dir, index)) => {
                inner.books.get(&dir).is_some_and(|book| index < book.len())
            },
            None => false,
        }
    }

    fn makedirs(&self, path: &str) -> Result<(), PbapError> {
        let mut inner = self.inner.write().expect("phonebook lock poisoned");
        if inner.dirs.contains(path) || inner.books.contains_key(path) {
            return Err(PbapError::PathExists(path.to_string()));
        }
        inner.dirs.insert(path.to_string());
        Ok(())
    }

    fn listdir(
        &self,
        path: &str,
        query: Option<&SearchQuery>,
        sort: SortOrder,
    ) -> Result<Vec<VCard>, PbapError> {
        let inner = self.inner.read().expect("phonebook lock poisoned");
        if let Some(book) = inner.books.get(path) {
            return Ok(apply_query_and_sort(book.clone(), query, sort));
        }
        if inner.dirs.contains(path) {
            return Ok(Vec::new());
        }
        Err(PbapError::NotADirectory(path.to_string()))
    }

    fn read(&self, path: &str) -> Result<VCard, PbapError> {
        let inner = self.inner.read().expect("phonebook lock poisoned");
        // Whole-phonebook file: behaves like parsing the concatenation of
        // every record, which merges their properties into one card.
        if let Some(book) = inner.books.get(strip_vcf(path))
            && path.ends_with(".vcf")
        {
            let properties = book
                .iter()
                .flat_map(|record| record.properties.iter().cloned())
                .collect();
            return Ok(VCard { properties });
        }
        let (dir, index) = Self::file_index(path)
            .ok_or_else(|| PbapError::NotAFile(path.to_string()))?;
        inner
            .books
            .get(&dir)
            .and_then(|book| book.get(index))
            .cloned()
            .ok_or_else(|| PbapError::NotAFile(path.to_string()))
    }

    fn count(&self, path: &str) -> Result<usize, PbapError> {
        let inner = self.inner.read().expect("phonebook lock poisoned");
        if let Some(book) = inner.books.get(path) {
            return Ok(book.len());
        }
        if inner.dirs.contains(path) {
            let prefix = if path == "/" {
                "/".to_string()
            } else {
                format!("{path}/")
            };
            let children = inner
                .dirs
                .iter()
                .chain(inner.books.keys())
                .filter(|p| p.starts_with(prefix.as_str()) && parent(p.as_str()) == path)
                .count();
            return Ok(children);
        }
        Err(PbapError::NotADirectory(path.to_string()))
    }
}

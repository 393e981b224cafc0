// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Filesystem-backed phone book.
//!
//! The virtual tree maps one-to-one onto a directory tree below `rootdir`:
//! object folders hold `0.vcf`, `1.vcf`, … and the whole-phonebook
//! `<name>.vcf` files are real files next to them (a mirrored tree, as
//! produced by the PCE's `mirror_vfolder`, has exactly this shape).

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::PbapError;
use crate::vcard::{VCard, parse::parse};
use crate::vfolder::{Phonebook, SearchQuery, SortOrder, apply_query_and_sort};

#[derive(Debug, Clone)]
pub struct FsPhonebook {
    rootdir: PathBuf,
}

impl FsPhonebook {
    pub fn new(rootdir: impl Into<PathBuf>) -> Self {
        Self {
            rootdir: rootdir.into(),
        }
    }

    fn fs_path(&self, path: &str) -> PathBuf {
        self.rootdir.join(path.trim_start_matches('/'))
    }

    fn read_vcard(&self, path: &Path) -> Result<VCard, PbapError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PbapError::Storage(format!("{}: {e}", path.display())))?;
        parse(&text)
    }

    /// Entries of an object folder ordered by the numeric index in their
    /// file stem; anything else in the folder is skipped with a warning.
    fn indexed_entries(&self, dir: &Path) -> Result<Vec<PathBuf>, PbapError> {
        let mut entries: Vec<(u32, PathBuf)> = Vec::new();
        let iter = std::fs::read_dir(dir)
            .map_err(|e| PbapError::Storage(format!("{}: {e}", dir.display())))?;
        for entry in iter {
            let entry =
                entry.map_err(|e| PbapError::Storage(format!("{}: {e}", dir.display())))?;
            let path = entry.path();
            let index = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u32>().ok());
            match index {
                Some(index) => entries.push((index, path)),
                None => warn!("skipping non-indexed entry {}", path.display()),
            }
        }
        entries.sort_by_key(|(index, _)| *index);
        Ok(entries.into_iter().map(|(_, path)| path).collect())
    }
}

impl Phonebook for FsPhonebook {
    fn exists(&self, path: &str) -> bool {
        self.fs_path(path).exists()
    }

    fn isdir(&self, path: &str) -> bool {
        self.fs_path(path).is_dir()
    }

    fn isfile(&self, path: &str) -> bool {
        self.fs_path(path).is_file()
    }

    fn makedirs(&self, path: &str) -> Result<(), PbapError> {
        match std::fs::create_dir(self.fs_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(PbapError::PathExists(path.to_string()))
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PbapError::PathNotFound(path.to_string()))
            },
            Err(e) => Err(PbapError::Storage(e.to_string())),
        }
    }

    fn listdir(
        &self,
        path: &str,
        query: Option<&SearchQuery>,
        sort: SortOrder,
    ) -> Result<Vec<VCard>, PbapError> {
        if !self.isdir(path) {
            return Err(PbapError::NotADirectory(path.to_string()));
        }
        let mut records = Vec::new();
        for entry in self.indexed_entries(&self.fs_path(path))? {
            records.push(self.read_vcard(&entry)?);
        }
        Ok(apply_query_and_sort(records, query, sort))
    }

    fn read(&self, path: &str) -> Result<VCard, PbapError> {
        if !self.isfile(path) {
            return Err(PbapError::NotAFile(path.to_string()));
        }
        self.read_vcard(&self.fs_path(path))
    }

    fn count(&self, path: &str) -> Result<usize, PbapError> {
        if !self.isdir(path) {
            return Err(PbapError::NotADirectory(path.to_string()));
        }
        let dir = self.fs_path(path);
        let iter = std::fs::read_dir(&dir)
            .map_err(|e| PbapError::Storage(format!("{}: {e}", dir.display())))?;
        Ok(iter.count())
    }
}

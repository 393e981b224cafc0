// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Virtual phone-book folder architecture.
//!
//! The transaction engine sees storage only through the [`Phonebook`]
//! trait: a hierarchical namespace rooted at `/` with the well-known
//! `telecom/` and `SIM1/telecom/` folders, where every phone-book object
//! (`pb`, call histories, speed dial, favorites) appears both as a
//! listable folder of individual vCards and as a `<name>.vcf`
//! concatenation file.

pub mod fs;
pub mod mem;

use crate::errors::PbapError;
use crate::vcard::VCard;

/// Object names that exist both as a folder and as a whole-phonebook file.
pub const PHONEBOOK_OBJECTS: [&str; 7] = ["pb", "ich", "och", "mch", "cch", "spd", "fav"];

/// Record-level search of a listing request: matches records carrying a
/// property of the given attribute name with an exactly equal value slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub attribute: String,
    pub value: String,
}

impl SearchQuery {
    pub fn matches(&self, record: &VCard) -> bool {
        let attribute = self.attribute.to_ascii_uppercase();
        record
            .properties
            .iter()
            .any(|p| p.name == attribute && p.values.iter().any(|v| *v == self.value))
    }
}

/// Listing order. `Indexed` keeps the stable backing order; the other two
/// sort by the joined `N` / `SOUND` value, records missing the key last.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Indexed,
    Alphanumeric,
    Phonetical,
}

/// Narrow storage capability consumed by the transaction engine. All paths
/// are absolute normalized virtual paths.
pub trait Phonebook {
    /// True iff the path names a folder or a stored vCard.
    fn exists(&self, path: &str) -> bool;

    /// True iff the path is a folder.
    fn isdir(&self, path: &str) -> bool;

    /// True iff the path names an individual vCard (`<index>.vcf` with the
    /// index in range) or a whole-phonebook file (`pb.vcf` and friends).
    fn isfile(&self, path: &str) -> bool;

    /// Creates the folder; fails with `PathExists` when it is already
    /// there (atomic create-or-fail).
    fn makedirs(&self, path: &str) -> Result<(), PbapError>;

    /// Ordered records under a folder, search and sort applied.
    fn listdir(
        &self,
        path: &str,
        query: Option<&SearchQuery>,
        sort: SortOrder,
    ) -> Result<Vec<VCard>, PbapError>;

    /// A single record; for an `<index>.vcf` path this is the record at
    /// that position of the underlying sequence.
    fn read(&self, path: &str) -> Result<VCard, PbapError>;

    /// Number of records under the folder.
    fn count(&self, path: &str) -> Result<usize, PbapError>;
}

/// Path concatenation returning an absolute normalized path. An absolute
/// `name` replaces `base`; `..` segments walk up and stop at the root.
pub fn join(base: &str, name: &str) -> String {
    let combined = if name.starts_with('/') {
        name.to_string()
    } else if name.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{name}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in combined.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Parent folder of an absolute normalized path (the root is its own
/// parent).
pub fn parent(path: &str) -> String {
    join(path, "..")
}

/// True when any path component names the given folder, with or without a
/// `.vcf` suffix — `/telecom/mch` and `/telecom/mch.vcf` both contain the
/// `mch` component.
pub fn contains_component(path: &str, component: &str) -> bool {
    path.split('/')
        .any(|part| part == component || part.strip_suffix(".vcf") == Some(component))
}

/// Strips a `.vcf` suffix; the result keys the folder backing a
/// whole-phonebook file.
pub fn strip_vcf(path: &str) -> &str {
    path.strip_suffix(".vcf").unwrap_or(path)
}

/// Shared search + ordering applied by the backends after fetching.
pub(crate) fn apply_query_and_sort(
    mut records: Vec<VCard>,
    query: Option<&SearchQuery>,
    sort: SortOrder,
) -> Vec<VCard> {
    if let Some(query) = query {
        records.retain(|record| query.matches(record));
    }
    match sort {
        SortOrder::Indexed => {},
        SortOrder::Alphanumeric => sort_by_joined(&mut records, "N"),
        SortOrder::Phonetical => sort_by_joined(&mut records, "SOUND"),
    }
    records
}

fn sort_by_joined(records: &mut [VCard], key: &str) {
    records.sort_by_key(|record| {
        let joined = record.joined_value(key);
        (joined.is_none(), joined)
    });
}

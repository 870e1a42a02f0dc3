// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed view over the hash fields of Secret and File Records.

use crate::error::ShareError;
use crate::storage::{
    FieldSet, FIELD_DELETABLE, FIELD_PROVIDED, FIELD_PROVIDED_KEY, FIELD_TOKEN, FIELD_VIEWS,
    FIELD_VIEWS_COUNT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Record {
    pub ciphertext: Vec<u8>,
    pub views_allowed: i64,
    pub views_consumed: i64,
    pub deletable: bool,
    /// File Records only: the depositor chose the download password.
    pub password_provided: bool,
    /// File Records only: storage key of the linked Secret Record.
    pub linked_key: Option<String>,
}

impl Record {
    pub fn secret(ciphertext: Vec<u8>, views: u32, deletable: bool) -> Self {
        Self {
            ciphertext,
            views_allowed: i64::from(views),
            views_consumed: 0,
            deletable,
            password_provided: false,
            linked_key: None,
        }
    }

    pub fn file(
        ciphertext: Vec<u8>,
        views: u32,
        deletable: bool,
        linked_key: Option<String>,
    ) -> Self {
        Self {
            password_provided: linked_key.is_some(),
            linked_key,
            ..Self::secret(ciphertext, views, deletable)
        }
    }

    /// Parse a stored field set.
    ///
    /// A record without ciphertext is treated as absent: a concurrent reveal
    /// may have deleted it, and a stray field write may have recreated the
    /// key without its payload.
    pub fn from_fields(fields: &FieldSet) -> Result<Self, ShareError> {
        let ciphertext = match fields.bytes(FIELD_TOKEN) {
            Some(bytes) if !bytes.is_empty() => bytes.to_vec(),
            _ => return Err(ShareError::NotFound),
        };

        let password_provided = fields.flag(FIELD_PROVIDED);
        let linked_key = if password_provided {
            fields
                .text(FIELD_PROVIDED_KEY)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        Ok(Self {
            ciphertext,
            views_allowed: fields.int(FIELD_VIEWS).unwrap_or(1).max(1),
            views_consumed: fields.int(FIELD_VIEWS_COUNT).unwrap_or(0).max(0),
            deletable: fields.flag(FIELD_DELETABLE),
            password_provided,
            linked_key,
        })
    }

    pub fn to_fields(&self, with_file_fields: bool) -> FieldSet {
        let fields = FieldSet::new()
            .with_bytes(FIELD_TOKEN, self.ciphertext.clone())
            .with_int(FIELD_VIEWS, self.views_allowed)
            .with_int(FIELD_VIEWS_COUNT, self.views_consumed)
            .with_bool(FIELD_DELETABLE, self.deletable);

        if !with_file_fields {
            return fields;
        }
        let fields = fields.with_bool(FIELD_PROVIDED, self.password_provided);
        match &self.linked_key {
            Some(key) => fields.with_bytes(FIELD_PROVIDED_KEY, key.as_str()),
            None => fields,
        }
    }

    pub fn views_remaining(&self) -> i64 {
        (self.views_allowed - self.views_consumed).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_fields_round_trip() {
        let record = Record::secret(b"sealed".to_vec(), 3, true);
        let fields = record.to_fields(false);
        assert_eq!(fields.bytes(FIELD_PROVIDED), None);
        assert_eq!(Record::from_fields(&fields).unwrap(), record);
    }

    #[test]
    fn file_fields_carry_linked_key() {
        let record = Record::file(b"sealed".to_vec(), 2, false, Some("linked".to_string()));
        assert!(record.password_provided);

        let fields = record.to_fields(true);
        assert!(fields.flag(FIELD_PROVIDED));
        assert_eq!(fields.text(FIELD_PROVIDED_KEY), Some("linked"));
        assert_eq!(Record::from_fields(&fields).unwrap(), record);
    }

    #[test]
    fn file_without_password_has_no_linked_key() {
        let fields = Record::file(b"sealed".to_vec(), 1, true, None).to_fields(true);
        assert!(!fields.flag(FIELD_PROVIDED));
        assert_eq!(fields.bytes(FIELD_PROVIDED_KEY), None);
    }

    #[test]
    fn empty_ciphertext_reads_as_not_found() {
        let fields = FieldSet::new().with_int(FIELD_VIEWS_COUNT, 2);
        assert!(matches!(
            Record::from_fields(&fields),
            Err(ShareError::NotFound)
        ));

        let fields = FieldSet::new().with_bytes(FIELD_TOKEN, Vec::new());
        assert!(matches!(
            Record::from_fields(&fields),
            Err(ShareError::NotFound)
        ));
    }

    #[test]
    fn remaining_views_never_negative() {
        let mut record = Record::secret(b"x".to_vec(), 2, false);
        record.views_consumed = 5;
        assert_eq!(record.views_remaining(), 0);
    }
}

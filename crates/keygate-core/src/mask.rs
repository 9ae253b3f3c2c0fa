//! Field-presence masks
//!
//! Update and query requests say which fields the caller supplied through a
//! bitmask whose bit assignment is fixed on the wire. Inside the crate the
//! mask is an ordered set of field values; bits only appear at the boundary
//! via [`FieldMask::to_bits`] and [`FieldMask::from_bits`].

use crate::{KeygateError, Result};
use std::collections::BTreeSet;
use std::fmt;

/// A field that can be flagged in a [`FieldMask`]
pub trait MaskField: Copy + Ord + fmt::Debug + 'static {
    /// Every field, in bit order
    const ALL: &'static [Self];

    /// The field's wire bit (a distinct power of two)
    fn bit(self) -> u32;
}

/// Set of fields explicitly supplied by a caller
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldMask<F: MaskField> {
    fields: BTreeSet<F>,
}

impl<F: MaskField> FieldMask<F> {
    /// Empty mask
    pub fn new() -> Self {
        Self {
            fields: BTreeSet::new(),
        }
    }

    /// Flag `field`
    pub fn insert(&mut self, field: F) {
        self.fields.insert(field);
    }

    /// Whether `field` is flagged
    pub fn contains(&self, field: F) -> bool {
        self.fields.contains(&field)
    }

    /// Whether no field is flagged
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flagged fields in bit order
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        self.fields.iter().copied()
    }

    /// Wire form
    pub fn to_bits(&self) -> u32 {
        self.fields.iter().fold(0, |acc, f| acc | f.bit())
    }

    /// Parse the wire form, rejecting bits with no assigned field
    pub fn from_bits(bits: u32) -> Result<Self> {
        let known = F::ALL.iter().fold(0u32, |acc, f| acc | f.bit());
        let unknown = bits & !known;
        if unknown != 0 {
            return Err(KeygateError::invalid_argument(format!(
                "unknown field mask bits: {unknown:#x}"
            )));
        }
        Ok(F::ALL.iter().copied().filter(|f| bits & f.bit() != 0).collect())
    }
}

impl<F: MaskField> Default for FieldMask<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: MaskField> FromIterator<F> for FieldMask<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<F: MaskField> fmt::Debug for FieldMask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.fields.iter()).finish()
    }
}

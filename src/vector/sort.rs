//! Document-id remapping for sorted segment flushes.

use crate::error::{PilumError, Result};
use crate::vector::field::DocsWithField;

/// Mapping between document ids before and after a segment sort.
pub trait DocMap: Send + Sync + std::fmt::Debug {
    /// New id of the document whose id was `old_doc` before sorting.
    fn old_to_new(&self, old_doc: u32) -> u32;

    /// Old id of the document whose id is `new_doc` after sorting.
    fn new_to_old(&self, new_doc: u32) -> u32;

    /// Number of documents covered by the mapping.
    fn size(&self) -> usize;
}

/// A [`DocMap`] backed by an explicit permutation.
#[derive(Debug, Clone)]
pub struct PermutationDocMap {
    old_to_new: Vec<u32>,
    new_to_old: Vec<u32>,
}

impl PermutationDocMap {
    /// Build a mapping from `new_to_old[new_doc] = old_doc`.
    ///
    /// Fails unless the input is a permutation of `0..len`.
    pub fn new(new_to_old: Vec<u32>) -> Result<Self> {
        let mut old_to_new = vec![u32::MAX; new_to_old.len()];
        for (new_doc, &old_doc) in new_to_old.iter().enumerate() {
            let slot = old_to_new.get_mut(old_doc as usize).ok_or_else(|| {
                PilumError::invalid_argument(format!(
                    "old doc {old_doc} out of range for {} documents",
                    new_to_old.len()
                ))
            })?;
            if *slot != u32::MAX {
                return Err(PilumError::invalid_argument(format!(
                    "old doc {old_doc} mapped twice"
                )));
            }
            *slot = new_doc as u32;
        }
        Ok(PermutationDocMap {
            old_to_new,
            new_to_old,
        })
    }

    /// The mapping that reverses the order of `size` documents.
    pub fn reversed(size: usize) -> Self {
        let new_to_old: Vec<u32> = (0..size as u32).rev().collect();
        PermutationDocMap {
            old_to_new: new_to_old.clone(),
            new_to_old,
        }
    }
}

impl DocMap for PermutationDocMap {
    fn old_to_new(&self, old_doc: u32) -> u32 {
        self.old_to_new[old_doc as usize]
    }

    fn new_to_old(&self, new_doc: u32) -> u32 {
        self.new_to_old[new_doc as usize]
    }

    fn size(&self) -> usize {
        self.new_to_old.len()
    }
}

/// Ordinal permutation induced by a [`DocMap`] over the documents that have a value.
#[derive(Debug, Clone)]
pub struct OrdMapping {
    /// `old_to_new_ord[old_ord]` is the ordinal after sorting.
    pub old_to_new_ord: Vec<usize>,
    /// `new_to_old_ord[new_ord]` is the ordinal before sorting.
    pub new_to_old_ord: Vec<usize>,
    /// Documents with a value, in new doc-id space.
    pub new_docs_with_field: DocsWithField,
}

/// Compute the ordinal permutation that sorting imposes on `docs`.
///
/// The n-th document of `docs` has old ordinal n; its new ordinal is its rank
/// among the remapped ids.
pub fn map_old_ord_to_new_ord(docs: &DocsWithField, sort_map: &dyn DocMap) -> Result<OrdMapping> {
    let mut pairs: Vec<(u32, usize)> = docs
        .iter()
        .enumerate()
        .map(|(old_ord, old_doc)| (sort_map.old_to_new(old_doc), old_ord))
        .collect();
    pairs.sort_unstable_by_key(|&(new_doc, _)| new_doc);

    let mut old_to_new_ord = vec![0; pairs.len()];
    let mut new_to_old_ord = Vec::with_capacity(pairs.len());
    let mut new_docs_with_field = DocsWithField::new();
    for (new_ord, &(new_doc, old_ord)) in pairs.iter().enumerate() {
        old_to_new_ord[old_ord] = new_ord;
        new_to_old_ord.push(old_ord);
        // A duplicate new id means the map is not a bijection.
        new_docs_with_field.add(new_doc)?;
    }

    debug_assert_eq!(new_docs_with_field.cardinality(), docs.cardinality());

    Ok(OrdMapping {
        old_to_new_ord,
        new_to_old_ord,
        new_docs_with_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(ids: &[u32]) -> DocsWithField {
        let mut docs = DocsWithField::new();
        for &id in ids {
            docs.add(id).unwrap();
        }
        docs
    }

    #[test]
    fn test_permutation_doc_map() {
        let map = PermutationDocMap::new(vec![2, 0, 1]).unwrap();
        assert_eq!(map.size(), 3);
        assert_eq!(map.new_to_old(0), 2);
        assert_eq!(map.old_to_new(2), 0);
        assert_eq!(map.old_to_new(0), 1);
    }

    #[test]
    fn test_permutation_doc_map_rejects_non_bijection() {
        assert!(PermutationDocMap::new(vec![0, 0]).is_err());
        assert!(PermutationDocMap::new(vec![0, 5]).is_err());
    }

    #[test]
    fn test_reverse_mapping() {
        let map = PermutationDocMap::reversed(4);
        let mapping = map_old_ord_to_new_ord(&docs(&[0, 1, 2, 3]), &map).unwrap();

        assert_eq!(mapping.new_to_old_ord, vec![3, 2, 1, 0]);
        assert_eq!(mapping.old_to_new_ord, vec![3, 2, 1, 0]);
        assert_eq!(
            mapping.new_docs_with_field.iter().collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn test_sparse_docs_mapping() {
        // Docs 1 and 4 have values; reversing 5 docs sends them to 3 and 0.
        let map = PermutationDocMap::reversed(5);
        let mapping = map_old_ord_to_new_ord(&docs(&[1, 4]), &map).unwrap();

        assert_eq!(mapping.new_to_old_ord, vec![1, 0]);
        assert_eq!(
            mapping.new_docs_with_field.iter().collect::<Vec<_>>(),
            vec![0, 3]
        );
    }
}

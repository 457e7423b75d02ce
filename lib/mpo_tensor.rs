//! Site tensors of a matrix product operator.
//!
//! An [`MPOTensor`] is a sparse `row_dim × col_dim` array over auxiliary
//! (MPO bond) indices `(b1, b2)`. Each occupied entry is an [`MPOTerm`]: an
//! operator on the physical basis, stored as a [`BlockMatrix`] with rows
//! indexed by the outgoing (bra) physical charge and columns by the incoming
//! (ket) physical charge, together with a scalar prefactor.

use std::collections::{ BTreeMap, BTreeSet };
use thiserror::Error;
use crate::{ block_matrix::BlockMatrix, dense::DenseBlock, symmetry::SymmGroup };

#[derive(Debug, Error)]
pub enum MPOError {
    /// Returned when attempting to set an entry outside the auxiliary
    /// dimensions.
    #[error("error in MPO tensor access: ({0}, {1}) out of bounds for dimensions ({2}, {3})")]
    OutOfBounds(usize, usize, usize, usize),
}
use MPOError::*;
pub type MPOResult<T> = Result<T, MPOError>;

/// A single scaled operator in an [`MPOTensor`].
#[derive(Clone, Debug)]
pub struct MPOTerm<M: DenseBlock, S: SymmGroup> {
    pub op: BlockMatrix<M, S>,
    pub scale: M::Elem,
}

/// A sparse array of operators on a single site.
#[derive(Clone, Debug)]
pub struct MPOTensor<M: DenseBlock, S: SymmGroup> {
    row_dim: usize,
    col_dim: usize,
    terms: BTreeMap<(usize, usize), MPOTerm<M, S>>,
    // column-major keys `(b2, b1)` of `terms`
    by_col: BTreeSet<(usize, usize)>,
}

impl<M, S> MPOTensor<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    /// Create a new, empty tensor with auxiliary dimensions
    /// `row_dim × col_dim`.
    pub fn new(row_dim: usize, col_dim: usize) -> Self {
        Self {
            row_dim,
            col_dim,
            terms: BTreeMap::new(),
            by_col: BTreeSet::new(),
        }
    }

    /// Return the left auxiliary dimension.
    pub fn row_dim(&self) -> usize { self.row_dim }

    /// Return the right auxiliary dimension.
    pub fn col_dim(&self) -> usize { self.col_dim }

    /// Return the number of occupied entries.
    pub fn n_terms(&self) -> usize { self.terms.len() }

    /// Set the entry at `(b1, b2)`, returning the previous one if present.
    ///
    /// Fails if `(b1, b2)` is out of bounds.
    pub fn set(&mut self, b1: usize, b2: usize, op: BlockMatrix<M, S>, scale: M::Elem)
        -> MPOResult<Option<MPOTerm<M, S>>>
    {
        if b1 >= self.row_dim || b2 >= self.col_dim {
            return Err(OutOfBounds(b1, b2, self.row_dim, self.col_dim));
        }
        self.by_col.insert((b2, b1));
        Ok(self.terms.insert((b1, b2), MPOTerm { op, scale }))
    }

    /// Remove and return the entry at `(b1, b2)`, if present.
    pub fn remove(&mut self, b1: usize, b2: usize) -> Option<MPOTerm<M, S>> {
        self.by_col.remove(&(b2, b1));
        self.terms.remove(&(b1, b2))
    }

    /// Return the entry at `(b1, b2)`, if present.
    pub fn at(&self, b1: usize, b2: usize) -> Option<&MPOTerm<M, S>> {
        self.terms.get(&(b1, b2))
    }

    /// Return `true` if the entry at `(b1, b2)` is occupied.
    pub fn has(&self, b1: usize, b2: usize) -> bool {
        self.terms.contains_key(&(b1, b2))
    }

    /// Return an iterator over all occupied entries in row-major order.
    ///
    /// The iterator item type is `(usize, usize, &MPOTerm<M, S>)`.
    pub fn iter(&self)
        -> impl Iterator<Item = (usize, usize, &MPOTerm<M, S>)> + '_
    {
        self.terms.iter().map(|((b1, b2), t)| (*b1, *b2, t))
    }

    /// Return an iterator over the occupied entries of column `b2`, as
    /// `(b1, term)` pairs in increasing `b1`.
    pub fn column(&self, b2: usize)
        -> impl Iterator<Item = (usize, &MPOTerm<M, S>)> + '_
    {
        self.by_col.range((b2, 0)..(b2 + 1, 0))
            .filter_map(move |(_, b1)| {
                self.terms.get(&(*b1, b2)).map(|t| (*b1, t))
            })
    }

    /// Return an iterator over the occupied entries of row `b1`, as
    /// `(b2, term)` pairs in increasing `b2`.
    pub fn row(&self, b1: usize)
        -> impl Iterator<Item = (usize, &MPOTerm<M, S>)> + '_
    {
        self.terms.range((b1, 0)..(b1 + 1, 0))
            .map(|((_, b2), t)| (*b2, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray as nd;
    use crate::{ algorithms::identity_matrix, index::Index, symmetry::U1 };

    type W = MPOTensor<nd::Array2<f64>, U1>;

    #[test]
    fn sparse_entries() {
        let phys: Index<U1> = Index::from_parts([1, 0], [1, 1]).unwrap();
        let id: BlockMatrix<nd::Array2<f64>, U1> = identity_matrix(&phys);
        let mut w: W = MPOTensor::new(2, 3);
        assert!(w.set(0, 0, id.clone(), 1.0).unwrap().is_none());
        w.set(0, 2, id.clone(), 2.0).unwrap();
        w.set(1, 2, id.clone(), 3.0).unwrap();
        assert!(matches!(
            w.set(2, 0, id.clone(), 1.0),
            Err(OutOfBounds(2, 0, 2, 3)),
        ));
        assert_eq!(w.n_terms(), 3);
        assert!(w.has(0, 2));
        assert!(!w.has(1, 0));
        assert_eq!(w.at(1, 2).unwrap().scale, 3.0);
        assert_eq!(
            w.column(2).map(|(b1, t)| (b1, t.scale)).collect::<Vec<_>>(),
            vec![(0, 2.0), (1, 3.0)],
        );
        assert_eq!(
            w.row(0).map(|(b2, t)| (b2, t.scale)).collect::<Vec<_>>(),
            vec![(0, 1.0), (2, 2.0)],
        );
        assert_eq!(w.column(1).count(), 0);
        assert!(w.remove(0, 0).is_some());
        assert_eq!(w.row(0).count(), 1);
        assert_eq!(w.column(0).count(), 0);

        // overwriting an entry keeps a single column entry
        w.set(1, 2, id.clone(), 4.0).unwrap();
        assert_eq!(
            w.column(2).map(|(b1, t)| (b1, t.scale)).collect::<Vec<_>>(),
            vec![(0, 2.0), (1, 4.0)],
        );
        assert!(w.remove(0, 2).is_some());
        assert_eq!(
            w.column(2).map(|(b1, t)| (b1, t.scale)).collect::<Vec<_>>(),
            vec![(1, 4.0)],
        );
    }
}

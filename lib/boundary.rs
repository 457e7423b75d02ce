//! Environments of a partially contracted chain.
//!
//! A [`Boundary`] holds one [`BlockMatrix`] for each value of an auxiliary
//! (MPO bond) index. In a left boundary `L[b]`, rows run over the bra bond
//! and columns over the ket bond; in a right boundary `R[b]`, rows run over
//! the ket bond and columns over the bra bond.

use std::ops;
use crate::{
    block_matrix::BlockMatrix,
    dense::DenseBlock,
    index::Index,
    symmetry::SymmGroup,
};

/// A vector of block matrices indexed by an auxiliary index.
#[derive(Clone, Debug)]
pub struct Boundary<M, S: SymmGroup> {
    data: Vec<BlockMatrix<M, S>>,
}

impl<M, S: SymmGroup> Boundary<M, S> {
    /// Create a new boundary of `aux_dim` empty block matrices.
    pub fn new(aux_dim: usize) -> Self {
        Self { data: (0..aux_dim).map(|_| BlockMatrix::new()).collect() }
    }

    /// Create a new boundary from a list of block matrices.
    pub fn from_vec(data: Vec<BlockMatrix<M, S>>) -> Self { Self { data } }

    /// Return the auxiliary dimension.
    pub fn aux_dim(&self) -> usize { self.data.len() }

    /// Change the auxiliary dimension, dropping trailing entries or appending
    /// empty ones.
    pub fn resize(&mut self, aux_dim: usize) {
        self.data.resize_with(aux_dim, BlockMatrix::new);
    }

    /// Return an iterator over all entries.
    pub fn iter(&self) -> std::slice::Iter<'_, BlockMatrix<M, S>> {
        self.data.iter()
    }

    /// Return an iterator over mutable references to all entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, BlockMatrix<M, S>> {
        self.data.iter_mut()
    }

    /// Consume `self`, returning the entries.
    pub fn into_vec(self) -> Vec<BlockMatrix<M, S>> { self.data }
}

impl<M, S> Boundary<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    /// Create a new boundary of `aux_dim` entries, all empty except for
    /// `slot`, which holds the identity on `basis`.
    ///
    /// This is the boundary closing off the end of a chain whose outermost
    /// bond has basis `basis`.
    ///
    /// *Panics* if `slot >= aux_dim`.
    pub fn edge(basis: &Index<S>, aux_dim: usize, slot: usize) -> Self {
        let mut new = Self::new(aux_dim);
        new.data[slot] = BlockMatrix::identity(basis);
        new
    }

    /// Return the total number of stored elements across all entries.
    pub fn num_elements(&self) -> usize {
        self.data.iter().map(|m| m.num_elements()).sum()
    }
}

impl<M, S: SymmGroup> ops::Index<usize> for Boundary<M, S> {
    type Output = BlockMatrix<M, S>;

    fn index(&self, b: usize) -> &Self::Output { &self.data[b] }
}

impl<M, S: SymmGroup> ops::IndexMut<usize> for Boundary<M, S> {
    fn index_mut(&mut self, b: usize) -> &mut Self::Output { &mut self.data[b] }
}

impl<M, S: SymmGroup> FromIterator<BlockMatrix<M, S>> for Boundary<M, S> {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = BlockMatrix<M, S>>
    {
        Self { data: iter.into_iter().collect() }
    }
}

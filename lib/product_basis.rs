//! Offsets of sub-sectors within a fused basis.
//!
//! Fusing two bases `b1` and `b2` merges every pair of sectors `(c1, c2)`
//! into the sector of charge `f(c1, c2)`. Within a fused sector, the
//! contributing pairs are laid out contiguously, `b1` outer and `b2` inner,
//! with each pair occupying `dim(c1) * dim(c2)` consecutive positions.
//! [`ProductBasis`] records where each pair begins.
//!
//! Within the sub-block of a pair `(c1, c2)`, element `(i1, i2)` sits at
//! `offset(c1, c2) + i1 * dim(c2) + i2`.

use rustc_hash::FxHashMap;
use crate::{ index::Index, symmetry::SymmGroup };

/// Offset table for the fusion of two bases.
#[derive(Clone, Debug)]
pub struct ProductBasis<S: SymmGroup> {
    offsets: FxHashMap<(S::Charge, S::Charge), usize>,
    basis: Index<S>,
}

impl<S: SymmGroup> ProductBasis<S> {
    /// Build the offset table for `b1 ⊗ b2` under the group's fusion rule.
    ///
    /// The fused basis is identical to `b1.fuse(b2)`.
    pub fn new(b1: &Index<S>, b2: &Index<S>) -> Self {
        Self::with_fuse(b1, b2, S::fuse)
    }

    /// Build the offset table where sectors pair to
    /// `S::fuse(S::invert(c1), c2)`.
    ///
    /// This is the pairing of a physical basis with a right bond basis in a
    /// right-paired site tensor.
    pub fn conjugate(b1: &Index<S>, b2: &Index<S>) -> Self {
        Self::with_fuse(b1, b2, |c1, c2| S::fuse(S::invert(c1), c2))
    }

    /// Build the offset table under an arbitrary fusion rule.
    pub fn with_fuse<F>(b1: &Index<S>, b2: &Index<S>, f: F) -> Self
    where F: Fn(S::Charge, S::Charge) -> S::Charge
    {
        let mut offsets: FxHashMap<(S::Charge, S::Charge), usize>
            = FxHashMap::default();
        let mut sizes: FxHashMap<S::Charge, usize> = FxHashMap::default();
        for (c1, d1) in b1.iter() {
            for (c2, d2) in b2.iter() {
                let pc = f(c1, c2);
                let size = sizes.entry(pc).or_insert(0);
                offsets.insert((c1, c2), *size);
                *size += d1 * d2;
            }
        }
        let basis: Index<S> = sizes.into_iter().collect();
        Self { offsets, basis }
    }

    /// Return the offset at which the pair `(c1, c2)` begins in its fused
    /// sector, if both charges belong to the factor bases.
    pub fn offset(&self, c1: &S::Charge, c2: &S::Charge) -> Option<usize> {
        self.offsets.get(&(*c1, *c2)).copied()
    }

    /// Return the total size of the fused sector `pc`, if present.
    pub fn size(&self, pc: &S::Charge) -> Option<usize> {
        self.basis.size_of(pc)
    }

    /// Return the fused basis, sorted in descending order by charge.
    pub fn basis(&self) -> &Index<S> { &self.basis }

    /// Consume `self`, returning only the fused basis.
    pub fn into_basis(self) -> Index<S> { self.basis }
}

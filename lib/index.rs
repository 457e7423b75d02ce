//! Charge-sector decompositions of vector spaces.
//!
//! An [`Index`] is an ordered list of `(charge, size)` pairs: the space it
//! describes is the direct sum of one sector of dimension `size` for each
//! charge. Charges within an `Index` are unique.
//!
//! ```
//! use symm_blocks::{ index::Index, symmetry::U1 };
//!
//! let phys: Index<U1> = Index::from_parts([1, 0], [1, 1]).unwrap();
//! let bond: Index<U1> = Index::from_parts([1, 0, -1], [2, 3, 1]).unwrap();
//! let fused = &phys * &bond;
//! assert_eq!(fused.total_dim(), phys.total_dim() * bond.total_dim());
//! assert_eq!(fused.size_of(&1), Some(2 + 3));
//! ```

use std::{ fmt, ops::Mul };
use itertools::Itertools;
use rustc_hash::FxHashMap;
use thiserror::Error;
use crate::symmetry::SymmGroup;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Returned when bulk-constructing an `Index` from charge and size lists
    /// of different lengths.
    #[error("error in index creation: {0} charges but {1} sizes")]
    LengthMismatch(usize, usize),

    /// Returned when attempting to add a charge already present in an
    /// `Index`.
    #[error("error in index insertion: duplicate charge {0}")]
    DuplicateCharge(String),

    /// Returned when a positional insertion is past the end of an `Index`.
    #[error("error in index insertion: position {0} out of bounds for length {1}")]
    OutOfBounds(usize, usize),
}
use IndexError::*;
pub type IndexResult<T> = Result<T, IndexError>;

/// A charge sector decomposition of a vector space.
///
/// Entries are stored in a caller-determined order: [`Index::insert`] keeps
/// descending order by charge, while [`Index::insert_at`] places an entry at
/// an explicit position. Look-up by charge goes through a hash map of
/// positions maintained alongside the entries.
#[derive(Clone)]
pub struct Index<S: SymmGroup> {
    entries: Vec<(S::Charge, usize)>,
    positions: FxHashMap<S::Charge, usize>,
}

impl<S: SymmGroup> Default for Index<S> {
    fn default() -> Self { Self::new() }
}

impl<S: SymmGroup> PartialEq for Index<S> {
    fn eq(&self, other: &Self) -> bool { self.entries == other.entries }
}

impl<S: SymmGroup> Eq for Index<S> { }

impl<S: SymmGroup> fmt::Debug for Index<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index(")?;
        f.debug_list().entries(self.entries.iter()).finish()?;
        write!(f, ")")
    }
}

impl<S: SymmGroup> fmt::Display for Index<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.entries.len();
        write!(f, "[")?;
        for (k, (c, d)) in self.entries.iter().enumerate() {
            write!(f, "{:?}:{}", c, d)?;
            if k < n - 1 { write!(f, ", ")?; }
        }
        write!(f, "]")
    }
}

impl<S: SymmGroup> Index<S> {
    /// Create a new, empty `Index`.
    pub fn new() -> Self {
        Self { entries: Vec::new(), positions: FxHashMap::default() }
    }

    /// Create a new `Index` from parallel lists of charges and sizes, sorted
    /// in descending order by charge.
    ///
    /// Fails if the lists have different lengths or a charge is repeated.
    pub fn from_parts<I, J>(charges: I, sizes: J) -> IndexResult<Self>
    where
        I: IntoIterator<Item = S::Charge>,
        J: IntoIterator<Item = usize>,
    {
        let charges: Vec<S::Charge> = charges.into_iter().collect();
        let sizes: Vec<usize> = sizes.into_iter().collect();
        if charges.len() != sizes.len() {
            return Err(LengthMismatch(charges.len(), sizes.len()));
        }
        let mut index = Self::new();
        for (c, d) in charges.into_iter().zip(sizes) {
            index.insert(c, d)?;
        }
        Ok(index)
    }

    /// Create a new `Index` from `(charge, size)` pairs, keeping the given
    /// order.
    ///
    /// Fails if a charge is repeated.
    pub fn from_pairs_ordered<I>(pairs: I) -> IndexResult<Self>
    where I: IntoIterator<Item = (S::Charge, usize)>
    {
        let mut index = Self::new();
        for (c, d) in pairs.into_iter() {
            index.push(c, d)?;
        }
        Ok(index)
    }

    /// Return the number of sectors.
    pub fn len(&self) -> usize { self.entries.len() }

    /// Return `true` if `self` has no sectors.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Return the total dimension of the space, i.e. the sum of all sector
    /// sizes.
    pub fn total_dim(&self) -> usize {
        self.entries.iter().map(|(_, d)| *d).sum()
    }

    /// Return the `(charge, size)` pair at position `k`, if it exists.
    pub fn get(&self, k: usize) -> Option<(S::Charge, usize)> {
        self.entries.get(k).copied()
    }

    /// Return the charge at position `k`.
    ///
    /// *Panics* if `k` is out of bounds.
    pub fn charge(&self, k: usize) -> S::Charge { self.entries[k].0 }

    /// Return the size of the sector at position `k`.
    ///
    /// *Panics* if `k` is out of bounds.
    pub fn size(&self, k: usize) -> usize { self.entries[k].1 }

    /// Return the position of a charge, if present.
    pub fn position(&self, charge: &S::Charge) -> Option<usize> {
        self.positions.get(charge).copied()
    }

    /// Return `true` if `self` contains a sector for `charge`.
    pub fn has(&self, charge: &S::Charge) -> bool {
        self.positions.contains_key(charge)
    }

    /// Return the size of the sector for `charge`, if present.
    pub fn size_of(&self, charge: &S::Charge) -> Option<usize> {
        self.position(charge).map(|k| self.entries[k].1)
    }

    /// Return the offset of the sector at position `k` when all sectors are
    /// laid out contiguously in order.
    pub fn offset_of(&self, k: usize) -> usize {
        self.entries.iter().take(k).map(|(_, d)| *d).sum()
    }

    /// Return an iterator over all `(charge, size)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (S::Charge, usize)> + Clone + '_ {
        self.entries.iter().copied()
    }

    /// Return an iterator over all charges.
    pub fn charges(&self) -> impl Iterator<Item = S::Charge> + '_ {
        self.entries.iter().map(|(c, _)| *c)
    }

    /// Return an iterator over all sector sizes.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(_, d)| *d)
    }

    fn reindex_from(&mut self, k0: usize) {
        self.entries.iter().enumerate().skip(k0)
            .for_each(|(k, (c, _))| { self.positions.insert(*c, k); });
    }

    /// Insert a new sector, keeping descending order by charge, and return
    /// its position.
    ///
    /// The new entry is placed before the first entry with a smaller charge.
    ///
    /// Fails if `charge` is already present.
    pub fn insert(&mut self, charge: S::Charge, size: usize)
        -> IndexResult<usize>
    {
        if self.has(&charge) {
            return Err(DuplicateCharge(format!("{:?}", charge)));
        }
        let k
            = self.entries.iter()
            .position(|(c, _)| *c < charge)
            .unwrap_or(self.entries.len());
        self.entries.insert(k, (charge, size));
        self.reindex_from(k);
        Ok(k)
    }

    /// Insert a new sector at an explicit position.
    ///
    /// Fails if `charge` is already present or `k` is greater than the
    /// current length.
    pub fn insert_at(&mut self, k: usize, charge: S::Charge, size: usize)
        -> IndexResult<()>
    {
        if self.has(&charge) {
            return Err(DuplicateCharge(format!("{:?}", charge)));
        }
        if k > self.entries.len() {
            return Err(OutOfBounds(k, self.entries.len()));
        }
        self.entries.insert(k, (charge, size));
        self.reindex_from(k);
        Ok(())
    }

    /// Append a new sector to the end.
    ///
    /// Fails if `charge` is already present.
    pub fn push(&mut self, charge: S::Charge, size: usize) -> IndexResult<()>
    {
        self.insert_at(self.entries.len(), charge, size)
    }

    /// Remove and return the sector at position `k`, if it exists.
    pub fn remove(&mut self, k: usize) -> Option<(S::Charge, usize)> {
        if k >= self.entries.len() { return None; }
        let (c, d) = self.entries.remove(k);
        self.positions.remove(&c);
        self.reindex_from(k);
        Some((c, d))
    }

    /// Set the size of the sector at position `k`.
    ///
    /// *Panics* if `k` is out of bounds.
    pub fn set_size(&mut self, k: usize, size: usize) {
        self.entries[k].1 = size;
    }

    /// Swap the entries at positions `a` and `b`.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.positions.insert(self.entries[a].0, a);
        self.positions.insert(self.entries[b].0, b);
    }

    /// Remove all sectors.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    /// Sort in descending order by charge.
    pub fn sort(&mut self) {
        self.entries.sort_by(|(l, _), (r, _)| r.cmp(l));
        self.reindex_from(0);
    }

    /// Return a copy of `self` sorted in descending order by charge.
    pub fn sorted(&self) -> Self {
        let mut new = self.clone();
        new.sort();
        new
    }

    /// Return `true` if `self` and `other` contain the same sectors,
    /// regardless of order.
    pub fn same_sectors(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(c, d)| other.size_of(&c) == Some(d))
    }

    /// Compute the fusion product of two bases.
    ///
    /// For every pair of sectors `(c1, d1)` in `self` and `(c2, d2)` in
    /// `other`, the fused sector `S::fuse(c1, c2)` receives `d1 * d2`
    /// dimensions. The result is sorted in descending order by charge.
    pub fn fuse(&self, other: &Self) -> Self {
        self.fuse_with(other, S::fuse)
    }

    /// Like [`Self::fuse`], but with an arbitrary fusion rule.
    pub fn fuse_with<F>(&self, other: &Self, f: F) -> Self
    where F: Fn(S::Charge, S::Charge) -> S::Charge
    {
        let mut new = Self::new();
        for ((c1, d1), (c2, d2)) in self.iter().cartesian_product(other.iter())
        {
            let c = f(c1, c2);
            if let Some(k) = new.position(&c) {
                new.entries[k].1 += d1 * d2;
            } else {
                new.entries.push((c, d1 * d2));
                new.positions.insert(c, new.entries.len() - 1);
            }
        }
        new.sort();
        new
    }

    /// Return the basis of inverted charges with matching sizes, sorted in
    /// descending order by charge.
    pub fn adjoin(&self) -> Self {
        let mut new = Self::new();
        self.iter()
            .for_each(|(c, d)| {
                new.entries.push((S::invert(c), d));
            });
        new.sort();
        new
    }

    /// Merge another basis into `self`.
    ///
    /// Sectors present in both keep the larger of the two sizes; sectors
    /// present only in `other` are inserted in descending order.
    pub fn merge(&mut self, other: &Self) {
        for (c, d) in other.iter() {
            if let Some(k) = self.position(&c) {
                self.entries[k].1 = self.entries[k].1.max(d);
            } else {
                let k
                    = self.entries.iter()
                    .position(|(ck, _)| *ck < c)
                    .unwrap_or(self.entries.len());
                self.entries.insert(k, (c, d));
                self.reindex_from(k);
            }
        }
    }

    /// Return the sectors of `self` whose charges are also present in
    /// `other`, keeping the order and sizes of `self`.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut new = Self::new();
        self.iter()
            .filter(|(c, _)| other.has(c))
            .for_each(|(c, d)| {
                new.entries.push((c, d));
                new.positions.insert(c, new.entries.len() - 1);
            });
        new
    }
}

impl<S: SymmGroup> Mul for &Index<S> {
    type Output = Index<S>;

    fn mul(self, rhs: Self) -> Self::Output { self.fuse(rhs) }
}

impl<S: SymmGroup> FromIterator<(S::Charge, usize)> for Index<S> {
    /// Collect into a descending-sorted `Index`, summing the sizes of
    /// repeated charges.
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = (S::Charge, usize)>
    {
        let mut new = Self::new();
        for (c, d) in iter.into_iter() {
            if let Some(k) = new.position(&c) {
                new.entries[k].1 += d;
            } else {
                new.entries.push((c, d));
                new.positions.insert(c, new.entries.len() - 1);
            }
        }
        new.sort();
        new
    }
}

//! Block-sparse matrices indexed by charge.
//!
//! A [`BlockMatrix`] partitions a matrix into independent dense blocks, one
//! for each pair of row and column charges it holds. The row and column
//! sectors are described by two [`Index`]es of equal length: entry `k` of
//! each describes the shape and charges of block `k`.
//!
//! Each row charge and each column charge appears at most once, so a block
//! matrix pairs row sectors with column sectors one-to-one (the *matching
//! rule*). Insertions that would break this are rejected.
//!
//! ```
//! use ndarray as nd;
//! use symm_blocks::{ block_matrix::BlockMatrix, symmetry::U1 };
//!
//! let mut m: BlockMatrix<nd::Array2<f64>, U1> = BlockMatrix::new();
//! m.insert_block(nd::array![[1.0, 2.0]], 1, 1).unwrap();
//! m.insert_block(nd::array![[3.0], [4.0]], 0, -1).unwrap();
//! assert_eq!(m.n_blocks(), 2);
//! assert!(m.has_block(&0, &-1));
//! assert!(!m.has_block(&0, &1));
//! assert_eq!(m[(1, 1)], nd::array![[1.0, 2.0]]);
//! ```

use std::{ fmt, ops };
use num_traits::{ Float, One, Zero };
use thiserror::Error;
use crate::{
    dense::{ DenseBlock, DenseError },
    index::{ Index, IndexError },
    symmetry::SymmGroup,
};

#[derive(Debug, Error)]
pub enum BlockMatrixError {
    /// Returned when attempting to create a block matrix from row and column
    /// bases of different lengths.
    #[error("error in block matrix creation: {0} row sectors but {1} column sectors")]
    BasisLengthMismatch(usize, usize),

    /// Returned when attempting to insert a block where one already exists.
    #[error("error in block insertion: block ({0}, {1}) already exists")]
    DuplicateBlock(String, String),

    /// Returned when attempting to insert a block whose row or column charge
    /// is already paired with a different charge.
    #[error("error in block insertion: charges ({0}, {1}) conflict with an existing block")]
    ChargeConflict(String, String),

    /// Returned when a block product is attempted between blocks whose inner
    /// dimensions differ.
    #[error("error in block product: inner dimensions {1} and {2} differ in sector {0}")]
    InnerDimMismatch(String, usize, usize),

    /// Returned when a block does not match the sector sizes it is placed in.
    #[error("error in block placement: shape {1:?} does not match sector sizes {2:?} for block {0}")]
    ShapeMismatch(String, (usize, usize), (usize, usize)),

    #[error("index error: {0}")]
    IndexError(#[from] IndexError),

    #[error("dense block error: {0}")]
    DenseError(#[from] DenseError),
}
use BlockMatrixError::*;
pub type BlockMatrixResult<T> = Result<T, BlockMatrixError>;

fn pair_label<C: fmt::Debug>(rc: &C, cc: &C) -> (String, String) {
    (format!("{:?}", rc), format!("{:?}", cc))
}

/// A block-sparse matrix.
///
/// Blocks are owned dense matrices of type `M`; row and column bases are
/// owned [`Index`]es. New blocks are placed in descending order of row
/// charge.
#[derive(Clone)]
pub struct BlockMatrix<M, S: SymmGroup> {
    rows: Index<S>,
    cols: Index<S>,
    data: Vec<M>,
}

impl<M, S: SymmGroup> Default for BlockMatrix<M, S> {
    fn default() -> Self {
        Self { rows: Index::new(), cols: Index::new(), data: Vec::new() }
    }
}

impl<M, S: SymmGroup> BlockMatrix<M, S> {
    /// Create a new, empty block matrix.
    pub fn new() -> Self { Self::default() }

    /// Return the number of blocks.
    pub fn n_blocks(&self) -> usize { self.data.len() }

    /// Return `true` if `self` has no blocks.
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Return the row basis.
    pub fn left_basis(&self) -> &Index<S> { &self.rows }

    /// Return the column basis.
    pub fn right_basis(&self) -> &Index<S> { &self.cols }

    /// Return the row charge of block `k`.
    ///
    /// *Panics* if `k` is out of bounds.
    pub fn row_charge(&self, k: usize) -> S::Charge { self.rows.charge(k) }

    /// Return the column charge of block `k`.
    ///
    /// *Panics* if `k` is out of bounds.
    pub fn col_charge(&self, k: usize) -> S::Charge { self.cols.charge(k) }

    /// Return an iterator over the `(row, column)` charge pairs of all
    /// blocks.
    pub fn charge_pairs(&self)
        -> impl Iterator<Item = (S::Charge, S::Charge)> + '_
    {
        self.rows.charges().zip(self.cols.charges())
    }

    /// Return the position of the block for `(rc, cc)`, if it exists.
    ///
    /// A block exists only if both charges are present at the same position
    /// in the row and column bases.
    pub fn find_block(&self, rc: &S::Charge, cc: &S::Charge) -> Option<usize>
    {
        let k = self.rows.position(rc)?;
        (self.cols.position(cc) == Some(k)).then_some(k)
    }

    /// Return `true` if a block exists for `(rc, cc)`.
    pub fn has_block(&self, rc: &S::Charge, cc: &S::Charge) -> bool {
        self.find_block(rc, cc).is_some()
    }

    /// Return a reference to the block for `(rc, cc)`, if it exists.
    pub fn block(&self, rc: &S::Charge, cc: &S::Charge) -> Option<&M> {
        self.find_block(rc, cc).map(|k| &self.data[k])
    }

    /// Return a mutable reference to the block for `(rc, cc)`, if it exists.
    pub fn block_mut(&mut self, rc: &S::Charge, cc: &S::Charge)
        -> Option<&mut M>
    {
        self.find_block(rc, cc).map(|k| &mut self.data[k])
    }

    /// Return an iterator over all blocks with their row and column charges,
    /// in storage order.
    ///
    /// The iterator item type is `(S::Charge, S::Charge, &M)`.
    pub fn iter(&self)
        -> impl Iterator<Item = (S::Charge, S::Charge, &M)> + '_
    {
        self.charge_pairs().zip(self.data.iter())
            .map(|((rc, cc), m)| (rc, cc, m))
    }

    /// Return an iterator over mutable references to all blocks with their
    /// row and column charges, in storage order.
    ///
    /// The iterator item type is `(S::Charge, S::Charge, &mut M)`.
    pub fn iter_mut(&mut self)
        -> impl Iterator<Item = (S::Charge, S::Charge, &mut M)> + '_
    {
        self.rows.charges().zip(self.cols.charges()).zip(self.data.iter_mut())
            .map(|((rc, cc), m)| (rc, cc, m))
    }

    /// Return an iterator over all blocks in storage order.
    pub fn blocks(&self) -> std::slice::Iter<'_, M> { self.data.iter() }

    fn check_insertable(&self, rc: &S::Charge, cc: &S::Charge)
        -> BlockMatrixResult<()>
    {
        if self.has_block(rc, cc) {
            let (r, c) = pair_label(rc, cc);
            return Err(DuplicateBlock(r, c));
        }
        if self.rows.has(rc) || self.cols.has(cc) {
            let (r, c) = pair_label(rc, cc);
            return Err(ChargeConflict(r, c));
        }
        Ok(())
    }

    fn place(&mut self, block: M, rc: S::Charge, cc: S::Charge, shape: (usize, usize))
        -> BlockMatrixResult<usize>
    {
        let k = self.rows.insert(rc, shape.0)?;
        self.cols.insert_at(k, cc, shape.1)?;
        self.data.insert(k, block);
        Ok(k)
    }

    /// Remove and return the block for `(rc, cc)`, if it exists.
    pub fn remove_block(&mut self, rc: &S::Charge, cc: &S::Charge)
        -> Option<M>
    {
        let k = self.find_block(rc, cc)?;
        Some(self.remove_block_at(k))
    }

    /// Remove and return block `k`.
    ///
    /// *Panics* if `k` is out of bounds.
    pub fn remove_block_at(&mut self, k: usize) -> M {
        self.rows.remove(k);
        self.cols.remove(k);
        self.data.remove(k)
    }

    /// Remove all blocks and reset both bases to empty.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.cols.clear();
        self.data.clear();
    }

    /// Swap row and column bases without touching the blocks.
    fn swap_bases(&mut self) {
        std::mem::swap(&mut self.rows, &mut self.cols);
    }
}

impl<M, S> BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    /// Create a new block matrix with one zero block for each position in
    /// `rows` and `cols`.
    ///
    /// Fails if `rows` and `cols` have different lengths.
    pub fn from_bases(rows: Index<S>, cols: Index<S>)
        -> BlockMatrixResult<Self>
    {
        if rows.len() != cols.len() {
            return Err(BasisLengthMismatch(rows.len(), cols.len()));
        }
        let data: Vec<M>
            = rows.sizes().zip(cols.sizes())
            .map(|(r, c)| M::zeros(r, c))
            .collect();
        Ok(Self { rows, cols, data })
    }

    /// Create a new block matrix from bases and blocks that are already known
    /// to be consistent.
    pub(crate) fn from_raw_parts(rows: Index<S>, cols: Index<S>, data: Vec<M>)
        -> Self
    {
        Self { rows, cols, data }
    }

    /// Create a new block-diagonal identity matrix on `basis`.
    pub fn identity(basis: &Index<S>) -> Self {
        let data: Vec<M> = basis.sizes().map(M::identity).collect();
        Self::from_raw_parts(basis.clone(), basis.clone(), data)
    }

    /// Create a new block matrix from `(row charge, column charge, block)`
    /// triples.
    ///
    /// Fails under the same conditions as [`Self::insert_block`].
    pub fn from_blocks<I>(blocks: I) -> BlockMatrixResult<Self>
    where I: IntoIterator<Item = (S::Charge, S::Charge, M)>
    {
        let mut new = Self::new();
        for (rc, cc, m) in blocks.into_iter() {
            new.insert_block(m, rc, cc)?;
        }
        Ok(new)
    }

    /// Insert a new block for `(rc, cc)` and return its position.
    ///
    /// Fails if a block for `(rc, cc)` already exists, or if either charge
    /// is already paired with another.
    pub fn insert_block(&mut self, block: M, rc: S::Charge, cc: S::Charge)
        -> BlockMatrixResult<usize>
    {
        self.check_insertable(&rc, &cc)?;
        let shape = block.shape();
        self.place(block, rc, cc, shape)
    }

    /// Add a block into the existing block for `(rc, cc)`, or insert it if
    /// none exists.
    ///
    /// If the incoming block is larger than the stored one along either
    /// axis, the stored block is first grown (never shrunk) to the
    /// elementwise maximum of the two shapes, padding with zeros. A smaller
    /// incoming block is added into the upper-left corner.
    ///
    /// Fails if no block exists and the charges conflict with another block.
    pub fn match_and_add_block(&mut self, block: M, rc: S::Charge, cc: S::Charge)
        -> BlockMatrixResult<()>
    {
        if let Some(k) = self.find_block(&rc, &cc) {
            let (r1, c1) = block.shape();
            self.grow_block_at(k, r1, c1);
            self.data[k].add_subblock(
                M::Elem::one(), &block, (0, 0), (0, 0), (r1, c1));
            Ok(())
        } else {
            self.insert_block(block, rc, cc).map(|_| ())
        }
    }

    fn grow_block_at(&mut self, k: usize, rows: usize, cols: usize) {
        let (r0, c0) = self.data[k].shape();
        let (r, c) = (r0.max(rows), c0.max(cols));
        if (r, c) != (r0, c0) {
            self.data[k].resize(r, c);
        }
        self.rows.set_size(k, self.rows.size(k).max(r));
        self.cols.set_size(k, self.cols.size(k).max(c));
    }

    /// Resize the block for `(rc, cc)`, keeping the overlapping upper-left
    /// region, and return `true`; return `false` if no such block exists.
    pub fn resize_block(
        &mut self,
        rc: &S::Charge,
        cc: &S::Charge,
        rows: usize,
        cols: usize,
    ) -> bool
    {
        if let Some(k) = self.find_block(rc, cc) {
            self.data[k].resize(rows, cols);
            self.rows.set_size(k, rows);
            self.cols.set_size(k, cols);
            true
        } else {
            false
        }
    }

    /// First phase of two-phase block allocation: record that the block for
    /// `(rc, cc)` must be at least `rows × cols`.
    ///
    /// Sector sizes are grown as needed, but no block memory is touched until
    /// [`Self::allocate_blocks`] is called. Newly reserved blocks hold an
    /// empty placeholder until then.
    ///
    /// Fails if no block exists and the charges conflict with another block.
    pub fn reserve(&mut self, rc: S::Charge, cc: S::Charge, rows: usize, cols: usize)
        -> BlockMatrixResult<()>
    {
        if let Some(k) = self.find_block(&rc, &cc) {
            self.rows.set_size(k, self.rows.size(k).max(rows));
            self.cols.set_size(k, self.cols.size(k).max(cols));
            Ok(())
        } else {
            self.check_insertable(&rc, &cc)?;
            self.place(M::zeros(0, 0), rc, cc, (rows, cols)).map(|_| ())
        }
    }

    /// Second phase of two-phase block allocation: bring every block to the
    /// shape recorded in the row and column bases, zero-filling new
    /// elements.
    pub fn allocate_blocks(&mut self) {
        let shapes: Vec<(usize, usize)>
            = self.rows.sizes().zip(self.cols.sizes()).collect();
        self.data.iter_mut().zip(shapes)
            .filter(|(m, shape)| m.shape() != *shape)
            .for_each(|(m, (r, c))| { m.resize(r, c); });
    }

    /// Return the total number of stored elements.
    pub fn num_elements(&self) -> usize {
        self.data.iter()
            .map(|m| { let (r, c) = m.shape(); r * c })
            .sum()
    }

    /// Return the sum of the traces of all blocks.
    pub fn trace(&self) -> M::Elem {
        self.data.iter()
            .fold(M::Elem::zero(), |acc, m| acc + m.trace())
    }

    /// Return the Frobenius norm.
    pub fn norm(&self) -> M::Real {
        Float::sqrt(
            self.data.iter()
                .fold(M::Real::zero(), |acc, m| acc + m.norm_sqr())
        )
    }

    /// Overwrite every element of every block with successive outputs of
    /// `f`.
    pub fn generate<F>(&mut self, mut f: F)
    where F: FnMut() -> M::Elem
    {
        self.data.iter_mut().for_each(|m| { m.generate(&mut f); });
    }

    /// Multiply every element by `a`.
    pub fn scale(&mut self, a: M::Elem) {
        self.data.iter_mut().for_each(|m| { m.scale(a); });
    }

    /// Transpose every block and swap the row and column bases.
    ///
    /// Block storage order is unchanged.
    pub fn inplace_transpose(&mut self) {
        self.data.iter_mut().for_each(|m| { *m = m.transpose(); });
        self.swap_bases();
    }

    /// Complex-conjugate every element.
    pub fn inplace_conjugate(&mut self) {
        self.data.iter_mut().for_each(|m| { *m = m.conjugate(); });
    }

    /// Return the transpose.
    pub fn transpose(&self) -> Self {
        let mut new = self.clone();
        new.inplace_transpose();
        new
    }

    /// Return the elementwise complex conjugate.
    pub fn conjugate(&self) -> Self {
        let mut new = self.clone();
        new.inplace_conjugate();
        new
    }

    /// Return the conjugate transpose.
    pub fn adjoint(&self) -> Self {
        Self {
            rows: self.cols.clone(),
            cols: self.rows.clone(),
            data: self.data.iter().map(|m| m.adjoint()).collect(),
        }
    }

    /// Add `rhs` into `self`, block by block.
    ///
    /// Blocks of `rhs` with no counterpart in `self` are inserted.
    ///
    /// Fails if such an insertion conflicts with an existing block.
    pub fn add_matrix(&mut self, rhs: &Self) -> BlockMatrixResult<()> {
        for (rc, cc, m) in rhs.iter() {
            if let Some(k) = self.find_block(&rc, &cc) {
                self.data[k].add_assign_block(m);
            } else {
                self.insert_block(m.clone(), rc, cc)?;
            }
        }
        Ok(())
    }

    /// Subtract `rhs` from `self`, block by block.
    ///
    /// Blocks of `rhs` with no counterpart in `self` are inserted negated.
    ///
    /// Fails if such an insertion conflicts with an existing block.
    pub fn sub_matrix(&mut self, rhs: &Self) -> BlockMatrixResult<()> {
        for (rc, cc, m) in rhs.iter() {
            if let Some(k) = self.find_block(&rc, &cc) {
                self.data[k].sub_assign_block(m);
            } else {
                let mut neg = m.clone();
                neg.scale(-M::Elem::one());
                self.insert_block(neg, rc, cc)?;
            }
        }
        Ok(())
    }

    /// Check that every block's shape agrees with the sizes recorded in the
    /// row and column bases.
    pub fn check_shapes(&self) -> BlockMatrixResult<()> {
        for (k, m) in self.data.iter().enumerate() {
            let expected = (self.rows.size(k), self.cols.size(k));
            if m.shape() != expected {
                let (r, c) = pair_label(&self.rows.charge(k), &self.cols.charge(k));
                return Err(ShapeMismatch(format!("({r}, {c})"), m.shape(), expected));
            }
        }
        Ok(())
    }
}

impl<M, S> PartialEq for BlockMatrix<M, S>
where
    M: PartialEq,
    S: SymmGroup,
{
    /// Two block matrices are equal if they hold equal blocks for the same
    /// charge pairs, regardless of storage order.
    fn eq(&self, other: &Self) -> bool {
        self.n_blocks() == other.n_blocks()
            && self.iter().all(|(rc, cc, m)| {
                other.block(&rc, &cc).is_some_and(|om| om == m)
            })
    }
}

impl<M, S> fmt::Debug for BlockMatrix<M, S>
where
    M: fmt::Debug,
    S: SymmGroup,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockMatrix(")?;
        for (rc, cc, m) in self.iter() {
            writeln!(f)?;
            write!(f, "({:?}, {:?}): {:?}", rc, cc, m)?;
        }
        write!(f, ")")
    }
}

impl<M, S> fmt::Display for BlockMatrix<M, S>
where
    M: DenseBlock + fmt::Display,
    S: SymmGroup,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.n_blocks();
        for (k, (rc, cc, m)) in self.iter().enumerate() {
            let (r, c) = m.shape();
            writeln!(f, "({:?}, {:?}) :: <{}, {}>", rc, cc, r, c)?;
            fmt::Display::fmt(m, f)?;
            if k < n - 1 { writeln!(f)?; }
        }
        Ok(())
    }
}

impl<M, S: SymmGroup> ops::Index<usize> for BlockMatrix<M, S> {
    type Output = M;

    fn index(&self, k: usize) -> &Self::Output { &self.data[k] }
}

impl<M, S: SymmGroup> ops::IndexMut<usize> for BlockMatrix<M, S> {
    fn index_mut(&mut self, k: usize) -> &mut Self::Output { &mut self.data[k] }
}

impl<M, S: SymmGroup> ops::Index<(S::Charge, S::Charge)> for BlockMatrix<M, S> {
    type Output = M;

    /// *Panics* if no block exists for the charge pair.
    fn index(&self, rc_cc: (S::Charge, S::Charge)) -> &Self::Output {
        let (rc, cc) = rc_cc;
        match self.find_block(&rc, &cc) {
            Some(k) => &self.data[k],
            None => panic!("no block for charges ({:?}, {:?})", rc, cc),
        }
    }
}

impl<M, S: SymmGroup> ops::IndexMut<(S::Charge, S::Charge)> for BlockMatrix<M, S> {
    /// *Panics* if no block exists for the charge pair.
    fn index_mut(&mut self, rc_cc: (S::Charge, S::Charge)) -> &mut Self::Output {
        let (rc, cc) = rc_cc;
        match self.find_block(&rc, &cc) {
            Some(k) => &mut self.data[k],
            None => panic!("no block for charges ({:?}, {:?})", rc, cc),
        }
    }
}

impl<M, S> ops::AddAssign<&BlockMatrix<M, S>> for BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    /// *Panics* if a block of `rhs` conflicts with the blocks of `self`; see
    /// [`BlockMatrix::add_matrix`] for a fallible version.
    fn add_assign(&mut self, rhs: &Self) {
        if let Err(err) = self.add_matrix(rhs) { panic!("{err}"); }
    }
}

impl<M, S> ops::SubAssign<&BlockMatrix<M, S>> for BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    /// *Panics* if a block of `rhs` conflicts with the blocks of `self`; see
    /// [`BlockMatrix::sub_matrix`] for a fallible version.
    fn sub_assign(&mut self, rhs: &Self) {
        if let Err(err) = self.sub_matrix(rhs) { panic!("{err}"); }
    }
}

impl<M, S> ops::MulAssign<M::Elem> for BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    fn mul_assign(&mut self, a: M::Elem) { self.scale(a); }
}

impl<M, S> ops::DivAssign<M::Elem> for BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    fn div_assign(&mut self, a: M::Elem) { self.scale(M::Elem::one() / a); }
}

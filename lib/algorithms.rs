//! Block-sparse linear algebra.
//!
//! Every operation here works one block at a time, pairing blocks by charge
//! and delegating the dense work to [`DenseBlock`]. Blocks whose charges find
//! no partner are skipped rather than treated as errors.
//!
//! ```
//! use ndarray as nd;
//! use symm_blocks::{
//!     algorithms::{ gemm, identity_matrix },
//!     block_matrix::BlockMatrix,
//!     index::Index,
//!     symmetry::U1,
//! };
//!
//! let basis: Index<U1> = Index::from_parts([1, -1], [2, 3]).unwrap();
//! let id: BlockMatrix<nd::Array2<f64>, U1> = identity_matrix(&basis);
//! assert_eq!(gemm(&id, &id).unwrap(), id);
//! ```

use std::cmp::Ordering;
use num_traits::{ Float, Zero };
use tracing::debug;
use crate::{
    block_matrix::{ BlockMatrix, BlockMatrixError, BlockMatrixResult },
    dense::{ BlockSvd, DenseBlock },
    index::Index,
    symmetry::SymmGroup,
};

/// Compute the block-sparse product `a · b`.
///
/// For each block `(r, c)` of `a`, the block of `b` whose row charge is `c`
/// (if any) is multiplied in and accumulated at `(r, c')`, where `c'` is that
/// block's column charge.
///
/// Fails if a pair of matched blocks disagree in their inner dimension.
pub fn gemm<M, S>(a: &BlockMatrix<M, S>, b: &BlockMatrix<M, S>)
    -> BlockMatrixResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let mut c: BlockMatrix<M, S> = BlockMatrix::new();
    for (ra, ca, ma) in a.iter() {
        let Some(k) = b.left_basis().position(&ca) else { continue; };
        let mb = &b[k];
        if ma.ncols() != mb.nrows() {
            return Err(BlockMatrixError::InnerDimMismatch(
                format!("{:?}", ca), ma.ncols(), mb.nrows()));
        }
        c.match_and_add_block(ma.matmul(mb), ra, b.col_charge(k))?;
    }
    Ok(c)
}

/// Return a block-diagonal identity matrix on `basis`.
pub fn identity_matrix<M, S>(basis: &Index<S>) -> BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    BlockMatrix::identity(basis)
}

/// Return the transpose of `m`.
pub fn transpose<M, S>(m: &BlockMatrix<M, S>) -> BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    m.transpose()
}

/// Return the elementwise complex conjugate of `m`.
pub fn conjugate<M, S>(m: &BlockMatrix<M, S>) -> BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    m.conjugate()
}

/// Return the conjugate transpose of `m`.
pub fn adjoint<M, S>(m: &BlockMatrix<M, S>) -> BlockMatrix<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    m.adjoint()
}

/// Singular values of a block-sparse matrix, grouped by charge sector.
///
/// Values within each sector are in descending order.
#[derive(Clone, Debug, PartialEq)]
pub struct SingularValues<R, S: SymmGroup> {
    sectors: Vec<(S::Charge, Vec<R>)>,
}

impl<R, S: SymmGroup> Default for SingularValues<R, S> {
    fn default() -> Self { Self { sectors: Vec::new() } }
}

impl<R, S> SingularValues<R, S>
where
    R: Float,
    S: SymmGroup,
{
    fn push(&mut self, charge: S::Charge, values: Vec<R>) {
        self.sectors.push((charge, values));
    }

    /// Return the number of charge sectors.
    pub fn n_sectors(&self) -> usize { self.sectors.len() }

    /// Return the values for a sector, if present.
    pub fn get(&self, charge: &S::Charge) -> Option<&[R]> {
        self.sectors.iter()
            .find(|(c, _)| c == charge)
            .map(|(_, s)| s.as_slice())
    }

    /// Return an iterator over all sectors and their values.
    pub fn iter(&self) -> impl Iterator<Item = (S::Charge, &[R])> + '_ {
        self.sectors.iter().map(|(c, s)| (*c, s.as_slice()))
    }

    /// Return the total number of values across all sectors.
    pub fn count(&self) -> usize {
        self.sectors.iter().map(|(_, s)| s.len()).sum()
    }

    /// Return the largest value across all sectors, or zero if there are
    /// none.
    pub fn max(&self) -> R {
        self.sectors.iter()
            .flat_map(|(_, s)| s.iter().copied())
            .fold(R::zero(), R::max)
    }

    /// Return the basis of the bond these values live on.
    pub fn basis(&self) -> Index<S> {
        self.sectors.iter().map(|(c, s)| (*c, s.len())).collect()
    }

    /// Convert to a diagonal block matrix.
    pub fn to_matrix<M>(&self) -> BlockMatrix<M, S>
    where M: DenseBlock<Real = R>
    {
        let mut rows: Index<S> = Index::new();
        let mut data: Vec<M> = Vec::with_capacity(self.sectors.len());
        for (c, s) in self.sectors.iter() {
            if rows.push(*c, s.len()).is_ok() {
                data.push(M::from_diagonal(s));
            }
        }
        BlockMatrix::from_raw_parts(rows.clone(), rows, data)
    }
}

/// Output of a block-sparse singular value decomposition `m = u · s · v`.
///
/// `u` holds blocks at `(r, r)` and `v` at `(r, c)` for every block `(r, c)`
/// of `m`, so the intermediate bond carries the row charges of `m`.
#[derive(Clone, Debug)]
pub struct SvdFactors<M: DenseBlock, S: SymmGroup> {
    pub u: BlockMatrix<M, S>,
    pub s: SingularValues<M::Real, S>,
    pub v: BlockMatrix<M, S>,
}

/// Compute the thin singular value decomposition of every block.
///
/// Fails if a dense decomposition fails.
pub fn svd<M, S>(m: &BlockMatrix<M, S>) -> BlockMatrixResult<SvdFactors<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let mut u: BlockMatrix<M, S> = BlockMatrix::new();
    let mut v: BlockMatrix<M, S> = BlockMatrix::new();
    let mut s: SingularValues<M::Real, S> = SingularValues::default();
    for (rc, cc, block) in m.iter() {
        let BlockSvd { u: ub, s: sb, v: vb } = block.svd()?;
        u.insert_block(ub, rc, rc)?;
        v.insert_block(vb, rc, cc)?;
        s.push(rc, sb);
    }
    Ok(SvdFactors { u, s, v })
}

/// Settings for [`svd_truncate`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TruncationParams<R> {
    /// Singular values at or below `cutoff` times the largest singular value
    /// (over all blocks) are discarded. Defaults to machine epsilon.
    pub cutoff: R,
    /// Maximum number of singular values to keep over all blocks. Defaults to
    /// no limit.
    pub max_dim: Option<usize>,
    /// Minimum number of singular values to keep over all blocks, applied
    /// after `cutoff` and `max_dim`. Defaults to 1.
    pub min_dim: usize,
}

impl<R: Float> Default for TruncationParams<R> {
    fn default() -> Self {
        Self { cutoff: R::epsilon(), max_dim: None, min_dim: 1 }
    }
}

impl<R: Float> TruncationParams<R> {
    /// Set the relative cutoff.
    pub fn with_cutoff(mut self, cutoff: R) -> Self {
        self.cutoff = Float::abs(cutoff);
        self
    }

    /// Set the maximum kept dimension.
    pub fn with_max_dim(mut self, max_dim: usize) -> Self {
        self.max_dim = Some(max_dim);
        self
    }

    /// Set the minimum kept dimension.
    pub fn with_min_dim(mut self, min_dim: usize) -> Self {
        self.min_dim = min_dim;
        self
    }
}

/// Summary of a truncation performed by [`svd_truncate`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TruncationReport<R> {
    /// Total number of singular values kept.
    pub bond_dim: usize,
    /// Sum of squares of discarded values over the sum of squares of all
    /// values.
    pub truncated_weight: R,
    /// Sum of discarded values over the sum of all values.
    pub truncated_fraction: R,
    /// Smallest kept value, if any were kept.
    pub smallest_kept: Option<R>,
}

/// Compute a singular value decomposition and truncate it globally.
///
/// All singular values across all blocks are ranked together. The number
/// kept is the count of values strictly above `cutoff * s_max`, capped at
/// `max_dim` and then raised to `min_dim` (never beyond the total count).
/// Equal values are ranked by block storage order, then by position within
/// the block. Blocks left with no values are removed from all factors.
///
/// Fails if a dense decomposition fails.
pub fn svd_truncate<M, S>(
    m: &BlockMatrix<M, S>,
    params: &TruncationParams<M::Real>,
) -> BlockMatrixResult<(SvdFactors<M, S>, TruncationReport<M::Real>)>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let SvdFactors { u, s, v } = svd(m)?;

    let all: Vec<(usize, M::Real)>
        = s.sectors.iter().enumerate()
        .flat_map(|(b, (_, sv))| sv.iter().map(move |x| (b, *x)))
        .collect();
    let thresh = params.cutoff * s.max();
    let above = all.iter().filter(|(_, x)| *x > thresh).count();
    let keep
        = above.min(params.max_dim.unwrap_or(usize::MAX))
        .max(params.min_dim)
        .min(all.len());

    // stable: ties keep (block, position) order
    let mut order: Vec<usize> = (0..all.len()).collect();
    order.sort_by(|&i, &j| {
        all[j].1.partial_cmp(&all[i].1).unwrap_or(Ordering::Equal)
    });
    let mut kept_per_block: Vec<usize> = vec![0; s.n_sectors()];
    order.iter().take(keep).for_each(|&i| { kept_per_block[all[i].0] += 1; });

    let (mut sum_sq, mut sum) = (M::Real::zero(), M::Real::zero());
    let (mut disc_sq, mut disc) = (M::Real::zero(), M::Real::zero());
    let mut smallest_kept: Option<M::Real> = None;
    for (_, x) in all.iter().copied() {
        sum_sq = sum_sq + x * x;
        sum = sum + x;
    }

    // each block keeps a prefix of its descending values
    let mut u_new: BlockMatrix<M, S> = BlockMatrix::new();
    let mut v_new: BlockMatrix<M, S> = BlockMatrix::new();
    let mut s_new: SingularValues<M::Real, S> = SingularValues::default();
    for (b, (charge, values)) in s.sectors.into_iter().enumerate() {
        let n = kept_per_block[b];
        values.iter().skip(n).for_each(|x| {
            disc_sq = disc_sq + *x * *x;
            disc = disc + *x;
        });
        if n == 0 { continue; }
        if let Some(x) = values.get(n - 1) {
            smallest_kept = Some(
                smallest_kept.map_or(*x, |y| if *x < y { *x } else { y }));
        }
        let (Some(kv), Some(ub)) = (
            v.left_basis().position(&charge),
            u.block(&charge, &charge),
        ) else { continue; };
        let cc = v.col_charge(kv);
        let mut ub = ub.clone();
        ub.resize(ub.nrows(), n);
        let mut vb = v[kv].clone();
        vb.resize(n, vb.ncols());
        u_new.insert_block(ub, charge, charge)?;
        v_new.insert_block(vb, charge, cc)?;
        s_new.push(charge, values.into_iter().take(n).collect());
    }

    let ratio = |num: M::Real, den: M::Real| {
        if den > M::Real::zero() { num / den } else { M::Real::zero() }
    };
    let report = TruncationReport {
        bond_dim: keep,
        truncated_weight: ratio(disc_sq, sum_sq),
        truncated_fraction: ratio(disc, sum),
        smallest_kept,
    };
    debug!(
        bond_dim = report.bond_dim,
        candidates = all.len(),
        truncated_weight = ?report.truncated_weight,
        smallest_kept = ?report.smallest_kept,
        "truncated block svd"
    );
    Ok((SvdFactors { u: u_new, s: s_new, v: v_new }, report))
}

/// Compute the thin QR decomposition `m = q · r` of every block.
///
/// `q` holds blocks at `(r, r)` and `r` at `(r, c)` for every block `(r, c)`
/// of `m`; the columns of each block of `q` are orthonormal.
///
/// Fails if a dense decomposition fails.
pub fn qr<M, S>(m: &BlockMatrix<M, S>)
    -> BlockMatrixResult<(BlockMatrix<M, S>, BlockMatrix<M, S>)>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let mut q: BlockMatrix<M, S> = BlockMatrix::new();
    let mut r: BlockMatrix<M, S> = BlockMatrix::new();
    for (rc, cc, block) in m.iter() {
        let (qb, rb) = block.qr()?;
        q.insert_block(qb, rc, rc)?;
        r.insert_block(rb, rc, cc)?;
    }
    Ok((q, r))
}

/// Compute the thin LQ decomposition `m = l · q` of every block.
///
/// `l` holds blocks at `(r, c)` and `q` at `(c, c)` for every block `(r, c)`
/// of `m`; the rows of each block of `q` are orthonormal.
///
/// Fails if a dense decomposition fails.
pub fn lq<M, S>(m: &BlockMatrix<M, S>)
    -> BlockMatrixResult<(BlockMatrix<M, S>, BlockMatrix<M, S>)>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let mut l: BlockMatrix<M, S> = BlockMatrix::new();
    let mut q: BlockMatrix<M, S> = BlockMatrix::new();
    for (rc, cc, block) in m.iter() {
        let (qt, rt) = block.transpose().qr()?;
        l.insert_block(rt.transpose(), rc, cc)?;
        q.insert_block(qt.transpose(), cc, cc)?;
    }
    Ok((l, q))
}

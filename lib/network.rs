//! Whole-chain contractions.
//!
//! These helpers sweep the single-site kernels of [`contraction`] across a
//! full chain of site tensors to compute overlaps, norms, and expectation
//! values. Chains are closed at auxiliary index 0 on both ends: the first MPO
//! site's row 0 and the last MPO site's column 0.
//!
//! [`contraction`]: crate::contraction

use num_complex::ComplexFloat;
use num_traits::Float;
use thiserror::Error;
use tracing::debug;
use crate::{
    block_matrix::BlockMatrix,
    boundary::Boundary,
    contraction::{
        ContractionError,
        overlap_left_step,
        overlap_right_step,
        overlap_mpo_left_step_par,
        overlap_mpo_right_step_par,
    },
    dense::DenseBlock,
    mpo_tensor::MPOTensor,
    mps_tensor::MPSTensor,
    pool::WorkerPool,
    symmetry::SymmGroup,
};

#[derive(Debug, Error)]
pub enum NetworkError {
    /// Returned when attempting to contract an empty chain.
    #[error("error in chain contraction: empty chain")]
    EmptyChain,

    /// Returned when chains have different numbers of sites.
    #[error("error in chain contraction: chain lengths {0} and {1} differ")]
    LengthMismatch(usize, usize),

    #[error("contraction error: {0}")]
    ContractionError(#[from] ContractionError),
}
use NetworkError::*;
pub type NetworkResult<T> = Result<T, NetworkError>;

fn check_lengths(a: usize, b: usize) -> NetworkResult<()> {
    if a == 0 || b == 0 { return Err(EmptyChain); }
    if a != b { return Err(LengthMismatch(a, b)); }
    Ok(())
}

/// Return the boundary closing off the left end of a chain, with auxiliary
/// dimension `aux_dim`.
///
/// Slot 0 holds the identity on the charge sectors shared by the bra's and
/// ket's left bonds.
pub fn left_edge<M, S>(bra: &MPSTensor<M, S>, ket: &MPSTensor<M, S>, aux_dim: usize)
    -> Boundary<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let basis = ket.left_basis().intersect(bra.left_basis());
    Boundary::edge(&basis, aux_dim.max(1), 0)
}

/// Return the boundary closing off the right end of a chain, with auxiliary
/// dimension `aux_dim`.
///
/// Slot 0 holds the identity on the charge sectors shared by the bra's and
/// ket's right bonds.
pub fn right_edge<M, S>(bra: &MPSTensor<M, S>, ket: &MPSTensor<M, S>, aux_dim: usize)
    -> Boundary<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let basis = ket.right_basis().intersect(bra.right_basis());
    Boundary::edge(&basis, aux_dim.max(1), 0)
}

/// Compute `⟨bra|ket⟩` by sweeping from left to right.
///
/// Fails if the chains are empty or of different lengths, or if any single
/// step fails.
pub fn overlap<M, S>(bra: &[MPSTensor<M, S>], ket: &[MPSTensor<M, S>])
    -> NetworkResult<M::Elem>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_lengths(bra.len(), ket.len())?;
    let mut left: BlockMatrix<M, S>
        = BlockMatrix::identity(&ket[0].left_basis().intersect(bra[0].left_basis()));
    for (b, k) in bra.iter().zip(ket) {
        left = overlap_left_step(b, k, &left)?;
    }
    Ok(left.trace())
}

/// Compute `⟨bra|ket⟩` by sweeping from right to left.
///
/// Fails under the same conditions as [`overlap`].
pub fn overlap_right<M, S>(bra: &[MPSTensor<M, S>], ket: &[MPSTensor<M, S>])
    -> NetworkResult<M::Elem>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_lengths(bra.len(), ket.len())?;
    let n = ket.len();
    let mut right: BlockMatrix<M, S>
        = BlockMatrix::identity(
            &ket[n - 1].right_basis().intersect(bra[n - 1].right_basis()));
    for (b, k) in bra.iter().zip(ket).rev() {
        right = overlap_right_step(b, k, &right)?;
    }
    Ok(right.trace())
}

/// Compute the norm `√⟨ψ|ψ⟩`.
///
/// Fails under the same conditions as [`overlap`].
pub fn norm<M, S>(mps: &[MPSTensor<M, S>]) -> NetworkResult<M::Real>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let ov = overlap(mps, mps)?;
    Ok(Float::sqrt(Float::abs(ov.re())))
}

/// Compute `⟨bra|W|ket⟩` for an MPO `W` by sweeping from left to right,
/// distributing the work of each step across `pool`.
///
/// Fails if the chains are empty or of different lengths, or if any single
/// step fails.
pub fn expval<M, S>(
    bra: &[MPSTensor<M, S>],
    mpo: &[MPOTensor<M, S>],
    ket: &[MPSTensor<M, S>],
    pool: &WorkerPool,
) -> NetworkResult<M::Elem>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_lengths(bra.len(), ket.len())?;
    check_lengths(mpo.len(), ket.len())?;
    debug!(sites = ket.len(), nthreads = pool.nthreads(), "left sweep");
    let mut left = left_edge(&bra[0], &ket[0], mpo[0].row_dim());
    for ((b, w), k) in bra.iter().zip(mpo).zip(ket) {
        left = overlap_mpo_left_step_par(b, k, &left, w, pool)?;
    }
    Ok(left[0].trace())
}

/// Compute `⟨bra|W|ket⟩` for an MPO `W` by sweeping from right to left,
/// distributing the work of each step across `pool`.
///
/// Fails under the same conditions as [`expval`].
pub fn expval_right<M, S>(
    bra: &[MPSTensor<M, S>],
    mpo: &[MPOTensor<M, S>],
    ket: &[MPSTensor<M, S>],
    pool: &WorkerPool,
) -> NetworkResult<M::Elem>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_lengths(bra.len(), ket.len())?;
    check_lengths(mpo.len(), ket.len())?;
    let n = ket.len();
    debug!(sites = n, nthreads = pool.nthreads(), "right sweep");
    let mut right = right_edge(&bra[n - 1], &ket[n - 1], mpo[n - 1].col_dim());
    for ((b, w), k) in bra.iter().zip(mpo).zip(ket).rev() {
        right = overlap_mpo_right_step_par(b, k, &right, w, pool)?;
    }
    Ok(right[0].trace())
}

//! Boundary contraction kernels.
//!
//! Each kernel absorbs one site of a bra/ket pair of matrix product states
//! (and optionally one site of a matrix product operator) into a boundary,
//! producing the boundary one site further along the chain:
//!
//! ```text
//!   .--- bra* ---          .---
//!   |     |                |
//!   L --- W ---    ==>     L' ---
//!   |     |                |
//!   '--- ket ----          '---
//! ```
//!
//! All kernels are pure functions of their inputs. The MPO kernels have
//! `_par` variants that distribute work over output auxiliary indices using a
//! [`WorkerPool`]; each job owns the block matrix it writes.

use num_traits::Zero;
use thiserror::Error;
use tracing::{ debug, trace };
use crate::{
    algorithms::gemm,
    block_matrix::{ BlockMatrix, BlockMatrixError },
    boundary::Boundary,
    dense::DenseBlock,
    index::Index,
    mpo_tensor::MPOTensor,
    mps_tensor::{ MPSError, MPSTensor },
    pool::{ PoolError, WorkerPool },
    product_basis::ProductBasis,
    reshape::{ reshape_left_to_right, reshape_right_to_left },
    symmetry::SymmGroup,
};

#[derive(Debug, Error)]
pub enum ContractionError {
    /// Returned when the bra and ket tensors have different physical bases.
    #[error("error in contraction: bra and ket have different physical bases")]
    PhysicalMismatch,

    /// Returned when a boundary's auxiliary dimension does not match the MPO.
    #[error("error in contraction: expected boundary auxiliary dimension {expected}, found {found}")]
    AuxDimMismatch { expected: usize, found: usize },

    /// Returned when a boundary block does not fit the bond bases it connects.
    #[error("error in contraction: boundary block {0} does not fit the bond bases")]
    BoundaryBasisMismatch(String),

    /// Returned when an MPO operator block does not fit the physical basis.
    #[error("error in contraction: operator block {0} does not fit the physical basis")]
    OperatorBasisMismatch(String),

    #[error("block matrix error: {0}")]
    BlockMatrixError(#[from] BlockMatrixError),

    #[error("MPS tensor error: {0}")]
    MPSError(#[from] MPSError),

    #[error("pool error: {0}")]
    PoolError(#[from] PoolError),
}
use ContractionError::*;
pub type ContractionResult<T> = Result<T, ContractionError>;

fn check_phys<M, S>(bra: &MPSTensor<M, S>, ket: &MPSTensor<M, S>)
    -> ContractionResult<()>
where
    M: DenseBlock,
    S: SymmGroup,
{
    if bra.phys_basis().same_sectors(ket.phys_basis()) {
        Ok(())
    } else {
        Err(PhysicalMismatch)
    }
}

// blocks whose charges are absent from the bases are tolerated; they never
// meet a partner in the products below
fn check_boundary_block<M, S>(
    m: &BlockMatrix<M, S>,
    rows: &Index<S>,
    cols: &Index<S>,
) -> ContractionResult<()>
where
    M: DenseBlock,
    S: SymmGroup,
{
    for (rc, cc, block) in m.iter() {
        let row_ok = rows.size_of(&rc).map_or(true, |d| d == block.nrows());
        let col_ok = cols.size_of(&cc).map_or(true, |d| d == block.ncols());
        if !(row_ok && col_ok) {
            return Err(BoundaryBasisMismatch(format!("({:?}, {:?})", rc, cc)));
        }
    }
    Ok(())
}

fn check_mpo<M, S>(mpo: &MPOTensor<M, S>, phys: &Index<S>)
    -> ContractionResult<()>
where
    M: DenseBlock,
    S: SymmGroup,
{
    for (_, _, term) in mpo.iter() {
        for (so, si, w) in term.op.iter() {
            if phys.size_of(&so) != Some(w.nrows())
                || phys.size_of(&si) != Some(w.ncols())
            {
                return Err(OperatorBasisMismatch(format!("({:?}, {:?})", so, si)));
            }
        }
    }
    Ok(())
}

/// Absorb one site into a left boundary of a plain overlap.
///
/// `left` has rows on the bra's left bond and columns on the ket's left
/// bond; the result has rows on the bra's right bond and columns on the
/// ket's right bond.
///
/// Fails if the bra and ket have different physical bases or `left` does not
/// fit their left bonds.
pub fn overlap_left_step<M, S>(
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    left: &BlockMatrix<M, S>,
) -> ContractionResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_phys(bra, ket)?;
    check_boundary_block(left, bra.left_basis(), ket.left_basis())?;
    let ket_rp = ket.right_paired()?;
    let bra_lp = bra.left_paired()?;
    let t = gemm(left, &ket_rp)?;
    let t = reshape_right_to_left(
        ket.phys_basis(), bra.left_basis(), ket.right_basis(), &t)?;
    Ok(gemm(&bra_lp.adjoint(), &t)?)
}

/// Absorb one site into a right boundary of a plain overlap.
///
/// `right` has rows on the ket's right bond and columns on the bra's right
/// bond; the result has rows on the ket's left bond and columns on the bra's
/// left bond.
///
/// Fails if the bra and ket have different physical bases or `right` does
/// not fit their right bonds.
pub fn overlap_right_step<M, S>(
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    right: &BlockMatrix<M, S>,
) -> ContractionResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_phys(bra, ket)?;
    check_boundary_block(right, ket.right_basis(), bra.right_basis())?;
    let ket_lp = ket.left_paired()?;
    let bra_rp = bra.right_paired()?;
    let t = gemm(&ket_lp, right)?;
    let t = reshape_left_to_right(
        ket.phys_basis(), ket.left_basis(), bra.right_basis(), &t)?;
    Ok(gemm(&t, &bra_rp.adjoint())?)
}

/// Absorb one site and one MPO site into a left boundary.
///
/// The result has auxiliary dimension `mpo.col_dim()`. See
/// [`overlap_mpo_left_step_par`] for a parallel version.
///
/// Fails if the bra and ket have different physical bases, `left` does not
/// fit the MPO or the bra and ket left bonds, or an operator does not fit the
/// physical basis.
pub fn overlap_mpo_left_step<M, S>(
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    left: &Boundary<M, S>,
    mpo: &MPOTensor<M, S>,
) -> ContractionResult<Boundary<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    overlap_mpo_left_step_par(bra, ket, left, mpo, &WorkerPool::serial())
}

/// Like [`overlap_mpo_left_step`], but distributing the work for each
/// auxiliary index across the threads of `pool`.
pub fn overlap_mpo_left_step_par<M, S>(
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    left: &Boundary<M, S>,
    mpo: &MPOTensor<M, S>,
    pool: &WorkerPool,
) -> ContractionResult<Boundary<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_phys(bra, ket)?;
    if left.aux_dim() != mpo.row_dim() {
        return Err(AuxDimMismatch {
            expected: mpo.row_dim(),
            found: left.aux_dim(),
        });
    }
    left.iter()
        .try_for_each(|m| {
            check_boundary_block(m, bra.left_basis(), ket.left_basis())
        })?;
    check_mpo(mpo, ket.phys_basis())?;
    debug!(
        aux_in = mpo.row_dim(),
        aux_out = mpo.col_dim(),
        terms = mpo.n_terms(),
        nthreads = pool.nthreads(),
        "mpo left step"
    );

    let ket_rp = ket.right_paired()?;
    let bra_lp_adj = bra.left_paired()?.adjoint();

    let ts: Vec<BlockMatrix<M, S>>
        = pool.map_indexed(mpo.row_dim(), |b1| {
            if mpo.row(b1).next().is_none() {
                Ok(BlockMatrix::new())
            } else {
                gemm(&left[b1], &ket_rp)
            }
        })?
        .into_iter()
        .collect::<Result<_, _>>()?;

    let out: Vec<BlockMatrix<M, S>>
        = pool.map_indexed(mpo.col_dim(), |b2| -> ContractionResult<_> {
            let o = lbtm_kernel(b2, bra, ket, &ts, mpo)?;
            trace!(b2, blocks = o.n_blocks(), "left step slot");
            Ok(gemm(&bra_lp_adj, &o)?)
        })?
        .into_iter()
        .collect::<ContractionResult<_>>()?;
    Ok(Boundary::from_vec(out))
}

// accumulate Σ_b1 W(b1, b2) · T[b1] into a left-paired block matrix over
// (physical ⊗ bra left bond) × ket right bond
fn lbtm_kernel<M, S>(
    b2: usize,
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    ts: &[BlockMatrix<M, S>],
    mpo: &MPOTensor<M, S>,
) -> ContractionResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let phys = ket.phys_basis();
    let bra_left = bra.left_basis();
    let ket_right = ket.right_basis();
    let out_left_pb = ProductBasis::new(phys, bra_left);
    let in_right_pb = ProductBasis::conjugate(phys, ket_right);
    let mut out: BlockMatrix<M, S> = BlockMatrix::new();

    for (b1, term) in mpo.column(b2) {
        for (lp_c, in_c, _) in ts[b1].iter() {
            if !bra_left.has(&lp_c) { continue; }
            for (so_c, si_c, _) in term.op.iter() {
                let r_c = S::fuse(in_c, si_c);
                let Some(r_size) = ket_right.size_of(&r_c) else { continue; };
                let out_c = S::fuse(so_c, lp_c);
                let Some(out_rows) = out_left_pb.size(&out_c) else { continue; };
                out.reserve(out_c, r_c, out_rows, r_size)?;
            }
        }
    }
    out.allocate_blocks();

    for (b1, term) in mpo.column(b2) {
        for (lp_c, in_c, tblk) in ts[b1].iter() {
            let Some(l_size) = bra_left.size_of(&lp_c) else { continue; };
            for (so_c, si_c, w) in term.op.iter() {
                let r_c = S::fuse(in_c, si_c);
                let Some(r_size) = ket_right.size_of(&r_c) else { continue; };
                let out_c = S::fuse(so_c, lp_c);
                let (Some(in_off), Some(out_off))
                    = (in_right_pb.offset(&si_c, &r_c), out_left_pb.offset(&so_c, &lp_c))
                    else { continue; };
                let Some(target) = out.block_mut(&out_c, &r_c) else { continue; };
                for i_out in 0..w.nrows() {
                    for i_in in 0..w.ncols() {
                        let wv = w.get(i_out, i_in);
                        if wv.is_zero() { continue; }
                        target.add_subblock(
                            term.scale * wv,
                            tblk,
                            (0, in_off + i_in * r_size),
                            (out_off + i_out * l_size, 0),
                            (l_size, r_size),
                        );
                    }
                }
            }
        }
    }
    Ok(out)
}

/// Absorb one site and one MPO site into a right boundary.
///
/// The result has auxiliary dimension `mpo.row_dim()`. See
/// [`overlap_mpo_right_step_par`] for a parallel version.
///
/// Fails if the bra and ket have different physical bases, `right` does not
/// fit the MPO or the bra and ket right bonds, or an operator does not fit
/// the physical basis.
pub fn overlap_mpo_right_step<M, S>(
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    right: &Boundary<M, S>,
    mpo: &MPOTensor<M, S>,
) -> ContractionResult<Boundary<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    overlap_mpo_right_step_par(bra, ket, right, mpo, &WorkerPool::serial())
}

/// Like [`overlap_mpo_right_step`], but distributing the work for each
/// auxiliary index across the threads of `pool`.
pub fn overlap_mpo_right_step_par<M, S>(
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    right: &Boundary<M, S>,
    mpo: &MPOTensor<M, S>,
    pool: &WorkerPool,
) -> ContractionResult<Boundary<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    check_phys(bra, ket)?;
    if right.aux_dim() != mpo.col_dim() {
        return Err(AuxDimMismatch {
            expected: mpo.col_dim(),
            found: right.aux_dim(),
        });
    }
    right.iter()
        .try_for_each(|m| {
            check_boundary_block(m, ket.right_basis(), bra.right_basis())
        })?;
    check_mpo(mpo, ket.phys_basis())?;
    debug!(
        aux_in = mpo.col_dim(),
        aux_out = mpo.row_dim(),
        terms = mpo.n_terms(),
        nthreads = pool.nthreads(),
        "mpo right step"
    );

    let ket_lp = ket.left_paired()?;
    let bra_rp_adj = bra.right_paired()?.adjoint();

    let ts: Vec<BlockMatrix<M, S>>
        = pool.map_indexed(mpo.col_dim(), |b2| {
            if mpo.column(b2).next().is_none() {
                Ok(BlockMatrix::new())
            } else {
                gemm(&ket_lp, &right[b2])
            }
        })?
        .into_iter()
        .collect::<Result<_, _>>()?;

    let out: Vec<BlockMatrix<M, S>>
        = pool.map_indexed(mpo.row_dim(), |b1| -> ContractionResult<_> {
            let o = rbtm_kernel(b1, bra, ket, &ts, mpo)?;
            trace!(b1, blocks = o.n_blocks(), "right step slot");
            Ok(gemm(&o, &bra_rp_adj)?)
        })?
        .into_iter()
        .collect::<ContractionResult<_>>()?;
    Ok(Boundary::from_vec(out))
}

// accumulate Σ_b2 W(b1, b2) · T[b2] into a right-paired block matrix over
// ket left bond × (conjugate physical ⊗ bra right bond)
fn rbtm_kernel<M, S>(
    b1: usize,
    bra: &MPSTensor<M, S>,
    ket: &MPSTensor<M, S>,
    ts: &[BlockMatrix<M, S>],
    mpo: &MPOTensor<M, S>,
) -> ContractionResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let phys = ket.phys_basis();
    let ket_left = ket.left_basis();
    let bra_right = bra.right_basis();
    let in_left_pb = ProductBasis::new(phys, ket_left);
    let out_right_pb = ProductBasis::conjugate(phys, bra_right);
    let mut out: BlockMatrix<M, S> = BlockMatrix::new();

    for (b2, term) in mpo.row(b1) {
        for (in_c, rp_c, _) in ts[b2].iter() {
            if !bra_right.has(&rp_c) { continue; }
            for (so_c, si_c, _) in term.op.iter() {
                let l_c = S::fuse(in_c, S::invert(si_c));
                let Some(l_size) = ket_left.size_of(&l_c) else { continue; };
                let out_c = S::fuse(S::invert(so_c), rp_c);
                let Some(out_cols) = out_right_pb.size(&out_c) else { continue; };
                out.reserve(l_c, out_c, l_size, out_cols)?;
            }
        }
    }
    out.allocate_blocks();

    for (b2, term) in mpo.row(b1) {
        for (in_c, rp_c, tblk) in ts[b2].iter() {
            let Some(rp_size) = bra_right.size_of(&rp_c) else { continue; };
            for (so_c, si_c, w) in term.op.iter() {
                let l_c = S::fuse(in_c, S::invert(si_c));
                let Some(l_size) = ket_left.size_of(&l_c) else { continue; };
                let out_c = S::fuse(S::invert(so_c), rp_c);
                let (Some(in_off), Some(out_off))
                    = (in_left_pb.offset(&si_c, &l_c), out_right_pb.offset(&so_c, &rp_c))
                    else { continue; };
                let Some(target) = out.block_mut(&l_c, &out_c) else { continue; };
                for i_out in 0..w.nrows() {
                    for i_in in 0..w.ncols() {
                        let wv = w.get(i_out, i_in);
                        if wv.is_zero() { continue; }
                        target.add_subblock(
                            term.scale * wv,
                            tblk,
                            (in_off + i_in * l_size, 0),
                            (0, out_off + i_out * rp_size),
                            (l_size, rp_size),
                        );
                    }
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray as nd;
    use approx::assert_relative_eq;
    use rand::{ SeedableRng, rngs::StdRng };
    use crate::{ algorithms::identity_matrix, symmetry::U1 };

    type BM = BlockMatrix<nd::Array2<f64>, U1>;
    type T = MPSTensor<nd::Array2<f64>, U1>;
    type W = MPOTensor<nd::Array2<f64>, U1>;

    fn u1(pairs: &[(i32, usize)]) -> Index<U1> {
        Index::from_parts(
            pairs.iter().map(|(c, _)| *c),
            pairs.iter().map(|(_, d)| *d),
        ).unwrap()
    }

    fn phys() -> Index<U1> { u1(&[(1, 1), (0, 1)]) }

    fn site(left: &[(i32, usize)], right: &[(i32, usize)], seed: u64) -> T {
        let mut rng = StdRng::seed_from_u64(seed);
        MPSTensor::random(phys(), u1(left), u1(right), &mut rng)
    }

    fn number_op() -> BM {
        let mut n: BM = BlockMatrix::new();
        n.insert_block(nd::array![[1.0]], 1, 1).unwrap();
        n.insert_block(nd::array![[0.0]], 0, 0).unwrap();
        n
    }

    #[test]
    fn overlap_steps_agree_with_scalar_overlap() {
        let a = site(&[(0, 1)], &[(1, 1), (0, 1)], 1);
        let b = site(&[(0, 1)], &[(1, 1), (0, 1)], 2);
        let left: BM = identity_matrix(a.left_basis());
        let l1 = overlap_left_step(&a, &b, &left).unwrap();
        let expected = a.scalar_overlap(&b).unwrap();
        assert_relative_eq!(l1.trace(), expected, epsilon = 1e-12);

        let right: BM = identity_matrix(b.right_basis());
        let r1 = overlap_right_step(&a, &b, &right).unwrap();
        assert_relative_eq!(r1.trace(), expected, epsilon = 1e-12);
    }

    #[test]
    fn identity_mpo_matches_plain_overlap() {
        let a = site(&[(1, 1), (0, 1)], &[(2, 1), (1, 2), (0, 1)], 3);
        let b = site(&[(1, 1), (0, 1)], &[(2, 1), (1, 2), (0, 1)], 4);
        let mut w: W = MPOTensor::new(1, 1);
        w.set(0, 0, identity_matrix(&phys()), 1.0).unwrap();

        let left: BM = identity_matrix(a.left_basis());
        let plain = overlap_left_step(&a, &b, &left).unwrap();
        let lb = Boundary::from_vec(vec![left]);
        let with_mpo = overlap_mpo_left_step(&a, &b, &lb, &w).unwrap();
        assert_eq!(with_mpo.aux_dim(), 1);
        for (rc, cc, m) in plain.iter() {
            let o = with_mpo[0].block(&rc, &cc).unwrap();
            m.iter().zip(o.iter())
                .for_each(|(x, y)| { assert_relative_eq!(*x, *y, epsilon = 1e-12); });
        }

        let right: BM = identity_matrix(b.right_basis());
        let plain = overlap_right_step(&a, &b, &right).unwrap();
        let rb = Boundary::from_vec(vec![right]);
        let with_mpo = overlap_mpo_right_step(&a, &b, &rb, &w).unwrap();
        for (rc, cc, m) in plain.iter() {
            let o = with_mpo[0].block(&rc, &cc).unwrap();
            m.iter().zip(o.iter())
                .for_each(|(x, y)| { assert_relative_eq!(*x, *y, epsilon = 1e-12); });
        }
    }

    #[test]
    fn number_operator_single_site() {
        let a = site(&[(0, 1)], &[(1, 1), (0, 1)], 5);
        let mut w: W = MPOTensor::new(1, 1);
        w.set(0, 0, number_op(), 2.0).unwrap();
        let lb = Boundary::from_vec(vec![identity_matrix(a.left_basis())]);
        let l1 = overlap_mpo_left_step(&a, &a, &lb, &w).unwrap();
        // only the occupied sector contributes
        let occupied = a.data()[(1, 1)][[0, 0]];
        assert_relative_eq!(l1[0].trace(), 2.0 * occupied * occupied,
            epsilon = 1e-12);
    }

    #[test]
    fn preconditions_are_checked() {
        let a = site(&[(0, 1)], &[(1, 1), (0, 1)], 6);
        let other: T = MPSTensor::random(
            u1(&[(2, 1), (0, 1)]), u1(&[(0, 1)]), u1(&[(2, 1), (0, 1)]),
            &mut StdRng::seed_from_u64(7),
        );
        let left: BM = identity_matrix(a.left_basis());
        assert!(matches!(
            overlap_left_step(&a, &other, &left),
            Err(PhysicalMismatch),
        ));

        let mut w: W = MPOTensor::new(2, 1);
        w.set(0, 0, identity_matrix(&phys()), 1.0).unwrap();
        let lb = Boundary::from_vec(vec![left.clone()]);
        assert!(matches!(
            overlap_mpo_left_step(&a, &a, &lb, &w),
            Err(AuxDimMismatch { expected: 2, found: 1 }),
        ));

        let mut bad: BM = BlockMatrix::new();
        bad.insert_block(nd::Array2::zeros((2, 1)), 0, 0).unwrap();
        assert!(matches!(
            overlap_left_step(&a, &a, &bad),
            Err(BoundaryBasisMismatch(_)),
        ));
    }

    #[test]
    fn empty_operator_contributes_nothing() {
        let a = site(&[(0, 1)], &[(1, 1), (0, 1)], 8);
        let mut w: W = MPOTensor::new(1, 2);
        w.set(0, 0, identity_matrix(&phys()), 1.0).unwrap();
        w.set(0, 1, BlockMatrix::new(), 1.0).unwrap();
        let lb = Boundary::from_vec(vec![identity_matrix(a.left_basis())]);
        let l1 = overlap_mpo_left_step(&a, &a, &lb, &w).unwrap();
        assert_eq!(l1.aux_dim(), 2);
        assert!(!l1[0].is_empty());
        assert!(l1[1].is_empty());

        let mut w: W = MPOTensor::new(2, 1);
        w.set(0, 0, identity_matrix(&phys()), 1.0).unwrap();
        w.set(1, 0, BlockMatrix::new(), 1.0).unwrap();
        let rb = Boundary::from_vec(vec![identity_matrix(a.right_basis())]);
        let r1 = overlap_mpo_right_step(&a, &a, &rb, &w).unwrap();
        assert_eq!(r1.aux_dim(), 2);
        assert!(!r1[0].is_empty());
        assert!(r1[1].is_empty());
    }

    #[test]
    fn absent_charge_combinations_are_skipped() {
        // only the occupied physical state reaches the right bond; the (0, 0)
        // operator block leads to a right charge outside it
        let a = site(&[(0, 1)], &[(1, 1)], 9);
        let mut op: BM = BlockMatrix::new();
        op.insert_block(nd::array![[2.0]], 1, 1).unwrap();
        op.insert_block(nd::array![[7.0]], 0, 0).unwrap();
        let mut w: W = MPOTensor::new(1, 1);
        w.set(0, 0, op, 1.0).unwrap();
        let x = a.data()[(1, 1)][[0, 0]];

        let lb = Boundary::from_vec(vec![identity_matrix(a.left_basis())]);
        let l1 = overlap_mpo_left_step(&a, &a, &lb, &w).unwrap();
        assert_eq!(l1[0].n_blocks(), 1);
        assert_relative_eq!(l1[0].trace(), 2.0 * x * x, epsilon = 1e-12);

        let rb = Boundary::from_vec(vec![identity_matrix(a.right_basis())]);
        let r1 = overlap_mpo_right_step(&a, &a, &rb, &w).unwrap();
        assert_eq!(r1[0].n_blocks(), 1);
        assert_relative_eq!(r1[0].trace(), 2.0 * x * x, epsilon = 1e-12);
    }

    #[test]
    fn left_boundary_blocks_off_the_bra_bond_are_ignored() {
        let bra = site(&[(0, 1)], &[(1, 2), (0, 1)], 10);
        let ket = site(&[(1, 1), (0, 1)], &[(2, 1), (1, 2), (0, 1)], 11);
        let mut w: W = MPOTensor::new(1, 1);
        w.set(0, 0, identity_matrix(&phys()), 1.0).unwrap();

        let mut clean: BM = BlockMatrix::new();
        clean.insert_block(nd::array![[1.0]], 0, 0).unwrap();
        let mut stray = clean.clone();
        stray.insert_block(nd::array![[1.0]], -1, 1).unwrap();

        let expected = overlap_mpo_left_step(
            &bra, &ket, &Boundary::from_vec(vec![clean]), &w).unwrap();
        let found = overlap_mpo_left_step(
            &bra, &ket, &Boundary::from_vec(vec![stray]), &w).unwrap();
        assert_eq!(found[0], expected[0]);
        assert!(!found[0].is_empty());
    }

    #[test]
    fn right_boundary_blocks_off_the_bra_bond_are_ignored() {
        let bra = site(&[(0, 1), (-1, 1)], &[(0, 1)], 12);
        let ket = site(&[(1, 1), (0, 1), (-1, 1)], &[(1, 1), (0, 1)], 13);
        let mut w: W = MPOTensor::new(1, 1);
        w.set(0, 0, identity_matrix(&phys()), 1.0).unwrap();

        let mut clean: BM = BlockMatrix::new();
        clean.insert_block(nd::array![[1.0]], 0, 0).unwrap();
        let mut stray = clean.clone();
        stray.insert_block(nd::array![[1.0]], 1, -1).unwrap();

        let expected = overlap_mpo_right_step(
            &bra, &ket, &Boundary::from_vec(vec![clean]), &w).unwrap();
        let found = overlap_mpo_right_step(
            &bra, &ket, &Boundary::from_vec(vec![stray]), &w).unwrap();
        assert_eq!(found[0], expected[0]);
        assert!(!found[0].is_empty());
    }
}

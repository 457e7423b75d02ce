//! Conversions between the two pairings of a three-leg site tensor.
//!
//! A site tensor with physical basis `P`, left bond `L`, and right bond `R`
//! is stored as a [`BlockMatrix`] in one of two ways:
//! - *left-paired*: rows run over `P ⊗ L` (charge `s + l`, laid out by
//!   [`ProductBasis::new`]) and columns over `R`;
//! - *right-paired*: rows run over `L` and columns over `P* ⊗ R` (charge
//!   `-s + r`, laid out by [`ProductBasis::conjugate`]).
//!
//! Both conversions first reserve every output block, allocate them all at
//! once, and then copy sub-blocks into place.

use num_traits::One;
use crate::{
    block_matrix::{ BlockMatrix, BlockMatrixError, BlockMatrixResult },
    dense::DenseBlock,
    index::Index,
    product_basis::ProductBasis,
    symmetry::SymmGroup,
};

fn check_extent<M, S>(
    rc: &S::Charge,
    cc: &S::Charge,
    block: &M,
    needed: (usize, usize),
) -> BlockMatrixResult<()>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let (r, c) = block.shape();
    if r < needed.0 || c < needed.1 {
        Err(BlockMatrixError::ShapeMismatch(
            format!("({:?}, {:?})", rc, cc), (r, c), needed))
    } else {
        Ok(())
    }
}

/// Convert left-paired data to right-paired data.
///
/// `phys`, `left`, and `right` are the bases of the tensor. Input blocks at
/// `(s + l, r)` are split by physical charge `s` and regrouped at
/// `(l, -s + r)`. Combinations whose charges are missing from the bases are
/// skipped.
///
/// Fails if an input block is too small for the sectors it claims, or if the
/// regrouped blocks break the matching rule.
pub fn reshape_left_to_right<M, S>(
    phys: &Index<S>,
    left: &Index<S>,
    right: &Index<S>,
    m: &BlockMatrix<M, S>,
) -> BlockMatrixResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let in_left_pb = ProductBasis::new(phys, left);
    let out_right_pb = ProductBasis::conjugate(phys, right);
    let mut out: BlockMatrix<M, S> = BlockMatrix::new();

    for (pc, rc, _) in m.iter() {
        if !right.has(&rc) { continue; }
        for s in phys.charges() {
            let lc = S::fuse(pc, S::invert(s));
            let Some(dl) = left.size_of(&lc) else { continue; };
            let oc = S::fuse(S::invert(s), rc);
            let Some(out_cols) = out_right_pb.size(&oc) else { continue; };
            out.reserve(lc, oc, dl, out_cols)?;
        }
    }
    out.allocate_blocks();

    for (pc, rc, block) in m.iter() {
        let Some(dr) = right.size_of(&rc) else { continue; };
        for (s, ds) in phys.iter() {
            let lc = S::fuse(pc, S::invert(s));
            let Some(dl) = left.size_of(&lc) else { continue; };
            let oc = S::fuse(S::invert(s), rc);
            let (Some(in_off), Some(out_off))
                = (in_left_pb.offset(&s, &lc), out_right_pb.offset(&s, &rc))
                else { continue; };
            check_extent::<M, S>(&pc, &rc, block, (in_off + ds * dl, dr))?;
            let Some(target) = out.block_mut(&lc, &oc) else { continue; };
            for ss in 0..ds {
                target.add_subblock(
                    M::Elem::one(),
                    block,
                    (in_off + ss * dl, 0),
                    (0, out_off + ss * dr),
                    (dl, dr),
                );
            }
        }
    }
    Ok(out)
}

/// Convert right-paired data to left-paired data.
///
/// `phys`, `left`, and `right` are the bases of the tensor. Input blocks at
/// `(l, -s + r)` are split by physical charge `s` and regrouped at
/// `(s + l, r)`. Combinations whose charges are missing from the bases are
/// skipped.
///
/// Fails if an input block is too small for the sectors it claims, or if the
/// regrouped blocks break the matching rule.
pub fn reshape_right_to_left<M, S>(
    phys: &Index<S>,
    left: &Index<S>,
    right: &Index<S>,
    m: &BlockMatrix<M, S>,
) -> BlockMatrixResult<BlockMatrix<M, S>>
where
    M: DenseBlock,
    S: SymmGroup,
{
    let in_right_pb = ProductBasis::conjugate(phys, right);
    let out_left_pb = ProductBasis::new(phys, left);
    let mut out: BlockMatrix<M, S> = BlockMatrix::new();

    for (lc, pc, _) in m.iter() {
        if !left.has(&lc) { continue; }
        for s in phys.charges() {
            let rc = S::fuse(pc, s);
            let Some(dr) = right.size_of(&rc) else { continue; };
            let oc = S::fuse(s, lc);
            let Some(out_rows) = out_left_pb.size(&oc) else { continue; };
            out.reserve(oc, rc, out_rows, dr)?;
        }
    }
    out.allocate_blocks();

    for (lc, pc, block) in m.iter() {
        let Some(dl) = left.size_of(&lc) else { continue; };
        for (s, ds) in phys.iter() {
            let rc = S::fuse(pc, s);
            let Some(dr) = right.size_of(&rc) else { continue; };
            let oc = S::fuse(s, lc);
            let (Some(in_off), Some(out_off))
                = (in_right_pb.offset(&s, &rc), out_left_pb.offset(&s, &lc))
                else { continue; };
            check_extent::<M, S>(&lc, &pc, block, (dl, in_off + ds * dr))?;
            let Some(target) = out.block_mut(&oc, &rc) else { continue; };
            for ss in 0..ds {
                target.add_subblock(
                    M::Elem::one(),
                    block,
                    (0, in_off + ss * dr),
                    (out_off + ss * dl, 0),
                    (dl, dr),
                );
            }
        }
    }
    Ok(out)
}

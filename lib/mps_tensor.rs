//! Site tensors of a matrix product state.
//!
//! An [`MPSTensor`] carries a physical basis and two bond bases, plus its data
//! as a [`BlockMatrix`] in either the left- or right-paired layout (see
//! [`reshape`][crate::reshape]). The pairing is converted lazily, only when an
//! operation needs the other layout.
//!
//! ```
//! use ndarray as nd;
//! use rand::{ SeedableRng, rngs::StdRng };
//! use symm_blocks::{ index::Index, mps_tensor::MPSTensor, symmetry::U1 };
//!
//! let phys: Index<U1> = Index::from_parts([1, 0], [1, 1]).unwrap();
//! let left: Index<U1> = Index::from_parts([0], [1]).unwrap();
//! let right: Index<U1> = Index::from_parts([1, 0], [1, 1]).unwrap();
//! let mut rng = StdRng::seed_from_u64(10546);
//! let mut a: MPSTensor<nd::Array2<f64>, U1>
//!     = MPSTensor::random(phys, left, right, &mut rng);
//! let n0 = a.scalar_norm();
//! a.make_right_paired().unwrap();
//! assert!((a.scalar_norm() - n0).abs() < 1e-12);
//! ```

use std::borrow::Cow;
use num_traits::{ Float, Zero };
use rand::{ Rng, distributions::{ Distribution, Standard } };
use thiserror::Error;
use crate::{
    ComplexFloatExt,
    algorithms::{ gemm, lq, qr },
    block_matrix::{ BlockMatrix, BlockMatrixError },
    dense::DenseBlock,
    index::Index,
    product_basis::ProductBasis,
    reshape::{ reshape_left_to_right, reshape_right_to_left },
    symmetry::SymmGroup,
};

#[derive(Debug, Error)]
pub enum MPSError {
    /// Returned when tensor data holds a block that does not fit the tensor's
    /// bases.
    #[error("error in MPS tensor creation: block {0} does not fit the tensor's bases")]
    DataMismatch(String),

    /// Returned when attempting to combine two tensors with different bases.
    #[error("error in MPS tensor operation: tensors have different {0} bases")]
    BasisMismatch(&'static str),

    #[error("block matrix error: {0}")]
    BlockMatrixError(#[from] BlockMatrixError),
}
use MPSError::*;
pub type MPSResult<T> = Result<T, MPSError>;

/// Layout of an [`MPSTensor`]'s data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Pairing {
    /// Rows run over physical ⊗ left bond; columns over right bond.
    Left,
    /// Rows run over left bond; columns over conjugate physical ⊗ right
    /// bond.
    Right,
}

/// A single site tensor.
#[derive(Clone, Debug)]
pub struct MPSTensor<M, S: SymmGroup> {
    phys: Index<S>,
    left: Index<S>,
    right: Index<S>,
    data: BlockMatrix<M, S>,
    pairing: Pairing,
}

impl<M, S> MPSTensor<M, S>
where
    M: DenseBlock,
    S: SymmGroup,
{
    /// Create a new left-paired tensor with a zero block for every charge
    /// sector allowed by the bases.
    ///
    /// A block is created at `(c, c)` for every charge `c` present in both
    /// the fused physical ⊗ left basis and the right basis.
    pub fn zeros(phys: Index<S>, left: Index<S>, right: Index<S>) -> Self {
        let pb = ProductBasis::new(&phys, &left);
        let mut rows: Index<S> = Index::new();
        let mut cols: Index<S> = Index::new();
        let mut data: Vec<M> = Vec::new();
        for (c, d) in pb.basis().iter() {
            let Some(dr) = right.size_of(&c) else { continue; };
            if rows.push(c, d).is_ok() && cols.push(c, dr).is_ok() {
                data.push(M::zeros(d, dr));
            }
        }
        let data = BlockMatrix::from_raw_parts(rows, cols, data);
        Self { phys, left, right, data, pairing: Pairing::Left }
    }

    /// Like [`Self::zeros`], but with every element drawn from the standard
    /// distribution.
    pub fn random<R>(phys: Index<S>, left: Index<S>, right: Index<S>, rng: &mut R)
        -> Self
    where
        R: Rng + ?Sized,
        Standard: Distribution<M::Elem>,
    {
        let mut new = Self::zeros(phys, left, right);
        new.data.generate(|| rng.gen());
        new
    }

    /// Create a new tensor from existing data in a given pairing.
    ///
    /// Fails if any block's charges are absent from the corresponding bases,
    /// or its shape differs from the sector sizes.
    pub fn from_data(
        phys: Index<S>,
        left: Index<S>,
        right: Index<S>,
        data: BlockMatrix<M, S>,
        pairing: Pairing,
    ) -> MPSResult<Self>
    {
        let (row_basis, col_basis) = match pairing {
            Pairing::Left => (
                ProductBasis::new(&phys, &left).into_basis(),
                right.clone(),
            ),
            Pairing::Right => (
                left.clone(),
                ProductBasis::conjugate(&phys, &right).into_basis(),
            ),
        };
        for (rc, cc, m) in data.iter() {
            let expected = (row_basis.size_of(&rc), col_basis.size_of(&cc));
            if expected != (Some(m.nrows()), Some(m.ncols())) {
                return Err(DataMismatch(format!("({:?}, {:?})", rc, cc)));
            }
        }
        Ok(Self { phys, left, right, data, pairing })
    }

    /// Return the physical basis.
    pub fn phys_basis(&self) -> &Index<S> { &self.phys }

    /// Return the left bond basis.
    pub fn left_basis(&self) -> &Index<S> { &self.left }

    /// Return the right bond basis.
    pub fn right_basis(&self) -> &Index<S> { &self.right }

    /// Return the current pairing.
    pub fn pairing(&self) -> Pairing { self.pairing }

    /// Return a reference to the data in its current pairing.
    pub fn data(&self) -> &BlockMatrix<M, S> { &self.data }

    /// Return a mutable reference to the data in its current pairing.
    pub fn data_mut(&mut self) -> &mut BlockMatrix<M, S> { &mut self.data }

    /// Consume `self`, returning only the data in its current pairing.
    pub fn into_data(self) -> BlockMatrix<M, S> { self.data }

    /// Convert the data to the left-paired layout, if it isn't already.
    pub fn make_left_paired(&mut self) -> MPSResult<()> {
        if self.pairing == Pairing::Right {
            self.data = reshape_right_to_left(
                &self.phys, &self.left, &self.right, &self.data)?;
            self.pairing = Pairing::Left;
        }
        Ok(())
    }

    /// Convert the data to the right-paired layout, if it isn't already.
    pub fn make_right_paired(&mut self) -> MPSResult<()> {
        if self.pairing == Pairing::Left {
            self.data = reshape_left_to_right(
                &self.phys, &self.left, &self.right, &self.data)?;
            self.pairing = Pairing::Right;
        }
        Ok(())
    }

    /// Return the data in the left-paired layout without modifying `self`.
    pub fn left_paired(&self) -> MPSResult<Cow<'_, BlockMatrix<M, S>>> {
        match self.pairing {
            Pairing::Left => Ok(Cow::Borrowed(&self.data)),
            Pairing::Right => Ok(Cow::Owned(reshape_right_to_left(
                &self.phys, &self.left, &self.right, &self.data)?)),
        }
    }

    /// Return the data in the right-paired layout without modifying `self`.
    pub fn right_paired(&self) -> MPSResult<Cow<'_, BlockMatrix<M, S>>> {
        match self.pairing {
            Pairing::Right => Ok(Cow::Borrowed(&self.data)),
            Pairing::Left => Ok(Cow::Owned(reshape_left_to_right(
                &self.phys, &self.left, &self.right, &self.data)?)),
        }
    }

    /// Bring `self` into left-canonical form by a block QR decomposition,
    /// returning the triangular factor to be absorbed into the next site to
    /// the right.
    ///
    /// The right bond basis is replaced by the QR bond basis.
    pub fn normalize_left(&mut self) -> MPSResult<BlockMatrix<M, S>> {
        self.make_left_paired()?;
        let (q, r) = qr(&self.data)?;
        self.right = q.right_basis().sorted();
        self.data = q;
        Ok(r)
    }

    /// Bring `self` into right-canonical form by a block LQ decomposition,
    /// returning the triangular factor to be absorbed into the next site to
    /// the left.
    ///
    /// The left bond basis is replaced by the LQ bond basis.
    pub fn normalize_right(&mut self) -> MPSResult<BlockMatrix<M, S>> {
        self.make_right_paired()?;
        let (l, q) = lq(&self.data)?;
        self.left = q.left_basis().sorted();
        self.data = q;
        Ok(l)
    }

    /// Multiply by a matrix acting on the left bond, replacing the left bond
    /// basis with the row basis of `m`.
    pub fn multiply_from_left(&mut self, m: &BlockMatrix<M, S>)
        -> MPSResult<()>
    {
        self.make_right_paired()?;
        self.data = gemm(m, &self.data)?;
        self.left = m.left_basis().sorted();
        Ok(())
    }

    /// Multiply by a matrix acting on the right bond, replacing the right bond
    /// basis with the column basis of `m`.
    pub fn multiply_from_right(&mut self, m: &BlockMatrix<M, S>)
        -> MPSResult<()>
    {
        self.make_left_paired()?;
        self.data = gemm(&self.data, m)?;
        self.right = m.right_basis().sorted();
        Ok(())
    }

    /// Multiply every element by `a`.
    pub fn scale(&mut self, a: M::Elem) { self.data.scale(a); }

    /// Return the Frobenius norm, which is independent of the pairing.
    pub fn scalar_norm(&self) -> M::Real { self.data.norm() }

    /// Return `Σ conj(self) · other` over all elements.
    ///
    /// Fails if the tensors have different bases.
    pub fn scalar_overlap(&self, other: &Self) -> MPSResult<M::Elem> {
        if !self.phys.same_sectors(&other.phys) {
            return Err(BasisMismatch("physical"));
        }
        if !self.left.same_sectors(&other.left) {
            return Err(BasisMismatch("left"));
        }
        if !self.right.same_sectors(&other.right) {
            return Err(BasisMismatch("right"));
        }
        let a = self.left_paired()?;
        let b = other.left_paired()?;
        let ov
            = a.iter()
            .filter_map(|(rc, cc, ma)| {
                b.block(&rc, &cc)
                    .filter(|mb| mb.shape() == ma.shape())
                    .map(|mb| ma.adjoint().matmul(mb).trace())
            })
            .fold(M::Elem::zero(), |acc, x| acc + x);
        Ok(ov)
    }

    /// Divide by the norm, returning the norm.
    pub fn normalize(&mut self) -> M::Real {
        let norm = self.scalar_norm();
        if norm > M::Real::zero() {
            self.data.scale(M::Elem::from_re(Float::recip(norm)));
        }
        norm
    }
}

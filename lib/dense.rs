//! Dense rectangular blocks.
//!
//! The block-sparse layer is generic over the type of its dense blocks: any
//! type implementing [`DenseBlock`] can be used. An implementation for
//! [`ndarray::Array2`] over LAPACK-capable scalars is provided.

use std::fmt;
use ndarray as nd;
use ndarray_linalg::{ QR, SVDInto, error::LinalgError };
use num_complex::ComplexFloat;
use num_traits::{ Float, Zero };
use thiserror::Error;
use crate::{ ComplexFloatExt, ComplexScalar };

#[derive(Debug, Error)]
pub enum DenseError {
    /// Returned when a LAPACK routine fails.
    #[error("error in dense decomposition: {0}")]
    Linalg(#[from] LinalgError),

    /// Returned when a decomposition does not produce all requested factors.
    #[error("error in dense decomposition: missing factor {0}")]
    MissingFactor(&'static str),

    /// Returned by backends for failures not covered above.
    #[error("error in dense backend: {0}")]
    Backend(String),
}
pub type DenseResult<T> = Result<T, DenseError>;

/// Thin singular value decomposition of a single dense block.
///
/// For an `m × n` block with `k = min(m, n)`, `u` is `m × k`, `s` holds the
/// `k` singular values in descending order, and `v` is `k × n`, such that
/// the block equals `u · diag(s) · v`.
#[derive(Clone, Debug)]
pub struct BlockSvd<M: DenseBlock> {
    pub u: M,
    pub s: Vec<M::Real>,
    pub v: M,
}

/// Capabilities of a dense rectangular block of numbers.
///
/// All shapes are `(rows, columns)`. Methods taking two blocks that must
/// agree in shape may panic if they do not.
pub trait DenseBlock: Clone + fmt::Debug + Send + Sync {
    /// Element type.
    type Elem: ComplexFloat<Real = Self::Real> + ComplexFloatExt
        + fmt::Debug + Send + Sync + 'static;

    /// Type of real values associated with elements, e.g. singular values.
    type Real: Float + fmt::Debug + Send + Sync + 'static;

    /// Create a new block of zeros.
    fn zeros(rows: usize, cols: usize) -> Self;

    /// Create a new square identity block.
    fn identity(n: usize) -> Self;

    /// Create a new square block with `diag` on the diagonal.
    fn from_diagonal(diag: &[Self::Real]) -> Self;

    /// Return the shape of the block.
    fn shape(&self) -> (usize, usize);

    /// Return the number of rows.
    fn nrows(&self) -> usize { self.shape().0 }

    /// Return the number of columns.
    fn ncols(&self) -> usize { self.shape().1 }

    /// Return the element at `(i, j)`.
    fn get(&self, i: usize, j: usize) -> Self::Elem;

    /// Set the element at `(i, j)`.
    fn set(&mut self, i: usize, j: usize, val: Self::Elem);

    /// Change the shape of the block, keeping the overlapping upper-left
    /// region and filling new elements with zero.
    fn resize(&mut self, rows: usize, cols: usize);

    /// Add another block of the same shape to `self`.
    fn add_assign_block(&mut self, other: &Self);

    /// Subtract another block of the same shape from `self`.
    fn sub_assign_block(&mut self, other: &Self);

    /// Multiply every element by `a`.
    fn scale(&mut self, a: Self::Elem);

    /// Add `alpha` times the `extent`-shaped region of `src` beginning at
    /// `src_origin` to the region of `self` beginning at `dst_origin`.
    fn add_subblock(
        &mut self,
        alpha: Self::Elem,
        src: &Self,
        src_origin: (usize, usize),
        dst_origin: (usize, usize),
        extent: (usize, usize),
    );

    /// Compute the matrix product `self · rhs`.
    fn matmul(&self, rhs: &Self) -> Self;

    /// Return the transpose.
    fn transpose(&self) -> Self;

    /// Return the elementwise complex conjugate.
    fn conjugate(&self) -> Self;

    /// Return the conjugate transpose.
    fn adjoint(&self) -> Self { self.transpose().conjugate() }

    /// Return the sum of the diagonal elements.
    fn trace(&self) -> Self::Elem;

    /// Return the sum of the squared moduli of all elements.
    fn norm_sqr(&self) -> Self::Real;

    /// Overwrite every element with successive outputs of `f`, in row-major
    /// order.
    fn generate<F>(&mut self, f: F)
    where F: FnMut() -> Self::Elem;

    /// Compute the thin singular value decomposition.
    fn svd(&self) -> DenseResult<BlockSvd<Self>>;

    /// Compute the thin QR decomposition `(q, r)`: for an `m × n` block with
    /// `k = min(m, n)`, `q` is `m × k` with orthonormal columns and `r` is
    /// `k × n` upper triangular.
    fn qr(&self) -> DenseResult<(Self, Self)>;
}

impl<A> DenseBlock for nd::Array2<A>
where
    A: ComplexScalar,
    nd::Array2<A>:
        SVDInto<U = nd::Array2<A>, Sigma = nd::Array1<A::Re>, VT = nd::Array2<A>>
        + QR<Q = nd::Array2<A>, R = nd::Array2<A>>,
{
    type Elem = A;
    type Real = A::Re;

    fn zeros(rows: usize, cols: usize) -> Self {
        nd::Array2::zeros((rows, cols))
    }

    fn identity(n: usize) -> Self { nd::Array2::eye(n) }

    fn from_diagonal(diag: &[A::Re]) -> Self {
        let d: nd::Array1<A> = diag.iter().map(|x| A::from_re(*x)).collect();
        nd::Array2::from_diag(&d)
    }

    fn shape(&self) -> (usize, usize) { self.dim() }

    fn get(&self, i: usize, j: usize) -> A { self[[i, j]] }

    fn set(&mut self, i: usize, j: usize, val: A) { self[[i, j]] = val; }

    fn resize(&mut self, rows: usize, cols: usize) {
        if self.dim() == (rows, cols) { return; }
        let (r0, c0) = self.dim();
        let (rk, ck) = (r0.min(rows), c0.min(cols));
        let mut new: nd::Array2<A> = nd::Array2::zeros((rows, cols));
        new.slice_mut(nd::s![..rk, ..ck])
            .assign(&self.slice(nd::s![..rk, ..ck]));
        *self = new;
    }

    fn add_assign_block(&mut self, other: &Self) {
        self.zip_mut_with(other, |a, b| { *a = *a + *b; });
    }

    fn sub_assign_block(&mut self, other: &Self) {
        self.zip_mut_with(other, |a, b| { *a = *a - *b; });
    }

    fn scale(&mut self, a: A) {
        self.mapv_inplace(|x| x * a);
    }

    fn add_subblock(
        &mut self,
        alpha: A,
        src: &Self,
        src_origin: (usize, usize),
        dst_origin: (usize, usize),
        extent: (usize, usize),
    ) {
        let (sr, sc) = src_origin;
        let (dr, dc) = dst_origin;
        let (nr, nc) = extent;
        let src_view = src.slice(nd::s![sr..sr + nr, sc..sc + nc]);
        self.slice_mut(nd::s![dr..dr + nr, dc..dc + nc])
            .zip_mut_with(&src_view, |d, s| { *d = *d + alpha * *s; });
    }

    fn matmul(&self, rhs: &Self) -> Self { self.dot(rhs) }

    fn transpose(&self) -> Self {
        self.t().as_standard_layout().into_owned()
    }

    fn conjugate(&self) -> Self { self.mapv(|x| x.conj()) }

    fn trace(&self) -> A {
        self.diag().iter().fold(A::zero(), |acc, x| acc + *x)
    }

    fn norm_sqr(&self) -> A::Re {
        self.iter()
            .map(|x| Float::powi(x.abs(), 2))
            .fold(A::Re::zero(), |acc, x| acc + x)
    }

    fn generate<F>(&mut self, mut f: F)
    where F: FnMut() -> A
    {
        self.iter_mut().for_each(|x| { *x = f(); });
    }

    fn svd(&self) -> DenseResult<BlockSvd<Self>> {
        let (m, n) = self.dim();
        let k = m.min(n);
        if k == 0 {
            return Ok(BlockSvd {
                u: nd::Array2::zeros((m, 0)),
                s: Vec::new(),
                v: nd::Array2::zeros((0, n)),
            });
        }
        let (mb_u, s, mb_vt)
            = self.as_standard_layout().into_owned().svd_into(true, true)?;
        let u = mb_u.ok_or(DenseError::MissingFactor("U"))?;
        let vt = mb_vt.ok_or(DenseError::MissingFactor("VT"))?;
        let u = u.slice(nd::s![.., ..k]).to_owned();
        let v = vt.slice(nd::s![..k, ..]).to_owned();
        let s: Vec<A::Re> = s.iter().take(k).copied().collect();
        Ok(BlockSvd { u, s, v })
    }

    fn qr(&self) -> DenseResult<(Self, Self)> {
        let (m, n) = self.dim();
        let k = m.min(n);
        if k == 0 {
            return Ok((nd::Array2::zeros((m, 0)), nd::Array2::zeros((0, n))));
        }
        let (q, r) = QR::qr(&self.as_standard_layout().into_owned())?;
        Ok((q, r))
    }
}

/// Return `true` if `a` and `b` have the same shape and all elements differ
/// in modulus by at most `tol`.
pub fn approx_eq<M>(a: &M, b: &M, tol: M::Real) -> bool
where M: DenseBlock
{
    let (m, n) = a.shape();
    if b.shape() != (m, n) { return false; }
    (0..m).all(|i| {
        (0..n).all(|j| (a.get(i, j) - b.get(i, j)).abs() <= tol)
    })
}

/// Return `true` if the columns of `a` are orthonormal to within `tol`.
pub fn is_column_orthonormal<M>(a: &M, tol: M::Real) -> bool
where M: DenseBlock
{
    let k = a.ncols();
    approx_eq(&a.adjoint().matmul(a), &M::identity(k), tol)
}

/// Return `true` if the rows of `a` are orthonormal to within `tol`.
pub fn is_row_orthonormal<M>(a: &M, tol: M::Real) -> bool
where M: DenseBlock
{
    let k = a.nrows();
    approx_eq(&a.matmul(&a.adjoint()), &M::identity(k), tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex64 as C64;

    #[test]
    fn resize_pads_and_truncates() {
        let mut a: nd::Array2<f64> = nd::array![[1.0, 2.0], [3.0, 4.0]];
        a.resize(3, 2);
        assert_eq!(a, nd::array![[1.0, 2.0], [3.0, 4.0], [0.0, 0.0]]);
        a.resize(1, 3);
        assert_eq!(a, nd::array![[1.0, 2.0, 0.0]]);
    }

    #[test]
    fn add_subblock_offsets() {
        let src: nd::Array2<f64>
            = nd::array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let mut dst: nd::Array2<f64> = DenseBlock::zeros(3, 3);
        dst.add_subblock(2.0, &src, (0, 1), (1, 0), (2, 2));
        assert_eq!(dst, nd::array![
            [0.0,  0.0, 0.0],
            [4.0,  6.0, 0.0],
            [10.0, 12.0, 0.0],
        ]);
    }

    #[test]
    fn svd_reconstructs() {
        let a: nd::Array2<f64>
            = nd::array![[1.0, 2.0, 0.5], [0.0, -1.0, 3.0]];
        let BlockSvd { u, s, v } = DenseBlock::svd(&a).unwrap();
        assert_eq!(u.dim(), (2, 2));
        assert_eq!(v.dim(), (2, 3));
        assert!(s[0] >= s[1]);
        let sd = <nd::Array2<f64> as DenseBlock>::from_diagonal(&s);
        let rec = u.matmul(&sd).matmul(&v);
        assert!(approx_eq(&rec, &a, 1e-12));
        assert!(is_column_orthonormal(&u, 1e-12));
        assert!(is_row_orthonormal(&v, 1e-12));
    }

    #[test]
    fn qr_reconstructs_complex() {
        let a: nd::Array2<C64> = nd::array![
            [C64::new(1.0, 1.0), C64::new(0.0, 2.0)],
            [C64::new(2.0, 0.0), C64::new(1.0, -1.0)],
            [C64::new(0.0, 0.0), C64::new(3.0, 0.5)],
        ];
        let (q, r) = DenseBlock::qr(&a).unwrap();
        assert_eq!(q.dim(), (3, 2));
        assert_eq!(r.dim(), (2, 2));
        assert!(approx_eq(&q.matmul(&r), &a, 1e-12));
        assert!(is_column_orthonormal(&q, 1e-12));
        assert_relative_eq!(r[[1, 0]].norm(), 0.0);
    }

    #[test]
    fn trace_and_norm() {
        let a: nd::Array2<f64> = nd::array![[1.0, 2.0], [3.0, -4.0]];
        assert_relative_eq!(DenseBlock::trace(&a), -3.0);
        assert_relative_eq!(a.norm_sqr(), 30.0);
        let z: nd::Array2<C64> = nd::array![[C64::new(0.0, 1.0)]];
        assert_eq!(z.conjugate()[[0, 0]], C64::new(0.0, -1.0));
    }
}

//! Symmetry-adapted block-sparse tensor algebra for matrix product state
//! simulations.
//!
//! Vector spaces carrying a conserved abelian charge decompose into sectors,
//! described by an [`Index`][index::Index]. Operators between such spaces are
//! stored as [`BlockMatrix`][block_matrix::BlockMatrix]es: sparse collections
//! of dense blocks, one per pair of matching sectors. On top of these sit
//! block-wise linear algebra ([`algorithms`]), site tensors
//! ([`mps_tensor`], [`mpo_tensor`]), and the boundary contractions used to
//! build left and right environments along a chain ([`contraction`]).

use std::fmt;
use num_complex::{ ComplexFloat, Complex };
use num_traits::{ Float, Zero };

pub mod symmetry;
pub mod index;
pub mod product_basis;
pub mod dense;
pub mod block_matrix;
pub mod algorithms;
pub mod reshape;
pub mod mps_tensor;
pub mod mpo_tensor;
pub mod boundary;
pub mod pool;
pub mod contraction;
pub mod network;

/// Extension trait for [`ComplexFloat`].
pub trait ComplexFloatExt: ComplexFloat {
    /// Convert from `Self::Real`.
    ///
    /// Should adhere to the usual relationship between ordinary complex and
    /// real numbers, i.e. the result should have imaginary part equal to zero.
    fn from_re(x: Self::Real) -> Self;
}

impl<T> ComplexFloatExt for Complex<T>
where
    Complex<T>: ComplexFloat<Real = T>,
    T: Zero + Float,
{
    fn from_re(x: Self::Real) -> Self {
        Self { re: x, im: <Self::Real as Zero>::zero() }
    }
}

impl ComplexFloatExt for f32 {
    fn from_re(x: f32) -> Self { x }
}

impl ComplexFloatExt for f64 {
    fn from_re(x: f64) -> Self { x }
}

/// Convenience trait to identify number types that can be stored in dense
/// blocks.
pub trait ComplexScalar
where
    Self:
        ComplexFloat<Real = Self::Re>
        + ComplexFloatExt
        + fmt::Debug
        + Send
        + Sync
        + 'static
{
    /// Type for associated real values.
    type Re: Float + fmt::Debug + Send + Sync + 'static;
}

impl<A> ComplexScalar for A
where
    A: ComplexFloat + ComplexFloatExt + fmt::Debug + Send + Sync + 'static,
    <A as ComplexFloat>::Real: fmt::Debug + Send + Sync + 'static,
{
    type Re = <A as ComplexFloat>::Real;
}

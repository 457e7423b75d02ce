//! Abelian charge models.
//!
//! A [`SymmGroup`] fixes the type of conserved quantum numbers ("charges")
//! carried by the sectors of a vector space, along with the group operation
//! ("fusion") used to combine them.
//!
//! ```
//! use symm_blocks::symmetry::{ SymmGroup, U1, TwoU1, Zq };
//!
//! assert_eq!(U1::fuse(2, -3), -1);
//! assert_eq!(U1::invert(4), -4);
//! assert_eq!(TwoU1::fuse([1, 0], [0, 1]), [1, 1]);
//! assert_eq!(Zq::<3>::fuse(2, 2), 1);
//! ```

use std::{ fmt, hash::Hash };

/// Describes an abelian symmetry group.
///
/// Implementors must satisfy the group axioms:
/// - `fuse(a, fuse(b, c)) == fuse(fuse(a, b), c)`
/// - `fuse(a, b) == fuse(b, a)`
/// - `fuse(a, identity()) == a`
/// - `fuse(a, invert(a)) == identity()`
///
/// Charges are totally ordered; bases built from them are kept in
/// descending order by default.
pub trait SymmGroup: Copy + fmt::Debug + Send + Sync + 'static {
    /// Type of a single charge.
    type Charge: Copy + Ord + Hash + fmt::Debug + Send + Sync + 'static;

    /// Return the identity charge.
    fn identity() -> Self::Charge;

    /// Combine two charges.
    fn fuse(a: Self::Charge, b: Self::Charge) -> Self::Charge;

    /// Return the inverse of a charge under fusion.
    fn invert(a: Self::Charge) -> Self::Charge;

    /// Fuse an arbitrary number of charges, starting from the identity.
    fn fuse_all<I>(charges: I) -> Self::Charge
    where I: IntoIterator<Item = Self::Charge>
    {
        charges.into_iter().fold(Self::identity(), Self::fuse)
    }
}

/// The trivial group; every sector carries the same charge.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrivialGroup;

impl SymmGroup for TrivialGroup {
    type Charge = ();

    fn identity() -> Self::Charge { }

    fn fuse(_a: (), _b: ()) -> Self::Charge { }

    fn invert(_a: ()) -> Self::Charge { }
}

/// U(1) symmetry, e.g. particle number or total *S*<sup>*z*</sup> (in units
/// of 1/2).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct U1;

impl SymmGroup for U1 {
    type Charge = i32;

    fn identity() -> Self::Charge { 0 }

    fn fuse(a: i32, b: i32) -> Self::Charge { a + b }

    fn invert(a: i32) -> Self::Charge { -a }
}

/// Two independent U(1) charges, e.g. spin-up and spin-down particle numbers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TwoU1;

impl SymmGroup for TwoU1 {
    type Charge = [i32; 2];

    fn identity() -> Self::Charge { [0, 0] }

    fn fuse(a: [i32; 2], b: [i32; 2]) -> Self::Charge {
        [a[0] + b[0], a[1] + b[1]]
    }

    fn invert(a: [i32; 2]) -> Self::Charge { [-a[0], -a[1]] }
}

/// Cyclic group Z<sub>*N*</sub>, e.g. fermion parity for `N = 2`.
///
/// Charges are always reduced to `0 .. N`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Zq<const N: u32>;

impl<const N: u32> SymmGroup for Zq<N> {
    type Charge = u32;

    fn identity() -> Self::Charge { 0 }

    fn fuse(a: u32, b: u32) -> Self::Charge { (a + b) % N }

    fn invert(a: u32) -> Self::Charge { (N - a % N) % N }
}

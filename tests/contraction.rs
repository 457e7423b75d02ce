use approx::assert_relative_eq;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::{ Rng, SeedableRng, rngs::StdRng };
use symm_blocks::{
    algorithms::identity_matrix,
    block_matrix::BlockMatrix,
    boundary::Boundary,
    contraction::*,
    index::Index,
    mpo_tensor::MPOTensor,
    mps_tensor::MPSTensor,
    network::*,
    pool::WorkerPool,
    product_basis::ProductBasis,
    symmetry::U1,
};

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

fn bonds() -> Vec<Index<U1>> {
    vec![
        u1(&[(0, 1)]),
        u1(&[(1, 1), (0, 1)]),
        u1(&[(2, 1), (1, 2)]),
        u1(&[(2, 1)]),
    ]
}

fn random_chain(seed: u64) -> Vec<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    bonds().windows(2)
        .map(|lr| {
            MPSTensor::random(phys(), lr[0].clone(), lr[1].clone(), &mut rng)
        })
        .collect()
}

fn number_op() -> BM {
    let mut n: BM = BlockMatrix::new();
    n.insert_block(nd::array![[1.0]], 1, 1).unwrap();
    n.insert_block(nd::array![[0.0]], 0, 0).unwrap();
    n
}

// N = Σ_i n_i as an upper-triangular MPO
fn number_mpo(nsites: usize) -> Vec<W> {
    let id: BM = identity_matrix(&phys());
    let n = number_op();
    let mut first: W = MPOTensor::new(1, 2);
    first.set(0, 0, id.clone(), 1.0).unwrap();
    first.set(0, 1, n.clone(), 1.0).unwrap();
    let mut bulk: W = MPOTensor::new(2, 2);
    bulk.set(0, 0, id.clone(), 1.0).unwrap();
    bulk.set(0, 1, n.clone(), 1.0).unwrap();
    bulk.set(1, 1, id.clone(), 1.0).unwrap();
    let mut last: W = MPOTensor::new(2, 1);
    last.set(0, 0, n, 1.0).unwrap();
    last.set(1, 0, id, 1.0).unwrap();
    let mut mpo = vec![first];
    (0..nsites.saturating_sub(2)).for_each(|_| { mpo.push(bulk.clone()); });
    mpo.push(last);
    mpo
}

fn create_op() -> BM {
    let mut c: BM = BlockMatrix::new();
    c.insert_block(nd::array![[1.0]], 1, 0).unwrap();
    c
}

fn annihilate_op() -> BM {
    let mut c: BM = BlockMatrix::new();
    c.insert_block(nd::array![[1.0]], 0, 1).unwrap();
    c
}

// H = Σ_i (c†_i c_{i+1} + c_i c†_{i+1}); auxiliary states are
// 0 = nothing placed, 1 = c† placed, 2 = c placed, 3 = done
fn hopping_mpo(nsites: usize) -> Vec<W> {
    let id: BM = identity_matrix(&phys());
    let cd = create_op();
    let c = annihilate_op();
    let mut first: W = MPOTensor::new(1, 4);
    first.set(0, 0, id.clone(), 1.0).unwrap();
    first.set(0, 1, cd.clone(), 1.0).unwrap();
    first.set(0, 2, c.clone(), 1.0).unwrap();
    let mut bulk: W = MPOTensor::new(4, 4);
    bulk.set(0, 0, id.clone(), 1.0).unwrap();
    bulk.set(0, 1, cd.clone(), 1.0).unwrap();
    bulk.set(0, 2, c.clone(), 1.0).unwrap();
    bulk.set(1, 3, c.clone(), 1.0).unwrap();
    bulk.set(2, 3, cd.clone(), 1.0).unwrap();
    bulk.set(3, 3, id.clone(), 1.0).unwrap();
    let mut last: W = MPOTensor::new(4, 1);
    last.set(1, 0, c, 1.0).unwrap();
    last.set(2, 0, cd, 1.0).unwrap();
    last.set(3, 0, id, 1.0).unwrap();
    let mut mpo = vec![first];
    (0..nsites.saturating_sub(2)).for_each(|_| { mpo.push(bulk.clone()); });
    mpo.push(last);
    mpo
}

#[test]
fn hopping_expectation_two_sites() {
    // one particle on two sites
    let mut rng = StdRng::seed_from_u64(11);
    let mid = u1(&[(1, 1), (0, 1)]);
    let ket: Vec<T> = vec![
        MPSTensor::random(phys(), u1(&[(0, 1)]), mid.clone(), &mut rng),
        MPSTensor::random(phys(), mid.clone(), u1(&[(1, 1)]), &mut rng),
    ];
    let a1 = ket[0].data()[(1, 1)][[0, 0]];
    let a0 = ket[0].data()[(0, 0)][[0, 0]];
    let pb = ProductBasis::new(&phys(), &mid);
    let b = &ket[1].data()[(1, 1)];
    let b_empty = b[[pb.offset(&0, &1).unwrap(), 0]];
    let b_full = b[[pb.offset(&1, &0).unwrap(), 0]];
    // amplitudes of |1 0⟩ and |0 1⟩
    let amp10 = a1 * b_empty;
    let amp01 = a0 * b_full;

    let mpo = hopping_mpo(2);
    let pool = WorkerPool::serial();
    assert_relative_eq!(
        overlap(&ket, &ket).unwrap(),
        amp10 * amp10 + amp01 * amp01,
        epsilon = 1e-12,
    );
    assert_relative_eq!(
        expval(&ket, &mpo, &ket, &pool).unwrap(),
        2.0 * amp10 * amp01,
        epsilon = 1e-12,
    );
    assert_relative_eq!(
        expval_right(&ket, &mpo, &ket, &pool).unwrap(),
        2.0 * amp10 * amp01,
        epsilon = 1e-12,
    );

    // after the first site, the c† and c slots carry charge ±1 between bra
    // and ket bonds
    let left = left_edge(&ket[0], &ket[0], mpo[0].row_dim());
    let left = overlap_mpo_left_step(&ket[0], &ket[0], &left, &mpo[0]).unwrap();
    assert_eq!(left.aux_dim(), 4);
    assert_eq!(left[1].charge_pairs().collect::<Vec<_>>(), vec![(1, 0)]);
    assert_relative_eq!(left[1][(1, 0)][[0, 0]], a1 * a0, epsilon = 1e-12);
    assert_eq!(left[2].charge_pairs().collect::<Vec<_>>(), vec![(0, 1)]);
    assert_relative_eq!(left[2][(0, 1)][[0, 0]], a0 * a1, epsilon = 1e-12);
    assert!(left[3].is_empty());
}

#[test]
fn hopping_sweeps_agree() {
    let bra = random_chain(12);
    let ket = random_chain(13);
    let mpo = hopping_mpo(ket.len());
    let serial = WorkerPool::serial();
    let par = WorkerPool::new(3);
    let lr = expval(&bra, &mpo, &ket, &serial).unwrap();
    assert_relative_eq!(
        lr, expval_right(&bra, &mpo, &ket, &serial).unwrap(), epsilon = 1e-12);
    assert_relative_eq!(
        lr, expval(&bra, &mpo, &ket, &par).unwrap(), epsilon = 1e-12);

    // hopping is hermitian
    assert_relative_eq!(
        lr, expval(&ket, &mpo, &bra, &serial).unwrap(), epsilon = 1e-12);
}

#[test]
fn particle_number_expectation() {
    let ket = random_chain(1);
    let mpo = number_mpo(ket.len());
    let pool = WorkerPool::serial();
    let norm_sq = overlap(&ket, &ket).unwrap();
    let n = expval(&ket, &mpo, &ket, &pool).unwrap();
    assert_relative_eq!(n, 2.0 * norm_sq, epsilon = 1e-12);

    // N|ket⟩ = 2|ket⟩, so this holds for any bra
    let bra = random_chain(2);
    let ov = overlap(&bra, &ket).unwrap();
    let n = expval(&bra, &mpo, &ket, &pool).unwrap();
    assert_relative_eq!(n, 2.0 * ov, epsilon = 1e-12);
}

#[test]
fn left_and_right_sweeps_agree() {
    let bra = random_chain(3);
    let ket = random_chain(4);
    let mpo = number_mpo(ket.len());
    let pool = WorkerPool::serial();
    assert_relative_eq!(
        overlap(&bra, &ket).unwrap(),
        overlap_right(&bra, &ket).unwrap(),
        epsilon = 1e-12,
    );
    assert_relative_eq!(
        expval(&bra, &mpo, &ket, &pool).unwrap(),
        expval_right(&bra, &mpo, &ket, &pool).unwrap(),
        epsilon = 1e-12,
    );
}

#[test]
fn parallel_kernels_match_serial() {
    let bra = random_chain(5);
    let ket = random_chain(6);
    let mpo = number_mpo(ket.len());
    let serial = WorkerPool::serial();
    let par = WorkerPool::new(4);

    let mut left_s = left_edge(&bra[0], &ket[0], mpo[0].row_dim());
    let mut left_p = left_s.clone();
    for ((b, w), k) in bra.iter().zip(&mpo).zip(&ket) {
        left_s = overlap_mpo_left_step_par(b, k, &left_s, w, &serial).unwrap();
        left_p = overlap_mpo_left_step_par(b, k, &left_p, w, &par).unwrap();
        assert_eq!(left_s.aux_dim(), w.col_dim());
        assert_eq!(left_s.aux_dim(), left_p.aux_dim());
        for (ms, mp) in left_s.iter().zip(left_p.iter()) {
            assert_eq!(ms, mp);
        }
    }

    let n = ket.len();
    let mut right_s = right_edge(&bra[n - 1], &ket[n - 1], mpo[n - 1].col_dim());
    let mut right_p = right_s.clone();
    for ((b, w), k) in bra.iter().zip(&mpo).zip(&ket).rev() {
        right_s = overlap_mpo_right_step_par(b, k, &right_s, w, &serial).unwrap();
        right_p = overlap_mpo_right_step_par(b, k, &right_p, w, &par).unwrap();
        assert_eq!(right_s.aux_dim(), w.row_dim());
        for (ms, mp) in right_s.iter().zip(right_p.iter()) {
            assert_eq!(ms, mp);
        }
    }
}

#[test]
fn canonical_forms_preserve_overlaps() {
    let ket = random_chain(7);
    let bra = random_chain(8);
    let ov = overlap(&bra, &ket).unwrap();

    // sweep the ket into left-canonical form, pushing the remainder rightward
    let mut canon = ket.clone();
    for i in 0..canon.len() - 1 {
        let r = canon[i].normalize_left().unwrap();
        canon[i + 1].multiply_from_left(&r).unwrap();
    }
    assert_relative_eq!(overlap(&bra, &canon).unwrap(), ov, epsilon = 1e-12);
    assert_relative_eq!(
        norm(&canon).unwrap(), canon[2].scalar_norm(), epsilon = 1e-12);

    // left-canonical sites contract to the identity
    let mut left: BM = identity_matrix(canon[0].left_basis());
    for site in canon.iter().take(2) {
        left = overlap_left_step(site, site, &left).unwrap();
        for (rc, cc, m) in left.iter() {
            assert_eq!(rc, cc);
            let (r, c) = m.dim();
            assert_eq!(r, c);
            for i in 0..r {
                for j in 0..c {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_relative_eq!(m[[i, j]], expected, epsilon = 1e-12);
                }
            }
        }
    }
}

#[test]
fn complex_overlaps_are_hermitian() {
    type CT = MPSTensor<nd::Array2<C64>, U1>;
    type CW = MPOTensor<nd::Array2<C64>, U1>;
    let mut rng = StdRng::seed_from_u64(9);
    let mut make_chain = || -> Vec<CT> {
        bonds().windows(2)
            .map(|lr| {
                let mut t: CT
                    = MPSTensor::zeros(phys(), lr[0].clone(), lr[1].clone());
                t.data_mut().generate(|| C64::new(rng.gen(), rng.gen()));
                t
            })
            .collect()
    };
    let a = make_chain();
    let b = make_chain();
    let ab = overlap(&a, &b).unwrap();
    let ba = overlap(&b, &a).unwrap();
    assert_relative_eq!(ab.re, ba.re, epsilon = 1e-12);
    assert_relative_eq!(ab.im, -ba.im, epsilon = 1e-12);

    // a site-local hermitian operator has a real expectation value
    let mut sx: BlockMatrix<nd::Array2<C64>, U1> = BlockMatrix::new();
    sx.insert_block(nd::array![[C64::new(0.5, 0.0)]], 1, 1).unwrap();
    sx.insert_block(nd::array![[C64::new(-0.5, 0.0)]], 0, 0).unwrap();
    let id: BlockMatrix<nd::Array2<C64>, U1> = identity_matrix(&phys());
    let mpo: Vec<CW>
        = (0..a.len())
        .map(|i| {
            let mut w: CW = MPOTensor::new(1, 1);
            let op = if i == 1 { sx.clone() } else { id.clone() };
            w.set(0, 0, op, C64::new(1.0, 0.0)).unwrap();
            w
        })
        .collect();
    let ev = expval(&a, &mpo, &a, &WorkerPool::new(2)).unwrap();
    assert_relative_eq!(ev.im, 0.0, epsilon = 1e-12);
}

#[test]
fn mismatched_boundaries_are_rejected() {
    let ket = random_chain(10);
    let mpo = number_mpo(ket.len());
    let wrong = Boundary::edge(ket[1].left_basis(), 1, 0);
    assert!(matches!(
        overlap_mpo_left_step(&ket[1], &ket[1], &wrong, &mpo[1]),
        Err(ContractionError::AuxDimMismatch { expected: 2, found: 1 }),
    ));
}

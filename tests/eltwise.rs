use lattice_math::eltwise::{
    eltwise_cmp_add, eltwise_cmp_add_inplace, eltwise_cmp_sub_mod, eltwise_cmp_sub_mod_inplace,
    eltwise_fma_mod, eltwise_fma_mod_inplace, eltwise_mult_mod, eltwise_mult_mod_inplace, CmpInt,
};
use lattice_math::ntheory::{generate_primes, multiply_mod};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALL_CMPS: [CmpInt; 8] = [
    CmpInt::Eq,
    CmpInt::Lt,
    CmpInt::Le,
    CmpInt::False,
    CmpInt::Ne,
    CmpInt::Nlt,
    CmpInt::Nle,
    CmpInt::True,
];

fn sub_test<F: FnOnce()>(name: &str, f: F) {
    println!("Running {}", name);
    f();
}

#[test]
fn mult_mod_known_vector() {
    let q: u64 = 769;
    let op1: [u64; 9] = [1, 2, 3, 1, 1, 1, 0, 1, 0];
    let op2: [u64; 9] = [1, 1, 1, 1, 2, 3, 1, 0, 0];
    let expected: [u64; 9] = [1, 2, 3, 1, 2, 3, 0, 0, 0];

    for imf in [1u64, 2, 4] {
        sub_test(&format!("mult_mod_known_vector::<imf={}>", imf), || {
            let mut result = [0u64; 9];
            eltwise_mult_mod(&mut result, &op1, &op2, q, imf);
            assert_eq!(result, expected);

            let mut inplace = op1;
            eltwise_mult_mod_inplace(&mut inplace, &op2, q, imf);
            assert_eq!(inplace, expected);
        });
    }
}

#[test]
fn mult_mod_boundary_vector() {
    // near-q operands for a 50-bit modulus, exercising the wide product path
    let q: u64 = 1125891450734593;
    let op1: [u64; 9] = [
        706712574074152,
        943467560561867,
        1115920708919443,
        515713505356094,
        525633777116309,
        910766532971356,
        757086506562426,
        799841520990167,
        1,
    ];
    let op2: [u64; 9] = [
        515910833966633,
        96924929169117,
        537587376997453,
        41829060600750,
        205864998008014,
        463185427411646,
        965818279134294,
        1075778049568657,
        1,
    ];
    let expected: [u64; 9] = [
        231838787758587,
        618753612121218,
        1116345967490421,
        409735411065439,
        25680427818594,
        950138933882289,
        554128714280822,
        1465109636753,
        1,
    ];

    let mut result = [0u64; 9];
    eltwise_mult_mod(&mut result, &op1, &op2, q, 1);
    assert_eq!(result, expected);
}

#[test]
fn mult_mod_matches_oracle_across_shapes() {
    let mut rng = StdRng::seed_from_u64(0x6d75_6c74);

    // 30-bit and 49-bit moduli take the float path when available (for
    // input_mod_factor 1), 60-bit always the integer path.
    for bit_size in [30u64, 49, 60] {
        let q = generate_primes(1, bit_size, 8).unwrap()[0];
        for len in [1usize, 7, 8, 64, 1000] {
            for imf in [1u64, 2, 4] {
                sub_test(
                    &format!("mult_mod_oracle bits={} len={} imf={}", bit_size, len, imf),
                    || {
                        let bound = imf * q;
                        let op1: Vec<u64> =
                            (0..len).map(|_| rng.random_range(0..bound)).collect();
                        let op2: Vec<u64> =
                            (0..len).map(|_| rng.random_range(0..bound)).collect();
                        let expected: Vec<u64> = op1
                            .iter()
                            .zip(op2.iter())
                            .map(|(&x, &y)| multiply_mod(x % q, y % q, q))
                            .collect();

                        let mut result = vec![0u64; len];
                        eltwise_mult_mod(&mut result, &op1, &op2, q, imf);
                        assert_eq!(result, expected);
                    },
                );
            }
        }
    }
}

#[test]
fn fma_mod_matches_oracle() {
    let mut rng = StdRng::seed_from_u64(0x666d_61);

    for bit_size in [30u64, 50, 60] {
        let q = generate_primes(1, bit_size, 8).unwrap()[0];
        for len in [1usize, 9, 64, 513] {
            for imf in [1u64, 2, 4] {
                let scalar = rng.random_range(0..q);
                let op1: Vec<u64> = (0..len).map(|_| rng.random_range(0..imf * q)).collect();
                let addend: Vec<u64> = (0..len).map(|_| rng.random_range(0..q)).collect();

                let expected_with: Vec<u64> = op1
                    .iter()
                    .zip(addend.iter())
                    .map(|(&x, &a)| (multiply_mod(x % q, scalar, q) + a) % q)
                    .collect();
                let mut result = vec![0u64; len];
                eltwise_fma_mod(&mut result, &op1, scalar, Some(addend.as_slice()), q, imf);
                assert_eq!(result, expected_with, "bits={} len={} imf={}", bit_size, len, imf);

                let expected_without: Vec<u64> = op1
                    .iter()
                    .map(|&x| multiply_mod(x % q, scalar, q))
                    .collect();
                let mut inplace = op1.clone();
                eltwise_fma_mod_inplace(&mut inplace, scalar, None, q, imf);
                assert_eq!(inplace, expected_without);
            }
        }
    }
}

#[test]
fn cmp_add_matches_reference_including_ties() {
    let mut rng = StdRng::seed_from_u64(0x636d_70);
    let bound: u64 = 50;
    let diff: u64 = 13;

    // values straddle the bound, with exact ties
    let mut operand: Vec<u64> = (0..1000).map(|_| rng.random_range(0..100)).collect();
    operand.extend_from_slice(&[49, 50, 51, 0, u64::MAX]);

    for cmp in ALL_CMPS {
        let expected: Vec<u64> = operand
            .iter()
            .map(|&x| if cmp.matches(x, bound) { x.wrapping_add(diff) } else { x })
            .collect();

        let mut result = vec![0u64; operand.len()];
        eltwise_cmp_add(&mut result, &operand, cmp, bound, diff);
        assert_eq!(result, expected, "{:?}", cmp);

        let mut inplace = operand.clone();
        eltwise_cmp_add_inplace(&mut inplace, cmp, bound, diff);
        assert_eq!(inplace, expected, "{:?} inplace", cmp);
    }
}

#[test]
fn cmp_sub_mod_matches_reference_including_ties() {
    let mut rng = StdRng::seed_from_u64(0x7375_62);
    let q: u64 = 997;
    let bound: u64 = 400;
    let diff: u64 = 77;

    // raw values may exceed the modulus; the comparison sees them raw
    let mut operand: Vec<u64> = (0..1000).map(|_| rng.random_range(0..4 * q)).collect();
    operand.extend_from_slice(&[399, 400, 401, 0, q, q - 1, 2 * q]);

    for cmp in ALL_CMPS {
        let expected: Vec<u64> = operand
            .iter()
            .map(|&x| {
                if cmp.matches(x, bound) {
                    (x % q + q - diff) % q
                } else {
                    x
                }
            })
            .collect();

        let mut result = vec![0u64; operand.len()];
        eltwise_cmp_sub_mod(&mut result, &operand, q, cmp, bound, diff);
        assert_eq!(result, expected, "{:?}", cmp);

        let mut inplace = operand.clone();
        eltwise_cmp_sub_mod_inplace(&mut inplace, q, cmp, bound, diff);
        assert_eq!(inplace, expected, "{:?} inplace", cmp);
    }
}

proptest! {
    #[test]
    fn mult_mod_never_disagrees_with_u128(
        pairs in prop::collection::vec((0u64..769 * 4, 0u64..769 * 4), 1..200),
    ) {
        let q = 769u64;
        let op1: Vec<u64> = pairs.iter().map(|p| p.0).collect();
        let op2: Vec<u64> = pairs.iter().map(|p| p.1).collect();
        let expected: Vec<u64> = pairs
            .iter()
            .map(|&(x, y)| multiply_mod(x % q, y % q, q))
            .collect();

        let mut result = vec![0u64; op1.len()];
        eltwise_mult_mod(&mut result, &op1, &op2, q, 4);
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn cmp_sub_mod_outputs_stay_reduced_for_reduced_inputs(
        values in prop::collection::vec(0u64..997, 1..100),
        bound in 0u64..997,
        diff in 1u64..997,
        cmp_index in 0usize..8,
    ) {
        let q = 997u64;
        let cmp = ALL_CMPS[cmp_index];
        let mut operand = values;
        eltwise_cmp_sub_mod_inplace(&mut operand, q, cmp, bound, diff);
        prop_assert!(operand.iter().all(|&x| x < q));
    }
}

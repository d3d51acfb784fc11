//! Integration tests for Poseidon hash functions.

use std::str::FromStr;

use super::*;
use ark_bn254::Fr;
use ark_ff::{One, Zero};
use light_poseidon::{Poseidon, PoseidonHasher as _};

#[test]
fn test_matches_circomlib_vector() {
    // poseidon([1, 2]) from the circomlib test suite
    let hasher = PoseidonHasher::new().unwrap();
    let expected = Fr::from_str(
        "7853200120776062878684798364095072458815029376092732009249414926327459813530",
    )
    .unwrap();

    assert_eq!(hasher.hash_two(Fr::from(1u64), Fr::from(2u64)), expected);
}

#[test]
fn test_matches_light_poseidon_for_every_arity() {
    let hasher = PoseidonHasher::new().unwrap();
    let inputs = [Fr::from(11u64), Fr::from(22u64), Fr::from(33u64)];

    for nr_inputs in 1..=MAX_INPUTS {
        let mut reference = Poseidon::<Fr>::new_circom(nr_inputs).unwrap();
        let expected = reference.hash(&inputs[..nr_inputs]).unwrap();
        assert_eq!(hasher.hash(&inputs[..nr_inputs]).unwrap(), expected);
    }
}

#[test]
fn test_clones_share_tables() {
    let hasher = PoseidonHasher::new().unwrap();
    let clone = hasher.clone();
    let a = Fr::from(999u64);
    let b = Fr::from(888u64);

    assert_eq!(hasher.hash_two(a, b), clone.hash_two(a, b));
}

#[test]
fn test_usable_across_threads() {
    let hasher = PoseidonHasher::new().unwrap();
    let expected = hasher.hash_two(Fr::from(5u64), Fr::from(6u64));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let hasher = hasher.clone();
            std::thread::spawn(move || hasher.hash_two(Fr::from(5u64), Fr::from(6u64)))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_different_inputs_different_outputs() {
    let hasher = PoseidonHasher::new().unwrap();
    let h1 = hasher.hash_two(Fr::from(1u64), Fr::from(2u64));
    let h2 = hasher.hash_two(Fr::from(1u64), Fr::from(3u64));
    let h3 = hasher.hash_two(Fr::from(2u64), Fr::from(2u64));

    assert_ne!(h1, h2);
    assert_ne!(h1, h3);
    assert_ne!(h2, h3);
}

#[test]
fn test_order_matters() {
    let hasher = PoseidonHasher::new().unwrap();
    let a = Fr::from(10u64);
    let b = Fr::from(20u64);

    assert_ne!(hasher.hash_two(a, b), hasher.hash_two(b, a));
}

#[test]
fn test_hash_of_zero() {
    let hasher = PoseidonHasher::new().unwrap();
    let h = hasher.hash_one(Fr::zero());
    assert_ne!(h, Fr::zero());
    assert_ne!(hasher.hash_one(Fr::one()), h);
}

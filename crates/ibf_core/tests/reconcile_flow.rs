use ibf_core::{decode_envelope, encode_envelope, Filter, FilterConfig, FilterParams, IbfError};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

fn random_ids(n: usize, octets: usize) -> Vec<Vec<u8>> {
    let mut rng = rand::rng();
    (0..n)
        .map(|_| (0..octets).map(|_| rng.random::<u8>()).collect())
        .collect()
}

#[test]
fn two_peers_reconcile_over_envelope_bytes() {
    let params = FilterParams { seed: 0x5eed, ..FilterParams::new(300) };
    let shared = random_ids(1_000, params.id_sum_octets);
    let only_alice = random_ids(20, params.id_sum_octets);
    let only_bob = random_ids(15, params.id_sum_octets);

    let alice = Filter::summarize(params.config(), shared.iter().chain(&only_alice)).unwrap();
    let bob = Filter::summarize(params.config(), shared.iter().chain(&only_bob)).unwrap();

    // Bob ships his envelope; Alice only needs the bytes.
    let wire = encode_envelope(&params, &bob, true).unwrap();
    let (got_params, bob_copy) = decode_envelope(&wire).unwrap();
    assert_eq!(got_params, params);

    let diff = alice.difference(&bob_copy).unwrap();
    let add: HashSet<_> = diff.additional.into_iter().collect();
    let miss: HashSet<_> = diff.missing.into_iter().collect();
    assert_eq!(add, only_alice.into_iter().collect());
    assert_eq!(miss, only_bob.into_iter().collect());
}

#[test]
fn raw_wire_buffer_is_enough_with_agreed_config() {
    let params = FilterParams::new(64);
    let ids = random_ids(30, params.id_sum_octets);
    let local = Filter::summarize(params.config(), &ids[..28]).unwrap();
    let remote = Filter::summarize(params.config(), &ids[2..]).unwrap();

    let d = local.reconcile_wire(remote.as_bytes()).unwrap();
    let add: HashSet<_> = d.additional.into_iter().collect();
    let miss: HashSet<_> = d.missing.into_iter().collect();
    assert_eq!(add, ids[..2].iter().cloned().collect());
    assert_eq!(miss, ids[28..].iter().cloned().collect());
}

#[test]
fn capacity_failure_never_yields_a_partial_list() {
    let params = FilterParams::new(10);
    let mut f = Filter::summarize(params.config(), random_ids(50, params.id_sum_octets)).unwrap();
    assert!(matches!(f.decode(), Err(IbfError::DecodeFailure { .. })));
}

#[test]
fn caller_supplied_hashes_drive_the_filter() {
    // Identifiers are u64 LE; check hash is the byte-reversed id, key hashes slice the value.
    let cfg = FilterConfig::new(97, 8, 8)
        .check_hash(|id: &[u8]| id.iter().rev().map(|b| b.rotate_left(3)).collect::<Vec<u8>>())
        .key_hashes([
            Arc::new(move |id: &[u8]| (u64::from_le_bytes(id.try_into().unwrap()) % 97) as usize) as Arc<dyn ibf_core::KeyHash>,
            Arc::new(move |id: &[u8]| ((u64::from_le_bytes(id.try_into().unwrap()) / 97) % 97) as usize) as Arc<dyn ibf_core::KeyHash>,
            Arc::new(move |id: &[u8]| ((u64::from_le_bytes(id.try_into().unwrap()).wrapping_mul(0x9e37_79b9_7f4a_7c15) >> 32) % 97) as usize) as Arc<dyn ibf_core::KeyHash>,
        ]);
    let mut f = Filter::new(cfg).unwrap();
    let g = f.clone();
    f.insert(&1234u64.to_le_bytes()).unwrap();
    f.insert(&98765u64.to_le_bytes()).unwrap();
    let mut d = f.difference(&g).unwrap();
    d.additional.sort();
    let mut want = vec![1234u64.to_le_bytes().to_vec(), 98765u64.to_le_bytes().to_vec()];
    want.sort();
    assert_eq!(d.additional, want);
    assert!(d.missing.is_empty());
}

use gef_crypto::*;

const fn fixed_seed(byte: u8) -> SecretSeed {
    SecretSeed([byte; 32])
}

#[test]
fn sign_verify_roundtrip_with_fixed_seed() {
    let seed = fixed_seed(42);
    let pk = seed.public_key();
    let msg = b"append execution record";
    let sig = sign(&seed, msg);
    assert!(verify(&pk, msg, &sig));
    assert!(!verify(&pk, b"tampered", &sig));
}

#[test]
fn verify_rejects_signature_from_a_different_key() {
    let a = fixed_seed(1);
    let b = fixed_seed(2);
    let msg = b"payload";
    let sig = sign(&a, msg);
    assert!(!verify(&b.public_key(), msg, &sig));
}

#[test]
fn verify_never_panics_on_all_zero_or_all_one_inputs() {
    assert!(!verify(&[0u8; 32], b"x", &[0u8; 64]));
    assert!(!verify(&[0xFFu8; 32], b"x", &[0xFFu8; 64]));
}

#[test]
fn sha256_known_answer() {
    // NIST CAVP: SHA-256("abc")
    let digest = sha256(b"abc");
    assert_eq!(
        hex_encode(&digest),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn random_nonce_hex_is_well_formed_and_unique_across_many_draws() {
    use std::collections::HashSet;
    let mut seen = HashSet::new();
    for _ in 0..1000 {
        let nonce = random_nonce_hex();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert!(seen.insert(nonce), "nonce collided within 1000 draws");
    }
}

#[test]
fn parse_fixed_hex_roundtrips_hex_encode() {
    let bytes = [9u8; 32];
    let encoded = hex_encode(&bytes);
    let decoded: [u8; 32] = parse_fixed_hex(&encoded).expect("decode");
    assert_eq!(decoded, bytes);
}

#[test]
fn parse_fixed_hex_rejects_any_uppercase_digit() {
    let mixed_case = format!("{}A", "b".repeat(63));
    assert!(matches!(
        parse_fixed_hex::<32>(&mixed_case),
        Err(CryptoError::UppercaseHex)
    ));
}

#[test]
fn parse_public_key_hex_accepts_a_real_generated_key() {
    let kp = generate_keypair();
    let hex = hex_encode(&kp.public);
    let parsed = parse_public_key_hex(&hex).expect("valid key round-trips");
    assert_eq!(parsed, kp.public);
}

#[test]
fn b64url_encoding_never_contains_padding_or_standard_alphabet_chars() {
    let kp = generate_keypair();
    let sig = sign(&kp.secret, b"evidence");
    let encoded = b64url_encode(&sig);
    assert!(!encoded.contains('='));
    assert!(!encoded.contains('+'));
    assert!(!encoded.contains('/'));
}

#[test]
fn generate_keypair_produces_independently_signable_keys() {
    let a = generate_keypair();
    let b = generate_keypair();
    assert_ne!(a.public, b.public);
    let msg = b"distinct keys, distinct signatures";
    assert_ne!(sign(&a.secret, msg), sign(&b.secret, msg));
}

//! 5G key derivation (3GPP TS 33.501 Annex A, TS 33.220 Annex B)
//!
//! Every derivation is `HMAC-SHA-256(key, FC || P0 || L0 || ... || Pn || Ln)`
//! with the FC values below; 128-bit keys are the low half of the output.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

pub const KEY_256_SIZE: usize = 32;
pub const KEY_128_SIZE: usize = 16;

pub mod fc {
    pub const KAUSF: u8 = 0x6A;
    pub const RES_STAR: u8 = 0x6B;
    pub const KSEAF: u8 = 0x6C;
    pub const KAMF: u8 = 0x6D;
    pub const ALGORITHM_KEY: u8 = 0x69;
    pub const KGNB: u8 = 0x6E;
}

/// Algorithm type distinguishers for NAS key derivation (A.8).
const NAS_ENC: u8 = 0x01;
const NAS_INT: u8 = 0x02;

/// Access type distinguisher for 3GPP access (A.9).
pub const ACCESS_TYPE_3GPP: u8 = 0x01;

pub fn hmac_sha256(key: &[u8], input: &[u8]) -> [u8; KEY_256_SIZE] {
    let mut mac = match Hmac::<Sha256>::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(input);
    let mut out = [0u8; KEY_256_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Generic KDF: S = FC || P0 || L0 || ... with two-octet big-endian lengths.
pub fn calculate_kdf_key(key: &[u8; KEY_256_SIZE], fc: u8, parameters: &[&[u8]]) -> [u8; KEY_256_SIZE] {
    let mut s = Vec::with_capacity(1 + parameters.iter().map(|p| p.len() + 2).sum::<usize>());
    s.push(fc);
    for p in parameters {
        s.extend_from_slice(p);
        s.extend_from_slice(&(p.len() as u16).to_be_bytes());
    }
    hmac_sha256(key, &s)
}

fn concat_keys(ck: &[u8; KEY_128_SIZE], ik: &[u8; KEY_128_SIZE]) -> [u8; KEY_256_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);
    key
}

fn low_half(out: &[u8; KEY_256_SIZE]) -> [u8; KEY_128_SIZE] {
    let mut key = [0u8; KEY_128_SIZE];
    key.copy_from_slice(&out[KEY_128_SIZE..]);
    key
}

/// KAUSF = KDF(CK || IK, 0x6A, SN name, SQN xor AK)
pub fn derive_kausf(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    sn_name: &[u8],
    sqn_xor_ak: &[u8; 6],
) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(&concat_keys(ck, ik), fc::KAUSF, &[sn_name, sqn_xor_ak])
}

pub fn derive_kseaf(kausf: &[u8; KEY_256_SIZE], sn_name: &[u8]) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(kausf, fc::KSEAF, &[sn_name])
}

/// KAMF = KDF(KSEAF, 0x6D, SUPI, ABBA). `supi` is the IMSI digit string.
pub fn derive_kamf(kseaf: &[u8; KEY_256_SIZE], supi: &[u8], abba: &[u8]) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(kseaf, fc::KAMF, &[supi, abba])
}

pub fn derive_knas_enc(kamf: &[u8; KEY_256_SIZE], algorithm_id: u8) -> [u8; KEY_128_SIZE] {
    low_half(&calculate_kdf_key(kamf, fc::ALGORITHM_KEY, &[&[NAS_ENC], &[algorithm_id]]))
}

pub fn derive_knas_int(kamf: &[u8; KEY_256_SIZE], algorithm_id: u8) -> [u8; KEY_128_SIZE] {
    low_half(&calculate_kdf_key(kamf, fc::ALGORITHM_KEY, &[&[NAS_INT], &[algorithm_id]]))
}

/// KgNB = KDF(KAMF, 0x6E, uplink NAS COUNT, access type distinguisher)
pub fn derive_kgnb(kamf: &[u8; KEY_256_SIZE], uplink_nas_count: u32, access_type: u8) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(
        kamf,
        fc::KGNB,
        &[&uplink_nas_count.to_be_bytes(), &[access_type]],
    )
}

/// RES* / XRES* = low 128 bits of KDF(CK || IK, 0x6B, SN name, RAND, RES)
pub fn derive_res_star(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    sn_name: &[u8],
    rand: &[u8; KEY_128_SIZE],
    res: &[u8],
) -> [u8; KEY_128_SIZE] {
    low_half(&calculate_kdf_key(
        &concat_keys(ck, ik),
        fc::RES_STAR,
        &[sn_name, rand, res],
    ))
}

/// HXRES* / HRES* = low 128 bits of SHA-256(RAND || XRES*)
pub fn derive_hxres_star(rand: &[u8; KEY_128_SIZE], xres_star: &[u8; KEY_128_SIZE]) -> [u8; KEY_128_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(rand);
    hasher.update(xres_star);
    let mut digest = [0u8; KEY_256_SIZE];
    digest.copy_from_slice(&hasher.finalize());
    low_half(&digest)
}

/// Character-string KDF parameters are NFKC-normalised UTF-8.
pub fn encode_kdf_string(s: &str) -> Vec<u8> {
    s.nfkc().collect::<String>().into_bytes()
}

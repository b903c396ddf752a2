//! Security primitives for the AMF
//!
//! - [`milenage`]: 3GPP Milenage (f1-f5*) for the in-memory credential store
//! - [`kdf`]: 5G key hierarchy (KAUSF, KSEAF, KAMF, NAS keys, KgNB, RES*/HXRES*)
//! - [`aka`]: 5G-AKA home-environment vector generation and the UE-side response

pub mod aes;
pub mod aka;
pub mod kdf;
pub mod milenage;

pub use aka::{generate_5g_aka_vector, ue_authenticate, AkaVector, UeAkaResult};
pub use kdf::{
    derive_hxres_star, derive_kamf, derive_kausf, derive_kgnb, derive_knas_enc,
    derive_knas_int, derive_kseaf, derive_res_star, encode_kdf_string,
};
pub use milenage::{compute_opc, Milenage};

/// Errors raised by the security primitives.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length for {what}: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("MAC failure: network authentication token rejected")]
    MacFailure,
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Converts a slice into a fixed-size array, naming the field on failure.
pub fn to_array<const N: usize>(what: &'static str, bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}

//! Authentication check, algorithm selection and the AMF key hierarchy

use nextgamf_common::{CipheringAlgorithm, IntegrityAlgorithm, SecurityConfig};
use nextgamf_crypto::kdf::ACCESS_TYPE_3GPP;
use nextgamf_crypto::{derive_hxres_star, derive_kamf, derive_kgnb, derive_knas_enc, derive_knas_int};
use nextgamf_nas::UeSecurityCapability;
use thiserror::Error;

use crate::context::UeContext;

/// ABBA parameter sent in the Authentication Request
pub const ABBA: [u8; 2] = [0x00, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No unused vector is bound to the context
    #[error("authentication vector unavailable")]
    VectorUnavailable,
    #[error("RES* mismatch")]
    Mismatch,
}

/// Checks the UE's RES* against the bound vector, consuming it either way.
///
/// HXRES* is compared first, then XRES*. On success KSEAF is stored in the
/// security context.
pub fn verify_authentication(ctx: &mut UeContext, res_star: &[u8; 16]) -> Result<(), AuthError> {
    let vector = ctx.take_auth_vector().ok_or(AuthError::VectorUnavailable)?;
    if derive_hxres_star(&vector.rand, res_star) != vector.hxres_star {
        return Err(AuthError::Mismatch);
    }
    if *res_star != vector.xres_star {
        return Err(AuthError::Mismatch);
    }
    ctx.security.kseaf = Some(vector.kseaf);
    Ok(())
}

/// First algorithm of each preference list that the UE also supports.
pub fn select_algorithms(
    capability: &UeSecurityCapability,
    preferences: &SecurityConfig,
) -> Option<(CipheringAlgorithm, IntegrityAlgorithm)> {
    let ciphering = preferences
        .ciphering_order
        .iter()
        .copied()
        .find(|alg| capability.supports_ciphering(*alg))?;
    let integrity = preferences
        .integrity_order
        .iter()
        .copied()
        .find(|alg| capability.supports_integrity(*alg))?;
    Some((ciphering, integrity))
}

/// Derives KAMF from KSEAF for the context's SUPI.
pub fn derive_amf_key(ctx: &mut UeContext) -> Option<[u8; 32]> {
    let kseaf = ctx.security.kseaf?;
    let supi = ctx.supi.as_ref()?;
    let kamf = derive_kamf(&kseaf, supi.value.as_bytes(), &ABBA);
    ctx.security.kamf = Some(kamf);
    Some(kamf)
}

/// Derives the NAS keys for the selected algorithms.
pub fn derive_nas_keys(ctx: &mut UeContext) -> Option<()> {
    let kamf = ctx.security.kamf?;
    let (ciphering, integrity) = ctx.security.algorithms()?;
    ctx.security.knas_enc = Some(derive_knas_enc(&kamf, ciphering.id()));
    ctx.security.knas_int = Some(derive_knas_int(&kamf, integrity.id()));
    Some(())
}

/// Derives KgNB for the initial context setup (uplink NAS COUNT 0).
pub fn derive_gnb_key(ctx: &mut UeContext) -> Option<[u8; 32]> {
    let kamf = ctx.security.kamf?;
    let kgnb = derive_kgnb(&kamf, 0, ACCESS_TYPE_3GPP);
    ctx.security.kgnb = Some(kgnb);
    Some(kgnb)
}

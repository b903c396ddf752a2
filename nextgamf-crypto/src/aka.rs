//! 5G-AKA vector generation (home side) and response computation (UE side)

use crate::kdf::{derive_hxres_star, derive_kausf, derive_kseaf, derive_res_star, encode_kdf_string};
use crate::milenage::{Milenage, AMF_SIZE, RAND_SIZE, SQN_SIZE};
use crate::{CryptoError, Result};

/// Home-environment 5G-AKA vector.
#[derive(Clone, PartialEq, Eq)]
pub struct AkaVector {
    pub rand: [u8; 16],
    pub autn: [u8; 16],
    pub xres_star: [u8; 16],
    pub hxres_star: [u8; 16],
    pub kausf: [u8; 32],
    pub kseaf: [u8; 32],
}

impl std::fmt::Debug for AkaVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AkaVector")
            .field("rand", &self.rand)
            .field("autn", &self.autn)
            .finish_non_exhaustive()
    }
}

/// Builds a vector from RAND, SQN and the AMF (authentication management
/// field) for the given serving network name.
pub fn generate_5g_aka_vector(
    milenage: &Milenage,
    rand: &[u8; RAND_SIZE],
    sqn: &[u8; SQN_SIZE],
    amf: &[u8; AMF_SIZE],
    serving_network_name: &str,
) -> AkaVector {
    let sn = encode_kdf_string(serving_network_name);
    let mac_a = milenage.f1(rand, sqn, amf);
    let res = milenage.f2(rand);
    let ck = milenage.f3(rand);
    let ik = milenage.f4(rand);
    let ak = milenage.f5(rand);

    let mut sqn_xor_ak = [0u8; 6];
    for (i, b) in sqn_xor_ak.iter_mut().enumerate() {
        *b = sqn[i] ^ ak[i];
    }
    let mut autn = [0u8; 16];
    autn[..6].copy_from_slice(&sqn_xor_ak);
    autn[6..8].copy_from_slice(amf);
    autn[8..].copy_from_slice(&mac_a);

    let xres_star = derive_res_star(&ck, &ik, &sn, rand, &res);
    let kausf = derive_kausf(&ck, &ik, &sn, &sqn_xor_ak);
    AkaVector {
        rand: *rand,
        autn,
        hxres_star: derive_hxres_star(rand, &xres_star),
        xres_star,
        kseaf: derive_kseaf(&kausf, &sn),
        kausf,
    }
}

/// What the UE computes from a challenge it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeAkaResult {
    pub res_star: [u8; 16],
    pub sqn: [u8; 6],
    pub kseaf: [u8; 32],
}

/// Verifies AUTN and computes RES*. Fails with `MacFailure` when the
/// network token does not match this subscriber's key.
pub fn ue_authenticate(
    milenage: &Milenage,
    rand: &[u8; 16],
    autn: &[u8; 16],
    serving_network_name: &str,
) -> Result<UeAkaResult> {
    let sn = encode_kdf_string(serving_network_name);
    let ak = milenage.f5(rand);
    let mut sqn = [0u8; 6];
    for (i, b) in sqn.iter_mut().enumerate() {
        *b = autn[i] ^ ak[i];
    }
    let amf = [autn[6], autn[7]];
    if milenage.f1(rand, &sqn, &amf)[..] != autn[8..] {
        return Err(CryptoError::MacFailure);
    }

    let res = milenage.f2(rand);
    let ck = milenage.f3(rand);
    let ik = milenage.f4(rand);
    let mut sqn_xor_ak = [0u8; 6];
    sqn_xor_ak.copy_from_slice(&autn[..6]);
    let kausf = derive_kausf(&ck, &ik, &sn, &sqn_xor_ak);
    Ok(UeAkaResult {
        res_star: derive_res_star(&ck, &ik, &sn, rand, &res),
        sqn,
        kseaf: derive_kseaf(&kausf, &sn),
    })
}

//! Milenage (3GPP TS 35.206)
//!
//! The credential store runs the home-environment side of f1-f5 to build
//! 5G-AKA vectors; the test gNB simulator runs the same functions for the UE.

use crate::aes::{xor_block, Aes128Block, BLOCK_SIZE};

pub const KEY_SIZE: usize = 16;
pub const OP_SIZE: usize = 16;
pub const RAND_SIZE: usize = 16;
pub const SQN_SIZE: usize = 6;
pub const AMF_SIZE: usize = 2;
pub const MAC_SIZE: usize = 8;
pub const RES_SIZE: usize = 8;
pub const CK_SIZE: usize = 16;
pub const IK_SIZE: usize = 16;
pub const AK_SIZE: usize = 6;

/// Rotation (bits) and the last octet of the constant c_i for OUT1..OUT5.
const R: [usize; 5] = [64, 0, 32, 64, 96];
const C_LAST: [u8; 5] = [0x00, 0x01, 0x02, 0x04, 0x08];

fn rotate_left(block: &[u8; BLOCK_SIZE], bits: usize) -> [u8; BLOCK_SIZE] {
    let bits = bits % 128;
    if bits == 0 {
        return *block;
    }
    let byte_shift = bits / 8;
    let bit_shift = bits % 8;
    let mut out = [0u8; BLOCK_SIZE];
    for (i, o) in out.iter_mut().enumerate() {
        let hi = block[(i + byte_shift) % BLOCK_SIZE];
        let lo = block[(i + byte_shift + 1) % BLOCK_SIZE];
        *o = if bit_shift == 0 {
            hi
        } else {
            (hi << bit_shift) | (lo >> (8 - bit_shift))
        };
    }
    out
}

fn constant(index: usize) -> [u8; BLOCK_SIZE] {
    let mut c = [0u8; BLOCK_SIZE];
    c[BLOCK_SIZE - 1] = C_LAST[index];
    c
}

/// OPc = OP xor E_K(OP)
pub fn compute_opc(k: &[u8; KEY_SIZE], op: &[u8; OP_SIZE]) -> [u8; OP_SIZE] {
    let mut opc = Aes128Block::new(k).encrypt(op);
    xor_block(&mut opc, op);
    opc
}

/// Milenage instance bound to one subscriber key.
#[derive(Clone)]
pub struct Milenage {
    cipher: Aes128Block,
    opc: [u8; OP_SIZE],
}

impl std::fmt::Debug for Milenage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Milenage").finish_non_exhaustive()
    }
}

impl Milenage {
    pub fn new(k: &[u8; KEY_SIZE], opc: &[u8; OP_SIZE]) -> Self {
        Self {
            cipher: Aes128Block::new(k),
            opc: *opc,
        }
    }

    pub fn new_with_op(k: &[u8; KEY_SIZE], op: &[u8; OP_SIZE]) -> Self {
        Self::new(k, &compute_opc(k, op))
    }

    /// TEMP = E_K(RAND xor OPc)
    fn temp(&self, rand: &[u8; RAND_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut t = *rand;
        xor_block(&mut t, &self.opc);
        self.cipher.encrypt_block(&mut t);
        t
    }

    /// OUT1 = E_K(TEMP xor rot(IN1 xor OPc, r1) xor c1) xor OPc
    fn out1(&self, rand: &[u8; RAND_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut in1 = [0u8; BLOCK_SIZE];
        in1[0..6].copy_from_slice(sqn);
        in1[6..8].copy_from_slice(amf);
        in1[8..14].copy_from_slice(sqn);
        in1[14..16].copy_from_slice(amf);
        xor_block(&mut in1, &self.opc);

        let mut block = rotate_left(&in1, R[0]);
        xor_block(&mut block, &self.temp(rand));
        xor_block(&mut block, &constant(0));
        self.cipher.encrypt_block(&mut block);
        xor_block(&mut block, &self.opc);
        block
    }

    /// OUTn = E_K(rot(TEMP xor OPc, rn) xor cn) xor OPc, for n in 2..=5
    fn out(&self, rand: &[u8; RAND_SIZE], n: usize) -> [u8; BLOCK_SIZE] {
        let mut t = self.temp(rand);
        xor_block(&mut t, &self.opc);
        let mut block = rotate_left(&t, R[n - 1]);
        xor_block(&mut block, &constant(n - 1));
        self.cipher.encrypt_block(&mut block);
        xor_block(&mut block, &self.opc);
        block
    }

    /// MAC-A
    pub fn f1(&self, rand: &[u8; RAND_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> [u8; MAC_SIZE] {
        take(&self.out1(rand, sqn, amf), 0)
    }

    /// MAC-S
    pub fn f1_star(&self, rand: &[u8; RAND_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> [u8; MAC_SIZE] {
        take(&self.out1(rand, sqn, amf), 8)
    }

    /// RES
    pub fn f2(&self, rand: &[u8; RAND_SIZE]) -> [u8; RES_SIZE] {
        take(&self.out(rand, 2), 8)
    }

    /// CK
    pub fn f3(&self, rand: &[u8; RAND_SIZE]) -> [u8; CK_SIZE] {
        self.out(rand, 3)
    }

    /// IK
    pub fn f4(&self, rand: &[u8; RAND_SIZE]) -> [u8; IK_SIZE] {
        self.out(rand, 4)
    }

    /// AK
    pub fn f5(&self, rand: &[u8; RAND_SIZE]) -> [u8; AK_SIZE] {
        take(&self.out(rand, 2), 0)
    }

    /// AK used for resynchronisation (AUTS)
    pub fn f5_star(&self, rand: &[u8; RAND_SIZE]) -> [u8; AK_SIZE] {
        take(&self.out(rand, 5), 0)
    }
}

fn take<const N: usize>(block: &[u8; BLOCK_SIZE], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&block[offset..offset + N]);
    out
}

const C1: u32 = 0xcc9e2d51;
const C2: u32 = 0x1b873593;
const R1: u32 = 15;
const R2: u32 = 13;
const M: u32 = 5;
const N: u32 = 0xe6546b64;

const FNV_OFFSET: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x01000193;

/// Hash function used to place keys in an index.
///
/// The choice is recorded in every index header when the index is created and
/// read back on attach, so all attachers of one namespace hash identically.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    /// FNV-1a over the bytes followed by the murmur3 finalizer.
    #[default]
    Default = 1,
    /// MurmurHash3 x86 32-bit, seed 0.
    Murmur3 = 2,
}

impl HashFunction {
    #[inline]
    pub fn hash(self, key: &[u8]) -> u32 {
        match self {
            HashFunction::Default => mix32(key),
            HashFunction::Murmur3 => murmur3_32(key, 0),
        }
    }

    pub(crate) fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(HashFunction::Default),
            2 => Some(HashFunction::Murmur3),
            _ => None,
        }
    }
}

#[inline(always)]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Default 32-bit mixing hash.
#[inline]
pub fn mix32(key: &[u8]) -> u32 {
    let mut h = FNV_OFFSET;
    for &byte in key {
        h ^= byte as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    fmix32(h ^ key.len() as u32)
}

#[inline(always)]
pub fn murmur3_32(key: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut chunks = key.chunks_exact(4);

    for chunk in chunks.by_ref() {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(R1);
        k = k.wrapping_mul(C2);

        h ^= k;
        h = h.rotate_left(R2);
        h = h.wrapping_mul(M).wrapping_add(N);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut k = 0u32;
        for (i, &byte) in remainder.iter().enumerate() {
            k |= (byte as u32) << (i * 8);
        }

        k = k.wrapping_mul(C1);
        k = k.rotate_left(R1);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    h ^= key.len() as u32;
    fmix32(h)
}

use std::time::{SystemTime, UNIX_EPOCH};

/// The 32-bit variant of the Xorshift PRNG algorithm.
#[repr(transparent)]
#[derive(Copy, Clone, Debug)]
pub struct Xorshift32(pub u32);
impl Xorshift32 {
    pub fn from_system_time() -> Self {
        let dur = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_else(|e| e.duration());
        Self(dur.subsec_nanos() | 1)
    }
    /// Seeds from the system time mixed with a hash of `id`, so that tests starting in the same
    /// instant still diverge.
    pub fn from_id(id: &str) -> Self {
        let hash = id.bytes().fold(0x811c_9dc5_u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));
        let mut rng = Self((Self::from_system_time().0 ^ hash) | 1);
        rng.next();
        rng
    }
    pub fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }
}
impl Iterator for Xorshift32 {
    type Item = u32;
    fn next(&mut self) -> Option<Self::Item> { Some(self.next()) }
}

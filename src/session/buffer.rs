use {
    crate::error::{Error, Result},
    std::fmt::{self, Debug, Formatter},
};

/// A fixed-capacity byte block owned by one side of a session.
///
/// The block is allocated once, when the session is created, and moves into each operation that
/// uses it and back out with the completion.
pub(crate) struct IoBuffer(Box<[u8]>);
impl IoBuffer {
    pub fn new(capacity: usize) -> Self { Self(vec![0; capacity].into_boxed_slice()) }
    #[inline]
    pub fn capacity(&self) -> usize { self.0.len() }
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] { &mut self.0 }
    /// The first `len` bytes, clamped to the capacity.
    #[inline]
    pub fn filled(&self, len: usize) -> &[u8] { self.0.get(..len).unwrap_or(&self.0) }
    /// Copies `payload` to the start of the block and returns its length.
    pub fn fill_from(&mut self, payload: &[u8]) -> Result<usize> {
        let capacity = self.capacity();
        let dst = self
            .0
            .get_mut(..payload.len())
            .ok_or(Error::PayloadTooLarge { len: payload.len(), capacity })?;
        dst.copy_from_slice(payload);
        Ok(payload.len())
    }
}
impl Debug for IoBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoBuffer").field("capacity", &self.capacity()).finish()
    }
}

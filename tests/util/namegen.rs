use {super::Xorshift32, crate::endpoint::Endpoint};

/// Produces endpoint names that no other test is using.
#[derive(Copy, Clone, Debug)]
pub struct NameGen {
    rng: Xorshift32,
}
impl NameGen {
    pub fn new(id: &'static str) -> Self { Self { rng: Xorshift32::from_id(id) } }
}
impl Iterator for NameGen {
    type Item = Endpoint;
    fn next(&mut self) -> Option<Self::Item> {
        Some(Endpoint::from_name(&format!("sessionpipe-test-{:08x}", self.rng.next())))
    }
}

macro_rules! make_id {
    () => {
        concat!(file!(), line!(), column!())
    };
}

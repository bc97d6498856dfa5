//! Endpoint naming and the client-side wait policy.

use std::{
    fmt::{self, Display, Formatter},
    io,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

/// The name both processes rendezvous on.
///
/// On Windows this is a named pipe path of the form `\\.\pipe\<name>`. On Unix it is the
/// filesystem path of a Unix domain socket. The name is fixed for the lifetime of a server.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint(PathBuf);

impl Endpoint {
    /// The name used when none is given.
    pub const DEFAULT_NAME: &'static str = "bobby";

    /// Maps a short name to the platform's conventional location for it.
    ///
    /// Names that already look like a full location (a `\\`-prefixed pipe path on Windows, or
    /// anything containing a `/` on Unix) are taken verbatim.
    ///
    /// ## Platform-specific behavior
    /// ### Windows
    /// `bobby` becomes `\\.\pipe\bobby`.
    /// ### Unix
    /// `bobby` becomes `bobby.sock` inside [the temporary directory](std::env::temp_dir).
    pub fn from_name(name: &str) -> Self {
        #[cfg(windows)]
        {
            if name.starts_with(r"\\") {
                return Self(PathBuf::from(name));
            }
            Self(PathBuf::from(format!(r"\\.\pipe\{name}")))
        }
        #[cfg(not(windows))]
        {
            if name.contains('/') {
                return Self(PathBuf::from(name));
            }
            Self(std::env::temp_dir().join(format!("{name}.sock")))
        }
    }
    /// Uses the given path as-is.
    #[inline]
    pub fn from_path(path: impl Into<PathBuf>) -> Self { Self(path.into()) }
    /// Returns the full location of the endpoint.
    #[inline]
    pub fn path(&self) -> &Path { &self.0 }
}
impl Default for Endpoint {
    fn default() -> Self { Self::from_name(Self::DEFAULT_NAME) }
}
impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result { Display::fmt(&self.0.display(), f) }
}

/// Describes how long a client waits for the endpoint to appear before giving up.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectWaitMode {
    /// A single connection attempt is made. If the endpoint is not there, connecting fails
    /// immediately.
    Immediate,
    /// Attempts are repeated until the endpoint appears or the given amount of time has passed.
    Timeout(Duration),
    /// Attempts are repeated until the endpoint appears, however long that takes.
    #[default]
    Unbounded,
}
impl ConnectWaitMode {
    /// Computes the instant after which no further attempts should be made. `None` means the
    /// wait never expires.
    pub(crate) fn expiry(self, start: Instant) -> io::Result<Option<Instant>> {
        let msg = "timeout expiry time overflowed std::time::Instant";
        match self {
            Self::Immediate => Ok(Some(start)),
            Self::Timeout(t) => start
                .checked_add(t)
                .map(Some)
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, msg)),
            Self::Unbounded => Ok(None),
        }
    }
}

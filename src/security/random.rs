//! Secure random source for the service core.

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// A cryptographically secure random number generator.
pub trait SecureRandom: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRandom for T {}

/// The platform CSPRNG.
pub fn default_source() -> Box<dyn SecureRandom> {
    Box::new(OsRng)
}

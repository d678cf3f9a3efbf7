//! Session key generation.

/// Default session key length in characters.
pub const DEFAULT_KEY_LENGTH: usize = 32;

/// Produces fresh, collision-resistant session keys.
///
/// The default implementation is [`RandomKeyGenerator`].
pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Alphanumeric keys drawn from the thread-local CSPRNG.
///
/// 32 characters give roughly 190 bits of entropy.
#[derive(Debug, Clone)]
pub struct RandomKeyGenerator {
    length: usize,
}

impl RandomKeyGenerator {
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for RandomKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_LENGTH)
    }
}

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        generate_token(self.length)
    }
}

/// Generates a random alphanumeric token of the given length.
pub fn generate_token(length: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(rng.sample(rand::distributions::Alphanumeric)))
        .collect()
}

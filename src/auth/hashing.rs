use argon2::{Algorithm, Argon2, Params, Version};

/// Argon2id tuned for per-request verification of API keys.
///
/// Verification runs on every request that presents `X-Api-Key`, so memory and
/// iterations stay low enough to keep it in the low milliseconds.
pub fn password_hasher() -> Result<Argon2<'static>, argon2::Error> {
    const MEMORY_COST_KIB: u32 = 768;
    const ITERATIONS: u32 = 1;
    const PARALLELISM: u32 = 1;
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(32))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

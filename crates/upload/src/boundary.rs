//! Multipart boundary token generation.

/// Fixed prefix of every boundary token.
pub const BOUNDARY_PREFIX: &str = "BoUnDaRy-";

/// Number of hex characters after the prefix.
pub const BOUNDARY_HEX_LEN: usize = 16;

/// Generates a fresh boundary: `BoUnDaRy-` followed by 16 uppercase hex
/// characters.
///
/// The source is `rand`'s thread-local generator. Boundaries only need to be
/// unlikely to occur inside the payload, not unpredictable.
pub fn generate_boundary() -> String {
    format!("{BOUNDARY_PREFIX}{:016X}", rand::random::<u64>())
}

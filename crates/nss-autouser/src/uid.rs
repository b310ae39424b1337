//! Deterministic UID derivation.
//!
//! A cryptographically secure hash would be preferable here, but with fewer
//! than 32 bits of output and the birthday paradox, finding collisions
//! would still be relatively easy, and the impact of a clash is low: the
//! user still needs to authenticate, and users cannot pick an arbitrary
//! number of names. Stability across reboots matters more than
//! unpredictability, so plain FNV-1a it is.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// How many times a colliding name is re-hashed before giving up.
pub const HASH_ATTEMPTS: u32 = 10;

/// Fold `data` into an FNV-1a state.
fn fold(mut hash: u64, data: &str) -> u64 {
    for byte in data.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Derive the hash state for a seed string.
pub fn seed_state(seed: &str) -> u64 {
    fold(FNV_OFFSET_BASIS, seed)
}

/// Compute a consistent UID in `[min, max]` from the hash of `name`.
///
/// `taken` reports whether a candidate UID is already assigned; a taken
/// candidate is retried by folding the name in again, up to `attempts`
/// times. Returns 0 — never a valid synthesized UID — when every attempt
/// collides or the range is empty, forcing callers to reject it explicitly.
///
/// The returned UID is only reserved, not recorded anywhere: until the
/// caller locks it into the user database the same UID can be handed to a
/// concurrent lookup of a different name.
pub fn compute_uid(
    seed: &str,
    name: &str,
    min: libc::uid_t,
    max: libc::uid_t,
    attempts: u32,
    taken: impl Fn(libc::uid_t) -> bool,
) -> libc::uid_t {
    if max < min {
        return 0;
    }
    let span = u64::from(max - min) + 1;

    let mut hash = seed_state(seed);
    for _ in 0..attempts {
        hash = fold(hash, name);
        let uid = (u64::from(min) + hash % span) as libc::uid_t;
        if !taken(uid) {
            return uid;
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn free(_uid: libc::uid_t) -> bool {
        false
    }

    #[test]
    fn uid_is_deterministic() {
        let first = compute_uid("seed", "fueller", 7000, 8000, HASH_ATTEMPTS, free);
        let second = compute_uid("seed", "fueller", 7000, 8000, HASH_ATTEMPTS, free);
        assert_eq!(first, second);
        assert!(first >= 7000 && first <= 8000);
    }

    #[test]
    fn uid_depends_on_seed_and_name() {
        let base = compute_uid("seed", "fueller", 1, 1_000_000, HASH_ATTEMPTS, free);
        let other_seed = compute_uid("dif", "fueller", 1, 1_000_000, HASH_ATTEMPTS, free);
        let other_name = compute_uid("seed", "mueller", 1, 1_000_000, HASH_ATTEMPTS, free);
        assert_ne!(base, other_seed);
        assert_ne!(base, other_name);
    }

    #[test]
    fn uid_stays_in_range() {
        for name in ["a", "bb", "ccc", "a-much-longer-name"] {
            let uid = compute_uid("s", name, 500, 502, HASH_ATTEMPTS, free);
            assert!(uid >= 500 && uid <= 502, "{uid} out of range for {name}");
        }
    }

    #[test]
    fn single_uid_range_works() {
        assert_eq!(compute_uid("s", "anyone", 4242, 4242, HASH_ATTEMPTS, free), 4242);
    }

    #[test]
    fn collisions_are_retried() {
        let first = compute_uid("seed", "name", 100, 10_000, HASH_ATTEMPTS, free);
        let second = compute_uid("seed", "name", 100, 10_000, HASH_ATTEMPTS, |uid| uid == first);
        assert_ne!(second, 0);
        assert_ne!(second, first);
    }

    #[test]
    fn exhausted_attempts_return_zero() {
        assert_eq!(
            compute_uid("seed", "name", 100, 10_000, HASH_ATTEMPTS, |_| true),
            0
        );
    }

    #[test]
    fn inverted_range_returns_zero() {
        assert_eq!(compute_uid("seed", "name", 200, 100, HASH_ATTEMPTS, free), 0);
    }
}

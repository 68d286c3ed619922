//! Collision-avoiding names for composed templates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Characters used in generated suffixes; vowels and look-alikes are left out.
const ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Length of generated suffixes.
const SUFFIX_LEN: usize = 5;

/// Generates `<base>-<suffix>` names from an injected random source.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    rng: StdRng,
}

impl NameGenerator {
    /// Creates a generator seeded from operating-system entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Creates a deterministic generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Returns a random suffix.
    pub fn suffix(&mut self) -> String {
        (0..SUFFIX_LEN)
            .map(|_| char::from(ALPHABET[self.rng.random_range(0..ALPHABET.len())]))
            .collect()
    }

    /// Returns `<base>-<suffix>` that is not in `taken`, and records it there.
    pub fn unique(&mut self, base: &str, taken: &mut HashSet<String>) -> String {
        loop {
            let candidate = format!("{base}-{}", self.suffix());
            if taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::from_entropy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_generators_agree() {
        let mut a = NameGenerator::seeded(7);
        let mut b = NameGenerator::seeded(7);
        assert_eq!(a.suffix(), b.suffix());
        assert_eq!(a.suffix(), b.suffix());
    }

    #[test]
    fn test_suffix_shape() {
        let mut names = NameGenerator::seeded(1);
        let suffix = names.suffix();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|c| ALPHABET.contains(&c)));
    }

    #[test]
    fn test_unique_avoids_taken_names() {
        let mut names = NameGenerator::seeded(3);
        let mut taken = HashSet::new();
        let first = names.unique("vpc", &mut taken);
        let second = names.unique("vpc", &mut taken);

        assert!(first.starts_with("vpc-"));
        assert_ne!(first, second);
        assert!(taken.contains(&first) && taken.contains(&second));
    }
}

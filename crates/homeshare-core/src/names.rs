//! Human-readable display names for connected devices.
//!
//! Connection ids are UUIDs, which nobody wants to read on a device card.
//! Each device is therefore shown under a generated two-word name such as
//! `"Amber Falcon"` or `"Hyper Circuit"`.
//!
//! Generation ([`NameGenerator`]) is stateless.  Uniqueness is the job of
//! [`NameBook`], which remembers which id holds which name and retries on
//! collision.  Uniqueness is best-effort: after 20 attempts the latest
//! candidate is accepted even if another device already uses it.

use std::collections::HashMap;
use std::hash::Hash;

use rand::seq::SliceRandom;
use rand::Rng;

/// Candidates generated before a numeric suffix is appended.
const PLAIN_ATTEMPTS: u32 = 10;

/// Total candidates generated before giving up on uniqueness.
const MAX_ATTEMPTS: u32 = 20;

/// Exclusive upper bound of the collision-breaking suffix.
const SUFFIX_RANGE: u32 = 1000;

const ADJECTIVES: &[&str] = &[
    "Swift", "Clever", "Bright", "Mighty", "Nimble", "Modern", "Efficient", "Bold", "Secure",
    "Compact", "Rapid", "Futuristic", "Dynamic", "Premium", "Electric", "Digital", "Virtual",
    "Cyber", "Automatic", "Portable",
];

const TECH_NOUNS: &[&str] = &[
    "Processor", "Chip", "Server", "Node", "Core", "Drive", "Matrix", "Grid", "Cloud", "Data",
    "Byte", "Bit", "Pixel", "Vector", "Quantum", "Neural", "Solar", "Atomic", "Nano", "Logic",
    "Circuit", "Module", "Unit", "Device", "Machine",
];

const ANIMALS: &[&str] = &[
    "Lion", "Tiger", "Eagle", "Dolphin", "Wolf", "Panther", "Falcon", "Jaguar", "Condor", "Owl",
    "Fox", "Lynx", "Cheetah", "Shark", "Whale", "Elephant", "Gorilla",
];

const COLORS: &[&str] = &[
    "Red", "Blue", "Green", "Yellow", "Orange", "Purple", "Pink", "Cyan", "Magenta", "Turquoise",
    "Emerald", "Sapphire", "Ruby", "Amber", "Gold", "Silver", "Bronze", "Black", "White",
];

const INTENSIFIERS: &[&str] = &["Super", "Mega", "Hyper", "Ultra"];

/// The six ways two word lists are combined into a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    ColorAnimal,
    AdjectiveTech,
    AdjectiveAnimal,
    IntensifierTech,
    IntensifierAnimal,
    IntensifierColor,
}

const PATTERNS: [Pattern; 6] = [
    Pattern::ColorAnimal,
    Pattern::AdjectiveTech,
    Pattern::AdjectiveAnimal,
    Pattern::IntensifierTech,
    Pattern::IntensifierAnimal,
    Pattern::IntensifierColor,
];

/// Produces candidate display names from fixed word lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameGenerator;

impl NameGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Picks a pattern uniformly, then one word from each of its two lists.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let (first, second) = match PATTERNS.choose(rng).copied().unwrap_or(Pattern::ColorAnimal) {
            Pattern::ColorAnimal => (COLORS, ANIMALS),
            Pattern::AdjectiveTech => (ADJECTIVES, TECH_NOUNS),
            Pattern::AdjectiveAnimal => (ADJECTIVES, ANIMALS),
            Pattern::IntensifierTech => (INTENSIFIERS, TECH_NOUNS),
            Pattern::IntensifierAnimal => (INTENSIFIERS, ANIMALS),
            Pattern::IntensifierColor => (INTENSIFIERS, COLORS),
        };
        format!("{} {}", pick(first, rng), pick(second, rng))
    }
}

fn pick<'a, R: Rng + ?Sized>(words: &[&'a str], rng: &mut R) -> &'a str {
    words.choose(rng).copied().unwrap_or("Device")
}

/// Assignment of display names to ids, with best-effort uniqueness.
///
/// Generic over the id type so the relay can key it by `DeviceId` while tests
/// use plain integers.
#[derive(Debug)]
pub struct NameBook<K> {
    generator: NameGenerator,
    assigned: HashMap<K, String>,
}

impl<K: Eq + Hash + Clone> Default for NameBook<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> NameBook<K> {
    pub fn new() -> Self {
        Self {
            generator: NameGenerator::new(),
            assigned: HashMap::new(),
        }
    }

    /// Returns the name held by `id`, assigning a fresh one if it has none.
    ///
    /// Idempotent per id.  See [`NameBook::unique_for_with`] for the retry
    /// rules.
    pub fn unique_for(&mut self, id: &K) -> String {
        self.unique_for_with(id, &mut rand::thread_rng())
    }

    /// [`NameBook::unique_for`] with an explicit random source.
    ///
    /// Candidates are generated while the latest one is already held by
    /// another id, up to 20 attempts.  From the 11th attempt on, each
    /// candidate gets a random suffix in `[0, 1000)`.  If the 20th candidate
    /// still collides it is accepted anyway.
    pub fn unique_for_with<R: Rng + ?Sized>(&mut self, id: &K, rng: &mut R) -> String {
        if let Some(name) = self.assigned.get(id) {
            return name.clone();
        }

        let mut attempts = 0;
        let name = loop {
            let mut candidate = self.generator.generate(rng);
            attempts += 1;
            if attempts > PLAIN_ATTEMPTS {
                candidate = format!("{candidate} {}", rng.gen_range(0..SUFFIX_RANGE));
            }
            if !self.is_taken(&candidate) || attempts >= MAX_ATTEMPTS {
                break candidate;
            }
        };

        self.assigned.insert(id.clone(), name.clone());
        name
    }

    /// The name currently held by `id`, if any.
    pub fn name_of(&self, id: &K) -> Option<&str> {
        self.assigned.get(id).map(String::as_str)
    }

    /// Forgets `id`'s name so future ids may receive it.
    pub fn release(&mut self, id: &K) {
        self.assigned.remove(id);
    }

    /// Number of ids currently holding a name.
    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Drops every assignment.
    pub fn clear(&mut self) {
        self.assigned.clear();
    }

    fn is_taken(&self, candidate: &str) -> bool {
        self.assigned.values().any(|n| n == candidate)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

// The process-wide authority honors SPANHASH_SEED.
//
// Kept in its own binary with a single test: the variable must be set
// before anything touches the global authority.
use span_hashmap::{HashSeed, SeedAuthority, SeedState, SpanHashMap, SEED_ENV_VAR};

// Test: SPANHASH_SEED=0 pins the global seed for every default-built table.
// Verifies: the global reports the override, reseeding is ignored, and two
// default maps fed the same keys end up with the same layout.
#[test]
fn zero_in_environment_pins_global_seed() {
    assert_eq!(SEED_ENV_VAR, "SPANHASH_SEED");
    std::env::set_var(SEED_ENV_VAR, "0");

    let global = SeedAuthority::global();
    assert_eq!(global.state(), SeedState::OverriddenByEnvironment);
    assert_eq!(global.hash_seed(), HashSeed::ZERO);
    global.reset_seed();
    assert_eq!(global.hash_seed(), HashSeed::ZERO);

    let build = || {
        let mut m: SpanHashMap<String, u32> = SpanHashMap::new();
        for i in 0..500u32 {
            m.insert(format!("key-{i}"), i);
        }
        m
    };
    let (a, b) = (build(), build());
    assert_eq!(a.seed(), HashSeed::ZERO);
    assert_eq!(a.bucket_count(), b.bucket_count());
    assert!(a.values().eq(b.values()));

    let later: SpanHashMap<u64, ()> = SpanHashMap::default();
    assert!(later.seed().is_deterministic());
}

//! Key schedule for the book hash.
//!
//! 781 keys: 768 piece-square, 4 castling, 8 en-passant files, 1 turn.
//! Generated at compile time from a fixed seed, so books built with this
//! toolchain probe consistently across runs and targets.

/// xorshift64: small, fast and well distributed for hash keys.
const fn xorshift64(mut state: u64) -> u64 {
    state ^= state << 13;
    state ^= state >> 7;
    state ^= state << 17;
    state
}

const fn generate_keys<const N: usize>(seed: u64) -> [u64; N] {
    let mut keys = [0u64; N];
    let mut state = seed;
    let mut i = 0;
    while i < N {
        state = xorshift64(state);
        keys[i] = state;
        i += 1;
    }
    keys
}

const BOOK_SEED: u64 = 0x6F45_22A1_93D5_0C8B;

pub const POLYGLOT_RANDOMS: [u64; 781] = generate_keys(BOOK_SEED);

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use super::attacks::{get_bishop_attack_bitboards, get_rook_attack_bitboards};
use super::constants::{BISHOP_MAGICS, ROOK_MAGICS};
use super::search::{find_magic_number_for_square, is_magic_candidate_valid};
use super::structs::{BishopMagicTables, MagicEntry, MagicTables, RookMagicTables};

/// Seed policy for the fallback magic search.
#[derive(Debug, Clone, Copy)]
pub enum MagicTableSeed {
    Fixed(u64),
    Entropy,
}

/// Rook relevant-occupancy mask: the rank and file of `square`, excluding
/// the square itself and the edge square of each ray. A blocker on the edge
/// cannot change the attack set, so dropping it halves the table per ray.
pub fn rook_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;

    let mut r = rank + 1;
    while r <= 6 {
        mask |= 1 << (r * 8 + file);
        r += 1;
    }
    let mut r = rank - 1;
    while r >= 1 {
        mask |= 1 << (r * 8 + file);
        r -= 1;
    }
    let mut f = file + 1;
    while f <= 6 {
        mask |= 1 << (rank * 8 + f);
        f += 1;
    }
    let mut f = file - 1;
    while f >= 1 {
        mask |= 1 << (rank * 8 + f);
        f -= 1;
    }

    mask
}

/// Bishop relevant-occupancy mask: the diagonals of `square` with the edge
/// ring excluded.
pub fn bishop_mask(square: usize) -> u64 {
    let rank = (square / 8) as i32;
    let file = (square % 8) as i32;
    let mut mask = 0u64;

    for (dr, df) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
        let mut r = rank + dr;
        let mut f = file + df;
        while (1..=6).contains(&r) && (1..=6).contains(&f) {
            mask |= 1 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }

    mask
}

/// All 2^k subsets of `mask`, via the carry-rippler walk.
pub fn enumerate_subsets(mask: u64) -> Vec<u64> {
    let mut subsets = Vec::with_capacity(1 << mask.count_ones());
    let mut sub: u64 = 0;
    loop {
        subsets.push(sub);
        sub = sub.wrapping_sub(mask) & mask;
        if sub == 0 {
            break;
        }
    }
    subsets
}

fn build_entry(
    square: usize,
    mask: u64,
    blockers: &[u64],
    attacks: &[u64],
    hardcoded: u64,
    rng: &mut StdRng,
) -> Result<MagicEntry, String> {
    let shift = 64 - mask.count_ones();

    let magic = if is_magic_candidate_valid(blockers, attacks, hardcoded, shift) {
        hardcoded
    } else {
        // Should not happen with the published constants; regenerate rather
        // than ship a corrupt table.
        warn!(square, "hardcoded magic failed verification, searching");
        find_magic_number_for_square(blockers, attacks, shift, rng)?
    };

    let mut table = vec![0u64; 1usize << (64 - shift)];
    for (blocker, attack) in blockers.iter().zip(attacks) {
        let index = (blocker.wrapping_mul(magic) >> shift) as usize;
        table[index] = *attack;
    }

    Ok(MagicEntry {
        magic,
        shift,
        mask,
        table: table.into_boxed_slice(),
    })
}

pub fn generate_magic_tables(seed: MagicTableSeed) -> Result<MagicTables, String> {
    let mut rng = match seed {
        MagicTableSeed::Fixed(s) => StdRng::seed_from_u64(s),
        MagicTableSeed::Entropy => StdRng::from_os_rng(),
    };

    let mut rook_entries = Vec::with_capacity(64);
    let mut bishop_entries = Vec::with_capacity(64);

    for square in 0..64 {
        let mask = rook_mask(square);
        let blockers = enumerate_subsets(mask);
        let attacks = get_rook_attack_bitboards(square, &blockers);
        rook_entries.push(build_entry(
            square,
            mask,
            &blockers,
            &attacks,
            ROOK_MAGICS[square],
            &mut rng,
        )?);
    }

    for square in 0..64 {
        let mask = bishop_mask(square);
        let blockers = enumerate_subsets(mask);
        let attacks = get_bishop_attack_bitboards(square, &blockers);
        bishop_entries.push(build_entry(
            square,
            mask,
            &blockers,
            &attacks,
            BISHOP_MAGICS[square],
            &mut rng,
        )?);
    }

    debug!("magic tables generated");

    Ok(MagicTables {
        rook: RookMagicTables {
            entries: rook_entries,
        },
        bishop: BishopMagicTables {
            entries: bishop_entries,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rook_mask_counts() {
        // Corner: 6 + 6 relevant squares; center: 5 + 5.
        assert_eq!(rook_mask(0).count_ones(), 12);
        assert_eq!(rook_mask(27).count_ones(), 10);
        // Masks never touch the square itself.
        for sq in 0..64 {
            assert_eq!(rook_mask(sq) & (1 << sq), 0);
            assert_eq!(bishop_mask(sq) & (1 << sq), 0);
        }
    }

    #[test]
    fn bishop_mask_counts() {
        assert_eq!(bishop_mask(0).count_ones(), 6);
        assert_eq!(bishop_mask(27).count_ones(), 9); // d4
        assert_eq!(bishop_mask(28).count_ones(), 9); // e4
    }

    #[test]
    fn subset_enumeration_is_complete() {
        let mask = 0b1011u64;
        let mut subs = enumerate_subsets(mask);
        subs.sort_unstable();
        assert_eq!(subs, vec![0b0000, 0b0001, 0b0010, 0b0011, 0b1000, 0b1001, 0b1010, 0b1011]);
    }
}

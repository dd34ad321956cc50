use super::precompute::{MagicTableSeed, generate_magic_tables};
use super::structs::MagicTables;

/// Deterministic seed for the fallback search so table generation is
/// reproducible across runs.
const LOADER_SEED: u64 = 0x45;

#[cfg(feature = "load_magic")]
const MAGIC_TABLE_FILE: &str = "magic_tables.bin";

/// Build (or with `load_magic`, deserialize) the sliding attack tables.
///
/// Generation from the hardcoded constants takes a few milliseconds at
/// startup; the serialized path exists for targets where that matters.
pub fn load_magic_tables() -> MagicTables {
    #[cfg(feature = "load_magic")]
    {
        if let Some(tables) = try_load_from_disk() {
            return tables;
        }
    }

    generate_magic_tables(MagicTableSeed::Fixed(LOADER_SEED))
        .expect("magic table generation cannot fail with verified constants")
}

#[cfg(feature = "load_magic")]
fn try_load_from_disk() -> Option<MagicTables> {
    use std::fs::File;
    use std::io::BufReader;
    use tracing::info;

    let file = File::open(MAGIC_TABLE_FILE).ok()?;
    let tables: MagicTables = bincode::deserialize_from(BufReader::new(file)).ok()?;
    if tables.rook.entries.len() == 64 && tables.bishop.entries.len() == 64 {
        info!("magic tables loaded from {}", MAGIC_TABLE_FILE);
        Some(tables)
    } else {
        None
    }
}

/// Serialize the generated tables for later `load_magic` startups.
#[cfg(feature = "load_magic")]
pub fn save_magic_tables(tables: &MagicTables) -> std::io::Result<()> {
    use std::fs::File;
    use std::io::BufWriter;

    let file = File::create(MAGIC_TABLE_FILE)?;
    bincode::serialize_into(BufWriter::new(file), tables)
        .map_err(|e| std::io::Error::other(e.to_string()))
}

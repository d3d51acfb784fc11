//! Generate spend circuit keys and export the verifying key.
//!
//! Usage: `setup-keys [keys_dir] [depth]` (defaults: `keys`, 20).
//!
//! Writes `spend.pk`, `spend.vk`, `spend.json` and a snarkjs-style
//! `verification_key.json` for verifier contract generation. Keys already in
//! the directory are loaded, never replaced.

use std::error::Error;
use std::path::PathBuf;

use rand::rngs::OsRng;

use swap_circuits::{PoseidonHasher, DEFAULT_HEIGHT};
use swap_prover::setup::{load_or_setup, CircuitKeyPair};
use swap_prover::SnarkjsVerifyingKey;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let keys_dir = PathBuf::from(args.next().unwrap_or_else(|| "keys".to_string()));
    let depth = match args.next() {
        Some(d) => d.parse::<usize>()?,
        None => DEFAULT_HEIGHT,
    };

    let hasher = PoseidonHasher::new()?;

    if !CircuitKeyPair::exists_in(&keys_dir) {
        println!("Running trusted setup for depth {} (this may take a while)...", depth);
    }
    let (keys, generated) = load_or_setup(&keys_dir, &mut OsRng, &hasher, depth)?;
    if generated {
        println!("Keys saved to {:?}", keys_dir);
    } else {
        println!("Loaded existing keys from {:?}", keys_dir);
    }

    let vk_bytes = keys.serialize_vk()?;
    println!("\nSpend VK ({} bytes):", vk_bytes.len());
    println!("0x{}\n", hex::encode(&vk_bytes));

    let json_path = keys_dir.join("verification_key.json");
    let exported = SnarkjsVerifyingKey::from_vk(&keys.verifying_key);
    std::fs::write(&json_path, serde_json::to_string_pretty(&exported)?)?;
    println!("Verification key exported to {:?}", json_path);

    Ok(())
}

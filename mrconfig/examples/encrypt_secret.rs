//! Outil CLI pour chiffrer/déchiffrer les secrets de config.yaml
//!
//! Usage:
//!   cargo run -p mrconfig --example encrypt_secret -- encrypt "client_secret"
//!   cargo run -p mrconfig --example encrypt_secret -- decrypt "encrypted:ABC123..."

use anyhow::{anyhow, Result};
use mrconfig::encryption::{decrypt_secret, encrypt_secret, is_encrypted};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("encrypt"), Some(secret)) => {
            let encrypted = encrypt_secret(secret)?;
            println!("Encrypted: {}", encrypted);
            println!("\nPaste it in config.yaml, for example:");
            println!("  client_secret: \"{}\"", encrypted);
        }
        (Some("decrypt"), Some(encrypted)) => {
            if !is_encrypted(encrypted) {
                return Err(anyhow!("Value does not start with 'encrypted:'"));
            }
            println!("Decrypted: {}", decrypt_secret(encrypted)?);
        }
        _ => print_usage(),
    }

    Ok(())
}

fn print_usage() {
    println!("Usage:");
    println!("  cargo run -p mrconfig --example encrypt_secret -- encrypt <secret>");
    println!("  cargo run -p mrconfig --example encrypt_secret -- decrypt <encrypted>");
}

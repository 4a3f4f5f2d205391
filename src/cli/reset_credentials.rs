use super::config::{default_config_path, default_credentials_path, WagateConfig};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use wagate::whatsapp::{CredentialStore, FileCredentialStore};

/// Delete the persisted WhatsApp credentials
///
/// The next `POST /api/connect` starts pairing from scratch with a new QR
/// code. The linked device stays listed in the phone's WhatsApp app until it
/// is removed there.
pub async fn execute(config_path: Option<String>, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let credentials_path = resolve_credentials_path(&config_path)?;

    if !credentials_path.exists() {
        println!(
            "No credentials found at: {}\nNothing to reset.",
            credentials_path.display()
        );
        return Ok(());
    }

    println!("⚠️  This removes the WhatsApp session stored at:");
    println!("   {}", credentials_path.display());
    println!("   You will need to scan a new QR code to reconnect.");
    println!();

    if !yes && !confirm_action("Type 'RESET' to confirm: ", "RESET")? {
        println!("Aborted.");
        return Ok(());
    }

    FileCredentialStore::new(&credentials_path).clear().await?;

    println!("✅ Credentials removed");
    println!(
        "   Also remove the linked device from WhatsApp on your phone \
         (Settings → Linked Devices)."
    );

    Ok(())
}

/// Credentials path from the config file, or the default when there is none
fn resolve_credentials_path(config_path: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if config_path.exists() {
        Ok(WagateConfig::load(config_path)?.whatsapp.credentials_path)
    } else {
        Ok(default_credentials_path())
    }
}

/// Parse user confirmation input against expected string
///
/// Handles whitespace trimming and exact string matching.
pub fn parse_confirmation(input: &str, expected: &str) -> bool {
    input.trim() == expected
}

/// Prompt user for confirmation with a specific expected input
fn confirm_action(prompt: &str, expected: &str) -> Result<bool, Box<dyn std::error::Error>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(parse_confirmation(&input, expected))
}

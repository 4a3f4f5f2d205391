/// Display version information
pub fn execute() {
    println!("wagate {}", env!("CARGO_PKG_VERSION"));
    println!("WhatsApp gateway with QR pairing and a REST API");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        // Version command should not panic
        execute();
    }
}

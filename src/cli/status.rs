use wagate::whatsapp::StatusSnapshot;

/// Query a running gateway for its connection status
///
/// Calls `GET /api/status` on the server at `url` and prints the snapshot.
pub async fn execute(url: String) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = format!("{}/api/status", url.trim_end_matches('/'));

    let snapshot: StatusSnapshot = reqwest::get(&endpoint)
        .await
        .map_err(|e| format!("Failed to reach wagate at {}: {}", url, e))?
        .error_for_status()?
        .json()
        .await?;

    println!("📊 wagate Status");
    println!();
    for line in render(&snapshot) {
        println!("  {}", line);
    }

    Ok(())
}

fn render(snapshot: &StatusSnapshot) -> Vec<String> {
    let mut lines = Vec::new();

    if snapshot.is_connected {
        lines.push("✅ WhatsApp: Connected".to_string());
    } else if snapshot.qr_code.is_some() {
        lines.push("📱 WhatsApp: Waiting for QR scan".to_string());
    } else {
        lines.push("❌ WhatsApp: Disconnected".to_string());
    }

    if snapshot.qr_attempts > 0 {
        lines.push(format!("QR attempts: {}", snapshot.qr_attempts));
    }

    lines
}

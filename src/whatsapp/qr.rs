//! QR rendering for device pairing.
//!
//! Pairing tokens become `data:` URLs the web UI can drop into an `<img>`,
//! and optionally get printed to the operator's terminal.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use qrcode::render::svg;
use qrcode::QrCode;
use tokio::time::Instant;
use tracing::warn;

/// Data URL prefix for rendered images
const SVG_DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// Minimum rendered edge in pixels
const MIN_DIMENSION: u32 = 256;

/// QR rendering errors
#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("Failed to encode pairing token: {0}")]
    Encode(#[from] qrcode::types::QrError),
}

/// A rendered pairing QR code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrImage {
    /// Which attempt in the pairing cycle produced this image
    pub attempt: u32,
    /// `data:image/svg+xml;base64,...`
    pub data_url: String,
    /// When the token was issued (expiry is measured from here)
    pub issued_at: Instant,
}

/// Render a pairing token into an SVG data URL.
pub fn render_data_url(token: &str) -> Result<String, QrError> {
    let code = QrCode::new(token.as_bytes())?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .build();

    Ok(format!("{}{}", SVG_DATA_URL_PREFIX, BASE64.encode(image)))
}

/// Print a pairing token as a scannable QR code on stdout.
///
/// Falls back to printing the raw token if the terminal renderer fails.
pub fn print_to_terminal(token: &str, attempt: u32, max_attempts: u32) {
    println!();
    println!(
        "📱 Scan this QR code with WhatsApp ({}/{}):",
        attempt, max_attempts
    );
    println!("   WhatsApp → Settings → Linked Devices → Link a Device");
    println!();

    if let Err(e) = qr2term::print_qr(token) {
        warn!(error = %e, "failed to print QR code to terminal");
        println!("Pairing token: {}", token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_produces_svg_data_url() {
        let url = render_data_url("2@abc123,XyZ,Q0RF,1").unwrap();
        assert!(url.starts_with(SVG_DATA_URL_PREFIX));

        let svg_bytes = BASE64
            .decode(&url[SVG_DATA_URL_PREFIX.len()..])
            .unwrap();
        let svg = String::from_utf8(svg_bytes).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(
            render_data_url("same-token").unwrap(),
            render_data_url("same-token").unwrap()
        );
        assert_ne!(
            render_data_url("token-a").unwrap(),
            render_data_url("token-b").unwrap()
        );
    }

    #[test]
    fn test_render_rejects_oversized_token() {
        // Larger than the biggest QR version can hold
        let token = "x".repeat(8000);
        assert!(matches!(render_data_url(&token), Err(QrError::Encode(_))));
    }
}

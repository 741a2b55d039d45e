//! Command handlers for the one-shot CLI surface.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;

use bookcourier_core::delivery::{
    BookEmail, Courier, DeliveryOutcome, DeliveryRequest, EMAIL_CONFIG_INCOMPLETE, Mailer,
    SmtpMailer, build_mime_message,
};
use bookcourier_core::{BookRecord, SearchClient};

use super::config::Settings;

/// Minimal single-page PDF used by `test-email`.
pub(crate) const TEST_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<\n/Type /Catalog\n>>\nendobj\nxref\n0 1\ntrailer\n<<\n/Size 1\n>>\nstartxref\n9\n%%EOF";
const TEST_PDF_FILENAME: &str = "test-book.pdf";
const TEST_PDF_TITLE: &str = "Test Book - Email Functionality";

/// Runs `search` and prints the results.
pub(crate) async fn search(
    settings: &Settings,
    term: &str,
    format: Option<&str>,
    json: bool,
) -> Result<()> {
    let client = SearchClient::with_base_url(&settings.base_url)?;
    let records = match format {
        Some(format) => client.search_with_format(term, format).await,
        None => client.search(term).await,
    }
    .with_context(|| format!("Failed to search for '{term}'"))?;

    info!(term, count = records.len(), "search command completed");
    println!("{}", render_records(&records, json)?);
    Ok(())
}

/// Renders records as numbered text blocks or a JSON array.
pub(crate) fn render_records(records: &[BookRecord], json: bool) -> Result<String> {
    if json {
        return serde_json::to_string_pretty(records).context("Failed to serialize records");
    }
    if records.is_empty() {
        return Ok("No books found.".to_string());
    }
    Ok(records
        .iter()
        .enumerate()
        .map(|(index, record)| format!("Book {}:\n{record}", index + 1))
        .collect::<Vec<_>>()
        .join("\n\n"))
}

/// Splits `Title.ext` into a title and declared format.
pub(crate) fn split_download_filename(filename: &str) -> Result<(String, String)> {
    let path = Path::new(filename);
    let format = path
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty());
    let title = path.file_stem().and_then(|stem| stem.to_str());
    match (title, format) {
        (Some(title), Some(format)) => Ok((title.to_string(), format.to_string())),
        _ => bail!("filename must include an extension (e.g., .pdf, .epub)"),
    }
}

/// Runs `download`: resolves and saves the record locally.
pub(crate) async fn download(settings: &Settings, hash: &str, filename: &str) -> Result<()> {
    let (title, format) = split_download_filename(filename)?;
    let courier = Courier::new(settings.delivery_config(), &settings.base_url)?;
    let request = DeliveryRequest::new(hash, title, format);

    let outcome = courier
        .save_locally(&request)
        .await
        .with_context(|| format!("Failed to download book {hash}"))?;
    if let DeliveryOutcome::SavedLocally { path, status } = &outcome {
        info!(path = %path.display(), ?status, "download command completed");
    }
    println!("{outcome}");
    Ok(())
}

/// Runs `test-email`: sends [`TEST_PDF`] to the default inbox.
pub(crate) async fn test_email(settings: &Settings) -> Result<()> {
    if !settings.smtp.is_complete() {
        bail!(EMAIL_CONFIG_INCOMPLETE);
    }
    let Some(target) = settings.default_target.as_deref() else {
        bail!("KINDLE_EMAIL must be set to send a test email");
    };

    info!(
        from = %settings.smtp.from,
        to = %target,
        smtp = %format!("{}:{}", settings.smtp.host, settings.smtp.effective_port()),
        "testing email delivery"
    );
    let message = build_mime_message(&BookEmail {
        from: &settings.smtp.from,
        to: target,
        filename: TEST_PDF_FILENAME,
        title: TEST_PDF_TITLE,
        mime_type: "application/pdf",
        attachment: TEST_PDF,
    });
    SmtpMailer
        .send(&settings.smtp, target, &message)
        .await
        .context("Failed to send test email")?;

    println!("Test email sent successfully!");
    println!("   From: {}", settings.smtp.from);
    println!("   To: {target}");
    println!("   Check your e-reader in a few minutes.");
    Ok(())
}

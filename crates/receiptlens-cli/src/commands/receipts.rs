//! Receipt command implementations

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use receiptlens_core::{
    format_amount, FinanceClient, IngestSnapshot, IngestState, IngestionPipeline, ReceiptImage,
};
use tokio::sync::watch;

use super::{bar, truncate, user_error};

const PROGRESS_WIDTH: usize = 30;

pub async fn cmd_receipts_upload(client: &FinanceClient, file: &Path) -> Result<()> {
    let image = ReceiptImage::from_path(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    println!("📤 Uploading {} ({} KB)...", image.file_name, image.data.len() / 1024);

    let mut pipeline = IngestionPipeline::new();
    pipeline.select_image(image);
    let renderer = tokio::spawn(render_progress(pipeline.subscribe()));

    let result = client.ingest_receipt(&mut pipeline).await;
    let final_state = pipeline.state().clone();
    drop(pipeline);
    let _ = renderer.await;

    let receipt = match (result, final_state) {
        (Ok(receipt), _) => receipt,
        (Err(_), IngestState::Failed(message)) => anyhow::bail!(message),
        (Err(e), _) => return Err(user_error(e, "Failed to process receipt")),
    };

    println!("✅ Receipt processed");
    println!(
        "   {} │ {} │ {}",
        receipt.vendor.as_deref().unwrap_or("Unknown vendor"),
        receipt.purchase_date.format("%Y-%m-%d"),
        format_amount(receipt.total_amount)
    );
    if let Some(ref category) = receipt.category {
        println!("   Category: {}", category);
    }
    println!("   A transaction was added for this receipt.");

    Ok(())
}

/// Draw the upload progress line until the pipeline goes away
async fn render_progress(mut rx: watch::Receiver<IngestSnapshot>) {
    let mut drawn = false;
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if matches!(
            snapshot.state,
            IngestState::Uploading | IngestState::Succeeded(_)
        ) {
            print!(
                "\r   {} {:>3.0}%",
                bar(snapshot.progress, PROGRESS_WIDTH),
                snapshot.progress * 100.0
            );
            let _ = std::io::stdout().flush();
            drawn = true;
        }
    }
    if drawn {
        println!();
    }
}

pub async fn cmd_receipts_list(client: &FinanceClient, limit: u32) -> Result<()> {
    let receipts = client
        .list_receipts(0, limit)
        .await
        .map_err(|e| user_error(e, "Failed to load receipts"))?;

    if receipts.is_empty() {
        println!("No receipts yet. Upload one with:");
        println!("  receiptlens receipts upload photo.jpg");
        return Ok(());
    }

    println!();
    println!("🧾 Receipts");
    println!("   ─────────────────────────────────────────────────────────────");

    for receipt in receipts {
        println!(
            "   [{}] {} │ {:>10} │ {}",
            receipt.id,
            receipt.purchase_date.format("%Y-%m-%d"),
            format_amount(receipt.total_amount),
            truncate(receipt.vendor.as_deref().unwrap_or("Unknown vendor"), 30)
        );
    }

    Ok(())
}

pub async fn cmd_receipts_show(client: &FinanceClient, id: &str) -> Result<()> {
    let receipt = client
        .get_receipt(id)
        .await
        .map_err(|e| user_error(e, "Failed to load receipt"))?;

    println!();
    println!(
        "🧾 {}",
        receipt.vendor.as_deref().unwrap_or("Unknown vendor")
    );
    println!("   ID: {}", receipt.id);
    println!("   Date: {}", receipt.purchase_date.format("%Y-%m-%d"));
    println!(
        "   Total: {} {} (tax {})",
        format_amount(receipt.total_amount),
        receipt.currency,
        format_amount(receipt.tax_amount)
    );
    if let Some(ref category) = receipt.category {
        println!("   Category: {}", category);
    }
    println!("   Image: {}", receipt.image_path);

    if let Some(ref text) = receipt.raw_ocr_text {
        println!();
        println!("   Extracted text:");
        for line in text.lines().take(15) {
            println!("     {}", truncate(line, 60));
        }
    }

    Ok(())
}

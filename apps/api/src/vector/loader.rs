use bytes::Bytes;
use tracing::info;

use crate::vector::{ResumeDocument, VectorStoreError};

/// Extracts text from a PDF held in memory. Pages are separated by form
/// feeds in the extracted text; a document without them is one page.
/// Parsing is CPU-bound, so it runs on the blocking pool.
pub async fn load_pdf(bytes: Bytes, source: String) -> Result<ResumeDocument, VectorStoreError> {
    if bytes.is_empty() {
        return Err(VectorStoreError::Load("file is empty".to_string()));
    }
    let size = bytes.len();

    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| VectorStoreError::Load(format!("PDF extraction task failed: {e}")))?
        .map_err(|e| VectorStoreError::Load(e.to_string()))?;

    let document = ResumeDocument::from_text(source, &text);
    info!(
        "Loaded '{}' ({} bytes, {} pages)",
        document.source,
        size,
        document.pages.len()
    );
    Ok(document)
}

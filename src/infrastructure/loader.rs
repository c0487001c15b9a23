//! Reads PDF, text and markdown sources into plain text.

use std::path::Path;

use crate::domain::{is_allowed_extension, DomainError, ALLOWED_EXTENSIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
}

impl FileKind {
    pub fn from_name(name: &str) -> Result<Self, DomainError> {
        if !is_allowed_extension(name) {
            return Err(DomainError::unsupported(ALLOWED_EXTENSIONS.join(", ")));
        }

        let is_pdf = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        Ok(if is_pdf { Self::Pdf } else { Self::Text })
    }
}

pub async fn load_document(path: &Path) -> Result<String, DomainError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(DomainError::not_found(format!(
            "File not found: {}",
            path.display()
        )));
    }

    let name = path.to_string_lossy();
    let kind = FileKind::from_name(&name)?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to read document");
        DomainError::Io(e)
    })?;

    load_bytes_as(kind, &name, bytes).await
}

pub async fn load_bytes(name: &str, bytes: Vec<u8>) -> Result<String, DomainError> {
    let kind = FileKind::from_name(name)?;
    load_bytes_as(kind, name, bytes).await
}

async fn load_bytes_as(kind: FileKind, name: &str, bytes: Vec<u8>) -> Result<String, DomainError> {
    match kind {
        FileKind::Text => String::from_utf8(bytes).map_err(|e| {
            tracing::error!(file = name, error = %e, "text file is not valid UTF-8");
            DomainError::validation(format!("{name} is not valid UTF-8"))
        }),
        FileKind::Pdf => {
            let owned_name = name.to_string();
            tokio::task::spawn_blocking(move || extract_pdf_text(&owned_name, &bytes))
                .await
                .map_err(|e| DomainError::internal(format!("PDF extraction task failed: {e}")))?
        }
    }
}

/// Text of every page that has any, separated by blank lines.
fn extract_pdf_text(name: &str, bytes: &[u8]) -> Result<String, DomainError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
        tracing::error!(file = name, error = %e, "error loading PDF");
        DomainError::validation(format!("Could not read PDF {name}: {e}"))
    })?;

    Ok(pages
        .into_iter()
        .filter(|page| !page.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_name() {
        assert_eq!(FileKind::from_name("paper.PDF").unwrap(), FileKind::Pdf);
        assert_eq!(FileKind::from_name("notes.md").unwrap(), FileKind::Text);
        assert!(matches!(
            FileKind::from_name("sheet.xlsx"),
            Err(DomainError::UnsupportedFileType(_))
        ));
    }

    #[tokio::test]
    async fn test_load_text_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello world").unwrap();

        assert_eq!(load_document(&path).await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("absent.txt")).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unsupported_upload() {
        let err = load_bytes("image.png", vec![0, 1, 2]).await.unwrap_err();
        assert!(err.to_string().contains(".pdf, .txt, .md"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_rejected() {
        let err = load_bytes("bad.txt", vec![0xff, 0xfe]).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}

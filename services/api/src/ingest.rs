//! Ingestion Service
//!
//! Turns an uploaded document into a persisted knowledge record: validate
//! the input, stage the bytes to a uniquely named temporary file, run the
//! extraction process, and upsert the record under its derived slug. The
//! staged file is owned by a [`NamedTempFile`] guard whose drop removes it
//! on every exit path, success or failure.

use std::io::Write;
use std::sync::Arc;

use studeo_core::knowledge::KnowledgeRecord;
use studeo_core::slug::slugify;
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::extractor::{ExtractError, Extractor, OutputPolicy};
use crate::store::KnowledgeStore;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("failed to stage upload: {0}")]
    Staging(#[from] std::io::Error),
    #[error(transparent)]
    Extraction(#[from] ExtractError),
    #[error("failed to persist knowledge record: {0}")]
    Store(#[source] anyhow::Error),
}

/// Composes the extraction invoker and the knowledge store.
#[derive(Clone)]
pub struct IngestService {
    extractor: Extractor,
    policy: OutputPolicy,
    store: Arc<dyn KnowledgeStore>,
}

impl IngestService {
    pub fn new(extractor: Extractor, policy: OutputPolicy, store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            extractor,
            policy,
            store,
        }
    }

    /// Ingests one upload and returns the derived agent id.
    ///
    /// Input is rejected before anything is staged or spawned. A record is
    /// only ever written fully formed, after extraction succeeded; readers
    /// never observe a partial one.
    #[instrument(skip(self, payload), fields(size = payload.len()))]
    pub async fn create_agent(
        &self,
        name: &str,
        payload: &[u8],
        filename: Option<&str>,
    ) -> Result<String, IngestError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(IngestError::InvalidInput(
                "the `name` field is required and must not be empty".to_string(),
            ));
        }
        let id = slugify(name);
        if id.is_empty() {
            return Err(IngestError::InvalidInput(
                "the `name` field must contain at least one letter or digit".to_string(),
            ));
        }
        if payload.is_empty() {
            return Err(IngestError::InvalidInput(
                "a non-empty `file` upload is required".to_string(),
            ));
        }

        let staged = stage_upload(payload, filename)?;
        let extraction = self.extractor.extract(staged.path(), self.policy).await?;

        let record = KnowledgeRecord::new(name, extraction.content);
        self.store
            .upsert(record)
            .await
            .map_err(IngestError::Store)?;

        info!(%id, "knowledge record ingested");
        Ok(id)
    }
}

/// Stages upload bytes to a uniquely named temporary file.
///
/// The original filename only contributes its extension, so extraction
/// scripts that sniff file types by suffix keep working. The extension is
/// client-supplied and lands in a filesystem path, so anything but ASCII
/// alphanumerics is discarded. The returned guard deletes the file when
/// dropped.
pub(crate) fn stage_upload(
    payload: &[u8],
    filename: Option<&str>,
) -> std::io::Result<NamedTempFile> {
    let suffix = filename
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    let mut staged = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile()?;
    staged.write_all(payload)?;
    staged.flush()?;
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use std::time::Duration;

    fn service_with_script(dir: &tempfile::TempDir, body: &str) -> IngestService {
        let script = dir.path().join("extract.sh");
        std::fs::write(&script, body).unwrap();
        let extractor = Extractor::new("sh", script, Duration::from_secs(5));
        let store = Arc::new(JsonFileStore::new(dir.path().join("agents.json")));
        IngestService::new(extractor, OutputPolicy::Lenient, store)
    }

    /// An extractor that would fail loudly if it were ever invoked.
    fn service_without_extractor(dir: &tempfile::TempDir) -> IngestService {
        let extractor = Extractor::new(
            "studeo-no-such-interpreter",
            dir.path().join("missing.sh"),
            Duration::from_secs(1),
        );
        let store = Arc::new(JsonFileStore::new(dir.path().join("agents.json")));
        IngestService::new(extractor, OutputPolicy::Lenient, store)
    }

    #[tokio::test]
    async fn successful_ingestion_returns_slug_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_script(&dir, r#"echo '{"text":"key concepts"}'"#);

        let id = service
            .create_agent("History 101", b"%PDF-1.4", Some("notes.pdf"))
            .await
            .unwrap();
        assert_eq!(id, "history-101");

        let store = JsonFileStore::new(dir.path().join("agents.json"));
        let record = store.get("history-101").await.unwrap().unwrap();
        assert_eq!(record.name, "History 101");
        assert_eq!(record.content, "key concepts");
    }

    #[tokio::test]
    async fn reingesting_same_name_overwrites() {
        let dir = tempfile::tempdir().unwrap();

        let first = service_with_script(&dir, r#"echo '{"text":"v1"}'"#);
        first.create_agent("Bio", b"%PDF", None).await.unwrap();

        let second = service_with_script(&dir, r#"echo '{"text":"v2"}'"#);
        second.create_agent("BIO!", b"%PDF", None).await.unwrap();

        let store = JsonFileStore::new(dir.path().join("agents.json"));
        let map = store.list().await.unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["bio"].content, "v2");
    }

    #[tokio::test]
    async fn empty_name_rejected_without_invoking_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_without_extractor(&dir);
        let err = service.create_agent("   ", b"%PDF", None).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn name_without_alphanumerics_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_without_extractor(&dir);
        let err = service.create_agent("!!!", b"%PDF", None).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn empty_upload_rejected_without_invoking_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_without_extractor(&dir);
        let err = service.create_agent("Bio", b"", None).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn extraction_failure_writes_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_with_script(&dir, "echo 'cannot parse' >&2\nexit 1");

        let err = service.create_agent("Bio", b"%PDF", None).await.unwrap_err();
        assert!(matches!(err, IngestError::Extraction(_)));

        let store = JsonFileStore::new(dir.path().join("agents.json"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn staged_file_carries_the_upload_bytes_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        // The script echoes the staged path's contents back as the result.
        let service = service_with_script(&dir, r#"printf '{"text":"%s"}' "$(cat "$1")""#);

        let id = service
            .create_agent("Echo Test", b"staged-bytes", Some("doc.pdf"))
            .await
            .unwrap();

        let store = JsonFileStore::new(dir.path().join("agents.json"));
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.content, "staged-bytes");
    }

    #[test]
    fn hostile_filename_extension_is_discarded() {
        // A path separator or other junk after the last dot must not end
        // up in the staged file's name.
        for filename in ["notes.d/x", "report.p df", "doc.", "..", "archive.tar.gz/"] {
            let staged = stage_upload(b"x", Some(filename)).unwrap();
            assert!(
                staged.path().extension().is_none(),
                "unexpected extension for {filename:?}: {:?}",
                staged.path()
            );
        }
        // A sane multi-dot name still keeps its final extension.
        let staged = stage_upload(b"x", Some("archive.tar.gz")).unwrap();
        assert!(staged.path().extension().is_some_and(|e| e == "gz"));
    }

    #[test]
    fn staging_is_unique_and_scoped() {
        let a = stage_upload(b"a", Some("x.pdf")).unwrap();
        let b = stage_upload(b"b", Some("x.pdf")).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a.path().extension().is_some_and(|e| e == "pdf"));

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists(), "staged file must be removed on drop");
    }
}

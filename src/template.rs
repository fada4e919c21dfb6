use crate::error::RenderError;
use crate::pdfinspect::{PdfInspectErrorCode, inspect_pdf_bytes, require_template_compatibility};
use certrender_report::hex_sha256;
use lopdf::Document as LoDocument;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Source of template asset bytes, keyed by asset name (e.g. `gas_safety.pdf`).
pub trait TemplateStore: Send + Sync {
    fn load(&self, asset: &str) -> Result<Arc<[u8]>, RenderError>;
}

pub struct FsTemplateStore {
    dir: PathBuf,
}

impl FsTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TemplateStore for FsTemplateStore {
    fn load(&self, asset: &str) -> Result<Arc<[u8]>, RenderError> {
        let path = self.dir.join(asset);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Arc::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(RenderError::TemplateMissing(path)),
            Err(err) => Err(RenderError::TemplateCorrupt {
                asset: asset.to_string(),
                message: format!("{}: {}", PdfInspectErrorCode::PdfIoError.as_str(), err),
            }),
        }
    }
}

#[derive(Default)]
pub struct MemoryTemplateStore {
    assets: BTreeMap<String, Arc<[u8]>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, asset: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.insert(asset.into(), Arc::from(bytes.into()));
        self
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, asset: &str) -> Result<Arc<[u8]>, RenderError> {
        self.assets
            .get(asset)
            .cloned()
            .ok_or_else(|| RenderError::TemplateMissing(PathBuf::from(asset)))
    }
}

/// Process-wide template bytes, filled on first use. Entries live until
/// `invalidate` or `clear` is called.
pub struct TemplateCache {
    store: Box<dyn TemplateStore>,
    fingerprints: BTreeMap<String, String>,
    entries: Mutex<BTreeMap<String, Arc<[u8]>>>,
}

impl TemplateCache {
    pub fn new(store: Box<dyn TemplateStore>) -> Self {
        Self {
            store,
            fingerprints: BTreeMap::new(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Pins `asset` to a sha256 hex digest; a mismatching load fails.
    pub fn with_fingerprint(mut self, asset: impl Into<String>, sha256_hex: impl Into<String>) -> Self {
        self.fingerprints
            .insert(asset.into(), sha256_hex.into().to_ascii_lowercase());
        self
    }

    pub fn get(&self, asset: &str) -> Result<Arc<[u8]>, RenderError> {
        if let Some(bytes) = self.lock()?.get(asset) {
            return Ok(Arc::clone(bytes));
        }
        // Loaded outside the lock so a slow store never serializes other assets.
        let bytes = self.store.load(asset)?;
        if let Some(expected) = self.fingerprints.get(asset) {
            let found = hex_sha256(&bytes);
            if &found != expected {
                return Err(RenderError::TemplateFingerprintMismatch {
                    asset: asset.to_string(),
                    expected: expected.clone(),
                    found,
                });
            }
        }
        let mut entries = self.lock()?;
        let cached = entries
            .entry(asset.to_string())
            .or_insert_with(|| Arc::clone(&bytes));
        Ok(Arc::clone(cached))
    }

    /// Loads, inspects and parses `asset` into a fresh document owned by the caller.
    pub fn open(&self, asset: &str) -> Result<LoDocument, RenderError> {
        let bytes = self.get(asset)?;
        let corrupt = |message: String| RenderError::TemplateCorrupt {
            asset: asset.to_string(),
            message,
        };
        let (doc, report) = inspect_pdf_bytes(&bytes).map_err(|err| corrupt(err.to_string()))?;
        require_template_compatibility(&report).map_err(|err| corrupt(err.to_string()))?;
        Ok(doc)
    }

    pub fn is_cached(&self, asset: &str) -> bool {
        self.lock().map(|entries| entries.contains_key(asset)).unwrap_or(false)
    }

    pub fn invalidate(&self, asset: &str) -> bool {
        self.lock()
            .map(|mut entries| entries.remove(asset).is_some())
            .unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.lock() {
            entries.clear();
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Arc<[u8]>>>, RenderError> {
        self.entries
            .lock()
            .map_err(|_| RenderError::InvalidConfiguration("template cache poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::new_document;
    use crate::types::Size;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pdf_bytes() -> Vec<u8> {
        let mut doc = new_document(Size::a4(), 1).expect("doc");
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    struct CountingStore {
        inner: MemoryTemplateStore,
        loads: Arc<AtomicUsize>,
    }

    impl TemplateStore for CountingStore {
        fn load(&self, asset: &str) -> Result<Arc<[u8]>, RenderError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(asset)
        }
    }

    #[test]
    fn cache_loads_once_until_invalidated() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = TemplateCache::new(Box::new(CountingStore {
            inner: MemoryTemplateStore::new().with("a.pdf", pdf_bytes()),
            loads: Arc::clone(&loads),
        }));
        cache.get("a.pdf").expect("first");
        cache.get("a.pdf").expect("second");
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.is_cached("a.pdf"));
        assert!(cache.invalidate("a.pdf"));
        cache.get("a.pdf").expect("third");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        cache.clear();
        assert!(!cache.is_cached("a.pdf"));
    }

    #[test]
    fn missing_asset_is_template_missing() {
        let cache = TemplateCache::new(Box::new(MemoryTemplateStore::new()));
        let err = cache.open("nope.pdf").expect_err("missing");
        assert!(matches!(err, RenderError::TemplateMissing(_)));
        assert!(err.is_template_failure());
    }

    #[test]
    fn fs_store_reports_missing_path() {
        let dir = std::env::temp_dir().join("certrender-template-missing");
        let store = FsTemplateStore::new(&dir);
        match store.load("absent.pdf") {
            Err(RenderError::TemplateMissing(path)) => assert_eq!(path, dir.join("absent.pdf")),
            _ => panic!("expected TemplateMissing"),
        }
    }

    #[test]
    fn corrupt_bytes_are_template_corrupt() {
        let cache = TemplateCache::new(Box::new(
            MemoryTemplateStore::new().with("bad.pdf", b"not a pdf".to_vec()),
        ));
        let err = cache.open("bad.pdf").expect_err("corrupt");
        assert!(matches!(err, RenderError::TemplateCorrupt { .. }));
    }

    #[test]
    fn fingerprint_mismatch_is_rejected() {
        let bytes = pdf_bytes();
        let good = hex_sha256(&bytes);
        let cache = TemplateCache::new(Box::new(MemoryTemplateStore::new().with("a.pdf", bytes)))
            .with_fingerprint("a.pdf", good.to_ascii_uppercase());
        assert!(cache.open("a.pdf").is_ok());

        let cache = TemplateCache::new(Box::new(MemoryTemplateStore::new().with("a.pdf", pdf_bytes())))
            .with_fingerprint("a.pdf", "00");
        let err = cache.get("a.pdf").expect_err("mismatch");
        assert!(matches!(err, RenderError::TemplateFingerprintMismatch { .. }));
        assert!(!cache.is_cached("a.pdf"));
    }
}

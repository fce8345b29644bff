use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use crate::error::{AppError, AppResult};
use crate::models::{Class, Source, SourceEntry, SourceType};
use log::debug;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

const CLASS_EMOJIS: [&str; 11] = [
    "📚", "🤔", "🧠", "📝", "🔬", "🧪", "🧮", "📊", "📈", "🤖", "💻",
];

pub fn get_app_data_dir() -> AppResult<PathBuf> {
    let data_dir = match std::env::var_os("EXAMLM_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .ok_or_else(|| AppError::Config("Could not find data directory".into()))?
            .join("ExamLM"),
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> AppResult<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    debug!("[storage] wrote {}", path.display());
    Ok(())
}

/// Flat-file store for classes, their sources and uploaded files.
///
/// `classes.json` holds the class list (newest first), `sources.json` maps a
/// class id to its sources, and uploaded bytes land in `uploads/`.
pub struct Storage {
    root: PathBuf,
    // serialises read-modify-write cycles on the json files
    lock: Mutex<()>,
}

impl Storage {
    pub fn open(root: impl Into<PathBuf>) -> AppResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("uploads"))?;
        Ok(Self { root, lock: Mutex::new(()) })
    }

    pub fn open_default() -> AppResult<Self> {
        Self::open(get_app_data_dir()?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    fn classes_path(&self) -> PathBuf {
        self.root.join("classes.json")
    }

    fn sources_path(&self) -> PathBuf {
        self.root.join("sources.json")
    }

    fn read_classes(&self) -> AppResult<Vec<Class>> {
        read_json(&self.classes_path())
    }

    fn read_sources(&self) -> AppResult<BTreeMap<String, Vec<Source>>> {
        read_json(&self.sources_path())
    }

    pub fn list_classes(&self) -> AppResult<Vec<Class>> {
        let _guard = self.lock.lock();
        self.read_classes()
    }

    pub fn get_class(&self, class_id: &str) -> AppResult<Class> {
        self.list_classes()?
            .into_iter()
            .find(|c| c.id == class_id)
            .ok_or_else(|| AppError::not_found("Class", class_id))
    }

    pub fn add_class(&self, title: &str) -> AppResult<Class> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Invalid("class title is required".into()));
        }

        let emoji = CLASS_EMOJIS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("📚");

        let class = Class {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            emoji: emoji.to_string(),
            created_at: chrono::Local::now().format("%b %-d, %Y").to_string(),
            sources_count: 0,
        };

        let _guard = self.lock.lock();
        let mut classes = self.read_classes()?;
        classes.insert(0, class.clone());
        write_json(&self.classes_path(), &classes)?;

        Ok(class)
    }

    /// Sources of a class, all marked selected.
    pub fn list_sources(&self, class_id: &str) -> AppResult<Vec<SourceEntry>> {
        let _guard = self.lock.lock();
        let mut sources = self.read_sources()?;
        Ok(sources
            .remove(class_id)
            .unwrap_or_default()
            .into_iter()
            .map(SourceEntry::from)
            .collect())
    }

    /// Store uploaded bytes under `uploads/` and attach them to a class.
    pub fn add_source(
        &self,
        class_id: &str,
        title: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> AppResult<Source> {
        if bytes.is_empty() {
            return Err(AppError::Upload("File is missing.".into()));
        }

        let _guard = self.lock.lock();
        self.ensure_class(class_id)?;

        let stored_name = self.unique_upload_name(file_name)?;
        fs::write(self.uploads_dir().join(&stored_name), bytes)
            .map_err(|e| AppError::Upload(format!("could not store {}: {}", stored_name, e)))?;

        let title = if title.trim().is_empty() { file_name } else { title.trim() };
        let source = Source {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            source_type: SourceType::from_file_name(file_name),
            path: format!("/uploads/{}", stored_name),
        };

        self.push_source(class_id, source.clone())?;
        Ok(source)
    }

    pub fn add_url_source(&self, class_id: &str, title: &str, address: &str) -> AppResult<Source> {
        let parsed = url::Url::parse(address.trim())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Invalid(format!("unsupported source URL: {}", address)));
        }

        let _guard = self.lock.lock();
        self.ensure_class(class_id)?;

        let title = if title.trim().is_empty() { parsed.as_str() } else { title.trim() };
        let source = Source {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            source_type: SourceType::Url,
            path: parsed.to_string(),
        };

        self.push_source(class_id, source.clone())?;
        Ok(source)
    }

    /// Remove a source record. The uploaded file is left in place.
    pub fn delete_source(&self, class_id: &str, source_id: &str) -> AppResult<()> {
        let _guard = self.lock.lock();
        let mut sources = self.read_sources()?;
        let list = sources.entry(class_id.to_string()).or_default();

        let before = list.len();
        list.retain(|s| s.id != source_id);
        if list.len() == before {
            return Err(AppError::not_found("Source", source_id));
        }

        let count = list.len();
        write_json(&self.sources_path(), &sources)?;
        self.sync_count(class_id, count)
    }

    /// Where the assistant service can read a source: the stored file for
    /// uploads, the address itself for url sources.
    pub fn source_location(&self, source: &Source) -> String {
        match source.source_type {
            SourceType::Url => source.path.clone(),
            _ => {
                let name = source.path.trim_start_matches("/uploads/");
                self.uploads_dir().join(name).to_string_lossy().into_owned()
            }
        }
    }

    fn ensure_class(&self, class_id: &str) -> AppResult<()> {
        if self.read_classes()?.iter().any(|c| c.id == class_id) {
            Ok(())
        } else {
            Err(AppError::not_found("Class", class_id))
        }
    }

    fn push_source(&self, class_id: &str, source: Source) -> AppResult<()> {
        let mut sources = self.read_sources()?;
        let list = sources.entry(class_id.to_string()).or_default();
        list.push(source);
        let count = list.len();
        write_json(&self.sources_path(), &sources)?;
        self.sync_count(class_id, count)
    }

    fn sync_count(&self, class_id: &str, count: usize) -> AppResult<()> {
        let mut classes = self.read_classes()?;
        if let Some(class) = classes.iter_mut().find(|c| c.id == class_id) {
            class.sources_count = count;
            write_json(&self.classes_path(), &classes)?;
        }
        Ok(())
    }

    /// Final path component of `file_name`, slugged, made unique in `uploads/`.
    fn unique_upload_name(&self, file_name: &str) -> AppResult<String> {
        let path = Path::new(file_name);
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(slug::slugify)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Upload(format!("invalid file name: {:?}", file_name)))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();

        let uploads = self.uploads_dir();
        let mut candidate = format!("{}{}", stem, ext);
        let mut n = 2;
        while uploads.join(&candidate).exists() {
            candidate = format!("{}-{}{}", stem, n, ext);
            n += 1;
        }
        Ok(candidate)
    }
}

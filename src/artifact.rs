//! Synthetic artifact generation for uploads

use rand::distributions::Alphanumeric;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::config::UploadConfig;
use crate::error::{Error, Result};

const TEXT_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";

/// A generated file on disk
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedArtifact {
    pub path: PathBuf,
    /// Target size the content was generated for
    pub target_bytes: usize,
}

/// Writes randomly typed, randomly sized files into a work directory
pub struct ArtifactGenerator {
    dir: PathBuf,
    extensions: Vec<String>,
    min_kb: u64,
    max_kb: u64,
    rng: Mutex<StdRng>,
}

impl ArtifactGenerator {
    pub fn new(config: &UploadConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            dir: config.work_dir(),
            extensions: config.file_extensions.clone(),
            min_kb: config.min_kb,
            max_kb: config.max_kb.max(config.min_kb),
            rng: Mutex::new(rng),
        }
    }

    /// Generate one artifact and write it to disk
    pub async fn generate(&self) -> Result<GeneratedArtifact> {
        let (ext, target_bytes, content) = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| Error::Internal("artifact rng lock poisoned".into()))?;
            let ext = self
                .extensions
                .choose(&mut *rng)
                .cloned()
                .unwrap_or_else(|| ".txt".to_string());
            let target_bytes = rng.gen_range(self.min_kb..=self.max_kb) as usize * 1024;
            let content = render(&ext, target_bytes, &mut *rng)?;
            (ext, target_bytes, content)
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let file_name = format!(
            "data_{}_{}{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4().simple(),
            ext
        );
        let path = self.dir.join(file_name);
        write_artifact(&path, &content).await?;

        info!(
            "Created file: {} | Size: {:.2} KB",
            path.display(),
            target_bytes as f64 / 1024.0
        );

        Ok(GeneratedArtifact { path, target_bytes })
    }
}

fn random_text(len: usize, rng: &mut StdRng) -> String {
    (0..len)
        .map(|_| TEXT_CHARS[rng.gen_range(0..TEXT_CHARS.len())] as char)
        .collect()
}

fn render(ext: &str, size: usize, rng: &mut StdRng) -> Result<Vec<u8>> {
    let content = match ext {
        ".csv" => {
            let mut out = String::from("id,name,score\n");
            let rows: Vec<String> = (0..size / 20)
                .map(|i| format!("{},Name{},{}", i, i, rng.gen_range(0..100)))
                .collect();
            out.push_str(&rows.join("\n"));
            out.into_bytes()
        }
        ".json" => {
            let map: serde_json::Map<String, serde_json::Value> = (0..size / 50)
                .map(|i| {
                    let value: String = (&mut *rng)
                        .sample_iter(&Alphanumeric)
                        .take(8)
                        .map(char::from)
                        .collect();
                    (format!("key{}", i), serde_json::Value::String(value))
                })
                .collect();
            serde_json::to_vec_pretty(&map)?
        }
        ".md" => {
            let mut out = String::from("# Random Markdown\n");
            for i in 0..size / 30 {
                out.push_str(&format!("- Item {}: {}\n", i, random_text(10, rng)));
            }
            out.into_bytes()
        }
        ".bin" => {
            let mut bytes = vec![0u8; size];
            rng.fill_bytes(&mut bytes);
            bytes
        }
        _ => random_text(size, rng).into_bytes(),
    };
    Ok(content)
}

/// Write `content`, removing whatever was left on disk if the write fails
async fn write_artifact(path: &Path, content: &[u8]) -> Result<()> {
    if let Err(e) = tokio::fs::write(path, content).await {
        warn!("Failed to write {}: {}", path.display(), e);
        delete_artifact(path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Remove a generated artifact; failures are logged only
pub async fn delete_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => info!("Temporary file cleaned up: {}", path.display()),
        Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path, ext: &str) -> UploadConfig {
        UploadConfig {
            file_extensions: vec![ext.to_string()],
            min_kb: 1,
            max_kb: 2,
            work_dir: Some(dir.to_path_buf()),
            ..UploadConfig::default()
        }
    }

    #[tokio::test]
    async fn test_generates_named_file_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new(&config(dir.path(), ".txt"), Some(5));

        let artifact = generator.generate().await.unwrap();
        let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("data_"));
        assert!(name.ends_with(".txt"));

        let len = std::fs::metadata(&artifact.path).unwrap().len() as usize;
        assert_eq!(len, artifact.target_bytes);
        assert!((1024..=2048).contains(&len));
    }

    #[tokio::test]
    async fn test_json_artifact_parses() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new(&config(dir.path(), ".json"), Some(5));
        let artifact = generator.generate().await.unwrap();

        let bytes = std::fs::read(&artifact.path).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.as_object().unwrap().contains_key("key0"));
    }

    #[tokio::test]
    async fn test_csv_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new(&config(dir.path(), ".csv"), None);
        let artifact = generator.generate().await.unwrap();
        let text = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(text.starts_with("id,name,score\n0,Name0,"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        // every write to /dev/full fails with ENOSPC after the open succeeds
        let path = dir.path().join("data_full.bin");
        std::os::unix::fs::symlink("/dev/full", &path).unwrap();

        let result = write_artifact(&path, &[7u8; 4096]).await;

        assert!(matches!(result, Err(Error::Io(_))));
        assert!(std::fs::symlink_metadata(&path).is_err());
    }

    #[tokio::test]
    async fn test_delete_artifact_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ArtifactGenerator::new(&config(dir.path(), ".bin"), None);
        let artifact = generator.generate().await.unwrap();

        delete_artifact(&artifact.path).await;
        assert!(!artifact.path.exists());
        // second delete only logs
        delete_artifact(&artifact.path).await;
    }
}

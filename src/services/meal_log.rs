use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::models::{MealLog, MealLogEntry};
use crate::services::media::sanitize_filename;

/// One JSON file per conversation under `data_dir`. Appends for the same
/// conversation are serialized; different conversations proceed in parallel.
pub struct MealLogStore {
    data_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MealLogStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn file_path(&self, conversation_id: &str) -> PathBuf {
        self.data_dir.join(file_name(conversation_id))
    }

    pub async fn append(&self, conversation_id: &str, entry: &MealLogEntry) -> Result<()> {
        // ids that sanitize to the same file share one lock
        let lock = self.lock_for(&file_name(conversation_id));
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("cannot create {}", self.data_dir.display()))?;

        let path = self.file_path(conversation_id);
        let mut meals = read_raw_meals(&path).await;
        meals.push(serde_json::to_value(entry)?);

        let contents = serde_json::to_string_pretty(&json!({ "meals": meals }))?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, contents).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        log::info!("🍽️ Meal logged for {} ({} entries)", conversation_id, meals.len());
        Ok(())
    }

    /// Entries that do not match the current shape are skipped.
    pub async fn load(&self, conversation_id: &str) -> MealLog {
        let meals = read_raw_meals(&self.file_path(conversation_id))
            .await
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        MealLog { meals }
    }

    fn lock_for(&self, file_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(file_name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

fn file_name(conversation_id: &str) -> String {
    format!("{}.json", sanitize_filename(conversation_id))
}

/// Missing or corrupt files read as an empty log.
async fn read_raw_meals(path: &Path) -> Vec<Value> {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return Vec::new();
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut map)) => match map.remove("meals") {
            Some(Value::Array(meals)) => meals,
            _ => Vec::new(),
        },
        _ => {
            log::warn!("⚠️ Meal log {} is unreadable, starting fresh", path.display());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CalorieEstimate;
    use tempfile::tempdir;

    fn entry(caption: &str, ts: i64) -> MealLogEntry {
        MealLogEntry {
            ts,
            caption: caption.to_string(),
            estimate: CalorieEstimate {
                kcal_low: 400.0,
                kcal_high: 550.0,
                protein_g: 20.0,
                carbs_g: 60.0,
                fat_g: 15.0,
                notes: String::new(),
            },
            image_path: "/downloads/plate.jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_creates_file_and_accumulates() {
        let dir = tempdir().unwrap();
        let store = MealLogStore::new(dir.path().join("data"));

        store.append("+90 555@c.us", &entry("toast", 1)).await.unwrap();
        store.append("+90 555@c.us", &entry("pasta", 2)).await.unwrap();

        let path = store.file_path("+90 555@c.us");
        assert_eq!(path.file_name().unwrap(), "_90_555_c.us.json");

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["meals"][1]["caption"], "pasta");
        assert_eq!(raw["meals"][1]["imagePath"], "/downloads/plate.jpeg");

        let log = store.load("+90 555@c.us").await;
        assert_eq!(log.meals, vec![entry("toast", 1), entry("pasta", 2)]);
    }

    #[tokio::test]
    async fn test_corrupt_or_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = MealLogStore::new(dir.path());

        assert!(store.load("nobody").await.meals.is_empty());

        std::fs::write(store.file_path("broken"), "{not json").unwrap();
        assert!(store.load("broken").await.meals.is_empty());

        store.append("broken", &entry("salad", 3)).await.unwrap();
        assert_eq!(store.load("broken").await.meals.len(), 1);

        std::fs::write(store.file_path("wrong-shape"), r#"{"meals": "nope"}"#).unwrap();
        store.append("wrong-shape", &entry("soup", 4)).await.unwrap();
        assert_eq!(store.load("wrong-shape").await.meals.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_entry() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MealLogStore::new(dir.path()));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.append("chat", &entry("meal", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut stamps: Vec<i64> = store.load("chat").await.meals.iter().map(|m| m.ts).collect();
        stamps.sort();
        assert_eq!(stamps, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_ids_sharing_a_file_do_not_race() {
        let dir = tempdir().unwrap();
        let store = Arc::new(MealLogStore::new(dir.path()));
        assert_eq!(store.file_path("+1"), store.file_path("_1"));

        let handles: Vec<_> = (0..60)
            .map(|i| {
                let store = store.clone();
                let id = if i % 2 == 0 { "+1" } else { "_1" };
                tokio::spawn(async move { store.append(id, &entry("meal", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut stamps: Vec<i64> = store.load("+1").await.meals.iter().map(|m| m.ts).collect();
        stamps.sort();
        assert_eq!(stamps, (0..60).collect::<Vec<_>>());
    }
}

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use wb_domain::error::{Error, Result};
use wb_domain::model::{ModelMetrics, RunConfig, RunSummary, StepRecord};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ArchiveStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// File-based persistence for benchmark runs.
///
/// Directory layout per run:
/// ```text
/// <base>/<run_id>/config.json
/// <base>/<run_id>/summary.json
/// <base>/<run_id>/pair_<k>/model_<sanitized>/metrics.json
/// <base>/<run_id>/pair_<k>/model_<sanitized>/path.json
/// <base>/<run_id>/pair_<k>/model_<sanitized>/steps/step_NNN.json
/// <base>/all_runs_metrics.csv
/// ```
/// Every write lands via a temp file + rename in the same directory, so a
/// reader never observes a half-written file — a crash mid-write leaves the
/// previous version intact rather than a torn one.
pub struct ArchiveStore {
    base_path: PathBuf,
}

impl ArchiveStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;
        tracing::info!(base_path = %base_path.display(), "archive store initialized");
        Ok(Self { base_path })
    }

    fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.base_path.join(run_id.to_string())
    }

    fn model_dir(&self, run_id: Uuid, pair_idx: u32, model: &str) -> PathBuf {
        self.run_dir(run_id)
            .join(format!("pair_{pair_idx}"))
            .join(format!("model_{}", sanitize_model_name(model)))
    }

    pub fn save_config(&self, run_id: Uuid, config: &RunConfig) -> Result<()> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join("config.json"), config)
    }

    pub fn save_step(
        &self,
        run_id: Uuid,
        model: &str,
        pair_idx: u32,
        step: &StepRecord,
    ) -> Result<()> {
        let steps_dir = self.model_dir(run_id, pair_idx, model).join("steps");
        fs::create_dir_all(&steps_dir)?;
        let file = steps_dir.join(format!("step_{:03}.json", step.step_index));
        write_json_atomic(&file, step)
    }

    pub fn save_model_metrics(
        &self,
        run_id: Uuid,
        model: &str,
        pair_idx: u32,
        metrics: &ModelMetrics,
    ) -> Result<()> {
        let dir = self.model_dir(run_id, pair_idx, model);
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join("metrics.json"), metrics)?;

        let path_only = serde_json::json!({ "path": metrics.path });
        write_json_atomic(&dir.join("path.json"), &path_only)
    }

    pub fn save_summary(&self, run_id: Uuid, summary: &RunSummary) -> Result<()> {
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join("summary.json"), summary)
    }

    /// Append one row to the whole-archive CSV export. Writes the header
    /// the first time the file is created.
    pub fn append_csv_row(&self, run_id: Uuid, metrics: &ModelMetrics) -> Result<()> {
        let csv_path = self.base_path.join("all_runs_metrics.csv");
        let exists = csv_path.exists();

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&csv_path)?;

        if !exists {
            writeln!(
                file,
                "run_id,timestamp,model,status,reason,total_clicks,total_retries,hallucination_rate,structured_success_rate,path"
            )?;
        }

        writeln!(
            file,
            "{},{},{},{:?},{},{},{},{},{},{}",
            run_id,
            Utc::now().to_rfc3339(),
            csv_escape(&metrics.model),
            metrics.status,
            csv_escape(metrics.reason.as_deref().unwrap_or("")),
            metrics.total_clicks,
            metrics.total_retries,
            metrics.hallucination_rate,
            metrics.structured_success_rate,
            csv_escape(&metrics.path.join(" -> ")),
        )?;
        Ok(())
    }

    /// List every archived run, newest first, sorted by `config.json`'s
    /// filesystem modification time.
    pub fn list_archives(&self) -> Result<Vec<ArchiveListEntry>> {
        let mut entries = Vec::new();
        if !self.base_path.is_dir() {
            return Ok(entries);
        }

        for run_dir in fs::read_dir(&self.base_path)? {
            let run_dir = run_dir?.path();
            if !run_dir.is_dir() {
                continue;
            }
            let config_path = run_dir.join("config.json");
            if !config_path.is_file() {
                continue;
            }
            let Some(run_id) = run_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let config: Value = match read_json(&config_path) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(run_id = %run_id, error = %e, "failed to load archived config, skipping");
                    continue;
                }
            };
            let timestamp = file_timestamp(&config_path)?;
            entries.push(ArchiveListEntry {
                run_id: run_id.to_string(),
                config,
                timestamp,
            });
        }

        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    /// Load every model's metrics and steps for one archived run.
    ///
    /// Supports both the current `pair_<k>/model_<name>` layout and, as a
    /// read-only fallback, the legacy flat `model_<name>` layout for
    /// archives written before the pair directory was introduced.
    pub fn get_archive_details(&self, run_id: Uuid) -> Result<Option<ArchiveDetails>> {
        let run_dir = self.run_dir(run_id);
        if !run_dir.is_dir() {
            return Ok(None);
        }

        let config = read_json_opt(&run_dir.join("config.json"))?;
        let summary = read_json_opt(&run_dir.join("summary.json"))?;

        let mut pairs: std::collections::BTreeMap<u32, PairDetails> = Default::default();
        let pair_dirs = list_prefixed_dirs(&run_dir, "pair_")?;

        if !pair_dirs.is_empty() {
            for pair_dir in pair_dirs {
                let name = pair_dir.file_name().unwrap().to_string_lossy().to_string();
                let Some(idx) = name.strip_prefix("pair_").and_then(|s| s.parse().ok()) else {
                    continue;
                };
                let models = load_models_in(&pair_dir)?;
                pairs.insert(idx, PairDetails { models });
            }
        } else {
            let models = load_models_in(&run_dir)?;
            if !models.is_empty() {
                pairs.insert(0, PairDetails { models });
            }
        }

        if pairs.is_empty() {
            // Oldest legacy layout: a single flat metrics_finales.json + steps/.
            let legacy_metrics = read_json_opt(&run_dir.join("metrics_finales.json"))?;
            let legacy_steps = load_steps_in(&run_dir.join("steps"))?;
            if legacy_metrics.is_some() || !legacy_steps.is_empty() {
                return Ok(Some(ArchiveDetails {
                    config,
                    summary,
                    pairs: Default::default(),
                    legacy_metrics,
                    legacy_steps,
                }));
            }
        }

        Ok(Some(ArchiveDetails {
            config,
            summary,
            pairs,
            legacy_metrics: None,
            legacy_steps: Vec::new(),
        }))
    }
}

fn load_models_in(dir: &Path) -> Result<std::collections::BTreeMap<String, ModelData>> {
    let mut models = std::collections::BTreeMap::new();
    for entry in list_prefixed_dirs(dir, "model_")? {
        let name = entry.file_name().unwrap().to_string_lossy().to_string();
        // Reverse `_sanitize_model_name`'s first separator (`provider/model`
        // collapses to `provider_model`) on a best-effort basis: only the
        // first underscore after the prefix is treated as the provider split.
        let stripped = name.strip_prefix("model_").unwrap_or(&name);
        let model_name = stripped.replacen('_', "/", 1);

        let metrics = read_json_opt(&entry.join("metrics.json"))?;
        let steps = load_steps_in(&entry.join("steps"))?;
        models.insert(model_name, ModelData { metrics, steps });
    }
    Ok(models)
}

fn load_steps_in(steps_dir: &Path) -> Result<Vec<Value>> {
    if !steps_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(steps_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    files.iter().map(|p| read_json(p)).collect()
}

fn list_prefixed_dirs(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(prefix))
                    .unwrap_or(false)
        })
        .collect();
    dirs.sort();
    Ok(dirs)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Read results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveListEntry {
    pub run_id: String,
    pub config: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelData {
    pub metrics: Option<Value>,
    pub steps: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairDetails {
    pub models: std::collections::BTreeMap<String, ModelData>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveDetails {
    pub config: Option<Value>,
    pub summary: Option<Value>,
    pub pairs: std::collections::BTreeMap<u32, PairDetails>,
    pub legacy_metrics: Option<Value>,
    pub legacy_steps: Vec<Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn sanitize_model_name(model: &str) -> String {
    model.replace('/', "_").replace(':', "_").replace('\\', "_")
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().ok_or_else(|| Error::Archive("path has no parent".into()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| Error::Archive(format!("failed to persist {}: {}", path.display(), e)))?;
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn read_json_opt(path: &Path) -> Result<Option<Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    Ok(Some(read_json(path)?))
}

fn file_timestamp(path: &Path) -> Result<DateTime<Utc>> {
    let meta = fs::metadata(path)?;
    let modified = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    Ok(DateTime::<Utc>::from(modified))
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wb_domain::model::{ModelRunStatus, ParsingMethod};

    fn sample_config() -> RunConfig {
        RunConfig {
            models: vec!["openai/gpt-4o-mini".into()],
            start_page: "Rust (programming language)".into(),
            target_page: "Mozilla".into(),
            max_steps: 20,
            max_loops: 3,
            max_hallucination_retries: 3,
            api_key: None,
            use_structured_output: true,
        }
    }

    fn sample_step() -> StepRecord {
        let mut mapping = std::collections::HashMap::new();
        mapping.insert("CONCEPT_00".to_string(), "Mozilla".to_string());
        StepRecord {
            step_index: 0,
            page_title: "Rust (programming language)".into(),
            prompt: "system: ...\n\nuser: ...".into(),
            raw_response: "I'll click Mozilla. NEXT_CLICK: CONCEPT_00".into(),
            mapping,
            llm_duration: 1.2,
            timestamp: Utc::now(),
            intuition: Some("seems related".into()),
            next_concept_id: Some("CONCEPT_00".into()),
            next_page_title: Some("Mozilla".into()),
            confidence: 0.8,
            is_retry: false,
            is_hallucination: false,
            is_404: false,
            is_final_target: false,
            parsing_method: ParsingMethod::Structured,
            structured_parsing_success: true,
            error: None,
        }
    }

    fn sample_metrics() -> ModelMetrics {
        ModelMetrics {
            model: "openai/gpt-4o-mini".into(),
            status: ModelRunStatus::Success,
            reason: None,
            total_clicks: 1,
            total_retries: 0,
            hallucination_count: 0,
            hallucination_rate: 0.0,
            structured_parsing_success_count: 1,
            structured_success_rate: 1.0,
            total_duration: 2.5,
            avg_llm_duration: 1.2,
            path: vec!["Rust (programming language)".into(), "Mozilla".into()],
        }
    }

    #[test]
    fn save_and_list_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path()).unwrap();
        let run_id = Uuid::new_v4();

        store.save_config(run_id, &sample_config()).unwrap();
        let archives = store.list_archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].run_id, run_id.to_string());
    }

    #[test]
    fn model_directory_name_is_sanitized() {
        assert_eq!(sanitize_model_name("openai/gpt-4o-mini"), "openai_gpt-4o-mini");
        assert_eq!(sanitize_model_name("a:b\\c"), "a_b_c");
    }

    #[test]
    fn save_step_and_metrics_roundtrip_via_details() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path()).unwrap();
        let run_id = Uuid::new_v4();

        store.save_config(run_id, &sample_config()).unwrap();
        store.save_step(run_id, "openai/gpt-4o-mini", 0, &sample_step()).unwrap();
        store
            .save_model_metrics(run_id, "openai/gpt-4o-mini", 0, &sample_metrics())
            .unwrap();

        let details = store.get_archive_details(run_id).unwrap().unwrap();
        assert!(details.config.is_some());
        let pair0 = details.pairs.get(&0).unwrap();
        let model = pair0.models.get("openai/gpt-4o-mini").unwrap();
        assert!(model.metrics.is_some());
        assert_eq!(model.steps.len(), 1);
    }

    #[test]
    fn legacy_flat_layout_is_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let run_path = dir.path().join(run_id.to_string());
        fs::create_dir_all(run_path.join("steps")).unwrap();
        fs::write(
            run_path.join("metrics_finales.json"),
            serde_json::to_vec(&sample_metrics()).unwrap(),
        )
        .unwrap();
        fs::write(
            run_path.join("steps/step_000.json"),
            serde_json::to_vec(&sample_step()).unwrap(),
        )
        .unwrap();

        let store = ArchiveStore::new(dir.path()).unwrap();
        let details = store.get_archive_details(run_id).unwrap().unwrap();
        assert!(details.legacy_metrics.is_some());
        assert_eq!(details.legacy_steps.len(), 1);
    }

    #[test]
    fn missing_run_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path()).unwrap();
        assert!(store.get_archive_details(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn csv_row_is_appended_with_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArchiveStore::new(dir.path()).unwrap();
        let run_id = Uuid::new_v4();
        store.append_csv_row(run_id, &sample_metrics()).unwrap();
        store.append_csv_row(run_id, &sample_metrics()).unwrap();

        let contents = fs::read_to_string(dir.path().join("all_runs_metrics.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("run_id,timestamp"));
    }
}

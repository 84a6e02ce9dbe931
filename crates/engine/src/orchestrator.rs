use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use uuid::Uuid;

use wb_archive::ArchiveStore;
use wb_domain::config::LlmConfig;
use wb_domain::error::Error;
use wb_domain::event::RunEvent;
use wb_domain::model::{
    ModelMetrics, ModelRunStatus, ParsingMethod, RunConfig, RunSummary, StepRecord, WikiPage,
};
use wb_llm::LlmClient;
use wb_wiki::WikiSource;

use crate::event_bus::EventBus;
use crate::registry::CancelToken;

const FIRST_MODEL_DELAY: Duration = Duration::from_millis(300);
const MODEL_START_DELAY: Duration = Duration::from_millis(100);

/// Drives a whole benchmark run: one model at a time, sequentially, against
/// the same start/target pair. Each model's navigation is independent — a
/// single model's wiki or LLM failure ends that model's run, not the whole
/// benchmark.
pub struct Orchestrator {
    wiki: Arc<WikiSource>,
    default_llm: Arc<LlmClient>,
    llm_config: LlmConfig,
    archive: Arc<ArchiveStore>,
    events: EventBus,
    history_size: usize,
}

impl Orchestrator {
    pub fn new(
        wiki: Arc<WikiSource>,
        default_llm: Arc<LlmClient>,
        llm_config: LlmConfig,
        archive: Arc<ArchiveStore>,
        events: EventBus,
        history_size: usize,
    ) -> Self {
        Self {
            wiki,
            default_llm,
            llm_config,
            archive,
            events,
            history_size,
        }
    }

    /// A run with its own `api_key` gets a dedicated client; otherwise the
    /// shared, process-wide client (built from the server's own key) is reused.
    fn llm_for(&self, config: &RunConfig) -> std::result::Result<Arc<LlmClient>, Error> {
        match &config.api_key {
            Some(key) => {
                let mut cfg = self.llm_config.clone();
                cfg.api_key = Some(key.clone());
                Ok(Arc::new(LlmClient::from_config(&cfg)?))
            }
            None => Ok(self.default_llm.clone()),
        }
    }

    pub async fn run(&self, run_id: Uuid, config: RunConfig, cancel: CancelToken) {
        let llm = match self.llm_for(&config) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "failed to build LLM client for run");
                self.events.emit(RunEvent::Error {
                    run_id,
                    message: e.to_string(),
                });
                return;
            }
        };

        if let Err(e) = self.archive.save_config(run_id, &config) {
            tracing::error!(run_id = %run_id, error = %e, "failed to save run config");
            self.events.emit(RunEvent::Error {
                run_id,
                message: e.to_string(),
            });
            return;
        }

        self.events.emit(RunEvent::RunStart {
            run_id,
            start_page: config.start_page.clone(),
            target_page: config.target_page.clone(),
            models: config.models.clone(),
        });

        let mut metrics_list = Vec::with_capacity(config.models.len());
        let mut completed = 0u32;
        let mut failed = 0u32;
        let mut stopped = 0u32;
        let mut run_was_stopped = false;

        for (model_idx, model) in config.models.iter().enumerate() {
            if cancel.is_cancelled() {
                run_was_stopped = true;
                self.events.emit(RunEvent::RunStopped { run_id });
                break;
            }

            if model_idx == 0 {
                tokio::time::sleep(FIRST_MODEL_DELAY).await;
            }

            self.events.emit(RunEvent::ModelStart {
                run_id,
                model: model.clone(),
            });
            tokio::time::sleep(MODEL_START_DELAY).await;

            let metrics = self
                .run_model(run_id, &config, model, model_idx as u32, &cancel, &llm)
                .await;

            match metrics.status {
                ModelRunStatus::Success => completed += 1,
                ModelRunStatus::Failed => failed += 1,
                ModelRunStatus::Stopped => stopped += 1,
            }

            self.events.emit(RunEvent::ModelComplete {
                run_id,
                model: model.clone(),
                metrics: Box::new(metrics.clone()),
            });
            self.events.emit(RunEvent::ModelFinal {
                run_id,
                model: model.clone(),
                metrics: Box::new(metrics.clone()),
            });

            if let Err(e) = self.archive.append_csv_row(run_id, &metrics) {
                tracing::warn!(run_id = %run_id, error = %e, "failed to append csv summary row");
            }

            metrics_list.push(metrics);
        }

        let summary = RunSummary {
            run_id,
            start_page: config.start_page.clone(),
            target_page: config.target_page.clone(),
            total_models: config.models.len() as u32,
            completed,
            failed,
            stopped,
            models: metrics_list,
            error: None,
        };

        if let Err(e) = self.archive.save_summary(run_id, &summary) {
            tracing::error!(run_id = %run_id, error = %e, "failed to save run summary");
            self.events.emit(RunEvent::Error {
                run_id,
                message: e.to_string(),
            });
            return;
        }

        if !run_was_stopped {
            self.events.emit(RunEvent::RunCompleted { run_id });
        }
    }

    async fn run_model(
        &self,
        run_id: Uuid,
        config: &RunConfig,
        model: &str,
        pair_idx: u32,
        cancel: &CancelToken,
        llm: &LlmClient,
    ) -> ModelMetrics {
        let mut history: VecDeque<WikiPage> = VecDeque::with_capacity(self.history_size);
        let mut excluded_links: HashMap<String, Vec<String>> = HashMap::new();
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut current_page_title = config.start_page.clone();
        let mut consecutive_hallucinations = 0u32;
        let mut total_retries = 0u32;

        let model_start = Instant::now();
        let mut llm_duration_total = 0.0f64;
        let mut llm_call_count = 0u32;

        let mut status: Option<ModelRunStatus> = None;
        let mut reason: Option<String> = None;

        for step_idx in 0..config.max_steps {
            if cancel.is_cancelled() {
                status = Some(ModelRunStatus::Stopped);
                reason = Some("Benchmark stopped by user".to_string());
                self.events.emit(RunEvent::ModelStopped {
                    run_id,
                    model: model.to_string(),
                });
                break;
            }

            let page = match self.wiki.fetch_page(&current_page_title).await {
                Ok(page) => page,
                Err(Error::PageNotFound(title)) => {
                    tracing::warn!(model = %model, title = %title, "404 encountered, backtracking");

                    let step = StepRecord {
                        step_index: step_idx,
                        page_title: title.clone(),
                        prompt: String::new(),
                        raw_response: String::new(),
                        mapping: HashMap::new(),
                        llm_duration: 0.0,
                        timestamp: Utc::now(),
                        intuition: None,
                        next_concept_id: None,
                        next_page_title: None,
                        confidence: 0.0,
                        is_retry: false,
                        is_hallucination: false,
                        is_404: true,
                        is_final_target: false,
                        parsing_method: ParsingMethod::None,
                        structured_parsing_success: false,
                        error: Some(format!("page not found: {title}")),
                    };
                    self.save_and_emit_step(run_id, model, pair_idx, step.clone(), &mut steps);

                    match history.back() {
                        Some(previous_page) => {
                            let previous_title = previous_page.title.clone();
                            // Find the most recent non-404 step that actually clicked into this title.
                            let bad_concept_id = steps[..steps.len() - 1]
                                .iter()
                                .rev()
                                .find(|s| s.next_concept_id.is_some())
                                .filter(|s| s.next_page_title.as_deref() == Some(title.as_str()))
                                .and_then(|s| s.next_concept_id.clone());

                            if let Some(bad_concept_id) = bad_concept_id {
                                excluded_links
                                    .entry(previous_title.clone())
                                    .or_default()
                                    .push(bad_concept_id);
                            }

                            current_page_title = previous_title;
                            continue;
                        }
                        None => {
                            status = Some(ModelRunStatus::Failed);
                            reason = Some(format!("Start page not found: {title}"));
                            break;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(model = %model, error = %e, "wiki fetch failed");
                    status = Some(ModelRunStatus::Failed);
                    reason = Some(format!("Wiki fetch failed: {e}"));
                    break;
                }
            };

            history.push_back(page.clone());
            if history.len() > self.history_size {
                history.pop_front();
            }

            if current_page_title.eq_ignore_ascii_case(&config.target_page) {
                status = Some(ModelRunStatus::Success);
                reason = Some("Target reached".to_string());
                break;
            }

            let mut page = page;
            if let Some(excluded) = excluded_links.get(&page.title) {
                page.mapping.retain(|concept_id, _| !excluded.contains(concept_id));
            }

            let history_titles: Vec<String> = history.iter().map(|p| p.title.clone()).collect();
            let call_start = Instant::now();
            let response = match llm
                .chat_structured(model, &config.target_page, &page, &history_titles)
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::error!(model = %model, error = %e, "llm call failed");
                    status = Some(ModelRunStatus::Failed);
                    reason = Some(format!("LLM call failed: {e}"));
                    break;
                }
            };
            let llm_duration = call_start.elapsed().as_secs_f64();
            llm_duration_total += llm_duration;
            llm_call_count += 1;

            let is_hallucination = match &response.chosen_concept_id {
                Some(id) => !page.mapping.contains_key(id),
                None => true,
            };

            let step = StepRecord {
                step_index: step_idx,
                page_title: current_page_title.clone(),
                prompt: response.prompt.clone(),
                raw_response: response.raw_content.clone(),
                mapping: page.mapping.clone(),
                llm_duration,
                timestamp: Utc::now(),
                intuition: response.intuition.clone(),
                next_concept_id: response.chosen_concept_id.clone(),
                next_page_title: if is_hallucination {
                    None
                } else {
                    response
                        .chosen_concept_id
                        .as_ref()
                        .and_then(|id| page.mapping.get(id).cloned())
                },
                confidence: response.confidence,
                is_retry: is_hallucination,
                is_hallucination,
                is_404: false,
                is_final_target: false,
                parsing_method: response.parsing_method,
                structured_parsing_success: response.structured_success(),
                error: None,
            };

            if is_hallucination {
                consecutive_hallucinations += 1;
                total_retries += 1;

                self.events.emit(RunEvent::Hallucination {
                    run_id,
                    model: model.to_string(),
                    page_title: current_page_title.clone(),
                    retry: consecutive_hallucinations,
                });
                self.save_and_emit_step(run_id, model, pair_idx, step, &mut steps);

                if consecutive_hallucinations >= config.max_hallucination_retries {
                    status = Some(ModelRunStatus::Failed);
                    reason = Some(format!(
                        "Max hallucination retries reached ({}). Invalid concept ID: {:?}",
                        config.max_hallucination_retries, response.chosen_concept_id
                    ));
                    break;
                }

                continue;
            }

            consecutive_hallucinations = 0;
            current_page_title = step.next_page_title.clone().unwrap_or_default();
            self.save_and_emit_step(run_id, model, pair_idx, step, &mut steps);

            let loop_count = history
                .iter()
                .filter(|p| p.title.eq_ignore_ascii_case(&current_page_title))
                .count() as u32;
            if loop_count >= config.max_loops {
                status = Some(ModelRunStatus::Failed);
                reason = Some(format!(
                    "Loop detected: {current_page_title} visited {loop_count} times"
                ));
                break;
            }
        }

        let status = status.unwrap_or_else(|| {
            reason.get_or_insert_with(|| "Max steps reached".to_string());
            ModelRunStatus::Failed
        });

        if status == ModelRunStatus::Success {
            let final_step = StepRecord {
                step_index: steps.len() as u32,
                page_title: current_page_title.clone(),
                prompt: String::new(),
                raw_response: String::new(),
                mapping: HashMap::new(),
                llm_duration: 0.0,
                timestamp: Utc::now(),
                intuition: None,
                next_concept_id: None,
                next_page_title: None,
                confidence: 0.0,
                is_retry: false,
                is_hallucination: false,
                is_404: false,
                is_final_target: true,
                parsing_method: ParsingMethod::None,
                structured_parsing_success: false,
                error: None,
            };
            if let Err(e) = self.archive.save_step(run_id, model, pair_idx, &final_step) {
                tracing::warn!(run_id = %run_id, error = %e, "failed to save final step");
            }
            steps.push(final_step);
        }

        let total_clicks = steps.len().saturating_sub(1) as u32;
        let hallucination_count = steps.iter().filter(|s| s.is_hallucination).count() as u32;
        let structured_count = steps
            .iter()
            .filter(|s| s.parsing_method == ParsingMethod::Structured)
            .count() as u32;
        let denom = steps.len().max(1) as f64;

        let metrics = ModelMetrics {
            model: model.to_string(),
            status,
            reason,
            total_clicks,
            total_retries,
            hallucination_count,
            hallucination_rate: hallucination_count as f64 / denom,
            structured_parsing_success_count: structured_count,
            structured_success_rate: structured_count as f64 / denom,
            total_duration: model_start.elapsed().as_secs_f64(),
            avg_llm_duration: if llm_call_count > 0 {
                llm_duration_total / llm_call_count as f64
            } else {
                0.0
            },
            path: steps.iter().map(|s| s.page_title.clone()).collect(),
        };

        if let Err(e) = self.archive.save_model_metrics(run_id, model, pair_idx, &metrics) {
            tracing::warn!(run_id = %run_id, error = %e, "failed to save model metrics");
        }

        metrics
    }

    fn save_and_emit_step(
        &self,
        run_id: Uuid,
        model: &str,
        pair_idx: u32,
        step: StepRecord,
        steps: &mut Vec<StepRecord>,
    ) {
        if let Err(e) = self.archive.save_step(run_id, model, pair_idx, &step) {
            tracing::warn!(run_id = %run_id, error = %e, "failed to save step");
        }
        self.events.emit(RunEvent::Step {
            run_id,
            model: model.to_string(),
            step: Box::new(step.clone()),
        });
        steps.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(title: &str, mapping: &[(&str, &str)]) -> WikiPage {
        let mut m = HashMap::new();
        for (k, v) in mapping {
            m.insert(k.to_string(), v.to_string());
        }
        WikiPage {
            title: title.to_string(),
            extract: format!("extract for {title}"),
            links: mapping.iter().map(|(_, v)| v.to_string()).collect(),
            mapping: m,
        }
    }

    fn blank_step(step_index: u32, page_title: &str) -> StepRecord {
        StepRecord {
            step_index,
            page_title: page_title.to_string(),
            prompt: String::new(),
            raw_response: String::new(),
            mapping: HashMap::new(),
            llm_duration: 0.0,
            timestamp: Utc::now(),
            intuition: None,
            next_concept_id: None,
            next_page_title: None,
            confidence: 0.0,
            is_retry: false,
            is_hallucination: false,
            is_404: false,
            is_final_target: false,
            parsing_method: ParsingMethod::None,
            structured_parsing_success: false,
            error: None,
        }
    }

    #[test]
    fn total_clicks_counts_transitions_not_entries() {
        let steps = vec![
            StepRecord {
                next_concept_id: Some("CONCEPT_00".into()),
                next_page_title: Some("B".into()),
                confidence: 0.5,
                parsing_method: ParsingMethod::Structured,
                ..blank_step(0, "A")
            },
            StepRecord {
                is_final_target: true,
                ..blank_step(1, "B")
            },
        ];
        assert_eq!(steps.len().saturating_sub(1), 1);
    }

    #[test]
    fn sample_page_mapping_filters_by_excluded_ids() {
        let mut p = page("A", &[("CONCEPT_00", "B"), ("CONCEPT_01", "C")]);
        let excluded = vec!["CONCEPT_00".to_string()];
        p.mapping.retain(|id, _| !excluded.contains(id));
        assert_eq!(p.mapping.len(), 1);
        assert!(p.mapping.contains_key("CONCEPT_01"));
    }
}

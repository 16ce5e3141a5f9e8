use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use anyhow::{Result, bail};
use regex::Regex;
use serde_json::Value;

use crate::config::Settings;
use crate::cowork::planner::{PlannedTask, Planner};
use crate::cowork::queue::{TaskQueue, TaskStatus};
use crate::cowork::runner::{ParallelRunner, RunnerTask};
use crate::cowork::workers::direct::DirectWorker;
use crate::cowork::workers::office::OfficeWorker;
use crate::cowork::workers::reasoner::ReasonerWorker;
use crate::cowork::workers::research::ResearchWorker;
use crate::cowork::workers::tool::ToolWorker;
use crate::cowork::workers::writer::WriterWorker;
use crate::cowork::workers::{Worker, WorkerContext};
use crate::cowork::workspace::WorkspaceContext;
use crate::format::ResultFormatter;
use crate::llm::client::HttpLlmClient;
use crate::llm::gateway::{LlmGateway, ModelGateway, ModelRole};
use crate::llm::build_http_client;
use crate::office::MarkdownOffice;
use crate::rag::{KeywordStore, Retriever};
use crate::routing::Router;
use crate::routing::decompose::{decompose, has_comparison, has_coordinator};
use crate::routing::pipeline::{Pipeline, build_pipeline};
use crate::tools::dispatch::ToolDispatcher;
use crate::tools::executor::{ToolExecutor, truncate_chars};
use crate::translation::TranslationPipeline;
use crate::types::{AgentKind, Route, RouteDecision};
use crate::ui::dashboard::{Dashboard, TaskView};

pub const REPORT_PATH: &str = "docs/cowork_result.md";

const DIRECT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const MAX_ERROR_CHARS: usize = 300;

static FILE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@\[(.*?)\]").expect("file-ref regex"));

/// Tool keywords that keep a hybrid RAG+tool request on the tool path.
const TOOL_CONTEXT_KEYWORDS: &[&str] = &[
    "날씨", "weather", "검색", "search", "뉴스", "news", "시간", "time",
];

/// Goals that should go straight to the multi-task Cowork flow.
const OFFICE_GOAL_KEYWORDS: &[&str] = &[
    "ppt", "powerpoint", "presentation", "슬라이드", "프레젠테이션", "excel", "spreadsheet",
    "엑셀", "create_ppt", "create_word", "create_excel",
];

const SUMMARY_KEYWORDS: &[&str] = &["요약", "정리", "summarize", "read", "읽고"];

struct WorkerSet {
    direct: DirectWorker,
    reasoner: ReasonerWorker,
    tool: ToolWorker,
    research: ResearchWorker,
    writer: WriterWorker,
    office: OfficeWorker,
}

impl WorkerSet {
    async fn run(&self, agent: AgentKind, description: &str, ctx: &WorkerContext) -> Result<String> {
        match agent {
            AgentKind::Direct => self.direct.execute(description, ctx).await,
            AgentKind::Reasoner => self.reasoner.execute(description, ctx).await,
            AgentKind::Tool => self.tool.execute(description, ctx).await,
            AgentKind::Research => self.research.execute(description, ctx).await,
            AgentKind::Writer => self.writer.execute(description, ctx).await,
            AgentKind::Office => self.office.execute(description, ctx).await,
        }
    }
}

/// Top-level engine: routing, decomposition, planning, execution, and the
/// final integration pass, wrapped in bidirectional translation.
pub struct Orchestrator {
    gateway: Arc<dyn LlmGateway>,
    router: Router,
    dispatcher: Arc<ToolDispatcher>,
    formatter: ResultFormatter,
    translation: TranslationPipeline,
    retriever: Arc<dyn Retriever>,
    workspace: Arc<WorkspaceContext>,
    dashboard: Arc<dyn Dashboard>,
    runner: ParallelRunner,
    planner: Planner,
    workers: Arc<WorkerSet>,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(settings: &Settings, dashboard: Arc<dyn Dashboard>) -> Result<Self> {
        let http = build_http_client()?;

        let brain = HttpLlmClient::new(
            http.clone(),
            settings.brain_url.clone(),
            settings.brain_model.clone(),
        );
        let reasoner = HttpLlmClient::new(
            http.clone(),
            settings.reasoner_url.clone(),
            settings.reasoner_model.clone(),
        );
        let gateway: Arc<dyn LlmGateway> =
            Arc::new(ModelGateway::new(Box::new(brain), Box::new(reasoner)));

        let executor = Arc::new(ToolExecutor::new(http.clone()));
        let dispatcher = Arc::new(ToolDispatcher::new(executor, gateway.clone()));
        let workspace = Arc::new(WorkspaceContext::new(settings.workspace.clone())?);
        let retriever: Arc<dyn Retriever> = Arc::new(KeywordStore::new());
        let office_backend = Arc::new(MarkdownOffice::new(workspace.clone()));

        let workers = Arc::new(WorkerSet {
            direct: DirectWorker::new(gateway.clone()),
            reasoner: ReasonerWorker::new(gateway.clone()),
            tool: ToolWorker::new(dispatcher.clone()),
            research: ResearchWorker::new(retriever.clone(), workspace.root().to_path_buf()),
            writer: WriterWorker::new(gateway.clone(), workspace.clone()),
            office: OfficeWorker::new(gateway.clone(), office_backend),
        });

        Ok(Self {
            router: Router::new(gateway.clone()),
            formatter: ResultFormatter::new(gateway.clone()),
            translation: TranslationPipeline::new(http, settings.translation_enabled),
            dispatcher,
            retriever,
            workspace,
            dashboard,
            runner: ParallelRunner::new(settings.max_workers),
            planner: Planner::new(gateway.clone()),
            workers,
            gateway,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Host-supplied cancellation: flips the flag and the call aborts at its
    /// next suspension point.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            bail!("cancelled");
        }
        Ok(())
    }

    /// Single entry point: picks the chat or Cowork flow for the goal and
    /// always answers in the user's language.
    pub async fn run(&self, goal: &str) -> Result<String> {
        let lower = goal.to_lowercase();
        let has_file_ref = FILE_REF.is_match(goal);
        let needs_tool = TOOL_CONTEXT_KEYWORDS.iter().any(|k| lower.contains(k));

        // Hybrid RAG+tool requests and document-producing goals take the
        // multi-task plan path with its auto-saved report.
        if (has_file_ref && needs_tool) || OFFICE_GOAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            return self.run_cowork(goal).await;
        }
        self.chat(goal).await
    }

    // ── Chat flow ─────────────────────────────────────────────────────────────

    pub async fn chat(&self, user_input: &str) -> Result<String> {
        let (clean_input, rag_context) = self.resolve_file_refs(user_input).await;
        self.ensure_active()?;

        let tctx = self.translation.to_english(&clean_input).await;
        let english = tctx.english_text.clone();
        tracing::info!(lang = %tctx.original_lang, "chat request");

        // Attached-document context without a tool keyword answers directly
        // from the material.
        if !rag_context.is_empty() {
            let prompt = format!(
                "{english}\n\n--- Reference Material ---\n{rag_context}\n--------------------------\n\
                 (Answer strictly based on the Reference Material above if relevant.)"
            );
            self.ensure_active()?;
            let reply = self
                .gateway
                .complete(ModelRole::Brain, DIRECT_SYSTEM_PROMPT, &prompt, 1536)
                .await?;
            return Ok(self.translation.from_english(&reply, &tctx).await);
        }

        let pipeline = build_pipeline(&self.router, &english).await;
        if pipeline.is_multi_step() {
            if pipeline.rag_variant {
                tracing::debug!("document-flavored compound pattern matched");
            }
            let reply = self.execute_pipeline(&english, &pipeline).await?;
            return Ok(self.translation.from_english(&reply, &tctx).await);
        }

        let decision = pipeline.steps[0].decision.clone();
        tracing::info!(
            route = decision.kind.as_str(),
            detail = decision.description.as_deref().unwrap_or(""),
            "routing decision"
        );

        // Compound inputs: explicit comparisons, or coordinated entities on a
        // tool route, fan out through the decomposer.
        let compound = has_comparison(&english)
            || (decision.kind == Route::Tool && has_coordinator(&english));
        if compound {
            let sub_queries = decompose(&english);
            if sub_queries.len() > 1 {
                let reply = self.execute_decomposition(&english, sub_queries).await?;
                return Ok(self.translation.from_english(&reply, &tctx).await);
            }
        }

        let reply = self.execute_route(&english, &decision).await?;
        Ok(self.translation.from_english(&reply, &tctx).await)
    }

    async fn execute_route(&self, english: &str, decision: &RouteDecision) -> Result<String> {
        self.ensure_active()?;
        match decision.kind {
            Route::Tool => {
                let hint = decision.tool_hint.as_deref().unwrap_or("search_web");
                let outcome = self
                    .dispatcher
                    .dispatch(english, hint, decision.arg_hint.as_deref())
                    .await;
                tracing::info!(tool = outcome.tool(), success = outcome.succeeded(), "tool outcome");
                if outcome.succeeded() {
                    Ok(self
                        .formatter
                        .integrate(english, &outcome.to_value().to_string())
                        .await)
                } else {
                    let error = truncate_chars(outcome.error().unwrap_or("Unknown error"), MAX_ERROR_CHARS);
                    Ok(format!("Sorry, the tool call failed.\nError: {error}"))
                }
            }
            Route::Reasoner => {
                let prompt = decision.arg_hint.as_deref().unwrap_or(english);
                self.workers.reasoner.solve(prompt).await
            }
            Route::Direct => {
                self.gateway
                    .complete(ModelRole::Brain, DIRECT_SYSTEM_PROMPT, english, 1536)
                    .await
            }
        }
    }

    /// Runs a multi-step pipeline, threading each step's raw output into the
    /// step that references it.
    async fn execute_pipeline(&self, english: &str, pipeline: &Pipeline) -> Result<String> {
        tracing::info!(steps = pipeline.steps.len(), "executing pipeline");
        let mut step_results: Vec<String> = Vec::with_capacity(pipeline.steps.len());

        for step in &pipeline.steps {
            self.ensure_active()?;
            tracing::info!(step = step.index, detail = %step.description, "pipeline step");
            let result = match step.decision.kind {
                Route::Tool => {
                    let hint = step.decision.tool_hint.as_deref().unwrap_or("search_web");
                    let outcome = self
                        .dispatcher
                        .dispatch(english, hint, step.decision.arg_hint.as_deref())
                        .await;
                    outcome.to_value().to_string()
                }
                Route::Direct => {
                    let context = step
                        .context_from_step
                        .and_then(|i| step_results.get(i.saturating_sub(1)))
                        .or_else(|| step_results.last())
                        .cloned()
                        .unwrap_or_default();
                    self.formatter.integrate(english, &context).await
                }
                Route::Reasoner => {
                    let prompt = step.decision.arg_hint.as_deref().unwrap_or(english);
                    self.workers.reasoner.solve(prompt).await?
                }
            };
            step_results.push(result);
        }

        Ok(step_results.pop().unwrap_or_default())
    }

    /// Decomposition aggregate: entity lookups run in parallel through the
    /// tool worker; a trailing compare step runs sequentially over their
    /// results. Pair order always matches decomposition order.
    async fn execute_decomposition(&self, english: &str, sub_queries: Vec<String>) -> Result<String> {
        let (entities, compare): (Vec<String>, Vec<String>) = sub_queries
            .into_iter()
            .partition(|q| q != "Compare results");
        tracing::info!(count = entities.len(), compare = !compare.is_empty(), "decomposed query");
        self.dashboard
            .add_log(&format!("Decomposed into {} sub-queries.", entities.len()), "Planner");

        let tasks: Vec<RunnerTask> = entities
            .iter()
            .enumerate()
            .map(|(i, q)| RunnerTask {
                id: format!("sub-{i}"),
                description: q.clone(),
                agent: AgentKind::Tool,
            })
            .collect();

        let workers = self.workers.clone();
        let reports = self
            .runner
            .run_tasks(tasks, move |task| {
                let workers = workers.clone();
                async move {
                    workers
                        .run(AgentKind::Tool, &task.description, &WorkerContext::default())
                        .await
                }
            })
            .await;
        self.ensure_active()?;

        let mut pairs: Vec<(String, String)> = Vec::with_capacity(entities.len());
        for (i, entity) in entities.iter().enumerate() {
            let id = format!("sub-{i}");
            let result = reports
                .get(&id)
                .map(|r| {
                    if r.success {
                        r.result.clone().unwrap_or_default()
                    } else {
                        format!("(failed: {})", r.error.clone().unwrap_or_default())
                    }
                })
                .unwrap_or_else(|| "(failed: no result)".to_string());
            self.log_tool_result(&result);
            pairs.push((entity.clone(), result));
        }

        if compare.is_empty() {
            // Plain coordinated lookups render deterministically.
            let aggregate = pairs
                .iter()
                .map(|(q, r)| format!("[TASK: {q}]\nDATA: {r}"))
                .collect::<Vec<_>>()
                .join("\n\n");
            return Ok(self.formatter.integrate(english, &aggregate).await);
        }

        // Comparison synthesis is model work over the collected results.
        let history = pairs
            .iter()
            .map(|(q, r)| format!("Query: {q}\nResult: {}", truncate_chars(r, 500)))
            .collect::<Vec<_>>()
            .join("\n\n");
        self.ensure_active()?;
        let compare_output = self
            .workers
            .direct
            .execute(
                "Compare the findings above and summarize the differences.",
                &WorkerContext {
                    history,
                    user_goal: english.to_string(),
                },
            )
            .await?;
        pairs.push(("Compare results".to_string(), compare_output));

        Ok(self.formatter.integrate_pairs(english, &pairs).await)
    }

    // ── Cowork flow ───────────────────────────────────────────────────────────

    /// Multi-task plan mode: plan, run the independent phase in parallel and
    /// the dependent phase sequentially, integrate, translate, auto-save.
    pub async fn run_cowork(&self, user_goal: &str) -> Result<String> {
        tracing::info!(goal = %user_goal, "cowork session started");
        self.dashboard.add_log("System initialized.", "System");

        let (clean_goal, rag_context) = self.resolve_file_refs(user_goal).await;
        self.ensure_active()?;
        let tctx = self.translation.to_english(&clean_goal).await;
        let english = tctx.english_text.clone();

        let lower = format!("{} {}", tctx.original_text.to_lowercase(), english.to_lowercase());
        let needs_tool = TOOL_CONTEXT_KEYWORDS.iter().any(|k| lower.contains(k));
        let is_hybrid = !rag_context.is_empty() && needs_tool;

        let plan = self
            .build_cowork_plan(&english, &lower, &rag_context, needs_tool)
            .await;
        self.dashboard
            .add_log(&format!("Plan created with {} tasks.", plan.len()), "Planner");

        let mut queue = TaskQueue::new();
        for task in &plan {
            queue.add_task(task.description.clone(), task.agent);
        }
        self.publish_tasks(&queue);

        let mut results: Vec<String> = Vec::new();
        if !rag_context.is_empty() {
            results.push(format!(
                "[CONTEXT FROM UPLOADED FILES]\n{rag_context}\n[END OF CONTEXT]"
            ));
        }

        let first_ids: Vec<String>;
        let second_ids: Vec<String>;
        {
            let independent: Vec<String> = queue
                .all()
                .iter()
                .filter(|t| t.agent.is_independent())
                .map(|t| t.id.clone())
                .collect();
            let dependent: Vec<String> = queue
                .all()
                .iter()
                .filter(|t| !t.agent.is_independent())
                .map(|t| t.id.clone())
                .collect();
            // Hybrid requests summarize first so the tool phase can use it.
            if is_hybrid {
                first_ids = dependent;
                second_ids = independent;
            } else {
                first_ids = independent;
                second_ids = dependent;
            }
        }

        self.run_phase(&mut queue, &first_ids, &english, &mut results).await?;
        self.run_phase(&mut queue, &second_ids, &english, &mut results).await?;

        // Raw document context is dropped from the integration input once a
        // task has digested it.
        let effective: Vec<&String> = if results.len() > 1
            && results[0].starts_with("[CONTEXT FROM UPLOADED FILES]")
            && results[1..].iter().any(|r| r.contains("[TASK:"))
        {
            results[1..].iter().collect()
        } else {
            results.iter().collect()
        };
        let input_data = effective
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        self.dashboard.add_log("Synthesizing final report...", "System");
        self.ensure_active()?;
        let report = self.formatter.integrate(&english, &input_data).await;
        let report = self.translation.from_english(&report, &tctx).await;

        match self.workspace.write_file(REPORT_PATH, &report) {
            Ok(status) => {
                tracing::info!(%status, "cowork report auto-saved");
                self.dashboard
                    .add_log(&format!("Report saved to {REPORT_PATH}."), "System");
            }
            Err(e) => tracing::warn!(error = %e, "failed to auto-save cowork report"),
        }

        self.dashboard.add_log("Flow completed successfully.", "System");
        Ok(report)
    }

    /// Plans the cowork task list, bypassing the LLM planner when keyword
    /// heuristics already determine the shape.
    async fn build_cowork_plan(
        &self,
        english: &str,
        lower: &str,
        rag_context: &str,
        needs_tool: bool,
    ) -> Vec<PlannedTask> {
        // Document-producing goals always end in an office task; a tool task
        // first when the goal also asks for external data.
        if OFFICE_GOAL_KEYWORDS.iter().any(|k| lower.contains(k)) {
            let mut plan = Vec::new();
            if needs_tool {
                plan.push(PlannedTask {
                    description: english.to_string(),
                    agent: AgentKind::Tool,
                });
            }
            plan.push(PlannedTask {
                description: english.to_string(),
                agent: AgentKind::Office,
            });
            return plan;
        }

        let route = self.router.route(english).await;
        let is_simple_summary =
            SUMMARY_KEYWORDS.iter().any(|k| lower.contains(k)) && english.len() < 50;

        // Hybrid: one summarize task plus the tool tasks the goal names.
        if !rag_context.is_empty() && needs_tool {
            let mut plan = vec![PlannedTask {
                description: format!(
                    "Analyze the provided file context and summarize it for: '{english}'"
                ),
                agent: AgentKind::Direct,
            }];
            if lower.contains("weather") || lower.contains("날씨") {
                let city = crate::tools::dispatch::city_from_text(lower);
                plan.push(PlannedTask {
                    description: format!("{city} weather"),
                    agent: AgentKind::Tool,
                });
            }
            if lower.contains("news") || lower.contains("뉴스") {
                for q in decompose(english)
                    .into_iter()
                    .filter(|q| q != "Compare results")
                {
                    plan.push(PlannedTask {
                        description: q,
                        agent: AgentKind::Tool,
                    });
                }
            }
            if lower.contains("search") || lower.contains("검색") {
                plan.push(PlannedTask {
                    description: english.to_string(),
                    agent: AgentKind::Tool,
                });
            }
            return plan;
        }

        if !rag_context.is_empty() || is_simple_summary {
            return if rag_context.is_empty() {
                vec![
                    PlannedTask {
                        description: format!("Locate and read files related to '{english}'"),
                        agent: AgentKind::Research,
                    },
                    PlannedTask {
                        description: "Summarize the extracted content".to_string(),
                        agent: AgentKind::Direct,
                    },
                    PlannedTask {
                        description: "Save the final summary".to_string(),
                        agent: AgentKind::Writer,
                    },
                ]
            } else {
                vec![
                    PlannedTask {
                        description: format!(
                            "Analyze the provided file context and answer: '{english}'"
                        ),
                        agent: AgentKind::Direct,
                    },
                    PlannedTask {
                        description: "Format the answer clearly".to_string(),
                        agent: AgentKind::Writer,
                    },
                ]
            };
        }

        match route.kind {
            Route::Tool => decompose(english)
                .into_iter()
                .filter(|q| q != "Compare results")
                .map(|q| PlannedTask {
                    description: q,
                    agent: AgentKind::Tool,
                })
                .collect(),
            Route::Direct => decompose(english)
                .into_iter()
                .filter(|q| q != "Compare results")
                .map(|q| PlannedTask {
                    description: q,
                    agent: AgentKind::Direct,
                })
                .collect(),
            Route::Reasoner => {
                let mut context = self.workspace.context_description();
                if !rag_context.is_empty() {
                    context.push_str("\n\n=== Attached File Context ===\n");
                    context.push_str(rag_context);
                }
                self.planner.create_plan(english, &context).await
            }
        }
    }

    /// Runs one phase of the plan. Independent multi-task phases go through
    /// the parallel runner; everything else runs sequentially with shared
    /// history. Only this method mutates the queue, one phase at a time.
    async fn run_phase(
        &self,
        queue: &mut TaskQueue,
        ids: &[String],
        english_goal: &str,
        results: &mut Vec<String>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.ensure_active()?;

        let history = results.join("\n\n");
        let phase_tasks: Vec<RunnerTask> = ids
            .iter()
            .filter_map(|id| queue.get(id))
            .map(|t| RunnerTask {
                id: t.id.clone(),
                description: t.description.clone(),
                agent: t.agent,
            })
            .collect();

        for task in &phase_tasks {
            queue.mark_running(&task.id);
            self.dashboard.add_log(
                &format!("[{}] {}", task.agent.as_str().to_uppercase(), task.description),
                "Planner",
            );
        }
        self.publish_tasks(queue);

        let parallel = phase_tasks.len() > 1 && phase_tasks.iter().all(|t| t.agent.is_independent());
        let reports = if parallel {
            let workers = self.workers.clone();
            let ctx = WorkerContext {
                history,
                user_goal: english_goal.to_string(),
            };
            self.runner
                .run_tasks(phase_tasks.clone(), move |task| {
                    let workers = workers.clone();
                    let ctx = ctx.clone();
                    async move { workers.run(task.agent, &task.description, &ctx).await }
                })
                .await
        } else {
            // Sequential execution refreshes history between tasks.
            let mut reports = std::collections::HashMap::new();
            let mut phase_outputs: Vec<String> = Vec::new();
            for task in &phase_tasks {
                self.ensure_active()?;
                let mut task_history = results.join("\n\n");
                for output in &phase_outputs {
                    task_history.push_str("\n\n");
                    task_history.push_str(output);
                }
                let ctx = WorkerContext {
                    history: task_history,
                    user_goal: english_goal.to_string(),
                };
                let report = match self.workers.run(task.agent, &task.description, &ctx).await {
                    Ok(result) => {
                        phase_outputs.push(result.clone());
                        crate::cowork::runner::TaskReport {
                            task_id: task.id.clone(),
                            success: true,
                            result: Some(result),
                            error: None,
                        }
                    }
                    Err(e) => crate::cowork::runner::TaskReport {
                        task_id: task.id.clone(),
                        success: false,
                        result: None,
                        error: Some(e.to_string()),
                    },
                };
                reports.insert(task.id.clone(), report);
            }
            reports
        };

        // Apply outcomes in queue order; missing reports count as failures.
        for task in &phase_tasks {
            match reports.get(&task.id) {
                Some(report) if report.success => {
                    let result = report.result.clone().unwrap_or_default();
                    self.log_tool_result(&result);
                    self.dashboard.add_log(
                        &format!("Completed {}: {}", task.id, truncate_chars(&result, 50)),
                        "System",
                    );
                    queue.mark_completed(&task.id, result);
                }
                Some(report) => {
                    let error = report.error.clone().unwrap_or_else(|| "unknown".into());
                    self.dashboard
                        .add_log(&format!("Failed {}: {error}", task.id), "Error");
                    queue.mark_failed(&task.id, error);
                }
                None => {
                    self.dashboard
                        .add_log(&format!("Failed {}: worker aborted", task.id), "Error");
                    queue.mark_failed(&task.id, "worker aborted");
                }
            }
        }
        self.publish_tasks(queue);

        for id in ids {
            if let Some(task) = queue.get(id)
                && task.status == TaskStatus::Completed
            {
                results.push(format!("[TASK: {}]\nDATA: {}", task.description, task.result));
            }
        }
        Ok(())
    }

    fn publish_tasks(&self, queue: &TaskQueue) {
        let views: Vec<TaskView> = queue
            .all()
            .iter()
            .map(|t| TaskView {
                id: t.id.clone(),
                description: t.description.clone(),
                agent: t.agent.as_str().to_string(),
                status: t.status.name(),
            })
            .collect();
        self.dashboard.update_tasks(&views);
    }

    /// Mirrors interesting tool payloads into the dashboard log: articles
    /// with their URLs, weather snapshots.
    fn log_tool_result(&self, raw: &str) {
        let Ok(value) = serde_json::from_str::<Value>(raw) else {
            return;
        };
        let inner = crate::format::unwrap_payload(&value);
        if let Some(items) = inner.get("results").and_then(|v| v.as_array()) {
            self.dashboard
                .add_log(&format!("Found {} items", items.len()), "Tool");
            for item in items {
                let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("No Title");
                let url = item.get("url").and_then(|v| v.as_str()).unwrap_or("No URL");
                self.dashboard.add_log(&format!("ARTICLE: {title}"), "Source");
                self.dashboard.add_log(&format!("   URL: {url}"), "Source");
            }
        } else if let (Some(temp), Some(cond)) = (
            inner.get("temperature").and_then(|v| v.as_str()),
            inner.get("condition").and_then(|v| v.as_str()),
        ) {
            self.dashboard
                .add_log(&format!("Weather: {temp}, {cond}"), "Tool");
        }
    }

    // ── File references ───────────────────────────────────────────────────────

    /// Strips `@[path]` tokens, ingests the files, and returns the retrieved
    /// context. Unreadable references are logged and dropped.
    async fn resolve_file_refs(&self, input: &str) -> (String, String) {
        let refs: Vec<String> = FILE_REF
            .captures_iter(input)
            .map(|c| c[1].trim().to_string())
            .collect();
        let clean = FILE_REF.replace_all(input, "").trim().to_string();
        if refs.is_empty() {
            return (clean, String::new());
        }

        let mut ingested = Vec::new();
        for reference in &refs {
            let path = {
                let direct = PathBuf::from(reference);
                if direct.exists() {
                    direct
                } else {
                    self.workspace.root().join(reference)
                }
            };
            match self.retriever.ingest(&path).await {
                Ok(status) => {
                    tracing::info!(file = %reference, %status, "reference ingested");
                    ingested.push(reference.clone());
                }
                Err(e) => {
                    tracing::warn!(file = %reference, error = %e, "dropping unreadable reference");
                    self.dashboard
                        .add_log(&format!("Could not read {reference}; skipping."), "Error");
                }
            }
        }
        if ingested.is_empty() {
            return (clean, String::new());
        }

        let retrieved = self.retriever.query(&clean).await.unwrap_or_default();
        if retrieved.is_empty() {
            return (clean, String::new());
        }
        let context = format!("[Context from {}]\n{retrieved}", ingested.join(", "));
        self.dashboard
            .add_log("Reference material attached from files.", "System");
        (clean, context)
    }
}

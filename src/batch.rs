//! Batch content generation.
//!
//! A run is split in two phases. [`plan`] expands the timeframe and builds
//! every [`BatchJob`] up front, with no I/O. [`BatchRunner`] then drives
//! those jobs strictly one at a time: generate, persist, pause, next. The
//! first failure ends the run; entries saved before it stay in the
//! calendar and the remaining jobs are never attempted.
//!
//! Progress bookkeeping lives in [`BatchRun`], a cursor over the frozen job
//! list, so the emission order can be exercised without a generator or a
//! database.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Defaults;
use crate::db::{CalendarEntry, CalendarStore, NewCalendarEntry};
use crate::generator::{Credentials, GeneratedIdea, GenerationRequest, IdeaGenerator};
use crate::model::{BatchStatus, ContentType, GenerationStrategy, TimeframeKind, WeekStart};
use crate::pillar::{self, ContentPillar};
use crate::progress::{BatchProgress, ProgressError, ProgressTracker};
use crate::throttle::{FixedDelay, Throttle};
use crate::timeframe;

pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchParams {
    pub timeframe: TimeframeKind,
    pub anchor_date: NaiveDate,
    pub content_type: ContentType,
    pub strategy: GenerationStrategy,
    /// Only honoured under [`GenerationStrategy::Thesis`].
    pub fixed_pillar: Option<ContentPillar>,
    pub credentials: Credentials,
}

impl BatchParams {
    pub fn new(
        timeframe: TimeframeKind,
        anchor_date: NaiveDate,
        content_type: ContentType,
        strategy: GenerationStrategy,
    ) -> Self {
        Self {
            timeframe,
            anchor_date,
            content_type,
            strategy,
            fixed_pillar: None,
            credentials: Credentials::default(),
        }
    }

    pub fn with_pillar(mut self, pillar: Option<ContentPillar>) -> Self {
        self.fixed_pillar = pillar;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Length and tone applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationDefaults {
    pub length: String,
    pub tone: String,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            length: "medium".into(),
            tone: "conversational".into(),
        }
    }
}

impl From<&Defaults> for GenerationDefaults {
    fn from(d: &Defaults) -> Self {
        Self {
            length: d.length.clone(),
            tone: d.tone.clone(),
        }
    }
}

/// One resolved date of a batch. Never modified after planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJob {
    pub date: NaiveDate,
    pub sequence_index: usize,
    pub pillar: Option<ContentPillar>,
    pub request: GenerationRequest,
}

impl BatchJob {
    pub fn color(&self) -> &'static str {
        pillar::color_for(self.pillar)
    }
}

pub fn build_request(
    date: NaiveDate,
    content_type: ContentType,
    pillar: Option<ContentPillar>,
    defaults: &GenerationDefaults,
    credentials: &Credentials,
) -> GenerationRequest {
    let (focus, style) = match pillar {
        Some(p) => (p.focus().to_string(), Some(p.style().to_string())),
        None => (content_type.base_focus().to_string(), None),
    };
    GenerationRequest {
        date,
        focus,
        style,
        length: defaults.length.clone(),
        tone: defaults.tone.clone(),
        content_type,
        include_timing: content_type.wants_timing(),
        pillar,
        credentials: credentials.clone(),
    }
}

/// Resolve the timeframe and build every job of the batch.
pub fn plan(
    params: &BatchParams,
    week_start: WeekStart,
    defaults: &GenerationDefaults,
) -> Vec<BatchJob> {
    timeframe::resolve_with(params.anchor_date, params.timeframe, week_start)
        .into_iter()
        .enumerate()
        .map(|(index, date)| {
            let pillar = pillar::assign(index, params.strategy, params.fixed_pillar);
            BatchJob {
                date,
                sequence_index: index,
                pillar,
                request: build_request(
                    date,
                    params.content_type,
                    pillar,
                    defaults,
                    &params.credentials,
                ),
            }
        })
        .collect()
}

/// Calendar notes for a generated idea, shaped by content type.
pub fn render_notes(
    idea: &GeneratedIdea,
    content_type: ContentType,
    pillar: Option<ContentPillar>,
) -> String {
    let mut notes = String::new();
    if let Some(p) = pillar {
        let _ = writeln!(notes, "Pillar: {}", p.label());
    }
    if !idea.summary.trim().is_empty() {
        let _ = writeln!(notes, "{}", idea.summary.trim());
    }
    match content_type {
        ContentType::Idea => {
            if let Some(body) = idea.body.as_deref().filter(|b| !b.trim().is_empty()) {
                let _ = writeln!(notes, "\n{}", body.trim());
            }
        }
        ContentType::KeyPoints => {
            if !idea.key_points.is_empty() {
                notes.push('\n');
                for point in &idea.key_points {
                    let _ = writeln!(notes, "- {}", point.trim());
                }
            }
        }
        ContentType::FullScript => {
            if let Some(body) = idea.body.as_deref().filter(|b| !b.trim().is_empty()) {
                let _ = writeln!(notes, "\n{}", body.trim());
            }
            if !idea.timing.is_empty() {
                notes.push_str("\nTiming:\n");
                for seg in &idea.timing {
                    let _ = writeln!(notes, "{} ({}s)", seg.label, seg.seconds);
                }
            }
        }
    }
    notes.trim_end().to_string()
}

fn entry_for(job: &BatchJob, idea: &GeneratedIdea, run_id: Uuid) -> NewCalendarEntry {
    NewCalendarEntry {
        title: idea.title.trim().to_string(),
        date: job.date,
        notes: render_notes(idea, job.request.content_type, job.pillar),
        color_hex: job.color().to_string(),
        content_type_tag: job.request.content_type.as_str().to_string(),
        batch_id: Some(run_id.to_string()),
    }
}

/// Cursor over a frozen job list plus the progress it has published.
#[derive(Debug)]
pub struct BatchRun {
    id: Uuid,
    jobs: Vec<BatchJob>,
    next: usize,
    tracker: ProgressTracker,
    entries: Vec<CalendarEntry>,
}

impl BatchRun {
    pub fn new(jobs: Vec<BatchJob>) -> Self {
        let total = jobs.len();
        Self {
            id: Uuid::new_v4(),
            jobs,
            next: 0,
            tracker: ProgressTracker::new(total),
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn jobs(&self) -> &[BatchJob] {
        &self.jobs
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn status(&self) -> BatchStatus {
        self.tracker.status()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn has_more(&self) -> bool {
        self.next < self.jobs.len()
    }

    /// First event of the run. An empty job list fails immediately.
    pub fn begin(&mut self) -> Result<BatchProgress, ProgressError> {
        if self.jobs.is_empty() {
            return self
                .tracker
                .failed(0, "timeframe resolved to no dates".to_string());
        }
        self.tracker.start()
    }

    /// Take the next job and the event announcing it; `None` once all jobs were handed out.
    pub fn next_job(&mut self) -> Result<Option<(BatchJob, BatchProgress)>, ProgressError> {
        let Some(job) = self.jobs.get(self.next).cloned() else {
            return Ok(None);
        };
        let event = self.tracker.generating(job.sequence_index)?;
        self.next += 1;
        Ok(Some((job, event)))
    }

    pub fn record_success(&mut self, entry: CalendarEntry) {
        self.entries.push(entry);
    }

    pub fn record_failure(
        &mut self,
        job: &BatchJob,
        reason: &str,
    ) -> Result<BatchProgress, ProgressError> {
        let error = format!("{}: {}", job.date.format("%Y-%m-%d"), reason);
        self.tracker.failed(job.sequence_index + 1, error)
    }

    /// Jobs handed out so far count as attempted.
    pub fn cancel(&mut self) -> Result<BatchProgress, ProgressError> {
        self.tracker.cancelled(self.next)
    }

    pub fn complete(&mut self) -> Result<BatchProgress, ProgressError> {
        self.tracker.completed()
    }

    pub fn into_report(self) -> BatchReport {
        BatchReport {
            run_id: self.id,
            terminal: self.tracker.last().cloned(),
            entries: self.entries,
        }
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    /// Entries saved by this run, in job order.
    pub entries: Vec<CalendarEntry>,
    pub terminal: Option<BatchProgress>,
}

impl BatchReport {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.terminal.as_ref().map(|p| p.status),
            Some(BatchStatus::Completed)
        )
    }
}

/// Drives batches against a generator and a calendar store.
///
/// `run` takes `&self`; concurrent runs on one runner share nothing but the
/// collaborators and the cancellation token.
pub struct BatchRunner {
    generator: Arc<dyn IdeaGenerator>,
    store: Arc<dyn CalendarStore>,
    throttle: Arc<dyn Throttle>,
    defaults: GenerationDefaults,
    week_start: WeekStart,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(generator: Arc<dyn IdeaGenerator>, store: Arc<dyn CalendarStore>) -> Self {
        Self {
            generator,
            store,
            throttle: Arc::new(FixedDelay(DEFAULT_THROTTLE)),
            defaults: GenerationDefaults::default(),
            week_start: WeekStart::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_defaults(mut self, defaults: GenerationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_week_start(mut self, week_start: WeekStart) -> Self {
        self.week_start = week_start;
        self
    }

    /// Checked between jobs only; a job in flight always finishes.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn plan(&self, params: &BatchParams) -> Vec<BatchJob> {
        plan(params, self.week_start, &self.defaults)
    }

    /// Run one batch. `true` only when every job was generated and saved.
    pub async fn run<F>(&self, params: &BatchParams, on_progress: F) -> bool
    where
        F: FnMut(&BatchProgress) + Send,
    {
        self.run_report(params, on_progress).await.succeeded()
    }

    pub async fn run_report<F>(&self, params: &BatchParams, mut on_progress: F) -> BatchReport
    where
        F: FnMut(&BatchProgress) + Send,
    {
        let mut run = BatchRun::new(self.plan(params));
        let run_id = run.id();
        info!(
            %run_id,
            timeframe = params.timeframe.as_str(),
            anchor = %params.anchor_date,
            strategy = params.strategy.as_str(),
            content_type = params.content_type.as_str(),
            total = run.total(),
            "starting batch"
        );

        publish(&mut on_progress, run.begin());
        if run.is_finished() {
            warn!(%run_id, "batch has no jobs");
            return run.into_report();
        }

        loop {
            if run.has_more() && self.cancel.is_cancelled() {
                info!(%run_id, "batch cancelled");
                publish(&mut on_progress, run.cancel());
                break;
            }

            let (job, event) = match run.next_job() {
                Ok(Some(step)) => step,
                Ok(None) => {
                    publish(&mut on_progress, run.complete());
                    info!(%run_id, total = run.total(), "batch completed");
                    break;
                }
                Err(err) => {
                    error!(%run_id, %err, "progress invariant violated");
                    break;
                }
            };
            on_progress(&event);

            match self.process_job(&job, run_id).await {
                Ok(entry) => run.record_success(entry),
                Err(err) => {
                    let reason = format!("{:#}", err);
                    warn!(%run_id, index = job.sequence_index, date = %job.date, %reason, "job failed; aborting batch");
                    publish(&mut on_progress, run.record_failure(&job, &reason));
                    break;
                }
            }

            if run.has_more() {
                self.throttle.wait(&self.cancel).await;
            }
        }

        run.into_report()
    }

    async fn process_job(&self, job: &BatchJob, run_id: Uuid) -> Result<CalendarEntry> {
        info!(
            %run_id,
            index = job.sequence_index,
            date = %job.date,
            pillar = job.pillar.map(|p| p.label()).unwrap_or("none"),
            "generating"
        );
        let idea = self.generator.generate(&job.request).await?;
        let entry = self
            .store
            .create_entry(entry_for(job, &idea, run_id))
            .await
            .context("failed to save calendar entry")?;
        info!(%run_id, index = job.sequence_index, entry_id = entry.id, "saved calendar entry");
        Ok(entry)
    }
}

fn publish<F>(on_progress: &mut F, event: Result<BatchProgress, ProgressError>)
where
    F: FnMut(&BatchProgress),
{
    match event {
        Ok(progress) => on_progress(&progress),
        Err(err) => error!(%err, "dropping invalid progress event"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::TimingSegment;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn week_params() -> BatchParams {
        BatchParams::new(
            TimeframeKind::Week,
            ymd(2024, 6, 12),
            ContentType::Idea,
            GenerationStrategy::Thesis,
        )
    }

    #[test]
    fn plan_week_rotates_pillars_by_position() {
        let jobs = plan(&week_params(), WeekStart::Monday, &GenerationDefaults::default());
        assert_eq!(jobs.len(), 7);
        assert_eq!(jobs[0].date, ymd(2024, 6, 10));
        let pillars: Vec<_> = jobs.iter().map(|j| j.pillar.unwrap()).collect();
        assert_eq!(pillars[0], ContentPillar::ALL[0]);
        assert_eq!(pillars[5], ContentPillar::ALL[0]);
        assert_eq!(pillars[6], ContentPillar::ALL[1]);
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.sequence_index, i);
            assert_eq!(job.request.date, job.date);
        }
    }

    #[test]
    fn random_strategy_ignores_fixed_pillar() {
        let mut params = week_params().with_pillar(Some(ContentPillar::Promote));
        params.strategy = GenerationStrategy::Random;
        let jobs = plan(&params, WeekStart::Monday, &GenerationDefaults::default());
        assert!(jobs.iter().all(|j| j.pillar.is_none()));
        assert!(jobs.iter().all(|j| j.color() == pillar::DEFAULT_COLOR));
        assert_eq!(jobs[0].request.focus, "general content idea");
        assert_eq!(jobs[0].request.style, None);
    }

    #[test]
    fn pillar_overrides_focus_and_style() {
        let defaults = GenerationDefaults {
            length: "short".into(),
            tone: "bold".into(),
        };
        let req = build_request(
            ymd(2024, 6, 10),
            ContentType::FullScript,
            Some(ContentPillar::Inspire),
            &defaults,
            &Credentials {
                api_key: Some("k".into()),
                model: None,
            },
        );
        assert_eq!(req.focus, ContentPillar::Inspire.focus());
        assert_eq!(req.style.as_deref(), Some(ContentPillar::Inspire.style()));
        assert_eq!(req.length, "short");
        assert_eq!(req.tone, "bold");
        assert!(req.include_timing);
        assert_eq!(req.credentials.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn render_notes_by_content_type() {
        let idea = GeneratedIdea {
            title: "T".into(),
            summary: "Summary".into(),
            body: Some("Body text".into()),
            key_points: vec!["one".into(), "two".into()],
            timing: vec![TimingSegment {
                label: "Hook".into(),
                seconds: 15,
            }],
        };
        let points = render_notes(&idea, ContentType::KeyPoints, None);
        assert_eq!(points, "Summary\n\n- one\n- two");

        let script = render_notes(&idea, ContentType::FullScript, Some(ContentPillar::Educate));
        assert!(script.starts_with("Pillar: Educate\nSummary"));
        assert!(script.contains("Body text"));
        assert!(script.ends_with("Timing:\nHook (15s)"));

        let plain = render_notes(&idea, ContentType::Idea, None);
        assert_eq!(plain, "Summary\n\nBody text");
    }

    #[test]
    fn run_cursor_emits_in_order() {
        let jobs = plan(&week_params(), WeekStart::Monday, &GenerationDefaults::default());
        let mut run = BatchRun::new(jobs);
        let first = run.begin().unwrap();
        assert_eq!((first.current, first.total), (0, 7));

        let mut currents = vec![first.current];
        while let Some((job, event)) = run.next_job().unwrap() {
            assert_eq!(event.current, job.sequence_index);
            currents.push(event.current);
        }
        let done = run.complete().unwrap();
        currents.push(done.current);
        assert!(currents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(done.current, 7);
        assert_eq!(run.status(), BatchStatus::Completed);
    }

    #[test]
    fn run_cursor_failure_reports_date() {
        let jobs = plan(&week_params(), WeekStart::Monday, &GenerationDefaults::default());
        let mut run = BatchRun::new(jobs);
        run.begin().unwrap();
        let mut failed = None;
        while let Some((job, _)) = run.next_job().unwrap() {
            if job.sequence_index == 3 {
                failed = Some(run.record_failure(&job, "quota").unwrap());
                break;
            }
        }
        let failed = failed.unwrap();
        assert_eq!(failed.current, 4);
        assert_eq!(failed.error.as_deref(), Some("2024-06-13: quota"));
        assert!(run.complete().is_err());
        assert!(!run.into_report().succeeded());
    }

    #[test]
    fn empty_run_fails_on_begin() {
        let mut run = BatchRun::new(Vec::new());
        let p = run.begin().unwrap();
        assert_eq!(p.status, BatchStatus::Failed);
        assert_eq!((p.current, p.total), (0, 0));
        assert!(run.is_finished());
    }
}

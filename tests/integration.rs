use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use content_batch::batch::{BatchParams, BatchRunner};
use content_batch::db::{self, CalendarEntry, CalendarStore, NewCalendarEntry, SqliteCalendar};
use content_batch::generator::{GeneratedIdea, GenerationRequest, IdeaGenerator};
use content_batch::pillar::{self, ContentPillar};
use content_batch::progress::{BatchProgress, ProgressLog};
use content_batch::throttle::{NoDelay, Throttle};
use content_batch::{BatchStatus, ContentType, GenerationStrategy, TimeframeKind};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Clone, Default)]
struct RecordingGenerator {
    responses: Arc<Mutex<VecDeque<Result<GeneratedIdea>>>>,
    calls: Arc<Mutex<Vec<GenerationRequest>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl RecordingGenerator {
    fn with_responses(responses: Vec<Result<GeneratedIdea>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    /// Fires `token` while serving the call with 0-based index `n`.
    fn cancelling_at(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    async fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl IdeaGenerator for RecordingGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedIdea> {
        let n = {
            let mut calls = self.calls.lock().await;
            calls.push(request.clone());
            calls.len() - 1
        };
        if let Some((at, token)) = &self.cancel_after {
            if *at == n {
                token.cancel();
            }
        }
        let mut guard = self.responses.lock().await;
        guard
            .pop_front()
            .unwrap_or_else(|| Ok(GeneratedIdea::titled(format!("Idea for {}", request.date))))
    }
}

/// Store that fails on the given 0-based call and delegates otherwise.
struct FlakyStore {
    inner: SqliteCalendar,
    fail_on: usize,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl CalendarStore for FlakyStore {
    async fn create_entry(&self, entry: NewCalendarEntry) -> Result<CalendarEntry> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == self.fail_on {
            return Err(anyhow!("disk full"));
        }
        self.inner.create_entry(entry).await
    }
}

#[derive(Default)]
struct CountingThrottle {
    waits: AtomicUsize,
}

#[async_trait::async_trait]
impl Throttle for CountingThrottle {
    async fn wait(&self, _cancel: &CancellationToken) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

fn runner(generator: RecordingGenerator, pool: &sqlx::SqlitePool) -> BatchRunner {
    BatchRunner::new(
        Arc::new(generator),
        Arc::new(SqliteCalendar::new(pool.clone())),
    )
    .with_throttle(Arc::new(NoDelay))
}

fn assert_progress_contract(events: &[BatchProgress]) {
    assert!(!events.is_empty());
    assert!(events.windows(2).all(|w| w[0].current <= w[1].current));
    assert!(events.iter().all(|p| p.current <= p.total));
    let terminal: Vec<_> = events.iter().filter(|p| p.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "exactly one terminal event: {:?}", events);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn single_day_random_makes_one_plain_entry() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::default();
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Single,
        ymd(2024, 6, 10),
        ContentType::Idea,
        GenerationStrategy::Random,
    );
    let ok = runner(generator.clone(), &pool).run(&params, log.sink()).await;
    assert!(ok);

    let calls = generator.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].date, ymd(2024, 6, 10));
    assert_eq!(calls[0].pillar, None);

    let entries = db::list_entries_between(&pool, ymd(2024, 6, 10), ymd(2024, 6, 10))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].color_hex, pillar::DEFAULT_COLOR);
    assert_eq!(entries[0].content_type_tag, "idea");
    assert_progress_contract(&log.events());
}

#[tokio::test]
async fn week_thesis_rotates_pillars_and_colors() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::default();
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::KeyPoints,
        GenerationStrategy::Thesis,
    );
    let report = runner(generator.clone(), &pool)
        .run_report(&params, log.sink())
        .await;
    assert!(report.succeeded());

    let calls = generator.calls().await;
    let dates: Vec<_> = calls.iter().map(|c| c.date).collect();
    assert_eq!(dates.first(), Some(&ymd(2024, 6, 10)));
    assert_eq!(dates.last(), Some(&ymd(2024, 6, 16)));
    let pillars: Vec<_> = calls.iter().map(|c| c.pillar.unwrap()).collect();
    let expected: Vec<_> = [0, 1, 2, 3, 4, 0, 1]
        .iter()
        .map(|&i| ContentPillar::ALL[i])
        .collect();
    assert_eq!(pillars, expected);

    let entries = db::list_entries_for_batch(&pool, &report.run_id.to_string())
        .await
        .unwrap();
    assert_eq!(entries.len(), 7);
    for (entry, expected_pillar) in entries.iter().zip(expected) {
        assert_eq!(entry.color_hex, expected_pillar.color());
        assert_eq!(entry.content_type_tag, "key_points");
    }
    let saved_ids: Vec<_> = report.entries.iter().map(|e| e.id).collect();
    let stored_ids: Vec<_> = entries.iter().map(|e| e.id).collect();
    assert_eq!(saved_ids, stored_ids);
}

#[tokio::test]
async fn leap_february_runs_twenty_nine_jobs() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::default();
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Month,
        ymd(2024, 2, 15),
        ContentType::Idea,
        GenerationStrategy::Thesis,
    )
    .with_pillar(Some(ContentPillar::Connect));
    assert!(runner(generator.clone(), &pool).run(&params, log.sink()).await);

    let calls = generator.calls().await;
    assert_eq!(calls.len(), 29);
    assert!(calls.iter().all(|c| c.pillar == Some(ContentPillar::Connect)));
    assert_eq!(db::count_entries(&pool).await.unwrap(), 29);

    let terminal = log.terminal().unwrap();
    assert_eq!((terminal.current, terminal.total), (29, 29));
}

#[tokio::test]
async fn failure_mid_week_aborts_and_keeps_prefix() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::with_responses(vec![
        Ok(GeneratedIdea::titled("Mon")),
        Ok(GeneratedIdea::titled("Tue")),
        Ok(GeneratedIdea::titled("Wed")),
        Err(anyhow!("quota exceeded")),
    ]);
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Thesis,
    );
    let ok = runner(generator.clone(), &pool).run(&params, log.sink()).await;
    assert!(!ok);

    // Jobs after the failing one are never attempted.
    assert_eq!(generator.calls().await.len(), 4);

    let entries = db::list_entries_between(&pool, ymd(2024, 6, 1), ymd(2024, 6, 30))
        .await
        .unwrap();
    let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Mon", "Tue", "Wed"]);

    let events = log.events();
    assert_progress_contract(&events);
    let terminal = events.last().unwrap();
    assert_eq!(terminal.status, BatchStatus::Failed);
    assert_eq!((terminal.current, terminal.total), (4, 7));
    assert_eq!(terminal.error.as_deref(), Some("2024-06-13: quota exceeded"));
}

#[tokio::test]
async fn full_week_completes_with_pillar_colors() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::default();
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 3),
        ContentType::FullScript,
        GenerationStrategy::Thesis,
    );
    let report = runner(generator.clone(), &pool)
        .run_report(&params, log.sink())
        .await;
    assert!(report.succeeded());

    let colors: Vec<_> = report.entries.iter().take(5).map(|e| e.color_hex.clone()).collect();
    let expected: Vec<_> = ContentPillar::ALL.iter().map(|p| p.color().to_string()).collect();
    assert_eq!(colors, expected);

    let calls = generator.calls().await;
    assert!(calls.iter().all(|c| c.include_timing));

    let events = log.events();
    assert_progress_contract(&events);
    let terminal = events.last().unwrap();
    assert_eq!(terminal.status, BatchStatus::Completed);
    assert_eq!(terminal.current, terminal.total);
    assert_eq!(terminal.message.as_deref(), Some("7 jobs generated"));
}

#[tokio::test]
async fn progress_announces_each_job_before_the_call() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::default();
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Random,
    );
    assert!(runner(generator, &pool).run(&params, log.sink()).await);

    let events = log.events();
    // start + one per job + terminal
    assert_eq!(events.len(), 1 + 7 + 1);
    assert_eq!(events[0].current, 0);
    assert_eq!(events[0].status, BatchStatus::Generating);
    assert_eq!(events[0].message, None);
    for i in 0..7 {
        let p = &events[1 + i];
        assert_eq!(p.current, i);
        assert_eq!(p.status, BatchStatus::Generating);
        assert_eq!(
            p.message.as_deref(),
            Some(format!("generating job {} of 7", i + 1).as_str())
        );
    }
}

#[tokio::test]
async fn persistence_failure_aborts_like_generation_failure() {
    let pool = setup_pool().await;
    let generator = RecordingGenerator::default();
    let store = FlakyStore {
        inner: SqliteCalendar::new(pool.clone()),
        fail_on: 2,
        calls: AtomicUsize::new(0),
    };
    let runner = BatchRunner::new(Arc::new(generator.clone()), Arc::new(store))
        .with_throttle(Arc::new(NoDelay));
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Random,
    );
    assert!(!runner.run(&params, log.sink()).await);

    // The third idea was generated but could not be saved.
    assert_eq!(generator.calls().await.len(), 3);
    assert_eq!(db::count_entries(&pool).await.unwrap(), 2);

    let terminal = log.terminal().unwrap();
    assert_eq!(terminal.status, BatchStatus::Failed);
    assert_eq!(terminal.current, 3);
    let error = terminal.error.unwrap();
    assert!(error.starts_with("2024-06-12: "), "{}", error);
    assert!(error.contains("disk full"), "{}", error);
}

#[tokio::test]
async fn cancellation_stops_between_jobs() {
    let pool = setup_pool().await;
    let cancel = CancellationToken::new();
    let generator = RecordingGenerator::default().cancelling_at(1, cancel.clone());
    let runner = runner(generator.clone(), &pool).with_cancellation(cancel);
    let log = ProgressLog::new();

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Random,
    );
    let report = runner.run_report(&params, log.sink()).await;
    assert!(!report.succeeded());

    // The job in flight when cancellation fired still completes.
    assert_eq!(generator.calls().await.len(), 2);
    assert_eq!(report.entries.len(), 2);

    let events = log.events();
    assert_progress_contract(&events);
    let terminal = events.last().unwrap();
    assert_eq!(terminal.status, BatchStatus::Cancelled);
    assert_eq!((terminal.current, terminal.total), (2, 7));
    assert!(terminal.error.is_none());
}

#[tokio::test]
async fn throttle_runs_between_jobs_only() {
    let pool = setup_pool().await;
    let throttle = Arc::new(CountingThrottle::default());
    let runner = BatchRunner::new(
        Arc::new(RecordingGenerator::default()),
        Arc::new(SqliteCalendar::new(pool.clone())),
    )
    .with_throttle(throttle.clone());

    let params = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Random,
    );
    assert!(runner.run(&params, |_: &BatchProgress| {}).await);
    assert_eq!(throttle.waits.load(Ordering::SeqCst), 6);

    let single = BatchParams::new(
        TimeframeKind::Single,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Random,
    );
    assert!(runner.run(&single, |_: &BatchProgress| {}).await);
    assert_eq!(throttle.waits.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn concurrent_runs_are_independent() {
    let pool = setup_pool().await;
    let runner = Arc::new(runner(RecordingGenerator::default(), &pool));
    let week = BatchParams::new(
        TimeframeKind::Week,
        ymd(2024, 6, 12),
        ContentType::Idea,
        GenerationStrategy::Thesis,
    );
    let month = BatchParams::new(
        TimeframeKind::Month,
        ymd(2024, 4, 2),
        ContentType::Idea,
        GenerationStrategy::Random,
    );

    let (log_a, log_b) = (ProgressLog::new(), ProgressLog::new());
    let (a, b) = tokio::join!(
        runner.run_report(&week, log_a.sink()),
        runner.run_report(&month, log_b.sink())
    );
    assert!(a.succeeded() && b.succeeded());
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(a.entries.len(), 7);
    assert_eq!(b.entries.len(), 30);
    assert_progress_contract(&log_a.events());
    assert_progress_contract(&log_b.events());
}

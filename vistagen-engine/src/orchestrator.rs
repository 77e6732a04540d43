/// Generation orchestrator
///
/// Ties the account store, quota engine, enrichment stage and fan-out stage
/// together into one request with a single terminal outcome.
///
/// # State Machine
///
/// ```text
/// Idle ─> CheckingQuota ─> Enriching ─> Generating ─> Committing ─> Completed
///              │               │             │             │
///              └───────────────┴─────────────┴─────────────┴──> Failed
/// ```
///
/// - `CheckingQuota`: load the account (a stale day is reset and persisted),
///   refuse with `QuotaExceeded` before any external call
/// - `Enriching`: any enrichment error fails the request, usage untouched
/// - `Generating`: zero artifacts fails the request, usage untouched
/// - `Committing`: re-read the account and charge exactly one generation;
///   the charge is persisted before the result is returned
///
/// # Concurrency
///
/// With `serialize_per_account` (the default) the identity's account lock
/// is held from `CheckingQuota` through `Committing`, so two concurrent
/// requests for the same account cannot both be admitted on the last unit
/// of quota. Logins, upgrades and admin edits of that account take the same
/// lock and wait for the request to settle. Without it the check and the
/// commit race, and an account can be admitted once more than its limit;
/// each commit still re-reads under the lock, so no charge is lost.
///
/// # Cancellation
///
/// The caller's `CancellationToken` is honoured at every suspension point.
/// A cancelled request never commits usage.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
/// use vistagen_engine::enrichment::EnrichmentStage;
/// use vistagen_engine::fanout::{FanOutConfig, FanOutStage};
/// use vistagen_engine::orchestrator::{GenerationOrchestrator, OrchestratorConfig};
/// use vistagen_engine::services::mock::{MockArtifactService, MockEnrichmentService};
/// use vistagen_shared::accounts::AccountService;
/// use vistagen_shared::clock::SystemClock;
/// use vistagen_shared::store::InMemoryAccountStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let accounts = AccountService::new(Arc::new(InMemoryAccountStore::new()), Arc::new(SystemClock));
/// accounts.register("ana@example.com", None).await?;
///
/// let orchestrator = GenerationOrchestrator::new(
///     accounts,
///     EnrichmentStage::new(Arc::new(MockEnrichmentService::new())),
///     FanOutStage::new(Arc::new(MockArtifactService::succeeding()), FanOutConfig::default()),
///     OrchestratorConfig::default(),
/// );
///
/// let report = orchestrator
///     .request_generation("ana@example.com", "a fisherman at dawn", &CancellationToken::new())
///     .await?;
/// println!("{} artifacts, {} left today", report.artifacts.len(), report.quota.remaining);
/// # Ok(())
/// # }
/// ```

use crate::enrichment::EnrichmentStage;
use crate::fanout::{AttemptFailure, FanOutError, FanOutStage};
use crate::services::{Artifact, EnrichmentError, GenerationBrief};
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use vistagen_shared::accounts::{AccountError, AccountService};
use vistagen_shared::models::account::{normalize_identity, Tier};
use vistagen_shared::quota::QuotaEvaluation;
use vistagen_shared::store::StoreError;

/// Request lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Not started
    Idle,

    /// Loading the account and evaluating quota
    CheckingQuota,

    /// Waiting for the enrichment service
    Enriching,

    /// Fan-out in progress
    Generating,

    /// Charging usage
    Committing,

    /// Finished with artifacts
    Completed,

    /// Finished with an error
    Failed,
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestState::Idle => write!(f, "idle"),
            RequestState::CheckingQuota => write!(f, "checking_quota"),
            RequestState::Enriching => write!(f, "enriching"),
            RequestState::Generating => write!(f, "generating"),
            RequestState::Committing => write!(f, "committing"),
            RequestState::Completed => write!(f, "completed"),
            RequestState::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal request failures
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Daily allowance used up
    #[error("Daily quota exceeded ({used}/{limit} on {tier} tier)")]
    QuotaExceeded { tier: Tier, limit: u32, used: u32 },

    /// No account for this identity
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Prompt enrichment failed
    #[error("Enrichment failed: {0}")]
    EnrichmentFailed(#[source] EnrichmentError),

    /// Every generation attempt failed
    #[error("All {} generation attempts failed", failures.len())]
    GenerationFailed { failures: Vec<AttemptFailure> },

    /// The account store could not be read or written
    #[error("Account store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The caller went away
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Stable diagnostic code
    pub fn code(&self) -> &'static str {
        match self {
            GenerationError::QuotaExceeded { .. } => "quota_exceeded",
            GenerationError::AccountNotFound(_) => "account_not_found",
            GenerationError::EnrichmentFailed(_) => "enrichment_failed",
            GenerationError::GenerationFailed { .. } => "generation_failed",
            GenerationError::StoreUnavailable(_) => "store_unavailable",
            GenerationError::Cancelled => "cancelled",
        }
    }

    /// Message safe to show an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::QuotaExceeded { .. } => {
                "You have reached your daily generation limit. Upgrade your plan or come back tomorrow."
            }
            GenerationError::AccountNotFound(_) => "Account not found. Please sign in again.",
            GenerationError::EnrichmentFailed(EnrichmentError::EmptyInput) => {
                "Please describe the image you want to create."
            }
            GenerationError::EnrichmentFailed(_) => {
                "We could not understand the description right now. Please try again."
            }
            GenerationError::GenerationFailed { .. } => {
                "No images generated successfully. Please try again or adjust your prompt."
            }
            GenerationError::StoreUnavailable(_) => {
                "The service is temporarily unavailable. Please try again shortly."
            }
            GenerationError::Cancelled => "The request was cancelled.",
        }
    }
}

impl From<AccountError> for GenerationError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Store(e) => GenerationError::StoreUnavailable(e),
            AccountError::NotFound(identity)
            | AccountError::InvalidIdentity(identity)
            | AccountError::AlreadyExists(identity) => GenerationError::AccountNotFound(identity),
        }
    }
}

/// Successful request
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Normalized identity
    pub identity: String,

    /// Enriched brief
    pub brief: GenerationBrief,

    /// Artifacts in attempt-index order (never empty)
    pub artifacts: Vec<Artifact>,

    /// Failed attempts, for diagnostics only
    pub failures: Vec<AttemptFailure>,

    /// Quota after the charge
    pub quota: QuotaEvaluation,
}

/// Orchestrator settings
///
/// The number of attempts per request comes from the fan-out stage's
/// [`FanOutConfig`](crate::fanout::FanOutConfig).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Hold the identity's account lock from admission to commit
    pub serialize_per_account: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            serialize_per_account: true,
        }
    }
}

/// State tracking for one request
struct Transitions {
    state: RequestState,
}

impl Transitions {
    fn new() -> Self {
        Transitions {
            state: RequestState::Idle,
        }
    }

    fn enter(&mut self, next: RequestState) {
        tracing::debug!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    fn fail(&mut self, error: GenerationError) -> GenerationError {
        tracing::warn!(
            state = %self.state,
            code = error.code(),
            error = %error,
            "Generation request failed"
        );
        self.state = RequestState::Failed;
        error
    }
}

/// Usage-gated generation orchestrator
#[derive(Clone)]
pub struct GenerationOrchestrator {
    accounts: AccountService,
    enrichment: EnrichmentStage,
    fan_out: FanOutStage,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    /// Creates an orchestrator
    pub fn new(
        accounts: AccountService,
        enrichment: EnrichmentStage,
        fan_out: FanOutStage,
        config: OrchestratorConfig,
    ) -> Self {
        GenerationOrchestrator {
            accounts,
            enrichment,
            fan_out,
            config,
        }
    }

    /// Account operations sharing this orchestrator's locks
    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    /// Orchestrator settings
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one generation request for `identity`
    ///
    /// # Errors
    ///
    /// See [`GenerationError`]. Usage is charged only on success.
    pub async fn request_generation(
        &self,
        identity: &str,
        raw_input: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, GenerationError> {
        let identity = normalize_identity(identity);
        let span = tracing::info_span!("generation", identity = %identity);

        self.run(identity, raw_input, cancel).instrument(span).await
    }

    async fn run(
        &self,
        identity: String,
        raw_input: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationReport, GenerationError> {
        let mut states = Transitions::new();

        let guard = if self.config.serialize_per_account {
            let guard = until_cancelled(cancel, async { Ok(self.accounts.lock(&identity).await) })
                .await
                .map_err(|e| states.fail(e))?;
            Some(guard)
        } else {
            None
        };

        states.enter(RequestState::CheckingQuota);
        let quota = match &guard {
            Some(guard) => self.accounts.load_held(guard).await,
            None => self.accounts.load(&identity).await,
        }
        .map_err(|e| states.fail(e.into()))?;

        if !quota.allowed {
            return Err(states.fail(GenerationError::QuotaExceeded {
                tier: quota.account.tier,
                limit: quota.limit,
                used: quota.used,
            }));
        }

        states.enter(RequestState::Enriching);
        let brief = until_cancelled(cancel, async {
            self.enrichment
                .enrich(raw_input)
                .await
                .map_err(GenerationError::EnrichmentFailed)
        })
        .await
        .map_err(|e| states.fail(e))?;

        states.enter(RequestState::Generating);
        let outcome = self
            .fan_out
            .generate(
                &brief.final_generation_prompt,
                self.fan_out.config().variations,
                cancel,
            )
            .await
            .map_err(|e| {
                states.fail(match e {
                    FanOutError::AllAttemptsFailed { failures } => {
                        GenerationError::GenerationFailed { failures }
                    }
                    FanOutError::Cancelled => GenerationError::Cancelled,
                })
            })?;

        if cancel.is_cancelled() {
            return Err(states.fail(GenerationError::Cancelled));
        }

        states.enter(RequestState::Committing);
        let quota = match &guard {
            Some(guard) => self.accounts.commit_held(guard).await,
            None => self.accounts.commit_usage(&identity).await,
        }
        .map_err(|e| states.fail(e.into()))?;

        states.enter(RequestState::Completed);
        tracing::info!(
            artifacts = outcome.artifacts.len(),
            failed_attempts = outcome.failures.len(),
            remaining = quota.remaining,
            "Generation completed"
        );

        Ok(GenerationReport {
            identity,
            brief,
            artifacts: outcome.artifacts,
            failures: outcome.failures,
            quota,
        })
    }
}

async fn until_cancelled<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = Result<T, GenerationError>>,
) -> Result<T, GenerationError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GenerationError::Cancelled),
        result = work => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::FanOutConfig;
    use crate::services::mock::{MockArtifactService, MockAttempt, MockEnrichmentService};
    use crate::services::AttemptError;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;
    use vistagen_shared::clock::{Clock, FixedClock};
    use vistagen_shared::models::account::Account;
    use vistagen_shared::store::{AccountStore, InMemoryAccountStore, StoreResult};

    struct Harness {
        orchestrator: GenerationOrchestrator,
        store: Arc<InMemoryAccountStore>,
        clock: Arc<FixedClock>,
        enrichment: Arc<MockEnrichmentService>,
        artifacts: Arc<MockArtifactService>,
    }

    fn harness_with(
        enrichment: MockEnrichmentService,
        artifacts: MockArtifactService,
        config: OrchestratorConfig,
    ) -> Harness {
        let store = Arc::new(InMemoryAccountStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let enrichment = Arc::new(enrichment);
        let artifacts = Arc::new(artifacts);

        let orchestrator = GenerationOrchestrator::new(
            AccountService::new(store.clone(), clock.clone()),
            EnrichmentStage::new(enrichment.clone()),
            FanOutStage::new(artifacts.clone(), FanOutConfig::default()),
            config,
        );

        Harness {
            orchestrator,
            store,
            clock,
            enrichment,
            artifacts,
        }
    }

    fn harness(artifacts: MockArtifactService) -> Harness {
        harness_with(
            MockEnrichmentService::new(),
            artifacts,
            OrchestratorConfig::default(),
        )
    }

    async fn seed(h: &Harness, tier: Tier, usage: u32) {
        let mut account = Account::new("ana@example.com", None, h.clock.now());
        account.tier = tier;
        account.daily_usage = usage;
        h.store.put(&account).await.unwrap();
    }

    async fn usage(h: &Harness) -> u32 {
        h.store
            .get("ana@example.com")
            .await
            .unwrap()
            .unwrap()
            .daily_usage
    }

    async fn request(h: &Harness) -> Result<GenerationReport, GenerationError> {
        h.orchestrator
            .request_generation("ana@example.com", "nje peshkatar ne agim", &CancellationToken::new())
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_succeed_commits_once() {
        let h = harness(MockArtifactService::succeeding());
        seed(&h, Tier::Standard, 0).await;

        let report = request(&h).await.unwrap();

        assert_eq!(report.artifacts.len(), 3);
        assert_eq!(report.quota.used, 1);
        assert_eq!(report.quota.remaining, 4);
        assert_eq!(usage(&h).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_success_commits_once() {
        let h = harness(MockArtifactService::with_script(vec![
            MockAttempt::fail(AttemptError::NoPayload),
            MockAttempt::succeed(),
            MockAttempt::fail(AttemptError::Transport("reset".to_string())),
        ]));
        seed(&h, Tier::Standard, 2).await;

        let report = request(&h).await.unwrap();

        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].index, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(usage(&h).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ordering_skips_failed_attempt() {
        let h = harness(MockArtifactService::with_script(vec![
            MockAttempt::succeed().after(StdDuration::from_secs(3)),
            MockAttempt::fail(AttemptError::NoPayload),
            MockAttempt::succeed(),
        ]));
        seed(&h, Tier::Premium, 0).await;

        let report = request(&h).await.unwrap();

        let indices: Vec<usize> = report.artifacts.iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_fail_leaves_usage() {
        let h = harness(MockArtifactService::failing());
        seed(&h, Tier::Standard, 2).await;

        let err = request(&h).await.unwrap_err();

        assert!(matches!(err, GenerationError::GenerationFailed { ref failures } if failures.len() == 3));
        assert_eq!(err.code(), "generation_failed");
        assert_eq!(usage(&h).await, 2);
    }

    #[tokio::test]
    async fn test_quota_exceeded_makes_no_calls() {
        let h = harness(MockArtifactService::succeeding());
        seed(&h, Tier::Free, 1).await;

        let err = request(&h).await.unwrap_err();

        assert!(matches!(
            err,
            GenerationError::QuotaExceeded { tier: Tier::Free, limit: 1, used: 1 }
        ));
        assert_eq!(h.enrichment.calls(), 0);
        assert_eq!(h.artifacts.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let h = harness(MockArtifactService::succeeding());

        let err = request(&h).await.unwrap_err();
        assert!(matches!(err, GenerationError::AccountNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrichment_failure_leaves_usage() {
        let h = harness_with(
            MockEnrichmentService::failing(EnrichmentError::Unavailable("503".to_string())),
            MockArtifactService::succeeding(),
            OrchestratorConfig::default(),
        );
        seed(&h, Tier::Free, 0).await;

        let err = request(&h).await.unwrap_err();

        assert!(matches!(err, GenerationError::EnrichmentFailed(_)));
        assert_eq!(h.artifacts.calls(), 0);
        assert_eq!(usage(&h).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_day_is_reset_before_admission() {
        let h = harness(MockArtifactService::succeeding());
        seed(&h, Tier::Free, 1).await;
        h.clock.advance(Duration::days(1));

        let report = request(&h).await.unwrap();

        assert_eq!(report.quota.used, 1);
        assert_eq!(report.quota.account.usage_date, h.clock.today());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_generation_does_not_commit() {
        let h = harness(MockArtifactService::with_script(vec![
            MockAttempt::succeed(),
            MockAttempt::hang(),
            MockAttempt::hang(),
        ]));
        seed(&h, Tier::Standard, 0).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_secs(2)).await;
            trigger.cancel();
        });

        let err = h
            .orchestrator
            .request_generation("ana@example.com", "a boat", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled));
        assert_eq!(usage(&h).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_enrichment() {
        let h = harness_with(
            MockEnrichmentService::new().with_delay(StdDuration::from_secs(30)),
            MockArtifactService::succeeding(),
            OrchestratorConfig::default(),
        );
        seed(&h, Tier::Standard, 0).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = h
            .orchestrator
            .request_generation("ana@example.com", "a boat", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled));
        assert_eq!(h.artifacts.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_account_end_to_end() {
        let h = harness(MockArtifactService::with_script(vec![
            MockAttempt::succeed(),
            MockAttempt::fail(AttemptError::NoPayload),
            MockAttempt::succeed(),
        ]));
        let accounts = AccountService::new(h.store.clone(), h.clock.clone());
        accounts.register("ana@example.com", Some("Ana")).await.unwrap();

        let report = request(&h).await.unwrap();
        assert_eq!(report.artifacts.len(), 2);
        assert_eq!(usage(&h).await, 1);
        assert!(!report.quota.allowed);

        let err = request(&h).await.unwrap_err();
        assert!(matches!(err, GenerationError::QuotaExceeded { .. }));
        assert_eq!(usage(&h).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_serialized_requests_admit_once_on_last_unit() {
        let h = harness(MockArtifactService::with_script(vec![
            MockAttempt::succeed().after(StdDuration::from_secs(1)),
        ]));
        seed(&h, Tier::Free, 0).await;

        let first = h.orchestrator.clone();
        let second = h.orchestrator.clone();
        let (a, b) = tokio::join!(
            async move {
                first
                    .request_generation("ana@example.com", "a boat", &CancellationToken::new())
                    .await
            },
            async move {
                second
                    .request_generation("ana@example.com", "a boat", &CancellationToken::new())
                    .await
            },
        );

        let admitted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(admitted, 1);
        assert_eq!(usage(&h).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unserialized_requests_can_over_admit() {
        let h = harness_with(
            MockEnrichmentService::new(),
            MockArtifactService::with_script(vec![
                MockAttempt::succeed().after(StdDuration::from_secs(1)),
            ]),
            OrchestratorConfig {
                serialize_per_account: false,
            },
        );
        seed(&h, Tier::Free, 0).await;

        let first = h.orchestrator.clone();
        let second = h.orchestrator.clone();
        let (a, b) = tokio::join!(
            async move {
                first
                    .request_generation("ana@example.com", "a boat", &CancellationToken::new())
                    .await
            },
            async move {
                second
                    .request_generation("ana@example.com", "a boat", &CancellationToken::new())
                    .await
            },
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(usage(&h).await, 2);
    }

    struct BrokenStore;

    #[async_trait]
    impl AccountStore for BrokenStore {
        async fn get(&self, _identity: &str) -> StoreResult<Option<Account>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn put(&self, _account: &Account) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn list_all(&self) -> StoreResult<Vec<Account>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_unavailable() {
        let orchestrator = GenerationOrchestrator::new(
            AccountService::new(Arc::new(BrokenStore), Arc::new(FixedClock::new(Utc::now()))),
            EnrichmentStage::new(Arc::new(MockEnrichmentService::new())),
            FanOutStage::new(Arc::new(MockArtifactService::succeeding()), FanOutConfig::default()),
            OrchestratorConfig::default(),
        );

        let err = orchestrator
            .request_generation("ana@example.com", "a boat", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::StoreUnavailable(_)));
        assert_eq!(err.code(), "store_unavailable");
    }

    /// Reads pass through; writes fail once `fail_writes` is set
    struct WriteFailingStore {
        inner: InMemoryAccountStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl AccountStore for WriteFailingStore {
        async fn get(&self, identity: &str) -> StoreResult<Option<Account>> {
            self.inner.get(identity).await
        }

        async fn put(&self, account: &Account) -> StoreResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("write rejected".to_string()));
            }
            self.inner.put(account).await
        }

        async fn list_all(&self) -> StoreResult<Vec<Account>> {
            self.inner.list_all().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_failure_leaves_usage() {
        let store = Arc::new(WriteFailingStore {
            inner: InMemoryAccountStore::new(),
            fail_writes: AtomicBool::new(false),
        });
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let accounts = AccountService::new(store.clone(), clock.clone());
        accounts.register("ana@example.com", None).await.unwrap();
        store.fail_writes.store(true, Ordering::SeqCst);

        let artifacts = Arc::new(MockArtifactService::succeeding());
        let orchestrator = GenerationOrchestrator::new(
            accounts,
            EnrichmentStage::new(Arc::new(MockEnrichmentService::new())),
            FanOutStage::new(artifacts.clone(), FanOutConfig::default()),
            OrchestratorConfig::default(),
        );

        let err = orchestrator
            .request_generation("ana@example.com", "a boat", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::StoreUnavailable(_)));
        assert_eq!(err.code(), "store_unavailable");
        assert_eq!(artifacts.calls(), 3);

        let persisted = store.get("ana@example.com").await.unwrap().unwrap();
        assert_eq!(persisted.daily_usage, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_variations_follow_fan_out_config() {
        let store = Arc::new(InMemoryAccountStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        ));
        let accounts = AccountService::new(store, clock);
        accounts.register("ana@example.com", None).await.unwrap();

        let artifacts = Arc::new(MockArtifactService::succeeding());
        let orchestrator = GenerationOrchestrator::new(
            accounts,
            EnrichmentStage::new(Arc::new(MockEnrichmentService::new())),
            FanOutStage::new(
                artifacts.clone(),
                FanOutConfig {
                    variations: 1,
                    ..Default::default()
                },
            ),
            OrchestratorConfig::default(),
        );

        let report = orchestrator
            .request_generation("ana@example.com", "a boat", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(artifacts.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_waits_for_in_flight_generation() {
        let h = harness(MockArtifactService::with_script(vec![
            MockAttempt::succeed().after(StdDuration::from_secs(5)),
        ]));
        seed(&h, Tier::Free, 0).await;

        let generation = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .request_generation("ana@example.com", "a boat", &CancellationToken::new())
                    .await
            })
        };
        tokio::time::sleep(StdDuration::from_secs(1)).await;

        let session = h
            .orchestrator
            .accounts()
            .start_session("ana@example.com")
            .await
            .unwrap();

        assert_eq!(session.daily_usage, 1);
        generation.await.unwrap().unwrap();
        assert_eq!(usage(&h).await, 1);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            GenerationError::QuotaExceeded {
                tier: Tier::Free,
                limit: 1,
                used: 1,
            },
            GenerationError::AccountNotFound("a".to_string()),
            GenerationError::EnrichmentFailed(EnrichmentError::EmptyInput),
            GenerationError::GenerationFailed { failures: vec![] },
            GenerationError::StoreUnavailable(StoreError::Unavailable("x".to_string())),
            GenerationError::Cancelled,
        ];

        let mut codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());

        for error in &errors {
            assert!(!error.user_message().is_empty());
        }
    }
}

//! Execute a strategy against the live page and check that the page accepted it.
//!
//! Nothing raised while acting or validating escapes this module: driver
//! errors, panics and timeouts all become [`DispatchOutcome::Faulted`].

use crate::config::{DispatchConfig, SecurityConfig};
use crate::driver::{DriverError, PageDriver};
use crate::strategy::{AnswerLookup, PlannedAction, StrategyDefinition};
use canvass_common::snapshot::{PageAction, QuestionSnapshot};
use futures::FutureExt;
use regex::{Regex, RegexBuilder};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Executed and no error indicator appeared within the settle window.
    Validated,
    /// Executed, but the page reported an unmet requirement.
    Rejected { indicators: Vec<String> },
    /// The strategy declined, or interacting with the page failed.
    Faulted { detail: String },
}

pub struct Dispatcher {
    config: DispatchConfig,
    security: SecurityConfig,
    error_patterns: Vec<Regex>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig, security: SecurityConfig) -> Self {
        let error_patterns = config
            .error_patterns
            .iter()
            .filter_map(|p| match RegexBuilder::new(p).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Ignoring invalid error pattern");
                    None
                }
            })
            .collect();
        Self {
            config,
            security,
            error_patterns,
        }
    }

    /// Plan, act, then validate. Never returns an error.
    pub async fn execute<D>(
        &self,
        driver: &mut D,
        strategy: &StrategyDefinition,
        snapshot: &QuestionSnapshot,
        lookup: &AnswerLookup<'_>,
    ) -> DispatchOutcome
    where
        D: PageDriver + ?Sized,
    {
        let plan = match strategy.plan(snapshot, lookup) {
            Ok(plan) => plan,
            Err(e) => {
                info!(strategy = %strategy.name, reason = %e, "Strategy declined");
                return DispatchOutcome::Faulted {
                    detail: format!("declined: {}", e),
                };
            }
        };

        for step in &plan {
            if let Err(detail) = self.run_step(driver, step).await {
                warn!(strategy = %strategy.name, locator = %step.locator, detail = %detail, "Execution fault");
                return DispatchOutcome::Faulted { detail };
            }
        }

        self.validate(driver).await
    }

    async fn run_step<D>(&self, driver: &mut D, step: &PlannedAction) -> Result<(), String>
    where
        D: PageDriver + ?Sized,
    {
        match &step.action {
            PageAction::Type { text, .. } => debug!(
                locator = %step.locator,
                value = self.security.loggable(&step.label, text),
                "Typing"
            ),
            action => debug!(locator = %step.locator, action = %action, "Acting"),
        }

        let interaction = async {
            let handle = driver.locate(&step.locator).await?;
            driver.act(&handle, &step.action).await
        };
        self.guarded(
            self.config.action_timeout_ms,
            &format!("acting on {}", step.locator),
            interaction,
        )
        .await
    }

    /// Run one driver call under a time limit. Driver errors, panics and
    /// timeouts come back as a fault detail.
    async fn guarded<T, F>(&self, limit_ms: u64, what: &str, call: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let limit = Duration::from_millis(limit_ms);
        match timeout(limit, AssertUnwindSafe(call).catch_unwind()).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(e))) => Err(driver_detail(&e)),
            Ok(Err(panic)) => Err(format!("driver panicked: {}", panic_message(&*panic))),
            Err(_) => Err(format!("timed out after {}ms {}", limit_ms, what)),
        }
    }

    /// Watch the page for error indicators for the settle window.
    pub async fn validate<D>(&self, driver: &mut D) -> DispatchOutcome
    where
        D: PageDriver + ?Sized,
    {
        let settle_ms = self.config.settle_ms;
        let settled = self
            .guarded(
                settle_ms.saturating_add(self.config.action_timeout_ms),
                "waiting for the page to settle",
                async { Ok(driver.wait_settled(settle_ms).await) },
            )
            .await;
        match settled {
            Ok(true) => {}
            Ok(false) => debug!("Page did not settle, polling anyway"),
            Err(detail) => {
                warn!(detail = %detail, "Validation fault");
                return DispatchOutcome::Faulted { detail };
            }
        }

        let settle = Duration::from_millis(settle_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let deadline = Instant::now() + settle;
        loop {
            let polled = self
                .guarded(
                    self.config.action_timeout_ms,
                    "taking the validation snapshot",
                    async { driver.snapshot().await },
                )
                .await;
            let snapshot = match polled {
                Ok(snapshot) => snapshot,
                Err(detail) => {
                    warn!(detail = %detail, "Validation fault");
                    return DispatchOutcome::Faulted {
                        detail: format!("validation snapshot failed: {}", detail),
                    };
                }
            };
            let indicators = self.indicators(&snapshot);
            if !indicators.is_empty() {
                info!(indicators = ?indicators, "Answer rejected by page");
                return DispatchOutcome::Rejected { indicators };
            }
            let now = Instant::now();
            if now >= deadline {
                return DispatchOutcome::Validated;
            }
            sleep(poll.min(deadline - now)).await;
        }
    }

    /// Error notices and invalid-marked elements on the page.
    pub fn indicators(&self, snapshot: &QuestionSnapshot) -> Vec<String> {
        let mut found: Vec<String> = snapshot
            .notices
            .iter()
            .filter(|n| self.error_patterns.iter().any(|re| re.is_match(n)))
            .cloned()
            .collect();
        found.extend(
            snapshot
                .invalid_elements()
                .map(|e| format!("{} marked invalid", e.locator)),
        );
        found
    }
}

fn driver_detail(e: &DriverError) -> String {
    format!("{}: {}", e.code(), e)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Incremental reveal loop.
//!
//! Listing pages render more cards each time the "load more" control is
//! clicked. There is no pagination cursor to follow, so the loop keeps
//! clicking until the listing stops growing, the control disappears, or the
//! click bound is hit.

use tracing::{debug, info, warn};

use super::config::{GrowthMeasure, RevealConfig};
use super::driver::PageDriver;
use super::error::ScrapeError;

/// Mutable state of one reveal run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealState {
    pub item_count_before: usize,
    pub item_count_after: usize,
    pub click_count: usize,
    pub max_clicks: usize,
}

/// Why the reveal loop stopped. Only the initial wait can fail a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    /// A click produced no growth.
    Stagnated,
    /// The load-more control was absent or not clickable.
    ControlAbsent,
    /// `max_clicks` was reached while the listing was still growing.
    ClickBoundExceeded,
    /// The profile has no load-more control.
    NoControlConfigured,
    /// A click or measurement failed mid-loop; revealed content is kept.
    Interrupted(String),
}

impl RevealOutcome {
    /// True for the "fully loaded" terminations.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            Self::Stagnated | Self::ControlAbsent | Self::NoControlConfigured
        )
    }
}

/// Result of revealing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealReport {
    pub state: RevealState,
    pub outcome: RevealOutcome,
}

/// Drives the load-more loop on an already opened page.
pub struct Revealer<'a> {
    config: &'a RevealConfig,
    item_locator: &'a str,
    load_more: Option<&'a str>,
}

impl<'a> Revealer<'a> {
    pub fn new(config: &'a RevealConfig, item_locator: &'a str, load_more: Option<&'a str>) -> Self {
        Self {
            config,
            item_locator,
            load_more,
        }
    }

    /// Wait for the first items, then click until the listing is fully revealed.
    pub async fn reveal<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        url: &str,
    ) -> Result<RevealReport, ScrapeError> {
        let timeout = self.config.initial_timeout();
        if !driver.wait_for_selector(self.item_locator, timeout).await? {
            return Err(ScrapeError::NoContent {
                url: url.to_string(),
                selector: self.item_locator.to_string(),
                timeout,
            });
        }

        let mut state = RevealState {
            max_clicks: self.config.max_clicks,
            ..Default::default()
        };

        let Some(load_more) = self.load_more else {
            state.item_count_before = self.measure(driver).await.unwrap_or(0);
            state.item_count_after = state.item_count_before;
            debug!("No load-more control configured for {}", url);
            return Ok(RevealReport {
                state,
                outcome: RevealOutcome::NoControlConfigured,
            });
        };

        let outcome = self.click_until_done(driver, load_more, &mut state).await;

        match &outcome {
            RevealOutcome::Stagnated => info!(
                "Listing stopped growing after {} click(s) ({} items)",
                state.click_count, state.item_count_after
            ),
            RevealOutcome::ControlAbsent => info!(
                "Load-more control gone after {} click(s); all content loaded",
                state.click_count
            ),
            RevealOutcome::ClickBoundExceeded => warn!(
                "Reached maximum load-more clicks ({}) on {}; continuing with partial listing",
                state.max_clicks, url
            ),
            RevealOutcome::Interrupted(reason) => warn!(
                "Load-more loop interrupted after {} click(s) on {}: {}",
                state.click_count, url, reason
            ),
            RevealOutcome::NoControlConfigured => {}
        }

        Ok(RevealReport { state, outcome })
    }

    async fn click_until_done<D: PageDriver + ?Sized>(
        &self,
        driver: &mut D,
        load_more: &str,
        state: &mut RevealState,
    ) -> RevealOutcome {
        state.item_count_after = match self.measure(driver).await {
            Ok(n) => n,
            Err(e) => return RevealOutcome::Interrupted(e.to_string()),
        };
        state.item_count_before = state.item_count_after;

        while state.click_count < state.max_clicks {
            state.item_count_before = state.item_count_after;

            let control = match driver.find_clickable(load_more).await {
                Ok(Some(control)) => control,
                Ok(None) => return RevealOutcome::ControlAbsent,
                Err(e) => return RevealOutcome::Interrupted(e.to_string()),
            };

            if let Err(e) = driver.click(&control).await {
                return RevealOutcome::Interrupted(e.to_string());
            }
            state.click_count += 1;
            debug!(
                "Clicked load-more ({}/{}), waiting {}ms",
                state.click_count, state.max_clicks, self.config.settle_ms
            );
            driver.wait(self.config.settle()).await;

            state.item_count_after = match self.measure(driver).await {
                Ok(n) => n,
                Err(e) => return RevealOutcome::Interrupted(e.to_string()),
            };

            if state.item_count_after <= state.item_count_before {
                return RevealOutcome::Stagnated;
            }
        }

        RevealOutcome::ClickBoundExceeded
    }

    async fn measure<D: PageDriver + ?Sized>(&self, driver: &mut D) -> Result<usize, ScrapeError> {
        match self.config.measure {
            GrowthMeasure::Items => driver.count(self.item_locator).await,
            GrowthMeasure::Markup => Ok(driver.current_markup().await?.len()),
        }
    }
}

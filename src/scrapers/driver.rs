//! Page driver abstraction consumed by the reveal loop.
//!
//! A driver owns exactly one page session. Callers open it, drive the
//! reveal loop, read the markup and must call [`PageDriver::quit`] on every
//! exit path.

use std::time::Duration;

use async_trait::async_trait;

use super::error::ScrapeError;

/// Handle to a clickable element found by [`PageDriver::find_clickable`].
///
/// Drivers re-resolve the element from `locator` and `index` when clicking,
/// so a handle stays valid across re-renders as long as the control exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub locator: String,
    pub index: usize,
}

impl ElementRef {
    pub fn new(locator: impl Into<String>, index: usize) -> Self {
        Self {
            locator: locator.into(),
            index,
        }
    }
}

/// Browser-like page session.
#[async_trait]
pub trait PageDriver: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Navigate to `url`.
    async fn open(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Wait until at least one element matches `selector`.
    /// Returns `Ok(false)` when the timeout elapses first.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, ScrapeError>;

    /// Number of elements currently matching `selector`.
    async fn count(&mut self, selector: &str) -> Result<usize, ScrapeError>;

    /// Current serialized DOM.
    async fn current_markup(&mut self) -> Result<String, ScrapeError>;

    /// First visible, enabled element matching `locator`, if any.
    async fn find_clickable(&mut self, locator: &str) -> Result<Option<ElementRef>, ScrapeError>;

    /// Scroll the element into view and click it.
    async fn click(&mut self, element: &ElementRef) -> Result<(), ScrapeError>;

    /// Fixed-duration pause to let the page settle.
    async fn wait(&mut self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Close the session and release its resources.
    async fn quit(&mut self);
}

/// Scripted driver used by unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Simulates a listing whose item count follows a fixed sequence.
    ///
    /// Each `count` call returns the next value of `counts` (the last value
    /// repeats). The load-more control is clickable while `clickable` is
    /// non-zero; each click decrements it.
    pub struct ScriptedDriver {
        pub counts: Vec<usize>,
        pub cursor: usize,
        pub clickable: usize,
        pub clicks: usize,
        pub markup: String,
        pub has_items: bool,
        pub fail_open: bool,
        pub fail_click: bool,
        pub opened: Vec<String>,
        pub quit_called: bool,
    }

    impl ScriptedDriver {
        pub fn new(counts: Vec<usize>) -> Self {
            Self {
                counts,
                cursor: 0,
                clickable: usize::MAX,
                clicks: 0,
                markup: String::new(),
                has_items: true,
                fail_open: false,
                fail_click: false,
                opened: Vec::new(),
                quit_called: false,
            }
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedDriver {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn open(&mut self, url: &str) -> Result<(), ScrapeError> {
            if self.fail_open {
                return Err(ScrapeError::load(url, "connection refused"));
            }
            self.opened.push(url.to_string());
            Ok(())
        }

        async fn wait_for_selector(
            &mut self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<bool, ScrapeError> {
            Ok(self.has_items)
        }

        async fn count(&mut self, _selector: &str) -> Result<usize, ScrapeError> {
            let value = self
                .counts
                .get(self.cursor)
                .or(self.counts.last())
                .copied()
                .unwrap_or(0);
            self.cursor += 1;
            Ok(value)
        }

        async fn current_markup(&mut self) -> Result<String, ScrapeError> {
            Ok(self.markup.clone())
        }

        async fn find_clickable(
            &mut self,
            locator: &str,
        ) -> Result<Option<ElementRef>, ScrapeError> {
            if self.clickable == 0 {
                return Ok(None);
            }
            Ok(Some(ElementRef::new(locator, 0)))
        }

        async fn click(&mut self, _element: &ElementRef) -> Result<(), ScrapeError> {
            if self.fail_click {
                return Err(ScrapeError::load("scripted", "click intercepted"));
            }
            self.clicks += 1;
            self.clickable = self.clickable.saturating_sub(1);
            Ok(())
        }

        async fn quit(&mut self) {
            self.quit_called = true;
        }
    }
}

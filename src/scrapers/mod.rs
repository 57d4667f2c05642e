//! Listing page drivers, the reveal loop and record extraction.

pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod reveal;
mod static_driver;

pub use browser::{BrowserEngineConfig, ChromeDriver, EngineKind};
pub use config::{builtin_profiles, GrowthMeasure, RequiredFields, RevealConfig, SiteProfile};
pub use driver::{ElementRef, PageDriver};
pub use error::{ContainerError, ScrapeError, SelectorError};
pub use extract::{Extraction, Extractor, SkippedContainer};
pub use reveal::{RevealOutcome, RevealReport, RevealState, Revealer};
pub use static_driver::StaticDriver;

/// Build the page driver selected by `config.engine`.
pub fn make_driver(config: &BrowserEngineConfig) -> Result<Box<dyn PageDriver>, ScrapeError> {
    match config.engine {
        EngineKind::Browser => Ok(Box::new(ChromeDriver::new(config.clone()))),
        EngineKind::Static => Ok(Box::new(StaticDriver::new(config)?)),
    }
}

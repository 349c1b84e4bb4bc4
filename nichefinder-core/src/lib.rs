pub mod analysis;
pub mod categorize;
pub mod config;
pub mod coverage;
pub mod crawl;
pub mod data;
pub mod error;
pub mod gaps;
pub mod model;
pub mod normalize;
pub mod seeds;
pub mod state;

pub use analysis::{analyze, analyze_database, AnalysisOutput};
pub use config::NicheConfig;
pub use crawl::{CrawlEvent, CrawlScheduler, CrawlSummary, ProgressCallback};
pub use error::{NicheError, Result};
pub use model::Axis;
pub use state::CrawlState;

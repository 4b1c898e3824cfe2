//! Market sampling and valuation engine for trade items, plus the recipe
//! profitability ranking built on top of the cached valuations.

pub mod domain;
pub mod infra;
pub mod report;
pub mod scanner;

pub use domain::{Category, ItemValuation, Recipe, RecipeDefinition};
pub use infra::{ItemStore, PutOutcome, QueryLibrary, ScannerConfig, TradeApiClient};
pub use report::{build_report, LogReportSink, RankedGroup, ReportSink};
pub use scanner::{Phase, RefreshOrchestrator};

pub mod config;
pub mod strategy;
pub mod trace;

pub use config::{
    ArchiveConfig, Config, CycleConfig, EvolverConfig, LoggingConfig, SamplingConfig,
};
pub use strategy::{CrossPlatformTopic, ExplorationStrategy, ProductiveSearch, FIRST_RUN_CONTEXT};
pub use trace::{
    CrossReferenceRecord, DiscoveredConnection, ExplorationTrace, SearchRecord, SearchTool,
    ToolCallRecord,
};

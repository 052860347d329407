pub mod adaptation;
pub mod config;
pub mod directive;
pub mod engine;
pub mod orchestrator;
pub mod session;


pub use adaptation::{AdaptationState, Transition};
pub use config::{ConfigError, EngineConfig, DEFAULT_HYSTERESIS};
pub use directive::{AdjustmentDirective, AdjustmentKind, HistoryAction, HistoryEntry};
pub use engine::{AdjustmentSnapshot, EngineError, FrictionEngine, RecordOutcome};
pub use orchestrator::{diagnose_active, CycleOrchestrator, CycleReport, CycleTrigger, Evaluation, PendingCycle};
pub use session::{ExplanationStyle, ExplicitPreferences, Session, SessionId, SessionSummary};

pub mod coordinator;
pub mod demo;
pub mod domain;
pub mod ports;

pub use coordinator::ProviderCoordinator;
pub use domain::{
    split_duration, Evaluation, GeneratedActivity, GenerationRequest, KeyValidation,
    ProcedurePhase, MAX_PHASE_MINUTES, Provider, ProviderInfo, SessionType, StoredActivity,
};
pub use ports::{
    ActivityProvider, ActivityRepository, GenerationCause, PdfTextExtractor, PortError,
    PortResult,
};

pub mod intake;
pub mod probe;
pub mod store;

pub use intake::{AudioIntake, IntakeError};
pub use probe::{AudioInfo, AudioProbe, ProbeError, SymphoniaProbe};
pub use store::{
    CancelOutcome, JobResults, JobStatistics, NewAudioMeta, NewCorrectedTranscript, NewJob,
    NewRawTranscript, NewSummary, PurgedJob, ReprocessOutcome, Store, StoreError, StoreResult,
};

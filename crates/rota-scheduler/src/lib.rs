//! Scheduler: fair per-tenant lead distribution and the cadence that drives it.

pub mod distribution;
pub mod trigger;

pub use distribution::{
    Assignment, DEFAULT_MAX_BATCH, DistributionEngine, DistributionOutcome, DistributionReport,
    Rotation, Walk, batch_size, resume_index, walk_limit,
};
pub use trigger::{
    FiringReport, ScheduleTrigger, StartOutcome, TenantResult, TenantRun, TriggerSettings,
};

//! Handlescope Checker - the username check pipeline.
//!
//! Everything between a render and a packaged archive lives here: deciding
//! whether a rendered page means the username exists, recording results and
//! evidence, counting batch progress across concurrent workers, validating
//! site definitions against control usernames, and packaging a finished
//! batch into a zip archive.
//!
//! # Architecture
//!
//! - [`pipeline::CheckPipeline`] runs one check end to end
//! - [`validator`] is the pure decision over site criteria and raw markup
//! - [`progress::ProgressTracker`] arbitrates batch completion in the database
//! - [`site_validation::SiteValidationPipeline`] certifies site definitions
//! - [`archiver::ArchiveBuilder`] packages completed batches
//! - [`events::EventBus`] fans out milestones; [`hooks::JobHooks`] lets an
//!   embedding application attach queue accounting

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod archiver;
pub mod error;
pub mod events;
pub mod hooks;
pub mod pipeline;
pub mod progress;
pub mod site_validation;
pub mod validator;

// Re-export commonly used types
pub use archiver::ArchiveBuilder;
pub use error::{CheckError, Result};
pub use events::{ArchiveEvent, EventBus, ResultEvent, SiteEvent};
pub use hooks::{JobHooks, NoopHooks};
pub use pipeline::{CheckPipeline, CheckRequest, ERROR_IMAGE_NAME};
pub use progress::ProgressTracker;
pub use site_validation::SiteValidationPipeline;
pub use validator::ValidationError;

//! Resizer Service
//!
//! Reacts to object-created notifications by resizing the uploaded image
//! into a fixed set of derived sizes and uploading each derivative next to
//! (or away from) the original.
//!
//! ## Features
//!
//! - **Directory Profiles**: the source key's directory selects the output
//!   directory, height policy and transform mode
//! - **Two Transform Modes**: `sizes` (1/6 .. 1 of the source width) and
//!   `responsive` (1x, 1.5x, 2x, 3x)
//! - **Templated Output Keys**: deterministic, collision-free derivative keys
//! - **All-or-Nothing Batches**: any failure hands the whole batch back to the
//!   platform for redelivery
//!
//! ## Architecture
//!
//! ```text
//! S3 Event            Processor                                   S3 Bucket
//! ┌──────────────┐    ┌──────────────────────────────────┐       ┌──────────────┐
//! │ Records      │───▶│ validate ─▶ resolve profile      │       │ {outputdir}/ │
//! └──────────────┘    │    │                             │       │   {label}/   │
//!                     │    ▼                             │       │     {key}    │
//!                     │ fetch ─▶ dimensions ─▶ sizes     │       └──────────────┘
//!                     │                         │        │              ▲
//!                     │                         ▼        │              │
//!                     │                resize ─▶ upload ─┼──────────────┘
//!                     └──────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod imaging;
pub mod object_store;
pub mod output_key;
pub mod processor;
pub mod profile;
pub mod sizes;

pub use config::Config;
pub use error::{BatchFailure, ResizeError, StorageError};
pub use event::Notification;
pub use imaging::{ImageEngine, RasterEngine};
pub use object_store::{ObjectStore, S3ObjectStore};
pub use output_key::{make_key, KeyContext, KeyTemplate};
pub use processor::ImageProcessor;
pub use profile::{Profile, ProfileOverride, ProfileResolver, TransformMode};
pub use sizes::{compute_sizes, SizeSet, SourceDimensions, TargetSize};

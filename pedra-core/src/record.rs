//! Records of training metrics and the sinks they are written to.
//!
//! A [`Record`] is a set of named values produced by one training step. A
//! [`Recorder`] receives records; [`BufferedRecorder`] keeps them in memory
//! and [`NullRecorder`] discards them. Tensorboard output lives in the
//! `pedra-tensorboard` crate.
//!
//! ```rust
//! use pedra_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("opt_steps", 10.0);
//! record.insert("drone0/Loss", RecordValue::Scalar(0.25));
//! assert_eq!(record.get_scalar("drone0/Loss").unwrap(), 0.25);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;

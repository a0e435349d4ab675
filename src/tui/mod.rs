//! Terminal front end: recorder and viewer screens plus the error screen.
//!
//! Frames are painted by the library renderer into a `DisplayList`, which
//! [`painter::DisplayListView`] turns into terminal cells.

pub mod error;
pub mod painter;
pub mod recorder;
pub mod viewer;

pub use error::ErrorScreen;
pub use recorder::{RecorderStatus, RecorderTui, RecordingCommand};
pub use viewer::{ViewerCommand, ViewerTui};

//! Bounded queues of the synthesis pipeline.
//!
//! Labels enter through a [`LabelQueue`], become [`Model`](crate::Model)s in
//! the [`ModelQueue`] window, and leave as [`Frame`]s through a lock-free
//! SPSC ring read by the audio side.

mod frame;
mod label;
mod model;

pub use frame::{frame_channel, Frame, FrameConsumer, FrameProducer};
pub use label::{LabelQueue, LabelSender};
pub use model::ModelQueue;

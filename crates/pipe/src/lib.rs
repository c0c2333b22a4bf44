//! canvas-pipe - canvas command recording and replay
//!
//! This crate linearizes the operations issued against a 2D drawing surface
//! into a compact opcode stream and replays that stream against another
//! surface, possibly in another process, on another thread, or fanned out
//! over several tiles:
//! - [`encoder::Encoder`] - Recording surface that writes opcodes into blocks
//! - [`decoder::Decoder`] - Resumable playback state machine
//! - [`transport`] - Block transports (local, chunked, tiled, shared list)
//! - [`tables`] - Per-session object tables and the same-process handle registry
//! - [`heap`] - Shared bitmap heap with exclusive and copy-on-read readers
//! - [`canvas`] - Target surface trait and a recording surface for tests/tools
//! - [`opcode`] - Opcode set and word packing

#[macro_use]
mod macros;

pub mod canvas;
pub mod codec;
pub mod constants;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod heap;
pub mod objects;
pub mod opcode;
pub mod paint;
pub mod tables;
pub mod transport;
pub mod types;

pub use canvas::*;
pub use constants::*;
pub use decoder::{Decoder, PlaybackStatus};
pub use encoder::Encoder;
pub use error::*;
pub use heap::*;
pub use objects::*;
pub use paint::*;
pub use tables::HandleRegistry;
pub use transport::*;
pub use types::*;

pub use canvas_pipe_config::{HeapMode, PipeConfig, SessionFlags, TileConfig, TransportConfig};
pub use image::RgbaImage;

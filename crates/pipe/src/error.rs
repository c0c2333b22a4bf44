//! Error types for encoding, decoding and transport.

/// A malformed stream. Once returned, the rest of the session is unusable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unknown opcode {0:#04x}")]
    UnknownOp(u8),

    #[error("Unknown paint field {0:#04x}")]
    UnknownPaintField(u8),

    #[error("Invalid {kind} value {value}")]
    InvalidEnum { kind: &'static str, value: u32 },

    #[error("Reference to undefined {table} index {index}")]
    UndefinedIndex { table: &'static str, index: u32 },

    #[error("Out-of-order {table} definition: expected index {expected}, got {got}")]
    OutOfOrderDefine {
        table: &'static str,
        expected: u32,
        got: u32,
    },

    #[error("Object index {index} holds a {found}, expected a {expected}")]
    KindMismatch {
        index: u32,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unknown object factory '{0}'")]
    UnknownFactory(String),

    #[error("Factory '{name}' rejected its data: {reason}")]
    FactoryData { name: String, reason: String },

    #[error("Define op cross-process flag is {0} but the session disagrees")]
    ModeMismatch(bool),

    #[error("Same-process handle {0} is not registered")]
    UnknownHandle(u32),

    #[error("Stream carries same-process handles but no handle registry is attached")]
    NoHandleRegistry,

    #[error("Bitmap heap index {0} is missing")]
    HeapIndexMissing(u32),

    #[error("Stream uses the shared bitmap heap but no heap reader is attached")]
    NoHeap,

    #[error("Length field {0} exceeds the payload limit")]
    LengthOverflow(u64),

    #[error("Invalid UTF-8 in text payload")]
    InvalidUtf8,

    #[error("Bitmap payload of {len} bytes does not match {width}x{height}")]
    BitmapSize { width: u32, height: u32, len: usize },
}

/// Failure handing a finished block to its destination.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport is closed")]
    Closed,
}

/// Failure acquiring a shared bitmap heap handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    #[error("Exclusive heap handle is already held by another reader")]
    AlreadyClaimed,

    #[error("Heap was configured for {0:?} access")]
    WrongMode(canvas_pipe_config::HeapMode),
}

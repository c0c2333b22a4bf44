/// Version of the opcode set. Encoder and decoder must be built from the same one.
pub const PIPE_VERSION: u32 = 1;

/// Bytes per stream word. Every payload is padded to this.
pub const WORD_SIZE: usize = 4;

/// Bit position of the operation field in an opcode word.
pub const OP_SHIFT: u32 = 24;

/// Bit position of the flags field in an opcode word.
pub const FLAGS_SHIFT: u32 = 20;

/// Mask for the 4-bit flags field (after shifting).
pub const FLAGS_MASK: u32 = 0xF;

/// Largest value the 20-bit inline data field can carry.
pub const MAX_INLINE_DATA: u32 = (1 << FLAGS_SHIFT) - 1;

/// Bytes of one point on the wire.
pub const POINT_BYTES: usize = 2 * WORD_SIZE;

/// Object-table index meaning "no reference".
pub const NULL_INDEX: u32 = 0;

/// Upper bound for any single length field. Larger values are malformed.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

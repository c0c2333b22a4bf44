//! Word-level reading and writing of opcode payloads
//!
//! The stream is a sequence of little-endian 32-bit words. Variable-length
//! payloads (strings, byte blobs, u16 lists) are prefixed with a length word
//! and zero-padded to the next word boundary.

use crate::constants::{MAX_PAYLOAD_BYTES, WORD_SIZE};
use crate::error::DecodeError;
use crate::opcode::pack_op;
use crate::opcode::Op;
use crate::types::{FillType, Matrix, Path, PathVerb, Point, Rect, VerbTag};

/// Round a byte count up to whole words
#[inline]
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD_SIZE) * WORD_SIZE
}

/// Whether a count field of `count` items stays within the payload limit
#[inline]
pub fn count_fits(count: usize, bytes_per_item: usize) -> bool {
    count.saturating_mul(bytes_per_item.max(1)) <= MAX_PAYLOAD_BYTES
}

/// Growable buffer that payloads are assembled into
#[derive(Debug, Default, Clone)]
pub struct WordWriter {
    buf: Vec<u8>,
}

impl WordWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[inline]
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write an opcode word
    #[inline]
    pub fn write_op(&mut self, op: Op, flags: u32, data: u32) {
        self.write_u32(pack_op(op, flags, data));
    }

    #[inline]
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_f32s(&mut self, values: &[f32]) {
        self.buf.reserve(values.len() * WORD_SIZE);
        for value in values {
            self.write_f32(*value);
        }
    }

    pub fn write_point(&mut self, point: Point) {
        self.write_f32s(bytemuck::cast_slice(std::slice::from_ref(&point)));
    }

    /// Write a point list without its count
    pub fn write_points(&mut self, points: &[Point]) {
        self.write_f32s(bytemuck::cast_slice(points));
    }

    pub fn write_rect(&mut self, rect: &Rect) {
        self.write_f32s(&bytemuck::cast::<Rect, [f32; 4]>(*rect));
    }

    pub fn write_matrix(&mut self, matrix: &Matrix) {
        self.write_f32s(&bytemuck::cast::<Matrix, [f32; 6]>(*matrix));
    }

    /// Pad with zero bytes to the next word boundary
    fn pad(&mut self) {
        let padded = padded_len(self.buf.len());
        self.buf.resize(padded, 0);
    }

    /// Length-prefixed byte blob
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self.pad();
    }

    /// Length-prefixed UTF-8 string
    pub fn write_str(&mut self, text: &str) {
        self.write_bytes(text.as_bytes());
    }

    /// Length-prefixed u16 list
    pub fn write_u16s(&mut self, values: &[u16]) {
        self.write_u32(values.len() as u32);
        for value in values {
            self.buf.extend_from_slice(&value.to_le_bytes());
        }
        self.pad();
    }

    /// Fill type, verb count, then each verb tag followed by its points
    pub fn write_path(&mut self, path: &Path) {
        self.write_u32(path.fill_type.to_wire());
        self.write_u32(path.verbs.len() as u32);
        for verb in &path.verbs {
            self.write_u32(verb.tag().to_wire());
            self.write_points(&verb.points());
        }
    }
}

/// Why a read stopped
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Interrupt {
    /// The buffer ends inside the value being read
    NeedMoreData,
    /// The bytes can never form a valid value
    Malformed(DecodeError),
}

impl From<DecodeError> for Interrupt {
    fn from(error: DecodeError) -> Self {
        Interrupt::Malformed(error)
    }
}

pub(crate) type ReadResult<T> = Result<T, Interrupt>;

/// Cursor over a byte buffer that reads whole words
#[derive(Debug)]
pub(crate) struct WordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WordReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> ReadResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(Interrupt::NeedMoreData);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u32(&mut self) -> ReadResult<u32> {
        let bytes = self.take(WORD_SIZE)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u32s(&mut self, count: usize) -> ReadResult<Vec<u32>> {
        let bytes = self.take(count * WORD_SIZE)?;
        Ok(bytes
            .chunks_exact(WORD_SIZE)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect())
    }

    pub fn read_f32(&mut self) -> ReadResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f32s(&mut self, count: usize) -> ReadResult<Vec<f32>> {
        if self.remaining() < count * WORD_SIZE {
            return Err(Interrupt::NeedMoreData);
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_f32()?);
        }
        Ok(values)
    }

    /// Read a count word, rejecting counts whose payload would exceed the limit
    pub fn read_count(&mut self, bytes_per_item: usize) -> ReadResult<usize> {
        let count = self.read_u32()? as usize;
        if !count_fits(count, bytes_per_item) {
            return Err(DecodeError::LengthOverflow(count as u64).into());
        }
        Ok(count)
    }

    pub fn read_point(&mut self) -> ReadResult<Point> {
        Ok(Point::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_points(&mut self, count: usize) -> ReadResult<Vec<Point>> {
        let floats = self.read_f32s(count * 2)?;
        Ok(bytemuck::cast_slice::<f32, Point>(&floats).to_vec())
    }

    pub fn read_rect(&mut self) -> ReadResult<Rect> {
        let f = self.read_f32s(4)?;
        Ok(bytemuck::cast::<[f32; 4], Rect>([f[0], f[1], f[2], f[3]]))
    }

    pub fn read_matrix(&mut self) -> ReadResult<Matrix> {
        let f = self.read_f32s(6)?;
        Ok(bytemuck::cast::<[f32; 6], Matrix>([f[0], f[1], f[2], f[3], f[4], f[5]]))
    }

    pub fn read_bytes(&mut self) -> ReadResult<&'a [u8]> {
        let len = self.read_count(1)?;
        let padded = self.take(padded_len(len))?;
        Ok(&padded[..len])
    }

    pub fn read_string(&mut self) -> ReadResult<String> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8.into())
    }

    pub fn read_u16s(&mut self) -> ReadResult<Vec<u16>> {
        let count = self.read_count(2)?;
        let bytes = self.take(padded_len(count * 2))?;
        Ok(bytes[..count * 2]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    pub fn read_path(&mut self) -> ReadResult<Path> {
        let fill = self.read_u32()?;
        let fill_type = FillType::from_wire(fill).ok_or(DecodeError::InvalidEnum {
            kind: "fill type",
            value: fill,
        })?;
        let verb_count = self.read_count(WORD_SIZE)?;
        let mut verbs = Vec::with_capacity(verb_count.min(1024));
        for _ in 0..verb_count {
            let raw = self.read_u32()?;
            let tag = VerbTag::from_wire(raw).ok_or(DecodeError::InvalidEnum {
                kind: "path verb",
                value: raw,
            })?;
            let verb = match tag {
                VerbTag::Move => PathVerb::MoveTo(self.read_point()?),
                VerbTag::Line => PathVerb::LineTo(self.read_point()?),
                VerbTag::Quad => PathVerb::QuadTo(self.read_point()?, self.read_point()?),
                VerbTag::Cubic => PathVerb::CubicTo(
                    self.read_point()?,
                    self.read_point()?,
                    self.read_point()?,
                ),
                VerbTag::Close => PathVerb::Close,
            };
            verbs.push(verb);
        }
        Ok(Path { fill_type, verbs })
    }
}

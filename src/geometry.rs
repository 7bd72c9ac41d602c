//! Binary geometry payload decoding.
//!
//! Mesh and geometry content arrives as one buffer holding a run of
//! little-endian entries. Each entry is a fixed header (numeric id,
//! bounding box, type tag), an extended sub-header for non-box types, and
//! a length-prefixed payload. [`decode_geometry_batch`] splits a buffer
//! into [`GeometryDescriptor`]s with correctly sliced payloads;
//! [`GeometryFactory`] turns one descriptor into the [`GeometryInfo`] the
//! sink consumes.
//!
//! All reads go through [`ByteCursor`], which bounds-checks every access
//! instead of trusting offsets computed elsewhere.

use crate::error::{SceneError, SceneResult};

/// Bounds-checked little-endian reader over a byte slice.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteCursor<'a> {
    /// Creates a cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Whether the cursor consumed the whole buffer.
    pub fn is_at_end(&self) -> bool {
        self.offset == self.data.len()
    }

    fn take(&mut self, wanted: usize) -> SceneResult<&'a [u8]> {
        if wanted > self.remaining() {
            return Err(SceneError::BufferOverrun {
                offset: self.offset,
                wanted,
                len: self.data.len(),
            });
        }
        let slice = &self.data[self.offset..self.offset + wanted];
        self.offset += wanted;
        Ok(slice)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> SceneResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian u16.
    pub fn read_u16(&mut self) -> SceneResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a little-endian u32.
    pub fn read_u32(&mut self) -> SceneResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a little-endian f32.
    pub fn read_f32(&mut self) -> SceneResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> SceneResult<&'a [u8]> {
        self.take(len)
    }
}

/// Geometry type tag of a batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    /// Bounding box only, no detailed content.
    Box,
    /// Triangle mesh.
    Mesh,
    /// Line geometry.
    Lines,
    /// Point geometry.
    Points,
    /// Unrecognized tag, still decoded as an extended entry.
    Other(u16),
}

impl GeometryKind {
    fn from_tag(tag: u16) -> Self {
        match tag {
            1 => GeometryKind::Box,
            2 => GeometryKind::Mesh,
            3 => GeometryKind::Lines,
            4 => GeometryKind::Points,
            other => GeometryKind::Other(other),
        }
    }
}

/// Extended sub-header carried by non-box entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryDetail {
    pub flags: u8,
    pub quality: f32,
    pub point_count: u32,
    pub element_count: u32,
    /// Payload encoding tag, interpreted by the factory.
    pub encoding: u8,
}

/// One decoded batch entry: header fields plus its own slice of the
/// payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescriptor {
    /// Wire id, stringified for use as a queue key.
    pub id: String,
    /// Min/max corners: `[min_x, min_y, min_z, max_x, max_y, max_z]`.
    pub bounding_box: [f32; 6],
    pub kind: GeometryKind,
    /// Present for every non-box entry.
    pub detail: Option<GeometryDetail>,
    /// Entry payload. May be empty when the content is delivered in a
    /// later message.
    pub buffer: Vec<u8>,
}

/// Splits a binary batch into descriptors.
///
/// The cursor walks entry by entry; a truncated entry anywhere rejects the
/// whole buffer, since the remaining offsets cannot be trusted after a
/// framing error.
pub fn decode_geometry_batch(data: &[u8]) -> SceneResult<Vec<GeometryDescriptor>> {
    let mut cursor = ByteCursor::new(data);
    let mut entries = Vec::new();

    while !cursor.is_at_end() {
        let id = cursor.read_u32()?;
        let mut bounding_box = [0.0f32; 6];
        for value in &mut bounding_box {
            *value = cursor.read_f32()?;
        }
        let kind = GeometryKind::from_tag(cursor.read_u16()?);

        let detail = if kind == GeometryKind::Box {
            None
        } else {
            Some(GeometryDetail {
                flags: cursor.read_u8()?,
                quality: cursor.read_f32()?,
                point_count: cursor.read_u32()?,
                element_count: cursor.read_u32()?,
                encoding: cursor.read_u8()?,
            })
        };

        let len = cursor.read_u32()? as usize;
        let buffer = cursor.read_bytes(len)?.to_vec();

        entries.push(GeometryDescriptor {
            id: id.to_string(),
            bounding_box,
            kind,
            detail,
            buffer,
        });
    }

    Ok(entries)
}

/// Decoded geometry handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryInfo {
    pub id: String,
    pub bounding_box: [f32; 6],
    pub data: GeometryData,
}

/// Content of a decoded geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryData {
    /// Box-only geometry: rendered from its bounding volume.
    Box,
    /// Detailed content in its wire encoding.
    Encoded {
        kind: GeometryKind,
        encoding: u8,
        quality: f32,
        point_count: u32,
        element_count: u32,
        bytes: Vec<u8>,
    },
}

impl GeometryInfo {
    /// Copies an encoding-0 payload out as f32 values.
    ///
    /// Encoding 0 is an unpacked float stream in target byte order; other
    /// encodings need their own decompressor and return `None` here, as
    /// does a byte count that is not a multiple of four.
    pub fn float_data(&self) -> Option<Vec<f32>> {
        match &self.data {
            GeometryData::Encoded {
                encoding: 0, bytes, ..
            } if bytes.len() % 4 == 0 => Some(bytemuck::pod_collect_to_vec(bytes)),
            _ => None,
        }
    }
}

/// Codec turning a [`GeometryDescriptor`] into sink-ready [`GeometryInfo`].
#[derive(Debug, Default)]
pub struct GeometryFactory;

impl GeometryFactory {
    /// Creates the factory.
    pub fn new() -> Self {
        Self
    }

    /// Decodes one descriptor.
    ///
    /// Returns `None` for a non-box entry with an empty buffer: there is
    /// no content to decode, and the caller reports it.
    pub fn geometry_info(&self, descriptor: &GeometryDescriptor) -> Option<GeometryInfo> {
        if descriptor.kind == GeometryKind::Box {
            return Some(GeometryInfo {
                id: descriptor.id.clone(),
                bounding_box: descriptor.bounding_box,
                data: GeometryData::Box,
            });
        }

        if descriptor.buffer.is_empty() {
            return None;
        }

        let detail = descriptor.detail.unwrap_or(GeometryDetail {
            flags: 0,
            quality: 0.0,
            point_count: 0,
            element_count: 0,
            encoding: 0,
        });

        Some(GeometryInfo {
            id: descriptor.id.clone(),
            bounding_box: descriptor.bounding_box,
            data: GeometryData::Encoded {
                kind: descriptor.kind,
                encoding: detail.encoding,
                quality: detail.quality,
                point_count: detail.point_count,
                element_count: detail.element_count,
                bytes: descriptor.buffer.clone(),
            },
        })
    }
}

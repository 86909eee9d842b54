use super::error::EncodingError;
use super::field::{read_pointer, to_u32, write_u32, Primitive, SEGMENT_POINTER_SIZE};
use super::value::{Record, Value};
use crate::crypto;
use crate::types::primitives::Hash;
use std::collections::HashSet;
use std::sync::Arc;

/// Segment pointers are 32-bit, so no record or buffer may outgrow them.
const MAX_RECORD_SIZE: usize = u32::MAX as usize;

/// Type of a single field: a primitive, or a nested record layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    Record(Arc<RecordType>),
}

impl FieldType {
    /// Width of the segment this type occupies inside its parent record.
    ///
    /// Fixed nested records are laid out in place; records containing a
    /// string anywhere in their closure are stored out of line behind an
    /// 8-byte `(offset, length)` pointer.
    pub fn segment_size(&self) -> usize {
        match self {
            FieldType::Primitive(p) => p.size(),
            FieldType::Record(r) if r.is_fixed() => r.size(),
            FieldType::Record(_) => SEGMENT_POINTER_SIZE,
        }
    }

    fn is_fixed(&self) -> bool {
        match self {
            FieldType::Primitive(p) => *p != Primitive::String,
            FieldType::Record(r) => r.is_fixed(),
        }
    }
}

impl From<Primitive> for FieldType {
    fn from(p: Primitive) -> Self {
        FieldType::Primitive(p)
    }
}

impl From<RecordType> for FieldType {
    fn from(r: RecordType) -> Self {
        FieldType::Record(Arc::new(r))
    }
}

impl From<Arc<RecordType>> for FieldType {
    fn from(r: Arc<RecordType>) -> Self {
        FieldType::Record(r)
    }
}

/// Placement of a field: its type and half-open byte range `[from, to)`
/// relative to the start of the enclosing record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub ty: FieldType,
    pub size: usize,
    pub from: usize,
    pub to: usize,
}

impl FieldDescriptor {
    /// Descriptor for `ty` starting at `from`, with `size`/`to` derived from the type.
    pub fn new(ty: impl Into<FieldType>, from: usize) -> Self {
        let ty = ty.into();
        let size = ty.segment_size();
        Self {
            ty,
            size,
            from,
            to: from + size,
        }
    }
}

/// A validated record layout.
///
/// Fields are kept sorted by offset; serialization visits them in that
/// order, which fixes where each string lands in the trailing heap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordType {
    size: usize,
    fields: Vec<(String, FieldDescriptor)>,
    fixed: bool,
}

impl RecordType {
    /// Build a layout, checking that every descriptor has `to - from == size`,
    /// matches its type's width, lies inside the record and does not overlap
    /// another field.
    pub fn new<I, S>(size: usize, fields: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = (S, FieldDescriptor)>,
        S: Into<String>,
    {
        let mut fields: Vec<(String, FieldDescriptor)> =
            fields.into_iter().map(|(n, f)| (n.into(), f)).collect();
        fields.sort_by_key(|(_, f)| f.from);

        if size > MAX_RECORD_SIZE {
            return Err(EncodingError::InvalidLayout {
                reason: format!("record size {} exceeds {}", size, MAX_RECORD_SIZE),
            });
        }

        let mut names = HashSet::new();
        let mut cursor = 0usize;
        for (name, field) in &fields {
            let invalid = |reason: String| EncodingError::InvalidLayout {
                reason: format!("field {:?}: {}", name, reason),
            };
            if name.is_empty() {
                return Err(invalid("empty field name".to_string()));
            }
            if !names.insert(name.as_str()) {
                return Err(invalid("declared twice".to_string()));
            }
            if field.to < field.from || field.to - field.from != field.size {
                return Err(invalid(format!(
                    "range [{}, {}) does not span {} bytes",
                    field.from, field.to, field.size
                )));
            }
            if field.size != field.ty.segment_size() {
                return Err(invalid(format!(
                    "size {} does not match type width {}",
                    field.size,
                    field.ty.segment_size()
                )));
            }
            if field.to > size {
                return Err(invalid(format!(
                    "ends at {} past record size {}",
                    field.to, size
                )));
            }
            if field.from < cursor {
                return Err(invalid(format!("overlaps the previous field ending at {}", cursor)));
            }
            cursor = field.to;
        }

        let fixed = fields.iter().all(|(_, f)| f.ty.is_fixed());
        Ok(Self {
            size,
            fields,
            fixed,
        })
    }

    /// Build a packed layout: fields placed back to back in the given order.
    pub fn packed<I, S, T>(fields: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<FieldType>,
    {
        let mut offset = 0;
        let mut descriptors = Vec::new();
        for (name, ty) in fields {
            let field = FieldDescriptor::new(ty, offset);
            offset = field.to;
            descriptors.push((name.into(), field));
        }
        Self::new(offset, descriptors)
    }

    /// Total fixed byte length of the record (excluding any heap data).
    pub fn size(&self) -> usize {
        self.size
    }

    /// True when no field anywhere in the closure is variable-length.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Serialize `data` into a fresh buffer.
    pub fn serialize(&self, data: &Record) -> Result<Vec<u8>, EncodingError> {
        let mut buffer = Vec::with_capacity(self.size);
        serialize_into(&mut buffer, 0, data, self)?;
        Ok(buffer)
    }

    /// Decode a record that starts at offset 0 of `buffer`.
    pub fn deserialize(&self, buffer: &[u8]) -> Result<Record, EncodingError> {
        deserialize_from(buffer, 0, self)
    }

    /// SHA-256 of the serialized record.
    pub fn hash(&self, data: &Record) -> Result<Hash, EncodingError> {
        Ok(crypto::hash(&self.serialize(data)?))
    }
}

/// Serialize `data` with layout `ty` at `shift` inside `buffer`.
///
/// Zero-fills `ty.size()` bytes at `shift` (growing the buffer if needed),
/// then writes every field present in `data`. Absent fields stay zero.
/// Strings and variable nested records are appended to the end of the
/// buffer. On error the buffer contents are unspecified and must be
/// discarded.
pub fn serialize_into(
    buffer: &mut Vec<u8>,
    shift: usize,
    data: &Record,
    ty: &RecordType,
) -> Result<(), EncodingError> {
    if let Some(name) = data.keys().find(|k| ty.field(k).is_none()) {
        return Err(EncodingError::UnknownField { name: name.clone() });
    }

    let end = shift
        .checked_add(ty.size)
        .filter(|end| *end <= MAX_RECORD_SIZE)
        .ok_or(EncodingError::BufferOverflow {
            value: shift.saturating_add(ty.size),
        })?;
    if buffer.len() < end {
        buffer.resize(end, 0);
    }
    buffer[shift..end].fill(0);

    for (name, field) in &ty.fields {
        if let Some(value) = data.get(name) {
            write_field(buffer, shift, value, field).map_err(|e| e.in_field(name))?;
        }
    }
    Ok(())
}

fn write_field(
    buffer: &mut Vec<u8>,
    shift: usize,
    value: &Value,
    field: &FieldDescriptor,
) -> Result<(), EncodingError> {
    let (from, to) = (shift + field.from, shift + field.to);
    let nested = match &field.ty {
        FieldType::Primitive(p) => return p.encode(value, buffer, from, to),
        FieldType::Record(nested) => nested,
    };
    let inner = value.as_record().ok_or(EncodingError::TypeMismatch {
        kind: "record",
        expected: "a record",
        got: value.kind_name(),
    })?;

    if nested.is_fixed() {
        return serialize_into(buffer, from, inner, nested);
    }

    let start = buffer.len();
    write_u32(buffer, from, to_u32(start)?);
    serialize_into(buffer, start, inner, nested)?;
    let length = buffer.len() - start;
    write_u32(buffer, from + 4, to_u32(length)?);
    Ok(())
}

/// Decode a record with layout `ty` located at `shift` inside `buffer`.
///
/// Every field of the layout is returned. Offsets of strings and variable
/// nested records are absolute positions in `buffer`.
pub fn deserialize_from(
    buffer: &[u8],
    shift: usize,
    ty: &RecordType,
) -> Result<Record, EncodingError> {
    let end = shift.checked_add(ty.size).unwrap_or(usize::MAX);
    if end > buffer.len() {
        return Err(EncodingError::Truncated {
            offset: shift,
            needed: ty.size,
            buffer_len: buffer.len(),
        });
    }

    let mut record = Record::new();
    for (name, field) in &ty.fields {
        let value = read_field(buffer, shift, field).map_err(|e| e.in_field(name))?;
        record.insert(name.clone(), value);
    }
    Ok(record)
}

fn read_field(buffer: &[u8], shift: usize, field: &FieldDescriptor) -> Result<Value, EncodingError> {
    let (from, to) = (shift + field.from, shift + field.to);
    match &field.ty {
        FieldType::Primitive(p) => p.decode(buffer, from, to),
        FieldType::Record(nested) if nested.is_fixed() => {
            deserialize_from(buffer, from, nested).map(Value::Record)
        }
        FieldType::Record(nested) => {
            let (offset, length) = read_pointer(&buffer[from..to]);
            let region_end = offset
                .checked_add(length)
                .filter(|end| *end <= buffer.len() && length >= nested.size())
                .ok_or(EncodingError::Truncated {
                    offset,
                    needed: length.max(nested.size()),
                    buffer_len: buffer.len(),
                })?;
            deserialize_from(&buffer[..region_end], offset, nested).map(Value::Record)
        }
    }
}

//! Stata `.dta` writer, release 117, little-endian.
//!
//! Layout:
//! - `<header>` with K (u16), N (u32), dataset label and timestamp
//! - `<map>` of 14 u64 section offsets, patched once the body is written
//! - variable types, names, sort list, formats, value-label names, labels
//! - `<data>` rows, then empty `<strls>` and `<value_labels>`

use chrono::{NaiveDate, NaiveDateTime};

use super::DtaError;

/// Longest fixed-width string Stata stores inline.
pub const MAX_STR_WIDTH: usize = 2045;

const NAME_FIELD: usize = 33;
const FORMAT_FIELD: usize = 49;
const LABEL_FIELD: usize = 81;
const MAX_VARIABLES: usize = 32_767;

const TYPE_DOUBLE: u16 = 65526;
const TYPE_LONG: u16 = 65528;

/// Stata's system missing `.` for doubles.
pub const MISSING_DOUBLE: u64 = 0x7FE0_0000_0000_0000;
/// Stata's system missing `.` for longs.
pub const MISSING_LONG: i32 = 2_147_483_621;

/// Column payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Stored as `long` days since 1960-01-01, format `%td`.
    Date(Vec<Option<NaiveDate>>),
    Double(Vec<Option<f64>>),
    /// Fixed-width `strN`; every value must be ASCII and at most `width` bytes.
    Str { width: usize, values: Vec<String> },
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Date(v) => v.len(),
            ColumnData::Double(v) => v.len(),
            ColumnData::Str { values, .. } => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn type_code(&self) -> u16 {
        match self {
            ColumnData::Date(_) => TYPE_LONG,
            ColumnData::Double(_) => TYPE_DOUBLE,
            ColumnData::Str { width, .. } => *width as u16,
        }
    }

    fn display_format(&self) -> String {
        match self {
            ColumnData::Date(_) => "%td".to_string(),
            ColumnData::Double(_) => "%10.0g".to_string(),
            ColumnData::Str { width, .. } => format!("%{width}s"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DtaColumn {
    pub name: String,
    pub label: String,
    pub data: ColumnData,
}

#[derive(Debug, Clone)]
pub struct DtaDataset {
    pub label: String,
    pub timestamp: NaiveDateTime,
    pub columns: Vec<DtaColumn>,
}

impl DtaDataset {
    pub fn n_obs(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }
}

/// Stata `%td` value: days since 1960-01-01.
pub fn stata_days(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1960, 1, 1).unwrap_or(NaiveDate::MIN);
    (date - epoch).num_days() as i32
}

/// Cursor-style little-endian output buffer.
struct DtaBuffer {
    data: Vec<u8>,
}

impl DtaBuffer {
    fn new() -> Self {
        Self { data: Vec::new() }
    }

    #[inline]
    fn pos(&self) -> usize {
        self.data.len()
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    fn put_u16(&mut self, v: u16) {
        self.put_bytes(&v.to_le_bytes());
    }

    fn put_u32(&mut self, v: u32) {
        self.put_bytes(&v.to_le_bytes());
    }

    fn put_i32(&mut self, v: i32) {
        self.put_bytes(&v.to_le_bytes());
    }

    fn put_u64(&mut self, v: u64) {
        self.put_bytes(&v.to_le_bytes());
    }

    fn put_f64(&mut self, v: f64) {
        self.put_bytes(&v.to_le_bytes());
    }

    /// NUL-padded fixed-width field; `s` must already fit.
    fn put_fixed(&mut self, s: &str, width: usize) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(width);
        self.put_bytes(&bytes[..n]);
        self.data.resize(self.data.len() + (width - n), 0);
    }

    fn patch_u64(&mut self, at: usize, v: u64) {
        self.data[at..at + 8].copy_from_slice(&v.to_le_bytes());
    }

    fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

fn validate(ds: &DtaDataset) -> Result<(), DtaError> {
    if ds.columns.is_empty() {
        return Err(DtaError::NoColumns);
    }
    if ds.columns.len() > MAX_VARIABLES {
        return Err(DtaError::TooManyVariables(ds.columns.len()));
    }
    let n = ds.n_obs();
    if u32::try_from(n).is_err() {
        return Err(DtaError::TooManyObservations(n));
    }
    if !ds.label.is_ascii() || ds.label.len() > 80 {
        return Err(DtaError::InvalidText(ds.label.clone()));
    }
    for col in &ds.columns {
        if col.data.len() != n {
            return Err(DtaError::LengthMismatch {
                column: col.name.clone(),
            });
        }
        if col.name.is_empty() || !col.name.is_ascii() || col.name.len() >= NAME_FIELD {
            return Err(DtaError::InvalidText(col.name.clone()));
        }
        if !col.label.is_ascii() || col.label.len() >= LABEL_FIELD {
            return Err(DtaError::InvalidText(col.label.clone()));
        }
        if let ColumnData::Str { width, values } = &col.data {
            if *width == 0 || *width > MAX_STR_WIDTH {
                return Err(DtaError::ValueTooLong {
                    column: col.name.clone(),
                });
            }
            if values.iter().any(|v| !v.is_ascii() || v.len() > *width) {
                return Err(DtaError::ValueTooLong {
                    column: col.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Serialize a dataset to `.dta` bytes.
pub fn encode(ds: &DtaDataset) -> Result<Vec<u8>, DtaError> {
    validate(ds)?;
    let k = ds.columns.len();
    let n = ds.n_obs();
    let mut buf = DtaBuffer::new();

    buf.put_bytes(b"<stata_dta><header>");
    buf.put_bytes(b"<release>117</release>");
    buf.put_bytes(b"<byteorder>LSF</byteorder>");
    buf.put_bytes(b"<K>");
    buf.put_u16(k as u16);
    buf.put_bytes(b"</K><N>");
    buf.put_u32(n as u32);
    buf.put_bytes(b"</N><label>");
    buf.put_u8(ds.label.len() as u8);
    buf.put_bytes(ds.label.as_bytes());
    buf.put_bytes(b"</label><timestamp>");
    let stamp = ds.timestamp.format("%d %b %Y %H:%M").to_string();
    buf.put_u8(stamp.len() as u8);
    buf.put_bytes(stamp.as_bytes());
    buf.put_bytes(b"</timestamp></header>");

    let mut offsets = [0u64; 14];
    offsets[1] = buf.pos() as u64;
    buf.put_bytes(b"<map>");
    let map_slots = buf.pos();
    for _ in 0..offsets.len() {
        buf.put_u64(0);
    }
    buf.put_bytes(b"</map>");

    offsets[2] = buf.pos() as u64;
    buf.put_bytes(b"<variable_types>");
    for col in &ds.columns {
        buf.put_u16(col.data.type_code());
    }
    buf.put_bytes(b"</variable_types>");

    offsets[3] = buf.pos() as u64;
    buf.put_bytes(b"<varnames>");
    for col in &ds.columns {
        buf.put_fixed(&col.name, NAME_FIELD);
    }
    buf.put_bytes(b"</varnames>");

    offsets[4] = buf.pos() as u64;
    buf.put_bytes(b"<sortlist>");
    for _ in 0..=k {
        buf.put_u16(0);
    }
    buf.put_bytes(b"</sortlist>");

    offsets[5] = buf.pos() as u64;
    buf.put_bytes(b"<formats>");
    for col in &ds.columns {
        buf.put_fixed(&col.data.display_format(), FORMAT_FIELD);
    }
    buf.put_bytes(b"</formats>");

    offsets[6] = buf.pos() as u64;
    buf.put_bytes(b"<value_label_names>");
    for _ in 0..k {
        buf.put_fixed("", NAME_FIELD);
    }
    buf.put_bytes(b"</value_label_names>");

    offsets[7] = buf.pos() as u64;
    buf.put_bytes(b"<variable_labels>");
    for col in &ds.columns {
        buf.put_fixed(&col.label, LABEL_FIELD);
    }
    buf.put_bytes(b"</variable_labels>");

    offsets[8] = buf.pos() as u64;
    buf.put_bytes(b"<characteristics></characteristics>");

    offsets[9] = buf.pos() as u64;
    buf.put_bytes(b"<data>");
    for row in 0..n {
        for col in &ds.columns {
            match &col.data {
                ColumnData::Date(v) => buf.put_i32(v[row].map(stata_days).unwrap_or(MISSING_LONG)),
                ColumnData::Double(v) => match v[row] {
                    Some(x) if x.is_finite() => buf.put_f64(x),
                    _ => buf.put_u64(MISSING_DOUBLE),
                },
                ColumnData::Str { width, values } => buf.put_fixed(&values[row], *width),
            }
        }
    }
    buf.put_bytes(b"</data>");

    offsets[10] = buf.pos() as u64;
    buf.put_bytes(b"<strls></strls>");
    offsets[11] = buf.pos() as u64;
    buf.put_bytes(b"<value_labels></value_labels>");
    offsets[12] = buf.pos() as u64;
    buf.put_bytes(b"</stata_dta>");
    offsets[13] = buf.pos() as u64;

    for (i, offset) in offsets.iter().enumerate() {
        buf.patch_u64(map_slots + 8 * i, *offset);
    }
    Ok(buf.into_inner())
}

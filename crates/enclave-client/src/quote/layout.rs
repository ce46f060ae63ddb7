// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Declarative layout of the fixed SGX EPID quote header (`sgx_quote_t`, version 2)
//!
//! All integers are little-endian. Everything past [`QUOTE_HEADER_LEN`] is opaque
//! signature material.

use super::error::ParseError;

/// Length of the fixed quote header
pub const QUOTE_HEADER_LEN: usize = 432;

/// Identifies a field of the quote header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Field {
    Version,
    SignType,
    Gid,
    QeSvn,
    PceSvn,
    Xeid,
    Basename,
    CpuSvn,
    MiscSelect,
    Reserved1,
    Flags,
    Xfrm,
    MrEnclave,
    Reserved2,
    MrSigner,
    Reserved3,
    IsvProdId,
    IsvSvn,
    Reserved4,
    ReportData,
}

impl Field {
    /// The field name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Field::Version => "version",
            Field::SignType => "sign_type",
            Field::Gid => "gid",
            Field::QeSvn => "qe_svn",
            Field::PceSvn => "pce_svn",
            Field::Xeid => "xeid",
            Field::Basename => "basename",
            Field::CpuSvn => "cpu_svn",
            Field::MiscSelect => "misc_select",
            Field::Reserved1 => "reserved1",
            Field::Flags => "flags",
            Field::Xfrm => "xfrm",
            Field::MrEnclave => "mrenclave",
            Field::Reserved2 => "reserved2",
            Field::MrSigner => "mrsigner",
            Field::Reserved3 => "reserved3",
            Field::IsvProdId => "isv_prod_id",
            Field::IsvSvn => "isv_svn",
            Field::Reserved4 => "reserved4",
            Field::ReportData => "report_data",
        }
    }
}

/// How the bytes of a field are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// little-endian unsigned integer of `width` bytes
    Int,
    /// opaque fixed-length bytes
    Bytes,
    /// must be all zero
    Reserved,
}

/// One entry of the layout table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// the field
    pub field: Field,
    /// byte offset from the start of the quote
    pub offset: usize,
    /// width in bytes
    pub width: usize,
    /// interpretation
    pub kind: FieldKind,
}

const fn spec(field: Field, offset: usize, width: usize, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        field,
        offset,
        width,
        kind,
    }
}

/// The quote header, in byte order
pub const QUOTE_HEADER_LAYOUT: [FieldSpec; 20] = [
    spec(Field::Version, 0, 2, FieldKind::Int),
    spec(Field::SignType, 2, 2, FieldKind::Int),
    spec(Field::Gid, 4, 4, FieldKind::Int),
    spec(Field::QeSvn, 8, 2, FieldKind::Int),
    spec(Field::PceSvn, 10, 2, FieldKind::Int),
    spec(Field::Xeid, 12, 4, FieldKind::Reserved),
    spec(Field::Basename, 16, 32, FieldKind::Bytes),
    spec(Field::CpuSvn, 48, 16, FieldKind::Bytes),
    spec(Field::MiscSelect, 64, 4, FieldKind::Int),
    spec(Field::Reserved1, 68, 28, FieldKind::Reserved),
    spec(Field::Flags, 96, 8, FieldKind::Int),
    spec(Field::Xfrm, 104, 8, FieldKind::Int),
    spec(Field::MrEnclave, 112, 32, FieldKind::Bytes),
    spec(Field::Reserved2, 144, 32, FieldKind::Reserved),
    spec(Field::MrSigner, 176, 32, FieldKind::Bytes),
    spec(Field::Reserved3, 208, 96, FieldKind::Reserved),
    spec(Field::IsvProdId, 304, 2, FieldKind::Int),
    spec(Field::IsvSvn, 306, 2, FieldKind::Int),
    spec(Field::Reserved4, 308, 60, FieldKind::Reserved),
    spec(Field::ReportData, 368, 64, FieldKind::Bytes),
];

/// A decoded field value, borrowing from the input for byte fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// an integer field
    Int(u64),
    /// a byte field
    Bytes(&'a [u8]),
    /// a reserved field (always zero)
    Zero,
}

impl FieldSpec {
    /// Decode this field from `header`, bounds-checked against the declared width.
    pub fn decode<'a>(&self, header: &'a [u8]) -> Result<FieldValue<'a>, ParseError> {
        let raw = self
            .offset
            .checked_add(self.width)
            .and_then(|end| header.get(self.offset..end))
            .ok_or(ParseError::Truncated {
                expected: self.offset.saturating_add(self.width),
                actual: header.len(),
            })?;

        match self.kind {
            FieldKind::Int => {
                let mut buf = [0u8; 8];
                buf.get_mut(..raw.len())
                    .ok_or_else(|| ParseError::out_of_range(self.field.name(), "integer width"))?
                    .copy_from_slice(raw);
                Ok(FieldValue::Int(u64::from_le_bytes(buf)))
            }
            FieldKind::Bytes => Ok(FieldValue::Bytes(raw)),
            FieldKind::Reserved => {
                if raw.iter().all(|b| *b == 0) {
                    Ok(FieldValue::Zero)
                } else {
                    Err(ParseError::out_of_range(
                        self.field.name(),
                        hex::encode(raw),
                    ))
                }
            }
        }
    }

    /// Encode `value` into its byte range of `header`.
    ///
    /// Reserved fields are zero-filled regardless of `value`.
    pub fn encode(&self, header: &mut [u8; QUOTE_HEADER_LEN], value: FieldValue<'_>) {
        let dst = &mut header[self.offset..self.offset + self.width];
        match (self.kind, value) {
            (FieldKind::Int, FieldValue::Int(v)) => {
                dst.copy_from_slice(&v.to_le_bytes()[..self.width]);
            }
            (FieldKind::Bytes, FieldValue::Bytes(bytes)) => dst.copy_from_slice(bytes),
            _ => dst.fill(0),
        }
    }
}

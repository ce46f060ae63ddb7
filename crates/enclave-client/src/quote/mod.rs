// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Parse SGX EPID quotes

pub mod error;
pub mod layout;

use self::{
    error::ParseError,
    layout::{Field, FieldValue, QUOTE_HEADER_LAYOUT, QUOTE_HEADER_LEN},
};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter};
use tracing::trace;

/// The `flags` bit marking a debug enclave
pub const DEBUG_FLAG: u64 = 1 << 7;

/// Supported `sgx_quote_t` versions
pub const SUPPORTED_VERSIONS: [u16; 2] = [1, 2];

const SIGN_TYPE_UNLINKABLE: u16 = 0;
const SIGN_TYPE_LINKABLE: u16 = 1;

/// A parsed quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// quote structure version
    pub version: u16,
    /// EPID signature type, 0 unlinkable, 1 linkable
    pub sign_type: u16,
    /// EPID group id
    pub gid: u32,
    /// quoting enclave security version
    pub qe_svn: u16,
    /// provisioning certification enclave security version
    pub pce_svn: u16,
    /// basename used for linkable signatures
    pub basename: [u8; 32],
    /// CPU security version
    pub cpu_svn: [u8; 16],
    /// misc select bits of the enclave
    pub misc_select: u32,
    /// enclave attribute flags
    pub flags: u64,
    /// enclave XSAVE feature mask
    pub xfrm: u64,
    /// enclave code identity
    pub mrenclave: [u8; 32],
    /// enclave signer identity
    pub mrsigner: [u8; 32],
    /// product id
    pub isv_prod_id: u16,
    /// enclave security version
    pub isv_svn: u16,
    /// application data bound into the quote
    pub report_data: [u8; 64],
    /// trailing signature bytes, never interpreted
    pub signature: Vec<u8>,
}

impl Quote {
    fn zeroed() -> Self {
        Self {
            version: 0,
            sign_type: 0,
            gid: 0,
            qe_svn: 0,
            pce_svn: 0,
            basename: [0; 32],
            cpu_svn: [0; 16],
            misc_select: 0,
            flags: 0,
            xfrm: 0,
            mrenclave: [0; 32],
            mrsigner: [0; 32],
            isv_prod_id: 0,
            isv_svn: 0,
            report_data: [0; 64],
            signature: Vec::new(),
        }
    }

    /// Parse a quote from untrusted bytes.
    ///
    /// The slice must hold at least the fixed header; anything beyond it is
    /// taken as the signature.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < QUOTE_HEADER_LEN {
            return Err(ParseError::Truncated {
                expected: QUOTE_HEADER_LEN,
                actual: bytes.len(),
            });
        }
        let (header, signature) = bytes.split_at(QUOTE_HEADER_LEN);

        let mut quote = Self::zeroed();
        for spec in QUOTE_HEADER_LAYOUT.iter() {
            let value = spec.decode(header)?;
            quote.set(spec.field, value)?;
        }

        if !SUPPORTED_VERSIONS.contains(&quote.version) {
            return Err(ParseError::out_of_range("version", quote.version));
        }
        if quote.sign_type != SIGN_TYPE_UNLINKABLE && quote.sign_type != SIGN_TYPE_LINKABLE {
            return Err(ParseError::out_of_range("sign_type", quote.sign_type));
        }

        quote.signature = signature.to_vec();
        trace!(
            version = quote.version,
            signature_len = quote.signature.len(),
            "parsed quote"
        );
        Ok(quote)
    }

    fn set(&mut self, field: Field, value: FieldValue<'_>) -> Result<(), ParseError> {
        fn int<T: TryFrom<u64>>(field: Field, value: FieldValue<'_>) -> Result<T, ParseError> {
            match value {
                FieldValue::Int(v) => {
                    T::try_from(v).map_err(|_| ParseError::out_of_range(field.name(), v))
                }
                _ => Err(ParseError::out_of_range(field.name(), "expected integer")),
            }
        }
        fn bytes<const N: usize>(
            field: Field,
            value: FieldValue<'_>,
        ) -> Result<[u8; N], ParseError> {
            match value {
                FieldValue::Bytes(b) => b
                    .try_into()
                    .map_err(|_| ParseError::out_of_range(field.name(), b.len())),
                _ => Err(ParseError::out_of_range(field.name(), "expected bytes")),
            }
        }

        match field {
            Field::Version => self.version = int(field, value)?,
            Field::SignType => self.sign_type = int(field, value)?,
            Field::Gid => self.gid = int(field, value)?,
            Field::QeSvn => self.qe_svn = int(field, value)?,
            Field::PceSvn => self.pce_svn = int(field, value)?,
            Field::Basename => self.basename = bytes(field, value)?,
            Field::CpuSvn => self.cpu_svn = bytes(field, value)?,
            Field::MiscSelect => self.misc_select = int(field, value)?,
            Field::Flags => self.flags = int(field, value)?,
            Field::Xfrm => self.xfrm = int(field, value)?,
            Field::MrEnclave => self.mrenclave = bytes(field, value)?,
            Field::MrSigner => self.mrsigner = bytes(field, value)?,
            Field::IsvProdId => self.isv_prod_id = int(field, value)?,
            Field::IsvSvn => self.isv_svn = int(field, value)?,
            Field::ReportData => self.report_data = bytes(field, value)?,
            Field::Xeid
            | Field::Reserved1
            | Field::Reserved2
            | Field::Reserved3
            | Field::Reserved4 => {}
        }
        Ok(())
    }

    fn get(&self, field: Field) -> FieldValue<'_> {
        match field {
            Field::Version => FieldValue::Int(self.version.into()),
            Field::SignType => FieldValue::Int(self.sign_type.into()),
            Field::Gid => FieldValue::Int(self.gid.into()),
            Field::QeSvn => FieldValue::Int(self.qe_svn.into()),
            Field::PceSvn => FieldValue::Int(self.pce_svn.into()),
            Field::Basename => FieldValue::Bytes(&self.basename),
            Field::CpuSvn => FieldValue::Bytes(&self.cpu_svn),
            Field::MiscSelect => FieldValue::Int(self.misc_select.into()),
            Field::Flags => FieldValue::Int(self.flags),
            Field::Xfrm => FieldValue::Int(self.xfrm),
            Field::MrEnclave => FieldValue::Bytes(&self.mrenclave),
            Field::MrSigner => FieldValue::Bytes(&self.mrsigner),
            Field::IsvProdId => FieldValue::Int(self.isv_prod_id.into()),
            Field::IsvSvn => FieldValue::Int(self.isv_svn.into()),
            Field::ReportData => FieldValue::Bytes(&self.report_data),
            Field::Xeid
            | Field::Reserved1
            | Field::Reserved2
            | Field::Reserved3
            | Field::Reserved4 => FieldValue::Zero,
        }
    }

    /// Re-encode the fixed header from the parsed fields
    pub fn header_bytes(&self) -> [u8; QUOTE_HEADER_LEN] {
        let mut header = [0u8; QUOTE_HEADER_LEN];
        for spec in QUOTE_HEADER_LAYOUT.iter() {
            spec.encode(&mut header, self.get(spec.field));
        }
        header
    }

    /// The quote header followed by the signature
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header_bytes().to_vec();
        bytes.extend_from_slice(&self.signature);
        bytes
    }

    /// SHA-256 over the quote header
    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.header_bytes()).into()
    }

    /// Whether the enclave runs in debug mode
    pub fn is_debug_quote(&self) -> bool {
        self.flags & DEBUG_FLAG != 0
    }

    /// Whether the EPID signature is linkable
    pub fn is_sig_linkable(&self) -> bool {
        self.sign_type == SIGN_TYPE_LINKABLE
    }
}

impl Display for Quote {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        fn space_or_newline(f: &mut Formatter<'_>) -> std::fmt::Result {
            if f.alternate() {
                writeln!(f)
            } else {
                write!(f, " ")
            }
        }
        write!(f, "version: {}", self.version)?;
        space_or_newline(f)?;
        write!(f, "mrsigner: {}", hex::encode(self.mrsigner))?;
        space_or_newline(f)?;
        write!(f, "mrenclave: {}", hex::encode(self.mrenclave))?;
        space_or_newline(f)?;
        write!(f, "isv_prod_id: {} isv_svn: {}", self.isv_prod_id, self.isv_svn)?;
        space_or_newline(f)?;
        write!(f, "debug: {}", self.is_debug_quote())?;
        space_or_newline(f)?;
        write!(f, "reportdata: {}", hex::encode(self.report_data))
    }
}

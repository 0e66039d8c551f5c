use crate::{FH_SIZE, FrameHeader, PDH_FIXED_SIZE, Pdh};

/// One complete SBN frame: the raw wire bytes plus the decoded headers.
///
/// Immutable once built. The byte slice is the exact on-wire form and is
/// what the blender forwards downstream.
#[derive(Clone, Debug)]
pub struct Frame {
    bytes: Vec<u8>,
    header: FrameHeader,
    pdh: Pdh,
}

impl Frame {
    pub(crate) fn new(bytes: Vec<u8>, header: FrameHeader, pdh: Pdh) -> Self {
        Self { bytes, header, pdh }
    }

    /// Assemble canonical wire bytes from decoded headers, a raw
    /// product-specific header and a data block. The checksum is computed
    /// here; the caller is responsible for keeping the PDH length fields
    /// consistent with `psh`. Used by tests and traffic generators.
    pub fn assemble(header: FrameHeader, pdh: Pdh, psh: &[u8], data: &[u8]) -> Self {
        let mut bytes =
            Vec::with_capacity(FH_SIZE + PDH_FIXED_SIZE + psh.len() + data.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&pdh.encode());
        bytes.extend_from_slice(psh);
        bytes.extend_from_slice(data);
        Self { bytes, header, pdh }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn pdh(&self) -> &Pdh {
        &self.pdh
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

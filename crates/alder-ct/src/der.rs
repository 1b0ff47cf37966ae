//! Minimal DER navigation for the chain validator.
//!
//! The front-end does not interpret X.509 semantics; it only needs to walk
//! a certificate's outer structure far enough to read the TBS bytes, the
//! issuer and subject names, the public-key info, and the extension OIDs.
//! Everything here is strict definite-length DER with single-byte tags,
//! which covers real certificates.

/// Errors from DER navigation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerError {
    /// Structure ended before a field was complete.
    #[error("truncated DER structure")]
    Truncated,

    /// An encoding form this walker does not handle.
    #[error("unsupported DER encoding: {0}")]
    Unsupported(&'static str),

    /// A field carried an unexpected tag.
    #[error("expected DER tag {expected:#04x}, found {found:#04x}")]
    UnexpectedTag {
        /// Tag required at this position.
        expected: u8,
        /// Tag actually present.
        found: u8,
    },

    /// Bytes left over after the outermost structure.
    #[error("{0} trailing bytes after certificate")]
    TrailingBytes(usize),
}

/// ASN.1 SEQUENCE tag.
pub(crate) const TAG_SEQUENCE: u8 = 0x30;
/// ASN.1 INTEGER tag.
pub(crate) const TAG_INTEGER: u8 = 0x02;
/// ASN.1 OBJECT IDENTIFIER tag.
pub(crate) const TAG_OID: u8 = 0x06;
/// Context tag `[0]` (TBSCertificate version).
pub(crate) const TAG_CTX_0: u8 = 0xA0;
/// Context tag `[3]` (TBSCertificate extensions).
pub(crate) const TAG_CTX_3: u8 = 0xA3;

/// The RFC 6962 pre-certificate poison extension OID,
/// `1.3.6.1.4.1.11129.2.4.3`, as encoded OID content bytes.
pub(crate) const PRECERT_POISON_OID: &[u8] =
    &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xD6, 0x79, 0x02, 0x04, 0x03];

/// One tag-length-value element.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tlv<'a> {
    /// Tag byte.
    pub tag: u8,
    /// Value bytes.
    pub content: &'a [u8],
    /// The full element including tag and length.
    pub raw: &'a [u8],
}

/// Sequential reader over DER elements.
pub(crate) struct DerReader<'a> {
    buf: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Read the next element.
    pub fn read(&mut self) -> Result<Tlv<'a>, DerError> {
        if self.buf.len() < 2 {
            return Err(DerError::Truncated);
        }

        let tag = self.buf[0];
        if tag & 0x1F == 0x1F {
            return Err(DerError::Unsupported("multi-byte tag"));
        }

        let (len, header) = match self.buf[1] {
            n @ 0..=0x7F => (n as usize, 2),
            0x80 => return Err(DerError::Unsupported("indefinite length")),
            n => {
                let count = (n & 0x7F) as usize;
                if count > 4 {
                    return Err(DerError::Unsupported("length wider than 4 bytes"));
                }
                if self.buf.len() < 2 + count {
                    return Err(DerError::Truncated);
                }
                let mut len = 0usize;
                for &b in &self.buf[2..2 + count] {
                    len = (len << 8) | b as usize;
                }
                (len, 2 + count)
            }
        };

        if self.buf.len() < header + len {
            return Err(DerError::Truncated);
        }

        let raw = &self.buf[..header + len];
        let content = &self.buf[header..header + len];
        self.buf = &self.buf[header + len..];
        Ok(Tlv { tag, content, raw })
    }

    /// Read the next element, requiring a specific tag.
    pub fn expect(&mut self, tag: u8) -> Result<Tlv<'a>, DerError> {
        let tlv = self.read()?;
        if tlv.tag != tag {
            return Err(DerError::UnexpectedTag {
                expected: tag,
                found: tlv.tag,
            });
        }
        Ok(tlv)
    }
}

/// Structural view into a DER certificate.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CertView<'a> {
    /// Whole certificate DER.
    #[allow(dead_code)]
    pub raw: &'a [u8],
    /// `tbsCertificate`, full TLV.
    pub tbs: &'a [u8],
    /// `issuer` Name, full TLV.
    pub issuer: &'a [u8],
    /// `subject` Name, full TLV.
    pub subject: &'a [u8],
    /// `subjectPublicKeyInfo`, full TLV.
    pub spki: &'a [u8],
    /// Content of the `Extensions` SEQUENCE, when present.
    extensions: Option<&'a [u8]>,
}

/// Walk the outer structure of a DER certificate.
pub(crate) fn parse_certificate(der: &[u8]) -> Result<CertView<'_>, DerError> {
    let mut outer = DerReader::new(der);
    let cert = outer.expect(TAG_SEQUENCE)?;
    if !outer.is_empty() {
        return Err(DerError::TrailingBytes(outer.remaining()));
    }

    let mut fields = DerReader::new(cert.content);
    let tbs = fields.expect(TAG_SEQUENCE)?;
    // signatureAlgorithm and signatureValue follow; not examined here.

    let mut tbs_fields = DerReader::new(tbs.content);
    let mut first = tbs_fields.read()?;
    if first.tag == TAG_CTX_0 {
        // Explicit version; the serial number follows.
        first = tbs_fields.read()?;
    }
    if first.tag != TAG_INTEGER {
        return Err(DerError::UnexpectedTag {
            expected: TAG_INTEGER,
            found: first.tag,
        });
    }

    let _signature_alg = tbs_fields.expect(TAG_SEQUENCE)?;
    let issuer = tbs_fields.expect(TAG_SEQUENCE)?;
    let _validity = tbs_fields.expect(TAG_SEQUENCE)?;
    let subject = tbs_fields.expect(TAG_SEQUENCE)?;
    let spki = tbs_fields.expect(TAG_SEQUENCE)?;

    let mut extensions = None;
    while !tbs_fields.is_empty() {
        let tlv = tbs_fields.read()?;
        if tlv.tag == TAG_CTX_3 {
            let mut inner = DerReader::new(tlv.content);
            extensions = Some(inner.expect(TAG_SEQUENCE)?.content);
        }
    }

    Ok(CertView {
        raw: der,
        tbs: tbs.raw,
        issuer: issuer.raw,
        subject: subject.raw,
        spki: spki.raw,
        extensions,
    })
}

impl CertView<'_> {
    /// Whether the certificate carries an extension with the given OID
    /// (encoded content bytes).
    pub fn has_extension(&self, oid: &[u8]) -> Result<bool, DerError> {
        let Some(extensions) = self.extensions else {
            return Ok(false);
        };

        let mut reader = DerReader::new(extensions);
        while !reader.is_empty() {
            let extension = reader.expect(TAG_SEQUENCE)?;
            let mut fields = DerReader::new(extension.content);
            let ext_oid = fields.expect(TAG_OID)?;
            if ext_oid.content == oid {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

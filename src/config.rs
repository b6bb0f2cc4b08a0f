use std::collections::HashSet;
use std::sync::Arc;

/// Decides whether the values of an attribute are kept as raw bytes rather
/// than text.
pub trait BinaryAttributeDetector: Send + Sync {
    fn is_binary(&self, attribute: &str) -> bool;
}

impl<F> BinaryAttributeDetector for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_binary(&self, attribute: &str) -> bool {
        self(attribute)
    }
}

const WELL_KNOWN_BINARY: &[&str] = &[
    "audio",
    "authorityrevocationlist",
    "cacertificate",
    "certificaterevocationlist",
    "crosscertificatepair",
    "deltarevocationlist",
    "javaserializeddata",
    "jpegphoto",
    "krb5key",
    "objectguid",
    "objectsid",
    "photo",
    "supportedalgorithms",
    "thumbnailphoto",
    "usercertificate",
    "userpassword",
    "userpkcs12",
    "usersmimecertificate",
    "x500uniqueidentifier",
];

/// Case-insensitive set of binary attribute names. Any attribute carrying
/// the `;binary` option is binary as well.
#[derive(Debug, Clone)]
pub struct DefaultBinaryAttributes {
    names: HashSet<String>,
}

impl Default for DefaultBinaryAttributes {
    fn default() -> Self {
        Self {
            names: WELL_KNOWN_BINARY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DefaultBinaryAttributes {
    pub fn empty() -> Self {
        Self {
            names: HashSet::new(),
        }
    }

    pub fn with(mut self, name: &str) -> Self {
        self.names.insert(name.to_ascii_lowercase());
        self
    }
}

impl BinaryAttributeDetector for DefaultBinaryAttributes {
    fn is_binary(&self, attribute: &str) -> bool {
        let lower = attribute.to_ascii_lowercase();
        let mut parts = lower.split(';');
        let base = parts.next().unwrap_or_default();
        if parts.any(|option| option == "binary") {
            return true;
        }
        self.names.contains(base)
    }
}

pub const DEFAULT_MAX_PDU_SIZE: usize = 2 * 1024 * 1024;

#[derive(Clone)]
pub struct DecoderConfig {
    /// Largest outer SEQUENCE length accepted.
    pub max_pdu_size: usize,
    pub binary_attributes: Arc<dyn BinaryAttributeDetector>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            binary_attributes: Arc::new(DefaultBinaryAttributes::default()),
        }
    }
}

impl std::fmt::Debug for DecoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderConfig")
            .field("max_pdu_size", &self.max_pdu_size)
            .finish_non_exhaustive()
    }
}

impl DecoderConfig {
    pub fn with_max_pdu_size(mut self, max_pdu_size: usize) -> Self {
        self.max_pdu_size = max_pdu_size;
        self
    }

    pub fn with_binary_attributes(mut self, detector: impl BinaryAttributeDetector + 'static) -> Self {
        self.binary_attributes = Arc::new(detector);
        self
    }

    pub fn is_binary(&self, attribute: &str) -> bool {
        self.binary_attributes.is_binary(attribute)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binary_attributes() {
        let d = DefaultBinaryAttributes::default();
        assert!(d.is_binary("userPassword"));
        assert!(d.is_binary("JPEGPHOTO"));
        assert!(d.is_binary("cn;binary"));
        assert!(d.is_binary("userCertificate;binary"));
        assert!(!d.is_binary("cn"));
        assert!(DefaultBinaryAttributes::empty().with("myBlob").is_binary("myblob"));
    }

    #[test]
    fn closure_detector() {
        let config = DecoderConfig::default()
            .with_max_pdu_size(100)
            .with_binary_attributes(|name: &str| name.starts_with("x-"));
        assert_eq!(config.max_pdu_size, 100);
        assert!(config.is_binary("x-blob"));
        assert!(!config.is_binary("userPassword"));
    }
}

//! Hook for shrinking image payloads before upload.

/// Prepares a raw image for upload.
pub trait ImageCompressor: Send + Sync {
    fn compress(&self, raw: &[u8]) -> Vec<u8>;

    /// File extension matching what `compress` produces.
    fn extension(&self) -> &str {
        "jpg"
    }
}

/// Uploads the bytes unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl ImageCompressor for Passthrough {
    fn compress(&self, raw: &[u8]) -> Vec<u8> {
        raw.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_keeps_bytes() {
        let raw = vec![0xFF, 0xD8, 0xFF, 0xE0];
        assert_eq!(Passthrough.compress(&raw), raw);
        assert_eq!(Passthrough.extension(), "jpg");
    }
}

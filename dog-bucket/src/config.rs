/// Bytes examined when a writer has to detect the content type itself
pub const DEFAULT_SNIFF_LEN: usize = 512;

/// Buffer size used when draining readers
pub const DEFAULT_READ_CHUNK_SIZE: usize = 32 * 1024;

/// Configuration for a [`Bucket`](crate::Bucket)
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Writers without a declared content type buffer up to this many bytes
    /// before opening the driver writer
    pub sniff_len: usize,

    /// Chunk size for `read_all` and reader streams
    pub read_chunk_size: usize,

    /// Page size hint applied when `ListOptions` carries none
    pub default_page_size: Option<usize>,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            sniff_len: DEFAULT_SNIFF_LEN,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            default_page_size: None,
        }
    }
}

impl BucketConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sniff window size
    pub fn with_sniff_len(mut self, bytes: usize) -> Self {
        self.sniff_len = bytes;
        self
    }

    /// Set the read chunk size (at least one byte)
    pub fn with_read_chunk_size(mut self, bytes: usize) -> Self {
        self.read_chunk_size = bytes.max(1);
        self
    }

    /// Set the default listing page size
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = Some(page_size);
        self
    }
}

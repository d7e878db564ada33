//! Memory and page layout constants of the target VM.

/// Size of the addressable unit, in bytes.
pub const WORD_BYTES: u32 = 8;

/// Words per page.
pub const PAGE_WORDS: u32 = 32;

/// Bytes per page.
pub const PAGE_BYTES: u32 = PAGE_WORDS * WORD_BYTES;

/// Deployable code budget, in pages.
pub const MAX_CODE_PAGES: u32 = 10;

/// Deployable code budget, in bytes.
pub const MAX_CODE_BYTES: usize = (MAX_CODE_PAGES * PAGE_BYTES) as usize;

/// Data budget, in pages.
pub const MAX_DATA_PAGES: u32 = 10;

/// Data budget, in words (fields + reserved words + temp region).
pub const MAX_DATA_WORDS: u32 = MAX_DATA_PAGES * PAGE_WORDS;

// ngramstat — out-of-core n-gram statistics

pub mod alphabet;
pub mod corpus;
pub mod display;
pub mod engine;
pub mod filter;
pub mod ingest;
pub mod normalize;
pub mod output;
pub mod reduction;
pub mod transcode;
pub mod vocab;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// The n-gram statistics engine over a generic element alphabet.
pub use engine::NGramStat;

/// Shared validation of extraction bounds (`1 <= N <= M <= 255`, `freq >= 1`).
pub use engine::check_bounds;

/// The element alphabet abstraction and its two instantiations.
pub use alphabet::{Element, MAX_NGRAM_LEN};

/// Word-mode vocabulary with reserved sentinel ids.
pub use vocab::{Vocab, WordId};

/// Character-mode output filtering table.
pub use filter::FilterTable;

/// Byte stream ↔ UTF-16 code unit conversion for `--from`/`--to`.
pub use transcode::Transcoder;

/// Statistical substring reduction algorithms 1–4.
pub use reduction::{reduce_compacting, reduce_hashed, reduce_quadratic, reduce_sorted};

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

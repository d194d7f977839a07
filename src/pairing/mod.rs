//! Stage 7: paired-end resolution (§4.9) — insert-size estimation, mate
//! rescue, and pair scoring/promotion.

pub mod insert_size;
pub mod rescue;
pub mod resolve;

pub use insert_size::{classify_orientation, estimate, SizeSample};
pub use rescue::rescue_mate;
pub use resolve::{adjust_mapq, resolve_pair};

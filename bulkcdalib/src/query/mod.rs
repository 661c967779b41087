//! Query processing: derive answers from finished indices.
//!
//! This module handles the third stage of the pipeline - reading the
//! correlator indices once ingestion is complete. It provides:
//!
//! - **Stoplists**: features present on too many drives (`build_stoplist`)
//! - **Affinity**: drive-pair similarity from shared rare features
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulkcdalib::query::{rank_all_pairs, StoplistReport};
//!
//! let stoplist = StoplistReport::build(&result.indices, result.total_drive_count, 0.667);
//! let ranking = rank_all_pairs(&result.indices, &result.drives());
//! ```

pub mod affinity;
pub mod stoplist;

pub use affinity::{
    compare_factors, compare_scores, rank_all_pairs, score, AffinityFactor, AffinityScore,
    TOP_FACTORS,
};
pub use stoplist::{build_stoplist, required_drive_count, write_stoplist, StoplistReport};

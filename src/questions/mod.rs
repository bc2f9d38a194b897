//! Question domain: models, the fingerprint cache, and the sourcing pipeline
//! that turns generation criteria into a full question set.

pub mod cache;
pub mod fallback;
pub mod generator;
pub mod model;
pub mod source;

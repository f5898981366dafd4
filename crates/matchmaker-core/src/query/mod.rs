pub mod engine;
pub mod explain;
pub mod filters;
pub mod guards;
pub mod neighbors;
pub mod weights;

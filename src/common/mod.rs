pub mod crypto;
pub mod headers;
pub mod normalize;
pub mod spool;

pub mod blockchain;
pub mod primitives;

pub mod factory;
pub mod probe;
pub mod source;

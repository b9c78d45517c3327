pub mod bbox;
pub mod constants;
pub mod detection;

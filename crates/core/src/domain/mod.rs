pub mod contract;
pub mod profile;
pub mod risk;

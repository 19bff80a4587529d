pub mod hts221;
pub mod lis3mdl;
pub mod lps22hb;
pub mod lsm6dsl;
pub mod vl53l0x;

#![no_std]

pub mod console;
pub mod drivers;

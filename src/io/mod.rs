pub mod fastx;
pub mod threads;

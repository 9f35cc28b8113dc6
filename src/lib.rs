mod exports;
pub use exports::*;

pub mod types;
pub mod error;
pub mod geometry;
pub mod ray;
pub mod projector;
pub mod fft;
pub mod filter;
pub mod config;

extern crate libc;
extern crate rustc_serialize;

mod defs;
mod funcs;
pub mod traits;
pub mod static_arrays;

pub use defs::*;
pub use funcs::*;

// Benchmark subject abstraction for mosaic_bench.
//
// Provides a mockable interface over the external program whose performance is measured.

mod abstractions;
mod process;

pub use abstractions::*;
pub use process::*;

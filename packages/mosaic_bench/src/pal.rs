// Platform abstraction layer for mosaic_bench.
//
// The benchmark subject is the only part of the outside world the harness drives, so it is the
// seam where tests substitute a fake. Each abstraction keeps its trait and its real
// implementation in separate files.

mod subject;

pub use subject::*;

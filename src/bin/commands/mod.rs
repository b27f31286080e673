mod bench_cmd;
mod compile_cmd;
mod inspect_cmd;
mod scan_cmd;

pub use bench_cmd::cmd_bench;
pub use compile_cmd::cmd_compile;
pub use inspect_cmd::cmd_inspect;
pub use scan_cmd::cmd_scan;

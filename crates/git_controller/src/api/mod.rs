pub mod workload;

pub use workload::Workload;

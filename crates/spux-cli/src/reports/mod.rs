mod tables;

pub use self::tables::{
    benchmark as print_benchmark, ensembles as print_ensembles, routings as print_routings,
    snapshots as print_snapshots, timing as print_timing, traffic as print_traffic,
};

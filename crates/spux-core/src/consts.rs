/// Workers used when nothing else is configured.
pub const DEFAULT_WORKERS: usize = 2;

/// Particles used by the filter when nothing else is configured.
pub const DEFAULT_PARTICLES: usize = 64;

/// Prefix of the OS thread names of in-process workers.
pub const WORKER_THREAD_PREFIX: &str = "spux-worker";

/// Stack size of in-process worker threads.
/// Particles run arbitrary model code, so we give them more than the 2MB default.
pub const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

// Timing labels shared by executors and workers.
pub const TIMING_CONNECT: &str = "connect";
pub const TIMING_CALL: &str = "call";
pub const TIMING_RESAMPLE: &str = "resample";
pub const TIMING_ROUTING: &str = "routing";
pub const TIMING_WAIT: &str = "wait";
pub const TIMING_MAP: &str = "map";

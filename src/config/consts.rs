// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Worker threads used when available parallelism cannot be determined
pub const DEFAULT_WORKER_THREADS: usize = 4;
/// Concurrent backend calls allowed when available parallelism cannot be determined
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// How long `shutdown_blocking` waits for the pool runtime to stop
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

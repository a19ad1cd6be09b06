//! Global memory allocator configuration.
//!
//! `mimalloc` replaces the system allocator; chunk buffers and AEAD scratch
//! space cycle quickly, and it keeps fragmentation low under that churn.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

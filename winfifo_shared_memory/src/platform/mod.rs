//! Platform-specific mapping and blocking primitives

pub mod linux;

pub use linux::{
    attach_segment_mmap, create_anonymous_mmap, create_segment_mmap, futex_wait, futex_wake,
    page_align, pin_to_cpu, unlink_segment,
};

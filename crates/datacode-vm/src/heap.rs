//! VM-owned memory handed out through `VmContext::alloc`
//!
//! The ABI allocation callbacks carry no context, so the heap is a single
//! process-wide table keyed by address. Every block remembers its layout so
//! `free` and the return-value marshaller can release it.
//!
//! Blocks allocated while a native call runs on this thread are also
//! recorded in a per-call set. Only those can change hands with the return
//! value; memory a module allocated at registration time stays the module's.

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::ffi::c_void;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

/// Alignment of every block; enough for any ABI type
pub const HEAP_ALIGN: usize = 16;

static LIVE: Lazy<Mutex<FxHashMap<usize, Layout>>> = Lazy::new(|| Mutex::new(FxHashMap::default()));

/// Allocate `size` bytes. Zero-sized requests get a unique one-byte block.
///
/// Returns null when the request cannot be satisfied.
pub fn allocate(size: usize) -> *mut u8 {
    let layout = match Layout::from_size_align(size.max(1), HEAP_ALIGN) {
        Ok(layout) => layout,
        Err(_) => return std::ptr::null_mut(),
    };
    let ptr = unsafe { alloc::alloc(layout) };
    if !ptr.is_null() {
        LIVE.lock().insert(ptr as usize, layout);
    }
    ptr
}

/// Release a block obtained from [`allocate`].
///
/// Returns false (and does nothing) when `ptr` is not a live block.
pub fn release(ptr: *mut u8) -> bool {
    if ptr.is_null() {
        return false;
    }
    let layout = LIVE.lock().remove(&(ptr as usize));
    match layout {
        Some(layout) => {
            unsafe { alloc::dealloc(ptr, layout) };
            true
        }
        None => false,
    }
}

/// Whether `ptr` is the start of a live block
pub fn owns(ptr: *const u8) -> bool {
    !ptr.is_null() && LIVE.lock().contains_key(&(ptr as usize))
}

/// Size of the live block starting at `ptr`
pub fn block_size(ptr: *const u8) -> Option<usize> {
    if ptr.is_null() {
        return None;
    }
    LIVE.lock().get(&(ptr as usize)).map(Layout::size)
}

thread_local! {
    static CALL_BLOCKS: RefCell<Option<FxHashSet<usize>>> = const { RefCell::new(None) };
}

/// Blocks allocated by one native call and not freed before it returned
#[derive(Debug, Default)]
pub struct CallBlocks {
    blocks: FxHashSet<usize>,
}

impl CallBlocks {
    /// Whether `ptr` is a live block allocated during the call
    pub fn contains(&self, ptr: *const u8) -> bool {
        self.blocks.contains(&(ptr as usize)) && owns(ptr)
    }

    /// Number of blocks allocated during the call
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the call allocated nothing that is still live
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Start recording allocations made on this thread
pub(crate) fn open_call() {
    CALL_BLOCKS.with(|c| *c.borrow_mut() = Some(FxHashSet::default()));
}

/// Stop recording and return what the call allocated
pub(crate) fn close_call() -> CallBlocks {
    let blocks = CALL_BLOCKS.with(|c| c.borrow_mut().take()).unwrap_or_default();
    CallBlocks { blocks }
}

pub(crate) extern "C" fn vm_alloc(size: usize) -> *mut c_void {
    let ptr = allocate(size);
    if ptr.is_null() {
        warn!(size, "native allocation failed");
    } else {
        CALL_BLOCKS.with(|c| {
            if let Some(blocks) = c.borrow_mut().as_mut() {
                blocks.insert(ptr as usize);
            }
        });
    }
    ptr as *mut c_void
}

pub(crate) extern "C" fn vm_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    if release(ptr as *mut u8) {
        CALL_BLOCKS.with(|c| {
            if let Some(blocks) = c.borrow_mut().as_mut() {
                blocks.remove(&(ptr as usize));
            }
        });
    } else {
        warn!(?ptr, "free called with a pointer the VM does not own");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let ptr = allocate(32);
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % HEAP_ALIGN, 0);
        assert!(owns(ptr));
        assert!(release(ptr));
        assert!(!owns(ptr));
        assert!(!release(ptr));
    }

    #[test]
    fn test_zero_size_is_unique() {
        let a = allocate(0);
        let b = allocate(0);
        assert!(!a.is_null());
        assert!(!b.is_null());
        assert_ne!(a, b);
        assert!(release(a));
        assert!(release(b));
    }

    #[test]
    fn test_oversized_request_fails() {
        assert!(allocate(usize::MAX).is_null());
    }

    #[test]
    fn test_call_blocks_record_only_the_open_call() {
        let before = vm_alloc(8);
        open_call();
        let kept = vm_alloc(8);
        let freed = vm_alloc(8);
        vm_free(freed);
        let blocks = close_call();
        let after = vm_alloc(8);

        assert_eq!(blocks.len(), 1);
        assert!(blocks.contains(kept as *const u8));
        assert!(!blocks.contains(before as *const u8));
        assert!(!blocks.contains(after as *const u8));
        assert_eq!(block_size(kept as *const u8), Some(8));

        for ptr in [before, kept, after] {
            vm_free(ptr);
        }
        assert!(!blocks.contains(kept as *const u8));
        assert!(close_call().is_empty());
    }

    #[test]
    fn test_foreign_and_null_pointers_ignored() {
        let mut local = 0u64;
        vm_free(std::ptr::null_mut());
        vm_free(&mut local as *mut u64 as *mut c_void);
        assert!(!owns(&local as *const u64 as *const u8));
    }
}

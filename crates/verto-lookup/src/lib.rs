//! Guest-address to host-code-pointer cache.
//!
//! A two-level sparse table: a flat page directory indexed by the high bits
//! of a windowed guest address, pointing at lazily bump-allocated pages of
//! {guest, host} entry pairs. Collisions are resolved by overwrite (last
//! write wins, no chaining), so a hit is only trusted when the stored full
//! guest address matches the query exactly. The directory never reallocates
//! and pages never move once allocated, which lets generated code embed
//! direct lookups against [`BlockCache::page_pointer`].

use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

/// Low bits of the windowed address selecting the in-page slot.
pub const PAGE_SHIFT: u32 = 12;
pub const ENTRIES_PER_PAGE: usize = 1 << PAGE_SHIFT;

const OFFSET_MASK: u64 = (ENTRIES_PER_PAGE as u64) - 1;
const NO_PAGE: u32 = u32::MAX;

/// The fixed page backing budget is exhausted. Recoverable: the caller
/// clears the whole cache (and any native-code mirror of it) and retries.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("block cache page budget exhausted")]
pub struct CacheFull;

#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// Power-of-two virtual window the slot index is derived from. Guest
    /// addresses differing only above the window alias to the same slot.
    pub window: u64,
    /// Maximum number of backing pages bump-allocated before `AddMapping`
    /// reports [`CacheFull`].
    pub page_budget: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            window: 1 << 32,
            page_budget: 2048,
        }
    }
}

/// One cache slot. `host == 0` marks the slot empty; erasure zeroes the
/// whole pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct CacheEntry {
    pub guest: u64,
    pub host: u64,
}

struct Inner {
    /// Page index to slot in `pages`, `NO_PAGE` when unallocated. Sized at
    /// construction and never resized.
    dir: Box<[u32]>,
    pages: Vec<Box<[CacheEntry]>>,
}

pub struct BlockCache {
    window_mask: u64,
    page_budget: usize,
    inner: Mutex<Inner>,
}

impl BlockCache {
    /// Panics if `config.window` is not a power of two or is smaller than
    /// one page.
    pub fn new(config: CacheConfig) -> Self {
        assert!(
            config.window.is_power_of_two(),
            "cache window must be a power of two"
        );
        assert!(config.window >= ENTRIES_PER_PAGE as u64);
        let dir_len = (config.window >> PAGE_SHIFT) as usize;
        BlockCache {
            window_mask: config.window - 1,
            page_budget: config.page_budget,
            inner: Mutex::new(Inner {
                dir: vec![NO_PAGE; dir_len].into_boxed_slice(),
                pages: Vec::with_capacity(config.page_budget),
            }),
        }
    }

    #[inline]
    fn split(&self, guest: u64) -> (usize, usize) {
        let masked = guest & self.window_mask;
        ((masked >> PAGE_SHIFT) as usize, (masked & OFFSET_MASK) as usize)
    }

    /// Registers `guest -> host`, allocating the backing page on first touch
    /// and silently overwriting any prior occupant of the slot. Returns
    /// `host` on success. On a exhausted page budget returns [`CacheFull`]
    /// without mutating any state.
    pub fn add_mapping(&self, guest: u64, host: u64) -> Result<u64, CacheFull> {
        let (page, offset) = self.split(guest);
        let mut inner = self.inner.lock().unwrap();
        let slot = inner.dir[page];
        let slot = if slot == NO_PAGE {
            if inner.pages.len() == self.page_budget {
                debug!(guest = format_args!("{guest:#x}"), "block cache full");
                return Err(CacheFull);
            }
            let fresh = inner.pages.len() as u32;
            inner
                .pages
                .push(vec![CacheEntry::default(); ENTRIES_PER_PAGE].into_boxed_slice());
            inner.dir[page] = fresh;
            fresh
        } else {
            slot
        };
        inner.pages[slot as usize][offset] = CacheEntry { guest, host };
        Ok(host)
    }

    /// Looks up `guest`. A slot occupied by an aliasing address is a miss,
    /// indistinguishable from never-cached.
    pub fn find(&self, guest: u64) -> Option<u64> {
        let (page, offset) = self.split(guest);
        let inner = self.inner.lock().unwrap();
        let slot = inner.dir[page];
        if slot == NO_PAGE {
            return None;
        }
        let entry = inner.pages[slot as usize][offset];
        (entry.host != 0 && entry.guest == guest).then_some(entry.host)
    }

    /// Zeroes the slot for `guest` if its page exists; a no-op otherwise.
    /// The slot is cleared even when an aliasing address currently occupies
    /// it, so invalidation can collaterally evict an alias. The page itself
    /// is never freed.
    pub fn erase(&self, guest: u64) {
        let (page, offset) = self.split(guest);
        let mut inner = self.inner.lock().unwrap();
        let slot = inner.dir[page];
        if slot == NO_PAGE {
            return;
        }
        inner.pages[slot as usize][offset] = CacheEntry::default();
    }

    /// Resets the bump allocator and empties the directory. Required after
    /// [`CacheFull`].
    pub fn clear_all(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.dir.fill(NO_PAGE);
        inner.pages.clear();
        debug!("block cache cleared");
    }

    /// Number of backing pages currently allocated.
    pub fn allocated_pages(&self) -> usize {
        self.inner.lock().unwrap().pages.len()
    }

    /// Base of the page directory. Stable for the lifetime of the cache.
    /// Entries are `u32` page-allocation slots (`u32::MAX` when unallocated)
    /// with no meaning outside this cache, so this supports inspection only;
    /// backends embedding direct lookups resolve pages via
    /// [`page_pointer`](Self::page_pointer).
    pub fn page_directory_ptr(&self) -> *const u32 {
        self.inner.lock().unwrap().dir.as_ptr()
    }

    /// Base of the page backing `guest`'s slot, null when the page was never
    /// allocated. The backing stays at this address until [`clear_all`]
    /// (pages are individually boxed and never moved), so generated code can
    /// embed the in-page `{guest, host}` compare-and-load directly.
    ///
    /// [`clear_all`]: Self::clear_all
    pub fn page_pointer(&self, guest: u64) -> *const CacheEntry {
        let (page, _) = self.split(guest);
        let inner = self.inner.lock().unwrap();
        let slot = inner.dir[page];
        if slot == NO_PAGE {
            return std::ptr::null();
        }
        inner.pages[slot as usize].as_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two_window() {
        BlockCache::new(CacheConfig {
            window: 3 << 20,
            page_budget: 4,
        });
    }

    #[test]
    fn directory_ptr_is_stable_across_inserts() {
        let cache = BlockCache::new(CacheConfig {
            window: 1 << 20,
            page_budget: 8,
        });
        let before = cache.page_directory_ptr();
        for i in 0..8u64 {
            cache.add_mapping(i << PAGE_SHIFT, 0x1000 + i).unwrap();
        }
        assert_eq!(before, cache.page_directory_ptr());
    }

    #[test]
    fn page_pointer_resolves_slots_and_stays_put() {
        let cache = BlockCache::new(CacheConfig {
            window: 1 << 20,
            page_budget: 8,
        });
        let guest = 0x1040u64;
        assert!(cache.page_pointer(guest).is_null());

        cache.add_mapping(guest, 0xc0de).unwrap();
        let base = cache.page_pointer(guest);
        assert!(!base.is_null());

        // The in-page compare-and-load a backend would emit.
        let offset = (guest & OFFSET_MASK) as usize;
        let entry = unsafe { *base.add(offset) };
        assert_eq!(entry, CacheEntry { guest, host: 0xc0de });

        // Allocating more pages never moves existing backing.
        for i in 1..8u64 {
            cache.add_mapping(i << PAGE_SHIFT, i).unwrap();
        }
        assert_eq!(cache.page_pointer(guest), base);
    }
}

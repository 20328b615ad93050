/*!
 * Lock Striping Pattern
 * Reduces contention by partitioning locks across multiple stripes
 */

use parking_lot::{Mutex, MutexGuard};

/// A single stripe lock
#[repr(C, align(64))] // Cache-line aligned to prevent false sharing
struct Stripe {
    lock: Mutex<()>,
}

/// Fixed array of stripe locks shared by many bucket indices
///
/// # Performance
///
/// - **Contention reduction**: N-way striping reduces lock contention by ~N
/// - **Typical stripe count**: 16-64 (balance between memory and contention)
/// - **Mapping**: `stripe = bucket_index & (stripes - 1)`
///
/// # Example
///
/// ```
/// use striped_sync::core::sync::StripeLocks;
///
/// let locks = StripeLocks::new(8);
/// let _guard = locks.lock(13); // stripe 5
/// assert_eq!(locks.stripe_for(13), 5);
/// ```
pub struct StripeLocks {
    stripes: Box<[Stripe]>,
    stripe_mask: usize,
}

/// Guards for up to two distinct stripes, acquired in ascending stripe order
pub struct PairGuard<'a> {
    _first: MutexGuard<'a, ()>,
    _second: Option<MutexGuard<'a, ()>>,
}

impl StripeLocks {
    /// Create stripe locks with the specified count
    ///
    /// `stripe_count` must be a power of 2
    pub fn new(stripe_count: usize) -> Self {
        assert!(
            stripe_count > 0 && stripe_count.is_power_of_two(),
            "Stripe count must be a power of 2"
        );

        let stripes = (0..stripe_count)
            .map(|_| Stripe {
                lock: Mutex::new(()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            stripes,
            stripe_mask: stripe_count - 1,
        }
    }

    /// Number of stripes
    #[inline]
    pub fn len(&self) -> usize {
        self.stripes.len()
    }

    /// Always false; a stripe set holds at least one lock
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stripes.is_empty()
    }

    /// Stripe index guarding a bucket index
    #[inline]
    pub fn stripe_for(&self, index: usize) -> usize {
        index & self.stripe_mask
    }

    /// Lock the stripe guarding `index`
    #[inline]
    pub fn lock(&self, index: usize) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_for(index)].lock.lock()
    }

    /// Try to lock the stripe guarding `index` without blocking
    #[inline]
    pub fn try_lock(&self, index: usize) -> Option<MutexGuard<'_, ()>> {
        self.stripes[self.stripe_for(index)].lock.try_lock()
    }

    /// Lock the stripes guarding two bucket indices
    ///
    /// Stripes are taken in ascending order, and only once when both indices
    /// share a stripe, so concurrent callers never deadlock against each other.
    pub fn lock_pair(&self, a: usize, b: usize) -> PairGuard<'_> {
        let (sa, sb) = (self.stripe_for(a), self.stripe_for(b));
        let (low, high) = if sa <= sb { (sa, sb) } else { (sb, sa) };

        let first = self.stripes[low].lock.lock();
        let second = (high != low).then(|| self.stripes[high].lock.lock());

        PairGuard {
            _first: first,
            _second: second,
        }
    }
}

impl Default for StripeLocks {
    fn default() -> Self {
        Self::new(crate::core::limits::DEFAULT_STRIPE_COUNT)
    }
}

impl std::fmt::Debug for StripeLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeLocks")
            .field("stripes", &self.stripes.len())
            .finish()
    }
}

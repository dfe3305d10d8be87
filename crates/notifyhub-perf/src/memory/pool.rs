//! Type-keyed object pools.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Bounded pools of reusable objects, one per type.
#[derive(Debug)]
pub struct ObjectPools {
    pools: Mutex<HashMap<TypeId, Vec<Box<dyn Any + Send>>>>,
    capacity: usize,
}

impl ObjectPools {
    pub fn new(capacity: usize) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Take a pooled object, or build one with `factory` when the pool is empty.
    pub fn acquire<T: Any + Send>(&self, factory: impl FnOnce() -> T) -> (T, bool) {
        let pooled = {
            let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
            pools.get_mut(&TypeId::of::<T>()).and_then(|pool| pool.pop())
        };
        match pooled.and_then(|boxed| boxed.downcast::<T>().ok()) {
            Some(obj) => (*obj, true),
            None => (factory(), false),
        }
    }

    /// Return an object. Dropped when the type's pool is full.
    pub fn release<T: Any + Send>(&self, obj: T) -> bool {
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        let pool = pools.entry(TypeId::of::<T>()).or_default();
        if pool.len() >= self.capacity {
            return false;
        }
        pool.push(Box::new(obj));
        true
    }

    /// Pooled objects across all types.
    pub fn pooled(&self) -> usize {
        self.pools
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Drop every pooled object. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        let dropped = pools.values().map(Vec::len).sum();
        pools.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_reuses_and_bounds() {
        let pools = ObjectPools::new(1);
        let (buf, reused) = pools.acquire(|| Vec::<u8>::with_capacity(64));
        assert!(!reused);
        assert!(pools.release(buf));
        assert!(!pools.release(Vec::<u8>::new()));

        let (buf, reused) = pools.acquire(Vec::<u8>::new);
        assert!(reused);
        assert!(buf.capacity() >= 64);

        assert!(pools.release(String::from("other type")));
        assert_eq!(pools.pooled(), 1);
        assert_eq!(pools.clear(), 1);
    }
}

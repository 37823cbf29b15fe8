//! A bounded, concurrency-safe cache of level 0 extents per target projection.
//!
//! Computing `units_across_level0` needs a coordinate transform, so sources
//! opened with the same target projection share the result through a
//! [`ScaleCache`]. When the cache holds `capacity` entries, the next insert
//! clears it completely before storing the new value.
//!
//! # Examples
//!
//! ```rust
//! use terratiles_core::ScaleCache;
//!
//! let cache = ScaleCache::new(2);
//! let v = cache.get_or_try_insert_with("EPSG:3857", || Ok(40_075_016.0)).unwrap();
//! assert_eq!(v, 40_075_016.0);
//! assert_eq!(cache.get("EPSG:3857"), Some(40_075_016.0));
//! ```

use crate::SCALE_CACHE_CAPACITY;
use anyhow::Result;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

lazy_static::lazy_static! {
	static ref SHARED: Arc<ScaleCache> = Arc::new(ScaleCache::new(SCALE_CACHE_CAPACITY));
}

#[derive(Debug)]
pub struct ScaleCache {
	map: DashMap<String, f64>,
	capacity: usize,
	// serializes the check-clear-insert sequence
	write: Mutex<()>,
}

impl ScaleCache {
	pub fn new(capacity: usize) -> Self {
		Self {
			map: DashMap::new(),
			capacity: capacity.max(1),
			write: Mutex::new(()),
		}
	}

	/// The process-wide default instance.
	pub fn shared() -> Arc<ScaleCache> {
		SHARED.clone()
	}

	pub fn get(&self, key: &str) -> Option<f64> {
		self.map.get(key).map(|v| *v)
	}

	pub fn insert(&self, key: &str, value: f64) {
		let _guard = self.write.lock();
		if !self.map.contains_key(key) && self.map.len() >= self.capacity {
			log::debug!("scale cache reached {} entries, clearing", self.capacity);
			self.map.clear();
		}
		self.map.insert(key.to_string(), value);
	}

	/// Returns the cached value or computes, stores and returns it.
	/// Errors from `compute` are returned and nothing is stored.
	pub fn get_or_try_insert_with<F>(&self, key: &str, compute: F) -> Result<f64>
	where
		F: FnOnce() -> Result<f64>,
	{
		if let Some(value) = self.get(key) {
			return Ok(value);
		}
		let value = compute()?;
		self.insert(key, value);
		Ok(value)
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn clear(&self) {
		let _guard = self.write.lock();
		self.map.clear();
	}
}

impl Default for ScaleCache {
	fn default() -> Self {
		Self::new(SCALE_CACHE_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::bail;
	use std::{sync::Barrier, thread};

	#[test]
	fn overflow_clears_everything() {
		let cache = ScaleCache::new(3);
		for (i, key) in ["a", "b", "c"].iter().enumerate() {
			cache.insert(key, i as f64);
		}
		assert_eq!(cache.len(), 3);

		cache.insert("d", 4.0);
		assert_eq!(cache.len(), 1);
		assert_eq!(cache.get("a"), None);
		assert_eq!(cache.get("d"), Some(4.0));
	}

	#[test]
	fn clearing_while_inserting_keeps_the_bound() {
		let cache = ScaleCache::new(4);
		let barrier = Barrier::new(5);
		thread::scope(|s| {
			for t in 0..4 {
				let (cache, barrier) = (&cache, &barrier);
				s.spawn(move || {
					barrier.wait();
					for i in 0..200 {
						cache.insert(&format!("{t}-{i}"), f64::from(i));
						assert!(cache.len() <= cache.capacity());
					}
				});
			}
			barrier.wait();
			for _ in 0..50 {
				cache.clear();
			}
		});
		assert!(cache.len() <= cache.capacity());
	}

	#[test]
	fn overwriting_does_not_clear() {
		let cache = ScaleCache::new(2);
		cache.insert("a", 1.0);
		cache.insert("b", 2.0);
		cache.insert("b", 3.0);
		assert_eq!(cache.len(), 2);
		assert_eq!(cache.get("b"), Some(3.0));
	}

	#[test]
	fn failed_compute_stores_nothing() {
		let cache = ScaleCache::default();
		assert!(cache.get_or_try_insert_with("x", || bail!("nope")).is_err());
		assert!(cache.is_empty());
		assert_eq!(cache.capacity(), 100);
	}

	#[test]
	fn compute_runs_once_per_key() -> Result<()> {
		let cache = ScaleCache::new(10);
		let mut calls = 0;
		for _ in 0..3 {
			cache.get_or_try_insert_with("k", || {
				calls += 1;
				Ok(7.0)
			})?;
		}
		assert_eq!(calls, 1);
		Ok(())
	}

	#[test]
	fn never_exceeds_capacity_under_contention() {
		let cache = Arc::new(ScaleCache::new(5));
		let barrier = Arc::new(Barrier::new(8));
		let handles: Vec<_> = (0..8)
			.map(|t| {
				let cache = cache.clone();
				let barrier = barrier.clone();
				thread::spawn(move || {
					barrier.wait();
					for i in 0..200 {
						let key = format!("{t}-{i}");
						let value = cache.get_or_try_insert_with(&key, || Ok(f64::from(i))).unwrap();
						assert_eq!(value, f64::from(i));
					}
				})
			})
			.collect();
		for h in handles {
			h.join().unwrap();
		}
		assert!(cache.len() <= 5);
	}

	#[test]
	fn shared_instance_is_shared() {
		assert!(Arc::ptr_eq(&ScaleCache::shared(), &ScaleCache::shared()));
	}
}

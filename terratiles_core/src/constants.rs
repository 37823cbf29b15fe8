/// Edge length of a pyramid tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Number of target projections whose level-0 extent is remembered before the cache is flushed.
pub const SCALE_CACHE_CAPACITY: usize = 100;

/// Latitude limit for targets that can represent the poles.
pub const MAX_LATITUDE: f64 = 90.0;

/// Latitude limit for targets that cannot represent the poles, such as Web Mercator.
pub const MAX_LATITUDE_WITHOUT_POLES: f64 = 89.999_999;

/// Upper bound on the shifts applied while wrapping longitudes into `[-180, 180]`.
pub const MAX_WRAP_ITERATIONS: usize = 64;

/// Key under which bounds in the native CRS are memoized.
pub const NATIVE_BOUNDS_KEY: &str = "none";

//! Size Estimation Module
//!
//! Structural estimate of how many bytes a cached key/value pair occupies.
//! Exactness is not the goal: the estimate only has to be deterministic and
//! grow with the value.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{CacheError, Result};

/// Fixed bookkeeping cost charged once per entry.
pub const ENTRY_OVERHEAD: usize = 64;

/// Nesting depth at which estimation gives up.
pub const MAX_ESTIMATE_DEPTH: usize = 64;

const NUMBER_SIZE: usize = 8;
const BOOL_SIZE: usize = 4;

// == Size Estimate ==
/// Types whose footprint the cache can estimate.
///
/// Containers recurse through [`SizeEstimate::estimate_at`] with the depth
/// advanced by [`descend`], so pathological nesting fails with
/// [`CacheError::SizeEstimation`] instead of running away.
pub trait SizeEstimate {
    /// Estimated size in bytes of `self` found at nesting level `depth`.
    fn estimate_at(&self, depth: usize) -> Result<usize>;

    /// Estimated size in bytes of `self` as a top-level value.
    fn estimated_size(&self) -> Result<usize> {
        self.estimate_at(0)
    }
}

/// Returns the depth for children of a container at `depth`.
pub fn descend(depth: usize) -> Result<usize> {
    let next = depth + 1;
    if next > MAX_ESTIMATE_DEPTH {
        return Err(CacheError::SizeEstimation(format!(
            "value nested deeper than {} levels",
            MAX_ESTIMATE_DEPTH
        )));
    }
    Ok(next)
}

/// Estimated footprint of a whole entry: key, value and fixed overhead.
pub fn estimate_entry<K, V>(key: &K, value: &V) -> Result<usize>
where
    K: SizeEstimate + ?Sized,
    V: SizeEstimate + ?Sized,
{
    Ok(ENTRY_OVERHEAD
        .saturating_add(key.estimated_size()?)
        .saturating_add(value.estimated_size()?))
}

fn sum_children<'a, T, I>(items: I, depth: usize) -> Result<usize>
where
    T: SizeEstimate + 'a + ?Sized,
    I: IntoIterator<Item = &'a T>,
{
    let child_depth = descend(depth)?;
    items.into_iter().try_fold(0usize, |total, item| {
        Ok(total.saturating_add(item.estimate_at(child_depth)?))
    })
}

// == Leaf Implementations ==
macro_rules! fixed_size {
    ($size:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl SizeEstimate for $ty {
                fn estimate_at(&self, _depth: usize) -> Result<usize> {
                    Ok($size)
                }
            }
        )+
    };
}

fixed_size!(NUMBER_SIZE => u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);
fixed_size!(BOOL_SIZE => bool, char);
fixed_size!(0 => ());

impl SizeEstimate for str {
    fn estimate_at(&self, _depth: usize) -> Result<usize> {
        Ok(self.len())
    }
}

impl SizeEstimate for String {
    fn estimate_at(&self, _depth: usize) -> Result<usize> {
        Ok(self.len())
    }
}

// == Wrapper Implementations ==
impl<T: SizeEstimate + ?Sized> SizeEstimate for &T {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        (**self).estimate_at(depth)
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Box<T> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        (**self).estimate_at(depth)
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Rc<T> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        (**self).estimate_at(depth)
    }
}

impl<T: SizeEstimate + ?Sized> SizeEstimate for Arc<T> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        (**self).estimate_at(depth)
    }
}

impl<T: SizeEstimate> SizeEstimate for Option<T> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        match self {
            Some(value) => value.estimate_at(depth),
            None => Ok(0),
        }
    }
}

// == Container Implementations ==
impl<T: SizeEstimate> SizeEstimate for [T] {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        sum_children(self.iter(), depth)
    }
}

impl<T: SizeEstimate> SizeEstimate for Vec<T> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        sum_children(self.iter(), depth)
    }
}

impl<T: SizeEstimate> SizeEstimate for VecDeque<T> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        sum_children(self.iter(), depth)
    }
}

impl<K: SizeEstimate, V: SizeEstimate, S> SizeEstimate for HashMap<K, V, S> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        let keys = sum_children(self.keys(), depth)?;
        let values = sum_children(self.values(), depth)?;
        Ok(keys.saturating_add(values))
    }
}

impl<K: SizeEstimate, V: SizeEstimate> SizeEstimate for BTreeMap<K, V> {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        let keys = sum_children(self.keys(), depth)?;
        let values = sum_children(self.values(), depth)?;
        Ok(keys.saturating_add(values))
    }
}

impl<A: SizeEstimate, B: SizeEstimate> SizeEstimate for (A, B) {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        let child_depth = descend(depth)?;
        Ok(self
            .0
            .estimate_at(child_depth)?
            .saturating_add(self.1.estimate_at(child_depth)?))
    }
}

impl SizeEstimate for serde_json::Value {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        use serde_json::Value;

        match self {
            Value::Null => Ok(0),
            Value::Bool(_) => Ok(BOOL_SIZE),
            Value::Number(_) => Ok(NUMBER_SIZE),
            Value::String(s) => Ok(s.len()),
            Value::Array(items) => sum_children(items.iter(), depth),
            Value::Object(map) => {
                let child_depth = descend(depth)?;
                map.iter().try_fold(0usize, |total, (key, value)| {
                    Ok(total
                        .saturating_add(key.len())
                        .saturating_add(value.estimate_at(child_depth)?))
                })
            }
        }
    }
}

pub type EntityId = u32;
pub type LevelId = u32;
pub type ClientId = u32;
pub type Tile = (i32, i32);

/// Hands out ids for every entity and item in the world.
///
/// Ids are never reused, so registry order by id equals insertion order.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: EntityId,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Grid distance with diagonal steps costing the same as straight ones.
pub fn chebyshev(a: Tile, b: Tile) -> i32 {
    let span = a.0.abs_diff(b.0).max(a.1.abs_diff(b.1));
    i32::try_from(span).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        let c = ids.allocate();
        assert_eq!(a, 1);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_chebyshev_distance() {
        assert_eq!(chebyshev((0, 0), (0, 0)), 0);
        assert_eq!(chebyshev((0, 0), (3, 1)), 3);
        assert_eq!(chebyshev((5, 5), (4, 4)), 1);
        assert_eq!(chebyshev((-2, 7), (2, 1)), 6);
    }

    #[test]
    fn test_chebyshev_saturates_at_extremes() {
        assert_eq!(chebyshev((i32::MIN, 0), (5, 5)), i32::MAX);
        assert_eq!(chebyshev((3, 3), (3, i32::MAX)), i32::MAX - 3);
    }
}

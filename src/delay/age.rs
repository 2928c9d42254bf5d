/// Relative age of an outstanding entry; smaller is older.
///
/// Only the order between stamps is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Age(u64);

/// Hands out strictly increasing age stamps.
#[derive(Debug, Default, Clone)]
pub struct AgeClock {
    next: u64,
}

impl AgeClock {
    pub fn stamp(&mut self) -> Age {
        let age = Age(self.next);
        self.next += 1;
        age
    }
}

/// Key of the oldest item, ties broken by the key itself.
pub fn oldest<K: Ord + Copy>(items: impl IntoIterator<Item = (Age, K)>) -> Option<K> {
    items.into_iter().min().map(|(_, key)| key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_are_ordered_by_issue() {
        let mut clock = AgeClock::default();
        let a = clock.stamp();
        let b = clock.stamp();
        assert!(a < b);
        assert_eq!(a, AgeClock::default().stamp());
    }

    #[test]
    fn oldest_picks_smallest_stamp() {
        let mut clock = AgeClock::default();
        let ages: Vec<Age> = (0..3).map(|_| clock.stamp()).collect();
        assert_eq!(Some('b'), oldest([(ages[2], 'a'), (ages[0], 'b'), (ages[1], 'c')]));
        assert_eq!(None, oldest(Vec::<(Age, char)>::new()));
    }
}

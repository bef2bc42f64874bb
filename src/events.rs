use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of I/O readiness conditions.
///
/// Transports record the conditions they are interested in when they
/// suspend; the driver reports back the conditions that were observed when
/// the operation is re-entered. [`EventSet::TIMEOUT`] is only ever reported,
/// never requested.
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct EventSet(u8);

impl EventSet {
    /// The empty set.
    pub const NONE: EventSet = EventSet(0);

    /// The descriptor is (or should become) readable.
    pub const READ: EventSet = EventSet(1);

    /// The descriptor is (or should become) writable.
    pub const WRITE: EventSet = EventSet(1 << 1);

    /// The descriptor is in an exceptional condition (error or hangup).
    pub const EXCEPT: EventSet = EventSet(1 << 2);

    /// The wait ended without any readiness being observed.
    pub const TIMEOUT: EventSet = EventSet(1 << 3);

    /// Returns true if every condition in `other` is present in this set.
    pub fn contains(self, other: EventSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any condition in `other` is present in this set.
    pub fn intersects(self, other: EventSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if no condition is present.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventSet {
    type Output = EventSet;

    fn bitor(self, rhs: EventSet) -> EventSet {
        EventSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventSet {
    fn bitor_assign(&mut self, rhs: EventSet) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut put = |f: &mut fmt::Formatter<'_>, name: &str| -> fmt::Result {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(name)
        };

        if self.is_empty() {
            return f.write_str("NONE");
        }
        if self.contains(EventSet::READ) {
            put(f, "READ")?;
        }
        if self.contains(EventSet::WRITE) {
            put(f, "WRITE")?;
        }
        if self.contains(EventSet::EXCEPT) {
            put(f, "EXCEPT")?;
        }
        if self.contains(EventSet::TIMEOUT) {
            put(f, "TIMEOUT")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ops() {
        let mut ev = EventSet::NONE;
        assert!(ev.is_empty());
        assert!(!ev.intersects(EventSet::READ));

        ev |= EventSet::READ;
        assert!(!ev.is_empty());
        assert!(ev.contains(EventSet::READ));
        assert!(!ev.contains(EventSet::WRITE));

        let both = EventSet::READ | EventSet::WRITE;
        assert!(both.contains(EventSet::READ));
        assert!(both.contains(EventSet::WRITE));
        assert!(both.contains(both));
        assert!(!both.contains(EventSet::TIMEOUT));
        assert!(both.intersects(EventSet::WRITE | EventSet::EXCEPT));
        assert!(!both.intersects(EventSet::TIMEOUT));
    }

    #[test]
    fn contains_empty() {
        // The empty set is a subset of everything.
        assert!(EventSet::READ.contains(EventSet::NONE));
        assert!(EventSet::NONE.contains(EventSet::NONE));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", EventSet::NONE), "NONE");
        assert_eq!(format!("{:?}", EventSet::READ), "READ");
        assert_eq!(
            format!("{:?}", EventSet::READ | EventSet::TIMEOUT),
            "READ|TIMEOUT"
        );
    }
}

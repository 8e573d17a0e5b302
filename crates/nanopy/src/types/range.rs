use std::fmt::Write;

/// Python `range` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Range {
    pub start: i64,
    pub stop: i64,
    /// Never zero; `range()` rejects a zero step.
    pub step: i64,
}

impl Range {
    pub fn new(start: i64, stop: i64, step: i64) -> Self {
        debug_assert_ne!(step, 0);
        Self { start, stop, step }
    }

    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            i128::from(self.stop) - i128::from(self.start)
        } else {
            i128::from(self.start) - i128::from(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = i128::from(self.step).abs();
        usize::try_from((span + step - 1) / step).unwrap_or(usize::MAX)
    }

    /// The `i`-th element, if in range.
    pub fn get(&self, i: usize) -> Option<i64> {
        if i >= self.len() {
            return None;
        }
        let offset = i64::try_from(i).ok()?.checked_mul(self.step)?;
        self.start.checked_add(offset)
    }

    /// `(len, first, step)` with irrelevant parts zeroed, so ranges producing the
    /// same sequence compare and hash equal, as in Python.
    pub fn normalized(&self) -> (usize, i64, i64) {
        match self.len() {
            0 => (0, 0, 0),
            1 => (1, self.start, 0),
            len => (len, self.start, self.step),
        }
    }

    pub fn repr_fmt(&self, out: &mut String) {
        if self.step == 1 {
            let _ = write!(out, "range({}, {})", self.start, self.stop);
        } else {
            let _ = write!(out, "range({}, {}, {})", self.start, self.stop, self.step);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_handles_both_directions() {
        assert_eq!(Range::new(0, 5, 1).len(), 5);
        assert_eq!(Range::new(0, 10, 3).len(), 4);
        assert_eq!(Range::new(5, 0, -2).len(), 3);
        assert_eq!(Range::new(5, 5, 1).len(), 0);
        assert_eq!(Range::new(0, 5, -1).len(), 0);
        assert_eq!(Range::new(5, 0, -2).get(2), Some(1));
    }

    #[test]
    fn equal_sequences_normalize_equal() {
        assert_eq!(Range::new(0, 0, 1).normalized(), Range::new(3, 1, 2).normalized());
        assert_eq!(Range::new(0, 3, 5).normalized(), Range::new(0, 1, 1).normalized());
    }
}

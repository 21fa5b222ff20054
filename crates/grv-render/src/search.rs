//! Search overlay (spec.md §4.7): scans the lines an owning view exposes
//! via `LineSource`, wrapping once when no match is found before the end
//! (or start) of the document.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// What a search scans: one text line per row. Views implement this
/// directly over whatever they already render (commit summaries, diff
/// lines, reference names).
pub trait LineSource {
    fn line_count(&self) -> usize;
    fn line(&self, index: usize) -> &str;
}

pub struct Search {
    direction: Direction,
    pattern: Regex,
}

impl Search {
    pub fn new(direction: Direction, pattern: Regex) -> Self {
        Self { direction, pattern }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Starting at `start+1` (forward) or `start-1` (backward), scan for a
    /// match, wrapping once back through `start` if none is found.
    pub fn find_next(&self, source: &dyn LineSource, start: usize) -> (usize, bool) {
        self.scan(source, start, self.direction)
    }

    /// Mirror of `find_next` using the opposite direction.
    pub fn find_prev(&self, source: &dyn LineSource, start: usize) -> (usize, bool) {
        let opposite = match self.direction {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        };
        self.scan(source, start, opposite)
    }

    fn scan(&self, source: &dyn LineSource, start: usize, direction: Direction) -> (usize, bool) {
        let len = source.line_count();
        if len == 0 {
            return (start, false);
        }
        let order: Vec<usize> = match direction {
            Direction::Forward => (0..len).map(|i| (start + 1 + i) % len).collect(),
            Direction::Backward => (0..len).map(|i| (start + len - 1 - i) % len).collect(),
        };
        for idx in order {
            if self.pattern.is_match(source.line(idx)) {
                return (idx, true);
            }
        }
        (start, false)
    }

    /// For every row, every non-overlapping match byte range (used by the
    /// highlight overlay).
    pub fn find_all(&self, source: &dyn LineSource) -> Vec<(usize, Vec<(usize, usize)>)> {
        let mut out = Vec::new();
        for idx in 0..source.line_count() {
            let line = source.line(idx);
            let ranges: Vec<(usize, usize)> =
                self.pattern.find_iter(line).map(|m| (m.start(), m.end())).collect();
            if !ranges.is_empty() {
                out.push((idx, ranges));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lines(Vec<&'static str>);
    impl LineSource for Lines {
        fn line_count(&self) -> usize {
            self.0.len()
        }
        fn line(&self, index: usize) -> &str {
            self.0[index]
        }
    }

    #[test]
    fn find_next_wraps_once_back_to_start() {
        let lines = Lines(vec!["alpha", "beta", "gamma"]);
        let search = Search::new(Direction::Forward, Regex::new("alpha").unwrap());
        let (idx, found) = search.find_next(&lines, 0);
        assert!(found);
        assert_eq!(idx, 0);
    }

    #[test]
    fn find_next_returns_first_match_after_start() {
        let lines = Lines(vec!["alpha", "beta", "gamma", "beta2"]);
        let search = Search::new(Direction::Forward, Regex::new("beta").unwrap());
        let (idx, found) = search.find_next(&lines, 1);
        assert!(found);
        assert_eq!(idx, 3);
    }

    #[test]
    fn find_all_collects_every_row_with_a_match() {
        let lines = Lines(vec!["foo bar foo", "nothing", "foofoo"]);
        let search = Search::new(Direction::Forward, Regex::new("foo").unwrap());
        let all = search.find_all(&lines);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].1.len(), 2);
        assert_eq!(all[1].1.len(), 2);
    }

    #[test]
    fn no_match_reports_not_found_and_returns_start() {
        let lines = Lines(vec!["alpha", "beta"]);
        let search = Search::new(Direction::Forward, Regex::new("zzz").unwrap());
        let (idx, found) = search.find_next(&lines, 0);
        assert!(!found);
        assert_eq!(idx, 0);
    }
}

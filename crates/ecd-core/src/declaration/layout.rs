//! Line-oriented view of recognized declaration text.

use super::rules::patterns::{BOX_MARKERS, DATA_SECTION_MARKER, LRN_MARKER};

/// How far before the `LRN` line the filled-in data usually starts.
const LRN_LOOKBACK: usize = 60;

/// Trimmed lines of a recognized page with neighbor lookups.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> Lines<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().map(str::trim).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line at `index`, or `""` past the end.
    pub fn get(&self, index: usize) -> &'a str {
        self.lines.get(index).copied().unwrap_or("")
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &'a str)> + '_ {
        self.lines.iter().copied().enumerate()
    }

    /// First line after `index` (within `max` lines) carrying data.
    pub fn next_nonempty(&self, index: usize, max: usize) -> Option<(usize, &'a str)> {
        (index + 1..self.len().min(index + 1 + max))
            .map(|i| (i, self.get(i)))
            .find(|(_, line)| carries_data(line))
    }

    /// Last line before `index` (within `max` lines) carrying data.
    pub fn prev_nonempty(&self, index: usize, max: usize) -> Option<(usize, &'a str)> {
        (index.saturating_sub(max)..index.min(self.len()))
            .rev()
            .map(|i| (i, self.get(i)))
            .find(|(_, line)| carries_data(line))
    }

    /// Index where the filled-in data starts.
    ///
    /// A declaration-type marker line (`EXMK`, `IMMK`, ...) wins; otherwise
    /// the data is assumed to start a fixed distance before the `LRN` line.
    /// Falls back to the first line.
    pub fn data_section_start(&self) -> usize {
        if let Some((i, _)) = self.iter().find(|(_, l)| DATA_SECTION_MARKER.is_match(l)) {
            return i;
        }
        if let Some((i, _)) = self.iter().find(|(_, l)| LRN_MARKER.is_match(l)) {
            return i.saturating_sub(LRN_LOOKBACK);
        }
        0
    }
}

fn carries_data(line: &str) -> bool {
    !line.is_empty() && !BOX_MARKERS.contains(&line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbors_skip_blank_and_box_markers() {
        let lines = Lines::new("A\n\n  б \nB\nC");
        assert_eq!(lines.next_nonempty(0, 5), Some((3, "B")));
        assert_eq!(lines.prev_nonempty(3, 5), Some((0, "A")));
        assert_eq!(lines.next_nonempty(0, 2), None);
        assert_eq!(lines.next_nonempty(4, 5), None);
    }

    #[test]
    fn test_get_out_of_range() {
        let lines = Lines::new("x");
        assert_eq!(lines.get(0), "x");
        assert_eq!(lines.get(7), "");
    }

    #[test]
    fn test_data_section_marker() {
        let lines = Lines::new("ЕДИНСТВЕН ДОКУМЕНТ\nLRN: 24MK\n  EXMK  \nMK4030996123456");
        assert_eq!(lines.data_section_start(), 2);
    }

    #[test]
    fn test_data_section_lrn_fallback() {
        let mut text = String::new();
        for i in 0..70 {
            text.push_str(&format!("ред {}\n", i));
        }
        text.push_str("LRN: 24MK0001");
        assert_eq!(Lines::new(&text).data_section_start(), 10);
        assert_eq!(Lines::new("a\nLRN: 1").data_section_start(), 0);
    }

    #[test]
    fn test_data_section_defaults_to_start() {
        assert_eq!(Lines::new("a\nb").data_section_start(), 0);
    }
}

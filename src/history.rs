use std::fmt::Write;

/// Number of command lines the shell remembers.
pub const HISTORY_LIMIT: usize = 100;

/// Fixed-size circular log of submitted command lines.
///
/// Once all slots are used, each new entry overwrites the oldest one.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    slots: Vec<Option<String>>,
    next: usize,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self {
            slots: vec![None; HISTORY_LIMIT],
            next: 0,
        }
    }

    /// Store a copy of `line`, evicting the oldest entry when the ring is full.
    pub fn record(&mut self, line: &str) {
        self.slots[self.next] = Some(line.to_owned());
        self.next = (self.next + 1) % HISTORY_LIMIT;
    }

    /// Iterate over the stored lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let (newer, older) = self.slots.split_at(self.next);
        older
            .iter()
            .chain(newer.iter())
            .filter_map(|slot| slot.as_deref())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the numbered listing printed by the `history` command.
    pub fn listing(&self) -> Vec<u8> {
        let mut out = String::new();
        for (number, line) in self.iter().enumerate() {
            // Writing into a String cannot fail.
            let _ = writeln!(out, " {:>3} {} ", number + 1, line);
        }
        out.into_bytes()
    }
}

impl Default for HistoryRing {
    fn default() -> Self {
        Self::new()
    }
}

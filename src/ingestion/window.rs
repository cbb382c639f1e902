use std::fmt;
use std::str::FromStr;

use crate::config::ScanSettings;

/// Which kind of pass is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Resume every stream from its cursor.
    #[default]
    Normal,
    /// Re-absorb a bounded recent window behind each cursor.
    Repair,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Ok(ScanMode::Normal),
            "repair" => Ok(ScanMode::Repair),
            other => Err(format!("unknown scan mode '{other}'")),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Normal => f.write_str("normal"),
            ScanMode::Repair => f.write_str("repair"),
        }
    }
}

/// Chain tip snapshot shared by every scan of one chain in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHead {
    pub head: u64,
    /// `head - confirmations`: the last block any scan may touch.
    pub target: u64,
}

impl ChainHead {
    pub fn new(head: u64, confirmations: u64) -> Self {
        Self {
            head,
            target: head.saturating_sub(confirmations),
        }
    }
}

/// Inclusive block range one stream will scan in this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub from: u64,
    pub to: u64,
}

impl ScanWindow {
    /// Compute the window for a stream, or `None` when it is caught up.
    ///
    /// A stream without a cursor is always scanned in normal mode, so a
    /// repair pass never skips its history.
    pub fn compute(
        mode: ScanMode,
        cursor: u64,
        known_start: Option<u64>,
        head: ChainHead,
        settings: &ScanSettings,
    ) -> Option<Self> {
        let from = match mode {
            ScanMode::Repair if cursor > 0 => head
                .head
                .saturating_sub(settings.repair_lookback_blocks)
                .max(cursor.saturating_sub(settings.repair_rewind_blocks)),
            _ if cursor > 0 => cursor,
            _ => known_start
                .filter(|b| *b > 0)
                .unwrap_or_else(|| head.head.saturating_sub(settings.lookback_blocks)),
        };

        (from <= head.target).then_some(ScanWindow {
            from,
            to: head.target,
        })
    }

    /// Consecutive block-aligned chunks of at most `size` blocks.
    pub fn chunks(&self, size: u64) -> Vec<(u64, u64)> {
        let size = size.max(1);
        let mut out = Vec::new();
        let mut start = self.from;
        while start <= self.to {
            let end = start.saturating_add(size - 1).min(self.to);
            out.push((start, end));
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        out
    }
}

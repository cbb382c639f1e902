pub mod block_times;
pub mod events;
pub mod orchestrator;
pub mod registry_scanner;
pub mod trade_scanner;
pub mod window;

pub use block_times::BlockTimeCache;
pub use events::{decode_event, DomainEvent};
pub use orchestrator::{ChainSource, Orchestrator, PassReport};
pub use registry_scanner::scan_registry;
pub use trade_scanner::{build_trade, scan_campaign};
pub use window::{ChainHead, ScanMode, ScanWindow};

use crate::config::ScanSettings;
use crate::db::IndexStore;
use crate::realtime::RealtimePublisher;
use crate::rpc::{ChainLog, ProviderPool, RangeFetcher};

/// Everything a scanner needs for one chain within one pass.
pub struct ScanContext<'a, S, L> {
    pub chain_id: i64,
    pub mode: ScanMode,
    pub head: ChainHead,
    pub store: &'a S,
    pub pool: &'a ProviderPool<L>,
    pub fetcher: &'a RangeFetcher,
    pub publisher: &'a RealtimePublisher,
    pub settings: &'a ScanSettings,
}

impl<S: IndexStore, L> ScanContext<'_, S, L> {
    /// Window for a stream given its stored cursor.
    pub fn window(&self, cursor: u64, known_start: Option<u64>) -> Option<ScanWindow> {
        ScanWindow::compute(self.mode, cursor, known_start, self.head, self.settings)
    }
}

/// Drop reorged logs and order the rest by (block, log index).
pub(crate) fn prepare_chunk(mut logs: Vec<ChainLog>) -> Vec<ChainLog> {
    logs.retain(|log| {
        if log.removed {
            tracing::debug!(
                block = log.block_number,
                log_index = log.log_index,
                tx = %log.tx_hash,
                "Skipping removed log"
            );
        }
        !log.removed
    });
    logs.sort_by_key(|log| (log.block_number, log.log_index));
    logs
}

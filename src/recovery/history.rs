use crate::classify::Classification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// Append-only record of one completed recovery episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub episode_id: String,
    pub classification: Classification,
    pub operation: String,
    pub client_id: String,
    pub success: bool,
    pub attempts: u32,
    pub strategies_attempted: Vec<String>,
    pub strategy_used: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Ring-bounded episode log. Oldest entries are dropped, not archived.
pub struct RecoveryHistory {
    max_entries: usize,
    entries: RwLock<VecDeque<HistoryEntry>>,
}

impl RecoveryHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            entries: RwLock::new(VecDeque::new()),
        }
    }

    pub fn append(&self, entry: HistoryEntry) {
        let mut entries = self.write_lock();
        entries.push_back(entry);
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_lock().is_empty()
    }

    /// Most recent `limit` entries, newest last.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = self.read_lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn statistics(&self) -> OrchestratorStatistics {
        let entries = self.read_lock();

        let mut by_strategy: HashMap<String, StrategyTally> = HashMap::new();
        let mut by_category: HashMap<String, CategoryTally> = HashMap::new();
        let mut successful = 0u64;
        let mut failed = 0u64;

        for entry in entries.iter() {
            if entry.success {
                successful += 1;
            } else {
                failed += 1;
            }

            for name in &entry.strategies_attempted {
                let tally = by_strategy.entry(name.clone()).or_default();
                tally.attempted += 1;
                if entry.strategy_used.as_deref() == Some(name.as_str()) {
                    tally.succeeded += 1;
                }
            }

            let category = by_category
                .entry(entry.classification.category.to_string())
                .or_default();
            category.episodes += 1;
            if entry.success {
                category.recovered += 1;
            }
        }

        OrchestratorStatistics {
            total_episodes: entries.len() as u64,
            successful,
            failed,
            by_strategy,
            by_category,
            recent: {
                let skip = entries.len().saturating_sub(RECENT_IN_STATISTICS);
                entries.iter().skip(skip).cloned().collect()
            },
        }
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, VecDeque<HistoryEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, VecDeque<HistoryEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

const RECENT_IN_STATISTICS: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyTally {
    pub attempted: u64,
    pub succeeded: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryTally {
    pub episodes: u64,
    pub recovered: u64,
}

/// Read model over completed episodes, for dashboards and regression
/// detection. Never consulted for control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStatistics {
    pub total_episodes: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_strategy: HashMap<String, StrategyTally>,
    pub by_category: HashMap<String, CategoryTally>,
    pub recent: Vec<HistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classification, ErrorCategory};

    fn entry(success: bool, used: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            episode_id: uuid::Uuid::new_v4().to_string(),
            classification: Classification {
                category: ErrorCategory::Element,
                sub_category: "NOT_FOUND".to_string(),
                recoverable: true,
                pattern: None,
            },
            operation: "update_menu".to_string(),
            client_id: "client-1".to_string(),
            success,
            attempts: 2,
            strategies_attempted: vec![
                "try_fallback_selectors".to_string(),
                "semantic_find".to_string(),
            ],
            strategy_used: used.map(|s| s.to_string()),
            duration_ms: 1200,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn ring_drops_oldest() {
        let history = RecoveryHistory::new(3);
        for _ in 0..5 {
            history.append(entry(true, Some("semantic_find")));
        }
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn statistics_tally_strategies_and_categories() {
        let history = RecoveryHistory::new(100);
        history.append(entry(true, Some("semantic_find")));
        history.append(entry(false, None));

        let stats = history.statistics();
        assert_eq!(stats.total_episodes, 2);
        assert_eq!(stats.successful, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.by_strategy["semantic_find"].attempted, 2);
        assert_eq!(stats.by_strategy["semantic_find"].succeeded, 1);
        assert_eq!(stats.by_category["ELEMENT"].episodes, 2);
        assert_eq!(stats.by_category["ELEMENT"].recovered, 1);
    }

    #[test]
    fn recent_returns_newest_entries() {
        let history = RecoveryHistory::new(100);
        for i in 0..10 {
            let mut e = entry(true, None);
            e.attempts = i;
            history.append(e);
        }
        let recent = history.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.last().unwrap().attempts, 9);
    }
}

//! Daily search-query quota shared by every assessment run by one engine.

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use entitygraph_shared::{EntityGraphError, Result};

/// Counter of search queries issued today (UTC), reset when the date changes.
///
/// Check-and-increment happens under one lock, so concurrent pipeline runs
/// can never push usage past `limit`.
#[derive(Debug)]
pub struct DailyQuota {
    limit: u32,
    state: Mutex<QuotaState>,
}

#[derive(Debug, Clone, Copy)]
struct QuotaState {
    date: NaiveDate,
    used: u32,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(QuotaState {
                date: Utc::now().date_naive(),
                used: 0,
            }),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Reserve one query, or [`EntityGraphError::QuotaExceeded`] when today's
    /// quota is spent.
    pub fn try_acquire(&self) -> Result<()> {
        self.try_acquire_on(Utc::now().date_naive())
    }

    /// Queries consumed today.
    pub fn used(&self) -> u32 {
        let today = Utc::now().date_naive();
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.date == today { state.used } else { 0 }
    }

    fn try_acquire_on(&self, today: NaiveDate) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.date != today {
            *state = QuotaState {
                date: today,
                used: 0,
            };
        }
        if state.used >= self.limit {
            return Err(EntityGraphError::QuotaExceeded { limit: self.limit });
        }
        state.used += 1;
        Ok(())
    }
}

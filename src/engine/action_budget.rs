use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::reset_clock::last_reset_boundary;
use crate::model::action_budget::ActionBudget;

/// Knobs of the daily action allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetPolicy {
    /// Actions a brand new slot starts with.
    pub initial: u32,
    /// Stock ceiling.
    pub limit: u32,
    /// Actions granted per elapsed reset boundary.
    pub daily_recovery: u32,
    /// Local hour (0-23) at which the day rolls over.
    pub reset_hour: u32,
    pub tz_offset_minutes: i32,
    /// Actions granted by the "take a rest" reward.
    pub reward_amount: u32,
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self {
            initial: 50,
            limit: 50,
            daily_recovery: 20,
            reset_hour: 4,
            tz_offset_minutes: 9 * 60,
            reward_amount: 5,
        }
    }
}

pub struct BudgetLedger {
    policy: BudgetPolicy,
}

impl BudgetLedger {
    pub fn new(policy: BudgetPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &BudgetPolicy {
        &self.policy
    }

    /// Full allotment for a slot created at `now`.
    pub fn new_budget(&self, now: DateTime<Utc>) -> ActionBudget {
        ActionBudget::new(self.policy.initial, self.policy.limit, now)
    }

    fn boundary(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        last_reset_boundary(at, self.policy.reset_hour, self.policy.tz_offset_minutes)
    }

    /// Grants recovery for every reset boundary crossed since the last
    /// evaluation and moves `last_recovery` to `now`. Returns the amount added.
    ///
    /// Calling this repeatedly inside one reset window grants nothing extra.
    pub fn reconcile(&self, budget: &mut ActionBudget, now: DateTime<Utc>) -> u32 {
        let last_boundary = self.boundary(budget.last_recovery);
        let current_boundary = self.boundary(now);

        let before = budget.current;
        if current_boundary > last_boundary {
            let days = (current_boundary - last_boundary).num_days();
            let days = u32::try_from(days).unwrap_or(u32::MAX);
            let recovered = days.saturating_mul(self.policy.daily_recovery);
            budget.current = budget.current.saturating_add(recovered).min(budget.limit);
        }
        budget.last_recovery = now;

        let granted = budget.current.saturating_sub(before);
        if granted > 0 {
            tracing::info!(granted, current = budget.current, "daily actions recovered");
        }
        granted
    }

    /// Reconciles first so a stale budget never reports the wrong answer.
    pub fn has_remaining(&self, budget: &mut ActionBudget, now: DateTime<Utc>) -> bool {
        self.reconcile(budget, now);
        budget.current > 0
    }

    /// Spends one action. Returns false (and changes nothing) at zero.
    pub fn consume(&self, budget: &mut ActionBudget) -> bool {
        if budget.current == 0 {
            tracing::warn!("consume called on an empty action budget");
            return false;
        }
        budget.current -= 1;
        true
    }

    /// Adds `amount`, never past the limit.
    pub fn grant(&self, budget: &mut ActionBudget, amount: u32) -> u32 {
        let before = budget.current;
        budget.current = budget.current.saturating_add(amount).min(budget.limit);
        budget.current - before
    }
}

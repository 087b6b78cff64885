use serde::{Deserialize, Serialize};

/// How many credits one accepted repost costs a supporter.
///
/// The same rule prices single-target proposals and batch assignments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CreditCostRule {
    Flat {
        units: i64,
    },
    /// `max(floor, share * min(ceiling, balance))`, rounded down.
    Graduated {
        share: f64,
        ceiling: i64,
        floor: i64,
    },
}

impl Default for CreditCostRule {
    fn default() -> Self {
        CreditCostRule::Flat { units: 1 }
    }
}

impl CreditCostRule {
    pub fn graduated() -> Self {
        CreditCostRule::Graduated {
            share: 0.7,
            ceiling: 100,
            floor: 50,
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "flat" => Some(CreditCostRule::default()),
            "graduated" => Some(CreditCostRule::graduated()),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CreditCostRule::Flat { .. } => "flat",
            CreditCostRule::Graduated { .. } => "graduated",
        }
    }

    pub fn cost(&self, balance: i64) -> i64 {
        match *self {
            CreditCostRule::Flat { units } => units.max(1),
            CreditCostRule::Graduated { share, ceiling, floor } => {
                let base = balance.clamp(0, ceiling.max(0)) as f64 * share;
                // 1e-9 keeps products like 90 * 0.7 from flooring to 62.
                let base = if base.is_finite() { (base + 1e-9).floor() as i64 } else { 0 };
                base.max(floor).max(1)
            }
        }
    }

    /// The cost for this balance, or `None` when the balance cannot cover it.
    pub fn affordable_cost(&self, balance: i64) -> Option<i64> {
        let cost = self.cost(balance);
        (balance >= cost).then_some(cost)
    }
}

//! # Pricing Module
//!
//! Delivery fee tiers and daily order limits, derived from the cart contents
//! and the signed-in user's role.
//!
//! ## Quote Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Checkout Quote                                       │
//! │                                                                         │
//! │  cart lines ──► classify each line ──► bottles / bundles               │
//! │                 (is_bundle flag,        │                               │
//! │                  else name heuristic)   │                               │
//! │                                         ├──► delivery_fee()            │
//! │                                         │      bundles > 0 → n × fee   │
//! │                                         │      bottles ≥ 5 → ⌊b/5⌋×fee │
//! │                                         │      1 / 2 / 3-4 → table     │
//! │                                         │                               │
//! │  role + today's orders ─────────────────┴──► check_limits()            │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │                              CheckoutQuote { fee, total, violation }   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quotes are recomputed on every read. Inputs are tiny, so nothing is cached.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cart::CartItem;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Order, OrderStatus, Role};
use crate::BOTTLES_PER_BUNDLE;

// =============================================================================
// Rules
// =============================================================================

/// Daily caps for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLimits {
    /// Bottle-equivalents per day (a bundle counts as five).
    pub max_bottles: u32,
    pub max_bundles: u32,
}

/// Fee table and limits. Loaded from the `[pricing]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingRules {
    pub one_bottle_fee: Money,
    pub two_bottle_fee: Money,
    /// Shared by 3 and 4 bottles.
    pub few_bottle_fee: Money,
    pub bundle_fee: Money,
    /// Lowercase substrings that mark an unflagged line as a bundle.
    pub bundle_keywords: Vec<String>,
    pub consumer: RoleLimits,
    /// Also applies to admins.
    pub distributor: RoleLimits,
}

impl Default for PricingRules {
    fn default() -> Self {
        PricingRules {
            one_bottle_fee: Money::from_major(1_500),
            two_bottle_fee: Money::from_major(2_000),
            few_bottle_fee: Money::from_major(2_500),
            bundle_fee: Money::from_major(3_000),
            bundle_keywords: vec!["auraset".to_string(), "bundle".to_string()],
            consumer: RoleLimits {
                max_bottles: 10,
                max_bundles: 2,
            },
            distributor: RoleLimits {
                max_bottles: 100,
                max_bundles: 20,
            },
        }
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Bottles and bundles already ordered today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyUsage {
    pub bottles: u32,
    pub bundles: u32,
}

/// Which daily cap an order would break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimitViolation {
    Bottles { role: Role, max: u32, attempted: u32 },
    Bundles { role: Role, max: u32, attempted: u32 },
}

impl fmt::Display for LimitViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (role, max, attempted, unit) = match self {
            LimitViolation::Bottles {
                role,
                max,
                attempted,
            } => (role, max, attempted, "bottles"),
            LimitViolation::Bundles {
                role,
                max,
                attempted,
            } => (role, max, attempted, "bundles"),
        };
        write!(
            f,
            "Daily limit exceeded: {} accounts can order at most {} {} per day (this order brings you to {}).",
            role, max, unit, attempted
        )
    }
}

/// Everything the checkout summary shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutQuote {
    /// Bottle-equivalents in the cart.
    pub bottles: u32,
    pub bundles: u32,
    pub subtotal: Money,
    pub delivery_fee: Money,
    pub total: Money,
    pub limit_violation: Option<LimitViolation>,
}

impl CheckoutQuote {
    pub fn is_blocked(&self) -> bool {
        self.limit_violation.is_some()
    }

    /// Turns a limit violation into a blocking error.
    pub fn ensure_allowed(&self) -> CoreResult<()> {
        match &self.limit_violation {
            Some(violation) => Err(CoreError::LimitExceeded(violation.clone())),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

impl PricingRules {
    /// Whether a line counts as a bundle.
    ///
    /// An explicit flag always wins. The keyword match only applies when the
    /// line carries no flag.
    pub fn is_bundle(&self, item: &CartItem) -> bool {
        match item.is_bundle {
            Some(flag) => flag,
            None => {
                let name = item.name.to_lowercase();
                self.bundle_keywords
                    .iter()
                    .any(|keyword| name.contains(keyword.as_str()))
            }
        }
    }

    /// Returns `(bottle_equivalents, bundles)` for a set of lines.
    pub fn count(&self, items: &[CartItem]) -> (u32, u32) {
        items.iter().fold((0u32, 0u32), |(bottles, bundles), item| {
            if self.is_bundle(item) {
                (
                    bottles.saturating_add(item.quantity.saturating_mul(BOTTLES_PER_BUNDLE)),
                    bundles.saturating_add(item.quantity),
                )
            } else {
                (bottles.saturating_add(item.quantity), bundles)
            }
        })
    }

    /// Delivery fee for the given counts.
    pub fn delivery_fee(&self, bottles: u32, bundles: u32) -> Money {
        if bundles > 0 {
            return self.bundle_fee * bundles;
        }
        match bottles {
            0 => Money::zero(),
            1 => self.one_bottle_fee,
            2 => self.two_bottle_fee,
            3 | 4 => self.few_bottle_fee,
            n => self.bundle_fee * (n / BOTTLES_PER_BUNDLE),
        }
    }

    pub fn limits_for(&self, role: Role) -> RoleLimits {
        match role {
            Role::Consumer => self.consumer,
            Role::Distributor | Role::Admin => self.distributor,
        }
    }

    /// Checks the cart counts plus today's usage against the role's caps.
    /// The bottle cap is reported first when both are exceeded.
    pub fn check_limits(
        &self,
        role: Role,
        bottles: u32,
        bundles: u32,
        usage: DailyUsage,
    ) -> Option<LimitViolation> {
        let limits = self.limits_for(role);
        let total_bottles = bottles.saturating_add(usage.bottles);
        let total_bundles = bundles.saturating_add(usage.bundles);

        if total_bottles > limits.max_bottles {
            return Some(LimitViolation::Bottles {
                role,
                max: limits.max_bottles,
                attempted: total_bottles,
            });
        }
        if total_bundles > limits.max_bundles {
            return Some(LimitViolation::Bundles {
                role,
                max: limits.max_bundles,
                attempted: total_bundles,
            });
        }
        None
    }

    /// Builds the full checkout quote for a cart.
    pub fn quote(&self, items: &[CartItem], role: Role, usage: DailyUsage) -> CheckoutQuote {
        let (bottles, bundles) = self.count(items);
        let subtotal: Money = items.iter().map(CartItem::line_total).sum();
        let delivery_fee = self.delivery_fee(bottles, bundles);

        CheckoutQuote {
            bottles,
            bundles,
            subtotal,
            delivery_fee,
            total: subtotal + delivery_fee,
            limit_violation: self.check_limits(role, bottles, bundles, usage),
        }
    }

    /// Sums what the user has already ordered on `today` (UTC), ignoring
    /// cancelled orders.
    pub fn daily_usage(&self, orders: &[Order], today: NaiveDate) -> DailyUsage {
        orders
            .iter()
            .filter(|order| order.status != OrderStatus::Cancelled)
            .filter(|order| order.created_at.date_naive() == today)
            .fold(DailyUsage::default(), |usage, order| {
                let (bottles, bundles) = self.count(&order.items);
                DailyUsage {
                    bottles: usage.bottles.saturating_add(bottles),
                    bundles: usage.bundles.saturating_add(bundles),
                }
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

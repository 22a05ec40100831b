//! Order domain types for Brewline.
//!
//! These are the payloads that cross the engine boundary: the workflow input
//! (`OrderRequest`), the in-flight state exposed to queries (`OrderState`,
//! `OrderStatusView`), and the terminal snapshot (`OrderResult`). Field names
//! and enum spellings are the wire contract shared by submitter and worker.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Drink and size
// ---------------------------------------------------------------------------

/// Available drink sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrinkSize {
    S,
    M,
    L,
}

impl DrinkSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
        }
    }
}

impl fmt::Display for DrinkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrinkSize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S" => Ok(Self::S),
            "M" => Ok(Self::M),
            "L" => Ok(Self::L),
            other => Err(ValidationError::UnknownSize(other.to_string())),
        }
    }
}

/// Drinks on the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Drink {
    Espresso,
    Americano,
    Cappuccino,
    FlatWhite,
    Latte,
    IcedLatte,
    Mocha,
    WhiteMocha,
}

impl Drink {
    /// Every drink on the menu, in menu order.
    pub const ALL: [Drink; 8] = [
        Drink::Espresso,
        Drink::Americano,
        Drink::Cappuccino,
        Drink::FlatWhite,
        Drink::Latte,
        Drink::IcedLatte,
        Drink::Mocha,
        Drink::WhiteMocha,
    ];

    /// Wire spelling of the drink.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Espresso => "ESPRESSO",
            Self::Americano => "AMERICANO",
            Self::Cappuccino => "CAPPUCCINO",
            Self::FlatWhite => "FLAT_WHITE",
            Self::Latte => "LATTE",
            Self::IcedLatte => "ICED_LATTE",
            Self::Mocha => "MOCHA",
            Self::WhiteMocha => "WHITE_MOCHA",
        }
    }
}

impl fmt::Display for Drink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; `-` and spaces are accepted in place of `_`.
impl FromStr for Drink {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Drink::ALL
            .into_iter()
            .find(|d| d.as_str() == normalized)
            .ok_or_else(|| ValidationError::UnknownDrink(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Workflow input
// ---------------------------------------------------------------------------

/// Input to the order workflow. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderRequest {
    /// Client-supplied unique identifier; also keys the workflow instance.
    pub order_id: String,
    pub drink: Drink,
    pub size: DrinkSize,
}

impl OrderRequest {
    pub fn new(order_id: impl Into<String>, drink: Drink, size: DrinkSize) -> Self {
        Self {
            order_id: order_id.into(),
            drink,
            size,
        }
    }

    /// Reject requests the workflow must never accept.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.order_id.trim().is_empty() {
            return Err(ValidationError::EmptyOrderId);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-flight state
// ---------------------------------------------------------------------------

/// Mutable state owned by exactly one workflow instance.
///
/// Flags only ever flip from `false` to `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderState {
    pub charged: bool,
    pub brewed: bool,
    pub receipt_sent: bool,
    pub cancelled: bool,
    /// Zero until the order has been priced.
    pub amount_cents: i64,
}

/// Phases of the order state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowPhase {
    #[default]
    Created,
    Priced,
    Charging,
    Charged,
    Brewing,
    Brewed,
    Notifying,
    Completed,
    Cancelled,
    Failed,
}

impl WorkflowPhase {
    /// Absorbing states: no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Priced => "PRICED",
            Self::Charging => "CHARGING",
            Self::Charged => "CHARGED",
            Self::Brewing => "BREWING",
            Self::Brewed => "BREWED",
            Self::Notifying => "NOTIFYING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload returned by the `get_status` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusView {
    pub order_id: String,
    pub phase: WorkflowPhase,
    #[serde(flatten)]
    pub state: OrderState,
}

// ---------------------------------------------------------------------------
// Terminal result
// ---------------------------------------------------------------------------

/// Terminal status of an order workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// All three steps succeeded.
    Completed,
    /// A cancel signal was observed at a check-point.
    Cancelled,
    /// A step exhausted its retries (or the workflow hit an internal fault).
    Failed,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("COMPLETED"),
            Self::Cancelled => f.write_str("CANCELLED"),
            Self::Failed => f.write_str("FAILED"),
        }
    }
}

/// Immutable terminal snapshot, produced exactly once per instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: String,
    pub status: OrderStatus,
    pub charged: bool,
    pub brewed: bool,
    pub receipt_sent: bool,
    pub amount_cents: i64,
}

impl OrderResult {
    /// Build a result from the workflow's state at termination.
    pub fn from_state(order_id: impl Into<String>, status: OrderStatus, state: &OrderState) -> Self {
        Self {
            order_id: order_id.into(),
            status,
            charged: state.charged,
            brewed: state.brewed,
            receipt_sent: state.receipt_sent,
            amount_cents: state.amount_cents,
        }
    }

    /// Check that the flags agree with the status.
    ///
    /// COMPLETED requires every step; FAILED requires at least one missing
    /// step. Flags must also respect step order (no brew without a charge,
    /// no receipt without a brew).
    pub fn is_consistent(&self) -> bool {
        let ordered = (!self.brewed || self.charged) && (!self.receipt_sent || self.brewed);
        let status_ok = match self.status {
            OrderStatus::Completed => self.charged && self.brewed && self.receipt_sent,
            OrderStatus::Failed => !(self.charged && self.brewed && self.receipt_sent),
            OrderStatus::Cancelled => true,
        };
        ordered && status_ok
    }
}

// ---------------------------------------------------------------------------
// Activity payloads
// ---------------------------------------------------------------------------

/// Payload for the `charge_customer` activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeInput {
    pub order_id: String,
    pub amount_cents: i64,
}

impl ChargeInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount_cents < 0 {
            return Err(ValidationError::NegativeAmount(self.amount_cents));
        }
        Ok(())
    }
}

/// Payload for the `brew_coffee` activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewInput {
    pub order_id: String,
    pub drink: Drink,
    pub size: DrinkSize,
}

/// Payload for the `send_receipt` activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptInput {
    pub order_id: String,
    /// Short human-readable summary included in the receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

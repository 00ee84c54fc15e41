// Single home for every invoice status rule.
//
// Automatic transitions (payments, time) are evaluated by `resolve` in strict
// priority order on every recompute. Explicit lifecycle actions (send, view,
// cancel) go through `apply_action`, which only ever moves the stage forward
// or into `cancelled`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::core::{AppError, Result};
use crate::modules::invoices::models::{InvoiceStatus, LifecycleStage};

/// Everything the automatic rules look at
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs {
    pub current: InvoiceStatus,
    pub stage: LifecycleStage,
    pub amount_paid: Decimal,
    pub total_amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

/// Explicit lifecycle actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    Send,
    View,
    Cancel,
}

impl std::fmt::Display for StatusAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusAction::Send => write!(f, "send"),
            StatusAction::View => write!(f, "view"),
            StatusAction::Cancel => write!(f, "cancel"),
        }
    }
}

/// Effect of an accepted explicit action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionEffect {
    pub stage: LifecycleStage,
    pub cancel: bool,
    /// The action had nothing to change (e.g. cancelling twice)
    pub noop: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StatusResolver;

impl StatusResolver {
    pub fn new() -> Self {
        Self
    }

    /// Derive the status from payments, totals and time
    ///
    /// 1. cancelled stays cancelled
    /// 2. amount_paid ≥ total_amount > 0 → paid
    /// 3. 0 < amount_paid < total_amount → partially_paid
    /// 4. amount_due > 0, now > due_date, stage past draft → overdue
    /// 5. otherwise the last explicit stage
    pub fn resolve(&self, inputs: &StatusInputs) -> InvoiceStatus {
        if inputs.current.is_terminal() {
            return inputs.current;
        }

        let amount_due = inputs.total_amount - inputs.amount_paid;

        if inputs.total_amount > Decimal::ZERO && inputs.amount_paid >= inputs.total_amount {
            InvoiceStatus::Paid
        } else if inputs.amount_paid > Decimal::ZERO && inputs.amount_paid < inputs.total_amount {
            InvoiceStatus::PartiallyPaid
        } else if amount_due > Decimal::ZERO
            && inputs.now > inputs.due_date
            && inputs.stage != LifecycleStage::Draft
        {
            InvoiceStatus::Overdue
        } else {
            inputs.stage.as_status()
        }
    }

    /// Check an explicit action against the transition table
    pub fn apply_action(
        &self,
        action: StatusAction,
        current: InvoiceStatus,
        stage: LifecycleStage,
    ) -> Result<ActionEffect> {
        if current == InvoiceStatus::Cancelled {
            return match action {
                StatusAction::Cancel => Ok(ActionEffect {
                    stage,
                    cancel: true,
                    noop: true,
                }),
                _ => Err(AppError::validation(format!(
                    "Cannot {} a cancelled invoice",
                    action
                ))),
            };
        }

        match action {
            StatusAction::Send => {
                if current == InvoiceStatus::Paid {
                    return Err(AppError::validation("Cannot send an invoice that is already paid"));
                }
                Ok(ActionEffect {
                    stage: stage.max(LifecycleStage::Sent),
                    cancel: false,
                    noop: stage >= LifecycleStage::Sent,
                })
            }
            StatusAction::View => {
                if stage == LifecycleStage::Draft {
                    return Err(AppError::validation(
                        "Cannot mark a draft invoice as viewed before it is sent",
                    ));
                }
                Ok(ActionEffect {
                    stage: stage.max(LifecycleStage::Viewed),
                    cancel: false,
                    noop: stage >= LifecycleStage::Viewed,
                })
            }
            StatusAction::Cancel => {
                if current == InvoiceStatus::Paid {
                    return Err(AppError::validation("Cannot cancel a paid invoice"));
                }
                Ok(ActionEffect {
                    stage,
                    cancel: true,
                    noop: false,
                })
            }
        }
    }
}

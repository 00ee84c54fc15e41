use serde::{Deserialize, Serialize};

/// Invoice status lifecycle
///
/// `draft → sent → viewed → {partially_paid, paid, overdue} → cancelled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Created, not yet delivered to the client
    #[default]
    Draft,

    /// Delivered to the client
    Sent,

    /// Client opened the invoice link
    Viewed,

    /// Some money received, balance outstanding
    PartiallyPaid,

    /// Payments cover the total
    Paid,

    /// Past due date with a balance outstanding
    Overdue,

    /// Voided; terminal
    Cancelled,
}

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Viewed => "viewed",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "sent" => Ok(InvoiceStatus::Sent),
            "viewed" => Ok(InvoiceStatus::Viewed),
            "partially_paid" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            _ => Err(format!("Invalid invoice status: {}", s)),
        }
    }
}

/// Last explicit delivery stage, set only by user/client actions
///
/// Ordered: a stage never moves backward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    #[default]
    Draft,
    Sent,
    Viewed,
}

impl LifecycleStage {
    pub fn as_status(&self) -> InvoiceStatus {
        match self {
            LifecycleStage::Draft => InvoiceStatus::Draft,
            LifecycleStage::Sent => InvoiceStatus::Sent,
            LifecycleStage::Viewed => InvoiceStatus::Viewed,
        }
    }
}

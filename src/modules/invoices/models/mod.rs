mod invoice;
mod line_item;
mod status;

pub use invoice::{
    generate_invoice_number, BrandingSnapshot, ClientSnapshot, CreateInvoiceRequest, Invoice,
    InvoiceDefaults,
};
pub use line_item::{LineItem, LineItemInput, LineItemPatch, LineItemSet};
pub use status::{InvoiceStatus, LifecycleStage};

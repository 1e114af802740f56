pub use customers::Customer;
pub use error::EngineError;
pub use invoices::{Invoice, InvoiceDraft};
pub use ops::{BalanceAudit, Engine, EngineBuilder};
pub use payments::{Payment, PaymentDraft, PaymentMethod, PostedPayment};
pub use reconciliations::{DailyReconciliation, ReconciliationStatus};
pub use truck_loads::{TruckLoad, TruckLoadStatus};
pub use trucks::Truck;

mod customers;
mod error;
mod invoices;
mod ops;
mod payments;
mod reconciliations;
mod sequences;
mod truck_loads;
mod trucks;
mod util;
mod variance;

type ResultEngine<T> = Result<T, EngineError>;

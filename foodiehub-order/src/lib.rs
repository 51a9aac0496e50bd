pub mod cart;
pub mod checkout;
pub mod fulfillment;
pub mod pricing;
pub mod query;
pub mod writer;

pub use cart::{Cart, CartError, CartLine};
pub use checkout::{CancelOutcome, CheckoutCoordinator, CheckoutError, CheckoutStarted};
pub use fulfillment::{AdvanceOutcome, FulfillmentStateMachine, TransitionError};
pub use pricing::{compute_total, PricingError};
pub use query::{OrderDetails, OrderLineView, OrderListing, OrderQueryService, QueryError};
pub use writer::{NewOrder, OrderWriter, WriteError, WriteOutcome};

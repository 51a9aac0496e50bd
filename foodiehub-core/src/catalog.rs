use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vendor {
    pub id: Uuid,
    pub name: String,
    pub cuisine: Option<String>,
}

/// A menu item as currently listed. Orders never reference this live; they
/// copy name and price into their lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MenuItem {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub price: Money,
    pub category: Option<String>,
}

/// Delivery profile shown to administrators alongside an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerProfile {
    pub customer_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub delivery_instructions: Option<String>,
}

use foodiehub_core::catalog::MenuItem;
use foodiehub_core::money::Money;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One selected menu item. Name and price are copied when the item is added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    pub menu_item_id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Client-held selection of items from a single vendor. Never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of `item`, merging with an existing line for the same item.
    pub fn add_item(&mut self, item: &MenuItem) -> Result<(), CartError> {
        if let Some(vendor_id) = self.vendor_id() {
            if vendor_id != item.vendor_id {
                return Err(CartError::MixedVendors {
                    existing: vendor_id,
                    incoming: item.vendor_id,
                });
            }
        }

        match self.lines.iter_mut().find(|l| l.menu_item_id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(CartLine {
                menu_item_id: item.id,
                vendor_id: item.vendor_id,
                name: item.name.clone(),
                unit_price: item.price,
                quantity: 1,
            }),
        }
        Ok(())
    }

    /// Adjusts a line by `delta`, floored at zero. A line reaching zero is
    /// removed; an unknown item is ignored.
    pub fn update_quantity(&mut self, menu_item_id: Uuid, delta: i64) {
        let Some(pos) = self.lines.iter().position(|l| l.menu_item_id == menu_item_id) else {
            return;
        };

        let updated = (i64::from(self.lines[pos].quantity) + delta).clamp(0, i64::from(u32::MAX));
        if updated == 0 {
            self.lines.remove(pos);
        } else {
            self.lines[pos].quantity = updated as u32;
        }
    }

    pub fn remove_item(&mut self, menu_item_id: Uuid) {
        self.lines.retain(|l| l.menu_item_id != menu_item_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Vendor of the first line; the cart is empty when this is `None`.
    pub fn vendor_id(&self) -> Option<Uuid> {
        self.lines.first().map(|l| l.vendor_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Checks that the cart can be turned into an order.
    pub fn validate(&self) -> Result<(), CartError> {
        let vendor_id = self.vendor_id().ok_or(CartError::EmptyCart)?;

        for line in &self.lines {
            if line.vendor_id != vendor_id {
                return Err(CartError::MixedVendors {
                    existing: vendor_id,
                    incoming: line.vendor_id,
                });
            }
            if line.quantity == 0 {
                return Err(CartError::ZeroQuantity(line.menu_item_id));
            }
        }
        Ok(())
    }
}

/// Builds a cart from lines priced elsewhere, e.g. from a checkout request.
impl TryFrom<Vec<CartLine>> for Cart {
    type Error = CartError;

    fn try_from(lines: Vec<CartLine>) -> Result<Self, Self::Error> {
        let cart = Cart { lines };
        cart.validate()?;
        Ok(cart)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart holds items from vendor {existing}; cannot add items from vendor {incoming}")]
    MixedVendors { existing: Uuid, incoming: Uuid },

    #[error("Line for menu item {0} has zero quantity")]
    ZeroQuantity(Uuid),
}

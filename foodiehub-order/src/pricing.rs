use foodiehub_core::money::Money;

use crate::cart::{Cart, CartLine};

/// Unit price times quantity for a single line.
pub fn line_total(line: &CartLine) -> Result<Money, PricingError> {
    line.unit_price
        .checked_mul(line.quantity)
        .ok_or(PricingError::Overflow)
}

/// Sum of all line totals in minor units. Recomputed from the lines on every
/// call; an empty cart totals zero.
pub fn compute_total(cart: &Cart) -> Result<Money, PricingError> {
    cart.lines().iter().try_fold(Money::ZERO, |acc, line| {
        if line.unit_price.is_negative() {
            return Err(PricingError::NegativePrice(line.menu_item_id.to_string()));
        }
        acc.checked_add(line_total(line)?).ok_or(PricingError::Overflow)
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Order total exceeds the representable amount")]
    Overflow,

    #[error("Menu item {0} has a negative price")]
    NegativePrice(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodiehub_core::catalog::MenuItem;
    use uuid::Uuid;

    fn priced(vendor_id: Uuid, price: i64) -> MenuItem {
        MenuItem {
            id: Uuid::new_v4(),
            vendor_id,
            name: format!("Item {price}"),
            price: Money::from_minor(price),
            category: None,
        }
    }

    #[test]
    fn test_total_for_mixed_quantities() {
        let vendor = Uuid::new_v4();
        let a = priced(vendor, 1200);
        let b = priced(vendor, 500);
        let mut cart = Cart::new();
        cart.add_item(&a).unwrap();
        cart.add_item(&a).unwrap();
        cart.add_item(&b).unwrap();

        assert_eq!(compute_total(&cart).unwrap(), Money::from_minor(2900));
        // Same answer on a second call
        assert_eq!(compute_total(&cart).unwrap(), Money::from_minor(2900));
    }

    #[test]
    fn test_empty_cart_is_zero() {
        assert_eq!(compute_total(&Cart::new()).unwrap(), Money::ZERO);
    }

    #[test]
    fn test_overflow_reported() {
        let vendor = Uuid::new_v4();
        let pricey = priced(vendor, i64::MAX / 2 + 1);
        let mut cart = Cart::new();
        cart.add_item(&pricey).unwrap();
        cart.add_item(&pricey).unwrap();

        assert_eq!(compute_total(&cart), Err(PricingError::Overflow));
    }

    #[test]
    fn test_negative_price_rejected() {
        let mut cart = Cart::new();
        cart.add_item(&priced(Uuid::new_v4(), -1)).unwrap();

        assert!(matches!(compute_total(&cart), Err(PricingError::NegativePrice(_))));
    }
}

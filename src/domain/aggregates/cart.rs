//! Cart Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{Money, Quantity, ValueError};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    id: String,
    customer_id: Option<String>,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// One cart row. `unit_price` is the price snapshot taken when the product was added.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub line_id: String,
    pub product_id: String,
    pub category_id: String,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, category_id: impl Into<String>, unit_price: Money, quantity: Quantity) -> Self {
        Self { line_id: Uuid::new_v4().to_string(), product_id: product_id.into(), category_id: category_id.into(), unit_price, quantity }
    }

    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity.value()) }

    fn line_total_checked(&self) -> Result<Money, ValueError> { self.unit_price.checked_multiply(self.quantity.value()) }
}

impl Cart {
    pub fn new() -> Self {
        let now = Utc::now();
        Self { id: Uuid::new_v4().to_string(), customer_id: None, lines: vec![], created_at: now, updated_at: now }
    }

    pub fn for_customer(customer_id: impl Into<String>) -> Self {
        let mut cart = Self::new();
        cart.customer_id = Some(customer_id.into());
        cart
    }

    /// Builds a cart from already-identified lines, merging nothing and
    /// skipping the [`Money::MAX`] check. Untrusted input goes through [`Cart::add_line`].
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self::new();
        cart.lines = lines;
        cart
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn customer_id(&self) -> Option<&str> { self.customer_id.as_deref() }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, line_id: &str) -> Option<&CartLine> { self.lines.iter().find(|l| l.line_id == line_id) }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Always derived from the current lines.
    pub fn subtotal(&self) -> Money { self.lines.iter().map(CartLine::line_total).sum() }

    /// Adds a line, merging into an existing one for the same product at the same snapshot price.
    /// Returns the id of the line that now holds the quantity.
    ///
    /// The cart is left untouched when the new subtotal would exceed [`Money::MAX`].
    pub fn add_line(&mut self, line: CartLine) -> Result<String, CartError> {
        self.subtotal().checked_add(line.line_total_checked()?)?;
        let id = if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == line.product_id && l.unit_price == line.unit_price) {
            let merged = existing.quantity.value().checked_add(line.quantity.value())
                .ok_or(CartError::QuantityOutOfRange(i64::from(existing.quantity.value()) + i64::from(line.quantity.value())))?;
            existing.quantity = Quantity::new(merged)?;
            existing.line_id.clone()
        } else {
            let id = line.line_id.clone();
            self.lines.push(line);
            id
        };
        self.touch();
        Ok(id)
    }

    /// Sets a line's quantity; zero or negative removes the line.
    pub fn update_quantity(&mut self, line_id: &str, quantity: i64) -> Result<(), CartError> {
        let index = self.lines.iter().position(|l| l.line_id == line_id).ok_or_else(|| CartError::LineNotFound(line_id.to_string()))?;
        match u32::try_from(quantity).ok().and_then(|q| Quantity::new(q).ok()) {
            Some(q) => {
                let line = &self.lines[index];
                let resized = line.unit_price.checked_multiply(q.value())?;
                self.subtotal().saturating_sub(line.line_total()).checked_add(resized)?;
                self.lines[index].quantity = q;
            }
            None if quantity <= 0 => { self.lines.remove(index); }
            None => return Err(CartError::QuantityOutOfRange(quantity)),
        }
        self.touch();
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: &str) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.line_id != line_id);
        if self.lines.len() == before { return Err(CartError::LineNotFound(line_id.to_string())); }
        self.touch();
        Ok(())
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

impl Default for Cart {
    fn default() -> Self { Self::new() }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart line not found: {0}")]
    LineNotFound(String),
    #[error("quantity out of range: {0}")]
    QuantityOutOfRange(i64),
    #[error(transparent)]
    Amount(#[from] ValueError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(qty: u32, price: u64) -> CartLine {
        CartLine::new("RING-1", "rings", Money::from_major(price), Quantity::new(qty).unwrap())
    }

    #[test]
    fn test_cart_operations() {
        let mut cart = Cart::new();
        let id = cart.add_line(ring(2, 10)).unwrap();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.subtotal(), Money::from_major(20));
        let merged = cart.add_line(ring(1, 10)).unwrap();
        assert_eq!(merged, id);
        assert_eq!(cart.lines()[0].quantity.value(), 3);
    }

    #[test]
    fn test_different_snapshot_price_is_a_new_line() {
        let mut cart = Cart::new();
        cart.add_line(ring(1, 10)).unwrap();
        cart.add_line(ring(1, 12)).unwrap();
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.subtotal(), Money::from_major(22));
    }

    #[test]
    fn test_zero_or_negative_quantity_removes_line() {
        let mut cart = Cart::new();
        let id = cart.add_line(ring(2, 10)).unwrap();
        cart.update_quantity(&id, 5).unwrap();
        assert_eq!(cart.subtotal(), Money::from_major(50));
        cart.update_quantity(&id, -1).unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Money::ZERO);
    }

    #[test]
    fn test_unknown_line() {
        let mut cart = Cart::new();
        assert_eq!(cart.remove_line("nope"), Err(CartError::LineNotFound("nope".into())));
        assert!(cart.update_quantity("nope", 1).is_err());
    }

    #[test]
    fn test_clear() {
        let mut cart = Cart::for_customer("cust-1");
        cart.add_line(ring(1, 10)).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal(), Money::ZERO);
        assert_eq!(cart.customer_id(), Some("cust-1"));
    }

    #[test]
    fn test_line_past_max_subtotal_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        let id = cart.add_line(ring(1, 10)).unwrap();
        let huge = CartLine::new("CROWN", "crowns", Money::MAX, Quantity::new(2).unwrap());
        assert_eq!(cart.add_line(huge), Err(CartError::Amount(ValueError::Overflow)));
        assert_eq!(cart.add_line(ring(1, 999_999_999_991)), Err(CartError::Amount(ValueError::Overflow)));
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.subtotal(), Money::from_major(10));

        let gem = cart.add_line(CartLine::new("GEM", "gems", Money::from_major(1000), Quantity::new(1).unwrap())).unwrap();
        assert_eq!(cart.update_quantity(&gem, 2_000_000_000), Err(CartError::Amount(ValueError::Overflow)));
        assert_eq!(cart.line(&gem).unwrap().quantity.value(), 1);
        assert_eq!(cart.line(&id).unwrap().quantity.value(), 1);
    }

    #[test]
    fn test_merging_past_u32_quantity_is_rejected() {
        let mut cart = Cart::new();
        let cheap = |qty| CartLine::new("PIN", "pins", Money::ZERO, Quantity::new(qty).unwrap());
        cart.add_line(cheap(u32::MAX)).unwrap();
        assert!(matches!(cart.add_line(cheap(1)), Err(CartError::QuantityOutOfRange(_))));
        assert_eq!(cart.lines()[0].quantity.value(), u32::MAX);
    }
}

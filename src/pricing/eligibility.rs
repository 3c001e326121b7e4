//! Eligibility filter: which cart lines a promotion's scope reaches.

use crate::domain::aggregates::{CartLine, OfferScope};
use crate::domain::value_objects::Money;

/// Lines a promotion applies to, with their aggregate quantity and value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eligibility<'a> {
    pub lines: Vec<&'a CartLine>,
    /// Summed wide so many large lines cannot wrap.
    pub quantity: u64,
    pub value: Money,
}

impl<'a> Eligibility<'a> {
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
}

/// Filters `lines` by `scope`. Product and category restrictions compose with AND;
/// `None` (or an unrestricted scope) keeps every line.
pub fn filter<'a>(lines: &'a [CartLine], scope: Option<&OfferScope>) -> Eligibility<'a> {
    let products = scope.and_then(|s| s.product_ids.as_ref()).filter(|ids| !ids.is_empty());
    let categories = scope.and_then(|s| s.category_ids.as_ref()).filter(|ids| !ids.is_empty());

    let lines: Vec<&CartLine> = lines
        .iter()
        .filter(|l| products.map_or(true, |ids| ids.contains(&l.product_id)))
        .filter(|l| categories.map_or(true, |ids| ids.contains(&l.category_id)))
        .collect();
    let quantity = lines.iter().map(|l| u64::from(l.quantity.value())).sum();
    let value = lines.iter().map(|l| l.line_total()).sum();
    Eligibility { lines, quantity, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Quantity;

    fn line(product: &str, category: &str, price: u64, qty: u32) -> CartLine {
        CartLine::new(product, category, Money::from_major(price), Quantity::new(qty).unwrap())
    }

    fn cart() -> Vec<CartLine> {
        vec![line("E1", "earrings", 100, 1), line("E2", "earrings", 150, 2), line("R1", "rings", 900, 1)]
    }

    #[test]
    fn test_no_scope_keeps_everything() {
        let lines = cart();
        let e = filter(&lines, None);
        assert_eq!(e.lines.len(), 3);
        assert_eq!(e.quantity, 4);
        assert_eq!(e.value, Money::from_major(1300));
    }

    #[test]
    fn test_category_scope() {
        let lines = cart();
        let e = filter(&lines, Some(&OfferScope::categories(["earrings"])));
        assert_eq!(e.quantity, 3);
        assert_eq!(e.value, Money::from_major(400));
    }

    #[test]
    fn test_product_and_category_compose_with_and() {
        let lines = cart();
        let scope = OfferScope { category_ids: OfferScope::categories(["earrings"]).category_ids, ..OfferScope::products(["E1", "R1"]) };
        let e = filter(&lines, Some(&scope));
        assert_eq!(e.lines.len(), 1);
        assert_eq!(e.lines[0].product_id, "E1");
    }

    #[test]
    fn test_empty_sets_do_not_restrict() {
        let lines = cart();
        let scope = OfferScope { product_ids: Some(Default::default()), category_ids: None };
        assert_eq!(filter(&lines, Some(&scope)).lines.len(), 3);
    }

    #[test]
    fn test_nothing_eligible() {
        let lines = cart();
        let e = filter(&lines, Some(&OfferScope::categories(["necklaces"])));
        assert!(e.is_empty());
        assert_eq!(e.value, Money::ZERO);
    }
}

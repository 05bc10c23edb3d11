use serde::{Deserialize, Serialize};

use storefront_core::{CartId, DomainError, DomainResult, ProductId, RowVersion, UserId, Versioned};

/// A (product, quantity) line in a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Result of decreasing a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecreaseOutcome {
    /// The line is still in the cart with this quantity.
    Decreased { remaining: i32 },
    /// The quantity reached zero or below and the line was removed.
    Removed,
}

/// Entity: ShoppingCart.
///
/// Lines keep insertion order, which is the order checkout validates them in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingCart {
    id: Option<CartId>,
    user_id: UserId,
    items: Vec<CartItem>,
    row_version: RowVersion,
}

impl ShoppingCart {
    /// A fresh cart for a user that does not have one yet (not persisted).
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: None,
            user_id,
            items: Vec::new(),
            row_version: RowVersion::INITIAL,
        }
    }

    /// Rehydrate a stored cart.
    ///
    /// Lines are taken as stored. Quantities are re-validated at checkout, not
    /// here, so a damaged row still loads and is reported there.
    pub fn restore(id: CartId, user_id: UserId, items: Vec<CartItem>, row_version: RowVersion) -> Self {
        Self {
            id: Some(id),
            user_id,
            items,
            row_version,
        }
    }

    /// Returns a copy of this cart as persisted under `id` at `row_version`.
    pub fn persisted(mut self, id: CartId, row_version: RowVersion) -> Self {
        self.id = Some(id);
        self.row_version = row_version;
        self
    }

    pub fn id(&self) -> Option<CartId> {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i64::from(i.quantity)).sum()
    }

    /// Add `quantity` of a product. An existing line is incremented rather
    /// than duplicated. Returns the line's new quantity.
    ///
    /// Stock is not consulted; carts may hold more than is available.
    pub fn add_item(&mut self, product_id: ProductId, quantity: i32) -> DomainResult<i32> {
        if quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be positive, got {quantity}"
            )));
        }

        if let Some(line) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or_else(|| DomainError::validation("cart line quantity overflow"))?;
            return Ok(line.quantity);
        }

        self.items.push(CartItem {
            product_id,
            quantity,
        });
        Ok(quantity)
    }

    /// Decrease a line by `amount`, removing it once the quantity drops to
    /// zero or below. A zero-or-negative line is never kept.
    pub fn decrease_item(&mut self, product_id: ProductId, amount: i32) -> DomainResult<DecreaseOutcome> {
        if amount <= 0 {
            return Err(DomainError::validation(format!(
                "amount must be positive, got {amount}"
            )));
        }

        let idx = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or_else(DomainError::not_found)?;

        let remaining = self.items[idx].quantity.saturating_sub(amount);
        if remaining <= 0 {
            self.items.remove(idx);
            Ok(DecreaseOutcome::Removed)
        } else {
            self.items[idx].quantity = remaining;
            Ok(DecreaseOutcome::Decreased { remaining })
        }
    }

    /// Remove every line. Returns how many lines were removed.
    pub fn clear(&mut self) -> usize {
        let n = self.items.len();
        self.items.clear();
        n
    }
}

impl Versioned for ShoppingCart {
    fn row_version(&self) -> RowVersion {
        self.row_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> UserId {
        UserId::parse("user-1").unwrap()
    }

    fn pid(raw: i64) -> ProductId {
        ProductId::from_raw(raw)
    }

    #[test]
    fn new_cart_is_empty_and_unpersisted() {
        let cart = ShoppingCart::new(test_user());
        assert!(cart.is_empty());
        assert_eq!(cart.id(), None);
        assert_eq!(cart.row_version(), RowVersion::INITIAL);
    }

    #[test]
    fn adding_existing_product_increments_line() {
        let mut cart = ShoppingCart::new(test_user());
        assert_eq!(cart.add_item(pid(1), 2).unwrap(), 2);
        assert_eq!(cart.add_item(pid(2), 1).unwrap(), 1);
        assert_eq!(cart.add_item(pid(1), 3).unwrap(), 5);

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.item(pid(1)).unwrap().quantity, 5);
        assert_eq!(cart.total_quantity(), 6);
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut cart = ShoppingCart::new(test_user());
        for raw in [5, 3, 9] {
            cart.add_item(pid(raw), 1).unwrap();
        }
        cart.add_item(pid(3), 1).unwrap();
        let order: Vec<i64> = cart.items().iter().map(|i| i.product_id.get()).collect();
        assert_eq!(order, vec![5, 3, 9]);
    }

    #[test]
    fn non_positive_add_is_rejected() {
        let mut cart = ShoppingCart::new(test_user());
        match cart.add_item(pid(1), 0) {
            Err(DomainError::Validation(msg)) if msg.contains("quantity must be positive") => {}
            other => panic!("Expected Validation error, got {other:?}"),
        }
        assert!(cart.is_empty());
    }

    #[test]
    fn add_overflow_is_rejected_without_change() {
        let mut cart = ShoppingCart::new(test_user());
        cart.add_item(pid(1), i32::MAX).unwrap();
        assert!(cart.add_item(pid(1), 1).is_err());
        assert_eq!(cart.item(pid(1)).unwrap().quantity, i32::MAX);
    }

    #[test]
    fn decrease_keeps_line_while_positive() {
        let mut cart = ShoppingCart::new(test_user());
        cart.add_item(pid(1), 5).unwrap();
        assert_eq!(
            cart.decrease_item(pid(1), 2).unwrap(),
            DecreaseOutcome::Decreased { remaining: 3 }
        );
        assert_eq!(cart.item(pid(1)).unwrap().quantity, 3);
    }

    #[test]
    fn decrease_to_zero_or_below_removes_line() {
        let mut cart = ShoppingCart::new(test_user());
        cart.add_item(pid(1), 2).unwrap();
        cart.add_item(pid(2), 2).unwrap();

        assert_eq!(cart.decrease_item(pid(1), 2).unwrap(), DecreaseOutcome::Removed);
        assert_eq!(cart.decrease_item(pid(2), 10).unwrap(), DecreaseOutcome::Removed);
        assert!(cart.is_empty());
    }

    #[test]
    fn decrease_unknown_line_is_not_found() {
        let mut cart = ShoppingCart::new(test_user());
        cart.add_item(pid(1), 1).unwrap();
        assert_eq!(cart.decrease_item(pid(2), 1), Err(DomainError::NotFound));
    }

    #[test]
    fn clear_removes_all_lines_but_keeps_identity() {
        let mut cart = ShoppingCart::new(test_user()).persisted(CartId::from_raw(3), RowVersion::new(2));
        cart.add_item(pid(1), 1).unwrap();
        cart.add_item(pid(2), 1).unwrap();

        assert_eq!(cart.clear(), 2);
        assert!(cart.is_empty());
        assert_eq!(cart.id(), Some(CartId::from_raw(3)));
        assert_eq!(cart.user_id(), &test_user());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_cart() -> impl Strategy<Value = ShoppingCart> {
            prop::collection::vec((1i64..20, 1i32..50), 0..10).prop_map(|lines| {
                let mut cart = ShoppingCart::new(test_user());
                for (p, q) in lines {
                    cart.add_item(pid(p), q).unwrap();
                }
                cart
            })
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: adding then decreasing by the same amount restores the prior item set.
            #[test]
            fn add_then_decrease_restores_cart(
                cart in arb_cart(),
                product in 1i64..25,
                qty in 1i32..100
            ) {
                let before = cart.clone();
                let mut cart = cart;

                cart.add_item(pid(product), qty).unwrap();
                cart.decrease_item(pid(product), qty).unwrap();

                prop_assert_eq!(cart.items(), before.items());
            }

            /// Property: lines are unique per product and never hold a non-positive quantity.
            #[test]
            fn lines_stay_unique_and_positive(
                ops in prop::collection::vec((any::<bool>(), 1i64..6, 1i32..10), 0..60)
            ) {
                let mut cart = ShoppingCart::new(test_user());
                for (add, p, q) in ops {
                    if add {
                        cart.add_item(pid(p), q).unwrap();
                    } else {
                        let _ = cart.decrease_item(pid(p), q);
                    }
                }

                let mut seen = std::collections::HashSet::new();
                for line in cart.items() {
                    prop_assert!(line.quantity >= 1);
                    prop_assert!(seen.insert(line.product_id));
                }
            }
        }
    }
}

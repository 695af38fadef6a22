//! Purchase intent value objects.
//!
//! A purchase intent pairs a user with a product (membership duration or
//! registration category), a computed price, and an optional discount. It is
//! constructed at checkout and immutable once a charge is attempted; each
//! product kind carries its own payload shape so the wrong metadata cannot be
//! supplied to the wrong path.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The product being purchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProductSelection {
    /// A membership for a fixed number of months.
    #[serde(rename_all = "camelCase")]
    Membership { duration_months: u32 },
    /// One slot in a capacity-limited registration category.
    #[serde(rename_all = "camelCase")]
    Registration {
        category_id: Uuid,
        /// Hold created during checkout, when the category is capacity-limited.
        reservation_id: Option<Uuid>,
    },
}

impl ProductSelection {
    /// Registration linkage for staging rows; `None` for memberships.
    pub fn registration_id(&self) -> Option<Uuid> {
        match self {
            Self::Membership { .. } => None,
            Self::Registration { category_id, .. } => Some(*category_id),
        }
    }

    /// Reservation held for this purchase, if any.
    pub fn reservation_id(&self) -> Option<Uuid> {
        match self {
            Self::Membership { .. } => None,
            Self::Registration { reservation_id, .. } => *reservation_id,
        }
    }

    /// Human-readable line-item description.
    pub fn description(&self) -> String {
        match self {
            Self::Membership { duration_months } => {
                format!("Membership ({duration_months} months)")
            }
            Self::Registration { category_id, .. } => {
                format!("Event registration {category_id}")
            }
        }
    }
}

/// A discount applied to a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountApplication {
    pub code: String,
    pub amount_saved_minor: i64,
    /// Registration scope of the usage row; uniqueness per
    /// `(user, code, registration)` prevents double counting on retries.
    pub registration_id: Uuid,
}

/// Contact details captured at checkout for later ledger-contact creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetails {
    pub name: String,
    pub email: Option<String>,
}

/// Everything the staging manager needs to build ledger staging rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseStagingRequest {
    pub user_id: Uuid,
    pub product: ProductSelection,
    pub contact: ContactDetails,
    pub total_minor: i64,
    pub discount: Option<DiscountApplication>,
}

impl PurchaseStagingRequest {
    /// Discount amount, zero when no discount applies.
    pub fn discount_minor(&self) -> i64 {
        self.discount
            .as_ref()
            .map_or(0, |discount| discount.amount_saved_minor)
    }

    /// Amount actually charged.
    pub fn net_minor(&self) -> i64 {
        self.total_minor - self.discount_minor()
    }
}

/// Flags selecting the staging construction path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagingOptions {
    /// Zero-value purchase: authorised immediately, gateway never consulted.
    pub is_free: bool,
    /// Instalment purchase: stage all instalments up front.
    pub is_payment_plan: bool,
    /// Number of instalments when `is_payment_plan` is set.
    pub installments: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(total: i64, discount: Option<DiscountApplication>) -> PurchaseStagingRequest {
        PurchaseStagingRequest {
            user_id: Uuid::new_v4(),
            product: ProductSelection::Membership { duration_months: 12 },
            contact: ContactDetails {
                name: "Ada Lovelace".to_owned(),
                email: Some("ada@example.org".to_owned()),
            },
            total_minor: total,
            discount,
        }
    }

    #[test]
    fn net_amount_subtracts_discount() {
        let registration_id = Uuid::new_v4();
        let discounted = request(
            10_000,
            Some(DiscountApplication {
                code: "EARLYBIRD".to_owned(),
                amount_saved_minor: 2_500,
                registration_id,
            }),
        );
        assert_eq!(discounted.discount_minor(), 2_500);
        assert_eq!(discounted.net_minor(), 7_500);

        let full_price = request(10_000, None);
        assert_eq!(full_price.net_minor(), 10_000);
    }

    #[test]
    fn product_payload_deserialises_by_tag() {
        let value = serde_json::json!({
            "kind": "registration",
            "categoryId": "6f2f9a30-9a52-4d8a-9a4e-07d9ac4f2f01",
            "reservationId": null,
        });
        let product: ProductSelection =
            serde_json::from_value(value).expect("tagged product deserialises");
        assert!(matches!(product, ProductSelection::Registration { .. }));
        assert!(product.registration_id().is_some());
        assert!(product.reservation_id().is_none());
    }
}

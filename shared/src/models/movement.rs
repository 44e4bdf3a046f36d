//! Stock movement vocabulary shared by products and ingredients

use serde::{Deserialize, Serialize};

/// Which stock-tracked entity a ledger entry applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Ingredient,
}

impl EntityKind {
    /// Table holding the entity and its `stock_quantity`
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Product => "products",
            EntityKind::Ingredient => "ingredients",
        }
    }

    /// Append-only movement table for the entity
    pub fn movement_table(&self) -> &'static str {
        match self {
            EntityKind::Product => "inventory_movements",
            EntityKind::Ingredient => "ingredient_movements",
        }
    }

    /// Foreign key column in the movement table
    pub fn movement_fk(&self) -> &'static str {
        match self {
            EntityKind::Product => "product_id",
            EntityKind::Ingredient => "ingredient_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Product => "Product",
            EntityKind::Ingredient => "Ingredient",
        }
    }
}

/// Semantic type of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Transfer,
    /// Consumption of an ingredient while producing or selling a composite product
    Usage,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
            MovementType::Transfer => "transfer",
            MovementType::Usage => "usage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "adjustment" => Some(MovementType::Adjustment),
            "transfer" => Some(MovementType::Transfer),
            "usage" => Some(MovementType::Usage),
            _ => None,
        }
    }

    /// `usage` only exists in the ingredient ledger
    pub fn applies_to(&self, kind: EntityKind) -> bool {
        !matches!((self, kind), (MovementType::Usage, EntityKind::Product))
    }
}

/// Business event that caused a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Sale,
    ManualAdjustment,
    TransferIn,
    TransferOut,
    Manufacturing,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Sale => "sale",
            ReferenceType::ManualAdjustment => "manual_adjustment",
            ReferenceType::TransferIn => "transfer_in",
            ReferenceType::TransferOut => "transfer_out",
            ReferenceType::Manufacturing => "manufacturing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(ReferenceType::Sale),
            "manual_adjustment" => Some(ReferenceType::ManualAdjustment),
            "transfer_in" => Some(ReferenceType::TransferIn),
            "transfer_out" => Some(ReferenceType::TransferOut),
            "manufacturing" => Some(ReferenceType::Manufacturing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_type_round_trips_through_str() {
        for mt in [
            MovementType::In,
            MovementType::Out,
            MovementType::Adjustment,
            MovementType::Transfer,
            MovementType::Usage,
        ] {
            assert_eq!(MovementType::from_str(mt.as_str()), Some(mt));
        }
        assert_eq!(MovementType::from_str("sale"), None);
    }

    #[test]
    fn test_usage_is_ingredient_only() {
        assert!(MovementType::Usage.applies_to(EntityKind::Ingredient));
        assert!(!MovementType::Usage.applies_to(EntityKind::Product));
        assert!(MovementType::Transfer.applies_to(EntityKind::Product));
    }

    #[test]
    fn test_reference_type_serializes_snake_case() {
        let json = serde_json::to_string(&ReferenceType::ManualAdjustment).unwrap();
        assert_eq!(json, "\"manual_adjustment\"");
        assert_eq!(
            ReferenceType::from_str("transfer_out"),
            Some(ReferenceType::TransferOut)
        );
    }

    #[test]
    fn test_entity_tables() {
        assert_eq!(EntityKind::Product.movement_table(), "inventory_movements");
        assert_eq!(EntityKind::Ingredient.movement_fk(), "ingredient_id");
    }
}

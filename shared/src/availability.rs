//! Recipe availability projection
//!
//! Answers "can N units of this composite product be made right now, and how
//! many could be made at most". Manufacturing, the recipe screen, the POS
//! availability check and composite sales all go through
//! [`check_availability`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DomainError, Shortage};

/// One recipe line joined with the ingredient's current stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRequirement {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    /// Amount of ingredient consumed per unit of product
    pub quantity_needed: Decimal,
    /// Ingredient stock at the time of the check
    pub available: Decimal,
    pub unit: Option<String>,
}

impl RecipeRequirement {
    pub fn needed_for(&self, quantity: Decimal) -> Decimal {
        self.quantity_needed * quantity
    }

    /// Whole units of product this line alone could support
    pub fn max_units(&self) -> Option<i64> {
        if self.quantity_needed <= Decimal::ZERO {
            return None;
        }
        let units = (self.available / self.quantity_needed).floor();
        Some(units.to_i64().unwrap_or(i64::MAX).max(0))
    }
}

/// Availability of one ingredient for the requested quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientAvailability {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub needed: Decimal,
    pub available: Decimal,
    pub sufficient: bool,
    pub shortage: Decimal,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub requested_quantity: Decimal,
    pub can_manufacture: bool,
    /// Maximum producible quantity given current stock, independent of the request
    pub max_quantity: i64,
    pub availability: Vec<IngredientAvailability>,
}

impl AvailabilityReport {
    pub fn shortages(&self) -> Vec<Shortage> {
        self.availability
            .iter()
            .filter(|line| !line.sufficient)
            .map(|line| Shortage {
                ingredient_id: line.ingredient_id,
                ingredient_name: line.ingredient_name.clone(),
                needed: line.needed,
                available: line.available,
                shortage: line.shortage,
                unit: line.unit.clone(),
            })
            .collect()
    }

    /// Turn an unsatisfiable report into `InsufficientIngredients`
    pub fn ensure_sufficient(&self) -> Result<(), DomainError> {
        if self.can_manufacture {
            Ok(())
        } else {
            Err(DomainError::InsufficientIngredients {
                shortages: self.shortages(),
            })
        }
    }
}

/// Evaluate a recipe against current ingredient stock. Pure and read-only.
///
/// An empty recipe can never be manufactured and reports `max_quantity = 0`.
pub fn check_availability(requirements: &[RecipeRequirement], quantity: Decimal) -> AvailabilityReport {
    let availability: Vec<IngredientAvailability> = requirements
        .iter()
        .map(|req| {
            let needed = req.needed_for(quantity);
            let sufficient = req.available >= needed;
            IngredientAvailability {
                ingredient_id: req.ingredient_id,
                ingredient_name: req.ingredient_name.clone(),
                needed,
                available: req.available,
                sufficient,
                shortage: (needed - req.available).max(Decimal::ZERO),
                unit: req.unit.clone(),
            }
        })
        .collect();

    let max_quantity = requirements
        .iter()
        .filter_map(RecipeRequirement::max_units)
        .min()
        .unwrap_or(0);

    AvailabilityReport {
        requested_quantity: quantity,
        can_manufacture: !availability.is_empty() && availability.iter().all(|a| a.sufficient),
        max_quantity,
        availability,
    }
}

/// Total ingredient cost of one unit of product
pub fn recipe_unit_cost<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    lines
        .into_iter()
        .map(|(quantity_needed, unit_cost)| quantity_needed * unit_cost)
        .sum::<Decimal>()
        .round_dp(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(name: &str, needed: i64, available: i64) -> RecipeRequirement {
        RecipeRequirement {
            ingredient_id: Uuid::new_v4(),
            ingredient_name: name.to_string(),
            quantity_needed: Decimal::from(needed),
            available: Decimal::from(available),
            unit: Some("kg".to_string()),
        }
    }

    #[test]
    fn test_bread_from_flour() {
        let report = check_availability(&[req("Flour", 5, 100)], Decimal::from(10));
        let flour = &report.availability[0];
        assert_eq!(flour.needed, Decimal::from(50));
        assert_eq!(flour.available, Decimal::from(100));
        assert!(flour.sufficient);
        assert_eq!(flour.shortage, Decimal::ZERO);
        assert!(report.can_manufacture);
        assert_eq!(report.max_quantity, 20);
    }

    #[test]
    fn test_shortage_reported() {
        let report = check_availability(&[req("Flour", 5, 100)], Decimal::from(100));
        assert!(!report.can_manufacture);
        let shortages = report.shortages();
        assert_eq!(shortages.len(), 1);
        assert_eq!(shortages[0].shortage, Decimal::from(400));
        assert!(report.ensure_sufficient().is_err());
    }

    #[test]
    fn test_max_quantity_is_bottleneck() {
        let report = check_availability(
            &[req("Flour", 5, 100), req("Yeast", 2, 9)],
            Decimal::ONE,
        );
        assert_eq!(report.max_quantity, 4);
    }

    #[test]
    fn test_empty_recipe_cannot_be_made() {
        let report = check_availability(&[], Decimal::ONE);
        assert!(!report.can_manufacture);
        assert_eq!(report.max_quantity, 0);
        assert!(report.shortages().is_empty());
    }

    #[test]
    fn test_fractional_requirements() {
        let mut line = req("Milk", 0, 1);
        line.quantity_needed = Decimal::new(25, 2); // 0.25 L per cup
        let report = check_availability(&[line], Decimal::from(4));
        assert!(report.can_manufacture);
        assert_eq!(report.max_quantity, 4);
    }

    #[test]
    fn test_recipe_unit_cost() {
        let cost = recipe_unit_cost(vec![
            (Decimal::from(5), Decimal::from(2)),
            (Decimal::new(5, 1), Decimal::new(123456, 5)),
        ]);
        // 10 + 0.5 * 1.23456 = 10.61728 -> 10.6173
        assert_eq!(cost, Decimal::new(106173, 4));
    }
}

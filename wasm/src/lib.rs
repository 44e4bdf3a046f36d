//! WebAssembly module for the POS inventory frontend
//!
//! Runs the same stock rules as the server so the register can preview
//! results offline:
//! - recipe availability for composite products
//! - manual adjustment previews
//! - recipe cost

use rust_decimal::Decimal;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

pub use shared::{
    check_availability, plan_stock_change, recipe_unit_cost, AdjustmentDirection,
    AvailabilityReport, RecipeRequirement, StockChange,
};

#[derive(serde::Deserialize)]
struct CostLine {
    quantity_needed: Decimal,
    unit_cost: Decimal,
}

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("pos-inventory-wasm ready"));
}

fn parse_quantity(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid quantity '{}': {}", value, e))
}

fn availability_json(requirements_json: &str, quantity: &str) -> Result<String, String> {
    let requirements: Vec<RecipeRequirement> = serde_json::from_str(requirements_json)
        .map_err(|e| format!("Invalid recipe JSON: {}", e))?;
    let quantity = parse_quantity(quantity)?;
    shared::validate_positive_quantity(quantity)?;

    let report = check_availability(&requirements, quantity);
    serde_json::to_string(&report).map_err(|e| e.to_string())
}

fn adjustment_json(current_stock: &str, quantity: &str, direction: &str) -> Result<String, String> {
    let direction = match direction {
        "increase" => AdjustmentDirection::Increase,
        "decrease" => AdjustmentDirection::Decrease,
        other => return Err(format!("Invalid adjustment type '{}'", other)),
    };
    let current = parse_quantity(current_stock)?;
    let quantity = parse_quantity(quantity)?;
    shared::validate_positive_quantity(quantity)?;

    let change = plan_stock_change(current, direction.signed(quantity), direction.policy())
        .map_err(|e| e.to_string())?;
    serde_json::to_string(&change).map_err(|e| e.to_string())
}

fn cost_of(lines_json: &str) -> Result<String, String> {
    let lines: Vec<CostLine> =
        serde_json::from_str(lines_json).map_err(|e| format!("Invalid recipe JSON: {}", e))?;
    let cost = recipe_unit_cost(lines.into_iter().map(|l| (l.quantity_needed, l.unit_cost)));
    Ok(cost.to_string())
}

/// Evaluate a recipe (JSON array of requirements) for `quantity` units.
/// Returns the availability report as JSON.
#[wasm_bindgen]
pub fn check_recipe_availability(requirements_json: &str, quantity: &str) -> Result<String, JsValue> {
    availability_json(requirements_json, quantity).map_err(|e| JsValue::from_str(&e))
}

/// Preview a manual adjustment; decreases clamp at zero like the server does
#[wasm_bindgen]
pub fn preview_adjustment(current_stock: &str, quantity: &str, direction: &str) -> Result<String, JsValue> {
    adjustment_json(current_stock, quantity, direction).map_err(|e| JsValue::from_str(&e))
}

/// Unit cost of a recipe given `[{quantity_needed, unit_cost}]`
#[wasm_bindgen]
pub fn calculate_recipe_cost(lines_json: &str) -> Result<String, JsValue> {
    cost_of(lines_json).map_err(|e| JsValue::from_str(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_json() {
        let recipe = r#"[{
            "ingredient_id": "6f1c1f7e-8d2a-4c55-9b7a-0c4d1f2e3a4b",
            "ingredient_name": "Flour",
            "quantity_needed": "5",
            "available": "100",
            "unit": "kg"
        }]"#;
        let json = availability_json(recipe, "10").unwrap();
        let report: AvailabilityReport = serde_json::from_str(&json).unwrap();
        assert!(report.can_manufacture);
        assert_eq!(report.max_quantity, 20);
    }

    #[test]
    fn test_adjustment_preview_clamps() {
        let json = adjustment_json("10", "30", "decrease").unwrap();
        let change: StockChange = serde_json::from_str(&json).unwrap();
        assert_eq!(change.new_stock, Decimal::ZERO);
        assert_eq!(change.quantity, Decimal::from(10));
    }

    #[test]
    fn test_adjustment_rejects_unknown_type() {
        assert!(adjustment_json("10", "1", "sideways").is_err());
        assert!(adjustment_json("10", "0", "increase").is_err());
    }

    #[test]
    fn test_recipe_cost() {
        let lines = r#"[{"quantity_needed": "5", "unit_cost": "2"}, {"quantity_needed": "0.5", "unit_cost": "3"}]"#;
        assert_eq!(Decimal::from_str(&cost_of(lines).unwrap()).unwrap(), Decimal::new(115, 1));
    }
}

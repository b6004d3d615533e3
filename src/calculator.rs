//! Batch costing and margin-based pricing
//!
//! Everything here is a pure function of a [`Recipe`]. Malformed numeric input
//! is sanitized to safe defaults up front, so no function in this module can fail.

use std::fmt;

use crate::currency::format_currency;
use crate::models::{CostBreakdown, NumericInput, Recipe};

/// Margins at or above this are clamped before inverting.
pub const MAX_EFFECTIVE_MARGIN: f64 = 0.95;

/// Parse a numeric input, falling back to `default` for anything that is not
/// a finite number: missing, blank, non-numeric text, NaN or infinity.
pub fn parse_finite_or(input: &NumericInput, default: f64) -> f64 {
    let value = match input {
        NumericInput::Missing => None,
        NumericInput::Number(n) => Some(*n),
        NumericInput::Text(s) => s.trim().parse::<f64>().ok(),
    };
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SanitizedIngredient<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub unit: &'a str,
    pub quantity: f64,
    pub cost_per_unit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SanitizedPackaging<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub cost_per_unit: f64,
}

/// A recipe whose numeric fields are safe for arithmetic. Identity fields are
/// borrowed unchanged from the source recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedRecipe<'a> {
    pub batch_yield: f64, // always >= 1
    pub labor_cost_per_hour: f64,
    pub labor_time_hours: f64,
    pub overhead_percentage: f64,
    pub retail_margin: f64, // >= 0, unclamped above
    pub wholesale_margin: f64,
    pub ingredients: Vec<SanitizedIngredient<'a>>,
    pub packaging: Vec<SanitizedPackaging<'a>>,
}

/// Coerce every numeric field of `recipe` to a finite value.
pub fn sanitize(recipe: &Recipe) -> SanitizedRecipe<'_> {
    SanitizedRecipe {
        batch_yield: parse_finite_or(&recipe.batch_yield, 1.0).max(1.0),
        labor_cost_per_hour: parse_finite_or(&recipe.labor_cost_per_hour, 0.0),
        labor_time_hours: parse_finite_or(&recipe.labor_time_hours, 0.0),
        overhead_percentage: parse_finite_or(&recipe.overhead_percentage, 0.0),
        retail_margin: parse_finite_or(&recipe.desired_retail_margin, 0.0).max(0.0),
        wholesale_margin: parse_finite_or(&recipe.desired_wholesale_margin, 0.0).max(0.0),
        ingredients: recipe
            .ingredients
            .iter()
            .map(|i| SanitizedIngredient {
                id: &i.id,
                name: &i.name,
                unit: &i.unit,
                quantity: parse_finite_or(&i.quantity, 0.0),
                cost_per_unit: parse_finite_or(&i.cost_per_unit, 0.0),
            })
            .collect(),
        packaging: recipe
            .packaging
            .iter()
            .map(|p| SanitizedPackaging {
                id: &p.id,
                name: &p.name,
                cost_per_unit: parse_finite_or(&p.cost_per_unit, 0.0),
            })
            .collect(),
    }
}

/// Sum of quantity x unit cost over all ingredients.
pub fn ingredient_cost(recipe: &SanitizedRecipe) -> f64 {
    recipe
        .ingredients
        .iter()
        .fold(0.0, |acc, i| acc + i.quantity * i.cost_per_unit)
}

/// Packaging cost of a single produced unit: one of every packaging item.
pub fn packaging_cost_per_unit(recipe: &SanitizedRecipe) -> f64 {
    recipe.packaging.iter().fold(0.0, |acc, p| acc + p.cost_per_unit)
}

/// Packaging cost for the whole batch.
pub fn packaging_cost(recipe: &SanitizedRecipe) -> f64 {
    packaging_cost_per_unit(recipe) * recipe.batch_yield
}

/// Which price is being suggested. Each tier has its own fallback multiple
/// for degenerate margins (100% or more).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceTier {
    Retail,
    Wholesale,
}

impl PriceTier {
    pub fn fallback_multiple(self) -> f64 {
        match self {
            PriceTier::Retail => 2.0,
            PriceTier::Wholesale => 1.5,
        }
    }
}

/// Price at which `margin` (a fraction of price) is profit.
///
/// `price = cost / (1 - min(margin, 0.95))`. A margin of 1 or more skips the
/// formula and returns a fixed multiple of cost for the tier. The check uses
/// the unclamped margin, so 0.999 and 1.0 take different paths.
pub fn price_from_margin(cost_per_unit: f64, margin: f64, tier: PriceTier) -> f64 {
    if margin >= 1.0 {
        return cost_per_unit * tier.fallback_multiple();
    }
    let effective = margin.min(MAX_EFFECTIVE_MARGIN);
    cost_per_unit / (1.0 - effective)
}

/// Run the full costing pipeline on a sanitized recipe.
pub fn cost_sanitized(recipe: &SanitizedRecipe) -> CostBreakdown {
    let ingredient_cost = ingredient_cost(recipe);
    let packaging_cost = packaging_cost(recipe);
    let total_direct_cost = ingredient_cost + packaging_cost;

    // Labor is a flat charge per batch; overhead applies to direct cost only
    let labor_cost = recipe.labor_cost_per_hour * recipe.labor_time_hours;
    let overhead_cost = total_direct_cost * recipe.overhead_percentage;
    let total_batch_cost = total_direct_cost + labor_cost + overhead_cost;

    let cost_per_unit = total_batch_cost / recipe.batch_yield;

    CostBreakdown {
        ingredient_cost,
        packaging_cost,
        labor_cost,
        overhead_cost,
        total_direct_cost,
        total_batch_cost,
        cost_per_unit,
        retail_price: price_from_margin(cost_per_unit, recipe.retail_margin, PriceTier::Retail),
        wholesale_price: price_from_margin(cost_per_unit, recipe.wholesale_margin, PriceTier::Wholesale),
    }
}

/// Compute the cost breakdown for a recipe in any state of editing.
///
/// Every output is finite as long as the sanitized inputs and their
/// products stay within `f64` range. Inputs that are finite but close to
/// `f64::MAX` can still overflow to infinity, and overhead on an infinite
/// direct cost is NaN.
pub fn calculate_costs(recipe: &Recipe) -> CostBreakdown {
    cost_sanitized(&sanitize(recipe))
}

/// Human-readable cost report for one recipe
#[derive(Debug)]
pub struct CostReport<'a> {
    pub recipe_name: &'a str,
    pub batch_yield: f64,
    pub packaging_cost_per_unit: f64,
    pub breakdown: CostBreakdown,
    pub currency: &'a str,
}

impl<'a> CostReport<'a> {
    pub fn new(recipe: &'a Recipe, currency: &'a str) -> Self {
        let sanitized = sanitize(recipe);
        Self {
            recipe_name: &recipe.name,
            batch_yield: sanitized.batch_yield,
            packaging_cost_per_unit: packaging_cost_per_unit(&sanitized),
            breakdown: cost_sanitized(&sanitized),
            currency,
        }
    }

    fn money(&self, amount: f64) -> String {
        format_currency(amount, self.currency)
    }
}

impl fmt::Display for CostReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.breakdown;
        let name = if self.recipe_name.is_empty() {
            "(unnamed recipe)"
        } else {
            self.recipe_name
        };

        writeln!(f, "=== Cost Breakdown: {} ===", name)?;
        writeln!(f, "Batch yield: {} units", self.batch_yield)?;
        writeln!(f)?;

        writeln!(f, "Direct costs:")?;
        writeln!(f, "  Ingredients:       {:>12}", self.money(b.ingredient_cost))?;
        writeln!(
            f,
            "  Packaging:         {:>12}  ({} per unit)",
            self.money(b.packaging_cost),
            self.money(self.packaging_cost_per_unit)
        )?;
        writeln!(f, "  Total direct:      {:>12}", self.money(b.total_direct_cost))?;
        writeln!(f)?;

        writeln!(f, "Labor:               {:>12}", self.money(b.labor_cost))?;
        writeln!(f, "Overhead:            {:>12}", self.money(b.overhead_cost))?;
        writeln!(f, "Total batch cost:    {:>12}", self.money(b.total_batch_cost))?;
        writeln!(f, "Cost per unit:       {:>12}", self.money(b.cost_per_unit))?;
        writeln!(f)?;

        writeln!(f, "Suggested prices (per unit):")?;
        writeln!(f, "  Retail:            {:>12}", self.money(b.retail_price))?;
        writeln!(f, "  Wholesale:         {:>12}", self.money(b.wholesale_price))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ingredient, PackagingItem};

    const EPS: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn bakery_recipe() -> Recipe {
        Recipe {
            name: "Sugar cookies".to_string(),
            batch_yield: 10.0.into(),
            labor_cost_per_hour: 20.0.into(),
            labor_time_hours: 0.5.into(),
            overhead_percentage: 0.15.into(),
            desired_retail_margin: 0.5.into(),
            desired_wholesale_margin: 0.3.into(),
            ingredients: vec![
                Ingredient::new("flour", 500.0, "g", 0.003),
                Ingredient::new("sugar", 200.0, "g", 0.005),
            ],
            packaging: vec![PackagingItem::new("bag", 0.50), PackagingItem::new("sticker", 0.10)],
            ..Recipe::default()
        }
    }

    #[test]
    fn test_parse_finite_or() {
        assert_eq!(parse_finite_or(&NumericInput::Missing, 7.0), 7.0);
        assert_eq!(parse_finite_or(&NumericInput::Number(2.5), 7.0), 2.5);
        assert_eq!(parse_finite_or(&NumericInput::Number(f64::NAN), 7.0), 7.0);
        assert_eq!(parse_finite_or(&NumericInput::Number(f64::NEG_INFINITY), 7.0), 7.0);
        assert_eq!(parse_finite_or(&" 12.5 ".into(), 7.0), 12.5);
        assert_eq!(parse_finite_or(&"".into(), 7.0), 7.0);
        assert_eq!(parse_finite_or(&"12abc".into(), 7.0), 7.0);
        assert_eq!(parse_finite_or(&"inf".into(), 7.0), 7.0);
        assert_eq!(parse_finite_or(&"NaN".into(), 7.0), 7.0);
        assert_eq!(parse_finite_or(&"1e2".into(), 7.0), 100.0);
    }

    #[test]
    fn test_sanitize_batch_yield_floor() {
        for raw in [
            NumericInput::Number(0.0),
            NumericInput::Number(-4.0),
            NumericInput::Number(0.5),
            NumericInput::Missing,
            NumericInput::Text("dozen".to_string()),
        ] {
            let recipe = Recipe {
                batch_yield: raw.clone(),
                ..Recipe::default()
            };
            assert_eq!(sanitize(&recipe).batch_yield, 1.0, "input {:?}", raw);
        }

        let recipe = Recipe {
            batch_yield: "24".into(),
            ..Recipe::default()
        };
        assert_eq!(sanitize(&recipe).batch_yield, 24.0);
    }

    #[test]
    fn test_sanitize_keeps_identity_fields() {
        let mut recipe = bakery_recipe();
        recipe.ingredients[0].quantity = "lots".into();
        let flour_id = recipe.ingredients[0].id.clone();

        let sanitized = sanitize(&recipe);
        let flour = sanitized.ingredients[0];
        assert_eq!(flour.id, flour_id);
        assert_eq!(flour.name, "flour");
        assert_eq!(flour.unit, "g");
        assert_eq!(flour.quantity, 0.0);
        assert_eq!(flour.cost_per_unit, 0.003);
    }

    #[test]
    fn test_negative_margin_sanitized_to_zero() {
        let recipe = Recipe {
            desired_retail_margin: (-0.4).into(),
            desired_wholesale_margin: "n/a".into(),
            ..bakery_recipe()
        };
        let breakdown = calculate_costs(&recipe);
        assert_close(breakdown.retail_price, breakdown.cost_per_unit);
        assert_close(breakdown.wholesale_price, breakdown.cost_per_unit);
    }

    #[test]
    fn test_end_to_end_bakery_scenario() {
        let b = calculate_costs(&bakery_recipe());

        assert_close(b.ingredient_cost, 2.5);
        assert_close(b.packaging_cost, 6.0);
        assert_close(b.total_direct_cost, 8.5);
        assert_close(b.labor_cost, 10.0);
        assert_close(b.overhead_cost, 1.275);
        assert_close(b.total_batch_cost, 19.775);
        assert_close(b.cost_per_unit, 1.9775);
        assert_close(b.retail_price, 1.9775 / 0.5);
        assert_close(b.wholesale_price, 1.9775 / 0.7);
    }

    #[test]
    fn test_packaging_is_per_produced_unit() {
        let recipe = Recipe {
            batch_yield: 10.0.into(),
            packaging: vec![PackagingItem::new("box", 0.50), PackagingItem::new("ribbon", 0.10)],
            ..Recipe::default()
        };
        let b = calculate_costs(&recipe);
        assert_close(b.packaging_cost, 6.0);
        assert_close(b.total_direct_cost, 6.0);
    }

    #[test]
    fn test_labor_not_scaled_by_yield_and_excluded_from_overhead() {
        let recipe = Recipe {
            batch_yield: 100.0.into(),
            labor_cost_per_hour: 15.0.into(),
            labor_time_hours: 2.0.into(),
            overhead_percentage: 0.5.into(),
            ..Recipe::default()
        };
        let b = calculate_costs(&recipe);
        assert_close(b.labor_cost, 30.0);
        assert_close(b.overhead_cost, 0.0);
        assert_close(b.total_batch_cost, 30.0);
        assert_close(b.cost_per_unit, 0.3);
    }

    #[test]
    fn test_empty_recipe_costs_nothing() {
        let b = calculate_costs(&Recipe::default());
        assert_eq!(b, CostBreakdown::default());
        // Empty lists must sum to +0, not -0
        assert!(b.ingredient_cost.is_sign_positive());
        assert!(b.packaging_cost.is_sign_positive());
        assert!(b.overhead_cost.is_sign_positive());
    }

    #[test]
    fn test_report_without_packaging_shows_plain_zero() {
        let mut recipe = Recipe::named("Plain Fudge");
        recipe.ingredients.push(Ingredient::new("sugar", 100.0, "g", 0.01));
        let report = CostReport::new(&recipe, "USD").to_string();

        assert!(report.contains("($0.00 per unit)"), "{}", report);
        assert!(!report.contains("-0.00"), "{}", report);
    }

    #[test]
    fn test_price_from_margin_regular() {
        assert_close(price_from_margin(2.0, 0.5, PriceTier::Retail), 4.0);
        assert_close(price_from_margin(2.0, 0.0, PriceTier::Wholesale), 2.0);
    }

    #[test]
    fn test_price_from_margin_clamped_at_95_percent() {
        assert_close(price_from_margin(2.0, 0.95, PriceTier::Retail), 40.0);
        assert_close(price_from_margin(2.0, 0.99, PriceTier::Retail), 40.0);
        assert_close(price_from_margin(3.0, 0.99, PriceTier::Retail), 60.0);
        assert_close(price_from_margin(3.0, 0.999, PriceTier::Wholesale), 60.0);
    }

    #[test]
    fn test_price_from_margin_degenerate_fallback() {
        assert_close(price_from_margin(2.0, 1.2, PriceTier::Retail), 4.0);
        assert_close(price_from_margin(3.0, 1.2, PriceTier::Retail), 6.0);
        assert_close(price_from_margin(3.0, 1.0, PriceTier::Retail), 6.0);
        assert_close(price_from_margin(3.0, 1.0, PriceTier::Wholesale), 4.5);
        assert_close(price_from_margin(3.0, 7.0, PriceTier::Wholesale), 4.5);
    }

    #[test]
    fn test_margin_tiers_are_independent() {
        let recipe = Recipe {
            batch_yield: 1.0.into(),
            labor_cost_per_hour: 3.0.into(),
            labor_time_hours: 1.0.into(),
            desired_retail_margin: 1.5.into(),
            desired_wholesale_margin: 0.99.into(),
            ..Recipe::default()
        };
        let b = calculate_costs(&recipe);
        assert_close(b.cost_per_unit, 3.0);
        assert_close(b.retail_price, 6.0);
        assert_close(b.wholesale_price, 60.0);
    }

    #[test]
    fn test_calculation_is_repeatable() {
        let recipe = bakery_recipe();
        assert_eq!(calculate_costs(&recipe), calculate_costs(&recipe));
    }

    #[test]
    fn test_report_formats_with_currency() {
        let recipe = bakery_recipe();
        let report = CostReport::new(&recipe, "EUR").to_string();

        assert!(report.contains("Sugar cookies"), "{}", report);
        assert!(report.contains("€10.00"), "{}", report);
        assert!(report.contains("€1.98"), "{}", report);
        assert!(report.contains("(€0.60 per unit)"), "{}", report);
        assert!(report.contains("Batch yield: 10 units"), "{}", report);
    }
}

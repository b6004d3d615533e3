//! Data models for recipes, line items and cost breakdowns

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::UnknownField;

/// A numeric field exactly as the user (or a stored document) left it.
///
/// Values are edited keystroke by keystroke, so a field can hold text that is
/// not a number yet, or nothing at all. Only the sanitizer turns these into
/// `f64`; nothing else in the crate reads them arithmetically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum NumericInput {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl From<Value> for NumericInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => NumericInput::Missing,
            Value::Number(n) => n.as_f64().map_or(NumericInput::Missing, NumericInput::Number),
            Value::String(s) => NumericInput::Text(s),
            other => NumericInput::Text(other.to_string()),
        }
    }
}

impl From<NumericInput> for Value {
    fn from(input: NumericInput) -> Self {
        match input {
            NumericInput::Missing => Value::Null,
            // Non-finite numbers have no JSON form
            NumericInput::Number(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            NumericInput::Text(s) => Value::String(s),
        }
    }
}

impl From<f64> for NumericInput {
    fn from(n: f64) -> Self {
        NumericInput::Number(n)
    }
}

impl From<&str> for NumericInput {
    fn from(s: &str) -> Self {
        NumericInput::Text(s.to_string())
    }
}

impl fmt::Display for NumericInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericInput::Missing => write!(f, "(blank)"),
            NumericInput::Number(n) => write!(f, "{}", n),
            NumericInput::Text(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub quantity: NumericInput,
    #[serde(default)]
    pub unit: String, // free text: g, ml, each...
    #[serde(default)]
    pub cost_per_unit: NumericInput,
}

impl Ingredient {
    pub fn new(
        name: impl Into<String>,
        quantity: impl Into<NumericInput>,
        unit: impl Into<String>,
        cost_per_unit: impl Into<NumericInput>,
    ) -> Self {
        Self {
            id: new_line_id(),
            name: name.into(),
            quantity: quantity.into(),
            unit: unit.into(),
            cost_per_unit: cost_per_unit.into(),
        }
    }
}

/// One packaging component. Consumed once per produced unit, so it has no quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagingItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cost_per_unit: NumericInput,
}

impl PackagingItem {
    pub fn new(name: impl Into<String>, cost_per_unit: impl Into<NumericInput>) -> Self {
        Self {
            id: new_line_id(),
            name: name.into(),
            cost_per_unit: cost_per_unit.into(),
        }
    }
}

/// The working record for one batch recipe.
///
/// An empty `id` marks a recipe that has never been saved. Every numeric
/// field is a [`NumericInput`]; absent fields in a document deserialize as
/// [`NumericInput::Missing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub batch_yield: NumericInput,
    #[serde(default)]
    pub labor_cost_per_hour: NumericInput,
    #[serde(default)]
    pub labor_time_hours: NumericInput,
    #[serde(default)]
    pub overhead_percentage: NumericInput, // fraction of direct cost, 0.15 = 15%
    #[serde(default)]
    pub desired_retail_margin: NumericInput, // fraction of price
    #[serde(default)]
    pub desired_wholesale_margin: NumericInput,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub packaging: Vec<PackagingItem>,
}

impl Default for Recipe {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            batch_yield: NumericInput::Number(1.0),
            labor_cost_per_hour: NumericInput::Number(0.0),
            labor_time_hours: NumericInput::Number(0.0),
            overhead_percentage: NumericInput::Number(0.0),
            desired_retail_margin: NumericInput::Number(0.5),
            desired_wholesale_margin: NumericInput::Number(0.3),
            ingredients: Vec::new(),
            packaging: Vec::new(),
        }
    }
}

impl Recipe {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_saved(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn numeric(&self, field: RecipeField) -> &NumericInput {
        match field {
            RecipeField::BatchYield => &self.batch_yield,
            RecipeField::LaborCostPerHour => &self.labor_cost_per_hour,
            RecipeField::LaborTimeHours => &self.labor_time_hours,
            RecipeField::OverheadPercentage => &self.overhead_percentage,
            RecipeField::DesiredRetailMargin => &self.desired_retail_margin,
            RecipeField::DesiredWholesaleMargin => &self.desired_wholesale_margin,
        }
    }

    fn numeric_mut(&mut self, field: RecipeField) -> &mut NumericInput {
        match field {
            RecipeField::BatchYield => &mut self.batch_yield,
            RecipeField::LaborCostPerHour => &mut self.labor_cost_per_hour,
            RecipeField::LaborTimeHours => &mut self.labor_time_hours,
            RecipeField::OverheadPercentage => &mut self.overhead_percentage,
            RecipeField::DesiredRetailMargin => &mut self.desired_retail_margin,
            RecipeField::DesiredWholesaleMargin => &mut self.desired_wholesale_margin,
        }
    }

    /// Apply a single edit in place. Returns false when the edit referenced a
    /// line item that does not exist; the recipe is left untouched in that case.
    pub fn apply(&mut self, edit: RecipeEdit) -> bool {
        match edit {
            RecipeEdit::Rename(name) => {
                self.name = name;
                true
            }
            RecipeEdit::SetNumber { field, value } => {
                *self.numeric_mut(field) = value;
                true
            }
            RecipeEdit::AddIngredient(ingredient) => {
                self.ingredients.push(ingredient);
                true
            }
            RecipeEdit::UpdateIngredient { id, field, value } => {
                let Some(index) = self.ingredients.iter().position(|i| i.id == id) else {
                    debug!("No ingredient with id {} in recipe '{}'", id, self.name);
                    return false;
                };
                let ingredient = &mut self.ingredients[index];
                match field {
                    IngredientField::Name => ingredient.name = value,
                    IngredientField::Unit => ingredient.unit = value,
                    IngredientField::Quantity => ingredient.quantity = NumericInput::Text(value),
                    IngredientField::CostPerUnit => ingredient.cost_per_unit = NumericInput::Text(value),
                }
                true
            }
            RecipeEdit::RemoveIngredient(id) => {
                let before = self.ingredients.len();
                self.ingredients.retain(|i| i.id != id);
                if self.ingredients.len() == before {
                    debug!("No ingredient with id {} in recipe '{}'", id, self.name);
                }
                self.ingredients.len() != before
            }
            RecipeEdit::AddPackaging(item) => {
                self.packaging.push(item);
                true
            }
            RecipeEdit::UpdatePackaging { id, field, value } => {
                let Some(index) = self.packaging.iter().position(|p| p.id == id) else {
                    debug!("No packaging item with id {} in recipe '{}'", id, self.name);
                    return false;
                };
                let item = &mut self.packaging[index];
                match field {
                    PackagingField::Name => item.name = value,
                    PackagingField::CostPerUnit => item.cost_per_unit = NumericInput::Text(value),
                }
                true
            }
            RecipeEdit::RemovePackaging(id) => {
                let before = self.packaging.len();
                self.packaging.retain(|p| p.id != id);
                if self.packaging.len() == before {
                    debug!("No packaging item with id {} in recipe '{}'", id, self.name);
                }
                self.packaging.len() != before
            }
        }
    }

    /// Append suggested ingredients, skipping any whose name already appears
    /// in the recipe (case-insensitive). Returns how many were added.
    pub fn merge_suggestions(&mut self, suggestions: &[SuggestedIngredient]) -> usize {
        let mut added = 0;
        for suggestion in suggestions {
            let exists = self
                .ingredients
                .iter()
                .any(|i| i.name.trim().eq_ignore_ascii_case(suggestion.name.trim()));
            if exists {
                debug!("Skipping suggested ingredient '{}': already present", suggestion.name);
                continue;
            }
            self.ingredients.push(Ingredient::new(
                suggestion.name.clone(),
                suggestion.quantity,
                suggestion.unit.clone(),
                suggestion.cost_per_unit,
            ));
            added += 1;
        }
        added
    }
}

/// A recipe as held by the store, with the time it was last written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecipe {
    pub recipe: Recipe,
    pub updated_at: DateTime<Utc>,
}

/// The numeric, recipe-level fields a user can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeField {
    BatchYield,
    LaborCostPerHour,
    LaborTimeHours,
    OverheadPercentage,
    DesiredRetailMargin,
    DesiredWholesaleMargin,
}

impl RecipeField {
    pub const ALL: [RecipeField; 6] = [
        RecipeField::BatchYield,
        RecipeField::LaborCostPerHour,
        RecipeField::LaborTimeHours,
        RecipeField::OverheadPercentage,
        RecipeField::DesiredRetailMargin,
        RecipeField::DesiredWholesaleMargin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RecipeField::BatchYield => "batchYield",
            RecipeField::LaborCostPerHour => "laborCostPerHour",
            RecipeField::LaborTimeHours => "laborTimeHours",
            RecipeField::OverheadPercentage => "overheadPercentage",
            RecipeField::DesiredRetailMargin => "desiredRetailMargin",
            RecipeField::DesiredWholesaleMargin => "desiredWholesaleMargin",
        }
    }
}

impl FromStr for RecipeField {
    type Err = UnknownField;

    // Accepts camelCase, snake_case and kebab-case spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "batchyield" | "yield" => Ok(RecipeField::BatchYield),
            "laborcostperhour" | "laborrate" => Ok(RecipeField::LaborCostPerHour),
            "labortimehours" | "labortime" => Ok(RecipeField::LaborTimeHours),
            "overheadpercentage" | "overhead" => Ok(RecipeField::OverheadPercentage),
            "desiredretailmargin" | "retailmargin" => Ok(RecipeField::DesiredRetailMargin),
            "desiredwholesalemargin" | "wholesalemargin" => Ok(RecipeField::DesiredWholesaleMargin),
            _ => Err(UnknownField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngredientField {
    Name,
    Quantity,
    Unit,
    CostPerUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingField {
    Name,
    CostPerUnit,
}

/// A discrete change made by the presentation layer. Text values for numeric
/// fields are stored verbatim and only interpreted by the sanitizer.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeEdit {
    Rename(String),
    SetNumber { field: RecipeField, value: NumericInput },
    AddIngredient(Ingredient),
    UpdateIngredient { id: String, field: IngredientField, value: String },
    RemoveIngredient(String),
    AddPackaging(PackagingItem),
    UpdatePackaging { id: String, field: PackagingField, value: String },
    RemovePackaging(String),
}

/// One ingredient proposed by the suggestion service, already defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedIngredient {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    pub cost_per_unit: f64,
}

/// Result of one costing run. Every value is derived; none is stored.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub ingredient_cost: f64,
    pub packaging_cost: f64, // whole batch
    pub labor_cost: f64,
    pub overhead_cost: f64,
    pub total_direct_cost: f64,
    pub total_batch_cost: f64,
    pub cost_per_unit: f64,
    pub retail_price: f64,
    pub wholesale_price: f64,
}

fn new_line_id() -> String {
    Uuid::new_v4().to_string()
}

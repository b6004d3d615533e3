//! Recipe costing calculator
//!
//! Computes per-unit cost and suggested retail/wholesale prices for a batch
//! recipe, with optional SQLite persistence and AI ingredient suggestions.

pub mod calculator;
pub mod config;
pub mod currency;
pub mod db;
pub mod error;
pub mod models;
pub mod retry;
pub mod session;
pub mod store;
pub mod suggest;

pub use calculator::{CostReport, calculate_costs, parse_finite_or, sanitize};
pub use currency::format_currency;
pub use models::{CostBreakdown, Ingredient, NumericInput, PackagingItem, Recipe, RecipeEdit};
pub use session::Session;
pub use store::{AsyncRecipeStore, RecipeEvent, RecipeList, RecipeStore, SqliteRecipeStore};

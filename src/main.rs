//! Recipe Costing Calculator
//!
//! Batch recipe costing and pricing for small food businesses.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use recipe_costing::calculator::CostReport;
use recipe_costing::config::{self, Settings};
use recipe_costing::currency::CURRENCIES;
use recipe_costing::error::SuggestionError;
use recipe_costing::models::{Ingredient, PackagingItem, Recipe, RecipeEdit, RecipeField};
use recipe_costing::session::Session;
use recipe_costing::store::{AsyncRecipeStore, SqliteRecipeStore};
use recipe_costing::suggest::{GeminiBackend, IngredientSuggester};

#[derive(Parser)]
#[command(name = "recipe-costing")]
#[command(about = "Batch recipe costing and pricing calculator")]
struct Cli {
    /// Path to the settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the SQLite recipe database (overrides settings)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and save a new recipe with default settings
    New {
        /// Recipe name
        name: String,
    },

    /// List saved recipes, newest first
    List,

    /// Show a recipe and its cost breakdown
    Show {
        /// Recipe ID (defaults to the most recently updated recipe)
        id: Option<String>,
    },

    /// Set a recipe field (name, batchYield, laborCostPerHour, laborTimeHours,
    /// overheadPercentage, desiredRetailMargin, desiredWholesaleMargin)
    Set {
        id: String,
        field: String,
        value: String,
    },

    /// Add an ingredient to a recipe
    AddIngredient {
        id: String,
        name: String,
        /// Quantity used per batch
        quantity: String,
        /// Unit of the quantity (g, ml, each...)
        unit: String,
        /// Cost of a single unit
        cost_per_unit: String,
    },

    /// Remove an ingredient from a recipe
    RemoveIngredient { id: String, ingredient_id: String },

    /// Add a packaging item (used once per produced unit)
    AddPackaging {
        id: String,
        name: String,
        cost_per_unit: String,
    },

    /// Remove a packaging item from a recipe
    RemovePackaging { id: String, item_id: String },

    /// Delete a saved recipe
    Delete { id: String },

    /// Calculate costs for a saved recipe or a recipe JSON file
    Calc {
        /// Recipe ID
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<String>,

        /// Recipe JSON document to cost without saving
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Ask the AI service for a starter ingredient list
    Suggest {
        /// Product name, e.g. "chocolate chip cookies"
        product: String,

        /// Merge the suggestions into this saved recipe
        #[arg(long)]
        into: Option<String>,
    },

    /// List supported currencies
    Currencies,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current settings
    Show,

    /// Set a setting (currency, gemini_api_key, gemini_model, database)
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings_path = cli.config.clone().unwrap_or_else(config::default_settings_path);
    // Malformed settings fall back to defaults; `config set` then rewrites the file
    let mut settings = Settings::load_or_default(&settings_path);

    if let Commands::Config { action } = &cli.command {
        return run_config(action, &mut settings, &settings_path);
    }
    if let Commands::Currencies = cli.command {
        print_currencies();
        return Ok(());
    }

    let database = cli.database.clone().or_else(|| settings.database_path());
    let store = match database {
        Some(path) => match SqliteRecipeStore::open(&path) {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Could not open recipe store at {}: {}", path.display(), e);
                eprintln!("Warning: recipe store unavailable ({}). Recipes cannot be saved.", e);
                None
            }
        },
        None => None,
    };

    if let Commands::List = cli.command {
        let Some(store) = store else {
            bail!("Recipe store unavailable; nothing to list");
        };
        let recipes = AsyncRecipeStore::new(store).list().await?;
        if recipes.is_empty() {
            println!("No saved recipes. Run 'new <name>' first.");
            return Ok(());
        }
        println!("{:<36}  {:<30} {}", "ID", "Name", "Updated");
        println!("{}", "-".repeat(88));
        for stored in recipes {
            println!(
                "{:<36}  {:<30} {}",
                stored.recipe.id,
                stored.recipe.name,
                stored.updated_at.format("%Y-%m-%d %H:%M")
            );
        }
        return Ok(());
    }

    let mut session = Session::open(store, settings.currency.clone());

    match cli.command {
        Commands::New { name } => {
            session.new_recipe(name);
            let id = session.save()?;
            println!("Created recipe '{}' with id {}", session.recipe().name, id);
        }

        Commands::Show { id } => {
            if let Some(id) = id {
                session.open_recipe(&id)?;
            } else if !session.recipe().is_saved() {
                println!("No saved recipes. Run 'new <name>' first.");
                return Ok(());
            }
            print_recipe(session.recipe());
            println!();
            println!("{}", CostReport::new(session.recipe(), session.currency()));
        }

        Commands::Set { id, field, value } => {
            session.open_recipe(&id)?;
            let edit = if field.eq_ignore_ascii_case("name") {
                RecipeEdit::Rename(value)
            } else {
                RecipeEdit::SetNumber {
                    field: field.parse::<RecipeField>()?,
                    value: value.as_str().into(),
                }
            };
            session.edit(edit);
            session.save()?;
            println!("{}", CostReport::new(session.recipe(), session.currency()));
        }

        Commands::AddIngredient {
            id,
            name,
            quantity,
            unit,
            cost_per_unit,
        } => {
            session.open_recipe(&id)?;
            let ingredient = Ingredient::new(name, quantity.as_str(), unit, cost_per_unit.as_str());
            let ingredient_id = ingredient.id.clone();
            session.edit(RecipeEdit::AddIngredient(ingredient));
            session.save()?;
            println!("Added ingredient {}", ingredient_id);
        }

        Commands::RemoveIngredient { id, ingredient_id } => {
            session.open_recipe(&id)?;
            if !session.edit(RecipeEdit::RemoveIngredient(ingredient_id.clone())) {
                bail!("Ingredient '{}' not found in recipe '{}'", ingredient_id, id);
            }
            session.save()?;
            println!("Removed ingredient {}", ingredient_id);
        }

        Commands::AddPackaging {
            id,
            name,
            cost_per_unit,
        } => {
            session.open_recipe(&id)?;
            let item = PackagingItem::new(name, cost_per_unit.as_str());
            let item_id = item.id.clone();
            session.edit(RecipeEdit::AddPackaging(item));
            session.save()?;
            println!("Added packaging item {}", item_id);
        }

        Commands::RemovePackaging { id, item_id } => {
            session.open_recipe(&id)?;
            if !session.edit(RecipeEdit::RemovePackaging(item_id.clone())) {
                bail!("Packaging item '{}' not found in recipe '{}'", item_id, id);
            }
            session.save()?;
            println!("Removed packaging item {}", item_id);
        }

        Commands::Delete { id } => {
            session.delete(&id)?;
            println!("Deleted recipe {}", id);
        }

        Commands::Calc { id, file } => {
            if let Some(path) = file {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let recipe: Recipe = serde_json::from_str(&text)
                    .with_context(|| format!("{} is not a recipe document", path.display()))?;
                session.load(recipe);
            } else if let Some(id) = id {
                session.open_recipe(&id)?;
            }
            println!("{}", CostReport::new(session.recipe(), session.currency()));
        }

        Commands::Suggest { product, into } => {
            let api_key = settings.api_key().ok_or(SuggestionError::MissingCredential)?;
            let backend = GeminiBackend::new(&api_key, &settings.gemini_model)?;
            let suggester = IngredientSuggester::new(backend);

            let suggestions = suggester.suggest(&product, session.currency()).await?;
            if suggestions.is_empty() {
                println!("No suggestions for '{}'.", product);
                return Ok(());
            }

            println!("{:<30} {:>10} {:<6} {:>12}", "Ingredient", "Quantity", "Unit", "Cost/unit");
            println!("{}", "-".repeat(61));
            for s in &suggestions {
                println!(
                    "{:<30} {:>10} {:<6} {:>12}",
                    s.name,
                    s.quantity,
                    s.unit,
                    recipe_costing::format_currency(s.cost_per_unit, session.currency())
                );
            }

            if let Some(id) = into {
                session.open_recipe(&id)?;
                let added = session.merge_suggestions(&suggestions);
                session.save()?;
                println!("\nAdded {} ingredient(s) to '{}'", added, session.recipe().name);
            }
        }

        // Handled above
        Commands::Currencies | Commands::Config { .. } | Commands::List => {}
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn run_config(action: &ConfigAction, settings: &mut Settings, path: &std::path::Path) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Settings file: {}", path.display());
            println!("  currency       = {}", settings.currency);
            println!(
                "  gemini_api_key = {}",
                if settings.api_key().is_some() { "(set)" } else { "(not set)" }
            );
            println!("  gemini_model   = {}", settings.gemini_model);
            match settings.database_path() {
                Some(db) => println!("  database       = {}", db.display()),
                None => println!("  database       = (disabled)"),
            }
        }
        ConfigAction::Set { key, value } => {
            settings.set(key, value)?;
            settings.save(path)?;
            println!("Saved {} to {}", key, path.display());
        }
    }
    Ok(())
}

fn print_currencies() {
    println!("{:<6} {:<6} {}", "Code", "Symbol", "Name");
    println!("{}", "-".repeat(40));
    for c in CURRENCIES.iter() {
        println!("{:<6} {:<6} {}", c.code, c.symbol, c.name);
    }
}

fn print_recipe(recipe: &Recipe) {
    println!("Recipe: {}", recipe.name);
    println!("  ID: {}", recipe.id);
    for field in RecipeField::ALL {
        println!("  {}: {}", field.label(), recipe.numeric(field));
    }

    if !recipe.ingredients.is_empty() {
        println!("  Ingredients:");
        for i in &recipe.ingredients {
            println!(
                "    [{}] {} - {} {} @ {} per unit",
                i.id, i.name, i.quantity, i.unit, i.cost_per_unit
            );
        }
    }

    if !recipe.packaging.is_empty() {
        println!("  Packaging (per produced unit):");
        for p in &recipe.packaging {
            println!("    [{}] {} @ {}", p.id, p.name, p.cost_per_unit);
        }
    }
}

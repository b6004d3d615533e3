//! Working state for one editing session
//!
//! Holds the recipe being edited and its cost breakdown, recomputed after
//! every edit. The store is optional: without one the session still edits and
//! costs recipes, it just cannot persist them.

use std::sync::mpsc::Receiver;

use tracing::{info, warn};

use crate::calculator::calculate_costs;
use crate::error::{SessionError, StoreError};
use crate::models::{CostBreakdown, Recipe, RecipeEdit, SuggestedIngredient};
use crate::store::{RecipeEvent, RecipeList, RecipeStore};

pub struct Session<S> {
    recipe: Recipe,
    breakdown: CostBreakdown,
    currency: String,
    store: Option<S>,
    events: Option<Receiver<RecipeEvent>>,
    recipes: RecipeList,
}

impl<S: RecipeStore> Session<S> {
    /// Start a session. With a store, the most recently updated recipe is
    /// opened; otherwise (or if the store is empty) a new default recipe.
    ///
    /// A store that cannot be subscribed to is dropped and the session runs
    /// without persistence.
    pub fn open(store: Option<S>, currency: impl Into<String>) -> Self {
        let mut session = Self {
            recipe: Recipe::default(),
            breakdown: CostBreakdown::default(),
            currency: currency.into(),
            store: None,
            events: None,
            recipes: RecipeList::default(),
        };

        if let Some(mut store) = store {
            match store.subscribe() {
                Ok(events) => {
                    session.recipes.catch_up(&events);
                    session.events = Some(events);
                    session.store = Some(store);
                }
                Err(e) => warn!("Recipe store unavailable, continuing without it: {}", e),
            }
        }

        if let Some(latest) = session.recipes.most_recent() {
            info!("Opening most recent recipe '{}'", latest.recipe.name);
            session.recipe = latest.recipe.clone();
        }
        session.recompute();
        session
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn breakdown(&self) -> &CostBreakdown {
        &self.breakdown
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Saved recipes as last seen from the store's event stream.
    pub fn recipes(&mut self) -> &RecipeList {
        self.sync();
        &self.recipes
    }

    /// Apply one edit and recompute. Returns whether the recipe changed.
    pub fn edit(&mut self, edit: RecipeEdit) -> bool {
        let changed = self.recipe.apply(edit);
        self.recompute();
        changed
    }

    pub fn merge_suggestions(&mut self, suggestions: &[SuggestedIngredient]) -> usize {
        let added = self.recipe.merge_suggestions(suggestions);
        self.recompute();
        added
    }

    /// Replace the working recipe with a new, unsaved one.
    pub fn new_recipe(&mut self, name: impl Into<String>) {
        self.recipe = Recipe::named(name);
        self.recompute();
    }

    /// Switch to a saved recipe by id.
    pub fn open_recipe(&mut self, id: &str) -> Result<(), StoreError> {
        self.sync();
        let stored = self
            .recipes
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.recipe = stored.recipe.clone();
        self.recompute();
        Ok(())
    }

    /// Load an arbitrary recipe value, e.g. from a file.
    pub fn load(&mut self, recipe: Recipe) {
        self.recipe = recipe;
        self.recompute();
    }

    /// Persist the working recipe. On failure the in-memory recipe is left
    /// exactly as it was.
    pub fn save(&mut self) -> Result<String, SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NoStore)?;
        let id = store.save(&self.recipe)?;
        self.recipe.id = id.clone();
        self.sync();
        Ok(id)
    }

    /// Delete a saved recipe. If it is the one being edited, the working copy
    /// becomes unsaved but keeps its contents.
    pub fn delete(&mut self, id: &str) -> Result<(), SessionError> {
        let store = self.store.as_mut().ok_or(SessionError::NoStore)?;
        store.delete(id)?;
        if self.recipe.id == id {
            self.recipe.id.clear();
        }
        self.sync();
        Ok(())
    }

    fn sync(&mut self) {
        if let Some(events) = &self.events {
            self.recipes.catch_up(events);
        }
    }

    fn recompute(&mut self) {
        self.breakdown = calculate_costs(&self.recipe);
    }
}

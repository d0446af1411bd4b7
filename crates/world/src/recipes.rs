//! A tiny recipe table for the simulated world.
//!
//! Inputs match by name fragment, so `"log"` accepts `oak_log` or
//! `birch_log` alike.

use blockmind_core::ItemStack;

/// One crafting recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipe {
    pub name: &'static str,
    pub output: &'static str,
    pub yield_count: u32,
    pub inputs: &'static [(&'static str, u32)],
}

const RECIPES: &[Recipe] = &[
    Recipe {
        name: "planks",
        output: "oak_planks",
        yield_count: 4,
        inputs: &[("log", 1)],
    },
    Recipe {
        name: "crafting_table",
        output: "crafting_table",
        yield_count: 1,
        inputs: &[("planks", 4)],
    },
    Recipe {
        name: "stick",
        output: "stick",
        yield_count: 4,
        inputs: &[("planks", 2)],
    },
    Recipe {
        name: "wooden_pickaxe",
        output: "wooden_pickaxe",
        yield_count: 1,
        inputs: &[("planks", 3), ("stick", 2)],
    },
    Recipe {
        name: "wooden_axe",
        output: "wooden_axe",
        yield_count: 1,
        inputs: &[("planks", 3), ("stick", 2)],
    },
];

/// Lookup and application of the built-in recipes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeBook;

impl RecipeBook {
    pub fn get(&self, name: &str) -> Option<&'static Recipe> {
        // "oak_planks" and "planks" name the same recipe
        RECIPES
            .iter()
            .find(|r| r.name == name || r.output == name)
    }

    /// Craft up to `count` times, returning how many crafts happened.
    ///
    /// Fails without touching the inventory when not even one craft is
    /// possible.
    pub fn craft(
        &self,
        inventory: &mut Vec<ItemStack>,
        recipe: &str,
        count: u32,
    ) -> Result<u32, String> {
        let recipe = self
            .get(recipe)
            .ok_or_else(|| format!("unknown recipe '{recipe}'"))?;

        let possible = recipe
            .inputs
            .iter()
            .map(|(fragment, qty)| count_matching(inventory, fragment) / qty)
            .min()
            .unwrap_or(0);
        if possible == 0 {
            let missing: Vec<String> = recipe
                .inputs
                .iter()
                .filter(|(fragment, qty)| count_matching(inventory, fragment) < *qty)
                .map(|(fragment, qty)| format!("{qty}x {fragment}"))
                .collect();
            return Err(format!("need {}", missing.join(", ")));
        }

        let times = possible.min(count.max(1));
        for (fragment, qty) in recipe.inputs {
            remove_matching(inventory, fragment, qty * times);
        }
        add_item(inventory, recipe.output, recipe.yield_count * times);
        Ok(times)
    }
}

pub(crate) fn count_matching(inventory: &[ItemStack], fragment: &str) -> u32 {
    inventory
        .iter()
        .filter(|i| i.name.contains(fragment))
        .map(|i| i.count)
        .sum()
}

pub(crate) fn remove_matching(inventory: &mut Vec<ItemStack>, fragment: &str, mut qty: u32) {
    for item in inventory.iter_mut().filter(|i| i.name.contains(fragment)) {
        let take = item.count.min(qty);
        item.count -= take;
        qty -= take;
        if qty == 0 {
            break;
        }
    }
    inventory.retain(|i| i.count > 0);
}

pub(crate) fn add_item(inventory: &mut Vec<ItemStack>, name: &str, qty: u32) {
    match inventory.iter_mut().find(|i| i.name == name) {
        Some(existing) => existing.count += qty,
        None => inventory.push(ItemStack::new(name, qty)),
    }
}

//! Built-in capability handlers.
//!
//! `mine`, `build`, `sleep` and `collect` have no implementation yet. They
//! are registered as [`UnsupportedHandler`]s so the dispatcher sends them
//! down the default route explicitly.

use async_trait::async_trait;
use blockmind_core::error::ActionError;
use blockmind_core::{ActionToken, ItemStack};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dispatcher::{
    ActionContext, ActionDispatcher, ActionHandler, ActionReport, VisitedLocation,
};

/// Lines used by the `chat` action.
pub const CHAT_LINES: &[&str] = &[
    "This world is beautiful! 🌍",
    "What is everyone up to today?",
    "Shall we build something together?",
    "Exploring new places is so much fun!",
    "Can I help anyone with anything?",
    "Lovely weather today ☀️",
];

const FOOD_FRAGMENTS: [&str; 3] = ["bread", "apple", "cooked"];
const FULL_FOOD: f32 = 20.0;

/// A dispatcher with every built-in handler registered and `explore` as the
/// default route.
pub fn standard_dispatcher() -> ActionDispatcher {
    let mut dispatcher = ActionDispatcher::new(Arc::new(ExploreHandler::default()));
    dispatcher.register(Arc::new(FollowPlayerHandler::default()));
    dispatcher.register(Arc::new(ChatHandler));
    dispatcher.register(Arc::new(EatHandler));
    dispatcher.register(Arc::new(CraftHandler));
    for token in [
        ActionToken::Mine,
        ActionToken::Build,
        ActionToken::Sleep,
        ActionToken::Collect,
    ] {
        dispatcher.register(Arc::new(UnsupportedHandler::new(token)));
    }
    dispatcher
}

// --- Explore ---

/// Walk to a random XZ target near the current position.
pub struct ExploreHandler {
    radius: f64,
}

impl ExploreHandler {
    pub fn new(radius: f64) -> Self {
        Self {
            radius: radius.abs().max(1.0),
        }
    }
}

impl Default for ExploreHandler {
    fn default() -> Self {
        Self::new(25.0)
    }
}

#[async_trait]
impl ActionHandler for ExploreHandler {
    fn action(&self) -> ActionToken {
        ActionToken::Explore
    }

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        let (dx, dz) = {
            let mut rng = rand::rng();
            (
                rng.random_range(-self.radius..=self.radius),
                rng.random_range(-self.radius..=self.radius),
            )
        };
        let target_x = ctx.snapshot.position.x + dx;
        let target_z = ctx.snapshot.position.z + dz;

        ctx.session.move_toward(target_x, target_z).await?;
        debug!(agent = ctx.agent, x = target_x, z = target_z, "Explored");

        let description = format!("explored toward ({target_x:.0}, {target_z:.0})");
        let state = ctx.session.current_state().await?;
        let report = match state.position {
            Some(position) => ActionReport::new(description).with_location(VisitedLocation {
                position,
                biome: state.biome.unwrap_or_else(|| "unknown".into()),
                notable_blocks: state.notable_blocks,
            }),
            None => ActionReport::new(description),
        };
        Ok(report)
    }
}

// --- Follow player ---

/// Follow the nearest visible peer.
pub struct FollowPlayerHandler {
    distance: f64,
}

impl Default for FollowPlayerHandler {
    fn default() -> Self {
        Self { distance: 3.0 }
    }
}

#[async_trait]
impl ActionHandler for FollowPlayerHandler {
    fn action(&self) -> ActionToken {
        ActionToken::FollowPlayer
    }

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        let Some(peer) = ctx.snapshot.nearby.first() else {
            return Ok(ActionReport::new("nobody to follow"));
        };
        ctx.session.follow_entity(&peer.name, self.distance).await?;
        Ok(ActionReport::new(format!("following {}", peer.name)))
    }
}

// --- Chat ---

pub struct ChatHandler;

#[async_trait]
impl ActionHandler for ChatHandler {
    fn action(&self) -> ActionToken {
        ActionToken::Chat
    }

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        let line = CHAT_LINES
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or("Hello!");
        ctx.session.send_chat(line).await?;
        Ok(ActionReport::new(format!("said \"{line}\"")))
    }
}

// --- Eat ---

pub struct EatHandler;

impl EatHandler {
    fn pick_food(inventory: &[ItemStack]) -> Option<&ItemStack> {
        inventory
            .iter()
            .find(|i| FOOD_FRAGMENTS.iter().any(|f| i.name.contains(f)))
    }
}

#[async_trait]
impl ActionHandler for EatHandler {
    fn action(&self) -> ActionToken {
        ActionToken::Eat
    }

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        if ctx.snapshot.food >= FULL_FOOD {
            return Ok(ActionReport::new("not hungry"));
        }
        let Some(food) = Self::pick_food(&ctx.snapshot.inventory) else {
            return Ok(ActionReport::new("nothing to eat"));
        };
        ctx.session.equip_and_consume(&food.name).await?;
        info!(agent = ctx.agent, item = %food.name, "Ate");
        Ok(ActionReport::new(format!("ate {}", food.name)))
    }
}

// --- Craft ---

/// Work up the wooden tool chain one rung at a time.
pub struct CraftHandler;

fn count(inventory: &[ItemStack], fragment: &str) -> u32 {
    inventory
        .iter()
        .filter(|i| i.name.contains(fragment))
        .map(|i| i.count)
        .sum()
}

fn has_exact(inventory: &[ItemStack], name: &str) -> bool {
    inventory.iter().any(|i| i.name == name && i.count > 0)
}

impl CraftHandler {
    async fn refresh(ctx: &ActionContext<'_>) -> Result<Vec<ItemStack>, ActionError> {
        Ok(ctx.session.current_state().await?.inventory)
    }

    /// Turn logs into planks until at least `min` planks are held.
    async fn ensure_planks(
        ctx: &ActionContext<'_>,
        mut inventory: Vec<ItemStack>,
        min: u32,
    ) -> Result<Vec<ItemStack>, ActionError> {
        while count(&inventory, "planks") < min {
            let logs = count(&inventory, "log");
            if logs == 0 {
                break;
            }
            ctx.session.craft("planks", 1).await?;
            inventory = Self::refresh(ctx).await?;
            if count(&inventory, "log") >= logs {
                break;
            }
        }
        Ok(inventory)
    }

    async fn craft_table(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        let inventory = Self::ensure_planks(ctx, ctx.snapshot.inventory.clone(), 4).await?;
        if count(&inventory, "planks") < 4 {
            return Err(ActionError::MissingPrerequisite(
                "need 4 planks for a crafting table".into(),
            ));
        }
        ctx.session.craft("crafting_table", 1).await?;
        Ok(ActionReport::new("crafted a crafting table"))
    }

    async fn craft_tools(
        &self,
        ctx: &ActionContext<'_>,
        inventory: Vec<ItemStack>,
    ) -> Result<ActionReport, ActionError> {
        let has_pickaxe = count(&inventory, "pickaxe") > 0;
        let has_axe = inventory
            .iter()
            .any(|i| i.name.ends_with("_axe") && i.count > 0);
        if has_pickaxe && has_axe {
            return Ok(ActionReport::new("nothing left to craft"));
        }

        let mut inventory = inventory;
        if count(&inventory, "stick") == 0 {
            inventory = Self::ensure_planks(ctx, inventory, 2).await?;
            if count(&inventory, "planks") >= 2 {
                ctx.session.craft("stick", 1).await?;
                inventory = Self::refresh(ctx).await?;
            }
        }
        let inventory = Self::ensure_planks(ctx, inventory, 3).await?;

        if count(&inventory, "stick") < 2 || count(&inventory, "planks") < 3 {
            return Err(ActionError::MissingPrerequisite(
                "need 2 sticks and 3 planks for a tool".into(),
            ));
        }

        if !has_pickaxe {
            ctx.session.craft("wooden_pickaxe", 1).await?;
            return Ok(ActionReport::new("crafted a wooden pickaxe"));
        }
        ctx.session.craft("wooden_axe", 1).await?;
        Ok(ActionReport::new("crafted a wooden axe"))
    }
}

#[async_trait]
impl ActionHandler for CraftHandler {
    fn action(&self) -> ActionToken {
        ActionToken::Craft
    }

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        let inventory = &ctx.snapshot.inventory;
        if !has_exact(inventory, "crafting_table") && count(inventory, "log") > 0 {
            match self.craft_table(ctx).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    debug!(agent = ctx.agent, error = %e, "Crafting table failed, trying tools");
                }
            }
            let refreshed = Self::refresh(ctx).await?;
            return self.craft_tools(ctx, refreshed).await;
        }
        self.craft_tools(ctx, inventory.clone()).await
    }
}

// --- Placeholders ---

/// A capability that is known but not implemented.
pub struct UnsupportedHandler {
    token: ActionToken,
}

impl UnsupportedHandler {
    pub fn new(token: ActionToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl ActionHandler for UnsupportedHandler {
    fn action(&self) -> ActionToken {
        self.token
    }

    async fn perform(&self, ctx: &ActionContext<'_>) -> Result<ActionReport, ActionError> {
        debug!(agent = ctx.agent, action = %self.token, "Capability not implemented");
        Err(ActionError::Unsupported(self.token.to_string()))
    }
}

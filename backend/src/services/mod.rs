//! Business logic services over the database pool

pub mod consumption;
pub mod demand;
pub mod forecast;
pub mod inventory;
pub mod recipes;
pub mod shopping;
pub mod units;

pub use consumption::ConsumptionService;
pub use demand::DemandService;
pub use forecast::ForecastService;
pub use inventory::InventoryService;
pub use recipes::RecipeService;
pub use shopping::ShoppingListService;
pub use units::UnitService;

pub mod asset_handlers;
pub mod content_handlers;
pub mod health_handlers;
pub mod product_handlers;
pub mod upload;

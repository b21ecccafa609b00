pub mod asset_pipeline;
pub mod asset_store;
pub mod catalog_service;
pub mod local_store;
pub mod object_store;
pub mod rewriter;
pub mod sanitizer;

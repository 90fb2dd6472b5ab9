pub mod catalog_service;
pub mod export_service;
pub mod image_repository;
pub mod media_store;

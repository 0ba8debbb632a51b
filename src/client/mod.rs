pub mod es_client;
pub mod store;

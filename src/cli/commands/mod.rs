pub mod budget;
pub mod bundle;
pub mod db;
pub mod oauth;

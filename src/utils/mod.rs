pub mod db_utils;
pub mod settings_cache;
pub mod username_filter;

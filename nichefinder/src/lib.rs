// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    describe_event, expand_path, format_opportunity, handle_analyze, handle_crawl, handle_full,
    handle_seeds, load_config, write_json,
};

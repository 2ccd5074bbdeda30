pub mod batch_collector;
pub mod config;
pub mod story_markdown;
pub mod story_query;
pub mod storybook_api;

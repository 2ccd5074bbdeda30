pub mod local_story;

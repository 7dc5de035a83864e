pub mod feature_flags;
pub mod listing;
pub mod output;
pub mod suggest;
pub mod template;
pub mod text;

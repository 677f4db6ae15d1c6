//! operations over filesystem trees

mod translate;

pub use translate::{
    translate_entry, translate_tree, EntryOutcome, TranslateOptions, TranslateStats,
};

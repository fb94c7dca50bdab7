mod collection;

pub use collection::draw_collection;

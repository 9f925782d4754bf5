mod resource_table;

pub use resource_table::ResourceTable;

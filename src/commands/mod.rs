mod index_date;
mod init_schema;
mod load;
mod query;

pub use index_date::handle_index_date;
pub use init_schema::handle_init_schema;
pub use load::handle_load;
pub use query::handle_query;

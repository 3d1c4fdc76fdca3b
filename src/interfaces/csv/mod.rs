pub mod link_writer;
pub mod script_reader;

pub mod advisor_client;
pub mod quote_client;
pub mod statement_import;

pub mod datasource;
pub mod export;
pub mod publish;
pub mod record;

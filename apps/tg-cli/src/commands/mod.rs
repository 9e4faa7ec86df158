pub mod integrity;
pub mod receipts;
pub mod submit;

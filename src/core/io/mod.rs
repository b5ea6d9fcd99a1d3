pub mod bed;
pub mod hts;
pub mod output;

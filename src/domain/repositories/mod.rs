pub mod brokerage;

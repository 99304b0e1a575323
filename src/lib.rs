//! aws-inventory - multi-account AWS inventory reports
//!
//! Each inventory shells out to the AWS CLI once per profile, flattens the
//! JSON it gets back into rows and writes a timestamped Excel workbook.

pub mod advisor;
pub mod aws;
pub mod config;
pub mod flatten;
pub mod inventory;
pub mod report;

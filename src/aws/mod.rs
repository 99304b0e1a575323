//! AWS CLI interaction module
//!
//! Every inventory talks to AWS by shelling out to the `aws` command line
//! tool, one process at a time, and reading its stdout.
//!
//! # Module Structure
//!
//! - [`cli`] - Call description, the [`AwsRunner`] seam and the process runner
//! - `fake` - Canned-response runner used by unit tests
//!
//! # Example
//!
//! ```ignore
//! use aws_inventory::aws::{call_json, AwsCall, AwsCli};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let cli = AwsCli::new("aws");
//!     let call = AwsCall::new("dynamodb", "list-tables");
//!     let tables = call_json(&cli, "shared", &call).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
#[cfg(test)]
pub mod fake;

pub use cli::{call_json, format_cli_error, AwsCall, AwsCli, AwsCliError, AwsRunner, OutputFormat};

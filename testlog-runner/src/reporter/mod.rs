// Copyright (c) The testlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting of test item runs to the shared output.
//!
//! The main structure in this module is [`ReportPrinter`].

mod display_mode;
mod empty_testsets;
mod error_description;
mod helpers;
mod printer;
mod timing;

pub use display_mode::*;
pub use empty_testsets::*;
pub use printer::*;
pub use timing::*;

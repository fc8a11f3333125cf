// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI subcommands.

mod batch;
mod convert;
mod info;
mod validate;

pub use batch::BatchConvertCmd;
pub use convert::ConvertCmd;
pub use info::InfoCmd;
pub use validate::ValidateCmd;

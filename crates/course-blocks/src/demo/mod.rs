// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference transformers exercising the collect/transform contract.

/// Special exam filtering and annotation.
pub mod special_exams;
/// Staff-only visibility filtering.
pub mod staff_only;

pub use special_exams::SpecialExamsTransformer;
pub use staff_only::StaffOnlyTransformer;

use crate::cancel::CancellationToken;
use crate::config::PatchFeatures;
use crate::diagnostics::DiagnosticSink;
use crate::invoke::{PatchArgs, PatchCall, PatchResult};
use crate::semantic::{validate_semantics, ArgBinding};
use crate::signature::{check_signature, CheckContext, SignatureCheck};
use crate::types::{FormulaType, TypeSystem};
use crate::value::Value;

/// `Patch(table, base_record, change_record, ...)`.
///
/// Binding runs [`PatchFunction::check_types`] and [`PatchFunction::check_semantics`]; both report
/// into the same sink and neither stops the other. Evaluation runs [`PatchFunction::invoke`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchFunction {
    pub features: PatchFeatures,
}

impl PatchFunction {
    pub const NAME: &'static str = "Patch";

    pub fn new(features: PatchFeatures) -> Self {
        Self { features }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Minimum and (when bounded) maximum argument count.
    pub fn arity(&self) -> (usize, Option<usize>) {
        (PatchFeatures::MIN_ARITY, self.features.max_arity())
    }

    pub fn check_types(
        &self,
        types: &dyn TypeSystem,
        arg_types: &[FormulaType],
        sink: &mut dyn DiagnosticSink,
    ) -> SignatureCheck {
        let mut cx = CheckContext {
            types,
            features: &self.features,
            sink,
        };
        check_signature(arg_types, &mut cx)
    }

    pub fn check_semantics(
        &self,
        types: &dyn TypeSystem,
        target: &ArgBinding,
        arg_types: &[FormulaType],
        sink: &mut dyn DiagnosticSink,
    ) {
        validate_semantics(types, target, arg_types, sink);
    }

    /// Runs both binding checks; the call is usable only when this returns a valid check and the
    /// sink received no errors.
    pub fn bind(
        &self,
        types: &dyn TypeSystem,
        target: &ArgBinding,
        arg_types: &[FormulaType],
        sink: &mut dyn DiagnosticSink,
    ) -> SignatureCheck {
        let check = self.check_types(types, arg_types, sink);
        self.check_semantics(types, target, arg_types, sink);
        check
    }

    pub async fn invoke(&self, args: PatchArgs, cancel: &CancellationToken) -> PatchResult<Value> {
        PatchCall::new().run(args, cancel).await
    }
}

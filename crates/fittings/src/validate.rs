//! Spec validation
//!
//! Every fitting spec is checked against a registry before a pipeline is
//! built. Failures abort construction and are never retried.

use std::collections::HashSet;

use plumb_protocol::{FittingSpec, SpecError, SpecResult};

use crate::FittingRegistry;

/// Validate one fitting spec against a registry
///
/// Checks that the module id resolves to a registered factory and that the
/// factory accepts the supplied argument. The partition function needs no
/// shape check: the spec type only admits the follow selector or a
/// one-argument callable.
///
/// # Errors
///
/// - [`SpecError::UnknownModule`] if the module id is not registered
/// - [`SpecError::BadArg`] if the module's validator rejects the argument
pub fn validate_spec(spec: &FittingSpec, registry: &FittingRegistry) -> SpecResult<()> {
    let module = registry.get(&spec.module_id).ok_or_else(|| {
        SpecError::unknown_module(&spec.name, &spec.module_id, &registry.available())
    })?;

    module
        .validate_arg(&spec.arg)
        .map_err(|reason| SpecError::bad_arg(&spec.name, &spec.module_id, reason))?;

    Ok(())
}

/// Validate a whole pipeline's specs
///
/// # Errors
///
/// - [`SpecError::Empty`] for a pipeline with no fittings
/// - [`SpecError::DuplicateName`] if two fittings share a name
/// - any per-spec error from [`validate_spec`]
pub fn validate_pipeline(specs: &[FittingSpec], registry: &FittingRegistry) -> SpecResult<()> {
    if specs.is_empty() {
        return Err(SpecError::Empty);
    }

    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(SpecError::DuplicateName(spec.name.clone()));
        }
        validate_spec(spec, registry)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_default_registry, Mapper};
    use plumb_protocol::{Arg, Item};

    #[test]
    fn test_valid_spec() {
        let registry = create_default_registry();
        let spec = FittingSpec::new("s1", "pass");
        assert!(validate_spec(&spec, &registry).is_ok());
    }

    #[test]
    fn test_unknown_module() {
        let registry = create_default_registry();
        let spec = FittingSpec::new("s1", "frobnicate");
        let err = validate_spec(&spec, &registry).unwrap_err();
        assert!(matches!(err, SpecError::UnknownModule { .. }));
    }

    #[test]
    fn test_rejected_arg_reported_with_reason() {
        let registry = create_default_registry();
        // xform requires a Mapper argument
        let spec = FittingSpec::new("s1", "xform").with_arg(Arg::value(5));
        let err = validate_spec(&spec, &registry).unwrap_err();
        match err {
            SpecError::BadArg { reason, .. } => assert!(reason.contains("Mapper")),
            other => panic!("expected BadArg, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_pipeline() {
        let registry = create_default_registry();
        let err = validate_pipeline(&[], &registry).unwrap_err();
        assert!(matches!(err, SpecError::Empty));
    }

    #[test]
    fn test_duplicate_names() {
        let registry = create_default_registry();
        let specs = vec![FittingSpec::new("dup", "pass"), FittingSpec::new("dup", "pass")];
        let err = validate_pipeline(&specs, &registry).unwrap_err();
        assert!(matches!(err, SpecError::DuplicateName(name) if name == "dup"));
    }

    #[test]
    fn test_full_pipeline_ok() {
        let registry = create_default_registry();
        let specs = vec![
            FittingSpec::new("double", "xform")
                .with_arg(Arg::shared(Mapper::map(|i: &Item| {
                    Item::from(i.as_i64().unwrap_or(0) * 2)
                }))),
            FittingSpec::new("total", "sum"),
        ];
        assert!(validate_pipeline(&specs, &registry).is_ok());
    }
}

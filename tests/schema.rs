//! Registry construction, lookups and catalog self-checks.

use remora_params::{Codec, DType, Group, ParameterDefinition, Registry, RegistryError, Value, ValueRecord};

fn build(yaml: &str) -> Result<Registry, RegistryError> {
    Registry::from_yaml_str(yaml)
}

#[test]
fn test_builtin_catalog() {
    let reg = Registry::builtin().expect("builtin");
    assert!(reg.len() >= 50);
    for g in Group::ALL {
        assert!(reg.group_members(g).next().is_some(), "group {g} is empty");
    }
    let bc = reg.lookup("remora.bc.xlo.type").expect("bc");
    assert_eq!(bc.dtype, DType::Enumeration);
    assert!(bc.enum_values.iter().any(|v| v == "Periodic"));
    let mixing = reg.lookup("remora.gls_P").expect("gls_P");
    let dep = mixing.depends_on.as_ref().expect("gls_P depends on the mixing type");
    assert_eq!(dep.key, "remora.vertical_mixing_type");
    assert_eq!(dep.equals, Value::Text("gls".into()));
}

#[test]
fn test_defaults_cover_every_default() {
    let reg = Registry::builtin().expect("builtin");
    let defaults = reg.defaults();
    let with_default = reg.definitions().iter().filter(|d| d.default.is_some()).count();
    assert_eq!(defaults.len(), with_default);
    let first: Vec<_> = defaults.keys().take(2).collect();
    assert_eq!(first, ["remora.prob_lo", "remora.prob_hi"]);
}

#[test]
fn test_is_active_uses_default_of_absent_controller() {
    let reg = Registry::builtin().expect("builtin");
    let empty = ValueRecord::new();
    // vertical_mixing_type defaults to gls
    assert!(reg.is_active("remora.gls_P", &empty));
    let analytic: ValueRecord = [("remora.vertical_mixing_type", "analytic")].into_iter().collect();
    assert!(!reg.is_active("remora.gls_P", &analytic));
    assert!(reg.is_active("remora.max_step", &analytic));
}

#[test]
fn test_custom_catalog_from_yaml() {
    let reg = build(
        r#"
- key: sim.mode
  label: Mode
  group: physics
  dtype: enumeration
  default: fast
  enum_values: [fast, exact]
- key: sim.tolerance
  label: Tolerance
  group: physics
  dtype: real
  default: 1.0e-6
  min: 0.0
  depends_on: { key: sim.mode, equals: exact }
"#,
    )
    .expect("valid catalog");
    assert_eq!(reg.len(), 2);
    assert_eq!(reg.declaration_index("sim.tolerance"), Some(1));
    assert!(!reg.is_active("sim.tolerance", &ValueRecord::new()));

    let parsed = Codec::new(&reg).parse("sim.tolerance = 1\n").expect("parse");
    assert_eq!(parsed.record.get("sim.tolerance"), Some(&Value::Real(1.0)));
}

#[test]
fn test_duplicate_key_rejected() {
    let err = build(
        "- {key: a.x, label: X, group: domain, dtype: integer}\n- {key: a.x, label: X, group: domain, dtype: real}\n",
    )
    .expect_err("duplicate");
    assert!(matches!(err, RegistryError::DuplicateKey(ref k) if k == "a.x"), "{err}");
}

#[test]
fn test_dangling_dependency_rejected() {
    let err = build(
        "- {key: a.x, label: X, group: domain, dtype: integer, depends_on: {key: a.missing, equals: 1}}\n",
    )
    .expect_err("dangling");
    assert!(matches!(err, RegistryError::DanglingDependency { .. }), "{err}");
}

#[test]
fn test_dependency_cycle_rejected() {
    let err = build(
        "- {key: a.x, label: X, group: domain, dtype: boolean, depends_on: {key: a.y, equals: true}}\n\
         - {key: a.y, label: Y, group: domain, dtype: boolean, depends_on: {key: a.x, equals: true}}\n",
    )
    .expect_err("cycle");
    match err {
        RegistryError::DependencyCycle { keys } => assert_eq!(keys, ["a.x", "a.y", "a.x"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_invalid_defaults_rejected() {
    let out_of_range = build("- {key: a.x, label: X, group: domain, dtype: integer, default: 5, max: 2}\n");
    assert!(matches!(out_of_range, Err(RegistryError::InvalidDefault { .. })));

    let wrong_type = build("- {key: a.x, label: X, group: domain, dtype: integer, default: many}\n");
    assert!(matches!(wrong_type, Err(RegistryError::InvalidDefault { .. })));

    let not_member = build(
        "- {key: a.x, label: X, group: domain, dtype: enumeration, default: c, enum_values: [a, b]}\n",
    );
    assert!(matches!(not_member, Err(RegistryError::InvalidDefault { .. })));
}

#[test]
fn test_invalid_definitions_rejected() {
    let defs = [
        ParameterDefinition {
            min: Some(3.0),
            max: Some(1.0),
            ..ParameterDefinition::new("a.x", Group::Domain, DType::Integer, None)
        },
        ParameterDefinition {
            min: Some(0.0),
            ..ParameterDefinition::new("a.x", Group::Domain, DType::Text, None)
        },
        ParameterDefinition::new("a.x", Group::Domain, DType::Enumeration, None),
        ParameterDefinition::new("a x", Group::Domain, DType::Integer, None),
    ];
    for def in defs {
        let err = Registry::from_definitions(vec![def]).expect_err("invalid");
        assert!(matches!(err, RegistryError::InvalidDefinition { .. }), "{err}");
    }
}

#[test]
fn test_unknown_schema_field_rejected() {
    let err = build("- {key: a.x, label: X, group: domain, dtype: integer, colour: red}\n").expect_err("field");
    assert!(matches!(err, RegistryError::Schema(_)), "{err}");
}
